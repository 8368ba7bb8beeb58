use bastion_core::RejectionReason;
use bastion_tests::*;
use serde_json::json;

async fn with_secret() -> anyhow::Result<Runner> {
    let runner = Runner::load(schemas::notes()).await?;
    runner.db().model("Secret").create(json!({ "data": { "value": "hidden" } })).await?;

    Ok(runner)
}

#[tokio::test]
async fn models_without_rules_cannot_be_created() -> TestResult {
    let runner = Runner::load(schemas::notes()).await?;

    for db in [runner.anonymous(), runner.enhanced(json!({ "id": 1 }))] {
        assert_rejected(
            db.model("Secret").create(json!({ "data": { "value": "x" } })).await,
            RejectionReason::NoAccess,
        );
    }

    assert_eq!(0, runner.row_count("Secret").await?);

    Ok(())
}

#[tokio::test]
async fn models_without_rules_read_as_empty() -> TestResult {
    let runner = with_secret().await?;
    let db = runner.enhanced(json!({ "id": 1 }));

    assert_query!(db.model("Secret").find_many(json!({})), []);
    assert_query!(db.model("Secret").find_first(json!({})), null);
    assert_query!(db.model("Secret").find_unique(json!({ "where": { "id": 1 } })), null);
    assert_query!(db.model("Secret").count(json!({})), 0);

    assert_not_found(db.model("Secret").find_unique_or_throw(json!({ "where": { "id": 1 } })).await);

    Ok(())
}

#[tokio::test]
async fn models_without_rules_cannot_be_changed() -> TestResult {
    let runner = with_secret().await?;
    let db = runner.anonymous();

    assert_not_found(
        db.model("Secret")
            .update(json!({ "where": { "id": 1 }, "data": { "value": "changed" } }))
            .await,
    );
    assert_not_found(db.model("Secret").delete(json!({ "where": { "id": 1 } })).await);

    assert_query!(db.model("Secret").update_many(json!({ "data": { "value": "changed" } })), { "count": 0 });
    assert_query!(db.model("Secret").delete_many(json!({})), { "count": 0 });

    assert_query!(
        runner.db().model("Secret").find_many(json!({})),
        [{ "id": 1, "value": "hidden" }]
    );

    Ok(())
}
