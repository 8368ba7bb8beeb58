use bastion_core::RejectionReason;
use bastion_tests::*;
use serde_json::json;

#[tokio::test]
async fn a_created_row_that_cannot_be_read_is_kept_but_reported() -> TestResult {
    let runner = Runner::load(schemas::notes()).await?;
    let db = runner.anonymous();

    assert_rejected(
        db.model("Note").create(json!({ "data": { "title": "orphan" } })).await,
        RejectionReason::CannotReadBack,
    );

    assert_eq!(1, runner.row_count("Note").await?);
    assert_query!(
        runner.db().model("Note").find_many(json!({})),
        [{ "id": 1, "title": "orphan", "ownerId": null }]
    );

    Ok(())
}

#[tokio::test]
async fn a_created_row_the_owner_can_read_is_returned() -> TestResult {
    let runner = Runner::load(schemas::notes()).await?;
    let db = runner.enhanced(json!({ "id": 7 }));

    assert_query!(
        db.model("Note").create(json!({ "data": { "title": "mine", "ownerId": 7 } })),
        { "id": 1, "title": "mine", "ownerId": 7 }
    );

    assert_rejected(
        db.model("Note").create(json!({ "data": { "title": "theirs", "ownerId": 8 } })).await,
        RejectionReason::CannotReadBack,
    );

    assert_query!(
        db.model("Note").find_many(json!({ "select": { "title": true } })),
        [{ "title": "mine" }]
    );

    assert_eq!(2, runner.row_count("Note").await?);

    Ok(())
}

#[tokio::test]
async fn create_many_does_not_read_back() -> TestResult {
    let runner = Runner::load(schemas::notes()).await?;
    let db = runner.anonymous();

    assert_query!(
        db.model("Note").create_many(json!({ "data": [{ "title": "a" }, { "title": "b" }] })),
        { "count": 2 }
    );

    assert_eq!(2, runner.row_count("Note").await?);

    Ok(())
}
