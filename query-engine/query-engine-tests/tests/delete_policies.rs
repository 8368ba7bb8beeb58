use bastion_tests::*;
use serde_json::json;

async fn foos() -> anyhow::Result<Runner> {
    let runner = Runner::load(schemas::foo()).await?;
    let db = runner.anonymous();

    db.model("Foo").create(json!({ "data": { "id": 1, "x": 1 } })).await?;
    db.model("Foo").create(json!({ "data": { "id": 2, "x": 3 } })).await?;

    Ok(runner)
}

#[tokio::test]
async fn deleting_a_row_the_rule_does_not_admit_is_not_found() -> TestResult {
    let runner = foos().await?;
    let db = runner.anonymous();

    assert_not_found(db.model("Foo").delete(json!({ "where": { "id": 1 } })).await);
    assert_eq!(2, runner.row_count("Foo").await?);

    Ok(())
}

#[tokio::test]
async fn deleting_an_admitted_row_returns_it() -> TestResult {
    let runner = foos().await?;
    let db = runner.anonymous();

    assert_query!(
        db.model("Foo").delete(json!({ "where": { "id": 2 } })),
        { "id": 2, "x": 3 }
    );

    assert_query!(
        db.model("Foo").find_many(json!({ "orderBy": { "id": "asc" } })),
        [{ "id": 1, "x": 1 }]
    );

    Ok(())
}

#[tokio::test]
async fn delete_many_only_counts_admitted_rows() -> TestResult {
    let runner = foos().await?;
    let db = runner.anonymous();

    assert_query!(db.model("Foo").delete_many(json!({})), { "count": 1 });
    assert_eq!(1, runner.row_count("Foo").await?);

    Ok(())
}

#[tokio::test]
async fn the_unrestricted_client_deletes_everything() -> TestResult {
    let runner = foos().await?;

    assert_query!(runner.db().model("Foo").delete_many(json!({})), { "count": 2 });

    Ok(())
}
