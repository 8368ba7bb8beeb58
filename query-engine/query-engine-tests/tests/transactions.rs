use bastion_core::{CrudError, ErrorKind};
use bastion_tests::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn a_committed_transaction_keeps_its_writes() -> TestResult {
    let runner = Runner::load(schemas::foo()).await?;

    let created = runner
        .db()
        .transaction(|tx| async move {
            tx.model("Foo").create(json!({ "data": { "id": 1, "x": 1 } })).await?;
            tx.model("Foo").create(json!({ "data": { "id": 2, "x": 2 } })).await?;
            tx.model("Foo").count(json!({})).await
        })
        .await?;

    assert_eq!(json!(2), created.to_json());
    assert_eq!(2, runner.row_count("Foo").await?);

    Ok(())
}

#[tokio::test]
async fn a_failing_nested_transaction_rolls_back_the_outer_one() -> TestResult {
    let runner = Runner::load(schemas::foo()).await?;

    let result = runner
        .db()
        .transaction(|tx| async move {
            tx.model("Foo").create(json!({ "data": { "id": 1, "x": 1 } })).await?;

            tx.transaction(|inner| async move {
                inner.model("Foo").create(json!({ "data": { "id": 2, "x": 2 } })).await?;
                Err::<(), _>(CrudError::invalid("x", "stop"))
            })
            .await
        })
        .await;

    assert_eq!(ErrorKind::InvalidInput, expect_err(result).kind());
    assert_eq!(0, runner.row_count("Foo").await?);

    Ok(())
}

#[tokio::test]
async fn a_batch_returns_results_in_order() -> TestResult {
    let runner = Runner::load(schemas::foo()).await?;
    let foo = runner.db().model("Foo");

    let results = runner
        .db()
        .batch(vec![
            foo.create(json!({ "data": { "id": 1, "x": 10 } })),
            foo.create(json!({ "data": { "id": 2, "x": 20 } })),
            foo.count(json!({})),
        ])
        .await?;

    let results: Vec<_> = results.iter().map(|value| value.to_json()).collect();

    assert_eq!(vec![json!({ "id": 1, "x": 10 }), json!({ "id": 2, "x": 20 }), json!(2)], results);

    Ok(())
}

#[tokio::test]
async fn a_failing_batch_leaves_nothing_behind() -> TestResult {
    let runner = Runner::load(schemas::foo()).await?;
    let foo = runner.db().model("Foo");

    let result = runner
        .db()
        .batch(vec![
            foo.create(json!({ "data": { "id": 1, "x": 1 } })),
            foo.create(json!({ "data": { "id": 1, "x": 2 } })),
        ])
        .await;

    assert_eq!(ErrorKind::DbQuery, expect_err(result).kind());
    assert_eq!(0, runner.row_count("Foo").await?);

    Ok(())
}

#[tokio::test]
async fn a_policy_rejection_rolls_back_the_batch() -> TestResult {
    let runner = Runner::load(schemas::foo()).await?;
    let db = runner.anonymous();
    let foo = db.model("Foo");

    let result = db
        .batch(vec![
            foo.create(json!({ "data": { "id": 1, "x": 1 } })),
            foo.delete(json!({ "where": { "id": 1 } })),
        ])
        .await;

    assert_not_found(result);
    assert_eq!(0, runner.row_count("Foo").await?);

    Ok(())
}

#[tokio::test]
async fn nothing_runs_before_the_batch() -> TestResult {
    let runner = Runner::load(schemas::foo()).await?;
    let prepared = runner.db().model("Foo").create(json!({ "data": { "id": 1, "x": 1 } }));

    assert_eq!(0, runner.row_count("Foo").await?);

    runner.db().batch(vec![prepared]).await?;
    assert_eq!(1, runner.row_count("Foo").await?);

    Ok(())
}
