use bastion_core::ErrorKind;
use bastion_tests::*;
use pretty_assertions::assert_eq;
use serde_json::json;

async fn owner_with_video() -> anyhow::Result<Runner> {
    let runner = Runner::load(schemas::assets()).await?;
    let db = runner.db();

    db.model("Owner").create(json!({ "data": { "name": "ann" } })).await?;
    db.model("Video")
        .create(json!({ "data": { "name": "intro", "ownerId": 1, "duration": 60 } }))
        .await?;

    Ok(runner)
}

#[tokio::test]
async fn sub_models_are_stored_over_two_tables() -> TestResult {
    let runner = Runner::load(schemas::assets()).await?;
    let db = runner.db();

    db.model("Owner").create(json!({ "data": { "name": "ann" } })).await?;

    assert_query!(
        db.model("Video")
            .create(json!({ "data": { "name": "intro", "ownerId": 1, "duration": 60 } })),
        { "id": 1, "kind": "Video", "name": "intro", "ownerId": 1, "duration": 60 }
    );

    assert_eq!(1, runner.row_count("Asset").await?);
    assert_eq!(1, runner.row_count("Video").await?);

    Ok(())
}

#[tokio::test]
async fn bases_read_with_the_fields_of_the_concrete_type() -> TestResult {
    let runner = owner_with_video().await?;
    let db = runner.db();

    assert_query!(
        db.model("Asset").find_many(json!({})),
        [{ "id": 1, "kind": "Video", "name": "intro", "ownerId": 1, "duration": 60 }]
    );

    assert_query!(
        db.model("Video").find_many(json!({ "where": { "name": "intro" } })),
        [{ "id": 1, "kind": "Video", "name": "intro", "ownerId": 1, "duration": 60 }]
    );

    assert_query!(
        db.model("Owner").find_unique(json!({ "where": { "id": 1 }, "include": { "assets": true } })),
        {
            "id": 1,
            "name": "ann",
            "assets": [{ "id": 1, "kind": "Video", "name": "intro", "ownerId": 1, "duration": 60 }]
        }
    );

    Ok(())
}

#[tokio::test]
async fn updates_write_inherited_and_own_fields() -> TestResult {
    let runner = owner_with_video().await?;
    let db = runner.db();

    assert_query!(
        db.model("Video")
            .update(json!({ "where": { "id": 1 }, "data": { "name": "outro", "duration": 90 } })),
        { "id": 1, "kind": "Video", "name": "outro", "ownerId": 1, "duration": 90 }
    );

    assert_query!(
        db.model("Asset").find_unique(json!({ "where": { "id": 1 }, "select": { "name": true } })),
        { "name": "outro" }
    );

    Ok(())
}

#[tokio::test]
async fn deleting_a_base_removes_the_concrete_row() -> TestResult {
    let runner = owner_with_video().await?;
    let db = runner.db();

    db.model("Video")
        .create(json!({ "data": { "name": "trailer", "ownerId": 1, "duration": 30 } }))
        .await?;

    db.model("Asset").delete(json!({ "where": { "id": 1 } })).await?;

    assert_eq!(1, runner.row_count("Asset").await?);
    assert_eq!(1, runner.row_count("Video").await?);

    db.model("Video").delete(json!({ "where": { "id": 2 } })).await?;

    assert_eq!(0, runner.row_count("Asset").await?);
    assert_eq!(0, runner.row_count("Video").await?);

    Ok(())
}

#[tokio::test]
async fn bases_and_discriminators_are_not_written_directly() -> TestResult {
    let runner = owner_with_video().await?;
    let db = runner.db();

    let err = expect_err(db.model("Asset").create(json!({ "data": { "name": "x", "ownerId": 1 } })).await);
    assert_eq!(ErrorKind::InvalidInput, err.kind());

    let err = expect_err(
        db.model("Video")
            .update(json!({ "where": { "id": 1 }, "data": { "kind": "Image" } }))
            .await,
    );
    assert_eq!(ErrorKind::InvalidInput, err.kind());

    assert_eq!(1, runner.row_count("Video").await?);

    Ok(())
}
