use bastion_core::ErrorKind;
use bastion_tests::*;
use pretty_assertions::assert_eq;
use serde_json::json;

async fn library() -> anyhow::Result<Runner> {
    let runner = Runner::load(schemas::library()).await?;
    let db = runner.db();

    db.model("Author")
        .create_many(json!({ "data": [{ "name": "ann" }, { "name": "bob" }] }))
        .await?;
    db.model("Book").create_many(json!({ "data": schemas::books() })).await?;

    Ok(runner)
}

#[tokio::test]
async fn upsert_updates_an_existing_record() -> TestResult {
    let runner = library().await?;

    assert_query!(
        runner.db().model("Book").upsert(json!({
            "where": { "title": "alpha" },
            "create": { "title": "alpha", "genre": "drama", "pages": 1 },
            "update": { "pages": { "increment": 5 } }
        })),
        { "id": 1, "title": "alpha", "genre": "fiction", "pages": 105, "authorId": 1 }
    );

    assert_eq!(5, runner.row_count("Book").await?);

    Ok(())
}

#[tokio::test]
async fn upsert_creates_a_missing_record() -> TestResult {
    let runner = library().await?;

    assert_query!(
        runner.db().model("Book").upsert(json!({
            "where": { "title": "zeta" },
            "create": { "title": "zeta", "genre": "drama", "pages": 80, "author": { "connect": { "id": 2 } } },
            "update": { "pages": 1 },
            "select": { "id": true, "title": true, "author": { "select": { "name": true } } }
        })),
        { "id": 6, "title": "zeta", "author": { "name": "bob" } }
    );

    assert_eq!(6, runner.row_count("Book").await?);

    Ok(())
}

#[tokio::test]
async fn create_many_and_return_reads_the_new_records() -> TestResult {
    let runner = library().await?;

    assert_query!(
        runner.db().model("Book").create_many_and_return(json!({
            "data": [
                { "title": "eta", "genre": "drama", "pages": 10 },
                { "title": "theta", "genre": "drama", "pages": 20, "authorId": 2 }
            ],
            "select": { "title": true, "authorId": true }
        })),
        [{ "title": "eta", "authorId": null }, { "title": "theta", "authorId": 2 }]
    );

    Ok(())
}

#[tokio::test]
async fn skip_duplicates_leaves_existing_records_alone() -> TestResult {
    let runner = library().await?;
    let book = runner.db().model("Book");

    assert_query!(
        book.create_many(json!({
            "data": [
                { "title": "alpha", "genre": "drama", "pages": 1 },
                { "title": "eta", "genre": "drama", "pages": 10 }
            ],
            "skipDuplicates": true
        })),
        { "count": 1 }
    );

    assert_query!(
        book.create_many_and_return(json!({
            "data": [
                { "title": "beta", "genre": "drama", "pages": 1 },
                { "title": "theta", "genre": "drama", "pages": 20 }
            ],
            "skipDuplicates": true,
            "select": { "title": true, "pages": true }
        })),
        [{ "title": "theta", "pages": 20 }]
    );

    assert_query!(
        book.find_unique(json!({ "where": { "title": "alpha" }, "select": { "genre": true } })),
        { "genre": "fiction" }
    );

    Ok(())
}

#[tokio::test]
async fn duplicates_fail_the_whole_batch_without_skipping() -> TestResult {
    let runner = library().await?;

    let err = expect_err(
        runner
            .db()
            .model("Book")
            .create_many(json!({
                "data": [
                    { "title": "eta", "genre": "drama", "pages": 10 },
                    { "title": "alpha", "genre": "drama", "pages": 1 }
                ]
            }))
            .await,
    );

    assert_eq!(ErrorKind::DbQuery, err.kind());
    assert_eq!(5, runner.row_count("Book").await?);

    Ok(())
}
