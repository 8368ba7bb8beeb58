use bastion_tests::*;
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
async fn count_all_and_non_null_fields() -> TestResult {
    let runner = library().await?;
    let book = runner.db().model("Book");

    assert_query!(book.count(json!({})), 5);
    assert_query!(book.count(json!({ "where": { "genre": "fiction" } })), 3);
    assert_query!(
        book.count(json!({ "select": { "_all": true, "authorId": true } })),
        { "_all": 5, "authorId": 4 }
    );

    Ok(())
}

#[tokio::test]
async fn aggregate_over_every_function() -> TestResult {
    let runner = library().await?;
    let book = runner.db().model("Book");

    assert_query!(
        book.aggregate(json!({
            "_count": { "_all": true, "authorId": true },
            "_sum": { "pages": true },
            "_avg": { "pages": true },
            "_min": { "pages": true },
            "_max": { "pages": true }
        })),
        {
            "_count": { "_all": 5, "authorId": 4 },
            "_sum": { "pages": 800 },
            "_avg": { "pages": 160.0 },
            "_min": { "pages": 50 },
            "_max": { "pages": 300 }
        }
    );

    assert_query!(
        book.aggregate(json!({ "where": { "authorId": 1 }, "_count": true, "_sum": { "pages": true } })),
        { "_count": { "_all": 3 }, "_sum": { "pages": 350 } }
    );

    Ok(())
}

#[tokio::test]
async fn aggregates_of_no_rows() -> TestResult {
    let runner = library().await?;

    assert_query!(
        runner.db().model("Book").aggregate(json!({
            "where": { "genre": "drama" },
            "_count": { "_all": true },
            "_sum": { "pages": true }
        })),
        { "_count": { "_all": 0 }, "_sum": { "pages": null } }
    );

    Ok(())
}

#[tokio::test]
async fn group_by_with_aggregates() -> TestResult {
    let runner = library().await?;

    assert_query!(
        runner.db().model("Book").group_by(json!({
            "by": ["genre"],
            "_count": { "_all": true },
            "_sum": { "pages": true },
            "orderBy": { "genre": "asc" }
        })),
        [
            { "genre": "fiction", "_count": { "_all": 3 }, "_sum": { "pages": 600 } },
            { "genre": "poetry", "_count": { "_all": 2 }, "_sum": { "pages": 200 } }
        ]
    );

    Ok(())
}

#[tokio::test]
async fn groups_filtered_and_ordered_by_aggregates() -> TestResult {
    let runner = library().await?;
    let book = runner.db().model("Book");

    assert_query!(
        book.group_by(json!({
            "by": ["genre"],
            "_count": { "_all": true },
            "having": { "pages": { "_sum": { "gt": 300 } } }
        })),
        [{ "genre": "fiction", "_count": { "_all": 3 } }]
    );

    assert_query!(
        book.group_by(json!({
            "by": ["authorId"],
            "where": { "authorId": { "not": null } },
            "_max": { "pages": true },
            "orderBy": { "_max": { "pages": "asc" } }
        })),
        [
            { "authorId": 2, "_max": { "pages": 150 } },
            { "authorId": 1, "_max": { "pages": 200 } }
        ]
    );

    Ok(())
}
