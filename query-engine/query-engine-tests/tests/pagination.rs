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
async fn cursors_start_at_the_named_record() -> TestResult {
    let runner = library().await?;
    let book = runner.db().model("Book");

    assert_query!(
        book.find_many(json!({ "cursor": { "id": 2 }, "take": 2, "orderBy": { "id": "asc" }, "select": { "id": true } })),
        [{ "id": 2 }, { "id": 3 }]
    );

    assert_query!(
        book.find_many(json!({
            "cursor": { "id": 2 },
            "skip": 1,
            "take": 2,
            "orderBy": { "id": "asc" },
            "select": { "id": true }
        })),
        [{ "id": 3 }, { "id": 4 }]
    );

    assert_query!(
        book.find_many(json!({ "cursor": { "title": "delta" }, "take": -2, "orderBy": { "id": "asc" }, "select": { "id": true } })),
        [{ "id": 3 }, { "id": 4 }]
    );

    Ok(())
}

#[tokio::test]
async fn distinct_keeps_the_first_record_of_each_value() -> TestResult {
    let runner = library().await?;

    assert_query!(
        runner.db().model("Book").find_many(json!({
            "distinct": ["genre"],
            "orderBy": { "id": "asc" },
            "select": { "title": true, "genre": true }
        })),
        [{ "title": "alpha", "genre": "fiction" }, { "title": "gamma", "genre": "poetry" }]
    );

    Ok(())
}

#[tokio::test]
async fn omitted_fields_are_left_out() -> TestResult {
    let runner = library().await?;

    assert_query!(
        runner
            .db()
            .model("Book")
            .find_unique(json!({ "where": { "id": 1 }, "omit": { "genre": true, "pages": true } })),
        { "id": 1, "title": "alpha", "authorId": 1 }
    );

    Ok(())
}

#[tokio::test]
async fn related_records_are_ordered_and_paginated() -> TestResult {
    let runner = library().await?;

    assert_query!(
        runner.db().model("Author").find_unique(json!({
            "where": { "id": 1 },
            "select": {
                "name": true,
                "books": { "orderBy": { "pages": "desc" }, "take": 2, "select": { "title": true } }
            }
        })),
        { "name": "ann", "books": [{ "title": "beta" }, { "title": "alpha" }] }
    );

    assert_query!(
        runner.db().model("Author").find_many(json!({
            "orderBy": { "id": "asc" },
            "select": {
                "id": true,
                "books": { "where": { "genre": "poetry" }, "skip": 0, "take": 1, "select": { "pages": true } }
            }
        })),
        [{ "id": 1, "books": [{ "pages": 50 }] }, { "id": 2, "books": [{ "pages": 150 }] }]
    );

    Ok(())
}
