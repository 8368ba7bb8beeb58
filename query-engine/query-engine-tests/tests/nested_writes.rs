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

fn titles_of(author: i64) -> serde_json::Value {
    json!({
        "where": { "authorId": author },
        "orderBy": { "id": "asc" },
        "select": { "title": true }
    })
}

#[tokio::test]
async fn set_replaces_every_related_record() -> TestResult {
    let runner = library().await?;
    let db = runner.db();

    db.model("Author")
        .update(json!({ "where": { "id": 1 }, "data": { "books": { "set": [{ "id": 4 }, { "title": "omega" }] } } }))
        .await?;

    assert_query!(db.model("Book").find_many(titles_of(1)), [{ "title": "delta" }, { "title": "omega" }]);
    assert_query!(db.model("Book").count(json!({ "where": { "authorId": null } })), 3);

    db.model("Author")
        .update(json!({ "where": { "id": 1 }, "data": { "books": { "set": [] } } }))
        .await?;

    assert_query!(db.model("Book").count(json!({ "where": { "authorId": null } })), 5);

    Ok(())
}

#[tokio::test]
async fn disconnect_unlinks_the_named_records() -> TestResult {
    let runner = library().await?;
    let db = runner.db();

    db.model("Author")
        .update(json!({ "where": { "id": 1 }, "data": { "books": { "disconnect": [{ "id": 1 }, { "id": 3 }] } } }))
        .await?;

    assert_query!(db.model("Book").find_many(titles_of(1)), [{ "title": "beta" }]);
    assert_eq!(5, runner.row_count("Book").await?);

    Ok(())
}

#[tokio::test]
async fn nested_upserts_update_or_create() -> TestResult {
    let runner = library().await?;
    let db = runner.db();

    db.model("Author")
        .update(json!({
            "where": { "id": 1 },
            "data": {
                "books": {
                    "upsert": [
                        {
                            "where": { "id": 2 },
                            "create": { "title": "unused", "genre": "fiction", "pages": 1 },
                            "update": { "pages": 250 }
                        },
                        {
                            "where": { "id": 4 },
                            "create": { "title": "zeta", "genre": "poetry", "pages": 10 },
                            "update": { "pages": 1 }
                        }
                    ]
                }
            }
        }))
        .await?;

    assert_query!(
        db.model("Book").find_many(json!({ "where": { "authorId": 1 }, "orderBy": { "id": "asc" } })),
        [
            { "id": 1, "title": "alpha", "genre": "fiction", "pages": 100, "authorId": 1 },
            { "id": 2, "title": "beta", "genre": "fiction", "pages": 250, "authorId": 1 },
            { "id": 3, "title": "gamma", "genre": "poetry", "pages": 50, "authorId": 1 },
            { "id": 6, "title": "zeta", "genre": "poetry", "pages": 10, "authorId": 1 }
        ]
    );

    // Book 4 belongs to someone else and is left alone.
    assert_query!(
        db.model("Book").find_unique(json!({ "where": { "id": 4 }, "select": { "pages": true } })),
        { "pages": 150 }
    );

    Ok(())
}

#[tokio::test]
async fn update_many_and_delete_many_stay_within_the_relation() -> TestResult {
    let runner = library().await?;
    let db = runner.db();

    db.model("Author")
        .update(json!({
            "where": { "id": 1 },
            "data": {
                "books": {
                    "updateMany": { "where": { "genre": "fiction" }, "data": { "pages": { "increment": 1 } } },
                    "deleteMany": { "genre": "poetry" }
                }
            }
        }))
        .await?;

    assert_query!(
        db.model("Book").find_many(json!({ "orderBy": { "id": "asc" }, "select": { "title": true, "pages": true } })),
        [
            { "title": "alpha", "pages": 101 },
            { "title": "beta", "pages": 201 },
            { "title": "delta", "pages": 150 },
            { "title": "omega", "pages": 300 }
        ]
    );

    Ok(())
}
