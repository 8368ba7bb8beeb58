use bastion_core::RejectionReason;
use bastion_tests::*;
use serde_json::json;

/// `alice` (1) wrote a draft (1) and a published post (2), `bob` (2) a
/// draft (3).
async fn blog() -> anyhow::Result<Runner> {
    let runner = Runner::load(schemas::blog()).await?;
    let db = runner.db();

    db.model("User").create(json!({ "data": { "email": "alice@example.com", "name": "alice" } })).await?;
    db.model("User").create(json!({ "data": { "email": "bob@example.com", "name": "bob" } })).await?;

    for (title, published, author) in [("draft", false, 1), ("hello", true, 1), ("notes", false, 2)] {
        db.model("Post")
            .create(json!({ "data": { "title": title, "published": published, "authorId": author } }))
            .await?;
    }

    Ok(runner)
}

fn post_ids() -> serde_json::Value {
    json!({ "orderBy": { "id": "asc" }, "select": { "id": true } })
}

#[tokio::test]
async fn anonymous_readers_only_see_published_posts() -> TestResult {
    let runner = blog().await?;

    assert_query!(runner.anonymous().model("Post").find_many(post_ids()), [{ "id": 2 }]);

    Ok(())
}

#[tokio::test]
async fn authors_also_see_their_drafts() -> TestResult {
    let runner = blog().await?;

    assert_query!(
        runner.enhanced(json!({ "id": 1 })).model("Post").find_many(post_ids()),
        [{ "id": 1 }, { "id": 2 }]
    );
    assert_query!(
        runner.enhanced(json!({ "id": 2 })).model("Post").find_many(post_ids()),
        [{ "id": 2 }, { "id": 3 }]
    );

    Ok(())
}

#[tokio::test]
async fn nested_reads_apply_the_rules_of_the_related_model() -> TestResult {
    let runner = blog().await?;

    assert_query!(
        runner.anonymous().model("User").find_many(json!({
            "orderBy": { "id": "asc" },
            "select": { "name": true, "posts": { "select": { "title": true } } }
        })),
        [
            { "name": "alice", "posts": [{ "title": "hello" }] },
            { "name": "bob", "posts": [] }
        ]
    );

    Ok(())
}

#[tokio::test]
async fn posts_of_others_cannot_be_updated() -> TestResult {
    let runner = blog().await?;
    let bob = runner.enhanced(json!({ "id": 2 }));

    // visible but not updatable
    assert_not_found(
        bob.model("Post")
            .update(json!({ "where": { "id": 2 }, "data": { "title": "mine now" } }))
            .await,
    );

    // not even visible
    assert_not_found(
        bob.model("Post")
            .update(json!({ "where": { "id": 1 }, "data": { "title": "mine now" } }))
            .await,
    );

    assert_query!(bob.model("Post").update_many(json!({ "data": { "title": "renamed" } })), { "count": 1 });

    assert_query!(
        runner.db().model("Post").find_many(json!({ "orderBy": { "id": "asc" }, "select": { "title": true } })),
        [{ "title": "draft" }, { "title": "hello" }, { "title": "renamed" }]
    );

    Ok(())
}

#[tokio::test]
async fn authors_update_their_posts() -> TestResult {
    let runner = blog().await?;
    let alice = runner.enhanced(json!({ "id": 1 }));

    assert_query!(
        alice.model("Post").update(json!({
            "where": { "id": 1 },
            "data": { "title": "final", "published": true },
            "select": { "title": true, "published": true }
        })),
        { "title": "final", "published": true }
    );

    Ok(())
}

#[tokio::test]
async fn handing_a_post_over_is_rolled_back() -> TestResult {
    let runner = blog().await?;
    let alice = runner.enhanced(json!({ "id": 1 }));

    assert_rejected(
        alice
            .model("Post")
            .update(json!({ "where": { "id": 1 }, "data": { "author": { "connect": { "id": 2 } } } }))
            .await,
        RejectionReason::NoAccess,
    );

    assert_query!(
        runner.db().model("Post").find_unique(json!({ "where": { "id": 1 }, "select": { "authorId": true } })),
        { "authorId": 1 }
    );

    Ok(())
}

#[tokio::test]
async fn published_posts_cannot_be_deleted() -> TestResult {
    let runner = blog().await?;
    let alice = runner.enhanced(json!({ "id": 1 }));

    assert_not_found(alice.model("Post").delete(json!({ "where": { "id": 2 } })).await);

    assert_query!(
        alice.model("Post").delete(json!({ "where": { "id": 1 }, "select": { "title": true } })),
        { "title": "draft" }
    );

    assert_eq!(2, runner.row_count("Post").await?);

    Ok(())
}

#[tokio::test]
async fn posts_cannot_be_created_for_someone_else() -> TestResult {
    let runner = blog().await?;
    let alice = runner.enhanced(json!({ "id": 1 }));

    assert_rejected(
        alice
            .model("Post")
            .create(json!({ "data": { "title": "forged", "authorId": 2 } }))
            .await,
        RejectionReason::NoAccess,
    );

    assert_rejected(
        runner
            .anonymous()
            .model("Post")
            .create(json!({ "data": { "title": "anonymous", "authorId": 1 } }))
            .await,
        RejectionReason::NoAccess,
    );

    assert_eq!(3, runner.row_count("Post").await?);

    Ok(())
}

#[tokio::test]
async fn nested_creates_are_checked_like_top_level_ones() -> TestResult {
    let runner = blog().await?;
    let alice = runner.enhanced(json!({ "id": 1 }));

    alice
        .model("User")
        .update(json!({ "where": { "id": 1 }, "data": { "posts": { "create": { "title": "nested" } } } }))
        .await?;

    assert_query!(
        runner.db().model("Post").count(json!({ "where": { "authorId": 1 } })),
        3
    );

    // the post would belong to `alice`
    assert_rejected(
        runner
            .enhanced(json!({ "id": 2 }))
            .model("User")
            .update(json!({ "where": { "id": 1 }, "data": { "posts": { "create": { "title": "sneaky" } } } }))
            .await,
        RejectionReason::NoAccess,
    );

    assert_eq!(4, runner.row_count("Post").await?);

    Ok(())
}
