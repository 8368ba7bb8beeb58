use bastion_tests::*;
use serde_json::json;

/// `alice` is in the public group `staff` and the private group `board`.
async fn alice_in_two_groups() -> anyhow::Result<Runner> {
    let runner = Runner::load(schemas::users_and_groups()).await?;
    let db = runner.db();

    db.model("Group").create(json!({ "data": { "name": "staff" } })).await?;
    db.model("Group").create(json!({ "data": { "name": "board", "private": true } })).await?;

    db.model("User")
        .create(json!({
            "data": {
                "name": "alice",
                "groups": { "connect": [{ "id": 1 }, { "id": 2 }] }
            }
        }))
        .await?;

    Ok(runner)
}

#[tokio::test]
async fn links_are_stored_in_the_join_table() -> TestResult {
    let runner = alice_in_two_groups().await?;

    assert_eq!(2, runner.row_count("_GroupToUser").await?);

    Ok(())
}

#[tokio::test]
async fn hidden_groups_are_left_out_of_nested_reads() -> TestResult {
    let runner = alice_in_two_groups().await?;
    let db = runner.anonymous();

    assert_query!(
        db.model("User").find_unique(json!({
            "where": { "id": 1 },
            "select": {
                "name": true,
                "groups": { "select": { "name": true } },
                "_count": { "select": { "groups": true } }
            }
        })),
        {
            "name": "alice",
            "groups": [{ "name": "staff" }],
            "_count": { "groups": 1 }
        }
    );

    Ok(())
}

#[tokio::test]
async fn the_unrestricted_client_sees_every_group() -> TestResult {
    let runner = alice_in_two_groups().await?;

    assert_query!(
        runner.db().model("User").find_unique(json!({
            "where": { "id": 1 },
            "select": { "_count": { "select": { "groups": true } } }
        })),
        { "_count": { "groups": 2 } }
    );

    Ok(())
}

#[tokio::test]
async fn relation_filters_only_match_visible_groups() -> TestResult {
    let runner = alice_in_two_groups().await?;
    let db = runner.anonymous();

    assert_query!(
        db.model("User").find_many(json!({
            "where": { "groups": { "some": { "name": "board" } } },
            "select": { "name": true }
        })),
        []
    );

    assert_query!(
        db.model("User").find_many(json!({
            "where": { "groups": { "some": { "name": "staff" } } },
            "select": { "name": true }
        })),
        [{ "name": "alice" }]
    );

    Ok(())
}

#[tokio::test]
async fn the_other_side_only_lists_visible_groups() -> TestResult {
    let runner = alice_in_two_groups().await?;
    let db = runner.anonymous();

    assert_query!(
        db.model("Group").find_many(json!({
            "orderBy": { "id": "asc" },
            "select": { "name": true, "users": { "select": { "name": true } } }
        })),
        [{ "name": "staff", "users": [{ "name": "alice" }] }]
    );

    Ok(())
}
