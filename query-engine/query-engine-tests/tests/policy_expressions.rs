use async_trait::async_trait;
use bastion_core::{CrudError, ExpressionFunction, Plugin};
use bastion_sql::ast::{generic_function, Expression};
use bastion_tests::*;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

/// Provides `shout(text)` to policy expressions.
struct Shout;

#[async_trait]
impl Plugin for Shout {
    fn name(&self) -> &str {
        "shout"
    }

    fn functions(&self) -> Vec<(String, ExpressionFunction)> {
        let shout: ExpressionFunction = Arc::new(|args: Vec<Expression>| {
            if args.len() != 1 {
                return Err(CrudError::internal("`shout` takes one argument"));
            }

            Ok(generic_function("upper", args).into())
        });

        vec![("shout".to_owned(), shout)]
    }
}

async fn create_all(runner: &Runner, model: &str, rows: Vec<JsonValue>) -> anyhow::Result<()> {
    for data in rows {
        runner.db().model(model).create(json!({ "data": data })).await?;
    }

    Ok(())
}

fn ids() -> JsonValue {
    json!({ "orderBy": { "id": "asc" }, "select": { "id": true } })
}

#[tokio::test]
async fn collection_predicates_look_at_related_rows() -> TestResult {
    let runner = Runner::load(schemas::expressions()).await?;

    create_all(&runner, "Project", vec![json!({ "name": "a" }), json!({ "name": "b" }), json!({ "name": "c" })]).await?;
    create_all(
        &runner,
        "Task",
        vec![
            json!({ "projectId": 1, "done": true }),
            json!({ "projectId": 1, "done": false }),
            json!({ "projectId": 2, "done": false }),
        ],
    )
    .await?;

    assert_query!(runner.anonymous().model("Project").find_many(ids()), [{ "id": 1 }]);

    Ok(())
}

#[tokio::test]
async fn auth_members_are_compared_as_constants() -> TestResult {
    let runner = Runner::load(schemas::expressions()).await?;
    create_all(&runner, "Board", vec![json!({ "level": 1 }), json!({ "level": 5 }), json!({ "level": 9 })]).await?;

    let board = |auth: JsonValue| runner.enhanced(auth).model("Board").find_many(ids());

    assert_query!(board(json!({ "role": "admin" })), [{ "id": 1 }, { "id": 2 }, { "id": 3 }]);
    assert_query!(board(json!({ "role": "user", "level": 5 })), [{ "id": 1 }, { "id": 2 }]);
    assert_query!(board(json!({ "role": "user" })), []);
    assert_query!(board(JsonValue::Null), []);

    Ok(())
}

#[tokio::test]
async fn text_and_list_predicates() -> TestResult {
    let runner = Runner::load(schemas::expressions()).await?;

    create_all(
        &runner,
        "Article",
        vec![
            json!({ "title": "50% off", "tags": [] }),
            json!({ "title": "500 items", "tags": [] }),
            json!({ "title": "plain", "tags": ["public", "news"] }),
            json!({ "title": "other", "tags": ["internal"] }),
        ],
    )
    .await?;

    assert_query!(
        runner.anonymous().model("Article").find_many(json!({
            "orderBy": { "id": "asc" },
            "select": { "title": true }
        })),
        [{ "title": "50% off" }, { "title": "plain" }]
    );

    Ok(())
}

#[tokio::test]
async fn plugins_provide_policy_functions() -> TestResult {
    let runner = Runner::load(schemas::expressions()).await?;
    create_all(
        &runner,
        "Stamp",
        vec![json!({ "label": "hello" }), json!({ "label": "Hello" }), json!({ "label": "bye" })],
    )
    .await?;

    let db = runner.anonymous().with_plugin(Shout);
    assert_query!(db.model("Stamp").find_many(ids()), [{ "id": 1 }, { "id": 2 }]);

    let err = expect_err(runner.anonymous().model("Stamp").find_many(ids()).await);
    assert!(err.to_string().contains("shout"), "{err}");

    Ok(())
}
