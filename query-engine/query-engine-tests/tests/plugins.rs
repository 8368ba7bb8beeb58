use async_trait::async_trait;
use bastion_core::{
    CrudError, CrudNext, CrudRequest, ErrorKind, Operation, Plugin, QueryResult, RejectionReason, SqlContext, SqlNext,
};
use bastion_policy::PolicyPlugin;
use bastion_sql::ast::{asterisk, Query, Select};
use bastion_tests::*;
use bastion_value::Value;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

struct Recorder {
    name: &'static str,
    log: Log,
}

impl Recorder {
    fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Arc::clone(log),
        }
    }

    fn record(&self, event: &str) {
        self.log.lock().unwrap().push(format!("{}:{event}", self.name));
    }
}

#[async_trait]
impl Plugin for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    async fn on_query(&self, request: CrudRequest, next: CrudNext<'_>) -> Result<Value, CrudError> {
        self.record("before");
        let result = next.run(request).await;
        self.record("after");

        result
    }

    async fn on_sql_query(
        &self,
        ctx: &SqlContext<'_>,
        query: Query,
        next: SqlNext<'_>,
    ) -> Result<QueryResult, CrudError> {
        self.record("sql");
        next.run(ctx, query).await
    }
}

/// Answers `count` without asking the database.
struct FixedCount;

#[async_trait]
impl Plugin for FixedCount {
    fn name(&self) -> &str {
        "fixed-count"
    }

    async fn on_query(&self, request: CrudRequest, next: CrudNext<'_>) -> Result<Value, CrudError> {
        match request.operation {
            Operation::Count => Ok(Value::Int(42)),
            _ => next.run(request).await,
        }
    }
}

/// Restricts `findMany` to rows with `x > 1` and accepts an `audit` flag.
struct OnlyLarge;

#[async_trait]
impl Plugin for OnlyLarge {
    fn name(&self) -> &str {
        "only-large"
    }

    fn extra_argument_keys(&self, operation: Operation) -> Vec<String> {
        match operation {
            Operation::FindMany => vec!["audit".to_owned()],
            _ => Vec::new(),
        }
    }

    async fn on_query(&self, mut request: CrudRequest, next: CrudNext<'_>) -> Result<Value, CrudError> {
        if request.operation == Operation::FindMany {
            request.args["where"] = json!({ "x": { "gt": 1 } });
        }

        next.run(request).await
    }
}

async fn three_foos() -> anyhow::Result<Runner> {
    let runner = Runner::load(schemas::foo()).await?;

    for (id, x) in [(1, 1), (2, 2), (3, 3)] {
        runner.db().model("Foo").create(json!({ "data": { "id": id, "x": x } })).await?;
    }

    Ok(runner)
}

#[tokio::test]
async fn the_first_plugin_is_the_outermost_layer() -> TestResult {
    let runner = three_foos().await?;
    let log = Log::default();

    let db = runner
        .db()
        .with_plugin(Recorder::new("a", &log))
        .with_plugin(Recorder::new("b", &log));

    db.model("Foo").find_many(json!({})).await?;

    assert_eq!(
        vec!["a:before", "b:before", "a:sql", "b:sql", "b:after", "a:after"],
        *log.lock().unwrap()
    );

    Ok(())
}

#[tokio::test]
async fn a_plugin_can_answer_without_the_database() -> TestResult {
    let runner = three_foos().await?;
    let db = runner.db().with_plugin(FixedCount);

    assert_query!(db.model("Foo").count(json!({})), 42);
    assert_query!(runner.db().model("Foo").count(json!({})), 3);

    Ok(())
}

#[tokio::test]
async fn a_plugin_can_rewrite_arguments() -> TestResult {
    let runner = three_foos().await?;
    let db = runner.db().with_plugin(OnlyLarge);

    assert_query!(
        db.model("Foo").find_many(json!({ "orderBy": { "id": "asc" }, "audit": true })),
        [{ "id": 2, "x": 2 }, { "id": 3, "x": 3 }]
    );

    let err = expect_err(
        runner
            .db()
            .model("Foo")
            .find_many(json!({ "audit": true }))
            .await,
    );
    assert_eq!(ErrorKind::InvalidInput, err.kind());

    Ok(())
}

#[tokio::test]
async fn deriving_a_client_leaves_the_original_alone() -> TestResult {
    let runner = Runner::load(schemas::notes()).await?;
    runner.db().model("Secret").create(json!({ "data": { "value": "v" } })).await?;

    let enhanced = runner.enhanced(json!({ "id": 1 }));

    assert!(runner.db().plugins().is_empty());
    assert!(runner.db().auth().is_none());
    assert_eq!(1, enhanced.plugins().len());

    assert_query!(enhanced.model("Secret").count(json!({})), 0);
    assert_query!(runner.db().model("Secret").count(json!({})), 1);

    Ok(())
}

#[tokio::test]
async fn direct_queries_pass_through_the_plugins() -> TestResult {
    let runner = Runner::load(schemas::notes()).await?;
    runner.db().model("Secret").create(json!({ "data": { "value": "v" } })).await?;

    let all_secrets = || Select::from_table("Secret").value(asterisk());

    assert_eq!(1, runner.db().execute_query(all_secrets()).await?.rows.len());
    assert_eq!(0, runner.anonymous().execute_query(all_secrets()).await?.rows.len());

    let raw = Query::Raw("SELECT * FROM Secret".to_owned(), Vec::new());
    assert_rejected(runner.anonymous().execute_query(raw).await, RejectionReason::NoAccess);

    let catalog = Select::from_table("sqlite_master").value(asterisk());
    assert_rejected(runner.anonymous().execute_query(catalog).await, RejectionReason::NoAccess);

    Ok(())
}

#[tokio::test]
async fn policies_apply_below_other_plugins() -> TestResult {
    let runner = three_foos().await?;
    let log = Log::default();

    let db = runner
        .db()
        .with_plugin(Recorder::new("outer", &log))
        .with_plugin(PolicyPlugin::new());

    assert_not_found(db.model("Foo").delete(json!({ "where": { "id": 1 } })).await);

    let log = log.lock().unwrap();
    assert_eq!(Some("outer:before"), log.first().map(String::as_str));
    assert_eq!(Some("outer:after"), log.last().map(String::as_str));

    Ok(())
}
