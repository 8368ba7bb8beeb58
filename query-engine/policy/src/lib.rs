//! Row-level access control for a [`bastion_core::Client`].
//!
//! The [`PolicyPlugin`] sits in the statement chain of a client and rewrites
//! every statement before it reaches the database, so that reads only see,
//! and writes only touch, the rows the `@@allow`/`@@deny` rules of their
//! model admit for the current `auth()` principal:
//!
//! - every table a statement reads from is replaced by a derived table of
//!   its readable rows, including tables of nested subqueries;
//! - updates and deletes get the update/delete policy added to their
//!   `WHERE` clause;
//! - inserted rows are checked against the create policy before the insert
//!   runs, and rejected as a whole if one of them fails;
//! - updates of models with `post-update` rules run in a transaction and are
//!   rolled back unless every updated row passes the rules afterwards.
//!
//! ```no_run
//! # async fn demo(schema: bastion_schema::Schema) -> Result<(), bastion_core::CrudError> {
//! use bastion_core::Client;
//! use bastion_policy::PolicyPlugin;
//! use serde_json::json;
//!
//! let db = Client::connect(schema, "sqlite::memory:")?;
//! let user_db = db.with_plugin(PolicyPlugin::new()).with_auth(json!({ "id": 1 }));
//!
//! let posts = user_db.model("Post").find_many(json!({})).await?;
//! # Ok(())
//! # }
//! ```

mod compiler;
mod mutation;
mod rewrite;

use async_trait::async_trait;
use bastion_core::{CrudError, Plugin, QueryResult, RejectionReason, SqlContext, SqlNext};
use bastion_schema::{ModelDef, PolicyOperation};
use bastion_sql::{
    ast::{Query, Table},
    walk::VisitMut,
};
use compiler::PolicyCompiler;
use mutation::{check_insert, check_post_update, guard_delete, guard_update, target_of, updated_ids, Target};
use rewrite::ReadFilter;

type Result<T> = std::result::Result<T, CrudError>;

#[derive(Debug, Default, Clone)]
pub struct PolicyPlugin;

impl PolicyPlugin {
    pub fn new() -> Self {
        Self
    }

    /// The model of an update whose rows must pass `post-update` rules.
    fn post_update_model<'a>(compiler: &PolicyCompiler<'a>, table: &Table) -> Option<&'a ModelDef> {
        match target_of(compiler, table) {
            Target::Model(model) if model.has_rules_for(PolicyOperation::PostUpdate) => Some(model),
            _ => None,
        }
    }
}

#[async_trait]
impl Plugin for PolicyPlugin {
    fn name(&self) -> &str {
        "policy"
    }

    fn requires_transaction(&self, query: &Query, ctx: &SqlContext<'_>) -> bool {
        let Query::Update(update) = query else {
            return false;
        };

        let compiler = PolicyCompiler::new(ctx.builder(), ctx.auth, ctx.functions);
        Self::post_update_model(&compiler, &update.table).is_some()
    }

    async fn on_sql_query(
        &self,
        ctx: &SqlContext<'_>,
        mut query: Query,
        next: SqlNext<'_>,
    ) -> Result<QueryResult> {
        let compiler = PolicyCompiler::new(ctx.builder(), ctx.auth, ctx.functions);

        if let Query::Raw(..) = query {
            tracing::debug!("raw statement rejected by policy");
            return Err(CrudError::rejected("raw query", RejectionReason::NoAccess));
        }

        ReadFilter::new(compiler).visit_query_mut(&mut query)?;

        match query {
            Query::Insert(insert) => {
                check_insert(&compiler, ctx, &insert).await?;
                next.run(ctx, Query::Insert(insert)).await
            }
            Query::Update(update) => {
                let post_update = Self::post_update_model(&compiler, &update.table);
                let update = guard_update(&compiler, *update)?;

                let Some(model) = post_update else {
                    return next.run(ctx, Query::from(update)).await;
                };

                let ids = updated_ids(&compiler, ctx, model, &update).await?;
                let result = next.run(ctx, Query::from(update)).await?;

                check_post_update(&compiler, ctx, model, &ids).await?;

                Ok(result)
            }
            Query::Delete(delete) => {
                let delete = guard_delete(&compiler, *delete)?;
                next.run(ctx, Query::from(delete)).await
            }
            query => next.run(ctx, query).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_core::ExpressionFunction;
    use bastion_schema::Schema;
    use bastion_sql::{ast::*, visitor::{Sqlite, Visitor}};
    use bastion_sql_query_builder::{dialect_for, ComputedFields, Context};
    use bastion_value::Value;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn schema() -> Schema {
        Schema::from_json(indoc! {r#"
            {
              "provider": "sqlite",
              "models": {
                "User": {
                  "fields": {
                    "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                    "role": { "type": "String", "default": "user" },
                    "posts": { "type": "Post", "array": true, "relation": { "opposite": "author" } }
                  },
                  "policies": [
                    { "kind": "allow", "operations": ["read"], "condition": { "kind": "literal", "value": true } }
                  ]
                },
                "Post": {
                  "fields": {
                    "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                    "published": { "type": "Boolean", "default": false },
                    "authorId": { "type": "Int" },
                    "author": {
                      "type": "User",
                      "relation": { "fields": ["authorId"], "references": ["id"], "opposite": "posts" }
                    }
                  },
                  "policies": [
                    {
                      "kind": "allow",
                      "operations": ["read"],
                      "condition": {
                        "kind": "binary",
                        "op": "==",
                        "left": { "kind": "field", "name": "published" },
                        "right": { "kind": "literal", "value": true }
                      }
                    },
                    {
                      "kind": "allow",
                      "operations": ["update"],
                      "condition": {
                        "kind": "call",
                        "function": "check",
                        "args": [{ "kind": "field", "name": "author" }, { "kind": "literal", "value": "read" }]
                      }
                    }
                  ]
                },
                "Secret": {
                  "fields": {
                    "id": { "type": "Int", "id": true }
                  }
                },
                "Draft": {
                  "fields": {
                    "id": { "type": "Int", "id": true },
                    "archivedAt": { "type": "DateTime", "optional": true }
                  },
                  "policies": [
                    {
                      "kind": "allow",
                      "operations": ["read"],
                      "condition": {
                        "kind": "binary",
                        "op": "==",
                        "left": { "kind": "field", "name": "archivedAt" },
                        "right": { "kind": "literal", "value": null }
                      }
                    }
                  ]
                }
              }
            }
        "#})
        .unwrap()
    }

    fn rewrite(schema: &Schema, auth: Option<&Value>, query: impl Into<Query>) -> String {
        let computed = ComputedFields::default();
        let functions: HashMap<String, ExpressionFunction> = HashMap::new();
        let ctx = Context::new(schema, dialect_for(bastion_sql::connector::Provider::Sqlite), &computed);
        let compiler = PolicyCompiler::new(ctx, auth, &functions);

        let mut query = query.into();
        ReadFilter::new(compiler).visit_query_mut(&mut query).unwrap();

        let query = match query {
            Query::Update(update) => Query::from(guard_update(&compiler, *update).unwrap()),
            query => query,
        };

        Sqlite::build(query).unwrap().0
    }

    #[test]
    fn readable_tables_without_conditions_stay_untouched() {
        let schema = schema();
        let sql = rewrite(&schema, None, Select::from_table("User").value(asterisk()));

        assert_eq!("SELECT * FROM `User`", sql);
    }

    #[test]
    fn tables_are_replaced_with_their_readable_rows() {
        let schema = schema();
        let sql = rewrite(
            &schema,
            None,
            Select::from_table(Table::from("Post").alias("p")).value(asterisk()),
        );

        assert_eq!(
            "SELECT * FROM (SELECT `Post$@policy`.* FROM `Post` AS `Post$@policy` WHERE `Post$@policy`.`published` = ?) AS `p`",
            sql
        );
    }

    #[test]
    fn models_without_read_rules_read_nothing() {
        let schema = schema();
        let sql = rewrite(&schema, None, Select::from_table("Secret").value(asterisk()));

        assert_eq!(
            "SELECT * FROM (SELECT `Secret$@policy`.* FROM `Secret` AS `Secret$@policy` WHERE 1=0) AS `Secret`",
            sql
        );
    }

    #[test]
    fn comparisons_with_null_become_null_checks() {
        let schema = schema();
        let sql = rewrite(&schema, None, Select::from_table("Draft").value(asterisk()));

        assert_eq!(
            "SELECT * FROM (SELECT `Draft$@policy`.* FROM `Draft` AS `Draft$@policy` WHERE `Draft$@policy`.`archivedAt` IS NULL) AS `Draft`",
            sql
        );
    }

    #[test]
    fn reads_of_tables_outside_of_the_schema_are_rejected() {
        let schema = schema();
        let computed = ComputedFields::default();
        let functions = HashMap::new();
        let ctx = Context::new(&schema, dialect_for(bastion_sql::connector::Provider::Sqlite), &computed);
        let compiler = PolicyCompiler::new(ctx, None, &functions);

        let mut query = Query::from(Select::from_table("sqlite_master").value(asterisk()));

        let err = ReadFilter::new(compiler).visit_query_mut(&mut query).unwrap_err();

        assert_eq!(Some(RejectionReason::NoAccess), err.rejection_reason());
    }

    #[test]
    fn updates_are_restricted_by_the_related_policy() {
        let schema = schema();
        let update = Update::table("Post")
            .set(Column::new("published"), val(true))
            .so_that(Column::new("id").table("Post").equals(val(1)));

        let sql = rewrite(&schema, None, update);

        assert_eq!(
            "UPDATE `Post` SET `published` = ? WHERE (`Post`.`id` = ? AND EXISTS (SELECT 1 FROM `User` AS `Post$author` WHERE `Post`.`authorId` = `Post$author`.`id`))",
            sql
        );
    }

    #[test]
    fn updates_of_tables_outside_of_the_schema_are_rejected() {
        let schema = schema();
        let computed = ComputedFields::default();
        let functions = HashMap::new();
        let ctx = Context::new(&schema, dialect_for(bastion_sql::connector::Provider::Sqlite), &computed);
        let compiler = PolicyCompiler::new(ctx, None, &functions);

        let err = guard_update(&compiler, Update::table("Audit").set(Column::new("seen"), val(true))).unwrap_err();

        assert_eq!(Some(RejectionReason::NoAccess), err.rejection_reason());
    }
}
