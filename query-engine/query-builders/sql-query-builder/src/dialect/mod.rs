//! Provider specific parts of query building.
//!
//! A dialect is chosen once per client from the schema's provider. It owns
//! the relation nesting strategy and the mapping between logical values and
//! their stored form.

mod lateral;
mod sqlite;

pub use lateral::LateralDialect;
pub use sqlite::SqliteDialect;

use crate::{alias::Alias, context::Context, error::Result};
use bastion_query_structure::RelationSelection;
use bastion_schema::{FieldDef, ResolvedRelation, Schema};
use bastion_sql::{ast::*, connector::Provider};
use bastion_value::Value;
use std::fmt;

pub trait Dialect: Send + Sync + fmt::Debug {
    fn provider(&self) -> Provider;

    fn supports_distinct_on(&self) -> bool {
        false
    }

    fn supports_returning(&self) -> bool {
        true
    }

    /// The most bind parameters one statement may carry.
    fn max_bind_values(&self) -> usize;

    /// `LIKE` ignores case under the default collation.
    fn like_is_case_insensitive(&self) -> bool;

    /// `=` ignores case under the default collation.
    fn equality_is_case_insensitive(&self) -> bool {
        false
    }

    /// Adds the JSON value of a selected relation of the `parent` rows.
    /// Returns the select (with any joins the strategy needs) and the
    /// expression to read the value from.
    fn build_relation_selection(
        &self,
        ctx: &Context<'_>,
        select: Select,
        rel: &ResolvedRelation<'_>,
        selection: &RelationSelection,
        parent: &Alias,
    ) -> Result<(Select, Expression)>;

    /// The column value of `field` as embedded in a JSON object.
    fn json_column(&self, schema: &Schema, field: &FieldDef, expr: Expression) -> Expression;

    /// Whether the JSON array `doc` contains `value`.
    fn json_array_contains(&self, doc: Expression, value: serde_json::Value) -> ConditionTree;

    /// Converts a value written to (or compared with) `field` into its stored
    /// form.
    fn transform_primitive(&self, value: Value, field: &FieldDef) -> Value;

    /// The form of a value of `field` used for comparisons, sorting and
    /// `MIN`/`MAX`.
    fn comparable_expression(&self, _schema: &Schema, _field: &FieldDef, expr: Expression) -> Expression {
        expr
    }

    /// Converts one element of a list field for list membership tests.
    fn transform_element(&self, value: Value, field: &FieldDef) -> Value;

    /// The column type to cast an untyped parameter to, when the database
    /// can't infer it.
    fn sql_type(&self, schema: &Schema, field: &FieldDef) -> Option<&'static str>;

    /// Reads a result column of `field`.
    fn read_column(&self, schema: &Schema, field: &FieldDef, value: Value) -> Result<Value>;

    /// Reads the value of `field` from a JSON object built by the database.
    fn read_json_value(&self, schema: &Schema, field: &FieldDef, json: serde_json::Value) -> Result<Value>;
}

static SQLITE: SqliteDialect = SqliteDialect;
static POSTGRES: LateralDialect = LateralDialect::new(Provider::Postgres);
static MYSQL: LateralDialect = LateralDialect::new(Provider::Mysql);

pub fn dialect_for(provider: Provider) -> &'static dyn Dialect {
    match provider {
        Provider::Sqlite => &SQLITE,
        Provider::Postgres => &POSTGRES,
        Provider::Mysql => &MYSQL,
    }
}
