//! Visitors for reading an abstract SQL syntax tree, generating the query and
//! gathering parameters in the right order.
//!
//! The visitor module should not know how to construct an AST, just how to read
//! one. Everything related to the tree generation is in the
//! [ast](../ast/index.html) module.
mod mysql;
mod postgres;
mod sqlite;

pub use self::mysql::Mysql;
pub use self::postgres::Postgres;
pub use self::sqlite::Sqlite;

use crate::{ast::*, connector::Provider, error::ErrorKind};
use std::fmt;

pub type Result = crate::Result<()>;

/// Renders the query with the visitor of the given provider.
pub fn build_for(provider: Provider, query: Query) -> crate::Result<(String, Vec<Value>)> {
    match provider {
        Provider::Sqlite => Sqlite::build(query),
        Provider::Postgres => Postgres::build(query),
        Provider::Mysql => Mysql::build(query),
    }
}

/// Formats a JSON path from object keys. Numeric segments index arrays.
pub(crate) fn json_path(path: &[String]) -> String {
    let mut out = String::from("$");

    for segment in path {
        match segment.parse::<usize>() {
            Ok(idx) => out.push_str(&format!("[{idx}]")),
            Err(_) => out.push_str(&format!(".\"{}\"", segment.replace('"', "\\\""))),
        }
    }

    out
}

/// A function travelling through the query AST, building the final query string
/// and gathering parameters sent to the database together with the query.
pub trait Visitor: Sized {
    /// Opening backtick character to surround identifiers, such as column and table names.
    const C_BACKTICK_OPEN: &'static str;
    /// Closing backtick character to surround identifiers, such as column and table names.
    const C_BACKTICK_CLOSE: &'static str;

    /// Convert the given `Query` to an SQL string and a vector of parameters.
    /// The vector holds the parameter values in placeholder order.
    fn build<Q>(query: Q) -> crate::Result<(String, Vec<Value>)>
    where
        Q: Into<Query>;

    /// Write to the query.
    fn write<D: fmt::Display>(&mut self, s: D) -> Result;

    /// Collects a value that is rendered as a placeholder.
    fn add_parameter(&mut self, value: Value);

    /// The placeholder of the last added parameter.
    fn parameter_substitution(&mut self) -> Result;

    /// Pagination, written the way the dialect accepts an offset without a limit.
    fn visit_limit_and_offset(&mut self, limit: Option<i64>, offset: Option<i64>) -> Result;

    /// A walk through an `INSERT` statement, including conflict handling.
    fn visit_insert(&mut self, insert: Insert) -> Result;

    fn visit_json_object(&mut self, pairs: Vec<(String, Expression)>) -> Result;

    fn visit_json_array_agg(&mut self, expr: Expression) -> Result;

    fn visit_json_array_empty(&mut self) -> Result;

    fn visit_json_extract(&mut self, expr: Expression, path: Vec<String>, as_text: bool) -> Result;

    fn visit_json_parse(&mut self, expr: Expression) -> Result;

    fn visit_encode_bytes(&mut self, expr: Expression) -> Result;

    fn visit_list_has(&mut self, list: Expression, values: Vec<Expression>, quantifier: ListQuantifier) -> Result;

    fn visit_list_is_empty(&mut self, list: Expression, empty: bool) -> Result;

    /// `LIKE` with backslash as the escape character. Case-insensitive matching
    /// relies on the default collation unless a dialect overrides this.
    fn visit_like(&mut self, left: Expression, right: Expression, options: LikeOptions) -> Result {
        self.visit_expression(left)?;

        if options.negated {
            self.write(" NOT LIKE ")?;
        } else {
            self.write(" LIKE ")?;
        }

        self.visit_expression(right)?;
        self.write(" ESCAPE '\\'")
    }

    fn visit_distinct(&mut self, distinct: DistinctType) -> Result {
        match distinct {
            DistinctType::Default => self.write("DISTINCT "),
            DistinctType::OnClause(_) => Err(ErrorKind::VisitorError("DISTINCT ON is not supported".into()).into()),
        }
    }

    fn visit_returning(&mut self, returning: Option<Vec<Column>>) -> Result {
        if let Some(columns) = returning {
            if !columns.is_empty() {
                self.write(" RETURNING ")?;

                for (i, column) in columns.into_iter().enumerate() {
                    if i > 0 {
                        self.write(", ")?;
                    }

                    self.delimited_identifiers(&[column.name.as_str()])?;
                }
            }
        }

        Ok(())
    }

    fn visit_order_definition(&mut self, value: Expression, order: Option<Order>) -> Result {
        self.visit_expression(value)?;

        match order {
            Some(Order::Asc) => self.write(" ASC"),
            Some(Order::Desc) => self.write(" DESC"),
            Some(Order::AscNullsFirst) => self.write(" ASC NULLS FIRST"),
            Some(Order::AscNullsLast) => self.write(" ASC NULLS LAST"),
            Some(Order::DescNullsFirst) => self.write(" DESC NULLS FIRST"),
            Some(Order::DescNullsLast) => self.write(" DESC NULLS LAST"),
            None => Ok(()),
        }
    }

    /// Writes a string literal. Only used for trusted strings such as JSON
    /// keys derived from field names.
    fn visit_string_literal(&mut self, s: &str) -> Result {
        self.write(format!("'{}'", s.replace('\'', "''")))
    }

    /// A walk through an `INSERT` statement's table, columns and rows.
    fn visit_insert_body(&mut self, insert: &mut Insert) -> Result {
        self.visit_table(insert.table.clone(), false)?;

        self.write(" (")?;
        for (i, column) in insert.columns.iter().enumerate() {
            if i > 0 {
                self.write(", ")?;
            }

            self.delimited_identifiers(&[column.name.as_str()])?;
        }
        self.write(") VALUES ")?;

        for (i, row) in std::mem::take(&mut insert.values).into_iter().enumerate() {
            if i > 0 {
                self.write(", ")?;
            }

            self.visit_row(row)?;
        }

        Ok(())
    }

    /// The join of identifiers, quoted and separated by dots.
    fn delimited_identifiers(&mut self, parts: &[&str]) -> Result {
        let len = parts.len();

        for (i, part) in parts.iter().enumerate() {
            let escaped = part.replace(Self::C_BACKTICK_CLOSE, &format!("{0}{0}", Self::C_BACKTICK_CLOSE));
            self.surround_with_backticks(&escaped)?;

            if i < (len - 1) {
                self.write(".")?;
            }
        }

        Ok(())
    }

    fn surround_with_backticks(&mut self, part: &str) -> Result {
        self.write(Self::C_BACKTICK_OPEN)?;
        self.write(part)?;
        self.write(Self::C_BACKTICK_CLOSE)?;
        Ok(())
    }

    fn surround_with<F>(&mut self, begin: &str, end: &str, f: F) -> Result
    where
        F: FnOnce(&mut Self) -> Result,
    {
        self.write(begin)?;
        f(self)?;
        self.write(end)
    }

    /// The point of entry for visiting query ASTs.
    fn visit_query(&mut self, query: Query) -> Result {
        match query {
            Query::Select(select) => self.visit_select(*select),
            Query::Insert(insert) => self.visit_insert(*insert),
            Query::Update(update) => self.visit_update(*update),
            Query::Delete(delete) => self.visit_delete(*delete),
            Query::Raw(sql, params) => {
                for param in params {
                    self.add_parameter(param);
                }

                self.write(sql)
            }
        }
    }

    /// A walk through a `SELECT` statement
    fn visit_select(&mut self, select: Select) -> Result {
        self.write("SELECT ")?;

        if let Some(distinct) = select.distinct {
            self.visit_distinct(distinct)?;
        }

        if select.columns.is_empty() {
            self.write("*")?;
        } else {
            self.visit_columns(select.columns)?;
        }

        if !select.tables.is_empty() {
            self.write(" FROM ")?;

            for (i, table) in select.tables.into_iter().enumerate() {
                if i > 0 {
                    self.write(", ")?;
                }

                self.visit_table(table, true)?;
            }

            if !select.joins.is_empty() {
                self.visit_joins(select.joins)?;
            }
        }

        if let Some(conditions) = select.conditions {
            if !conditions.is_no_condition() {
                self.write(" WHERE ")?;
                self.visit_conditions(conditions)?;
            }
        }

        if !select.grouping.is_empty() {
            self.write(" GROUP BY ")?;
            self.visit_grouping(select.grouping)?;
        }

        if let Some(having) = select.having {
            if !having.is_no_condition() {
                self.write(" HAVING ")?;
                self.visit_conditions(having)?;
            }
        }

        if !select.ordering.is_empty() {
            self.write(" ORDER BY ")?;
            self.visit_ordering(select.ordering)?;
        }

        self.visit_limit_and_offset(select.limit, select.offset)
    }

    /// A walk through an `UPDATE` statement
    fn visit_update(&mut self, update: Update) -> Result {
        self.write("UPDATE ")?;
        self.visit_table(update.table, false)?;
        self.write(" SET ")?;

        for (i, (column, value)) in update.columns.into_iter().zip(update.values).enumerate() {
            if i > 0 {
                self.write(", ")?;
            }

            self.delimited_identifiers(&[column.name.as_str()])?;
            self.write(" = ")?;
            self.visit_expression(value)?;
        }

        if let Some(conditions) = update.conditions {
            if !conditions.is_no_condition() {
                self.write(" WHERE ")?;
                self.visit_conditions(conditions)?;
            }
        }

        self.visit_returning(update.returning)
    }

    /// A walk through a `DELETE` statement
    fn visit_delete(&mut self, delete: Delete) -> Result {
        self.write("DELETE FROM ")?;
        self.visit_table(delete.table, false)?;

        if let Some(conditions) = delete.conditions {
            if !conditions.is_no_condition() {
                self.write(" WHERE ")?;
                self.visit_conditions(conditions)?;
            }
        }

        self.visit_returning(delete.returning)
    }

    /// A walk through a table, with the alias when `include_alias` is set.
    fn visit_table(&mut self, table: Table, include_alias: bool) -> Result {
        match table.typ {
            TableType::Table(name) => self.delimited_identifiers(&[name.as_str()])?,
            TableType::Query(select) => self.surround_with("(", ")", |s| s.visit_select(*select))?,
        }

        if include_alias {
            if let Some(alias) = table.alias {
                self.write(" AS ")?;
                self.delimited_identifiers(&[alias.as_str()])?;
            }
        }

        Ok(())
    }

    fn visit_joins(&mut self, joins: Vec<Join>) -> Result {
        for join in joins {
            let data = match join {
                Join::Inner(data) => {
                    self.write(" INNER JOIN ")?;
                    data
                }
                Join::Left(data) => {
                    self.write(" LEFT JOIN ")?;
                    data
                }
            };

            if data.lateral {
                self.write("LATERAL ")?;
            }

            self.visit_table(data.table, true)?;
            self.write(" ON ")?;
            self.visit_conditions(data.conditions)?;
        }

        Ok(())
    }

    /// A walk through the column expressions of a `SELECT`.
    fn visit_columns(&mut self, columns: Vec<Expression>) -> Result {
        let len = columns.len();

        for (i, column) in columns.into_iter().enumerate() {
            self.visit_expression(column)?;

            if i < (len - 1) {
                self.write(", ")?;
            }
        }

        Ok(())
    }

    fn visit_column(&mut self, column: Column) -> Result {
        match column.table {
            Some(table) => self.delimited_identifiers(&[table.as_str(), column.name.as_str()])?,
            None => self.delimited_identifiers(&[column.name.as_str()])?,
        }

        if let Some(alias) = column.alias {
            self.write(" AS ")?;
            self.delimited_identifiers(&[alias.as_str()])?;
        }

        Ok(())
    }

    fn visit_parameterized(&mut self, value: Value) -> Result {
        self.add_parameter(value);
        self.parameter_substitution()
    }

    /// A visit to a value used in an expression
    fn visit_expression(&mut self, value: Expression) -> Result {
        match value.kind {
            ExpressionKind::Column(column) => self.visit_column(*column)?,
            ExpressionKind::Parameterized(val) => self.visit_parameterized(val)?,
            ExpressionKind::Raw(sql) => self.write(sql)?,
            ExpressionKind::Asterisk(table) => match table {
                Some(table) => {
                    self.delimited_identifiers(&[table.as_str()])?;
                    self.write(".*")?;
                }
                None => self.write("*")?,
            },
            ExpressionKind::Selection(select) => self.surround_with("(", ")", |s| s.visit_select(*select))?,
            ExpressionKind::Row(row) => self.visit_row(row)?,
            ExpressionKind::Function(fun) => self.visit_function(*fun)?,
            ExpressionKind::Compare(compare) => self.visit_compare(*compare)?,
            ExpressionKind::ConditionTree(tree) => self.visit_conditions(*tree)?,
            ExpressionKind::Op(op) => self.visit_op(*op)?,
            ExpressionKind::Default => self.write("DEFAULT")?,
        }

        if let Some(alias) = value.alias {
            self.write(" AS ")?;
            self.delimited_identifiers(&[alias.as_str()])?;
        }

        Ok(())
    }

    fn visit_row(&mut self, row: Vec<Expression>) -> Result {
        self.write("(")?;
        let len = row.len();

        for (i, value) in row.into_iter().enumerate() {
            self.visit_expression(value)?;

            if i < (len - 1) {
                self.write(", ")?;
            }
        }

        self.write(")")
    }

    fn visit_op(&mut self, op: SqlOp) -> Result {
        let (left, sign, right) = match op {
            SqlOp::Add(l, r) => (l, "+", r),
            SqlOp::Sub(l, r) => (l, "-", r),
            SqlOp::Mul(l, r) => (l, "*", r),
            SqlOp::Div(l, r) => (l, "/", r),
        };

        self.write("(")?;
        self.visit_expression(left)?;
        self.write(format!(" {sign} "))?;
        self.visit_expression(right)?;
        self.write(")")
    }

    /// A walk through the query conditions
    fn visit_conditions(&mut self, tree: ConditionTree) -> Result {
        match tree {
            ConditionTree::And(expressions) => {
                if expressions.is_empty() {
                    return self.write("1=1");
                }

                self.write("(")?;
                let len = expressions.len();

                for (i, expr) in expressions.into_iter().enumerate() {
                    self.visit_expression(expr)?;

                    if i < (len - 1) {
                        self.write(" AND ")?;
                    }
                }

                self.write(")")
            }
            ConditionTree::Or(expressions) => {
                if expressions.is_empty() {
                    return self.write("1=0");
                }

                self.write("(")?;
                let len = expressions.len();

                for (i, expr) in expressions.into_iter().enumerate() {
                    self.visit_expression(expr)?;

                    if i < (len - 1) {
                        self.write(" OR ")?;
                    }
                }

                self.write(")")
            }
            ConditionTree::Not(expression) => {
                self.write("(NOT ")?;
                self.visit_expression(*expression)?;
                self.write(")")
            }
            ConditionTree::Single(expression) => self.visit_expression(*expression),
            ConditionTree::NoCondition => self.write("1=1"),
            ConditionTree::NegativeCondition => self.write("1=0"),
        }
    }

    /// A comparison expression
    fn visit_compare(&mut self, compare: Compare) -> Result {
        fn is_null(expr: &Expression) -> bool {
            matches!(expr.kind, ExpressionKind::Parameterized(Value::Null))
        }

        fn is_empty_row(expr: &Expression) -> bool {
            matches!(&expr.kind, ExpressionKind::Row(row) if row.is_empty())
        }

        match compare {
            Compare::Equals(left, right) if is_null(&right) => {
                self.visit_expression(*left)?;
                self.write(" IS NULL")
            }
            Compare::NotEquals(left, right) if is_null(&right) => {
                self.visit_expression(*left)?;
                self.write(" IS NOT NULL")
            }
            Compare::Equals(left, right) => self.visit_binary(*left, " = ", *right),
            Compare::NotEquals(left, right) => self.visit_binary(*left, " <> ", *right),
            Compare::LessThan(left, right) => self.visit_binary(*left, " < ", *right),
            Compare::LessThanOrEquals(left, right) => self.visit_binary(*left, " <= ", *right),
            Compare::GreaterThan(left, right) => self.visit_binary(*left, " > ", *right),
            Compare::GreaterThanOrEquals(left, right) => self.visit_binary(*left, " >= ", *right),
            Compare::In(_, right) if is_empty_row(&right) => self.write("1=0"),
            Compare::NotIn(_, right) if is_empty_row(&right) => self.write("1=1"),
            Compare::In(left, right) => self.visit_binary(*left, " IN ", *right),
            Compare::NotIn(left, right) => self.visit_binary(*left, " NOT IN ", *right),
            Compare::Like(left, right, options) => self.visit_like(*left, *right, options),
            Compare::Null(expr) => {
                self.visit_expression(*expr)?;
                self.write(" IS NULL")
            }
            Compare::NotNull(expr) => {
                self.visit_expression(*expr)?;
                self.write(" IS NOT NULL")
            }
            Compare::Exists(select) => {
                self.write("EXISTS ")?;
                self.surround_with("(", ")", |s| s.visit_select(*select))
            }
            Compare::NotExists(select) => {
                self.write("NOT EXISTS ")?;
                self.surround_with("(", ")", |s| s.visit_select(*select))
            }
            Compare::ListHas(list, values, quantifier) => self.visit_list_has(*list, values, quantifier),
            Compare::ListIsEmpty(list, empty) => self.visit_list_is_empty(*list, empty),
        }
    }

    fn visit_binary(&mut self, left: Expression, op: &str, right: Expression) -> Result {
        self.visit_expression(left)?;
        self.write(op)?;
        self.visit_expression(right)
    }

    fn visit_function(&mut self, fun: Function) -> Result {
        match fun {
            Function::Count(None) => self.write("COUNT(*)"),
            Function::Count(Some(expr)) => self.visit_call("COUNT", vec![*expr]),
            Function::Sum(expr) => self.visit_call("SUM", vec![*expr]),
            Function::Avg(expr) => self.visit_call("AVG", vec![*expr]),
            Function::Min(expr) => self.visit_call("MIN", vec![*expr]),
            Function::Max(expr) => self.visit_call("MAX", vec![*expr]),
            Function::Coalesce(exprs) => self.visit_call("COALESCE", exprs),
            Function::Lower(expr) => self.visit_call("LOWER", vec![*expr]),
            Function::JsonObject(pairs) => self.visit_json_object(pairs),
            Function::JsonArrayAgg(expr) => self.visit_json_array_agg(*expr),
            Function::JsonArrayEmpty => self.visit_json_array_empty(),
            Function::JsonExtract { expr, path, as_text } => self.visit_json_extract(*expr, path, as_text),
            Function::JsonParse(expr) => self.visit_json_parse(*expr),
            Function::EncodeBytes(expr) => self.visit_encode_bytes(*expr),
            Function::Cast { expr, sql_type } => {
                self.write("CAST(")?;
                self.visit_expression(*expr)?;
                self.write(format!(" AS {sql_type})"))
            }
            Function::Generic { name, args } => self.visit_call(&name, args),
        }
    }

    /// `name(arg1, arg2, ..)`
    fn visit_call(&mut self, name: &str, args: Vec<Expression>) -> Result {
        self.write(name)?;
        self.write("(")?;
        let len = args.len();

        for (i, arg) in args.into_iter().enumerate() {
            self.visit_expression(arg)?;

            if i < (len - 1) {
                self.write(", ")?;
            }
        }

        self.write(")")
    }

    /// Writes key-value pairs as `'key', value, ...`.
    fn visit_json_pairs(&mut self, pairs: Vec<(String, Expression)>) -> Result {
        let len = pairs.len();

        for (i, (key, value)) in pairs.into_iter().enumerate() {
            self.visit_string_literal(&key)?;
            self.write(", ")?;
            self.visit_expression(value)?;

            if i < (len - 1) {
                self.write(", ")?;
            }
        }

        Ok(())
    }

    fn visit_ordering(&mut self, ordering: Ordering) -> Result {
        let len = ordering.0.len();

        for (i, (value, order)) in ordering.0.into_iter().enumerate() {
            self.visit_order_definition(value, order)?;

            if i < (len - 1) {
                self.write(", ")?;
            }
        }

        Ok(())
    }

    fn visit_grouping(&mut self, grouping: Vec<Expression>) -> Result {
        let len = grouping.len();

        for (i, value) in grouping.into_iter().enumerate() {
            self.visit_expression(value)?;

            if i < (len - 1) {
                self.write(", ")?;
            }
        }

        Ok(())
    }
}
