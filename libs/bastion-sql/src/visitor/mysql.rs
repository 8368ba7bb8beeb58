use crate::{
    ast::*,
    error::ErrorKind,
    visitor::{self, json_path, Visitor},
};
use std::fmt::{self, Write};

/// A visitor to generate queries for the MySQL database.
///
/// MySQL has no `RETURNING`; inserted ids are read from `last_insert_id`.
pub struct Mysql {
    query: String,
    parameters: Vec<Value>,
}

impl Visitor for Mysql {
    const C_BACKTICK_OPEN: &'static str = "`";
    const C_BACKTICK_CLOSE: &'static str = "`";

    fn build<Q>(query: Q) -> crate::Result<(String, Vec<Value>)>
    where
        Q: Into<Query>,
    {
        let mut mysql = Mysql {
            query: String::with_capacity(4096),
            parameters: Vec::with_capacity(128),
        };

        Mysql::visit_query(&mut mysql, query.into())?;

        Ok((mysql.query, mysql.parameters))
    }

    fn write<D: fmt::Display>(&mut self, s: D) -> visitor::Result {
        write!(&mut self.query, "{s}")?;
        Ok(())
    }

    fn add_parameter(&mut self, value: Value) {
        self.parameters.push(value);
    }

    fn parameter_substitution(&mut self) -> visitor::Result {
        self.write("?")
    }

    fn visit_limit_and_offset(&mut self, limit: Option<i64>, offset: Option<i64>) -> visitor::Result {
        match (limit, offset) {
            (Some(limit), Some(offset)) => {
                self.write(" LIMIT ")?;
                self.visit_parameterized(Value::Int(limit))?;

                self.write(" OFFSET ")?;
                self.visit_parameterized(Value::Int(offset))
            }
            (None, Some(offset)) => {
                self.write(" LIMIT 18446744073709551615 OFFSET ")?;
                self.visit_parameterized(Value::Int(offset))
            }
            (Some(limit), None) => {
                self.write(" LIMIT ")?;
                self.visit_parameterized(Value::Int(limit))
            }
            (None, None) => Ok(()),
        }
    }

    fn visit_insert(&mut self, mut insert: Insert) -> visitor::Result {
        if insert.returning.is_some() {
            return Err(ErrorKind::VisitorError("MySQL does not support RETURNING".into()).into());
        }

        match insert.on_conflict {
            Some(OnConflict::DoNothing) => self.write("INSERT IGNORE INTO ")?,
            None => self.write("INSERT INTO ")?,
        }

        if insert.columns.is_empty() {
            self.visit_table(insert.table, false)?;
            self.write(" () VALUES ()")
        } else {
            self.visit_insert_body(&mut insert)
        }
    }

    fn visit_returning(&mut self, returning: Option<Vec<Column>>) -> visitor::Result {
        match returning {
            Some(_) => Err(ErrorKind::VisitorError("MySQL does not support RETURNING".into()).into()),
            None => Ok(()),
        }
    }

    // The default escape character of MySQL is already the backslash, and
    // case-insensitivity follows the column collation.
    fn visit_like(&mut self, left: Expression, right: Expression, options: LikeOptions) -> visitor::Result {
        self.visit_expression(left)?;

        if options.negated {
            self.write(" NOT LIKE ")?;
        } else {
            self.write(" LIKE ")?;
        }

        self.visit_expression(right)
    }

    fn visit_string_literal(&mut self, s: &str) -> visitor::Result {
        self.write(format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''")))
    }

    // MySQL sorts nulls first when ascending and last when descending, other
    // placements are emulated with an `IS NULL` sort key.
    fn visit_order_definition(&mut self, value: Expression, order: Option<Order>) -> visitor::Result {
        match order {
            Some(Order::AscNullsLast) => {
                self.visit_expression(value.clone())?;
                self.write(" IS NULL ASC, ")?;
                self.visit_expression(value)?;
                self.write(" ASC")
            }
            Some(Order::DescNullsFirst) => {
                self.visit_expression(value.clone())?;
                self.write(" IS NULL DESC, ")?;
                self.visit_expression(value)?;
                self.write(" DESC")
            }
            Some(Order::Asc | Order::AscNullsFirst) => {
                self.visit_expression(value)?;
                self.write(" ASC")
            }
            Some(Order::Desc | Order::DescNullsLast) => {
                self.visit_expression(value)?;
                self.write(" DESC")
            }
            None => self.visit_expression(value),
        }
    }

    fn visit_json_object(&mut self, pairs: Vec<(String, Expression)>) -> visitor::Result {
        self.write("JSON_OBJECT(")?;
        self.visit_json_pairs(pairs)?;
        self.write(")")
    }

    fn visit_json_array_agg(&mut self, expr: Expression) -> visitor::Result {
        self.write("JSON_ARRAYAGG(")?;
        self.visit_expression(expr)?;
        self.write(")")
    }

    fn visit_json_array_empty(&mut self) -> visitor::Result {
        self.write("JSON_ARRAY()")
    }

    fn visit_json_extract(&mut self, expr: Expression, path: Vec<String>, as_text: bool) -> visitor::Result {
        if as_text {
            self.write("JSON_UNQUOTE(")?;
        }

        self.write("JSON_EXTRACT(")?;
        self.visit_expression(expr)?;
        self.write(", ")?;
        self.visit_parameterized(Value::String(json_path(&path)))?;
        self.write(")")?;

        if as_text {
            self.write(")")?;
        }

        Ok(())
    }

    fn visit_json_parse(&mut self, expr: Expression) -> visitor::Result {
        self.write("CAST(")?;
        self.visit_expression(expr)?;
        self.write(" AS JSON)")
    }

    fn visit_encode_bytes(&mut self, expr: Expression) -> visitor::Result {
        self.write("TO_BASE64(")?;
        self.visit_expression(expr)?;
        self.write(")")
    }

    // Lists are stored as JSON arrays.
    fn visit_list_has(&mut self, list: Expression, values: Vec<Expression>, quantifier: ListQuantifier) -> visitor::Result {
        match quantifier {
            ListQuantifier::Some => self.write("JSON_OVERLAPS(")?,
            ListQuantifier::Every => self.write("JSON_CONTAINS(")?,
        }

        self.visit_expression(list)?;
        self.write(", ")?;
        self.visit_call("JSON_ARRAY", values)?;
        self.write(")")
    }

    fn visit_list_is_empty(&mut self, list: Expression, empty: bool) -> visitor::Result {
        self.write("COALESCE(JSON_LENGTH(")?;
        self.visit_expression(list)?;

        if empty {
            self.write("), 0) = 0")
        } else {
            self.write("), 0) > 0")
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{ast::*, visitor::*};
    use pretty_assertions::assert_eq;

    #[test]
    fn offset_without_limit() {
        let (sql, params) = Mysql::build(Select::from_table("A").offset(3)).unwrap();

        assert_eq!("SELECT * FROM `A` LIMIT 18446744073709551615 OFFSET ?", sql);
        assert_eq!(vec![Value::Int(3)], params);
    }

    #[test]
    fn insert_ignore_and_defaults() {
        let (sql, _) = Mysql::build(Insert::single_into("A")).unwrap();
        assert_eq!("INSERT INTO `A` () VALUES ()", sql);

        let insert = Insert::multi_into("A", ["x"]).values([val(1)]).on_conflict(OnConflict::DoNothing);
        let (sql, _) = Mysql::build(insert).unwrap();
        assert_eq!("INSERT IGNORE INTO `A` (`x`) VALUES (?)", sql);
    }

    #[test]
    fn returning_is_rejected() {
        assert!(Mysql::build(Delete::from_table("A").returning(["id"])).is_err());
    }

    #[test]
    fn nulls_last_is_emulated() {
        let query = Select::from_table("A").order_by(Column::from("x").order(Some(Order::AscNullsLast)));
        let (sql, _) = Mysql::build(query).unwrap();

        assert_eq!("SELECT * FROM `A` ORDER BY `x` IS NULL ASC, `x` ASC", sql);
    }

    #[test]
    fn json_functions() {
        let query = Select::default().value(json_object(vec![("a".into(), val(1))])).value(json_array_empty());
        let (sql, _) = Mysql::build(query).unwrap();

        assert_eq!("SELECT JSON_OBJECT('a', ?), JSON_ARRAY()", sql);
    }
}
