use crate::{
    ast::*,
    visitor::{self, json_path, Visitor},
};
use std::fmt::{self, Write};

/// A visitor to generate queries for the SQLite database.
///
/// The returned parameter values can be used directly with the bundled
/// `rusqlite` connector.
pub struct Sqlite {
    query: String,
    parameters: Vec<Value>,
}

impl Visitor for Sqlite {
    const C_BACKTICK_OPEN: &'static str = "`";
    const C_BACKTICK_CLOSE: &'static str = "`";

    fn build<Q>(query: Q) -> crate::Result<(String, Vec<Value>)>
    where
        Q: Into<Query>,
    {
        let mut sqlite = Sqlite {
            query: String::with_capacity(4096),
            parameters: Vec::with_capacity(128),
        };

        Sqlite::visit_query(&mut sqlite, query.into())?;

        Ok((sqlite.query, sqlite.parameters))
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
                self.write(" LIMIT ")?;
                self.visit_parameterized(Value::Int(-1))?;

                self.write(" OFFSET ")?;
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
        self.write("INSERT INTO ")?;

        if insert.columns.is_empty() {
            self.visit_table(insert.table, false)?;
            self.write(" DEFAULT VALUES")?;
        } else {
            self.visit_insert_body(&mut insert)?;

            if let Some(OnConflict::DoNothing) = insert.on_conflict {
                self.write(" ON CONFLICT DO NOTHING")?;
            }
        }

        self.visit_returning(insert.returning)
    }

    fn visit_json_object(&mut self, pairs: Vec<(String, Expression)>) -> visitor::Result {
        self.write("json_object(")?;
        self.visit_json_pairs(pairs)?;
        self.write(")")
    }

    fn visit_json_array_agg(&mut self, expr: Expression) -> visitor::Result {
        self.write("json_group_array(")?;
        self.visit_expression(expr)?;
        self.write(")")
    }

    fn visit_json_array_empty(&mut self) -> visitor::Result {
        self.write("json('[]')")
    }

    fn visit_json_extract(&mut self, expr: Expression, path: Vec<String>, as_text: bool) -> visitor::Result {
        if as_text {
            self.write("json_extract(")?;
            self.visit_expression(expr)?;
            self.write(", ")?;
            self.visit_parameterized(Value::String(json_path(&path)))?;
            self.write(")")
        } else {
            self.write("(")?;
            self.visit_expression(expr)?;
            self.write(" -> ")?;
            self.visit_parameterized(Value::String(json_path(&path)))?;
            self.write(")")
        }
    }

    fn visit_json_parse(&mut self, expr: Expression) -> visitor::Result {
        self.write("json(")?;
        self.visit_expression(expr)?;
        self.write(")")
    }

    fn visit_encode_bytes(&mut self, expr: Expression) -> visitor::Result {
        self.write("hex(")?;
        self.visit_expression(expr)?;
        self.write(")")
    }

    // Lists are stored as JSON arrays.
    fn visit_list_has(&mut self, list: Expression, values: Vec<Expression>, quantifier: ListQuantifier) -> visitor::Result {
        match quantifier {
            ListQuantifier::Some => {
                self.write("EXISTS (SELECT 1 FROM json_each(")?;
                self.visit_expression(list)?;
                self.write(") WHERE json_each.value IN ")?;
                self.visit_row(values)?;
                self.write(")")
            }
            ListQuantifier::Every if values.is_empty() => self.write("1=1"),
            ListQuantifier::Every => {
                self.write("(")?;
                let len = values.len();

                for (i, value) in values.into_iter().enumerate() {
                    self.write("EXISTS (SELECT 1 FROM json_each(")?;
                    self.visit_expression(list.clone())?;
                    self.write(") WHERE json_each.value = ")?;
                    self.visit_expression(value)?;
                    self.write(")")?;

                    if i < (len - 1) {
                        self.write(" AND ")?;
                    }
                }

                self.write(")")
            }
        }
    }

    fn visit_list_is_empty(&mut self, list: Expression, empty: bool) -> visitor::Result {
        self.write("COALESCE(json_array_length(")?;
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
    fn select_star_from() {
        let (sql, params) = Sqlite::build(Select::from_table("musti")).unwrap();

        assert_eq!("SELECT * FROM `musti`", sql);
        assert!(params.is_empty());
    }

    #[test]
    fn select_with_conditions_and_pagination() {
        let table = Table::from("User").alias("t0");
        let query = Select::from_table(table.clone())
            .column(table.column("id"))
            .so_that(table.column("age").greater_than(val(18)).and(table.column("name").is_not_null()))
            .order_by(table.column("id").descend())
            .offset(10);

        let (sql, params) = Sqlite::build(query).unwrap();

        assert_eq!(
            "SELECT `t0`.`id` FROM `User` AS `t0` WHERE (`t0`.`age` > ? AND `t0`.`name` IS NOT NULL) ORDER BY `t0`.`id` DESC LIMIT ? OFFSET ?",
            sql
        );
        assert_eq!(vec![Value::Int(18), Value::Int(-1), Value::Int(10)], params);
    }

    #[test]
    fn equality_with_null_becomes_is_null() {
        let query = Select::from_table("a").so_that(Column::from("b").equals(Value::Null));
        let (sql, params) = Sqlite::build(query).unwrap();

        assert_eq!("SELECT * FROM `a` WHERE `b` IS NULL", sql);
        assert!(params.is_empty());
    }

    #[test]
    fn empty_in_list_is_false() {
        let query = Select::from_table("a").so_that(Column::from("b").in_selection(values_row(vec![])));
        let (sql, _) = Sqlite::build(query).unwrap();

        assert_eq!("SELECT * FROM `a` WHERE 1=0", sql);
    }

    #[test]
    fn like_escapes_with_backslash() {
        let options = LikeOptions::default();
        let query = Select::from_table("a").so_that(Column::from("b").like(val("%x\\%%"), options));
        let (sql, _) = Sqlite::build(query).unwrap();

        assert_eq!("SELECT * FROM `a` WHERE `b` LIKE ? ESCAPE '\\'", sql);
    }

    #[test]
    fn json_aggregation_in_scalar_subquery() {
        let inner = Table::from("Post").alias("t0$posts");
        let agg = Select::from_table(inner.clone()).value(json_array_agg(json_object(vec![
            ("id".into(), inner.column("id").into()),
            ("title".into(), inner.column("title").into()),
        ])));

        let query = Select::from_table("User").value(Expression::from(agg).alias("posts"));
        let (sql, _) = Sqlite::build(query).unwrap();

        assert_eq!(
            "SELECT (SELECT json_group_array(json_object('id', `t0$posts`.`id`, 'title', `t0$posts`.`title`)) FROM `Post` AS `t0$posts`) AS `posts` FROM `User`",
            sql
        );
    }

    #[test]
    fn insert_default_values_and_returning() {
        let (sql, _) = Sqlite::build(Insert::single_into("Foo").returning(["id"])).unwrap();
        assert_eq!("INSERT INTO `Foo` DEFAULT VALUES RETURNING `id`", sql);

        let insert = Insert::multi_into("Foo", ["a", "b"])
            .values([val(1), val(2)])
            .values([val(3), val(4)])
            .on_conflict(OnConflict::DoNothing);

        let (sql, params) = Sqlite::build(insert).unwrap();

        assert_eq!(
            "INSERT INTO `Foo` (`a`, `b`) VALUES (?, ?), (?, ?) ON CONFLICT DO NOTHING",
            sql
        );
        assert_eq!(4, params.len());
    }

    #[test]
    fn update_with_arithmetic() {
        let update = Update::table("Foo")
            .set("x", SqlOp::add(Column::from("x"), val(1)))
            .so_that(Column::from("id").equals(val(5)));

        let (sql, params) = Sqlite::build(update).unwrap();

        assert_eq!("UPDATE `Foo` SET `x` = (`x` + ?) WHERE `id` = ?", sql);
        assert_eq!(vec![Value::Int(1), Value::Int(5)], params);
    }

    #[test]
    fn list_filters_use_json_each() {
        let query = Select::from_table("a").so_that(Column::from("tags").list_has(vec![val("x")], ListQuantifier::Some));
        let (sql, _) = Sqlite::build(query).unwrap();

        assert_eq!(
            "SELECT * FROM `a` WHERE EXISTS (SELECT 1 FROM json_each(`tags`) WHERE json_each.value IN (?))",
            sql
        );
    }

    #[test]
    fn identifiers_are_escaped() {
        let (sql, _) = Sqlite::build(Select::from_table("we`ird")).unwrap();
        assert_eq!("SELECT * FROM `we``ird`", sql);
    }
}
