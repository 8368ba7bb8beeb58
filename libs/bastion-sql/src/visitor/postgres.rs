use crate::{
    ast::*,
    visitor::{self, Visitor},
};
use std::fmt::{self, Write};

/// A visitor to generate queries for the PostgreSQL database.
///
/// Placeholders are numbered, `$1` being the first returned parameter.
pub struct Postgres {
    query: String,
    parameters: Vec<Value>,
}

impl Visitor for Postgres {
    const C_BACKTICK_OPEN: &'static str = "\"";
    const C_BACKTICK_CLOSE: &'static str = "\"";

    fn build<Q>(query: Q) -> crate::Result<(String, Vec<Value>)>
    where
        Q: Into<Query>,
    {
        let mut postgres = Postgres {
            query: String::with_capacity(4096),
            parameters: Vec::with_capacity(128),
        };

        Postgres::visit_query(&mut postgres, query.into())?;

        Ok((postgres.query, postgres.parameters))
    }

    fn write<D: fmt::Display>(&mut self, s: D) -> visitor::Result {
        write!(&mut self.query, "{s}")?;
        Ok(())
    }

    fn add_parameter(&mut self, value: Value) {
        self.parameters.push(value);
    }

    fn parameter_substitution(&mut self) -> visitor::Result {
        let position = self.parameters.len();
        self.write(format!("${position}"))
    }

    fn visit_limit_and_offset(&mut self, limit: Option<i64>, offset: Option<i64>) -> visitor::Result {
        if let Some(limit) = limit {
            self.write(" LIMIT ")?;
            self.visit_parameterized(Value::Int(limit))?;
        }

        if let Some(offset) = offset {
            self.write(" OFFSET ")?;
            self.visit_parameterized(Value::Int(offset))?;
        }

        Ok(())
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

    fn visit_distinct(&mut self, distinct: DistinctType) -> visitor::Result {
        match distinct {
            DistinctType::Default => self.write("DISTINCT "),
            DistinctType::OnClause(exprs) => {
                self.write("DISTINCT ON ")?;
                self.visit_row(exprs)?;
                self.write(" ")
            }
        }
    }

    fn visit_like(&mut self, left: Expression, right: Expression, options: LikeOptions) -> visitor::Result {
        self.visit_expression(left)?;

        let op = match (options.insensitive, options.negated) {
            (false, false) => " LIKE ",
            (false, true) => " NOT LIKE ",
            (true, false) => " ILIKE ",
            (true, true) => " NOT ILIKE ",
        };

        self.write(op)?;
        self.visit_expression(right)?;
        self.write(" ESCAPE '\\'")
    }

    fn visit_json_object(&mut self, pairs: Vec<(String, Expression)>) -> visitor::Result {
        self.write("JSONB_BUILD_OBJECT(")?;
        self.visit_json_pairs(pairs)?;
        self.write(")")
    }

    fn visit_json_array_agg(&mut self, expr: Expression) -> visitor::Result {
        self.write("JSONB_AGG(")?;
        self.visit_expression(expr)?;
        self.write(")")
    }

    fn visit_json_array_empty(&mut self) -> visitor::Result {
        self.write("'[]'::jsonb")
    }

    fn visit_json_extract(&mut self, expr: Expression, path: Vec<String>, as_text: bool) -> visitor::Result {
        self.write("(")?;
        self.visit_expression(expr)?;

        if as_text {
            self.write(" #>> ")?;
        } else {
            self.write(" #> ")?;
        }

        self.write("ARRAY[")?;
        let len = path.len();

        for (i, segment) in path.into_iter().enumerate() {
            self.visit_parameterized(Value::String(segment))?;

            if i < (len - 1) {
                self.write(", ")?;
            }
        }

        self.write("]::text[])")
    }

    fn visit_json_parse(&mut self, expr: Expression) -> visitor::Result {
        self.write("(")?;
        self.visit_expression(expr)?;
        self.write(")::jsonb")
    }

    fn visit_encode_bytes(&mut self, expr: Expression) -> visitor::Result {
        self.write("ENCODE(")?;
        self.visit_expression(expr)?;
        self.write(", 'base64')")
    }

    fn visit_list_has(&mut self, list: Expression, mut values: Vec<Expression>, quantifier: ListQuantifier) -> visitor::Result {
        match quantifier {
            ListQuantifier::Some if values.len() == 1 => {
                self.visit_expression(values.remove(0))?;
                self.write(" = ANY(")?;
                self.visit_expression(list)?;
                self.write(")")
            }
            ListQuantifier::Some => {
                self.visit_expression(list)?;
                self.write(" && ARRAY[")?;
                self.visit_array_elements(values)?;
                self.write("]")
            }
            ListQuantifier::Every => {
                self.visit_expression(list)?;
                self.write(" @> ARRAY[")?;
                self.visit_array_elements(values)?;
                self.write("]")
            }
        }
    }

    fn visit_list_is_empty(&mut self, list: Expression, empty: bool) -> visitor::Result {
        self.write("COALESCE(CARDINALITY(")?;
        self.visit_expression(list)?;

        if empty {
            self.write("), 0) = 0")
        } else {
            self.write("), 0) > 0")
        }
    }
}

impl Postgres {
    fn visit_array_elements(&mut self, values: Vec<Expression>) -> visitor::Result {
        let len = values.len();

        for (i, value) in values.into_iter().enumerate() {
            self.visit_expression(value)?;

            if i < (len - 1) {
                self.write(", ")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{ast::*, visitor::*};
    use pretty_assertions::assert_eq;

    #[test]
    fn parameters_are_numbered() {
        let query = Select::from_table("User")
            .so_that(Column::from("a").equals(val(1)).and(Column::from("b").equals(val(2))))
            .limit(10)
            .offset(5);

        let (sql, params) = Postgres::build(query).unwrap();

        assert_eq!(
            r#"SELECT * FROM "User" WHERE ("a" = $1 AND "b" = $2) LIMIT $3 OFFSET $4"#,
            sql
        );
        assert_eq!(4, params.len());
    }

    #[test]
    fn distinct_on() {
        let query = Select::from_table("User").distinct_on(vec![Column::from("name").into()]);
        let (sql, _) = Postgres::build(query).unwrap();

        assert_eq!(r#"SELECT DISTINCT ON ("name") * FROM "User""#, sql);
    }

    #[test]
    fn insensitive_like_is_ilike() {
        let options = LikeOptions {
            insensitive: true,
            negated: false,
        };

        let query = Select::from_table("User").so_that(Column::from("name").like(val("%a%"), options));
        let (sql, _) = Postgres::build(query).unwrap();

        assert_eq!(r#"SELECT * FROM "User" WHERE "name" ILIKE $1 ESCAPE '\'"#, sql);
    }

    #[test]
    fn lateral_join_with_jsonb() {
        let child = Table::from("Post").alias("t0$posts");
        let agg = Select::from_table(child.clone())
            .value(
                Expression::from(coalesce([
                    Expression::from(json_array_agg(json_object(vec![("id".into(), child.column("id").into())]))),
                    Expression::from(json_array_empty()),
                ]))
                .alias("__json"),
            )
            .so_that(child.column("authorId").equals(Column::from("id").table("t0")));

        let join = Table::from(agg).alias("t0$posts").on(ConditionTree::NoCondition).lateral();
        let query = Select::from_table(Table::from("User").alias("t0"))
            .value(Column::from("__json").table("t0$posts").alias("posts"))
            .left_join(join);

        let (sql, _) = Postgres::build(query).unwrap();

        assert_eq!(
            r#"SELECT "t0$posts"."__json" AS "posts" FROM "User" AS "t0" LEFT JOIN LATERAL (SELECT COALESCE(JSONB_AGG(JSONB_BUILD_OBJECT('id', "t0$posts"."id")), '[]'::jsonb) AS "__json" FROM "Post" AS "t0$posts" WHERE "t0$posts"."authorId" = "t0"."id") AS "t0$posts" ON 1=1"#,
            sql
        );
    }

    #[test]
    fn list_membership() {
        let query = Select::from_table("A").so_that(Column::from("tags").list_has(vec![val("a"), val("b")], ListQuantifier::Every));
        let (sql, params) = Postgres::build(query).unwrap();

        assert_eq!(r#"SELECT * FROM "A" WHERE "tags" @> ARRAY[$1, $2]"#, sql);
        assert_eq!(2, params.len());
    }
}
