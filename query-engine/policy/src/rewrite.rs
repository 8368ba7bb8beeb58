use crate::{compiler::PolicyCompiler, Result};
use bastion_core::{CrudError, RejectionReason};
use bastion_sql::{ast::*, walk::*};
use bastion_sql_query_builder::{select_model, Alias};

/// Replaces every table read by a statement with the rows of it the
/// principal may read:
///
/// ```sql
/// SELECT .. FROM User AS u
/// -- becomes
/// SELECT .. FROM (SELECT User$@policy.* FROM User AS User$@policy WHERE <read policy>) AS u
/// ```
///
/// The table written by an insert, update or delete is left alone; those
/// are guarded separately.
pub(crate) struct ReadFilter<'a> {
    compiler: PolicyCompiler<'a>,
}

impl<'a> ReadFilter<'a> {
    pub(crate) fn new(compiler: PolicyCompiler<'a>) -> Self {
        Self { compiler }
    }

    fn readable_rows(&self, name: &str) -> Result<Option<Select>> {
        let schema = self.compiler.schema();

        if let Some(model) = schema.model_by_table(name) {
            let alias = Alias::new(name).derived("policy");
            let condition = self.compiler.policy(model, bastion_schema::PolicyOperation::Read, &alias)?;

            if condition.is_no_condition() {
                return Ok(None);
            }

            let select = select_model(self.compiler.context(), model, &alias)?
                .value(table_asterisk(&alias))
                .so_that(condition);

            return Ok(Some(select));
        }

        // Link rows are as visible as the records on both ends.
        if schema.join_table_relation(name).is_some() {
            return Ok(None);
        }

        tracing::debug!(table = name, "read of a table outside of the schema rejected");

        Err(CrudError::rejected(name, RejectionReason::NoAccess))
    }
}

impl VisitMut for ReadFilter<'_> {
    type Error = CrudError;

    fn visit_table_mut(&mut self, table: &mut Table) -> Result<()> {
        let Some(name) = table.name().map(ToOwned::to_owned) else {
            return walk_table(self, table);
        };

        if let Some(filtered) = self.readable_rows(&name)? {
            let alias = table.alias.clone().unwrap_or(name);
            *table = Table::from(filtered).alias(alias);
        }

        Ok(())
    }
}
