use crate::{dialect::Dialect, error::Result};
use bastion_schema::{ModelDef, ResolvedRelation, Schema};
use bastion_sql::{ast::Expression, connector::Provider};
use std::{collections::HashMap, fmt, sync::Arc};

/// Builds the SQL expression of a computed field for a row of the model
/// aliased as the given name.
pub type ComputedField = Arc<dyn Fn(&str) -> Expression + Send + Sync>;

/// Computed field implementations, keyed by model and field name.
#[derive(Clone, Default)]
pub struct ComputedFields {
    fields: HashMap<(String, String), ComputedField>,
}

impl ComputedFields {
    pub fn register<F>(&mut self, model: &str, field: &str, f: F)
    where
        F: Fn(&str) -> Expression + Send + Sync + 'static,
    {
        self.fields.insert((model.to_owned(), field.to_owned()), Arc::new(f));
    }

    pub fn get(&self, model: &str, field: &str) -> Option<&ComputedField> {
        self.fields.get(&(model.to_owned(), field.to_owned()))
    }

    pub fn contains(&self, model: &str, field: &str) -> bool {
        self.get(model, field).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Debug for ComputedFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.fields.keys()).finish()
    }
}

/// Everything a builder needs besides its arguments.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub schema: &'a Schema,
    pub dialect: &'a dyn Dialect,
    pub computed: &'a ComputedFields,
}

impl<'a> Context<'a> {
    pub fn new(schema: &'a Schema, dialect: &'a dyn Dialect, computed: &'a ComputedFields) -> Self {
        Self {
            schema,
            dialect,
            computed,
        }
    }

    pub fn provider(&self) -> Provider {
        self.dialect.provider()
    }

    pub fn model(&self, name: &str) -> Result<&'a ModelDef> {
        Ok(self.schema.model(name)?)
    }

    pub fn relation(&self, model: &ModelDef, field: &str) -> Result<ResolvedRelation<'a>> {
        Ok(self.schema.relation(&model.name, field)?)
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("provider", &self.provider())
            .field("computed", &self.computed)
            .finish()
    }
}
