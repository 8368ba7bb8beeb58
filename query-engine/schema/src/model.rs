use crate::{policy::PolicyRule, FieldDef, PolicyOperation, SchemaError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One component of a unique constraint as written in the schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueComponent {
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UniqueDef {
    /// `@id`/`@unique` on a single field, keyed by the field name.
    Single {
        #[serde(rename = "type")]
        type_name: String,
    },
    /// `@@id`/`@@unique` over several fields, keyed by the constraint name.
    Compound(IndexMap<String, UniqueComponent>),
}

/// A named unique criterion with its fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueConstraint<'a> {
    pub name: &'a str,
    pub fields: Vec<&'a str>,
}

impl UniqueConstraint<'_> {
    pub fn is_compound(&self) -> bool {
        self.fields.len() > 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDef {
    #[serde(default)]
    pub name: String,
    /// The table name, if mapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    #[serde(default)]
    pub id_fields: Vec<String>,
    #[serde(default)]
    pub unique_fields: IndexMap<String, UniqueDef>,
    #[serde(default)]
    pub policies: Vec<PolicyRule>,
    #[serde(default)]
    pub is_delegate: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_models: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_model: Option<String>,
    #[serde(default)]
    pub is_view: bool,
}

impl ModelDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_name: None,
            fields: IndexMap::new(),
            id_fields: Vec::new(),
            unique_fields: IndexMap::new(),
            policies: Vec::new(),
            is_delegate: false,
            sub_models: Vec::new(),
            base_model: None,
            is_view: false,
        }
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn map(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = Some(db_name.into());
        self
    }

    /// Declares a compound id (`@@id([...])`).
    pub fn compound_id<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.id_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Declares a compound unique constraint (`@@unique([...])`), named by
    /// joining the field names with `_`. Component types are filled in on load.
    pub fn compound_unique(mut self, fields: &[&str]) -> Self {
        let components = fields
            .iter()
            .map(|f| {
                let component = UniqueComponent {
                    type_name: String::new(),
                };
                (f.to_string(), component)
            })
            .collect();

        self.unique_fields.insert(fields.join("_"), UniqueDef::Compound(components));
        self
    }

    pub fn policy(mut self, rule: PolicyRule) -> Self {
        self.policies.push(rule);
        self
    }

    pub fn delegate<I>(mut self, sub_models: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.is_delegate = true;
        self.sub_models = sub_models.into_iter().map(Into::into).collect();
        self
    }

    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.base_model = Some(base.into());
        self
    }

    pub fn table_name(&self) -> &str {
        self.db_name.as_deref().unwrap_or(&self.name)
    }

    pub fn field(&self, name: &str) -> Result<&FieldDef, SchemaError> {
        self.fields
            .get(name)
            .ok_or_else(|| SchemaError::field_not_found(&self.name, name))
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn find_field_by_column(&self, column: &str) -> Option<&FieldDef> {
        self.scalar_fields().find(|f| f.column_name() == column)
    }

    /// Persisted scalar fields, in declaration order.
    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        self.fields.values().filter(|f| f.relation.is_none() && !f.computed)
    }

    pub fn relation_fields(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        self.fields.values().filter(|f| f.relation.is_some())
    }

    pub fn computed_fields(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        self.fields.values().filter(|f| f.computed)
    }

    /// Scalar fields stored in this model's own table. For a delegate
    /// sub-model, inherited fields other than the id live in the base table.
    pub fn own_scalar_fields(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        self.scalar_fields()
            .filter(|f| f.origin_model.is_none() || self.id_fields.contains(&f.name))
    }

    pub fn inherited_scalar_fields(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        self.scalar_fields()
            .filter(|f| f.origin_model.is_some() && !self.id_fields.contains(&f.name))
    }

    pub fn id_fields(&self) -> Vec<&FieldDef> {
        self.id_fields.iter().filter_map(|name| self.fields.get(name)).collect()
    }

    /// The id field when the primary key is a single column.
    pub fn single_id(&self) -> Option<&FieldDef> {
        match self.id_fields.as_slice() {
            [single] => self.fields.get(single),
            _ => None,
        }
    }

    /// The fields identifying a row: the id, or the first unique constraint
    /// for models without one.
    pub fn primary_identifier(&self) -> Vec<&str> {
        if !self.id_fields.is_empty() {
            return self.id_fields.iter().map(String::as_str).collect();
        }

        self.unique_constraints()
            .into_iter()
            .next()
            .map(|c| c.fields)
            .unwrap_or_default()
    }

    pub fn unique_constraints(&self) -> Vec<UniqueConstraint<'_>> {
        self.unique_fields
            .iter()
            .map(|(name, def)| match def {
                UniqueDef::Single { .. } => UniqueConstraint {
                    name: name.as_str(),
                    fields: vec![name.as_str()],
                },
                UniqueDef::Compound(components) => UniqueConstraint {
                    name: name.as_str(),
                    fields: components.keys().map(String::as_str).collect(),
                },
            })
            .collect()
    }

    pub fn discriminator(&self) -> Option<&FieldDef> {
        self.fields.values().find(|f| f.is_discriminator)
    }

    pub fn rules_for(&self, operation: PolicyOperation) -> impl Iterator<Item = &PolicyRule> + '_ {
        self.policies.iter().filter(move |rule| rule.applies_to(operation))
    }

    pub fn has_rules_for(&self, operation: PolicyOperation) -> bool {
        self.rules_for(operation).next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn unique_definitions_deserialize() {
        let model: ModelDef = serde_json::from_value(json!({
            "fields": {
                "id": { "type": "Int", "id": true },
                "a": { "type": "Int" },
                "b": { "type": "String" }
            },
            "idFields": ["id"],
            "uniqueFields": {
                "id": { "type": "Int" },
                "a_b": { "a": { "type": "Int" }, "b": { "type": "String" } }
            }
        }))
        .unwrap();

        let constraints = model.unique_constraints();

        assert_eq!(
            vec![
                UniqueConstraint {
                    name: "id",
                    fields: vec!["id"]
                },
                UniqueConstraint {
                    name: "a_b",
                    fields: vec!["a", "b"]
                },
            ],
            constraints
        );
    }
}
