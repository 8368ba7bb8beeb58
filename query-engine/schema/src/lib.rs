//! The static description of the data model: models, fields, relations,
//! unique constraints, delegate hierarchies and access policies.
//!
//! A [`Schema`] is built once, either from its JSON document or with the
//! builder methods, validated on construction and never mutated afterwards.

mod error;
mod field;
mod model;
pub mod policy;
mod relation;
mod validate;
mod validation;

pub use bastion_sql::connector::Provider;
pub use error::SchemaError;
pub use field::{DefaultValue, FieldDef, FieldKind, ScalarType};
pub use model::{ModelDef, UniqueComponent, UniqueConstraint, UniqueDef};
pub use policy::{Expr, PolicyKind, PolicyOperation, PolicyRule};
pub use relation::{JoinTable, ReferentialAction, RelationInfo, RelationLink, ResolvedRelation};
pub use validation::ValidationRule;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    #[serde(default)]
    pub name: String,
    pub values: Vec<String>,
}

/// A structured shape for JSON fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    #[serde(default)]
    pub name: String,
    pub fields: IndexMap<String, FieldDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub provider: Provider,
    pub models: IndexMap<String, ModelDef>,
    #[serde(default)]
    pub enums: IndexMap<String, EnumDef>,
    #[serde(default)]
    pub type_defs: IndexMap<String, TypeDef>,
    /// Plugin declarations with their options, passed through untouched.
    #[serde(default)]
    pub plugins: IndexMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,

    #[serde(skip)]
    tables: HashMap<String, String>,
}

impl Schema {
    /// Deserializes and validates a schema document.
    pub fn from_json(document: &str) -> Result<Schema, SchemaError> {
        let schema: Schema = serde_json::from_str(document)?;
        schema.finalize()
    }

    pub fn from_value(document: serde_json::Value) -> Result<Schema, SchemaError> {
        let schema: Schema = serde_json::from_value(document)?;
        schema.finalize()
    }

    pub fn builder(provider: Provider) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                provider,
                models: IndexMap::new(),
                enums: IndexMap::new(),
                type_defs: IndexMap::new(),
                plugins: IndexMap::new(),
                auth_type: None,
                tables: HashMap::new(),
            },
        }
    }

    fn finalize(mut self) -> Result<Schema, SchemaError> {
        self.normalize();
        validate::validate(&self)?;

        tracing::debug!(
            provider = %self.provider,
            models = self.models.len(),
            "schema loaded"
        );

        Ok(self)
    }

    /// Fills in names from map keys and derives id and unique sets from the
    /// field flags when the document leaves them out.
    fn normalize(&mut self) {
        for (name, def) in self.enums.iter_mut() {
            def.name = name.clone();
        }

        for (name, def) in self.type_defs.iter_mut() {
            def.name = name.clone();

            for (field_name, field) in def.fields.iter_mut() {
                field.name = field_name.clone();
            }
        }

        for (name, model) in self.models.iter_mut() {
            model.name = name.clone();

            for (field_name, field) in model.fields.iter_mut() {
                field.name = field_name.clone();
            }

            let foreign_keys: Vec<(String, String)> = model
                .relation_fields()
                .flat_map(|f| {
                    let fields = f.relation.iter().flat_map(|r| r.fields.iter());
                    fields.map(move |fk| (fk.clone(), f.name.clone()))
                })
                .collect();

            for (fk, relation) in foreign_keys {
                if let Some(field) = model.fields.get_mut(&fk) {
                    if !field.foreign_key_for.contains(&relation) {
                        field.foreign_key_for.push(relation);
                    }
                }
            }

            if model.id_fields.is_empty() {
                model.id_fields = model.fields.values().filter(|f| f.id).map(|f| f.name.clone()).collect();
            }

            let singles: Vec<(String, String)> = model
                .fields
                .values()
                .filter(|f| f.unique || (f.id && model.id_fields.len() == 1))
                .map(|f| (f.name.clone(), f.type_name.clone()))
                .collect();

            for (field_name, type_name) in singles {
                model
                    .unique_fields
                    .entry(field_name)
                    .or_insert(UniqueDef::Single { type_name });
            }

            if model.id_fields.len() > 1 {
                let name = model.id_fields.join("_");

                if !model.unique_fields.contains_key(&name) {
                    let components = model
                        .id_fields
                        .iter()
                        .map(|f| {
                            let component = UniqueComponent {
                                type_name: String::new(),
                            };
                            (f.clone(), component)
                        })
                        .collect();

                    model.unique_fields.insert(name, UniqueDef::Compound(components));
                }
            }

            let fields = &model.fields;

            for def in model.unique_fields.values_mut() {
                if let UniqueDef::Compound(components) = def {
                    for (field_name, component) in components.iter_mut() {
                        if let Some(field) = fields.get(field_name) {
                            component.type_name = field.type_name.clone();
                        }
                    }
                }
            }
        }

        self.tables = self
            .models
            .values()
            .map(|m| (m.table_name().to_owned(), m.name.clone()))
            .collect();
    }

    pub fn model(&self, name: &str) -> Result<&ModelDef, SchemaError> {
        self.models
            .get(name)
            .ok_or_else(|| SchemaError::ModelNotFound(name.to_owned()))
    }

    pub fn find_model(&self, name: &str) -> Option<&ModelDef> {
        self.models.get(name)
    }

    /// The model stored in `table`, if any.
    pub fn model_by_table(&self, table: &str) -> Option<&ModelDef> {
        self.tables.get(table).and_then(|name| self.models.get(name))
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.get(name)
    }

    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.type_defs.get(name)
    }

    pub fn auth_model(&self) -> Option<&ModelDef> {
        self.auth_type.as_deref().and_then(|name| self.models.get(name))
    }

    /// Resolves the `type` of a field. Unknown names are reported as `None`.
    pub fn field_kind<'a>(&'a self, field: &'a FieldDef) -> Option<FieldKind<'a>> {
        if let Some(scalar) = field.scalar_type() {
            return Some(FieldKind::Scalar(scalar));
        }

        let name = field.type_name.as_str();

        if self.enums.contains_key(name) {
            Some(FieldKind::Enum(name))
        } else if self.type_defs.contains_key(name) {
            Some(FieldKind::TypeDef(name))
        } else if self.models.contains_key(name) && field.relation.is_some() {
            Some(FieldKind::Relation(name))
        } else {
            None
        }
    }

    /// The many-to-many relation stored in `table`, seen from the model whose
    /// id is in column `A`.
    pub fn join_table_relation(&self, table: &str) -> Option<ResolvedRelation<'_>> {
        self.models
            .values()
            .flat_map(|m| m.relation_fields().map(move |f| (m, f)))
            .filter(|(_, f)| f.array)
            .filter_map(|(m, f)| self.relation(&m.name, &f.name).ok())
            .find(|rel| matches!(rel.join_table(), Some(jt) if jt.name == table && jt.self_column == "A"))
    }

    /// The concrete sub-models of a delegate model.
    pub fn sub_models<'a>(&'a self, model: &'a ModelDef) -> impl Iterator<Item = &'a ModelDef> + 'a {
        model.sub_models.iter().filter_map(move |name| self.models.get(name))
    }

    pub fn base_model(&self, model: &ModelDef) -> Option<&ModelDef> {
        model.base_model.as_deref().and_then(|name| self.models.get(name))
    }
}

pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn model(mut self, model: ModelDef) -> Self {
        self.schema.models.insert(model.name.clone(), model);
        self
    }

    pub fn enum_def<I>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let def = EnumDef {
            name: name.to_owned(),
            values: values.into_iter().map(Into::into).collect(),
        };

        self.schema.enums.insert(name.to_owned(), def);
        self
    }

    pub fn type_def(mut self, name: &str, fields: Vec<FieldDef>) -> Self {
        let def = TypeDef {
            name: name.to_owned(),
            fields: fields.into_iter().map(|f| (f.name.clone(), f)).collect(),
        };

        self.schema.type_defs.insert(name.to_owned(), def);
        self
    }

    pub fn auth_type(mut self, model: &str) -> Self {
        self.schema.auth_type = Some(model.to_owned());
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        self.schema.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn loads_a_document() {
        let document = indoc! {r#"
            {
              "provider": "sqlite",
              "authType": "User",
              "models": {
                "User": {
                  "dbName": "users",
                  "fields": {
                    "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                    "email": { "type": "String", "unique": true },
                    "posts": { "type": "Post", "array": true, "relation": { "opposite": "author" } }
                  }
                },
                "Post": {
                  "fields": {
                    "id": { "type": "Int", "id": true },
                    "authorId": { "type": "Int", "foreignKeyFor": ["author"] },
                    "author": {
                      "type": "User",
                      "relation": { "fields": ["authorId"], "references": ["id"], "opposite": "posts" }
                    }
                  },
                  "policies": [
                    { "kind": "allow", "operations": ["read"], "condition": { "kind": "literal", "value": true } }
                  ]
                }
              }
            }
        "#};

        let schema = Schema::from_json(document).unwrap();
        let user = schema.model("User").unwrap();

        assert_eq!(vec!["id".to_owned()], user.id_fields);
        assert_eq!(
            vec!["id", "email"],
            user.unique_constraints().iter().map(|c| c.name).collect::<Vec<_>>()
        );
        assert_eq!(Some("User"), schema.model_by_table("users").map(|m| m.name.as_str()));
        assert_eq!(Some("User"), schema.auth_model().map(|m| m.name.as_str()));

        let posts = schema.relation("User", "posts").unwrap();
        assert_eq!(vec![("id", "authorId")], posts.join_pairs());
        assert!(posts.is_to_many());

        let author = schema.relation("Post", "author").unwrap();
        assert_eq!(vec![("authorId", "id")], author.join_pairs());
        assert!(author.owns_foreign_key());
    }

    #[test]
    fn compound_ids_become_unique_constraints() {
        let schema = Schema::builder(Provider::Sqlite)
            .model(
                ModelDef::new("Membership")
                    .with_field(FieldDef::new("userId", "Int"))
                    .with_field(FieldDef::new("groupId", "Int"))
                    .compound_id(["userId", "groupId"]),
            )
            .build()
            .unwrap();

        let model = schema.model("Membership").unwrap();
        let constraints = model.unique_constraints();

        assert_eq!(1, constraints.len());
        assert_eq!("userId_groupId", constraints[0].name);
        assert_eq!(vec!["userId", "groupId"], constraints[0].fields);

        match &model.unique_fields["userId_groupId"] {
            UniqueDef::Compound(components) => assert_eq!("Int", components["groupId"].type_name),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn many_to_many_join_tables_are_named_from_models() {
        let schema = Schema::builder(Provider::Sqlite)
            .model(
                ModelDef::new("User")
                    .with_field(FieldDef::new("id", "Int").id())
                    .with_field(
                        FieldDef::new("groups", "Group")
                            .array()
                            .relation(RelationInfo::back().opposite("users")),
                    ),
            )
            .model(
                ModelDef::new("Group")
                    .with_field(FieldDef::new("id", "Int").id())
                    .with_field(
                        FieldDef::new("users", "User")
                            .array()
                            .relation(RelationInfo::back().opposite("groups")),
                    ),
            )
            .build()
            .unwrap();

        let groups = schema.relation("User", "groups").unwrap();
        let table = groups.join_table().unwrap();

        assert_eq!("_GroupToUser", table.name);
        assert_eq!("B", table.self_column);
        assert_eq!("A", table.other_column);

        let users = schema.relation("Group", "users").unwrap();
        assert_eq!("A", users.join_table().unwrap().self_column);

        let by_table = schema.join_table_relation("_GroupToUser").unwrap();
        assert_eq!("Group", by_table.source.name);
    }
}
