use crate::{FieldDef, ModelDef, Schema, SchemaError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    Cascade,
    Restrict,
    NoAction,
    SetNull,
    SetDefault,
}

/// Relation metadata as declared on a relation field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Foreign-key fields on this model. Only set on the owning side.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    /// Fields of the other model the foreign key points at.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opposite: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
    /// Explicit table name for an implicit many-to-many relation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_table: Option<String>,
}

impl RelationInfo {
    pub fn owned<I, J>(fields: I, references: J) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        J: IntoIterator,
        J::Item: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            references: references.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn back() -> Self {
        Self::default()
    }

    pub fn opposite(mut self, field: impl Into<String>) -> Self {
        self.opposite = Some(field.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }
}

/// The implicit table backing a many-to-many relation.
///
/// Column `A` references the id of the model whose name sorts first, `B` the
/// other one. Self relations order by field name instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTable {
    pub name: String,
    /// The column holding the id of the model the relation is read from.
    pub self_column: String,
    pub other_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationLink {
    /// The source model holds the foreign key.
    Owned { fields: Vec<String>, references: Vec<String> },
    /// The target model holds the foreign key, `fields` live on the target.
    Inverse { fields: Vec<String>, references: Vec<String> },
    ManyToMany(JoinTable),
}

#[derive(Debug, Clone)]
pub struct ResolvedRelation<'a> {
    pub source: &'a ModelDef,
    pub field: &'a FieldDef,
    pub target: &'a ModelDef,
    pub opposite: Option<&'a FieldDef>,
    pub link: RelationLink,
}

impl<'a> ResolvedRelation<'a> {
    pub fn is_to_many(&self) -> bool {
        self.field.array
    }

    pub fn is_many_to_many(&self) -> bool {
        matches!(self.link, RelationLink::ManyToMany(_))
    }

    pub fn owns_foreign_key(&self) -> bool {
        matches!(self.link, RelationLink::Owned { .. })
    }

    pub fn join_table(&self) -> Option<&JoinTable> {
        match &self.link {
            RelationLink::ManyToMany(table) => Some(table),
            _ => None,
        }
    }

    /// Pairs of `(source field, target field)` that are equal for related rows.
    /// Empty for many-to-many relations.
    pub fn join_pairs(&self) -> Vec<(&str, &str)> {
        match &self.link {
            RelationLink::Owned { fields, references } => fields
                .iter()
                .zip(references.iter())
                .map(|(f, r)| (f.as_str(), r.as_str()))
                .collect(),
            RelationLink::Inverse { fields, references } => references
                .iter()
                .zip(fields.iter())
                .map(|(r, f)| (r.as_str(), f.as_str()))
                .collect(),
            RelationLink::ManyToMany(_) => Vec::new(),
        }
    }

    /// The single id field of the source, used by many-to-many joins.
    pub fn source_id(&self) -> Option<&'a FieldDef> {
        self.source.single_id()
    }

    pub fn target_id(&self) -> Option<&'a FieldDef> {
        self.target.single_id()
    }
}

impl Schema {
    /// Resolves a relation field into the join shape between both models.
    pub fn relation(&self, model: &str, field: &str) -> Result<ResolvedRelation<'_>, SchemaError> {
        let source = self.model(model)?;
        let field_def = source.field(field)?;

        let info = field_def
            .relation
            .as_ref()
            .ok_or_else(|| SchemaError::relation(model, field, "not a relation field"))?;

        let target = self
            .models
            .get(&field_def.type_name)
            .ok_or_else(|| SchemaError::relation(model, field, format!("unknown model `{}`", field_def.type_name)))?;

        let opposite = match &info.opposite {
            Some(name) => target.fields.get(name),
            None => target.fields.values().find(|f| {
                f.type_name == source.name
                    && f.name != field_def.name
                    && f.relation.as_ref().map(|r| r.name == info.name).unwrap_or(false)
            }),
        };

        let link = if !info.fields.is_empty() {
            if info.fields.len() != info.references.len() {
                return Err(SchemaError::relation(
                    model,
                    field,
                    "`fields` and `references` have different lengths",
                ));
            }

            RelationLink::Owned {
                fields: info.fields.clone(),
                references: info.references.clone(),
            }
        } else {
            let opposite_info = opposite.and_then(|o| o.relation.as_ref());

            match (opposite, opposite_info) {
                (Some(_), Some(other)) if !other.fields.is_empty() => RelationLink::Inverse {
                    fields: other.fields.clone(),
                    references: other.references.clone(),
                },
                (Some(opp), Some(_)) if field_def.array && opp.array => {
                    RelationLink::ManyToMany(join_table(source, field_def, target, opp, info))
                }
                _ => {
                    return Err(SchemaError::relation(
                        model,
                        field,
                        "neither side of the relation declares a foreign key",
                    ))
                }
            }
        };

        Ok(ResolvedRelation {
            source,
            field: field_def,
            target,
            opposite,
            link,
        })
    }
}

fn join_table(source: &ModelDef, field: &FieldDef, target: &ModelDef, opposite: &FieldDef, info: &RelationInfo) -> JoinTable {
    let (first, second) = if source.name <= target.name {
        (&source.name, &target.name)
    } else {
        (&target.name, &source.name)
    };

    let relation_name = info.name.clone().unwrap_or_else(|| format!("{first}To{second}"));
    let name = info.join_table.clone().unwrap_or_else(|| format!("_{relation_name}"));

    let self_is_a = if source.name == target.name {
        field.name <= opposite.name
    } else {
        source.name < target.name
    };

    let (self_column, other_column) = if self_is_a { ("A", "B") } else { ("B", "A") };

    JoinTable {
        name,
        self_column: self_column.to_owned(),
        other_column: other_column.to_owned(),
    }
}
