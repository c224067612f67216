use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Name under which a schema is registered and referenced by routes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SchemaId(String);

impl SchemaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SchemaId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Primitive JSON types a schema field can be declared as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
}

impl FieldType {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON type name of a value, as reported in schema violations
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Schema '{schema}' requires field '{field}' without declaring its type")]
    UndeclaredRequiredField { schema: SchemaId, field: String },

    #[error("Schema '{0}' is already registered")]
    DuplicateSchema(SchemaId),

    #[error("Schema '{0}' is not registered")]
    UnknownSchema(SchemaId),
}

/// Declarative shape of a JSON request body
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    id: SchemaId,
    required_fields: Vec<(String, FieldType)>,
    field_types: BTreeMap<String, FieldType>,
}

impl Schema {
    /// Every required field must have a declared type.
    pub fn new<I, S>(
        id: impl Into<SchemaId>,
        required_fields: I,
        field_types: impl IntoIterator<Item = (S, FieldType)>,
    ) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = id.into();
        let field_types: BTreeMap<String, FieldType> = field_types
            .into_iter()
            .map(|(name, ty)| (name.into(), ty))
            .collect();
        let required_fields = required_fields
            .into_iter()
            .map(|field| {
                let field: String = field.into();
                match field_types.get(&field) {
                    Some(ty) => Ok((field, *ty)),
                    None => Err(field),
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|field| SchemaError::UndeclaredRequiredField {
                schema: id.clone(),
                field,
            })?;

        Ok(Self {
            id,
            required_fields,
            field_types,
        })
    }

    pub fn id(&self) -> &SchemaId {
        &self.id
    }

    /// Required fields with their declared types, in declared order
    pub fn required_fields(&self) -> impl ExactSizeIterator<Item = (&str, FieldType)> {
        self.required_fields.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.field_types.get(name).copied()
    }

    pub fn field_types(&self) -> impl Iterator<Item = (&str, FieldType)> {
        self.field_types.iter().map(|(name, ty)| (name.as_str(), *ty))
    }
}

impl From<String> for SchemaId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Process-wide set of schemas; read-only once bootstrap finishes
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<SchemaId, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: Schema) -> Result<(), SchemaError> {
        if self.schemas.contains_key(schema.id()) {
            return Err(SchemaError::DuplicateSchema(schema.id().clone()));
        }
        tracing::debug!("Registered schema '{}' ({} required fields)", schema.id(), schema.required_fields().len());
        self.schemas.insert(schema.id().clone(), schema);
        Ok(())
    }

    pub fn get(&self, id: &SchemaId) -> Result<&Schema, SchemaError> {
        self.schemas
            .get(id)
            .ok_or_else(|| SchemaError::UnknownSchema(id.clone()))
    }

    pub fn contains(&self, id: &SchemaId) -> bool {
        self.schemas.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_required_field_without_type() {
        let err = Schema::new(
            "place",
            ["place_id", "name"],
            [("place_id", FieldType::String)],
        )
        .unwrap_err();

        assert_eq!(
            err,
            SchemaError::UndeclaredRequiredField {
                schema: SchemaId::from("place"),
                field: "name".to_string()
            }
        );
    }

    #[test]
    fn required_fields_carry_their_declared_types() {
        let schema = Schema::new(
            "place",
            ["name", "latitude"],
            [("latitude", FieldType::Number), ("name", FieldType::String), ("notes", FieldType::String)],
        )
        .unwrap();

        let required: Vec<(&str, FieldType)> = schema.required_fields().collect();
        assert_eq!(required, vec![("name", FieldType::String), ("latitude", FieldType::Number)]);
        assert_eq!(schema.field_type("notes"), Some(FieldType::String));
    }

    #[test]
    fn registry_rejects_duplicates_and_reports_unknown_ids() {
        let mut registry = SchemaRegistry::new();
        let schema = Schema::new("place", ["place_id"], [("place_id", FieldType::String)]).unwrap();
        registry.register(schema.clone()).unwrap();

        assert_eq!(
            registry.register(schema),
            Err(SchemaError::DuplicateSchema(SchemaId::from("place")))
        );
        assert!(registry.get(&SchemaId::from("photo")).is_err());
        assert!(registry.contains(&SchemaId::from("place")));
    }

    #[test]
    fn field_types_match_json_primitives() {
        assert!(FieldType::Number.matches(&json!(48.85)));
        assert!(FieldType::Number.matches(&json!(2)));
        assert!(!FieldType::Number.matches(&json!("48.85")));
        assert!(FieldType::String.matches(&json!("FR")));
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!({"a": 1})), "object");
    }
}
