use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::routing::route::Route;
use crate::schema::{json_type_name, FieldType, Schema, SchemaRegistry};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required request parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid request body: field '{field}' expected {expected}, got {actual}")]
    SchemaViolation {
        field: String,
        expected: FieldType,
        actual: String,
    },

    #[error("Invalid request body: {0}")]
    MalformedBody(String),
}

/// Checks a request against its route's declared query and body requirements
pub struct RequestValidator<'a> {
    schemas: &'a SchemaRegistry,
}

impl<'a> RequestValidator<'a> {
    pub fn new(schemas: &'a SchemaRegistry) -> Self {
        Self { schemas }
    }

    pub fn validate(
        &self,
        route: &Route,
        query: &HashMap<String, String>,
        body: Option<&[u8]>,
    ) -> Result<(), ValidationError> {
        let Some(validator) = route.validator() else {
            return Ok(());
        };

        if let Some(missing) = validator
            .required_query_params
            .iter()
            .find(|name| !query.contains_key(name.as_str()))
        {
            return Err(ValidationError::MissingParameter(missing.clone()));
        }

        if let Some(schema_id) = &validator.required_body_schema {
            let schema = self
                .schemas
                .get(schema_id)
                .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;
            let record = parse_record(body)?;
            check_record(schema, &record)?;
        }

        Ok(())
    }
}

fn parse_record(body: Option<&[u8]>) -> Result<Map<String, Value>, ValidationError> {
    let bytes = body
        .filter(|b| !b.iter().all(u8::is_ascii_whitespace))
        .ok_or_else(|| ValidationError::MalformedBody("request body is required".to_string()))?;

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(other) => Err(ValidationError::MalformedBody(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
        Err(e) => Err(ValidationError::MalformedBody(format!("invalid JSON: {}", e))),
    }
}

/// Required fields first, in declared order; then the types of every declared
/// field that is present. Undeclared fields pass through.
fn check_record(schema: &Schema, record: &Map<String, Value>) -> Result<(), ValidationError> {
    for (field, expected) in schema.required_fields() {
        if !record.contains_key(field) {
            return Err(ValidationError::SchemaViolation {
                field: field.to_string(),
                expected,
                actual: "missing".to_string(),
            });
        }
    }

    for (name, expected) in schema.required_fields().chain(schema.field_types()) {
        let Some(value) = record.get(name) else {
            continue;
        };
        if !expected.matches(value) {
            return Err(ValidationError::SchemaViolation {
                field: name.to_string(),
                expected,
                actual: json_type_name(value).to_string(),
            });
        }
    }

    Ok(())
}
