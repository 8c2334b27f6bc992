//! Structural and type validation of import shards against a datamodel.

use crate::error::Result;
use crate::schema::{FieldDescriptor, TypeDescriptor, TypeModel, IMPLICIT_KEYS};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

static DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-[01]\d-[0-3]\dT[0-2]\d:[0-5]\d:[0-5]\d\.\d+([+-][0-2]\d:[0-5]\d|Z)")
        .expect("DateTime pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Import data is missing the \"values\" property")]
    MissingValues,
    #[error("Key \"values\" must be an array")]
    ValuesNotArray,
    #[error("Object {object} needs a _typeName property")]
    MissingTypeName { object: String },
    #[error("Type {type_name} does not exist")]
    UnknownType { type_name: String },
    #[error("Object {object} needs an id property")]
    MissingId { object: String },
    #[error("The \"id\" of object {object} needs to be a string")]
    IdNotString { object: String },
    #[error("Object {object} lacks the following properties: {}", .missing.join(", "))]
    MissingProperties { object: String, missing: Vec<String> },
    #[error("Object {object} has the following unknown properties: {}", .unknown.join(", "))]
    UnknownProperties { object: String, unknown: Vec<String> },
    #[error("List value {value} mustn't be provided in a \"nodes\" definition")]
    ListInNodes { value: String },
    #[error("Single scalar value {value} mustn't be provided in a \"lists\" definition")]
    ScalarInLists { value: String },
    #[error("Error for value {value}: It has to be a list.")]
    NotAList { value: String },
    #[error("Error for value {value}. Field type {type_name} has no validator defined")]
    NoValidator { value: String, type_name: String },
    #[error("Value {value} for field {field} is not a valid {type_name}")]
    InvalidValue {
        value: String,
        field: String,
        type_name: String,
    },
    #[error("Relation tuple {tuple} must be an array")]
    TupleNotArray { tuple: String },
    #[error("Relation tuple {tuple} must have 2 nodes")]
    TupleArity { tuple: String },
    #[error("Relation tuple {tuple} must include a \"fieldName\" property")]
    MissingFieldName { tuple: String },
    #[error("The \"fieldName\" property of node {object} points to a non-existing fieldName \"{field_name}\"")]
    UnknownFieldName { object: String, field_name: String },
}

type Check<T> = std::result::Result<T, ValidationError>;

/// Predicate applied to a single scalar value.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScalarCheck {
    Str,
    Int,
    Float,
    Boolean,
    DateTime,
    Json,
    Enum(Vec<String>),
}

impl ScalarCheck {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            ScalarCheck::Str => value.is_string(),
            ScalarCheck::Int => is_int(value),
            ScalarCheck::Float => value.is_number(),
            ScalarCheck::Boolean => value.is_boolean(),
            ScalarCheck::DateTime => value.as_str().is_some_and(|s| DATE_TIME.is_match(s)),
            ScalarCheck::Json => matches!(value, Value::Object(_) | Value::Array(_) | Value::Null),
            ScalarCheck::Enum(values) => value
                .as_str()
                .is_some_and(|s| values.iter().any(|v| v == s)),
        }
    }
}

/// Numbers and numeric strings whose value is a 32-bit integer.
fn is_int(value: &Value) -> bool {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    matches!(number, Some(x) if x.is_finite() && f64::from(x as i32) == x)
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|x| x != 0.0 && !x.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Which shard category a record is being validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    Nodes,
    Lists,
}

pub struct SchemaValidator {
    model: TypeModel,
    validators: HashMap<String, ScalarCheck>,
}

impl SchemaValidator {
    pub fn new(sdl: &str) -> Result<Self> {
        Ok(Self::from_model(TypeModel::parse(sdl)?))
    }

    pub fn from_model(model: TypeModel) -> Self {
        let mut validators: HashMap<String, ScalarCheck> = [
            ("ID", ScalarCheck::Str),
            ("String", ScalarCheck::Str),
            ("Int", ScalarCheck::Int),
            ("Float", ScalarCheck::Float),
            ("Boolean", ScalarCheck::Boolean),
            ("DateTime", ScalarCheck::DateTime),
            ("Json", ScalarCheck::Json),
        ]
        .into_iter()
        .map(|(name, check)| (name.to_string(), check))
        .collect();
        for (name, values) in &model.enums {
            validators.insert(name.clone(), ScalarCheck::Enum(values.clone()));
        }
        SchemaValidator { model, validators }
    }

    /// Validates one shard document. Fails on the first violation found.
    pub fn validate_import_data(&self, data: &Value) -> Check<()> {
        let values = match data.get("values") {
            Some(values) if truthy(Some(values)) => values,
            _ => return Err(ValidationError::MissingValues),
        };
        let values = values.as_array().ok_or(ValidationError::ValuesNotArray)?;

        match data.get("valueType").and_then(Value::as_str) {
            Some("nodes") => values.iter().try_for_each(|v| self.validate_node(v)),
            Some("lists") => values.iter().try_for_each(|v| self.validate_list_node(v)),
            Some("relations") => values
                .iter()
                .try_for_each(|v| self.validate_relation_tuple(v)),
            _ => Ok(()),
        }
    }

    pub fn validate_node(&self, value: &Value) -> Check<()> {
        let (object, descriptor) = self.check_type_name(value)?;
        check_id(object)?;
        check_required_fields(object, &descriptor.required_scalar_fields)?;
        check_unknown_fields(object, &descriptor.scalar_fields)?;
        self.check_values(object, descriptor, Payload::Nodes)
    }

    pub fn validate_list_node(&self, value: &Value) -> Check<()> {
        let (object, descriptor) = self.check_type_name(value)?;
        check_id(object)?;
        check_unknown_fields(object, &descriptor.list_fields)?;
        self.check_values(object, descriptor, Payload::Lists)
    }

    pub fn validate_relation_tuple(&self, value: &Value) -> Check<()> {
        let tuple = value.as_array().ok_or_else(|| ValidationError::TupleNotArray {
            tuple: value.to_string(),
        })?;
        if tuple.len() != 2 {
            return Err(ValidationError::TupleArity {
                tuple: value.to_string(),
            });
        }

        let mut endpoints = Vec::with_capacity(2);
        for node in tuple {
            let (object, descriptor) = self.check_type_name(node)?;
            check_id(object)?;
            endpoints.push((object, descriptor));
        }

        let mut has_field_name = false;
        for (object, descriptor) in endpoints {
            has_field_name |= check_field_name(object, descriptor)?;
        }
        if !has_field_name {
            return Err(ValidationError::MissingFieldName {
                tuple: value.to_string(),
            });
        }
        Ok(())
    }

    fn check_type_name<'v>(
        &self,
        value: &'v Value,
    ) -> Check<(&'v Map<String, Value>, &TypeDescriptor)> {
        let missing = || ValidationError::MissingTypeName {
            object: value.to_string(),
        };
        let object = value.as_object().ok_or_else(missing)?;
        let type_name = object.get("_typeName");
        if !truthy(type_name) {
            return Err(missing());
        }
        let type_name = match type_name {
            Some(Value::String(name)) => name.clone(),
            Some(other) => other.to_string(),
            None => return Err(missing()),
        };
        let descriptor = self
            .model
            .get_type(&type_name)
            .ok_or(ValidationError::UnknownType { type_name })?;
        Ok((object, descriptor))
    }

    fn check_values(
        &self,
        object: &Map<String, Value>,
        descriptor: &TypeDescriptor,
        payload: Payload,
    ) -> Check<()> {
        for (key, value) in object {
            if IMPLICIT_KEYS.contains(&key.as_str()) {
                continue;
            }
            // Unknown keys were rejected earlier; anything left is declared.
            if let Some(field) = descriptor.field(key) {
                self.validate_value(value, field, payload)?;
            }
        }
        Ok(())
    }

    fn validate_value(
        &self,
        value: &Value,
        field: &FieldDescriptor,
        payload: Payload,
    ) -> Check<()> {
        match (field.is_list, payload) {
            (true, Payload::Nodes) => Err(ValidationError::ListInNodes {
                value: value.to_string(),
            }),
            (false, Payload::Lists) => Err(ValidationError::ScalarInLists {
                value: value.to_string(),
            }),
            (true, Payload::Lists) => {
                let items = value.as_array().ok_or_else(|| ValidationError::NotAList {
                    value: value.to_string(),
                })?;
                items
                    .iter()
                    .try_for_each(|item| self.validate_scalar(item, field))
            }
            (false, Payload::Nodes) => self.validate_scalar(value, field),
        }
    }

    fn validate_scalar(&self, value: &Value, field: &FieldDescriptor) -> Check<()> {
        let check =
            self.validators
                .get(&field.leaf_type)
                .ok_or_else(|| ValidationError::NoValidator {
                    value: value.to_string(),
                    type_name: field.leaf_type.clone(),
                })?;
        if check.accepts(value) {
            Ok(())
        } else {
            Err(ValidationError::InvalidValue {
                value: value.to_string(),
                field: field.name.clone(),
                type_name: field.leaf_type.clone(),
            })
        }
    }
}

fn check_id(object: &Map<String, Value>) -> Check<()> {
    let id = object.get("id");
    if !truthy(id) {
        return Err(ValidationError::MissingId {
            object: Value::Object(object.clone()).to_string(),
        });
    }
    match id {
        Some(Value::String(_)) => Ok(()),
        _ => Err(ValidationError::IdNotString {
            object: Value::Object(object.clone()).to_string(),
        }),
    }
}

fn check_required_fields(object: &Map<String, Value>, required: &[String]) -> Check<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !object.contains_key(name.as_str()))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingProperties {
            object: Value::Object(object.clone()).to_string(),
            missing,
        })
    }
}

fn check_unknown_fields(object: &Map<String, Value>, declared: &[String]) -> Check<()> {
    let unknown: Vec<String> = object
        .keys()
        .filter(|key| !IMPLICIT_KEYS.contains(&key.as_str()))
        .filter(|key| !declared.contains(key))
        .cloned()
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::UnknownProperties {
            object: Value::Object(object.clone()).to_string(),
            unknown,
        })
    }
}

/// Returns whether the endpoint names a field; an unresolvable name is an error.
fn check_field_name(object: &Map<String, Value>, descriptor: &TypeDescriptor) -> Check<bool> {
    let field_name = object.get("fieldName");
    if !truthy(field_name) {
        return Ok(false);
    }
    let field_name = match field_name {
        Some(Value::String(name)) => name.clone(),
        Some(other) => other.to_string(),
        None => return Ok(false),
    };
    if descriptor.field(&field_name).is_none() {
        return Err(ValidationError::UnknownFieldName {
            object: Value::Object(object.clone()).to_string(),
            field_name,
        });
    }
    Ok(true)
}
