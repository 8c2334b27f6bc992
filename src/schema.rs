//! GraphQL SDL datamodel parsed into a lookup model for import validation.

use crate::error::{Error, Result};
use graphql_parser::schema::{parse_schema, Definition, Field, Type, TypeDefinition};
use std::collections::{HashMap, HashSet};

/// Keys every record may carry regardless of its type.
pub const IMPLICIT_KEYS: [&str; 4] = ["_typeName", "id", "createdAt", "updatedAt"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Innermost named type, e.g. `String` for `[String!]!`.
    pub leaf_type: String,
    pub is_list: bool,
    /// Outermost wrapper is non-null.
    pub required: bool,
    pub is_relation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    pub fields: HashMap<String, FieldDescriptor>,
    pub required_scalar_fields: Vec<String>,
    pub required_list_fields: Vec<String>,
    pub scalar_fields: Vec<String>,
    pub list_fields: Vec<String>,
}

impl TypeDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeModel {
    pub types: HashMap<String, TypeDescriptor>,
    pub enums: HashMap<String, Vec<String>>,
}

impl TypeModel {
    pub fn parse(sdl: &str) -> Result<Self> {
        let document =
            parse_schema::<String>(sdl).map_err(|e| Error::SchemaParse(e.to_string()))?;

        let mut objects = Vec::new();
        let mut enums = HashMap::new();
        for definition in &document.definitions {
            match definition {
                Definition::TypeDefinition(TypeDefinition::Object(object)) => {
                    objects.push(object)
                }
                Definition::TypeDefinition(TypeDefinition::Enum(e)) => {
                    let values = e.values.iter().map(|v| v.name.clone()).collect();
                    enums.insert(e.name.clone(), values);
                }
                _ => {}
            }
        }

        // Model types have to be known up front: a field pointing at one is a
        // reference, not a scalar, even if the target is declared later.
        let model_types: HashSet<&str> = objects.iter().map(|o| o.name.as_str()).collect();

        let types = objects
            .iter()
            .map(|object| {
                let fields: Vec<FieldDescriptor> =
                    object.fields.iter().map(describe_field).collect();
                let descriptor = TypeDescriptor {
                    name: object.name.clone(),
                    required_scalar_fields: field_names(&fields, &model_types, true, false),
                    required_list_fields: field_names(&fields, &model_types, true, true),
                    scalar_fields: field_names(&fields, &model_types, false, false),
                    list_fields: field_names(&fields, &model_types, false, true),
                    fields: fields.into_iter().map(|f| (f.name.clone(), f)).collect(),
                };
                (object.name.clone(), descriptor)
            })
            .collect();

        Ok(TypeModel { types, enums })
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }
}

fn describe_field(field: &Field<'_, String>) -> FieldDescriptor {
    FieldDescriptor {
        name: field.name.clone(),
        leaf_type: leaf_type(&field.field_type).to_string(),
        is_list: is_list(&field.field_type),
        required: matches!(field.field_type, Type::NonNullType(_)),
        is_relation: field.directives.iter().any(|d| d.name == "relation"),
    }
}

fn leaf_type<'t>(ty: &'t Type<'_, String>) -> &'t str {
    match ty {
        Type::NamedType(name) => name,
        Type::ListType(inner) | Type::NonNullType(inner) => leaf_type(inner),
    }
}

fn is_list(ty: &Type<'_, String>) -> bool {
    match ty {
        Type::NamedType(_) => false,
        Type::ListType(_) => true,
        Type::NonNullType(inner) => is_list(inner),
    }
}

/// Field names in declaration order, excluding `@relation` fields and
/// references to other model types.
fn field_names(
    fields: &[FieldDescriptor],
    model_types: &HashSet<&str>,
    required_only: bool,
    lists_only: bool,
) -> Vec<String> {
    fields
        .iter()
        .filter(|f| !f.is_relation && !model_types.contains(f.leaf_type.as_str()))
        .filter(|f| f.is_list == lists_only)
        .filter(|f| !required_only || f.required)
        .map(|f| f.name.clone())
        .collect()
}
