//! JSON-schema-like export of record types
//!
//! Used by the remote facade's type registration endpoint. Property names
//! are wire names, the discriminator is a constant, and fields without a
//! default are required.

use crate::descriptor::TypeDescriptor;
use crate::shape::FieldShape;
use serde_json::{json, Map, Value as Json};
use vellum_core::TYPE_KEY;

/// Schema document for `descriptor`
pub fn schema(descriptor: &TypeDescriptor) -> Json {
    let mut properties = Map::new();
    properties.insert(TYPE_KEY.to_string(), json!({ "const": descriptor.type_tag() }));
    let mut required = vec![Json::String(TYPE_KEY.to_string())];
    for field in descriptor.fields() {
        properties.insert(field.wire_name.clone(), shape_schema(&field.shape));
        if field.is_required() {
            required.push(Json::String(field.wire_name.clone()));
        }
    }
    json!({
        "title": descriptor.type_tag(),
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Schema fragment for one shape
pub fn shape_schema(shape: &FieldShape) -> Json {
    match shape {
        FieldShape::String => json!({ "type": "string" }),
        FieldShape::Integer => json!({ "type": "integer" }),
        FieldShape::Float => json!({ "type": "number" }),
        FieldShape::Boolean => json!({ "type": "boolean" }),
        FieldShape::Date => json!({ "type": "string", "format": "date" }),
        FieldShape::DateTime => json!({ "type": "string", "format": "date-time" }),
        FieldShape::List(inner) => json!({ "type": "array", "items": shape_schema(inner) }),
        FieldShape::Set(inner) => {
            json!({ "type": "array", "items": shape_schema(inner), "uniqueItems": true })
        }
        FieldShape::Map(inner) => {
            json!({ "type": "object", "additionalProperties": shape_schema(inner) })
        }
        FieldShape::Optional(inner) => {
            json!({ "anyOf": [shape_schema(inner), { "type": "null" }] })
        }
        FieldShape::Union(members) => {
            json!({ "anyOf": members.iter().map(shape_schema).collect::<Vec<_>>() })
        }
        FieldShape::Record(tag) | FieldShape::Subclass(tag) => json!({
            "type": "object",
            "title": tag,
            "properties": { TYPE_KEY: { "type": "string" } },
            "required": [TYPE_KEY],
        }),
        FieldShape::OneOf { base, members } => json!({
            "type": "object",
            "title": base,
            "properties": { TYPE_KEY: { "enum": members } },
            "required": [TYPE_KEY],
        }),
    }
}

/// Required top-level properties of `schema` missing from `contents`
pub fn missing_required(schema: &Json, contents: &Json) -> Vec<String> {
    let Some(required) = schema.get("required").and_then(Json::as_array) else {
        return Vec::new();
    };
    required
        .iter()
        .filter_map(Json::as_str)
        .filter(|name| contents.get(*name).is_none())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::descriptor::TypeDefinition;
    use crate::registry::TypeRegistry;

    #[test]
    fn test_schema_shape() {
        let registry = TypeRegistry::new();
        let descriptor = registry
            .register(
                TypeDefinition::new("Nested")
                    .field("the_name", "str")
                    .field_with_default("tags", "Optional[set[str]]", None::<String>),
                false,
            )
            .unwrap();
        let doc = schema(&descriptor);
        assert_eq!(doc["title"], "Nested");
        assert_eq!(doc["properties"]["t_"]["const"], "Nested");
        assert_eq!(doc["properties"]["theName"]["type"], "string");
        assert_eq!(doc["required"], json!(["t_", "theName"]));
        assert_eq!(
            doc["properties"]["tags"]["anyOf"][0]["uniqueItems"],
            json!(true)
        );
    }

    #[test]
    fn test_missing_required() {
        let registry = TypeRegistry::new();
        let descriptor = registry
            .register(TypeDefinition::new("Nested").field("the_name", "str"), false)
            .unwrap();
        let doc = schema(&descriptor);

        let record = registry
            .builder("Nested")
            .unwrap()
            .set("the_name", "x")
            .build()
            .unwrap();
        assert!(missing_required(&doc, &codec::to_json(&record)).is_empty());
        assert_eq!(
            missing_required(&doc, &json!({ "t_": "Nested" })),
            vec!["theName".to_string()]
        );
    }
}
