use serde_json::Value;

use super::{OperationIndex, ResponseStatus, schema_property};
use crate::request_line::RequestLine;

/// Finds the operations whose `200`/`201` JSON response is not wrapped in a `{data, meta}` envelope.
///
/// A body is flagged when its schema declares properties but no `data`, or when it
/// is typed as something other than an object. Schemas that say nothing about their
/// shape are not flagged.
///
/// Only meaningful for v3 indexes; v2 bodies are never enveloped.
pub fn missing_data_envelope(index: &OperationIndex) -> Vec<&RequestLine> {
    index
        .iter()
        .filter(|(_, contract)| {
            contract
                .response
                .iter()
                .filter(|variant| matches!(variant.status, ResponseStatus::Code(200 | 201)))
                .filter_map(|variant| variant.body.as_ref())
                .any(lacks_envelope)
        })
        .map(|(request_line, _)| request_line)
        .collect()
}

fn lacks_envelope(schema: &Value) -> bool {
    if schema_property(schema, "data").is_some() {
        return false;
    }
    let typed_otherwise = schema
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|kind| kind != "object");
    let has_properties = schema.get("properties").is_some()
        || schema
            .get("allOf")
            .and_then(Value::as_array)
            .is_some_and(|members| members.iter().any(|member| member.get("properties").is_some()));

    typed_otherwise || has_properties
}
