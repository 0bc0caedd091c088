//! Response narrowing.
//!
//! The response union of an operation can be refined from the parameters a caller
//! actually supplied. v2 never narrows. v3 narrows `include_fields` requests down to
//! the selected properties.
//!
//! Rules are registered on a [`NarrowingRules`] value, either for every operation or
//! for a single request line, so new refinements never touch the dispatch client.
//!
//! ```rust
//! use std::sync::Arc;
//! use storeapi_core::{IncludeFields, NarrowingRules, RequestLine};
//!
//! let line: RequestLine = "GET /catalog/products".parse()?;
//! let rules = NarrowingRules::new().with_operation_rule(line, Arc::new(IncludeFields));
//! # Ok::<(), storeapi_core::ApiError>(())
//! ```

use std::fmt::Debug;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::index::{ResponseVariant, schema_property};
use crate::params::Parameters;
use crate::request_line::RequestLine;

/// Refines a response union from the caller's parameters.
pub trait NarrowResponse: Debug + Send + Sync {
    /// Returns the variants consistent with `params`.
    fn narrow(
        &self,
        request_line: &RequestLine,
        params: &Parameters,
        variants: Vec<ResponseVariant>,
    ) -> Vec<ResponseVariant>;
}

/// Keeps `id` and the fields listed in the `include_fields` query parameter.
///
/// The listed properties become required in the narrowed `data` schema
/// (or in its `items` for collections).
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeFields;

impl IncludeFields {
    const QUERY_PARAMETER: &'static str = "include_fields";

    fn requested_fields(params: &Parameters) -> Option<Vec<String>> {
        let value = params.query.as_ref()?.get(Self::QUERY_PARAMETER)?;
        let listed = match value {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            Value::String(text) => text
                .split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .map(ToString::to_string)
                .collect(),
            _ => return None,
        };

        let mut fields = vec!["id".to_string()];
        for field in listed {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        Some(fields)
    }
}

fn narrow_object(schema: &mut Value, fields: &[String]) {
    let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) else {
        return;
    };
    properties.retain(|name, _| fields.contains(name));
    let required = fields
        .iter()
        .filter(|field| properties.contains_key(field.as_str()))
        .map(|field| Value::String(field.clone()))
        .collect::<Vec<_>>();

    if let Some(object) = schema.as_object_mut() {
        object.insert("required".to_string(), Value::Array(required));
    }
}

fn narrow_data(body: &mut Value, fields: &[String]) {
    if let Some(members) = body.get_mut("allOf").and_then(Value::as_array_mut) {
        for member in members {
            narrow_data(member, fields);
        }
    }

    let Some(data) = body
        .get_mut("properties")
        .and_then(Value::as_object_mut)
        .and_then(|properties: &mut Map<String, Value>| properties.get_mut("data"))
    else {
        return;
    };
    match data.get_mut("items") {
        Some(items) => narrow_object(items, fields),
        None => narrow_object(data, fields),
    }
}

impl NarrowResponse for IncludeFields {
    fn narrow(
        &self,
        _request_line: &RequestLine,
        params: &Parameters,
        mut variants: Vec<ResponseVariant>,
    ) -> Vec<ResponseVariant> {
        let Some(fields) = Self::requested_fields(params) else {
            return variants;
        };

        for variant in variants.iter_mut().filter(|variant| variant.is_success()) {
            if let Some(body) = variant
                .body
                .as_mut()
                .filter(|body| schema_property(body, "data").is_some())
            {
                narrow_data(body, &fields);
            }
        }
        variants
    }
}

/// An ordered set of narrowing rules.
///
/// An empty set is the identity.
#[derive(Debug, Clone, Default)]
pub struct NarrowingRules {
    rules: Vec<(Option<RequestLine>, Arc<dyn NarrowResponse>)>,
}

impl NarrowingRules {
    /// No narrowing at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// v2 rules: the identity.
    pub fn v2() -> Self {
        Self::new()
    }

    /// v3 rules: [`IncludeFields`] on every operation.
    pub fn v3() -> Self {
        Self::new().with_rule(Arc::new(IncludeFields))
    }

    /// Adds a rule applied to every operation.
    #[must_use]
    pub fn with_rule(mut self, rule: Arc<dyn NarrowResponse>) -> Self {
        self.rules.push((None, rule));
        self
    }

    /// Adds a rule applied to one operation only.
    #[must_use]
    pub fn with_operation_rule(
        mut self,
        request_line: RequestLine,
        rule: Arc<dyn NarrowResponse>,
    ) -> Self {
        self.rules.push((Some(request_line), rule));
        self
    }

    /// Applies the matching rules, in registration order.
    pub fn narrow(
        &self,
        request_line: &RequestLine,
        params: &Parameters,
        variants: Vec<ResponseVariant>,
    ) -> Vec<ResponseVariant> {
        self.rules
            .iter()
            .filter(|(target, _)| target.as_ref().is_none_or(|target| target == request_line))
            .fold(variants, |variants, (_, rule)| {
                rule.narrow(request_line, params, variants)
            })
    }
}
