use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{
    BodySpec, OperationContract, OperationIndex, ParamSpec, ParameterSlots, ResponseStatus,
    ResponseVariant,
};
use crate::IndexError;
use crate::path::placeholder_name;
use crate::request_line::{RequestLine, RequestMethod};

const JSON_CONTENT: &str = "application/json";

/// Headers the runtime manages itself; never part of a contract.
const MANAGED_HEADERS: [&str; 2] = ["accept", "content-type"];

/// Keywords copied from a Swagger 2.0 non-body parameter into its schema.
const SWAGGER_SCHEMA_KEYWORDS: [&str; 9] = [
    "type", "format", "items", "enum", "default", "minimum", "maximum", "pattern", "nullable",
];

/// Derives the operation index of a parsed OpenAPI 3.x or Swagger 2.0 document.
///
/// For every path and every `delete`, `get`, `patch`, `post` or `put` key, the
/// request line `"METHOD /path"` maps to:
///
/// - parameters: path, query and header parameters (path-level merged with
///   operation-level), plus a `body` only when an `application/json` request body is
///   declared, optional unless the document marks it required
/// - response: one variant per declared status, with the `application/json` schema as body
///
/// Other keys of a path item are ignored. Local `$ref`s are inlined.
///
/// # Errors
///
/// - [`IndexError::InvalidSpec`] when `paths` or a path item is not an object
/// - [`IndexError::DuplicateRequestLine`] when two entries produce the same request line
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use storeapi_core::{derive_operation_index, RequestLine};
///
/// let document = json!({
///     "openapi": "3.0.0",
///     "paths": {
///         "/store": {
///             "get": {"responses": {"200": {"content": {"application/json": {"schema": {"type": "object"}}}}}}
///         }
///     }
/// });
///
/// let index = derive_operation_index(&document)?;
/// let line: RequestLine = "GET /store".parse()?;
/// assert!(index.contains(&line));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn derive_operation_index(document: &Value) -> Result<OperationIndex, IndexError> {
    let deriver = Deriver::new(document);
    let mut index = OperationIndex::new();

    let Some(paths) = document.get("paths") else {
        debug!("document without paths");
        return Ok(index);
    };
    let paths = paths.as_object().ok_or_else(|| IndexError::InvalidSpec {
        message: "'paths' must be an object".to_string(),
    })?;

    for (path, item) in paths {
        let item = deriver.resolve(item);
        let item = item.as_object().ok_or_else(|| IndexError::InvalidSpec {
            message: format!("path item '{path}' must be an object"),
        })?;
        let path_level_params = item.get("parameters");

        for (key, operation) in item {
            let Some(method) = RequestMethod::from_spec_key(key) else {
                if key != "parameters" {
                    debug!(%path, %key, "skipping non-operation key");
                }
                continue;
            };
            let request_line = RequestLine::new(method, path.as_str());
            let contract = deriver.contract(path, operation, path_level_params);
            index.insert(request_line, contract)?;
        }
    }

    Ok(index)
}

struct Deriver<'a> {
    root: &'a Value,
    swagger: bool,
}

impl<'a> Deriver<'a> {
    fn new(root: &'a Value) -> Self {
        let swagger = root.get("swagger").is_some();
        Self { root, swagger }
    }

    fn lookup(&self, reference: &str) -> Option<&'a Value> {
        let pointer = reference.strip_prefix('#')?;
        self.root.pointer(pointer)
    }

    /// Inlines every local `$ref`; cyclic references are kept as `$ref` objects.
    fn resolve(&self, value: &Value) -> Value {
        let mut stack = Vec::new();
        self.inline(value, &mut stack)
    }

    fn inline(&self, value: &Value, stack: &mut Vec<String>) -> Value {
        match value {
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    if stack.iter().any(|seen| seen == reference) {
                        return value.clone();
                    }
                    let Some(target) = self.lookup(reference) else {
                        warn!(%reference, "unresolved reference kept as-is");
                        return value.clone();
                    };
                    stack.push(reference.to_string());
                    let resolved = self.inline(target, stack);
                    stack.pop();
                    return resolved;
                }
                let inlined = map
                    .iter()
                    .map(|(key, item)| (key.clone(), self.inline(item, stack)))
                    .collect::<Map<_, _>>();
                Value::Object(inlined)
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.inline(item, stack)).collect())
            }
            other => other.clone(),
        }
    }

    fn media_types(&self, operation: &Value, key: &str) -> Option<Vec<String>> {
        operation
            .get(key)
            .or_else(|| self.root.get(key))
            .and_then(Value::as_array)
            .map(|types| {
                types
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToString::to_string)
                    .collect()
            })
    }

    fn accepts_json(&self, operation: &Value, key: &str) -> bool {
        self.media_types(operation, key)
            .is_none_or(|types| types.iter().any(|media| media == JSON_CONTENT))
    }

    /// `operation` and `path_level_params` come from an already inlined path item.
    fn contract(
        &self,
        path: &str,
        operation: &Value,
        path_level_params: Option<&Value>,
    ) -> OperationContract {
        let mut slots = ParameterSlots::default();

        for (location, param) in Self::collect_params(path_level_params, operation.get("parameters")) {
            let Some(name) = param.get("name").and_then(Value::as_str) else {
                continue;
            };
            let required = param
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            match location.as_str() {
                "path" => slots.path.push(ParamSpec {
                    name: name.to_string(),
                    required: true,
                    schema: self.param_schema(&param),
                }),
                "query" => slots.query.push(ParamSpec {
                    name: name.to_string(),
                    required,
                    schema: self.param_schema(&param),
                }),
                "header" if MANAGED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) => {}
                "header" => slots.header.push(ParamSpec {
                    name: name.to_string(),
                    required,
                    schema: self.param_schema(&param),
                }),
                "body" if self.swagger && self.accepts_json(operation, "consumes") => {
                    slots.body = Some(BodySpec {
                        required,
                        schema: param.get("schema").cloned().unwrap_or_else(|| json!({})),
                    });
                }
                _ => {}
            }
        }

        for segment in path.split('/') {
            if let Some(name) = placeholder_name(segment)
                && !slots.path.iter().any(|spec| spec.name == name)
            {
                debug!(%path, %name, "undeclared path placeholder");
                slots.path.push(ParamSpec {
                    name: name.to_string(),
                    required: true,
                    schema: json!({"type": "string"}),
                });
            }
        }
        slots
            .path
            .sort_by_cached_key(|spec| path.find(&format!("{{{}}}", spec.name)).unwrap_or(usize::MAX));

        if !self.swagger {
            slots.body = Self::request_body(operation);
        }

        OperationContract {
            parameters: slots,
            response: self.responses(operation),
        }
    }

    /// Merges path-level and operation-level parameters; the operation wins per `(in, name)`.
    ///
    /// Parameters are expected to be inlined already.
    fn collect_params(
        path_level: Option<&Value>,
        operation_level: Option<&Value>,
    ) -> Vec<(String, Value)> {
        let mut params = IndexMap::<(String, String), Value>::new();

        for source in [path_level, operation_level].into_iter().flatten() {
            let Some(items) = source.as_array() else {
                continue;
            };
            for param in items {
                let name = param.get("name").and_then(Value::as_str);
                let location = param.get("in").and_then(Value::as_str);
                if let (Some(name), Some(location)) = (name, location) {
                    params.insert((location.to_string(), name.to_string()), param.clone());
                }
            }
        }

        params
            .into_iter()
            .map(|((location, _), param)| (location, param))
            .collect()
    }

    fn param_schema(&self, param: &Value) -> Value {
        if let Some(schema) = param.get("schema") {
            return schema.clone();
        }
        if self.swagger {
            let schema = SWAGGER_SCHEMA_KEYWORDS
                .iter()
                .filter_map(|keyword| {
                    param
                        .get(*keyword)
                        .map(|value| ((*keyword).to_string(), value.clone()))
                })
                .collect::<Map<_, _>>();
            if !schema.is_empty() {
                return Value::Object(schema);
            }
        }
        json!({"type": "string"})
    }

    fn request_body(operation: &Value) -> Option<BodySpec> {
        let request_body = operation.get("requestBody")?;
        let content = request_body.get("content")?.get(JSON_CONTENT)?;
        let required = request_body
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Some(BodySpec {
            required,
            schema: content.get("schema").cloned().unwrap_or_else(|| json!({})),
        })
    }

    fn responses(&self, operation: &Value) -> Vec<ResponseVariant> {
        let Some(responses) = operation.get("responses").and_then(Value::as_object) else {
            return vec![];
        };

        responses
            .iter()
            .map(|(status, response)| {
                let body = if self.swagger {
                    response
                        .get("schema")
                        .filter(|_| self.accepts_json(operation, "produces"))
                        .cloned()
                } else {
                    response
                        .get("content")
                        .and_then(|content| content.get(JSON_CONTENT))
                        .map(|media| media.get("schema").cloned().unwrap_or_else(|| json!({})))
                };
                ResponseVariant {
                    status: ResponseStatus::parse(status),
                    body,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn line(value: &str) -> RequestLine {
        value.parse().expect("valid request line")
    }

    fn catalog_document() -> Value {
        json!({
            "openapi": "3.0.1",
            "paths": {
                "/catalog/products": {
                    "parameters": [
                        {"$ref": "#/components/parameters/Accept"}
                    ],
                    "get": {
                        "parameters": [
                            {"name": "page", "in": "query", "schema": {"type": "integer"}},
                            {"name": "include_fields", "in": "query", "schema": {"type": "array", "items": {"type": "string"}}}
                        ],
                        "responses": {
                            "200": {"$ref": "#/components/responses/ProductCollection"},
                            "422": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Error"}}}}
                        }
                    },
                    "post": {
                        "requestBody": {
                            "required": true,
                            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Product"}}}
                        },
                        "responses": {
                            "200": {"content": {"application/json": {"schema": {"properties": {"data": {"$ref": "#/components/schemas/Product"}}}}}}
                        }
                    },
                    "delete": {
                        "parameters": [{"name": "id:in", "in": "query", "schema": {"type": "array"}}],
                        "responses": {"204": {"description": "No Content"}}
                    },
                    "head": {"responses": {"200": {"description": "ignored"}}},
                    "summary": "not an operation"
                },
                "/catalog/products/{product_id}": {
                    "parameters": [
                        {"name": "product_id", "in": "path", "required": true, "schema": {"type": "integer"}}
                    ],
                    "put": {
                        "parameters": [
                            {"name": "Content-Type", "in": "header", "required": true, "schema": {"type": "string"}},
                            {"name": "X-Channel-Id", "in": "header", "required": false, "schema": {"type": "integer"}}
                        ],
                        "requestBody": {
                            "content": {"application/json": {"schema": {"type": "object"}}}
                        },
                        "responses": {"200": {"description": "ok"}}
                    },
                    "get": {
                        "parameters": [
                            {"name": "product_id", "in": "path", "required": true, "schema": {"type": "string"}}
                        ],
                        "requestBody": {
                            "content": {"multipart/form-data": {"schema": {"type": "object"}}}
                        },
                        "responses": {}
                    }
                }
            },
            "components": {
                "parameters": {
                    "Accept": {"name": "Accept", "in": "header", "required": true, "schema": {"type": "string"}}
                },
                "responses": {
                    "ProductCollection": {
                        "content": {"application/json": {"schema": {
                            "properties": {
                                "data": {"type": "array", "items": {"$ref": "#/components/schemas/Product"}},
                                "meta": {"type": "object"}
                            }
                        }}}
                    }
                },
                "schemas": {
                    "Product": {"type": "object", "properties": {"id": {"type": "integer"}, "sku": {"type": "string"}}},
                    "Error": {"type": "object", "properties": {"title": {"type": "string"}}}
                }
            }
        })
    }

    #[test]
    fn should_derive_every_supported_method() {
        let index = derive_operation_index(&catalog_document()).expect("valid document");

        let mut lines = index.request_lines().map(ToString::to_string).collect::<Vec<_>>();
        lines.sort();

        assert_eq!(
            lines,
            vec![
                "DELETE /catalog/products",
                "GET /catalog/products",
                "GET /catalog/products/{product_id}",
                "POST /catalog/products",
                "PUT /catalog/products/{product_id}",
            ]
        );
    }

    #[test]
    fn should_omit_body_without_json_request_body() {
        let index = derive_operation_index(&catalog_document()).expect("valid document");

        for request_line in ["GET /catalog/products", "DELETE /catalog/products", "GET /catalog/products/{product_id}"] {
            let contract = index.get(&line(request_line)).expect("derived");
            assert!(contract.parameters.body.is_none(), "{request_line}");

            let json = serde_json::to_value(contract).expect("serializable");
            let parameters = json.get("parameters").and_then(Value::as_object);
            assert!(
                parameters.is_none_or(|parameters| !parameters.contains_key("body")),
                "{request_line} must not expose a body field"
            );
        }
    }

    #[test]
    fn should_derive_required_and_optional_bodies() {
        let index = derive_operation_index(&catalog_document()).expect("valid document");

        let post = index.get(&line("POST /catalog/products")).expect("derived");
        let body = post.parameters.body.as_ref().expect("json body");
        assert!(body.required);
        assert_eq!(
            body.schema,
            json!({"type": "object", "properties": {"id": {"type": "integer"}, "sku": {"type": "string"}}})
        );

        let put = index
            .get(&line("PUT /catalog/products/{product_id}"))
            .expect("derived");
        let body = put.parameters.body.as_ref().expect("json body");
        assert!(!body.required);
    }

    #[test]
    fn should_merge_parameters_and_drop_managed_headers() {
        let index = derive_operation_index(&catalog_document()).expect("valid document");

        let put = index
            .get(&line("PUT /catalog/products/{product_id}"))
            .expect("derived");
        assert_eq!(put.parameters.path.len(), 1);
        assert_eq!(put.parameters.path[0].schema, json!({"type": "integer"}));
        let headers = put
            .parameters
            .header
            .iter()
            .map(|header| header.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(headers, vec!["X-Channel-Id"]);

        let get = index
            .get(&line("GET /catalog/products/{product_id}"))
            .expect("derived");
        assert_eq!(get.parameters.path[0].schema, json!({"type": "string"}));

        let list = index.get(&line("GET /catalog/products")).expect("derived");
        assert!(list.parameters.header.is_empty());
        assert_eq!(list.parameters.query.len(), 2);
    }

    #[test]
    fn should_derive_response_union() {
        let index = derive_operation_index(&catalog_document()).expect("valid document");

        let list = index.get(&line("GET /catalog/products")).expect("derived");
        let statuses = list
            .response
            .iter()
            .map(|variant| variant.status.to_string())
            .collect::<Vec<_>>();
        assert_eq!(statuses, vec!["200", "422"]);
        assert!(list.returns_collection());
        assert_eq!(
            list.response[1].body,
            Some(json!({"type": "object", "properties": {"title": {"type": "string"}}}))
        );

        let delete = index.get(&line("DELETE /catalog/products")).expect("derived");
        assert_eq!(delete.response.len(), 1);
        assert_eq!(delete.response[0].status, ResponseStatus::Code(204));
        assert!(delete.response[0].body.is_none());
    }

    #[test]
    fn should_be_idempotent() {
        let document = catalog_document();

        let first = derive_operation_index(&document).expect("valid document");
        let second = derive_operation_index(&document).expect("valid document");

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).expect("serializable"),
            serde_json::to_string(&second).expect("serializable")
        );
    }

    #[test]
    fn should_add_undeclared_placeholders_in_template_order() {
        let document = json!({
            "openapi": "3.0.0",
            "paths": {
                "/catalog/products/{product_id}/images/{image_id}": {
                    "delete": {
                        "parameters": [{"name": "image_id", "in": "path", "required": true, "schema": {"type": "integer"}}],
                        "responses": {"204": {"description": ""}}
                    }
                }
            }
        });

        let index = derive_operation_index(&document).expect("valid document");
        let contract = index
            .get(&line("DELETE /catalog/products/{product_id}/images/{image_id}"))
            .expect("derived");

        let names = contract
            .parameters
            .path
            .iter()
            .map(|spec| spec.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["product_id", "image_id"]);
        assert!(contract.requires_params());
    }

    #[test]
    fn should_derive_swagger_documents() {
        let document = json!({
            "swagger": "2.0",
            "consumes": ["application/json"],
            "produces": ["application/json"],
            "paths": {
                "/orders/{order_id}": {
                    "put": {
                        "parameters": [
                            {"name": "order_id", "in": "path", "required": true, "type": "integer"},
                            {"name": "body", "in": "body", "required": true, "schema": {"$ref": "#/definitions/Order"}}
                        ],
                        "responses": {"200": {"schema": {"$ref": "#/definitions/Order"}}}
                    },
                    "get": {
                        "parameters": [{"name": "order_id", "in": "path", "required": true, "type": "integer"}],
                        "responses": {"200": {"schema": {"$ref": "#/definitions/Order"}}, "204": {"description": ""}}
                    }
                },
                "/orders/{order_id}/files": {
                    "post": {
                        "consumes": ["multipart/form-data"],
                        "parameters": [
                            {"name": "order_id", "in": "path", "required": true, "type": "integer"},
                            {"name": "file", "in": "formData", "type": "file"}
                        ],
                        "responses": {"201": {"schema": {"type": "object"}}}
                    }
                }
            },
            "definitions": {
                "Order": {"type": "object", "properties": {"id": {"type": "integer"}}}
            }
        });

        let index = derive_operation_index(&document).expect("valid document");

        let put = index.get(&line("PUT /orders/{order_id}")).expect("derived");
        let body = put.parameters.body.as_ref().expect("json body");
        assert!(body.required);
        assert_eq!(body.schema["properties"]["id"], json!({"type": "integer"}));
        assert_eq!(put.parameters.path[0].schema, json!({"type": "integer"}));

        let get = index.get(&line("GET /orders/{order_id}")).expect("derived");
        assert!(get.parameters.body.is_none());
        assert!(get.response[0].body.is_some());
        assert!(get.response[1].body.is_none());

        let upload = index.get(&line("POST /orders/{order_id}/files")).expect("derived");
        assert!(upload.parameters.body.is_none());
        assert!(upload.parameters.query.is_empty());
    }

    #[test]
    fn should_keep_cyclic_references() {
        let document = json!({
            "openapi": "3.0.0",
            "paths": {
                "/catalog/trees/categories": {
                    "get": {"responses": {"200": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Node"}}}}}}
                }
            },
            "components": {"schemas": {"Node": {
                "type": "object",
                "properties": {"children": {"type": "array", "items": {"$ref": "#/components/schemas/Node"}}}
            }}}
        });

        let index = derive_operation_index(&document).expect("valid document");
        let contract = index
            .get(&line("GET /catalog/trees/categories"))
            .expect("derived");

        let body = contract.response[0].body.as_ref().expect("json body");
        assert_eq!(
            body["properties"]["children"]["items"],
            json!({"$ref": "#/components/schemas/Node"})
        );
    }

    #[test]
    fn should_stop_mutual_references_at_first_repeat() {
        let document = json!({
            "openapi": "3.0.0",
            "paths": {
                "/customers/{customer_id}": {
                    "parameters": [{"$ref": "#/components/parameters/CustomerId"}],
                    "get": {"responses": {"200": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Customer"}}}}}}
                }
            },
            "components": {
                "parameters": {"CustomerId": {"name": "customer_id", "in": "path", "required": true, "schema": {"$ref": "#/components/schemas/Id"}}},
                "schemas": {
                    "Id": {"type": "integer"},
                    "Customer": {"type": "object", "properties": {"group": {"$ref": "#/components/schemas/Group"}}},
                    "Group": {"type": "object", "properties": {"owner": {"$ref": "#/components/schemas/Customer"}}}
                }
            }
        });

        let index = derive_operation_index(&document).expect("valid document");
        let contract = index.get(&line("GET /customers/{customer_id}")).expect("derived");

        assert_eq!(contract.parameters.path[0].schema, json!({"type": "integer"}));
        let body = contract.response[0].body.as_ref().expect("json body");
        assert_eq!(
            body["properties"]["group"]["properties"]["owner"],
            json!({"$ref": "#/components/schemas/Customer"})
        );
    }

    #[test]
    fn should_reject_malformed_paths() {
        let result = derive_operation_index(&json!({"openapi": "3.0.0", "paths": []}));
        assert!(matches!(result, Err(IndexError::InvalidSpec { .. })));

        let result = derive_operation_index(&json!({"openapi": "3.0.0", "paths": {"/a": 1}}));
        assert!(matches!(result, Err(IndexError::InvalidSpec { .. })));

        let index = derive_operation_index(&json!({"openapi": "3.0.0"})).expect("no paths");
        assert!(index.is_empty());
    }
}
