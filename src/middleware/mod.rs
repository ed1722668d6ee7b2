//! Request validation middleware for Swagger 2.0 documents.
//!
//! Requests whose method and path match an operation of the document are
//! checked before they reach the handler: the content type against the
//! accepted media types, then every declared parameter. Any finding turns
//! into a `400` with `{message, errors}`; unmatched requests pass through.

mod params;

pub use params::{RequestValues, parse_pairs, split_collection};

use crate::error::{Result, WardenError};
use crate::spec::pointer::{child, lookup, parse_pointer, path_matcher, sanitize_group};
use crate::spec::semantics::v2_0::METHODS;
use crate::spec::{Specification, Version};
use crate::validation::{
    Code, ConstraintValidator, Finding, check_content_type, check_presence, merge_consumes,
};
use axum::Json;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Largest request body buffered for validation
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug)]
struct RouteParameter {
    name: String,
    location: String,
    required: bool,
    /// The parameter itself, or its `schema` for body parameters
    schema: Value,
    /// Model behind a body parameter's `$ref` schema
    model: Option<String>,
    /// That model, composed once when the validator is built
    composed: Option<Value>,
}

#[derive(Debug)]
struct Route {
    method: Method,
    template: String,
    matcher: Regex,
    consumes: Vec<String>,
    parameters: Vec<RouteParameter>,
}

struct Inner {
    resolved: Value,
    routes: Vec<Route>,
}

/// Validates requests against one Swagger 2.0 document
#[derive(Clone)]
pub struct RequestValidator {
    inner: Arc<Inner>,
}

#[derive(Debug, Serialize)]
struct Rejection {
    message: String,
    errors: Vec<Finding>,
}

impl RequestValidator {
    /// Validate `document`, index its operations and compose every body model.
    ///
    /// Fails if the document has errors, a body model cannot be composed or
    /// the engine is not Swagger 2.0.
    pub async fn new(spec: Arc<Specification>, document: Value) -> Result<Self> {
        if spec.version() != Version::V2_0 {
            return Err(WardenError::InvalidArgument(format!(
                "Request validation supports Swagger 2.0 documents only, not {}",
                spec.version()
            )));
        }

        if let Some(report) = spec.validate(&document, None).await?
            && !report.is_valid()
        {
            return Err(WardenError::InvalidDocument(Box::new(report)));
        }

        let resolved = spec.resolve(&document, None).await?;
        let mut routes = build_routes(&document, &resolved);
        compose_body_models(&spec, &document, &mut routes).await?;
        tracing::info!(routes = routes.len(), "Request validation enabled");

        Ok(Self {
            inner: Arc::new(Inner { resolved, routes }),
        })
    }

    /// The fully resolved document
    pub fn resolved(&self) -> &Value {
        &self.inner.resolved
    }

    fn route(&self, method: &Method, path: &str) -> Option<(&Route, HashMap<String, String>)> {
        self.inner
            .routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                let captures = route.matcher.captures(path)?;
                let values = route
                    .parameters
                    .iter()
                    .filter(|p| p.location == "path")
                    .filter_map(|p| {
                        let value = captures.name(&sanitize_group(&p.name))?;
                        let decoded = percent_decode_str(value.as_str()).decode_utf8_lossy();
                        Some((p.name.clone(), decoded.into_owned()))
                    })
                    .collect();
                Some((route, values))
            })
    }

    /// Findings for one request; `None` when no operation matches it
    pub fn check(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Option<Vec<Finding>> {
        let (route, path) = self.route(method, uri.path())?;
        Some(self.check_route(route, path, uri, headers, body))
    }

    fn check_route(
        &self,
        route: &Route,
        path: HashMap<String, String>,
        uri: &Uri,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Vec<Finding> {
        let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
        if let Err(finding) = check_content_type(&route.consumes, content_type, route.method.as_str()) {
            return vec![finding];
        }

        let is_form = content_type
            .map(|value| value.trim_start().starts_with(FORM_CONTENT_TYPE))
            .unwrap_or(false);
        let values = RequestValues {
            query: parse_pairs(uri.query().unwrap_or_default().as_bytes()),
            form: if is_form { parse_pairs(body) } else { HashMap::new() },
            path,
            headers,
            body,
        };

        let mut findings = Vec::new();
        for parameter in &route.parameters {
            let path = vec![parameter.location.clone(), parameter.name.clone()];
            let value = match values.get(&parameter.location, &parameter.name, &parameter.schema) {
                Ok(value) => value,
                Err(finding) => {
                    findings.push(finding.with_path(path));
                    continue;
                }
            };

            let has_default = parameter.schema.get("default").is_some();
            match check_presence(value.as_ref(), parameter.required, has_default, &path) {
                Err(finding) => findings.push(finding),
                Ok(true) => {
                    if let Some(value) = value {
                        findings.extend(check_parameter(parameter, &value, &path));
                    }
                }
                Ok(false) => {}
            }
        }

        if !findings.is_empty() {
            tracing::debug!(
                method = %route.method,
                template = %route.template,
                findings = findings.len(),
                "Request parameters failed validation"
            );
        }
        findings
    }
}

fn check_parameter(parameter: &RouteParameter, value: &Value, path: &[String]) -> Vec<Finding> {
    if parameter.location != "body" {
        return ConstraintValidator::new()
            .check_value(value, &parameter.schema, path)
            .err()
            .into_iter()
            .collect();
    }

    match &parameter.composed {
        Some(composed) => ConstraintValidator::with_root(composed).validate_object(value, composed, path),
        None => ConstraintValidator::new().validate_object(value, &parameter.schema, path),
    }
}

/// Compose each distinct body model once and attach it to its parameters
async fn compose_body_models(
    spec: &Specification,
    document: &Value,
    routes: &mut [Route],
) -> Result<()> {
    let mut composed: HashMap<String, Value> = HashMap::new();
    for parameter in routes.iter_mut().flat_map(|route| route.parameters.iter_mut()) {
        let Some(model) = &parameter.model else {
            continue;
        };
        if !composed.contains_key(model) {
            let schema = spec
                .compose_schema(document, model)
                .await?
                .ok_or_else(|| WardenError::UnresolvableReference(model.clone()))?;
            composed.insert(model.clone(), schema);
        }
        parameter.composed = composed.get(model).cloned();
    }
    Ok(())
}

/// Axum middleware; install with `axum::middleware::from_fn_with_state`
pub async fn validate_request(
    State(validator): State<RequestValidator>,
    request: Request,
    next: Next,
) -> Response {
    let Some((route, path)) = validator.route(request.method(), request.uri().path()) else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!(%error, "Unable to read request body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let findings = validator.check_route(route, path, &parts.uri, &parts.headers, &bytes);
    if !findings.is_empty() {
        tracing::warn!(
            method = %parts.method,
            path = %parts.uri.path(),
            errors = findings.len(),
            "Rejected request"
        );
        return rejection(findings);
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn rejection(errors: Vec<Finding>) -> Response {
    let message = errors
        .first()
        .map(|finding| finding.message.clone())
        .unwrap_or_else(|| Code::SchemaViolation.to_string());
    (StatusCode::BAD_REQUEST, Json(Rejection { message, errors })).into_response()
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// `(pointer path, parameter)` pairs of a path item or operation
fn declared_parameters<'a>(owner: &'a Value, path: &[String]) -> Vec<(Vec<String>, &'a Value)> {
    owner
        .get("parameters")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(index, parameter)| (child(&child(path, "parameters"), index.to_string()), parameter))
        .collect()
}

fn parameter_key(parameter: &Value) -> (Option<&str>, Option<&str>) {
    (
        parameter.get("name").and_then(Value::as_str),
        parameter.get("in").and_then(Value::as_str),
    )
}

fn build_routes(original: &Value, resolved: &Value) -> Vec<Route> {
    let base = resolved
        .get("basePath")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim_end_matches('/');
    let global_consumes = strings(resolved.get("consumes"));

    let mut routes = Vec::new();
    let Some(paths) = resolved.get("paths").and_then(Value::as_object) else {
        return routes;
    };

    for (template, item) in paths {
        let item_path = vec!["paths".to_string(), template.clone()];
        let shared = declared_parameters(item, &item_path);
        let full_template = format!("{}{}", base, template);
        let Some(matcher) = path_matcher(&full_template) else {
            tracing::warn!(template = %full_template, "Unable to build a matcher for path");
            continue;
        };

        for method in METHODS {
            let Some(operation) = item.get(*method) else {
                continue;
            };
            let Ok(http_method) = Method::from_bytes(method.to_ascii_uppercase().as_bytes()) else {
                continue;
            };

            let own = declared_parameters(operation, &child(&item_path, *method));
            let mut merged: Vec<(Vec<String>, &Value)> = shared
                .iter()
                .filter(|(_, s)| !own.iter().any(|(_, o)| parameter_key(o) == parameter_key(s)))
                .cloned()
                .collect();
            merged.extend(own);

            let parameters = merged
                .into_iter()
                .filter_map(|(path, parameter)| route_parameter(original, &path, parameter))
                .collect();

            routes.push(Route {
                method: http_method,
                template: full_template.clone(),
                matcher: matcher.clone(),
                consumes: merge_consumes(&global_consumes, &strings(operation.get("consumes"))),
                parameters,
            });
        }
    }
    routes
}

fn route_parameter(original: &Value, path: &[String], parameter: &Value) -> Option<RouteParameter> {
    let (name, location) = parameter_key(parameter);
    let (name, location) = (name?.to_string(), location?.to_string());
    let required = parameter.get("required").and_then(Value::as_bool).unwrap_or(false);

    if location == "body" {
        return Some(RouteParameter {
            name,
            location,
            required,
            schema: parameter.get("schema").cloned().unwrap_or(Value::Null),
            model: body_model(original, path),
            composed: None,
        });
    }

    Some(RouteParameter {
        name,
        location,
        required,
        schema: parameter.clone(),
        model: None,
        composed: None,
    })
}

/// The `#/definitions/...` reference of a body parameter in the original document
fn body_model(original: &Value, path: &[String]) -> Option<String> {
    let mut parameter = lookup(original, path)?;
    if let Some(reference) = parameter.get("$ref").and_then(Value::as_str) {
        parameter = lookup(original, &parse_pointer(reference))?;
    }
    parameter
        .get("schema")?
        .get("$ref")?
        .as_str()
        .filter(|reference| reference.starts_with("#/definitions/"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EngineOptions, SpecRegistry};
    use serde_json::json;

    #[test]
    fn test_routes_merge_path_level_parameters() {
        let document = json!({
            "basePath": "/v1",
            "consumes": ["application/json"],
            "paths": {
                "/pets/{petId}": {
                    "parameters": [
                        {"name": "petId", "in": "path", "required": true, "type": "string"},
                        {"name": "verbose", "in": "query", "type": "boolean"}
                    ],
                    "get": {},
                    "put": {
                        "consumes": ["application/xml"],
                        "parameters": [
                            {"name": "petId", "in": "path", "required": true, "type": "integer"},
                            {"name": "body", "in": "body", "schema": {"$ref": "#/definitions/Pet"}}
                        ]
                    }
                }
            }
        });
        let routes = build_routes(&document, &document);
        assert_eq!(routes.len(), 2);

        let put = routes.iter().find(|r| r.method == Method::PUT).unwrap();
        assert_eq!(put.template, "/v1/pets/{petId}");
        assert_eq!(put.consumes, vec!["application/json", "application/xml"]);
        let names: Vec<&str> = put.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["verbose", "petId", "body"]);
        assert_eq!(put.parameters[1].schema["type"], "integer");
        assert_eq!(put.parameters[2].model.as_deref(), Some("#/definitions/Pet"));
        assert!(put.matcher.is_match("/v1/pets/12"));
        assert!(!put.matcher.is_match("/pets/12"));
    }

    fn local_spec() -> Specification {
        Specification::with_options(
            Version::V2_0,
            Arc::new(SpecRegistry::new()),
            EngineOptions::default().local_only(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_body_models_are_composed_once_up_front() {
        let document = json!({
            "swagger": "2.0",
            "info": {"title": "Pets", "version": "1"},
            "paths": {
                "/pets": {
                    "post": {
                        "parameters": [{"name": "pet", "in": "body", "schema": {"$ref": "#/definitions/Pet"}}],
                        "responses": {"201": {"description": "created"}}
                    },
                    "put": {
                        "parameters": [{"name": "pet", "in": "body", "schema": {"$ref": "#/definitions/Pet"}}],
                        "responses": {"200": {"description": "updated"}}
                    }
                }
            },
            "definitions": {"Pet": {"required": ["name"], "properties": {"name": {"type": "string"}}}}
        });
        let mut routes = build_routes(&document, &document);
        compose_body_models(&local_spec(), &document, &mut routes).await.unwrap();

        for route in &routes {
            let composed = route.parameters[0].composed.as_ref().unwrap();
            assert_eq!(composed["title"], "Composed Pet");
        }
        let findings = check_parameter(&routes[0].parameters[0], &json!({}), &["body".to_string()]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, Code::ObjectMissingRequiredProperty);
    }

    #[tokio::test]
    async fn test_uncomposable_body_model_is_an_error() {
        let document = json!({
            "swagger": "2.0",
            "info": {"title": "Pets", "version": "1"},
            "paths": {
                "/pets": {
                    "post": {
                        "parameters": [{"name": "pet", "in": "body", "schema": {"$ref": "#/definitions/Ghost"}}],
                        "responses": {"201": {"description": "created"}}
                    }
                }
            }
        });
        let mut routes = build_routes(&document, &document);
        assert!(compose_body_models(&local_spec(), &document, &mut routes).await.is_err());
        assert!(RequestValidator::new(Arc::new(local_spec()), document).await.is_err());
    }

    #[test]
    fn test_body_model_follows_parameter_references() {
        let original = json!({
            "parameters": {"pet": {"name": "pet", "in": "body", "schema": {"$ref": "#/definitions/Pet"}}},
            "paths": {"/pets": {"post": {"parameters": [{"$ref": "#/parameters/pet"}]}}}
        });
        let path: Vec<String> = ["paths", "/pets", "post", "parameters", "0"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(body_model(&original, &path).as_deref(), Some("#/definitions/Pet"));
    }
}
