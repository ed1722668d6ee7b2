use super::{
    DeclaredParam, check_definitions, check_path_parameters, check_schema_defaults, entity_pointer,
    report_duplicates,
};
use crate::spec::definitions::DefinitionRegistry;
use crate::spec::dialect::{Dialect, Swagger12};
use crate::spec::pointer::{child, normalize_path, parse_pointer, split_ref, to_pointer};
use crate::spec::resolver::find_refs;
use crate::validation::{Code, EntityKind, Finding, Findings};
use serde_json::Value;
use std::collections::HashSet;

/// Rewrite model names used as data types into `#/models/<id>` pointers.
///
/// Property and `items` nodes are pure data types, so `type: "Pet"` (or a
/// bare `$ref: "Pet"`) becomes `$ref: "#/models/Pet"`. Operations and
/// parameters keep their `type`; they are tracked by `index_declaration`.
pub(crate) fn rewrite_type_references(document: &Value, primitives: &[&str]) -> Value {
    let mut normalized = document.clone();

    if let Some(models) = normalized.get_mut("models").and_then(Value::as_object_mut) {
        for model in models.values_mut() {
            if let Some(properties) = model.get_mut("properties").and_then(Value::as_object_mut) {
                for property in properties.values_mut() {
                    rewrite_data_type(property, primitives);
                }
            }
        }
    }

    if let Some(apis) = normalized.get_mut("apis").and_then(Value::as_array_mut) {
        for api in apis {
            let Some(operations) = api.get_mut("operations").and_then(Value::as_array_mut) else {
                continue;
            };
            for operation in operations {
                rewrite_items(operation, primitives);
                if let Some(params) = operation.get_mut("parameters").and_then(Value::as_array_mut) {
                    for param in params {
                        rewrite_items(param, primitives);
                    }
                }
            }
        }
    }

    normalized
}

fn rewrite_data_type(node: &mut Value, primitives: &[&str]) {
    let Some(map) = node.as_object_mut() else {
        return;
    };
    let model = match (map.get("$ref"), map.get("type")) {
        (Some(Value::String(reference)), _) if is_model_id(reference) => Some(reference.clone()),
        (None, Some(Value::String(type_name))) if !primitives.contains(&type_name.as_str()) => {
            Some(type_name.clone())
        }
        _ => None,
    };
    if let Some(model) = model {
        map.remove("type");
        map.insert("$ref".to_string(), Value::String(entity_pointer("models", &model)));
    }
    rewrite_items(node, primitives);
}

fn rewrite_items(node: &mut Value, primitives: &[&str]) {
    if let Some(items) = node.get_mut("items") {
        rewrite_data_type(items, primitives);
    }
}

/// A `$ref` holding a bare model id rather than a pointer or document location
fn is_model_id(reference: &str) -> bool {
    !reference.is_empty()
        && !reference.contains('#')
        && !reference.contains('/')
        && ![".json", ".yaml", ".yml"].iter().any(|ext| reference.ends_with(ext))
}

fn model_type<'a>(node: &'a Value, field: &str, primitives: &[&str]) -> Option<&'a str> {
    node.get(field)
        .and_then(Value::as_str)
        .filter(|name| !primitives.contains(name))
}

/// `(path, operation)` for every operation of an API declaration
pub(crate) fn operations(declaration: &Value) -> Vec<(Vec<String>, &Value)> {
    let mut found = Vec::new();
    let apis = declaration.get("apis").and_then(Value::as_array);
    for (api_index, api) in apis.into_iter().flatten().enumerate() {
        let ops = api.get("operations").and_then(Value::as_array);
        for (op_index, operation) in ops.into_iter().flatten().enumerate() {
            found.push((
                vec![
                    "apis".to_string(),
                    api_index.to_string(),
                    "operations".to_string(),
                    op_index.to_string(),
                ],
                operation,
            ));
        }
    }
    found
}

/// Track models, their `subTypes` links and every model reference
pub(crate) fn index_declaration(dialect: &dyn Dialect, normalized: &Value) -> DefinitionRegistry {
    let mut registry = DefinitionRegistry::new();
    let primitives = dialect.primitives();

    if let Some(models) = normalized.get("models").and_then(Value::as_object) {
        for name in models.keys() {
            let location = vec!["models".to_string(), name.clone()];
            registry.define(&to_pointer(&location), EntityKind::Model, location);
        }
        for (name, model) in models {
            let parent = entity_pointer("models", name);
            let sub_types = model.get("subTypes").and_then(Value::as_array);
            for (index, sub_type) in sub_types.into_iter().flatten().enumerate() {
                let Some(sub_type) = sub_type.as_str() else {
                    continue;
                };
                let child_ptr = entity_pointer("models", sub_type);
                registry.reference(
                    &child_ptr,
                    EntityKind::Model,
                    vec!["models".into(), name.clone(), "subTypes".into(), index.to_string()],
                );
                registry.add_parent(&child_ptr, &parent, EntityKind::Model);
            }
        }
    }

    for site in find_refs(normalized) {
        let (location, fragment) = split_ref(&site.reference);
        if location.is_some() {
            continue;
        }
        let segments = parse_pointer(fragment);
        if let Some(kind) = dialect.kind_for_pointer(&segments) {
            registry.reference(&to_pointer(&segments), kind, site.path);
        }
    }

    for (operation_path, operation) in operations(normalized) {
        if let Some(model) = model_type(operation, "type", primitives) {
            registry.reference(&entity_pointer("models", model), EntityKind::Model, child(&operation_path, "type"));
        }
        let params = operation.get("parameters").and_then(Value::as_array);
        for (index, param) in params.into_iter().flatten().enumerate() {
            if let Some(model) = model_type(param, "type", primitives) {
                let path = child(&child(&child(&operation_path, "parameters"), index.to_string()), "type");
                registry.reference(&entity_pointer("models", model), EntityKind::Model, path);
            }
        }
        let messages = operation.get("responseMessages").and_then(Value::as_array);
        for (index, message) in messages.into_iter().flatten().enumerate() {
            if let Some(model) = model_type(message, "responseModel", primitives) {
                let path = child(
                    &child(&child(&operation_path, "responseMessages"), index.to_string()),
                    "responseModel",
                );
                registry.reference(&entity_pointer("models", model), EntityKind::Model, path);
            }
        }
    }

    registry.compute_all_lineages();
    registry
}

/// Declaration-local checks: model ids, duplicate paths, methods,
/// parameters and response codes, path parameters and default values.
pub(crate) fn check_declaration(dialect: &dyn Dialect, normalized: &Value, findings: &mut Findings) {
    if let Some(models) = normalized.get("models").and_then(Value::as_object) {
        for (name, model) in models {
            let location = vec!["models".to_string(), name.clone()];
            if let Some(id) = model.get("id").and_then(Value::as_str)
                && id != name
            {
                findings.error(
                    Finding::new(
                        Code::ModelIdMismatch,
                        format!("Model id does not match id in models object: {}", id),
                    )
                    .with_path(child(&location, "id")),
                );
            }
            check_schema_defaults(dialect, model, &location, findings);
        }
    }

    let apis = normalized.get("apis").and_then(Value::as_array);
    report_duplicates(
        apis.into_iter().flatten().enumerate().filter_map(|(index, api)| {
            api.get("path").and_then(Value::as_str).map(|path| {
                (normalize_path(path), vec!["apis".to_string(), index.to_string(), "path".to_string()])
            })
        }),
        Code::DuplicateApiPath,
        "API path (or equivalent)",
        findings,
    );

    for (api_index, api) in apis.into_iter().flatten().enumerate() {
        let template = api.get("path").and_then(Value::as_str).unwrap_or_default();
        let api_ops = api.get("operations").and_then(Value::as_array);
        let ops_path = vec!["apis".to_string(), api_index.to_string(), "operations".to_string()];

        report_duplicates(
            api_ops.into_iter().flatten().enumerate().filter_map(|(index, op)| {
                op.get("method")
                    .and_then(Value::as_str)
                    .map(|m| (m.to_ascii_uppercase(), child(&child(&ops_path, index.to_string()), "method")))
            }),
            Code::DuplicateOperationMethod,
            "Operation method",
            findings,
        );

        for (op_index, operation) in api_ops.into_iter().flatten().enumerate() {
            let operation_path = child(&ops_path, op_index.to_string());
            let params_path = child(&operation_path, "parameters");
            let params: Vec<(usize, &Value)> = operation
                .get("parameters")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .enumerate()
                .collect();

            report_duplicates(
                params.iter().filter_map(|(index, param)| {
                    let name = param.get("name")?.as_str()?;
                    let kind = param.get("paramType")?.as_str()?;
                    Some((format!("{}:{}", kind, name), child(&child(&params_path, index.to_string()), "name")))
                }),
                Code::DuplicateParameter,
                "Parameter (paramType:name)",
                findings,
            );

            let declared: Vec<DeclaredParam> = params
                .iter()
                .filter(|(_, p)| p.get("paramType").and_then(Value::as_str) == Some("path"))
                .filter_map(|(index, p)| {
                    Some(DeclaredParam {
                        name: p.get("name")?.as_str()?.to_string(),
                        location: child(&params_path, index.to_string()),
                    })
                })
                .collect();
            check_path_parameters(template, &declared, &operation_path, findings);

            for (index, param) in &params {
                check_schema_defaults(dialect, param, &child(&params_path, index.to_string()), findings);
            }

            let messages_path = child(&operation_path, "responseMessages");
            report_duplicates(
                operation
                    .get("responseMessages")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .enumerate()
                    .filter_map(|(index, message)| {
                        let code = message.get("code")?.as_i64()?;
                        Some((code.to_string(), child(&child(&messages_path, index.to_string()), "code")))
                    }),
                Code::DuplicateResponseMessageCode,
                "Response message code",
                findings,
            );
        }
    }
}

/// Cross-document checks between a resource listing and its declarations.
///
/// Declarations are visited in submission order, so the second declaration
/// claiming a resource path is the duplicate.
pub(crate) fn check_listing(
    listing: &Value,
    declarations: &[&Value],
    listing_findings: &mut Findings,
    declaration_findings: &mut [Findings],
) {
    let apis = listing.get("apis").and_then(Value::as_array);
    let listed: Vec<(String, Vec<String>)> = apis
        .into_iter()
        .flatten()
        .enumerate()
        .filter_map(|(index, api)| {
            api.get("path").and_then(Value::as_str).map(|path| {
                (path.to_string(), vec!["apis".to_string(), index.to_string(), "path".to_string()])
            })
        })
        .collect();
    report_duplicates(
        listed.iter().cloned(),
        Code::DuplicateResourcePath,
        "Resource path",
        listing_findings,
    );

    let mut registry = DefinitionRegistry::new();
    if let Some(authorizations) = listing.get("authorizations").and_then(Value::as_object) {
        for (name, authorization) in authorizations {
            let location = vec!["authorizations".to_string(), name.clone()];
            registry.define(&to_pointer(&location), EntityKind::Authorization, location.clone());

            let scopes = authorization.get("scopes").and_then(Value::as_array);
            let scopes: Vec<(String, Vec<String>)> = scopes
                .into_iter()
                .flatten()
                .enumerate()
                .filter_map(|(index, scope)| {
                    let scope = scope.get("scope")?.as_str()?;
                    Some((scope.to_string(), child(&child(&location, "scopes"), index.to_string())))
                })
                .collect();
            report_duplicates(
                scopes.iter().map(|(scope, path)| (scope.clone(), child(path, "scope"))),
                Code::DuplicateAuthorizationScopeDefinition,
                "Authorization scope definition",
                listing_findings,
            );
            for (scope, path) in scopes {
                let pointer = to_pointer(&child(&child(&location, "scopes"), scope));
                registry.define(&pointer, EntityKind::AuthorizationScope, path);
            }
        }
    }

    let mut claimed: HashSet<String> = HashSet::new();
    for (declaration, findings) in declarations.iter().zip(declaration_findings.iter_mut()) {
        if let Some(resource_path) = declaration.get("resourcePath").and_then(Value::as_str) {
            if claimed.contains(resource_path) {
                findings.error(
                    Finding::new(
                        Code::DuplicateResourcePath,
                        format!("Resource path already defined: {}", resource_path),
                    )
                    .with_path(["resourcePath"]),
                );
            } else if !listed.iter().any(|(path, _)| path == resource_path) {
                findings.error(
                    Finding::new(
                        Code::Unresolvable(EntityKind::ResourcePath),
                        format!("Resource path could not be resolved: {}", resource_path),
                    )
                    .with_path(["resourcePath"]),
                );
            }
            claimed.insert(resource_path.to_string());
        }

        if let Some(authorizations) = declaration.get("authorizations") {
            track_authorizations(&mut registry, authorizations, vec!["authorizations".into()], findings);
        }
        for (operation_path, operation) in operations(declaration) {
            if let Some(authorizations) = operation.get("authorizations") {
                track_authorizations(&mut registry, authorizations, child(&operation_path, "authorizations"), findings);
            }
        }
    }

    for (path, location) in &listed {
        if !claimed.contains(path) {
            listing_findings.warning(
                Finding::new(
                    Code::Unused(EntityKind::ResourcePath),
                    format!("Resource path is defined but is not used: {}", path),
                )
                .with_path(location.clone()),
            );
        }
    }

    check_definitions(&Swagger12, listing, &registry, listing_findings);
}

/// Authorization references in a declaration must name listing entries
fn track_authorizations(
    registry: &mut DefinitionRegistry,
    authorizations: &Value,
    path: Vec<String>,
    findings: &mut Findings,
) {
    let Some(authorizations) = authorizations.as_object() else {
        return;
    };
    for (name, scopes) in authorizations {
        let definition = vec!["authorizations".to_string(), name.clone()];
        let pointer = to_pointer(&definition);
        let name_path = child(&path, name.as_str());

        if registry.get(&pointer).is_some_and(|n| n.is_defined()) {
            registry.reference(&pointer, EntityKind::Authorization, name_path.clone());
        } else {
            findings.error(
                Finding::new(
                    Code::Unresolvable(EntityKind::Authorization),
                    format!("Could not resolve authorization: {}", pointer),
                )
                .with_path(name_path.clone()),
            );
            continue;
        }

        for (index, scope) in scopes.as_array().into_iter().flatten().enumerate() {
            let Some(scope) = scope.get("scope").and_then(Value::as_str) else {
                continue;
            };
            let scope_pointer = to_pointer(&child(&child(&definition, "scopes"), scope));
            let scope_path = child(&child(&name_path, index.to_string()), "scope");
            if registry.get(&scope_pointer).is_some_and(|n| n.is_defined()) {
                registry.reference(&scope_pointer, EntityKind::AuthorizationScope, scope_path);
            } else {
                findings.error(
                    Finding::new(
                        Code::Unresolvable(EntityKind::AuthorizationScope),
                        format!("Could not resolve authorization scope: {}", scope_pointer),
                    )
                    .with_path(scope_path),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn primitives() -> &'static [&'static str] {
        Swagger12.primitives()
    }

    #[test]
    fn test_implicit_type_references_are_rewritten() {
        let declaration = json!({
            "models": {"Pet": {"id": "Pet", "properties": {
                "category": {"type": "Category"},
                "tags": {"type": "array", "items": {"$ref": "Tag"}},
                "name": {"type": "string"}
            }}},
            "apis": [{"path": "/pet", "operations": [{
                "method": "GET", "type": "array", "items": {"type": "Pet"}
            }]}]
        });
        let normalized = rewrite_type_references(&declaration, primitives());
        let properties = &normalized["models"]["Pet"]["properties"];
        assert_eq!(properties["category"], json!({"$ref": "#/models/Category"}));
        assert_eq!(properties["tags"]["items"], json!({"$ref": "#/models/Tag"}));
        assert_eq!(properties["name"], json!({"type": "string"}));
        assert_eq!(
            normalized["apis"][0]["operations"][0]["items"],
            json!({"$ref": "#/models/Pet"})
        );
    }

    #[test]
    fn test_operation_types_are_tracked_as_references() {
        let declaration = json!({
            "models": {"Pet": {"id": "Pet", "properties": {}}},
            "apis": [{"path": "/pet", "operations": [{
                "method": "GET",
                "type": "Pet",
                "responseMessages": [{"code": 404, "message": "gone", "responseModel": "Missing"}]
            }]}]
        });
        let registry = index_declaration(&Swagger12, &declaration);
        assert_eq!(registry.get("#/models/Pet").unwrap().references.len(), 1);
        let missing = registry.get("#/models/Missing").unwrap();
        assert!(!missing.is_defined());
        assert_eq!(
            missing.references[0],
            vec!["apis", "0", "operations", "0", "responseMessages", "0", "responseModel"]
        );
    }

    #[test]
    fn test_sub_types_build_lineage_and_flag_multiple_parents() {
        let declaration = json!({
            "models": {
                "Animal": {"id": "Animal", "subTypes": ["Dog"], "properties": {}},
                "Pet": {"id": "Pet", "subTypes": ["Dog"], "properties": {}},
                "Dog": {"id": "Dog", "properties": {}}
            }
        });
        let registry = index_declaration(&Swagger12, &declaration);
        let dog = registry.get("#/models/Dog").unwrap();
        assert_eq!(dog.parents.len(), 2);

        let mut findings = Findings::new();
        check_definitions(&Swagger12, &declaration, &registry, &mut findings);
        assert_eq!(findings.errors[0].code.to_string(), "MULTIPLE_MODEL_INHERITANCE");
    }

    #[test]
    fn test_declaration_checks() {
        let declaration = json!({
            "models": {"Pet": {"id": "Animal", "properties": {}}},
            "apis": [{"path": "/pet/{petId}", "operations": [
                {"method": "GET", "parameters": [], "responseMessages": [
                    {"code": 400, "message": "a"}, {"code": 400, "message": "b"}
                ]},
                {"method": "get", "parameters": [
                    {"name": "petId", "paramType": "path", "type": "string"}
                ]}
            ]}]
        });
        let mut findings = Findings::new();
        check_declaration(&Swagger12, &declaration, &mut findings);
        let codes: Vec<String> = findings.errors.iter().map(|f| f.code.to_string()).collect();
        assert_eq!(
            codes,
            vec![
                "MODEL_ID_MISMATCH",
                "DUPLICATE_OPERATION_METHOD",
                "MISSING_API_PATH_PARAMETER",
                "DUPLICATE_RESPONSE_MESSAGE_CODE"
            ]
        );
    }

    #[test]
    fn test_listing_cross_checks_in_submission_order() {
        let listing = json!({
            "swaggerVersion": "1.2",
            "apis": [{"path": "/pet"}, {"path": "/store"}, {"path": "/pet"}],
            "authorizations": {"oauth2": {"type": "oauth2", "scopes": [
                {"scope": "write"}, {"scope": "read"}, {"scope": "write"}
            ]}}
        });
        let pet = json!({"resourcePath": "/pet", "authorizations": {"oauth2": [{"scope": "write"}]}});
        let again = json!({"resourcePath": "/pet"});
        let user = json!({"resourcePath": "/user", "authorizations": {"apiKey": []}});

        let mut listing_findings = Findings::new();
        let mut declaration_findings = vec![Findings::new(), Findings::new(), Findings::new()];
        check_listing(&listing, &[&pet, &again, &user], &mut listing_findings, &mut declaration_findings);

        let codes = |f: &Findings| f.errors.iter().map(|e| e.code.to_string()).collect::<Vec<_>>();
        assert_eq!(
            codes(&listing_findings),
            vec!["DUPLICATE_RESOURCE_PATH", "DUPLICATE_AUTHORIZATION_SCOPE_DEFINITION"]
        );
        assert!(declaration_findings[0].errors.is_empty());
        assert_eq!(codes(&declaration_findings[1]), vec!["DUPLICATE_RESOURCE_PATH"]);
        assert_eq!(
            codes(&declaration_findings[2]),
            vec!["UNRESOLVABLE_RESOURCE_PATH", "UNRESOLVABLE_AUTHORIZATION"]
        );

        let warnings: Vec<String> = listing_findings.warnings.iter().map(|w| w.code.to_string()).collect();
        assert_eq!(warnings, vec!["UNUSED_RESOURCE_PATH", "UNUSED_AUTHORIZATION_SCOPE"]);
    }
}
