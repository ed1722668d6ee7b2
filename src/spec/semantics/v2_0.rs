use super::{DeclaredParam, check_path_parameters, check_schema_defaults, report_duplicates};
use crate::spec::definitions::DefinitionRegistry;
use crate::spec::dialect::Dialect;
use crate::spec::pointer::{child, normalize_path, parse_pointer, split_ref, to_pointer};
use crate::spec::resolver::find_refs;
use crate::validation::{Code, EntityKind, Findings, check_default};
use serde_json::Value;

pub(crate) const METHODS: &[&str] = &["get", "put", "post", "delete", "options", "head", "patch"];

const SECTIONS: &[(&str, EntityKind)] = &[
    ("definitions", EntityKind::Definition),
    ("parameters", EntityKind::Parameter),
    ("responses", EntityKind::Response),
    ("securityDefinitions", EntityKind::SecurityDefinition),
];

/// Track every reusable entity of a Swagger object and each reference to it
pub(crate) fn index_document(dialect: &dyn Dialect, document: &Value) -> DefinitionRegistry {
    let mut registry = DefinitionRegistry::new();

    for (section, kind) in SECTIONS {
        let Some(entries) = document.get(*section).and_then(Value::as_object) else {
            continue;
        };
        for (name, entry) in entries {
            let location = vec![section.to_string(), name.clone()];
            registry.define(&to_pointer(&location), *kind, location.clone());

            if *kind == EntityKind::SecurityDefinition
                && let Some(scopes) = entry.get("scopes").and_then(Value::as_object)
            {
                for scope in scopes.keys() {
                    let scope_location = child(&child(&location, "scopes"), scope.as_str());
                    registry.define(
                        &to_pointer(&scope_location),
                        EntityKind::SecurityDefinitionScope,
                        scope_location,
                    );
                }
            }
        }
    }

    for site in find_refs(document) {
        let (location, fragment) = split_ref(&site.reference);
        if location.is_some() {
            continue;
        }
        let segments = parse_pointer(fragment);
        if let Some(kind) = dialect.kind_for_pointer(&segments) {
            registry.reference(&to_pointer(&segments), kind, site.path);
        }
    }

    if let Some(definitions) = document.get("definitions").and_then(Value::as_object) {
        for (name, schema) in definitions {
            let Some(members) = schema.get("allOf").and_then(Value::as_array) else {
                continue;
            };
            let child_ptr = to_pointer(&["definitions", name.as_str()]);
            for reference in members.iter().filter_map(|m| m.get("$ref").and_then(Value::as_str)) {
                if let (None, fragment) = split_ref(reference) {
                    let segments = parse_pointer(fragment);
                    if dialect.kind_for_pointer(&segments) == Some(EntityKind::Definition) {
                        registry.add_parent(&child_ptr, &to_pointer(&segments), EntityKind::Definition);
                    }
                }
            }
        }
    }

    if let Some(security) = document.get("security") {
        track_security(&mut registry, security, vec!["security".to_string()]);
    }
    for (operation_path, operation) in operations(document) {
        if let Some(security) = operation.get("security") {
            track_security(&mut registry, security, child(&operation_path, "security"));
        }
    }

    registry.compute_all_lineages();
    registry
}

/// Security requirement objects reference definitions and their scopes
fn track_security(registry: &mut DefinitionRegistry, security: &Value, path: Vec<String>) {
    let Some(requirements) = security.as_array() else {
        return;
    };
    for (index, requirement) in requirements.iter().enumerate() {
        let Some(requirement) = requirement.as_object() else {
            continue;
        };
        let base = child(&path, index.to_string());
        for (name, scopes) in requirement {
            let definition = vec!["securityDefinitions".to_string(), name.clone()];
            let name_path = child(&base, name.as_str());
            registry.reference(&to_pointer(&definition), EntityKind::SecurityDefinition, name_path.clone());

            for (scope_index, scope) in scopes.as_array().into_iter().flatten().enumerate() {
                if let Some(scope) = scope.as_str() {
                    let pointer = to_pointer(&child(&child(&definition, "scopes"), scope));
                    registry.reference(
                        &pointer,
                        EntityKind::SecurityDefinitionScope,
                        child(&name_path, scope_index.to_string()),
                    );
                }
            }
        }
    }
}

/// `(path, operation)` for every operation, in document order
pub(crate) fn operations(document: &Value) -> Vec<(Vec<String>, &Value)> {
    let mut found = Vec::new();
    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        return found;
    };
    for (template, item) in paths {
        for method in METHODS {
            if let Some(operation) = item.get(*method) {
                found.push((
                    vec!["paths".to_string(), template.clone(), method.to_string()],
                    operation,
                ));
            }
        }
    }
    found
}

/// Duplicate paths, operation ids and parameters; path parameter
/// completeness; static default checks.
pub(crate) fn check_document(
    dialect: &dyn Dialect,
    normalized: &Value,
    resolved: &Value,
    findings: &mut Findings,
) {
    let paths = resolved.get("paths").and_then(Value::as_object);

    report_duplicates(
        paths.into_iter().flatten().map(|(template, _)| {
            (normalize_path(template), vec!["paths".to_string(), template.clone()])
        }),
        Code::DuplicateApiPath,
        "API path (or equivalent)",
        findings,
    );

    report_duplicates(
        operations(resolved).into_iter().filter_map(|(path, operation)| {
            operation
                .get("operationId")
                .and_then(Value::as_str)
                .map(|id| (id.to_string(), child(&path, "operationId")))
        }),
        Code::DuplicateOperationId,
        "Operation id",
        findings,
    );

    for (template, item) in paths.into_iter().flatten() {
        let item_path = vec!["paths".to_string(), template.clone()];
        let shared = parameters(item, &child(&item_path, "parameters"));
        report_parameter_duplicates(&shared, findings);
        check_parameter_defaults(dialect, normalized, &shared, findings);

        for method in METHODS {
            let Some(operation) = item.get(*method) else {
                continue;
            };
            let operation_path = child(&item_path, *method);
            let own = parameters(operation, &child(&operation_path, "parameters"));
            report_parameter_duplicates(&own, findings);
            check_parameter_defaults(dialect, normalized, &own, findings);

            // Operation parameters override path-level ones with the same name and location
            let mut merged: Vec<&Parameter> = shared
                .iter()
                .filter(|s| !own.iter().any(|o| o.name == s.name && o.location == s.location))
                .collect();
            merged.extend(own.iter());

            let declared: Vec<DeclaredParam> = merged
                .iter()
                .filter(|p| p.location == "path")
                .map(|p| DeclaredParam {
                    name: p.name.clone(),
                    location: p.path.clone(),
                })
                .collect();
            check_path_parameters(template, &declared, &operation_path, findings);
        }
    }

    for section in ["definitions", "parameters"] {
        let Some(entries) = normalized.get(section).and_then(Value::as_object) else {
            continue;
        };
        for (name, entry) in entries {
            let path = vec![section.to_string(), name.clone()];
            match entry.get("schema") {
                Some(schema) if section == "parameters" => {
                    check_schema_defaults(dialect, schema, &child(&path, "schema"), findings)
                }
                _ => check_schema_defaults(dialect, entry, &path, findings),
            }
        }
    }
}

struct Parameter<'a> {
    name: String,
    location: String,
    path: Vec<String>,
    value: &'a Value,
}

fn parameters<'a>(owner: &'a Value, path: &[String]) -> Vec<Parameter<'a>> {
    owner
        .get("parameters")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
        .filter_map(|(index, value)| {
            Some(Parameter {
                name: value.get("name")?.as_str()?.to_string(),
                location: value.get("in")?.as_str()?.to_string(),
                path: child(path, index.to_string()),
                value,
            })
        })
        .collect()
}

fn report_parameter_duplicates(params: &[Parameter], findings: &mut Findings) {
    report_duplicates(
        params
            .iter()
            .map(|p| (format!("{}:{}", p.location, p.name), child(&p.path, "name"))),
        Code::DuplicateParameter,
        "Parameter (in:name)",
        findings,
    );
}

/// Parameters used through `$ref` are checked where they are declared
fn check_parameter_defaults(
    dialect: &dyn Dialect,
    normalized: &Value,
    params: &[Parameter],
    findings: &mut Findings,
) {
    for param in params {
        let declared = crate::spec::pointer::lookup(normalized, &param.path);
        if declared.is_some_and(|d| d.get("$ref").is_some()) {
            continue;
        }
        match param.value.get("schema") {
            Some(schema) => check_schema_defaults(dialect, schema, &child(&param.path, "schema"), findings),
            None => {
                if let Some(finding) = check_default(param.value, dialect.default_key(), &param.path) {
                    findings.error(finding);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::dialect::Swagger20;
    use serde_json::json;

    fn check(document: &Value) -> Findings {
        let mut findings = Findings::new();
        check_document(&Swagger20, document, document, &mut findings);
        findings
    }

    #[test]
    fn test_equivalent_paths_are_duplicates() {
        let findings = check(&json!({
            "paths": {
                "/pet/{id}": {"get": {"parameters": [{"name": "id", "in": "path", "required": true, "type": "string"}]}},
                "/pet/{petId}": {"get": {"parameters": [{"name": "petId", "in": "path", "required": true, "type": "string"}]}}
            }
        }));
        assert_eq!(findings.errors.len(), 1);
        assert_eq!(findings.errors[0].code, Code::DuplicateApiPath);
        assert_eq!(findings.errors[0].path, vec!["paths", "/pet/{petId}"]);
    }

    #[test]
    fn test_duplicate_operation_ids_and_parameters() {
        let findings = check(&json!({
            "paths": {
                "/a": {"get": {"operationId": "list", "parameters": [
                    {"name": "q", "in": "query", "type": "string"},
                    {"name": "q", "in": "query", "type": "string"},
                    {"name": "q", "in": "header", "type": "string"}
                ]}},
                "/b": {"get": {"operationId": "list"}}
            }
        }));
        let codes: Vec<Code> = findings.errors.iter().map(|f| f.code).collect();
        assert_eq!(codes, vec![Code::DuplicateOperationId, Code::DuplicateParameter]);
        assert_eq!(
            findings.errors[1].path,
            vec!["paths", "/a", "get", "parameters", "1", "name"]
        );
    }

    #[test]
    fn test_path_level_parameters_satisfy_placeholders() {
        let findings = check(&json!({
            "paths": {"/pet/{petId}": {
                "parameters": [{"name": "petId", "in": "path", "required": true, "type": "integer"}],
                "get": {},
                "delete": {"parameters": [{"name": "petId", "in": "path", "required": true, "type": "string"}]}
            }}
        }));
        assert!(findings.errors.is_empty(), "{:?}", findings.errors);
    }

    #[test]
    fn test_invalid_default_is_reported() {
        let findings = check(&json!({
            "paths": {"/pets": {"get": {"parameters": [
                {"name": "limit", "in": "query", "type": "integer", "maximum": 10, "default": 50}
            ]}}}
        }));
        assert_eq!(findings.errors.len(), 1);
        assert_eq!(findings.errors[0].code, Code::Maximum);
        assert_eq!(
            findings.errors[0].path,
            vec!["paths", "/pets", "get", "parameters", "0", "default"]
        );
    }

    #[test]
    fn test_security_requirements_count_as_references() {
        let document = json!({
            "paths": {"/pets": {"get": {"security": [{"oauth": ["read"]}]}}},
            "securityDefinitions": {"oauth": {"type": "oauth2", "scopes": {"read": "", "write": ""}}}
        });
        let registry = index_document(&Swagger20, &document);
        let oauth = registry.get("#/securityDefinitions/oauth").unwrap();
        assert_eq!(oauth.references.len(), 1);
        let write = registry.get("#/securityDefinitions/oauth/scopes/write").unwrap();
        assert!(write.references.is_empty());
        let read = registry.get("#/securityDefinitions/oauth/scopes/read").unwrap();
        assert_eq!(
            read.references[0],
            vec!["paths", "/pets", "get", "security", "0", "oauth", "0"]
        );
    }
}
