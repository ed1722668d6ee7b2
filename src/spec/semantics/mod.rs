//! Document-level semantic checks.
//!
//! Every check runs regardless of what the others found; findings accumulate
//! into one `Findings` value per document.

pub(crate) mod v1_2;
pub(crate) mod v2_0;

use super::definitions::DefinitionRegistry;
use super::dialect::Dialect;
use super::pointer::{child, lookup, parse_pointer, path_params, split_ref, to_pointer};
use super::resolver::UnresolvedRef;
use crate::validation::{Code, EntityKind, Finding, Findings, check_default};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// A declared parameter with the location it was declared at
pub(crate) struct DeclaredParam {
    pub name: String,
    pub location: Vec<String>,
}

/// Checks driven entirely by the definition registry: unresolved and unused
/// entities, then inheritance integrity for models.
pub fn check_definitions(
    dialect: &dyn Dialect,
    normalized: &Value,
    definitions: &DefinitionRegistry,
    findings: &mut Findings,
) {
    for node in definitions.nodes() {
        if !node.is_defined() {
            for reference in &node.references {
                findings.error(
                    Finding::new(
                        Code::Unresolvable(node.kind),
                        format!("Could not resolve {}: {}", node.kind.label(), node.path),
                    )
                    .with_path(reference.clone()),
                );
            }
            continue;
        }

        if node.references.is_empty()
            && let Some(location) = &node.location
        {
            findings.warning(
                Finding::new(
                    Code::Unused(node.kind),
                    format!("{} is defined but is not used: {}", capitalize(node.kind.label()), node.path),
                )
                .with_path(location.clone()),
            );
        }
    }

    check_inheritance(dialect, normalized, definitions, findings);
}

fn check_inheritance(
    dialect: &dyn Dialect,
    normalized: &Value,
    definitions: &DefinitionRegistry,
    findings: &mut Findings,
) {
    let kind = dialect.model_kind();

    for node in definitions.nodes().filter(|n| n.kind.is_model()) {
        let Some(location) = &node.location else {
            continue;
        };
        let Some(model) = lookup(normalized, location) else {
            continue;
        };

        if node.parents.len() > 1 && !dialect.allows_multiple_inheritance() {
            findings.error(
                Finding::new(
                    Code::MultipleInheritance(kind),
                    format!(
                        "Child {} is sub type of multiple models: {}",
                        kind.label(),
                        node.parents.join(" && ")
                    ),
                )
                .with_path(location.clone()),
            );
        }

        let own = dialect.own_schema(model);
        let own_properties = property_names(&own);
        let mut inherited: Vec<String> = Vec::new();
        for ancestor in node.lineage() {
            let ancestor_model = definitions
                .get(ancestor)
                .and_then(|a| a.location.as_ref())
                .and_then(|l| lookup(normalized, l));
            if let Some(ancestor_model) = ancestor_model {
                for name in property_names(&dialect.own_schema(ancestor_model)) {
                    if !inherited.contains(&name) {
                        inherited.push(name);
                    }
                }
            }
        }

        for name in own_properties.iter().filter(|p| inherited.contains(p)) {
            findings.error(
                Finding::new(
                    Code::ChildRedeclaresProperty(kind),
                    format!("Child {} declares property already declared by ancestor: {}", kind.label(), name),
                )
                .with_path(child(&child(location, "properties"), name.as_str())),
            );
        }

        if let Some(required) = own.get("required").and_then(Value::as_array) {
            for (index, name) in required.iter().enumerate() {
                let Some(name) = name.as_str() else {
                    continue;
                };
                if !own_properties.iter().any(|p| p == name) && !inherited.iter().any(|p| p == name) {
                    findings.error(
                        Finding::new(
                            Code::MissingRequiredProperty(kind),
                            format!("{} requires property but it is not defined: {}", capitalize(kind.label()), name),
                        )
                        .with_path(child(&child(location, "required"), index.to_string())),
                    );
                }
            }
        }
    }

    for cycle in definitions.cycles() {
        let location = cycle
            .first()
            .and_then(|p| definitions.get(p))
            .and_then(|n| n.location.clone())
            .unwrap_or_default();
        findings.error(
            Finding::new(
                Code::CyclicalInheritance(kind),
                format!("{} has a circular inheritance: {}", capitalize(kind.label()), cycle.join(" -> ")),
            )
            .with_path(location),
        );
    }
}

/// Unresolvable references that do not name a tracked entity kind
pub fn check_unresolved_references(
    dialect: &dyn Dialect,
    unresolved: &[UnresolvedRef],
    findings: &mut Findings,
) {
    for entry in unresolved {
        let (location, fragment) = split_ref(&entry.reference);
        if location.is_none() && dialect.kind_for_pointer(&parse_pointer(fragment)).is_some() {
            continue;
        }
        findings.error(
            Finding::new(
                Code::Unresolvable(EntityKind::Reference),
                format!("Could not resolve reference: {}", entry.reference),
            )
            .with_path(entry.path.clone()),
        );
    }
}

/// Compare a path template's placeholders with its declared path parameters
pub(crate) fn check_path_parameters(
    template: &str,
    declared: &[DeclaredParam],
    operation_path: &[String],
    findings: &mut Findings,
) {
    let placeholders = path_params(template);

    for name in &placeholders {
        if !declared.iter().any(|p| &p.name == name) {
            findings.error(
                Finding::new(
                    Code::MissingApiPathParameter,
                    format!("API requires path parameter but it is not defined: {}", name),
                )
                .with_path(operation_path.to_vec()),
            );
        }
    }

    for param in declared {
        if !placeholders.contains(&param.name) {
            findings.error(
                Finding::new(
                    Code::UnresolvableApiPathParameter,
                    format!("API path parameter could not be resolved: {}", param.name),
                )
                .with_path(child(&param.location, "name")),
            );
        }
    }
}

/// Static default checks for a schema and every inline schema under it.
///
/// `$ref` nodes are skipped; the referenced entity is checked where it is
/// declared.
pub(crate) fn check_schema_defaults(
    dialect: &dyn Dialect,
    schema: &Value,
    path: &[String],
    findings: &mut Findings,
) {
    let Some(map) = schema.as_object() else {
        return;
    };
    if map.contains_key("$ref") {
        return;
    }

    if let Some(finding) = check_default(schema, dialect.default_key(), path) {
        findings.error(finding);
    }

    if let Some(properties) = map.get("properties").and_then(Value::as_object) {
        let base = child(path, "properties");
        for (name, property) in properties {
            check_schema_defaults(dialect, property, &child(&base, name.as_str()), findings);
        }
    }
    match map.get("items") {
        Some(Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                check_schema_defaults(dialect, item, &child(&child(path, "items"), index.to_string()), findings);
            }
        }
        Some(item) => check_schema_defaults(dialect, item, &child(path, "items"), findings),
        None => {}
    }
    if let Some(additional @ Value::Object(_)) = map.get("additionalProperties") {
        check_schema_defaults(dialect, additional, &child(path, "additionalProperties"), findings);
    }
    if let Some(members) = map.get("allOf").and_then(Value::as_array) {
        for (index, member) in members.iter().enumerate() {
            check_schema_defaults(dialect, member, &child(&child(path, "allOf"), index.to_string()), findings);
        }
    }
}

/// Report every value that occurs more than once, at each repeat's location
pub(crate) fn report_duplicates<I>(items: I, code: Code, describe: &str, findings: &mut Findings)
where
    I: IntoIterator<Item = (String, Vec<String>)>,
{
    let mut seen = HashSet::new();
    for (key, location) in items {
        if !seen.insert(key.clone()) {
            findings.error(
                Finding::new(code, format!("{} already defined: {}", describe, key)).with_path(location),
            );
        }
    }
}

fn property_names(schema: &Map<String, Value>) -> Vec<String> {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|p| p.keys().cloned().collect())
        .unwrap_or_default()
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Canonical pointer for `#/<section>/<name>`
pub(crate) fn entity_pointer(section: &str, name: &str) -> String {
    to_pointer(&[section, name])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::dialect::Version;
    use serde_json::json;

    fn findings_for(document: Value) -> Findings {
        let dialect = Version::V2_0.dialect();
        let definitions = dialect.index(&document);
        let mut findings = Findings::new();
        check_definitions(dialect, &document, &definitions, &mut findings);
        findings
    }

    #[test]
    fn test_unresolved_and_unused_definitions() {
        let findings = findings_for(json!({
            "swagger": "2.0",
            "paths": {"/pets": {"get": {"responses": {"200": {
                "description": "ok",
                "schema": {"$ref": "#/definitions/Missing"}
            }}}}},
            "definitions": {"Orphan": {"type": "object"}}
        }));

        assert_eq!(findings.errors.len(), 1);
        assert_eq!(findings.errors[0].code.to_string(), "UNRESOLVABLE_DEFINITION");
        assert_eq!(
            findings.errors[0].pointer(),
            "#/paths/~1pets/get/responses/200/schema/$ref"
        );
        assert_eq!(findings.warnings.len(), 1);
        assert_eq!(findings.warnings[0].code.to_string(), "UNUSED_DEFINITION");
        assert_eq!(findings.warnings[0].path, vec!["definitions", "Orphan"]);
    }

    #[test]
    fn test_child_redeclares_and_missing_required() {
        let findings = findings_for(json!({
            "swagger": "2.0",
            "paths": {},
            "definitions": {
                "Pet": {"properties": {"name": {"type": "string"}}},
                "Dog": {
                    "allOf": [{"$ref": "#/definitions/Pet"}],
                    "required": ["name", "bark", "ghost"],
                    "properties": {"name": {"type": "string"}, "bark": {"type": "boolean"}}
                }
            }
        }));
        let codes: Vec<String> = findings.errors.iter().map(|f| f.code.to_string()).collect();
        assert_eq!(
            codes,
            vec!["CHILD_DEFINITION_REDECLARES_PROPERTY", "MISSING_REQUIRED_DEFINITION_PROPERTY"]
        );
        assert!(findings.errors[1].message.ends_with("ghost"));
    }

    #[test]
    fn test_cycle_reported_once_with_full_path() {
        let findings = findings_for(json!({
            "swagger": "2.0",
            "paths": {},
            "definitions": {
                "A": {"allOf": [{"$ref": "#/definitions/B"}]},
                "B": {"allOf": [{"$ref": "#/definitions/A"}]}
            }
        }));
        let cycles: Vec<&Finding> = findings
            .errors
            .iter()
            .filter(|f| f.code == Code::CyclicalInheritance(EntityKind::Definition))
            .collect();
        assert_eq!(cycles.len(), 1);
        assert!(
            cycles[0]
                .message
                .ends_with("#/definitions/A -> #/definitions/B -> #/definitions/A")
        );
    }

    #[test]
    fn test_path_parameter_completeness() {
        let mut findings = Findings::new();
        let declared = vec![DeclaredParam {
            name: "other".to_string(),
            location: vec!["paths".into(), "/pet/{id}".into(), "get".into(), "parameters".into(), "0".into()],
        }];
        let op = vec!["paths".to_string(), "/pet/{id}".to_string(), "get".to_string()];
        check_path_parameters("/pet/{id}", &declared, &op, &mut findings);

        assert_eq!(findings.errors.len(), 2);
        assert_eq!(findings.errors[0].code, Code::MissingApiPathParameter);
        assert_eq!(findings.errors[0].path, op);
        assert_eq!(findings.errors[1].code, Code::UnresolvableApiPathParameter);
        assert_eq!(findings.errors[1].path.last().map(String::as_str), Some("name"));
    }

    #[test]
    fn test_schema_default_checks_recurse() {
        let dialect = Version::V2_0.dialect();
        let schema = json!({
            "type": "object",
            "properties": {
                "age": {"type": "integer", "minimum": 1, "default": 0},
                "tags": {"type": "array", "items": {"type": "string", "maxLength": 2, "default": "long"}}
            }
        });
        let mut findings = Findings::new();
        check_schema_defaults(dialect, &schema, &["definitions".to_string(), "Pet".to_string()], &mut findings);
        let codes: Vec<Code> = findings.errors.iter().map(|f| f.code).collect();
        assert_eq!(codes, vec![Code::Minimum, Code::MaxLength]);
    }
}
