//! Meta-schema validation of whole documents.

use super::dialect::Dialect;
use super::pointer::parse_pointer;
use crate::error::{Result, WardenError};
use crate::validation::formats::{VOCABULARY_FORMATS, is_valid_date, is_valid_date_time};
use crate::validation::{Code, Finding, Findings};
use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, Retrieve, Uri, ValidationError, ValidationOptions, Validator};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Meta-schemas are self-contained; anything else they mention is accepted
/// as an empty schema instead of being fetched over the network.
struct PermissiveRetriever;

impl Retrieve for PermissiveRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> std::result::Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!(uri = uri.as_str(), "Meta-schema referenced an external schema");
        Ok(json!({}))
    }
}

/// Compiled meta-schemas of one dialect
pub struct StructureValidator {
    validators: HashMap<&'static str, Validator>,
}

impl std::fmt::Debug for StructureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructureValidator")
            .field("schemas", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn options() -> ValidationOptions {
    let mut opts = jsonschema::options();
    opts.with_draft(Draft::Draft4);
    opts.should_validate_formats(true);
    opts.with_format("date", is_valid_date);
    opts.with_format("date-time", is_valid_date_time);
    for format in VOCABULARY_FORMATS {
        opts.with_format(*format, |_: &str| true);
    }
    opts.with_retriever(PermissiveRetriever);
    opts
}

impl StructureValidator {
    /// Compile every meta-schema the dialect ships
    pub fn new(dialect: &dyn Dialect) -> Result<Self> {
        let opts = options();
        let mut validators = HashMap::new();

        for (name, contents) in dialect.meta_schemas() {
            let schema: Value = serde_json::from_str(contents)
                .map_err(|e| WardenError::MetaSchemaError(format!("{}: {}", name, e)))?;
            let validator = opts
                .build(&schema)
                .map_err(|e| WardenError::MetaSchemaError(format!("{}: {}", name, e)))?;
            validators.insert(*name, validator);
        }

        tracing::debug!(
            version = %dialect.version(),
            schemas = validators.len(),
            "Compiled meta-schemas"
        );
        Ok(Self { validators })
    }

    /// Validate `document` against the named meta-schema
    pub fn check_structure(&self, document: &Value, schema_name: &str) -> Result<Findings> {
        let validator = self.validators.get(schema_name).ok_or_else(|| {
            WardenError::MetaSchemaError(format!("Unknown meta-schema: {}", schema_name))
        })?;

        let mut findings = Findings::new();
        for error in validator.iter_errors(document) {
            findings.error(to_finding(&error));
        }
        Ok(findings)
    }
}

fn to_finding(error: &ValidationError<'_>) -> Finding {
    Finding::new(code_for(&error.kind), error.to_string())
        .with_path(parse_pointer(&error.instance_path.to_string()))
}

fn code_for(kind: &ValidationErrorKind) -> Code {
    match kind {
        ValidationErrorKind::Type { .. } => Code::InvalidType,
        ValidationErrorKind::Enum { .. } => Code::EnumMismatch,
        ValidationErrorKind::Format { .. } => Code::InvalidFormat,
        ValidationErrorKind::Maximum { .. } => Code::Maximum,
        ValidationErrorKind::ExclusiveMaximum { .. } => Code::MaximumExclusive,
        ValidationErrorKind::Minimum { .. } => Code::Minimum,
        ValidationErrorKind::ExclusiveMinimum { .. } => Code::MinimumExclusive,
        ValidationErrorKind::MaxItems { .. } => Code::ArrayLengthLong,
        ValidationErrorKind::MinItems { .. } => Code::ArrayLengthShort,
        ValidationErrorKind::MaxLength { .. } => Code::MaxLength,
        ValidationErrorKind::MinLength { .. } => Code::MinLength,
        ValidationErrorKind::MaxProperties { .. } => Code::MaxProperties,
        ValidationErrorKind::MinProperties { .. } => Code::MinProperties,
        ValidationErrorKind::MultipleOf { .. } => Code::MultipleOf,
        ValidationErrorKind::Pattern { .. } => Code::Pattern,
        ValidationErrorKind::UniqueItems { .. } => Code::ArrayUnique,
        ValidationErrorKind::Required { .. } => Code::ObjectMissingRequiredProperty,
        ValidationErrorKind::AdditionalProperties { .. } => Code::ObjectAdditionalProperties,
        ValidationErrorKind::AnyOf { .. } => Code::AnyOfMissing,
        ValidationErrorKind::OneOfNotValid { .. } => Code::OneOfMissing,
        ValidationErrorKind::OneOfMultipleValid { .. } => Code::OneOfMultiple,
        ValidationErrorKind::Not { .. } => Code::NotPassed,
        _ => Code::SchemaViolation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::dialect::{API_DECLARATION_SCHEMA, SWAGGER_SCHEMA, Version};

    fn v2() -> StructureValidator {
        StructureValidator::new(Version::V2_0.dialect()).unwrap()
    }

    #[test]
    fn test_minimal_document_passes() {
        let document = json!({
            "swagger": "2.0",
            "info": {"title": "Pets", "version": "1.0.0"},
            "paths": {"/pets": {"get": {"responses": {"200": {"description": "ok"}}}}}
        });
        let findings = v2().check_structure(&document, SWAGGER_SCHEMA).unwrap();
        assert!(findings.errors.is_empty(), "{:?}", findings.errors);
    }

    #[test]
    fn test_missing_required_and_extra_properties() {
        let document = json!({
            "swagger": "2.0",
            "info": {"title": "Pets"},
            "paths": {},
            "bogus": true
        });
        let findings = v2().check_structure(&document, SWAGGER_SCHEMA).unwrap();
        let codes: Vec<Code> = findings.errors.iter().map(|f| f.code).collect();
        assert!(codes.contains(&Code::ObjectAdditionalProperties));
        assert!(codes.contains(&Code::ObjectMissingRequiredProperty));

        let missing = findings
            .errors
            .iter()
            .find(|f| f.code == Code::ObjectMissingRequiredProperty)
            .unwrap();
        assert_eq!(missing.path, vec!["info"]);
    }

    #[test]
    fn test_bad_enum_value_has_pointer_path() {
        let document = json!({
            "swagger": "2.0",
            "info": {"title": "Pets", "version": "1"},
            "schemes": ["gopher"],
            "paths": {}
        });
        let findings = v2().check_structure(&document, SWAGGER_SCHEMA).unwrap();
        assert_eq!(findings.errors.len(), 1);
        assert_eq!(findings.errors[0].code, Code::EnumMismatch);
        assert_eq!(findings.errors[0].pointer(), "#/schemes/0");
    }

    #[test]
    fn test_api_declaration_schema() {
        let validator = StructureValidator::new(Version::V1_2.dialect()).unwrap();
        let declaration = json!({
            "swaggerVersion": "1.2",
            "basePath": "http://petstore.example.com/api",
            "resourcePath": "/pet",
            "apis": [{"path": "/pet/{petId}", "operations": [{
                "method": "GET",
                "nickname": "getPetById",
                "type": "Pet",
                "parameters": [{"paramType": "path", "name": "petId", "type": "integer", "format": "int64"}]
            }]}],
            "models": {"Pet": {"id": "Pet", "properties": {"id": {"type": "integer", "format": "int64"}}}}
        });
        let findings = validator
            .check_structure(&declaration, API_DECLARATION_SCHEMA)
            .unwrap();
        assert!(findings.errors.is_empty(), "{:?}", findings.errors);
    }

    #[test]
    fn test_unknown_schema_name_is_an_error() {
        assert!(v2().check_structure(&json!({}), "nope.json").is_err());
    }
}
