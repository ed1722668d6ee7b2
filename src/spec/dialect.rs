use super::definitions::DefinitionRegistry;
use super::semantics::{v1_2, v2_0};
use crate::validation::{EntityKind, Findings};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Supported document dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Version {
    #[serde(rename = "1.2")]
    V1_2,
    #[serde(rename = "2.0")]
    V2_0,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::V1_2 => "1.2",
            Version::V2_0 => "2.0",
        }
    }

    pub fn parse(version: &str) -> Option<Self> {
        match version {
            "1.2" => Some(Version::V1_2),
            "2.0" => Some(Version::V2_0),
            _ => None,
        }
    }

    /// Detect the dialect a parsed document declares
    pub fn detect(document: &Value) -> Option<Self> {
        if let Some(version) = document.get("swagger").and_then(Value::as_str) {
            return Self::parse(version);
        }
        document
            .get("swaggerVersion")
            .and_then(Value::as_str)
            .and_then(Self::parse)
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        match self {
            Version::V1_2 => &Swagger12,
            Version::V2_0 => &Swagger20,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that differs between the two dialects.
///
/// The resolver, registry, validators and composer program against this
/// trait and never branch on a version string.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn version(&self) -> Version;

    fn docs_url(&self) -> &'static str;

    /// Primitive type vocabulary
    fn primitives(&self) -> &'static [&'static str];

    /// Keyword that links a model to its ancestors (or descendants)
    fn inheritance_keyword(&self) -> &'static str;

    /// Whether one model may have several direct parents
    fn allows_multiple_inheritance(&self) -> bool;

    /// Entity kind of schema-shaped models
    fn model_kind(&self) -> EntityKind;

    /// Pointer section that holds models
    fn model_section(&self) -> &'static str;

    /// Key holding a parameter or property default value
    fn default_key(&self) -> &'static str;

    /// Whether a specification spans a root document plus sub-documents
    fn is_multi_document(&self) -> bool;

    /// Meta-schema documents: `(file name, contents)`
    fn meta_schemas(&self) -> &'static [(&'static str, &'static str)];

    /// Meta-schema of the document submitted to `validate`
    fn root_schema(&self) -> &'static str;

    /// Meta-schema used for a standalone document
    fn schema_for(&self, document: &Value) -> &'static str;

    /// Meta-schema used for sub-documents, when the dialect has them
    fn sub_document_schema(&self) -> Option<&'static str>;

    /// Entity kind named by a canonical pointer, if any
    fn kind_for_pointer(&self, segments: &[String]) -> Option<EntityKind>;

    /// Rewrite dialect-specific reference shapes into `$ref` pointers
    fn normalize(&self, document: &Value) -> Value;

    /// Canonical pointer for a model reference given by a caller
    fn model_pointer(&self, model_ref: &str) -> String {
        if model_ref.starts_with('#') {
            model_ref.to_string()
        } else {
            format!("#/{}/{}", self.model_section(), model_ref)
        }
    }

    /// A model's own declared schema, without inheritance links or identity fields
    fn own_schema(&self, model: &Value) -> Map<String, Value>;

    /// Walk a normalized document, tracking every reusable entity and reference
    fn index(&self, normalized: &Value) -> DefinitionRegistry;

    /// Document-local semantic checks (duplicates, path parameters, defaults)
    fn check_document(
        &self,
        normalized: &Value,
        resolved: &Value,
        definitions: &DefinitionRegistry,
        findings: &mut Findings,
    );

    /// Cross-document checks between the root document and its sub-documents
    fn check_sub_documents(
        &self,
        _root: &Value,
        _sub_documents: &[&Value],
        _root_findings: &mut Findings,
        _sub_findings: &mut [Findings],
    ) {
    }
}

/// Swagger 1.2: resource listing plus API declarations
#[derive(Debug, Clone, Copy)]
pub struct Swagger12;

/// Swagger 2.0: a single Swagger object
#[derive(Debug, Clone, Copy)]
pub struct Swagger20;

pub(crate) const RESOURCE_LISTING_SCHEMA: &str = "resourceListing.json";
pub(crate) const API_DECLARATION_SCHEMA: &str = "apiDeclaration.json";
pub(crate) const SWAGGER_SCHEMA: &str = "schema.json";

static V1_2_SCHEMAS: &[(&str, &str)] = &[
    (
        RESOURCE_LISTING_SCHEMA,
        include_str!("../../schemas/1.2/resourceListing.json"),
    ),
    (
        API_DECLARATION_SCHEMA,
        include_str!("../../schemas/1.2/apiDeclaration.json"),
    ),
];

static V2_0_SCHEMAS: &[(&str, &str)] = &[(SWAGGER_SCHEMA, include_str!("../../schemas/2.0/schema.json"))];

impl Dialect for Swagger12 {
    fn version(&self) -> Version {
        Version::V1_2
    }

    fn docs_url(&self) -> &'static str {
        "https://github.com/swagger-api/swagger-spec/blob/master/versions/1.2.md"
    }

    fn primitives(&self) -> &'static [&'static str] {
        &["array", "boolean", "File", "integer", "number", "string", "void"]
    }

    fn inheritance_keyword(&self) -> &'static str {
        "subTypes"
    }

    fn allows_multiple_inheritance(&self) -> bool {
        false
    }

    fn model_kind(&self) -> EntityKind {
        EntityKind::Model
    }

    fn model_section(&self) -> &'static str {
        "models"
    }

    fn default_key(&self) -> &'static str {
        "defaultValue"
    }

    fn is_multi_document(&self) -> bool {
        true
    }

    fn meta_schemas(&self) -> &'static [(&'static str, &'static str)] {
        V1_2_SCHEMAS
    }

    fn root_schema(&self) -> &'static str {
        RESOURCE_LISTING_SCHEMA
    }

    fn schema_for(&self, document: &Value) -> &'static str {
        if document.get("resourcePath").is_some() || document.get("basePath").is_some() {
            API_DECLARATION_SCHEMA
        } else {
            RESOURCE_LISTING_SCHEMA
        }
    }

    fn sub_document_schema(&self) -> Option<&'static str> {
        Some(API_DECLARATION_SCHEMA)
    }

    fn kind_for_pointer(&self, segments: &[String]) -> Option<EntityKind> {
        match segments {
            [section, _] if section == "models" => Some(EntityKind::Model),
            [section, _] if section == "authorizations" => Some(EntityKind::Authorization),
            [section, _, scopes, _] if section == "authorizations" && scopes == "scopes" => {
                Some(EntityKind::AuthorizationScope)
            }
            _ => None,
        }
    }

    fn normalize(&self, document: &Value) -> Value {
        v1_2::rewrite_type_references(document, self.primitives())
    }

    fn own_schema(&self, model: &Value) -> Map<String, Value> {
        let mut own = model.as_object().cloned().unwrap_or_default();
        own.remove("id");
        own.remove("subTypes");
        own
    }

    fn index(&self, normalized: &Value) -> DefinitionRegistry {
        v1_2::index_declaration(self, normalized)
    }

    fn check_document(
        &self,
        normalized: &Value,
        _resolved: &Value,
        _definitions: &DefinitionRegistry,
        findings: &mut Findings,
    ) {
        v1_2::check_declaration(self, normalized, findings);
    }

    fn check_sub_documents(
        &self,
        root: &Value,
        sub_documents: &[&Value],
        root_findings: &mut Findings,
        sub_findings: &mut [Findings],
    ) {
        v1_2::check_listing(root, sub_documents, root_findings, sub_findings);
    }
}

impl Dialect for Swagger20 {
    fn version(&self) -> Version {
        Version::V2_0
    }

    fn docs_url(&self) -> &'static str {
        "https://github.com/swagger-api/swagger-spec/blob/master/versions/2.0.md"
    }

    fn primitives(&self) -> &'static [&'static str] {
        &["array", "boolean", "file", "integer", "null", "number", "object", "string"]
    }

    fn inheritance_keyword(&self) -> &'static str {
        "allOf"
    }

    fn allows_multiple_inheritance(&self) -> bool {
        true
    }

    fn model_kind(&self) -> EntityKind {
        EntityKind::Definition
    }

    fn model_section(&self) -> &'static str {
        "definitions"
    }

    fn default_key(&self) -> &'static str {
        "default"
    }

    fn is_multi_document(&self) -> bool {
        false
    }

    fn meta_schemas(&self) -> &'static [(&'static str, &'static str)] {
        V2_0_SCHEMAS
    }

    fn root_schema(&self) -> &'static str {
        SWAGGER_SCHEMA
    }

    fn schema_for(&self, _document: &Value) -> &'static str {
        SWAGGER_SCHEMA
    }

    fn sub_document_schema(&self) -> Option<&'static str> {
        None
    }

    fn kind_for_pointer(&self, segments: &[String]) -> Option<EntityKind> {
        match segments {
            [section, _] => match section.as_str() {
                "definitions" => Some(EntityKind::Definition),
                "parameters" => Some(EntityKind::Parameter),
                "responses" => Some(EntityKind::Response),
                "securityDefinitions" => Some(EntityKind::SecurityDefinition),
                _ => None,
            },
            [section, _, scopes, _] if section == "securityDefinitions" && scopes == "scopes" => {
                Some(EntityKind::SecurityDefinitionScope)
            }
            _ => None,
        }
    }

    fn normalize(&self, document: &Value) -> Value {
        document.clone()
    }

    fn own_schema(&self, model: &Value) -> Map<String, Value> {
        let mut own = model.as_object().cloned().unwrap_or_default();
        let Some(Value::Array(members)) = own.remove("allOf") else {
            return own;
        };

        // Inline allOf members are part of the model itself; `$ref` members are parents
        for member in members.iter().filter(|m| m.get("$ref").is_none()) {
            if let Some(properties) = member.get("properties").and_then(Value::as_object) {
                let target = own
                    .entry("properties")
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Some(target) = target.as_object_mut() {
                    for (name, schema) in properties {
                        target.entry(name.clone()).or_insert_with(|| schema.clone());
                    }
                }
            }
            if let Some(required) = member.get("required").and_then(Value::as_array) {
                let target = own
                    .entry("required")
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Some(target) = target.as_array_mut() {
                    for name in required {
                        if !target.contains(name) {
                            target.push(name.clone());
                        }
                    }
                }
            }
        }
        own
    }

    fn index(&self, normalized: &Value) -> DefinitionRegistry {
        v2_0::index_document(self, normalized)
    }

    fn check_document(
        &self,
        normalized: &Value,
        resolved: &Value,
        _definitions: &DefinitionRegistry,
        findings: &mut Findings,
    ) {
        v2_0::check_document(self, normalized, resolved, findings);
    }
}
