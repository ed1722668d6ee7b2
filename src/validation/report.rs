use serde::{Serialize, Serializer};
use std::fmt;

/// Addressable entity kinds a pointer can name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Model,
    Definition,
    Parameter,
    Response,
    Authorization,
    AuthorizationScope,
    SecurityDefinition,
    SecurityDefinitionScope,
    ResourcePath,
    Reference,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Model => "MODEL",
            EntityKind::Definition => "DEFINITION",
            EntityKind::Parameter => "PARAMETER",
            EntityKind::Response => "RESPONSE",
            EntityKind::Authorization => "AUTHORIZATION",
            EntityKind::AuthorizationScope => "AUTHORIZATION_SCOPE",
            EntityKind::SecurityDefinition => "SECURITY_DEFINITION",
            EntityKind::SecurityDefinitionScope => "SECURITY_DEFINITION_SCOPE",
            EntityKind::ResourcePath => "RESOURCE_PATH",
            EntityKind::Reference => "REFERENCE",
        }
    }

    /// Human wording used in finding messages
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Model => "model",
            EntityKind::Definition => "definition",
            EntityKind::Parameter => "parameter",
            EntityKind::Response => "response",
            EntityKind::Authorization => "authorization",
            EntityKind::AuthorizationScope => "authorization scope",
            EntityKind::SecurityDefinition => "security definition",
            EntityKind::SecurityDefinitionScope => "security definition scope",
            EntityKind::ResourcePath => "resource path",
            EntityKind::Reference => "reference",
        }
    }

    /// Whether this kind is a schema-shaped entity that may inherit
    pub fn is_model(&self) -> bool {
        matches!(self, EntityKind::Model | EntityKind::Definition)
    }
}

/// Stable finding code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    // Constraint checks
    InvalidType,
    InvalidFormat,
    EnumMismatch,
    Maximum,
    MaximumExclusive,
    ArrayLengthLong,
    MaxLength,
    MaxProperties,
    Minimum,
    MinimumExclusive,
    ArrayLengthShort,
    MinLength,
    MinProperties,
    MultipleOf,
    Pattern,
    ArrayUnique,
    Required,
    ObjectMissingRequiredProperty,
    InvalidContentType,

    // Meta-schema checks
    ObjectAdditionalProperties,
    AnyOfMissing,
    OneOfMissing,
    OneOfMultiple,
    NotPassed,
    SchemaViolation,

    // Document semantics
    DuplicateApiPath,
    DuplicateOperationMethod,
    DuplicateOperationId,
    DuplicateParameter,
    DuplicateResponseMessageCode,
    DuplicateResourcePath,
    DuplicateAuthorizationScopeDefinition,
    MissingApiPathParameter,
    UnresolvableApiPathParameter,
    ModelIdMismatch,
    Unresolvable(EntityKind),
    Unused(EntityKind),
    MultipleInheritance(EntityKind),
    CyclicalInheritance(EntityKind),
    ChildRedeclaresProperty(EntityKind),
    MissingRequiredProperty(EntityKind),
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fixed = match self {
            Code::InvalidType => "INVALID_TYPE",
            Code::InvalidFormat => "INVALID_FORMAT",
            Code::EnumMismatch => "ENUM_MISMATCH",
            Code::Maximum => "MAXIMUM",
            Code::MaximumExclusive => "MAXIMUM_EXCLUSIVE",
            Code::ArrayLengthLong => "ARRAY_LENGTH_LONG",
            Code::MaxLength => "MAX_LENGTH",
            Code::MaxProperties => "MAX_PROPERTIES",
            Code::Minimum => "MINIMUM",
            Code::MinimumExclusive => "MINIMUM_EXCLUSIVE",
            Code::ArrayLengthShort => "ARRAY_LENGTH_SHORT",
            Code::MinLength => "MIN_LENGTH",
            Code::MinProperties => "MIN_PROPERTIES",
            Code::MultipleOf => "MULTIPLE_OF",
            Code::Pattern => "PATTERN",
            Code::ArrayUnique => "ARRAY_UNIQUE",
            Code::Required => "REQUIRED",
            Code::ObjectMissingRequiredProperty => "OBJECT_MISSING_REQUIRED_PROPERTY",
            Code::InvalidContentType => "INVALID_CONTENT_TYPE",
            Code::ObjectAdditionalProperties => "OBJECT_ADDITIONAL_PROPERTIES",
            Code::AnyOfMissing => "ANY_OF_MISSING",
            Code::OneOfMissing => "ONE_OF_MISSING",
            Code::OneOfMultiple => "ONE_OF_MULTIPLE",
            Code::NotPassed => "NOT_PASSED",
            Code::SchemaViolation => "SCHEMA_VIOLATION",
            Code::DuplicateApiPath => "DUPLICATE_API_PATH",
            Code::DuplicateOperationMethod => "DUPLICATE_OPERATION_METHOD",
            Code::DuplicateOperationId => "DUPLICATE_OPERATIONID",
            Code::DuplicateParameter => "DUPLICATE_PARAMETER",
            Code::DuplicateResponseMessageCode => "DUPLICATE_RESPONSE_MESSAGE_CODE",
            Code::DuplicateResourcePath => "DUPLICATE_RESOURCE_PATH",
            Code::DuplicateAuthorizationScopeDefinition => {
                "DUPLICATE_AUTHORIZATION_SCOPE_DEFINITION"
            }
            Code::MissingApiPathParameter => "MISSING_API_PATH_PARAMETER",
            Code::UnresolvableApiPathParameter => "UNRESOLVABLE_API_PATH_PARAMETER",
            Code::ModelIdMismatch => "MODEL_ID_MISMATCH",
            Code::Unresolvable(kind) => return write!(f, "UNRESOLVABLE_{}", kind.as_str()),
            Code::Unused(kind) => return write!(f, "UNUSED_{}", kind.as_str()),
            Code::MultipleInheritance(kind) => {
                return write!(f, "MULTIPLE_{}_INHERITANCE", kind.as_str());
            }
            Code::CyclicalInheritance(kind) => {
                return write!(f, "CYCLICAL_{}_INHERITANCE", kind.as_str());
            }
            Code::ChildRedeclaresProperty(kind) => {
                return write!(f, "CHILD_{}_REDECLARES_PROPERTY", kind.as_str());
            }
            Code::MissingRequiredProperty(kind) => {
                return write!(f, "MISSING_REQUIRED_{}_PROPERTY", kind.as_str());
            }
        };
        f.write_str(fixed)
    }
}

impl Serialize for Code {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One structured error or warning
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub code: Code,
    pub message: String,
    pub path: Vec<String>,
}

impl Finding {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: Vec::new(),
        }
    }

    pub fn with_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    /// The finding path rendered as a JSON pointer
    pub fn pointer(&self) -> String {
        crate::spec::pointer::to_pointer(&self.path)
    }

    /// Format the finding for display
    pub fn format(&self) -> String {
        format!("{} {} ({})", self.code, self.message, self.pointer())
    }
}

/// Errors and warnings for one document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Findings {
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, finding: Finding) {
        self.errors.push(finding);
    }

    pub fn warning(&mut self, finding: Finding) {
        self.warnings.push(finding);
    }

    pub fn extend(&mut self, other: Findings) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Aggregated result of validating a document (and its sub-documents)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
    #[serde(rename = "apiDeclarations", skip_serializing_if = "Vec::is_empty")]
    pub api_declarations: Vec<Findings>,
}

impl ValidationReport {
    pub fn from_findings(findings: Findings) -> Self {
        Self {
            errors: findings.errors,
            warnings: findings.warnings,
            api_declarations: Vec::new(),
        }
    }

    /// Whether the document and every sub-document are free of errors
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.api_declarations.iter().all(|d| d.errors.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
            && self.warnings.is_empty()
            && self.api_declarations.iter().all(Findings::is_empty)
    }

    /// Collapse a report without findings into `None`
    pub fn into_option(self) -> Option<Self> {
        if self.is_empty() { None } else { Some(self) }
    }

    /// The first error anywhere in the report
    pub fn first_error(&self) -> Option<&Finding> {
        self.errors
            .iter()
            .chain(self.api_declarations.iter().flat_map(|d| d.errors.iter()))
            .next()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len() + self.api_declarations.iter().map(|d| d.errors.len()).sum::<usize>()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
            + self
                .api_declarations
                .iter()
                .map(|d| d.warnings.len())
                .sum::<usize>()
    }
}
