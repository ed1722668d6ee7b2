//! The validation engine: one `Specification` per dialect.
//!
//! Every entry point goes through the shared `SpecRegistry`, so a document
//! is structurally checked once per meta-schema and resolved once per
//! content hash no matter how many callers ask for it.

pub mod composer;
pub mod definitions;
pub mod dialect;
pub mod pointer;
pub mod registry;
pub mod resolver;
pub mod semantics;
pub mod structure;

pub use composer::Composer;
pub use definitions::{DefinitionNode, DefinitionRegistry};
pub use dialect::{Dialect, Swagger12, Swagger20, Version};
pub use registry::{RegistryEntry, ResolvedDocument, SpecRegistry, content_hash};
pub use resolver::{Resolution, Resolver, UnresolvedRef};
pub use structure::StructureValidator;

use crate::error::{Result, WardenError};
use crate::loader::{DefaultFetcher, Fetch};
use crate::validation::{ConstraintValidator, Finding, Findings, ValidationReport};
use futures::future::try_join_all;
use pointer::{lookup, parse_pointer};
use serde_json::Value;
use std::sync::Arc;

/// How the engine reaches documents outside the one being validated
#[derive(Clone)]
pub struct EngineOptions {
    /// Fetcher for remote references; `DefaultFetcher` when unset
    pub fetcher: Option<Arc<dyn Fetch>>,
    /// When false, remote references are reported as unresolvable
    pub allow_remote: bool,
    /// Location of the root document, used to join relative references
    pub base: Option<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            fetcher: None,
            allow_remote: true,
            base: None,
        }
    }
}

impl EngineOptions {
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetch>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn local_only(mut self) -> Self {
        self.allow_remote = false;
        self
    }
}

/// A document after its structural check, resolved only when it passed
struct Prepared {
    entry: Arc<RegistryEntry>,
    structure: Findings,
    resolved: Option<Arc<ResolvedDocument>>,
}

pub struct Specification {
    dialect: &'static dyn Dialect,
    structure: StructureValidator,
    registry: Arc<SpecRegistry>,
    fetcher: Option<Arc<dyn Fetch>>,
    base: Option<String>,
}

impl Specification {
    pub fn new(version: Version) -> Result<Self> {
        Self::with_options(version, Arc::new(SpecRegistry::new()), EngineOptions::default())
    }

    /// Build an engine sharing `registry` with other engines
    pub fn with_registry(version: Version, registry: Arc<SpecRegistry>) -> Result<Self> {
        Self::with_options(version, registry, EngineOptions::default())
    }

    pub fn with_options(
        version: Version,
        registry: Arc<SpecRegistry>,
        options: EngineOptions,
    ) -> Result<Self> {
        let dialect = version.dialect();
        let fetcher = match (options.allow_remote, options.fetcher) {
            (false, _) => None,
            (true, Some(fetcher)) => Some(fetcher),
            (true, None) => Some(Arc::new(DefaultFetcher::new()) as Arc<dyn Fetch>),
        };

        Ok(Self {
            dialect,
            structure: StructureValidator::new(dialect)?,
            registry,
            fetcher,
            base: options.base,
        })
    }

    pub fn version(&self) -> Version {
        self.dialect.version()
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    pub fn docs_url(&self) -> &'static str {
        self.dialect.docs_url()
    }

    pub fn primitives(&self) -> &'static [&'static str] {
        self.dialect.primitives()
    }

    pub fn inheritance_keyword(&self) -> &'static str {
        self.dialect.inheritance_keyword()
    }

    pub fn registry(&self) -> &Arc<SpecRegistry> {
        &self.registry
    }

    /// Validate a document, and for multi-document dialects its sub-documents.
    ///
    /// Returns `None` when there is nothing to report.
    pub async fn validate(
        &self,
        document: &Value,
        sub_documents: Option<&[Value]>,
    ) -> Result<Option<ValidationReport>> {
        self.validate_at(document, sub_documents, &[]).await
    }

    /// Like [`validate`](Self::validate), given where each sub-document was
    /// loaded from.
    ///
    /// Relative references inside a sub-document are joined against its own
    /// location; sub-documents without one fall back to the engine's base.
    pub async fn validate_at(
        &self,
        document: &Value,
        sub_documents: Option<&[Value]>,
        locations: &[String],
    ) -> Result<Option<ValidationReport>> {
        if locations.len() > sub_documents.map_or(0, <[Value]>::len) {
            return Err(WardenError::InvalidArgument(
                "more sub-document locations than sub-documents".to_string(),
            ));
        }
        if !document.is_object() {
            return Err(WardenError::InvalidArgument(
                "document must be an object".to_string(),
            ));
        }

        let report = if self.dialect.is_multi_document() {
            let sub_documents = sub_documents.ok_or_else(|| {
                WardenError::InvalidArgument(format!(
                    "Swagger {} validation requires the API declarations",
                    self.version()
                ))
            })?;
            self.validate_set(document, sub_documents, locations).await?
        } else {
            let prepared = self
                .prepare(document, self.dialect.root_schema(), self.base.as_deref())
                .await?;
            ValidationReport::from_findings(self.findings(&prepared))
        };

        tracing::info!(
            version = %self.version(),
            errors = report.error_count(),
            warnings = report.warning_count(),
            "Validated document"
        );
        Ok(report.into_option())
    }

    /// The resolved document, or the node at `pointer` within it
    pub async fn resolve(&self, document: &Value, pointer: Option<&str>) -> Result<Value> {
        if !document.is_object() {
            return Err(WardenError::InvalidArgument(
                "document must be an object".to_string(),
            ));
        }

        let prepared = self
            .prepare(document, self.dialect.schema_for(document), self.base.as_deref())
            .await?;
        let Some(resolved) = prepared.resolved else {
            return Err(WardenError::UnresolvableDocument(Box::new(
                ValidationReport::from_findings(prepared.structure),
            )));
        };

        let tree = &resolved.resolution.resolved;
        match pointer {
            None => Ok(tree.clone()),
            Some(pointer) => lookup(tree, &parse_pointer(pointer))
                .cloned()
                .ok_or_else(|| WardenError::UnresolvableReference(pointer.to_string())),
        }
    }

    /// Compose `model_ref` with its whole inheritance chain.
    ///
    /// `model_ref` is either a JSON pointer or a bare model name.
    pub async fn compose_schema(&self, document: &Value, model_ref: &str) -> Result<Option<Value>> {
        let prepared = self.validated(document).await?;
        let Some(resolved) = prepared.resolved.as_ref() else {
            return Ok(None);
        };

        let normalized = &resolved.resolution.normalized;
        let definitions = prepared.entry.definitions(self.dialect, normalized);
        let pointer = self.dialect.model_pointer(model_ref);
        let composed = Composer::new(self.dialect, normalized, &definitions).compose(&pointer);

        tracing::debug!(model = %pointer, found = composed.is_some(), "Composed model");
        Ok(composed)
    }

    /// Validate `value` against the composed schema of `model_ref`
    pub async fn validate_model(
        &self,
        document: &Value,
        model_ref: &str,
        value: &Value,
    ) -> Result<Vec<Finding>> {
        let composed = self
            .compose_schema(document, model_ref)
            .await?
            .ok_or_else(|| WardenError::UnresolvableReference(model_ref.to_string()))?;

        Ok(ConstraintValidator::with_root(&composed).validate_object(value, &composed, &[]))
    }

    async fn validated(&self, document: &Value) -> Result<Prepared> {
        if !document.is_object() {
            return Err(WardenError::InvalidArgument(
                "document must be an object".to_string(),
            ));
        }

        let prepared = self
            .prepare(document, self.dialect.schema_for(document), self.base.as_deref())
            .await?;
        let findings = self.findings(&prepared);
        if !findings.errors.is_empty() {
            return Err(WardenError::InvalidDocument(Box::new(
                ValidationReport::from_findings(findings),
            )));
        }
        Ok(prepared)
    }

    async fn prepare(
        &self,
        document: &Value,
        schema: &'static str,
        base: Option<&str>,
    ) -> Result<Prepared> {
        let entry = self.registry.entry(self.version(), document);
        let structure = entry.structure(schema, |doc| self.structure.check_structure(doc, schema))?;

        let resolved = if structure.errors.is_empty() {
            Some(entry.resolve(self.dialect, self.fetcher.as_deref(), base).await?)
        } else {
            tracing::debug!(
                hash = %entry.hash,
                errors = structure.errors.len(),
                "Skipping resolution of structurally invalid document"
            );
            None
        };

        Ok(Prepared {
            entry,
            structure,
            resolved,
        })
    }

    /// Structural findings, followed by semantic ones when the structure is sound
    fn findings(&self, prepared: &Prepared) -> Findings {
        let mut findings = prepared.structure.clone();
        if let Some(resolved) = &prepared.resolved {
            self.check_semantics(&prepared.entry, resolved, &mut findings);
        }
        findings
    }

    fn check_semantics(
        &self,
        entry: &RegistryEntry,
        resolved: &ResolvedDocument,
        findings: &mut Findings,
    ) {
        let resolution = &resolved.resolution;
        let definitions = entry.definitions(self.dialect, &resolution.normalized);

        self.dialect
            .check_document(&resolution.normalized, &resolution.resolved, &definitions, findings);
        semantics::check_definitions(self.dialect, &resolution.normalized, &definitions, findings);
        semantics::check_unresolved_references(self.dialect, &resolution.unresolved, findings);
    }

    async fn validate_set(
        &self,
        root: &Value,
        sub_documents: &[Value],
        locations: &[String],
    ) -> Result<ValidationReport> {
        let root_schema = self.dialect.root_schema();
        let sub_schema = self.dialect.sub_document_schema().unwrap_or(root_schema);

        let prepared_root = self.prepare(root, root_schema, self.base.as_deref()).await?;
        // Gathered in submission order; one failure aborts the whole set
        let prepared = try_join_all(sub_documents.iter().enumerate().map(|(index, document)| {
            let base = locations.get(index).map(String::as_str).or(self.base.as_deref());
            self.prepare(document, sub_schema, base)
        }))
        .await?;

        let mut root_findings = prepared_root.structure.clone();
        let mut sub_findings: Vec<Findings> =
            prepared.iter().map(|p| p.structure.clone()).collect();

        let structurally_valid = prepared_root.resolved.is_some()
            && prepared.iter().all(|p| p.resolved.is_some());
        if structurally_valid {
            for (document, findings) in prepared.iter().zip(sub_findings.iter_mut()) {
                if let Some(resolved) = &document.resolved {
                    self.check_semantics(&document.entry, resolved, findings);
                }
            }

            let normalized: Vec<&Value> = prepared
                .iter()
                .filter_map(|p| p.resolved.as_ref())
                .map(|r| &r.resolution.normalized)
                .collect();
            if let Some(root_resolved) = &prepared_root.resolved {
                self.dialect.check_sub_documents(
                    &root_resolved.resolution.normalized,
                    &normalized,
                    &mut root_findings,
                    &mut sub_findings,
                );
            }
        } else {
            tracing::debug!(
                sub_documents = sub_documents.len(),
                "Skipping semantic checks of a structurally invalid document set"
            );
        }

        let mut report = ValidationReport::from_findings(root_findings);
        report.api_declarations = sub_findings;
        Ok(report)
    }
}
