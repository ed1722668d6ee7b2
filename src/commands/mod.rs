pub mod compose;
pub mod report;
pub mod resolve;
pub mod serve;
pub mod validate;

pub use compose::execute_compose;
pub use resolve::execute_resolve;
pub use serve::execute_serve;
pub use validate::execute_validate;

use crate::cli::{OutputFormat, SpecVersion};
use crate::spec::{EngineOptions, SpecRegistry, Specification, Version};
use crate::{Result, WardenError};
use colored::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;

impl From<SpecVersion> for Version {
    fn from(version: SpecVersion) -> Self {
        match version {
            SpecVersion::V1_2 => Version::V1_2,
            SpecVersion::V2_0 => Version::V2_0,
        }
    }
}

/// Build an engine for a document loaded from `path`
pub(crate) fn engine(
    path: &Path,
    document: &Value,
    requested: Option<SpecVersion>,
    local: bool,
) -> Result<Specification> {
    let version = match requested {
        Some(version) => version.into(),
        None => Version::detect(document).ok_or_else(|| {
            WardenError::InvalidArgument(format!(
                "Unable to detect the Swagger version of {} (expected `swagger: \"2.0\"` or `swaggerVersion: \"1.2\"`)",
                path.display()
            ))
        })?,
    };

    let mut options = EngineOptions::default().with_base(path.to_string_lossy());
    if local {
        options = options.local_only();
    }
    Specification::with_options(version, Arc::new(SpecRegistry::new()), options)
}

/// Write a document to `output`, or stdout
pub(crate) fn write_output(value: &Value, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };

    match output {
        Some(path) => {
            fs::write(path, rendered)?;
            eprintln!("{} {}", "✓ Written to".green(), path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
