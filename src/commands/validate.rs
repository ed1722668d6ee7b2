use super::{engine, report::print_report};
use crate::cli::SpecVersion;
use crate::loader::{load_document, load_documents};
use crate::Result;
use colored::*;
use std::path::{Path, PathBuf};

/// Validate a document; returns whether it is free of errors
pub async fn execute_validate(
    document_path: &Path,
    declaration_paths: &[PathBuf],
    spec_version: Option<SpecVersion>,
    json: bool,
    local: bool,
) -> Result<bool> {
    let document = load_document(document_path)?;
    let spec = engine(document_path, &document, spec_version, local)?;

    let declarations = load_documents(declaration_paths)?;
    let multi_document = spec.dialect().is_multi_document();
    if !multi_document && !declarations.is_empty() {
        eprintln!(
            "{}",
            format!(
                "Ignoring {} API declarations: Swagger {} documents are self-contained",
                declarations.len(),
                spec.version()
            )
            .yellow()
        );
    }

    if !json {
        println!(
            "{}",
            format!("Validating Swagger {} document...", spec.version()).bright_blue()
        );
        println!("  Path: {}", document_path.display());
        if multi_document {
            println!("  API declarations: {}", declarations.len());
        }
        println!();
    }

    let sub_documents = multi_document.then_some(declarations.as_slice());
    let locations: Vec<String> = if multi_document {
        declaration_paths
            .iter()
            .map(|path| path.to_string_lossy().into_owned())
            .collect()
    } else {
        Vec::new()
    };
    let report = spec.validate_at(&document, sub_documents, &locations).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let shown: &[PathBuf] = if multi_document { declaration_paths } else { &[] };
        print_report(document_path, shown, report.as_ref());
    }

    Ok(report.map(|r| r.is_valid()).unwrap_or(true))
}
