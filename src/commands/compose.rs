use super::{engine, write_output};
use crate::cli::OutputFormat;
use crate::loader::load_document;
use crate::{Result, WardenError};
use std::path::Path;

pub async fn execute_compose(
    document_path: &Path,
    model: &str,
    format: OutputFormat,
    output: Option<&Path>,
    local: bool,
) -> Result<()> {
    let document = load_document(document_path)?;
    let spec = engine(document_path, &document, None, local)?;

    let composed = spec
        .compose_schema(&document, model)
        .await?
        .ok_or_else(|| WardenError::UnresolvableReference(model.to_string()))?;
    write_output(&composed, format, output)
}
