use super::{engine, write_output};
use crate::cli::OutputFormat;
use crate::loader::load_document;
use crate::Result;
use std::path::Path;

pub async fn execute_resolve(
    document_path: &Path,
    pointer: Option<&str>,
    format: OutputFormat,
    output: Option<&Path>,
    local: bool,
) -> Result<()> {
    let document = load_document(document_path)?;
    let spec = engine(document_path, &document, None, local)?;

    let resolved = spec.resolve(&document, pointer).await?;
    write_output(&resolved, format, output)
}
