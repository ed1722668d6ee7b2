use super::engine;
use crate::loader::load_document;
use crate::middleware::RequestValidator;
use crate::{Result, server};
use colored::*;
use std::path::Path;
use std::sync::Arc;

pub async fn execute_serve(document_path: &Path, bind: Option<&str>, local: bool) -> Result<()> {
    let addr = server::bind_address(bind)?;
    let document = load_document(document_path)?;
    let spec = Arc::new(engine(document_path, &document, None, local)?);

    println!("{}", "Starting validating server...".bright_blue());
    println!("  Document: {}", document_path.display());
    println!("  Address: http://{}", addr);
    println!();

    let validator = RequestValidator::new(spec, document).await?;
    server::start_server(addr, validator, &document_path.display().to_string()).await
}
