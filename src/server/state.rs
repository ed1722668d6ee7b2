use crate::middleware::RequestValidator;
use crate::spec::Version;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub validator: RequestValidator,

    /// Dialect of the served document
    pub version: Version,

    /// Where the document was loaded from, for display
    pub source: Arc<str>,
}

impl AppState {
    pub fn new(validator: RequestValidator, source: &str) -> Self {
        Self {
            validator,
            version: Version::V2_0,
            source: Arc::from(source),
        }
    }
}
