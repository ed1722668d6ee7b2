//! Remote document fetching used by the reference resolver.

use super::document::parse_document;
use crate::error::{Result, WardenError};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::path::Path;

/// Retrieves a document by location (URL or file path)
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Value>;
}

/// Fetches `http(s)` locations; bodies may be JSON or YAML
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, location: &str) -> Result<Value> {
        tracing::debug!(location, "Fetching remote document");

        let response = self
            .client
            .get(location)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fetch_error(location, e))?;
        let body = response.text().await.map_err(|e| fetch_error(location, e))?;

        parse_document(&body).map_err(|e| fetch_error(location, e))
    }
}

/// Reads local files
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

#[async_trait]
impl Fetch for FileFetcher {
    async fn fetch(&self, location: &str) -> Result<Value> {
        let path = location.strip_prefix("file://").unwrap_or(location);
        tracing::debug!(path, "Reading referenced document");

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| fetch_error(location, e))?;
        parse_document(&content).map_err(|e| fetch_error(location, e))
    }
}

/// Dispatches on the location scheme
#[derive(Debug, Clone, Default)]
pub struct DefaultFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl DefaultFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Fetch for DefaultFetcher {
    async fn fetch(&self, location: &str) -> Result<Value> {
        if is_url(location) && !location.starts_with("file://") {
            self.http.fetch(location).await
        } else {
            self.file.fetch(location).await
        }
    }
}

fn fetch_error(location: &str, error: impl std::fmt::Display) -> WardenError {
    WardenError::FetchError {
        location: location.to_string(),
        message: error.to_string(),
    }
}

fn is_url(location: &str) -> bool {
    location.contains("://")
}

/// Join a reference location against the location of the document holding it
pub fn join_location(base: Option<&str>, reference: &str) -> String {
    if is_url(reference) {
        return reference.to_string();
    }
    match base {
        Some(base) if is_url(base) => Url::parse(base)
            .and_then(|url| url.join(reference))
            .map(|url| url.to_string())
            .unwrap_or_else(|_| reference.to_string()),
        Some(base) if !Path::new(reference).is_absolute() => Path::new(base)
            .parent()
            .map(|dir| dir.join(reference).display().to_string())
            .unwrap_or_else(|| reference.to_string()),
        _ => reference.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_join_location() {
        assert_eq!(
            join_location(Some("http://example.com/api/swagger.json"), "models.json"),
            "http://example.com/api/models.json"
        );
        assert_eq!(
            join_location(Some("/specs/swagger.yaml"), "common/pet.yaml"),
            "/specs/common/pet.yaml"
        );
        assert_eq!(
            join_location(Some("/specs/swagger.yaml"), "https://other.org/x.json"),
            "https://other.org/x.json"
        );
        assert_eq!(join_location(None, "pet.yaml"), "pet.yaml");
    }

    #[tokio::test]
    async fn test_file_fetcher_reads_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Pet:\n  type: object\n").unwrap();

        let location = file.path().display().to_string();
        let document = DefaultFetcher::new().fetch(&location).await.unwrap();
        assert_eq!(document["Pet"]["type"], "object");
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_error() {
        let result = FileFetcher.fetch("/nonexistent/common.yaml").await;
        assert!(matches!(result, Err(WardenError::FetchError { .. })));
    }
}
