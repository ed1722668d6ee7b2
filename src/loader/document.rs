use crate::error::{Result, WardenError};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Load a Swagger document (YAML or JSON) from a file
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();

    let content = fs::read_to_string(path).map_err(|e| {
        WardenError::LoadError(format!("Failed to read file {}: {}", path.display(), e))
    })?;

    parse_document(&content).map_err(|e| {
        WardenError::LoadError(format!("Failed to parse {}: {}", path.display(), e))
    })
}

/// Parse YAML or JSON text into a document tree.
///
/// JSON is tried first so numbers keep their exact representation; YAML is
/// the fallback (and a superset for everything else).
pub fn parse_document(content: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(content) {
        return Ok(value);
    }
    Ok(serde_yaml::from_str::<Value>(content)?)
}

/// Load every document in `paths`, preserving order
pub fn load_documents<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Value>> {
    paths.iter().map(load_document).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_yaml_document() {
        let yaml = r#"
swagger: "2.0"
info:
  title: Test API
  version: 1.0.0
paths:
  /test:
    get:
      responses:
        "200":
          description: OK
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let document = load_document(file.path()).unwrap();
        assert_eq!(document["swagger"], "2.0");
        assert!(document["paths"]["/test"]["get"].is_object());
    }

    #[test]
    fn test_load_json_document() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"swaggerVersion": "1.2", "apis": []}"#)
            .unwrap();

        let document = load_document(file.path()).unwrap();
        assert_eq!(document["swaggerVersion"], "1.2");
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let result = load_document("/nonexistent/swagger.yaml");
        assert!(matches!(result, Err(WardenError::LoadError(_))));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = parse_document("swagger: [unclosed");
        assert!(result.is_err());
    }
}
