use super::report::{Code, Finding};

/// Media type assumed when a request carries no `Content-Type` header
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Methods whose requests create or update resources
const MUTATING_METHODS: &[&str] = &["PATCH", "POST", "PUT"];

/// Validate a request's media type against the accepted set.
///
/// `consumes` is the union of the globally and operation-declared media
/// types. Only mutating methods are gated; an empty accepted set accepts
/// anything.
pub fn check_content_type(
    consumes: &[String],
    header: Option<&str>,
    method: &str,
) -> Result<(), Finding> {
    if !MUTATING_METHODS.contains(&method.to_ascii_uppercase().as_str()) || consumes.is_empty() {
        return Ok(());
    }

    let content_type = header
        .map(|value| value.split(';').next().unwrap_or_default().trim())
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    if consumes
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(content_type))
    {
        Ok(())
    } else {
        Err(Finding::new(
            Code::InvalidContentType,
            format!(
                "Invalid content type ({}).  These are valid: {}",
                content_type,
                consumes.join(", ")
            ),
        ))
    }
}

/// Union of global and operation media types, preserving declaration order
pub fn merge_consumes(global: &[String], operation: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(global.len() + operation.len());
    for media_type in global.iter().chain(operation) {
        if !merged.contains(media_type) {
            merged.push(media_type.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> Vec<String> {
        vec!["application/x-www-form-urlencoded".to_string()]
    }

    #[test]
    fn test_charset_suffix_is_ignored() {
        let result = check_content_type(
            &form(),
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            "POST",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_unlisted_type_fails_with_declared_set() {
        let finding =
            check_content_type(&form(), Some("application/octet-stream"), "put").unwrap_err();
        assert_eq!(finding.code, Code::InvalidContentType);
        assert!(finding.message.contains("application/x-www-form-urlencoded"));
    }

    #[test]
    fn test_missing_header_defaults_to_octet_stream() {
        let finding = check_content_type(&form(), None, "PATCH").unwrap_err();
        assert!(finding.message.contains(DEFAULT_CONTENT_TYPE));

        let binary = vec![DEFAULT_CONTENT_TYPE.to_string()];
        assert!(check_content_type(&binary, None, "POST").is_ok());
    }

    #[test]
    fn test_non_mutating_methods_always_pass() {
        for method in ["GET", "DELETE", "HEAD", "OPTIONS"] {
            assert!(check_content_type(&form(), Some("text/plain"), method).is_ok());
        }
    }

    #[test]
    fn test_merge_consumes_deduplicates() {
        let global = vec!["application/json".to_string()];
        let operation = vec!["application/json".to_string(), "text/xml".to_string()];
        assert_eq!(
            merge_consumes(&global, &operation),
            vec!["application/json", "text/xml"]
        );
    }
}
