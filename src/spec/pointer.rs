//! JSON pointer and path-template helpers shared by the engine.
//!
//! Canonical pointers are rendered as URI fragments (`#/definitions/Pet`),
//! with `~` and `/` escaped as `~0` and `~1`.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static PATH_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}/]+)\}").expect("path parameter pattern"));

/// Render path segments as a fragment pointer
pub fn to_pointer<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::from("#");
    for segment in segments {
        out.push('/');
        out.push_str(&escape(segment.as_ref()));
    }
    out
}

/// Parse `#/a/b`, `/a/b` or `#` into unescaped segments
pub fn parse_pointer(pointer: &str) -> Vec<String> {
    let trimmed = pointer.strip_prefix('#').unwrap_or(pointer);
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed
        .trim_start_matches('/')
        .split('/')
        .map(unescape)
        .collect()
}

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Split a `$ref` value into its document location and fragment.
///
/// Local references have no location; the fragment is always returned with
/// its leading `#` stripped.
pub fn split_ref(reference: &str) -> (Option<&str>, &str) {
    match reference.split_once('#') {
        Some(("", fragment)) => (None, fragment),
        Some((location, fragment)) => (Some(location), fragment),
        None if reference.is_empty() => (None, ""),
        None => (Some(reference), ""),
    }
}

/// Look up a node by unescaped segments
pub fn lookup<'a, S: AsRef<str>>(document: &'a Value, segments: &[S]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(document, |node, segment| match node {
            Value::Object(map) => map.get(segment.as_ref()),
            Value::Array(items) => segment
                .as_ref()
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            _ => None,
        })
}

/// Append a segment to a path, returning the extended copy
pub fn child<S: Into<String>>(path: &[String], segment: S) -> Vec<String> {
    let mut next = path.to_vec();
    next.push(segment.into());
    next
}

/// Names of the `{param}` placeholders in a path template, in order
pub fn path_params(template: &str) -> Vec<String> {
    PATH_PARAM
        .captures_iter(template)
        .map(|captures| captures[1].to_string())
        .collect()
}

/// Rewrite placeholders to positional form so equivalent routes compare equal.
///
/// `/pet/{id}` and `/pet/{petId}` both become `/pet/{0}`.
pub fn normalize_path(template: &str) -> String {
    let mut index = 0;
    let normalized = PATH_PARAM.replace_all(template, |_: &regex::Captures| {
        let placeholder = format!("{{{}}}", index);
        index += 1;
        placeholder
    });
    let normalized = normalized.trim_end_matches('/');
    if normalized.is_empty() {
        "/".to_string()
    } else {
        normalized.to_string()
    }
}

/// Build a regex matching concrete request paths for a template
pub fn path_matcher(template: &str) -> Option<Regex> {
    let mut pattern = String::from("^");
    let mut last = 0;
    for capture in PATH_PARAM.captures_iter(template) {
        let whole = capture.get(0)?;
        pattern.push_str(&regex::escape(&template[last..whole.start()]));
        pattern.push_str(&format!("(?P<{}>[^/]+)", sanitize_group(&capture[1])));
        last = whole.end();
    }
    pattern.push_str(&regex::escape(template[last..].trim_end_matches('/')));
    pattern.push_str("/?$");
    Regex::new(&pattern).ok()
}

/// Regex group names must be identifiers
pub fn sanitize_group(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("p_{}", cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pointer_roundtrip_escapes() {
        let segments = vec!["paths".to_string(), "/pet/{id}".to_string()];
        let pointer = to_pointer(&segments);
        assert_eq!(pointer, "#/paths/~1pet~1{id}");
        assert_eq!(parse_pointer(&pointer), segments);
        assert!(parse_pointer("#").is_empty());
    }

    #[test]
    fn test_split_ref() {
        assert_eq!(split_ref("#/definitions/Pet"), (None, "/definitions/Pet"));
        assert_eq!(
            split_ref("http://example.com/pet.json#/Pet"),
            (Some("http://example.com/pet.json"), "/Pet")
        );
        assert_eq!(split_ref("common.yaml"), (Some("common.yaml"), ""));
    }

    #[test]
    fn test_lookup_through_arrays() {
        let doc = json!({"a": [{"b": 1}, {"b": 2}]});
        assert_eq!(lookup(&doc, &["a", "1", "b"]), Some(&json!(2)));
        assert_eq!(lookup(&doc, &["a", "7"]), None);
    }

    #[test]
    fn test_path_params_and_normalization() {
        assert_eq!(path_params("/pet/{petId}/tag/{tag}"), vec!["petId", "tag"]);
        assert_eq!(normalize_path("/pet/{id}"), normalize_path("/pet/{petId}"));
        assert_eq!(normalize_path("/pet/{id}/"), "/pet/{0}");
        assert_ne!(normalize_path("/pet/{id}"), normalize_path("/pets/{id}"));
    }

    #[test]
    fn test_path_matcher() {
        let matcher = path_matcher("/pet/{pet-id}").unwrap();
        let captures = matcher.captures("/pet/42").unwrap();
        assert_eq!(&captures[sanitize_group("pet-id").as_str()], "42");
        assert!(!matcher.is_match("/pet/42/extra"));
    }
}
