//! Pulling declared parameter values out of a request.

use crate::validation::{Code, Finding};
use axum::http::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;

/// Decoded `key=value` pairs grouped by key, in arrival order
pub fn parse_pairs(input: &[u8]) -> HashMap<String, Vec<String>> {
    let mut pairs: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        pairs.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    pairs
}

/// Split a serialized array according to its `collectionFormat`
pub fn split_collection(values: &[String], format: Option<&str>) -> Vec<String> {
    let delimiter = match format.unwrap_or("csv") {
        "multi" => return values.to_vec(),
        "ssv" => ' ',
        "tsv" => '\t',
        "pipes" => '|',
        _ => ',',
    };
    match values.first() {
        Some(first) if !first.is_empty() => first.split(delimiter).map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

/// Raw request values, before any parameter is looked at
pub struct RequestValues<'a> {
    pub query: HashMap<String, Vec<String>>,
    pub form: HashMap<String, Vec<String>>,
    pub path: HashMap<String, String>,
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
}

impl RequestValues<'_> {
    /// The value supplied for a parameter, shaped by its declared type
    pub fn get(&self, location: &str, name: &str, parameter: &Value) -> Result<Option<Value>, Finding> {
        let strings: Vec<String> = match location {
            "query" => self.query.get(name).cloned().unwrap_or_default(),
            "formData" => self.form.get(name).cloned().unwrap_or_default(),
            "path" => self.path.get(name).cloned().into_iter().collect(),
            "header" => self
                .headers
                .get_all(name)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .map(str::to_string)
                .collect(),
            "body" => return self.json_body(),
            _ => Vec::new(),
        };
        Ok(shape(parameter, &strings))
    }

    fn json_body(&self) -> Result<Option<Value>, Finding> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(self.body).map(Some).map_err(|e| {
            Finding::new(Code::InvalidType, format!("Request body is not valid JSON: {}", e))
        })
    }
}

fn shape(parameter: &Value, strings: &[String]) -> Option<Value> {
    if strings.is_empty() {
        return None;
    }
    if parameter.get("type").and_then(Value::as_str) == Some("array") {
        let format = parameter.get("collectionFormat").and_then(Value::as_str);
        let items = split_collection(strings, format);
        return Some(Value::Array(items.into_iter().map(Value::String).collect()));
    }
    strings.first().cloned().map(Value::String)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_pairs_groups_repeated_keys() {
        let pairs = parse_pairs(b"tag=a&tag=b&name=Fluffy%20Cat");
        assert_eq!(pairs["tag"], vec!["a", "b"]);
        assert_eq!(pairs["name"], vec!["Fluffy Cat"]);
    }

    #[test]
    fn test_split_collection_formats() {
        let one = |s: &str| vec![s.to_string()];
        assert_eq!(split_collection(&one("a,b"), None), vec!["a", "b"]);
        assert_eq!(split_collection(&one("a b"), Some("ssv")), vec!["a", "b"]);
        assert_eq!(split_collection(&one("a\tb"), Some("tsv")), vec!["a", "b"]);
        assert_eq!(split_collection(&one("a|b"), Some("pipes")), vec!["a", "b"]);
        assert_eq!(
            split_collection(&["a".to_string(), "b".to_string()], Some("multi")),
            vec!["a", "b"]
        );
        assert!(split_collection(&one(""), None).is_empty());
    }

    #[test]
    fn test_values_are_shaped_by_type() {
        let headers = HeaderMap::new();
        let values = RequestValues {
            query: parse_pairs(b"ids=1,2&limit=10"),
            form: HashMap::new(),
            path: HashMap::new(),
            headers: &headers,
            body: b"",
        };
        let ids = values
            .get("query", "ids", &json!({"type": "array", "items": {"type": "integer"}}))
            .unwrap();
        assert_eq!(ids, Some(json!(["1", "2"])));
        let limit = values.get("query", "limit", &json!({"type": "integer"})).unwrap();
        assert_eq!(limit, Some(json!("10")));
        assert_eq!(values.get("query", "missing", &json!({})).unwrap(), None);
        assert_eq!(values.get("body", "body", &json!({})).unwrap(), None);
    }

    #[test]
    fn test_malformed_body_is_a_finding() {
        let headers = HeaderMap::new();
        let values = RequestValues {
            query: HashMap::new(),
            form: HashMap::new(),
            path: HashMap::new(),
            headers: &headers,
            body: b"{not json",
        };
        let finding = values.get("body", "body", &json!({})).unwrap_err();
        assert_eq!(finding.code, Code::InvalidType);
    }
}
