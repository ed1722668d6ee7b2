//! Flattening of inheritance chains into one denormalized schema.
//!
//! Composition starts from the normalized (unresolved) tree so a model's own
//! properties can be told apart from inherited ones. Every reference to a
//! declared model becomes a `#/definitions/<name>` placeholder backed by a
//! `definitions` table on the composed root, so each referenced model is
//! composed once however often and however cyclically it is referenced.

use super::definitions::DefinitionRegistry;
use super::dialect::Dialect;
use super::pointer::{lookup, parse_pointer, split_ref, to_pointer};
use serde_json::{Map, Number, Value, json};
use std::collections::BTreeMap;

/// Bounds that may be written as numeric strings (`"1.0"`)
const NUMERIC_KEYWORDS: &[&str] = &["minimum", "maximum", "multipleOf"];

pub struct Composer<'a> {
    dialect: &'a dyn Dialect,
    normalized: &'a Value,
    definitions: &'a DefinitionRegistry,
    table: BTreeMap<String, Value>,
}

impl<'a> Composer<'a> {
    pub fn new(
        dialect: &'a dyn Dialect,
        normalized: &'a Value,
        definitions: &'a DefinitionRegistry,
    ) -> Self {
        Self {
            dialect,
            normalized,
            definitions,
            table: BTreeMap::new(),
        }
    }

    /// Compose the model at `pointer`; `None` when no such model is declared
    pub fn compose(mut self, pointer: &str) -> Option<Value> {
        self.model(pointer)?;

        let mut composed = self.compose_model(pointer);
        if !self.table.is_empty()
            && let Some(map) = composed.as_object_mut()
        {
            let table: Map<String, Value> = std::mem::take(&mut self.table).into_iter().collect();
            map.insert("definitions".to_string(), Value::Object(table));
        }
        Some(composed)
    }

    fn model(&self, pointer: &str) -> Option<&'a Value> {
        let node = self.definitions.get(pointer)?;
        if !node.kind.is_model() {
            return None;
        }
        lookup(self.normalized, node.location.as_ref()?)
    }

    fn compose_model(&mut self, pointer: &str) -> Value {
        let own = self.model(pointer).map(|m| self.dialect.own_schema(m)).unwrap_or_default();
        let lineage = self
            .definitions
            .get(pointer)
            .map(|n| n.lineage().to_vec())
            .unwrap_or_default();

        let mut properties = Map::new();
        let mut required: Vec<Value> = Vec::new();
        let sources = lineage
            .iter()
            .filter_map(|ancestor| self.model(ancestor))
            .map(|ancestor| self.dialect.own_schema(ancestor))
            .chain(std::iter::once(own.clone()));

        // Root-first, so the model's own declarations land last and win
        for source in sources.collect::<Vec<_>>() {
            if let Some(declared) = source.get("properties").and_then(Value::as_object) {
                for (name, schema) in declared {
                    let rewritten = self.rewrite(schema);
                    properties.insert(name.clone(), rewritten);
                }
            }
            for name in source.get("required").and_then(Value::as_array).into_iter().flatten() {
                if !required.contains(name) {
                    required.push(name.clone());
                }
            }
        }

        let mut composed = Map::new();
        for (key, value) in own {
            if matches!(key.as_str(), "properties" | "required" | "allOf" | "subTypes" | "id") {
                continue;
            }
            composed.insert(key, value);
        }
        normalize_numbers(&mut composed);
        composed.insert("title".to_string(), json!(format!("Composed {}", name_of(pointer))));
        composed.insert("type".to_string(), json!("object"));
        composed.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            composed.insert("required".to_string(), Value::Array(required));
        }

        Value::Object(composed)
    }

    fn rewrite(&mut self, schema: &Value) -> Value {
        match schema {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return self.rewrite_ref(schema, reference);
                }
                let mut out = Map::new();
                for (key, value) in map {
                    let rewritten = match key.as_str() {
                        "properties" => match value {
                            Value::Object(properties) => Value::Object(
                                properties
                                    .iter()
                                    .map(|(name, property)| (name.clone(), self.rewrite(property)))
                                    .collect(),
                            ),
                            other => other.clone(),
                        },
                        "items" | "additionalProperties" => match value {
                            Value::Array(items) => Value::Array(items.iter().map(|i| self.rewrite(i)).collect()),
                            other => self.rewrite(other),
                        },
                        "allOf" => match value {
                            Value::Array(members) => Value::Array(members.iter().map(|m| self.rewrite(m)).collect()),
                            other => other.clone(),
                        },
                        _ => value.clone(),
                    };
                    out.insert(key.clone(), rewritten);
                }
                normalize_numbers(&mut out);
                Value::Object(out)
            }
            other => other.clone(),
        }
    }

    fn rewrite_ref(&mut self, schema: &Value, reference: &str) -> Value {
        let (None, fragment) = split_ref(reference) else {
            return schema.clone();
        };
        let pointer = to_pointer(&parse_pointer(fragment));
        let Some(node) = self.definitions.get(&pointer) else {
            return schema.clone();
        };
        if !node.kind.is_model() || !node.is_defined() {
            return schema.clone();
        }

        let name = name_of(&pointer);
        if !self.table.contains_key(&name) {
            // Reserve the slot first so a model that refers to itself terminates
            self.table.insert(name.clone(), json!({}));
            let composed = self.compose_model(&pointer);
            self.table.insert(name.clone(), composed);
        }
        json!({"$ref": format!("#/definitions/{}", name)})
    }
}

fn name_of(pointer: &str) -> String {
    parse_pointer(pointer).pop().unwrap_or_default()
}

/// Parse numeric-string bounds into numbers
fn normalize_numbers(schema: &mut Map<String, Value>) {
    for keyword in NUMERIC_KEYWORDS {
        let Some(Value::String(text)) = schema.get(*keyword) else {
            continue;
        };
        let parsed = text
            .trim()
            .parse::<i64>()
            .map(Number::from)
            .ok()
            .or_else(|| text.trim().parse::<f64>().ok().and_then(Number::from_f64));
        if let Some(number) = parsed {
            schema.insert(keyword.to_string(), Value::Number(number));
        }
    }
}
