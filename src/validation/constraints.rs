//! Runtime constraint checks of concrete values against schema nodes.
//!
//! A single value is checked fail-fast: the first violated constraint is
//! reported and the rest are skipped. Object validation aggregates one
//! finding per offending field.

use super::formats::check_format;
use super::report::{Code, Finding};
use crate::spec::pointer::{child, parse_pointer};
use regex::Regex;
use serde_json::{Map, Number, Value};

/// Validates values against constraint nodes.
///
/// `$ref` nodes are looked up in an optional definitions table (the one a
/// composed schema carries); references outside it are not checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintValidator<'a> {
    definitions: Option<&'a Map<String, Value>>,
}

impl<'a> ConstraintValidator<'a> {
    pub fn new() -> Self {
        Self { definitions: None }
    }

    /// Use the `definitions` table of `root` for `$ref` lookups
    pub fn with_root(root: &'a Value) -> Self {
        Self {
            definitions: root.get("definitions").and_then(Value::as_object),
        }
    }

    fn deref<'s>(&self, schema: &'s Value) -> Option<&'s Value>
    where
        'a: 's,
    {
        let Some(reference) = schema.get("$ref").and_then(Value::as_str) else {
            return Some(schema);
        };
        let segments = parse_pointer(reference);
        match (segments.first().map(String::as_str), segments.get(1)) {
            (Some("definitions"), Some(name)) if segments.len() == 2 => {
                self.definitions.and_then(|defs| defs.get(name))
            }
            _ => None,
        }
    }

    /// Check one value; the first failing constraint is returned
    pub fn check_value(&self, value: &Value, schema: &Value, path: &[String]) -> Result<(), Finding> {
        let Some(schema) = self.deref(schema) else {
            return Ok(());
        };

        let coerced = self.check_type(value, schema, path)?;
        let value: &Value = &coerced;

        check_enum(value, schema, path)?;
        check_maximum(value, schema, path)?;
        check_max_items(value, schema, path)?;
        check_max_length(value, schema, path)?;
        check_max_properties(value, schema, path)?;
        check_minimum(value, schema, path)?;
        check_min_items(value, schema, path)?;
        check_min_length(value, schema, path)?;
        check_min_properties(value, schema, path)?;
        check_multiple_of(value, schema, path)?;
        check_pattern(value, schema, path)?;
        check_unique_items(value, schema, path)?;

        Ok(())
    }

    /// Validate a value and every nested property, one finding per failing field
    pub fn validate_object(&self, value: &Value, schema: &Value, path: &[String]) -> Vec<Finding> {
        let mut findings = vec![];
        self.collect(value, schema, path, &mut findings, 0);
        findings
    }

    fn collect(
        &self,
        value: &Value,
        schema: &Value,
        path: &[String],
        findings: &mut Vec<Finding>,
        depth: usize,
    ) {
        // Recursive schemas are bounded by the value, but guard runaway input anyway
        if depth > 64 {
            return;
        }
        let Some(schema) = self.deref(schema) else {
            return;
        };

        if let Err(finding) = self.check_value(value, schema, path) {
            findings.push(finding);
            return;
        }

        match value {
            Value::Object(map) => {
                if let Some(required) = schema.get("required").and_then(Value::as_array) {
                    for name in required.iter().filter_map(Value::as_str) {
                        if !map.contains_key(name) {
                            findings.push(
                                Finding::new(
                                    Code::ObjectMissingRequiredProperty,
                                    format!("Missing required property: {}", name),
                                )
                                .with_path(path.to_vec()),
                            );
                        }
                    }
                }
                if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                    for (name, property) in properties {
                        if let Some(field) = map.get(name) {
                            self.collect(field, property, &child(path, name), findings, depth + 1);
                        }
                    }
                }
            }
            Value::Array(items) => {
                if let Some(item_schema) = schema.get("items")
                    && self.is_structured(item_schema)
                {
                    for (index, item) in items.iter().enumerate() {
                        if item.is_object() {
                            self.collect(
                                item,
                                item_schema,
                                &child(path, index.to_string()),
                                findings,
                                depth + 1,
                            );
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn is_structured(&self, schema: &Value) -> bool {
        self.deref(schema)
            .map(|s| s.get("properties").is_some() || s.get("required").is_some())
            .unwrap_or(false)
    }

    /// Type and format coercion; returns the value in its coerced form
    fn check_type<'v>(
        &self,
        value: &'v Value,
        schema: &Value,
        path: &[String],
    ) -> Result<std::borrow::Cow<'v, Value>, Finding> {
        use std::borrow::Cow;

        let types: Vec<&str> = match schema.get("type") {
            Some(Value::String(kind)) => vec![kind.as_str()],
            Some(Value::Array(kinds)) => kinds.iter().filter_map(Value::as_str).collect(),
            _ => return Ok(Cow::Borrowed(value)),
        };

        let mut last_error = None;
        for kind in &types {
            match self.coerce(value, kind, schema, path) {
                Ok(coerced) => return Ok(coerced),
                Err(finding) => last_error = Some(finding),
            }
        }
        Err(last_error.unwrap_or_else(|| invalid_type(&types.join(","), value, path)))
    }

    fn coerce<'v>(
        &self,
        value: &'v Value,
        kind: &str,
        schema: &Value,
        path: &[String],
    ) -> Result<std::borrow::Cow<'v, Value>, Finding> {
        use std::borrow::Cow;

        match kind {
            "boolean" => match value {
                Value::Bool(_) => Ok(Cow::Borrowed(value)),
                Value::String(s) if s == "true" || s == "false" => {
                    Ok(Cow::Owned(Value::Bool(s == "true")))
                }
                _ => Err(invalid_type(kind, value, path)),
            },
            "integer" => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Cow::Borrowed(value)),
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 => Ok(Cow::Borrowed(value)),
                    _ => Err(invalid_type(kind, value, path)),
                },
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(|i| Cow::Owned(Value::Number(i.into())))
                    .map_err(|_| invalid_type(kind, value, path)),
                _ => Err(invalid_type(kind, value, path)),
            },
            "number" => match value {
                Value::Number(_) => Ok(Cow::Borrowed(value)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .and_then(|f| {
                        // Keep integral strings integral so decimal arithmetic stays exact
                        s.trim()
                            .parse::<i64>()
                            .map(Number::from)
                            .ok()
                            .or_else(|| Number::from_f64(f))
                    })
                    .map(|n| Cow::Owned(Value::Number(n)))
                    .ok_or_else(|| invalid_type(kind, value, path)),
                _ => Err(invalid_type(kind, value, path)),
            },
            "string" => match value {
                Value::String(s) => {
                    if let Some(format) = schema.get("format").and_then(Value::as_str)
                        && !check_format(format, s)
                    {
                        return Err(Finding::new(
                            Code::InvalidFormat,
                            format!("Object didn't pass validation for format {}: {}", format, s),
                        )
                        .with_path(path.to_vec()));
                    }
                    Ok(Cow::Borrowed(value))
                }
                _ => Err(invalid_type(kind, value, path)),
            },
            "array" => match value {
                Value::Array(items) => {
                    let Some(item_schema) = schema.get("items") else {
                        return Err(Finding::new(
                            Code::ObjectMissingRequiredProperty,
                            "Missing required property: items",
                        )
                        .with_path(path.to_vec()));
                    };
                    for (index, item) in items.iter().enumerate() {
                        self.check_value(item, item_schema, &child(path, index.to_string()))?;
                    }
                    Ok(Cow::Borrowed(value))
                }
                _ => Err(invalid_type(kind, value, path)),
            },
            "object" => match value {
                Value::Object(_) => Ok(Cow::Borrowed(value)),
                _ => Err(invalid_type(kind, value, path)),
            },
            "null" => match value {
                Value::Null => Ok(Cow::Borrowed(value)),
                _ => Err(invalid_type(kind, value, path)),
            },
            // file, File, void and model names carry no value-level type
            _ => Ok(Cow::Borrowed(value)),
        }
    }
}

/// Fail-fast check of one value, as a finding list
pub fn validate_value(value: &Value, schema: &Value, path: &[String]) -> Vec<Finding> {
    ConstraintValidator::new()
        .check_value(value, schema, path)
        .err()
        .into_iter()
        .collect()
}

/// Presence check performed before any type checks.
///
/// Returns `Ok(true)` when a value is present and should be validated,
/// `Ok(false)` when an absent value needs no further checks.
pub fn check_presence(
    value: Option<&Value>,
    required: bool,
    has_default: bool,
    path: &[String],
) -> Result<bool, Finding> {
    match value {
        Some(_) => Ok(true),
        None if required && !has_default => Err(Finding::new(
            Code::Required,
            "Value is required but was not provided",
        )
        .with_path(path.to_vec())),
        None => Ok(false),
    }
}

/// Static mode: check a node's own default value against its constraints
pub fn check_default(schema: &Value, default_key: &str, path: &[String]) -> Option<Finding> {
    let default = schema.get(default_key)?;
    ConstraintValidator::new()
        .check_value(default, schema, &child(path, default_key))
        .err()
}

fn invalid_type(expected: &str, value: &Value, path: &[String]) -> Finding {
    Finding::new(
        Code::InvalidType,
        format!(
            "Expected type {} but found type {}",
            expected,
            type_name(value)
        ),
    )
    .with_path(path.to_vec())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Numeric view of a constraint or value; strings like `"1.0"` count
pub(crate) fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn limit(schema: &Value, key: &str) -> Option<f64> {
    schema.get(key).and_then(numeric)
}

fn count_limit(schema: &Value, key: &str) -> Option<usize> {
    limit(schema, key).filter(|f| *f >= 0.0).map(|f| f as usize)
}

fn flag(schema: &Value, key: &str) -> bool {
    match schema.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

fn fail(code: Code, message: String, path: &[String]) -> Result<(), Finding> {
    Err(Finding::new(code, message).with_path(path.to_vec()))
}

fn check_enum(value: &Value, schema: &Value, path: &[String]) -> Result<(), Finding> {
    let Some(options) = schema.get("enum").and_then(Value::as_array) else {
        return Ok(());
    };
    let matches = options.iter().any(|option| {
        option == value
            || match (numeric(option), value) {
                (Some(expected), Value::Number(n)) => n.as_f64() == Some(expected),
                _ => false,
            }
    });
    if matches {
        Ok(())
    } else {
        fail(
            Code::EnumMismatch,
            format!("No enum match for: {}", value),
            path,
        )
    }
}

fn check_maximum(value: &Value, schema: &Value, path: &[String]) -> Result<(), Finding> {
    let (Some(maximum), Value::Number(n)) = (limit(schema, "maximum"), value) else {
        return Ok(());
    };
    let Some(actual) = n.as_f64() else {
        return Ok(());
    };
    if flag(schema, "exclusiveMaximum") {
        if actual >= maximum {
            return fail(
                Code::MaximumExclusive,
                format!(
                    "Value {} is equal or greater than exclusive maximum {}",
                    n, maximum
                ),
                path,
            );
        }
    } else if actual > maximum {
        return fail(
            Code::Maximum,
            format!("Value {} is greater than maximum {}", n, maximum),
            path,
        );
    }
    Ok(())
}

fn check_minimum(value: &Value, schema: &Value, path: &[String]) -> Result<(), Finding> {
    let (Some(minimum), Value::Number(n)) = (limit(schema, "minimum"), value) else {
        return Ok(());
    };
    let Some(actual) = n.as_f64() else {
        return Ok(());
    };
    if flag(schema, "exclusiveMinimum") {
        if actual <= minimum {
            return fail(
                Code::MinimumExclusive,
                format!(
                    "Value {} is equal or less than exclusive minimum {}",
                    n, minimum
                ),
                path,
            );
        }
    } else if actual < minimum {
        return fail(
            Code::Minimum,
            format!("Value {} is less than minimum {}", n, minimum),
            path,
        );
    }
    Ok(())
}

fn check_max_items(value: &Value, schema: &Value, path: &[String]) -> Result<(), Finding> {
    match (count_limit(schema, "maxItems"), value) {
        (Some(max), Value::Array(items)) if items.len() > max => fail(
            Code::ArrayLengthLong,
            format!("Array is too long ({}), maximum {}", items.len(), max),
            path,
        ),
        _ => Ok(()),
    }
}

fn check_min_items(value: &Value, schema: &Value, path: &[String]) -> Result<(), Finding> {
    match (count_limit(schema, "minItems"), value) {
        (Some(min), Value::Array(items)) if items.len() < min => fail(
            Code::ArrayLengthShort,
            format!("Array is too short ({}), minimum {}", items.len(), min),
            path,
        ),
        _ => Ok(()),
    }
}

fn check_max_length(value: &Value, schema: &Value, path: &[String]) -> Result<(), Finding> {
    match (count_limit(schema, "maxLength"), value) {
        (Some(max), Value::String(s)) if s.chars().count() > max => fail(
            Code::MaxLength,
            format!(
                "String is too long ({} chars), maximum {}",
                s.chars().count(),
                max
            ),
            path,
        ),
        _ => Ok(()),
    }
}

fn check_min_length(value: &Value, schema: &Value, path: &[String]) -> Result<(), Finding> {
    match (count_limit(schema, "minLength"), value) {
        (Some(min), Value::String(s)) if s.chars().count() < min => fail(
            Code::MinLength,
            format!(
                "String is too short ({} chars), minimum {}",
                s.chars().count(),
                min
            ),
            path,
        ),
        _ => Ok(()),
    }
}

fn check_max_properties(value: &Value, schema: &Value, path: &[String]) -> Result<(), Finding> {
    match (count_limit(schema, "maxProperties"), value) {
        (Some(max), Value::Object(map)) if map.len() > max => fail(
            Code::MaxProperties,
            format!(
                "Too many properties defined ({}), maximum {}",
                map.len(),
                max
            ),
            path,
        ),
        _ => Ok(()),
    }
}

fn check_min_properties(value: &Value, schema: &Value, path: &[String]) -> Result<(), Finding> {
    match (count_limit(schema, "minProperties"), value) {
        (Some(min), Value::Object(map)) if map.len() < min => fail(
            Code::MinProperties,
            format!(
                "Too few properties defined ({}), minimum {}",
                map.len(),
                min
            ),
            path,
        ),
        _ => Ok(()),
    }
}

fn check_multiple_of(value: &Value, schema: &Value, path: &[String]) -> Result<(), Finding> {
    let (Some(divisor), Value::Number(n)) = (schema.get("multipleOf"), value) else {
        return Ok(());
    };
    let divisor_text = match divisor {
        Value::Number(d) => d.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Ok(()),
    };
    match is_multiple_of(&n.to_string(), &divisor_text) {
        Some(false) => fail(
            Code::MultipleOf,
            format!("Value {} is not a multiple of {}", n, divisor_text),
            path,
        ),
        _ => Ok(()),
    }
}

fn check_pattern(value: &Value, schema: &Value, path: &[String]) -> Result<(), Finding> {
    let (Some(pattern), Value::String(s)) = (schema.get("pattern").and_then(Value::as_str), value)
    else {
        return Ok(());
    };
    // An uncompilable pattern is a document problem, not a value problem
    let Ok(regex) = Regex::new(pattern) else {
        return Ok(());
    };
    if regex.is_match(s) {
        Ok(())
    } else {
        fail(
            Code::Pattern,
            format!("String does not match pattern {}: {}", pattern, s),
            path,
        )
    }
}

fn check_unique_items(value: &Value, schema: &Value, path: &[String]) -> Result<(), Finding> {
    let Value::Array(items) = value else {
        return Ok(());
    };
    if !flag(schema, "uniqueItems") {
        return Ok(());
    }
    for (i, left) in items.iter().enumerate() {
        if let Some(offset) = items[i + 1..].iter().position(|right| right == left) {
            return fail(
                Code::ArrayUnique,
                format!(
                    "Array items are not unique (indexes {} and {})",
                    i,
                    i + 1 + offset
                ),
                path,
            );
        }
    }
    Ok(())
}

/// Exact decimal `value % divisor == 0`.
///
/// Returns `None` when either side cannot be represented exactly or the
/// divisor is zero.
fn is_multiple_of(value: &str, divisor: &str) -> Option<bool> {
    let (value_digits, value_scale) = parse_decimal(value)?;
    let (divisor_digits, divisor_scale) = parse_decimal(divisor)?;
    if divisor_digits == 0 {
        return None;
    }
    let scale = value_scale.max(divisor_scale);
    let value_scaled = value_digits.checked_mul(10i128.checked_pow(scale - value_scale)?)?;
    let divisor_scaled = divisor_digits.checked_mul(10i128.checked_pow(scale - divisor_scale)?)?;
    Some(value_scaled % divisor_scaled == 0)
}

/// Parse a decimal literal (optionally with exponent) into digits and scale
fn parse_decimal(text: &str) -> Option<(i128, u32)> {
    let text = text.trim();
    let (mantissa, exponent) = match text.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i32>().ok()?),
        None => (text, 0),
    };
    let (negative, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let digits: String = format!("{}{}", whole, fraction);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut number: i128 = digits.parse().ok()?;
    let scale = i32::try_from(fraction.len()).ok()?.checked_sub(exponent)?;
    if scale < 0 {
        number = number.checked_mul(10i128.checked_pow(scale.unsigned_abs())?)?;
    }
    if negative {
        number = -number;
    }
    Some((number, u32::try_from(scale).unwrap_or(0)))
}
