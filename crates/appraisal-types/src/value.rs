use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// A free-form record section: a JSON object keyed by field name.
pub type Section = Map<String, Value>;

/// Partial update for a record section. Same shape as [`Section`].
pub type Patch = Map<String, Value>;

/// Read a number out of a loosely-typed producer value.
///
/// Accepts JSON numbers, numeric strings (currency symbols, thousands
/// separators, `%` and whitespace are ignored) and objects carrying the
/// figure under `total`, `amount` or `value`. Non-finite results are `None`.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_lenient(s),
        Value::Object(map) => ["total", "amount", "value"]
            .iter()
            .find_map(|key| map.get(*key).and_then(as_number)),
        Value::Null | Value::Bool(_) | Value::Array(_) => None,
    }
}

fn parse_lenient(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ',' | '%' | '₪' | '$' | '€'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Whether a value carries no information: null, blank string, empty array or object.
///
/// Numbers (including zero) and booleans are always populated.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Look up a dot-separated path (`"insurance.agent.name"`) inside a section.
pub fn get_path<'a>(section: &'a Section, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = section.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Numeric reading of the value at `path`, see [`as_number`].
pub fn number_at(section: &Section, path: &str) -> Option<f64> {
    get_path(section, path).and_then(as_number)
}

/// First populated number among several alias paths.
pub fn first_number(section: &Section, paths: &[&str]) -> Option<f64> {
    paths.iter().find_map(|path| number_at(section, path))
}

/// Serde adapter: lenient `f64`, unreadable input becomes `0.0`.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(as_number(&raw).unwrap_or(0.0))
}

/// Serde adapter: lenient line-item quantity; unreadable or non-positive
/// input counts as a single unit.
pub(crate) fn lenient_quantity<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(as_number(&raw).filter(|q| *q > 0.0).unwrap_or(1.0))
}

/// Serde adapter: lenient optional `f64`.
pub(crate) fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(as_number(&raw))
}

/// Serde adapter: any scalar rendered as a string (legacy producers send
/// numbers where text is expected).
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}
