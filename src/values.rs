// Scalar attribute values and lenient boolean parsing
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

const TRUE_WORDS: [&str; 8] = ["true", "t", "yes", "y", "1", "on", "enabled", "active"];
const FALSE_WORDS: [&str; 8] = ["false", "f", "no", "n", "0", "off", "disabled", "inactive"];

// A primitive carried from a canonical record into an XML attribute.
// Vendors send numbers, numeric strings and booleans interchangeably, so the
// typed messages keep whatever arrived and only decide how to print it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            Scalar::Int(i) => Some(*i != 0),
            Scalar::Float(f) => Some(*f != 0.0),
            Scalar::Text(s) => parse_boolean_str(s),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Scalar::Text(s) if s.trim().is_empty())
    }
}

// Booleans always print lowercase, which is what xs:boolean expects.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(true) => f.write_str("true"),
            Scalar::Bool(false) => f.write_str("false"),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

fn parse_boolean_str(raw: &str) -> Option<bool> {
    let word = raw.trim().to_lowercase();
    if TRUE_WORDS.contains(&word.as_str()) {
        return Some(true);
    }
    if FALSE_WORDS.contains(&word.as_str()) {
        return Some(false);
    }
    word.parse::<i64>().ok().map(|n| n != 0)
}

// Interpret a vendor flag. Returns None for values that carry no boolean
// meaning (objects, arrays, null, unrecognised words).
pub fn parse_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => parse_boolean_str(s),
        _ => None,
    }
}
