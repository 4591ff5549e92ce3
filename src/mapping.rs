// Mapping store: per-vendor YAML documents declaring vendor path -> canonical field
use crate::record::MessageKind;
use serde_json::{Map, Number, Value};
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_MAPPING_DIR: &str = "mappings";

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Mapping file not found for PMS '{pms_code}': {}", .path.display())]
    NotFound { pms_code: String, path: PathBuf },

    #[error("Invalid mapping for PMS '{pms_code}': {reason}")]
    Invalid { pms_code: String, reason: String },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// The fixed set of value conversions a mapping may name. Anything else in
// the `conversions` section is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Upper,
    Lower,
    Int,
    Float,
}

impl Conversion {
    pub fn parse(descriptor: &str) -> Option<Self> {
        let descriptor = descriptor.trim().to_lowercase();
        match descriptor.as_str() {
            "upper" | "uppercase" | "upper_case" => Some(Conversion::Upper),
            "lower" | "lowercase" | "lower_case" => Some(Conversion::Lower),
            "int" | "integer" => Some(Conversion::Int),
            "float" | "decimal" => Some(Conversion::Float),
            // Older mapping files spell conversions as lambda strings. Only the
            // operation name is read from them; nothing is evaluated.
            d if d.starts_with("lambda") => {
                if d.contains("upper(") {
                    Some(Conversion::Upper)
                } else if d.contains("lower(") {
                    Some(Conversion::Lower)
                } else if d.contains("int(") {
                    Some(Conversion::Int)
                } else if d.contains("float(") {
                    Some(Conversion::Float)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    // Returns None when the value cannot be converted; callers keep the
    // original value in that case.
    pub fn apply(&self, value: &Value) -> Option<Value> {
        match self {
            Conversion::Upper => scalar_text(value).map(|s| Value::String(s.to_uppercase())),
            Conversion::Lower => scalar_text(value).map(|s| Value::String(s.to_lowercase())),
            Conversion::Int => {
                let f = scalar_f64(value)?;
                if !f.is_finite() || f.abs() >= i64::MAX as f64 {
                    return None;
                }
                Some(Value::from(f.trunc() as i64))
            }
            Conversion::Float => scalar_f64(value)
                .and_then(Number::from_f64)
                .map(Value::Number),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

// Ordered vendor path -> canonical field entries of one mapping section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, String)>,
}

impl FieldMap {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn canonical_for(&self, vendor_path: &str) -> Option<&str> {
        self.iter()
            .find(|(path, _)| *path == vendor_path)
            .map(|(_, canonical)| canonical)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingDocument {
    pub pms_code: String,
    pub availability: Option<FieldMap>,
    pub rate: Option<FieldMap>,
    pub conversions: BTreeMap<String, Conversion>,
}

impl MappingDocument {
    pub fn from_yaml_str(pms_code: &str, text: &str) -> Result<Self, MappingError> {
        let invalid = |reason: &str| MappingError::Invalid {
            pms_code: pms_code.to_string(),
            reason: reason.to_string(),
        };

        let root: YamlValue = serde_yaml::from_str(text)?;
        let root = root
            .as_mapping()
            .ok_or_else(|| invalid("mapping file must be a mapping at the top level"))?;

        let has_availability = root.contains_key("availability");
        let has_rate = root.contains_key("rate");
        if !has_availability && !has_rate {
            return Err(invalid(
                "mapping file must contain at least an 'availability' or 'rate' section",
            ));
        }

        let availability = match root.get("availability") {
            Some(section) => Some(
                field_map(pms_code, "availability", section)
                    .ok_or_else(|| invalid("'availability' section must be a mapping"))?,
            ),
            None => None,
        };
        let rate = match root.get("rate") {
            Some(section) => Some(
                field_map(pms_code, "rate", section)
                    .ok_or_else(|| invalid("'rate' section must be a mapping"))?,
            ),
            None => None,
        };

        Ok(Self {
            pms_code: pms_code.to_string(),
            availability,
            rate,
            conversions: conversions(pms_code, root.get("conversions")),
        })
    }

    pub fn section(&self, kind: MessageKind) -> Option<&FieldMap> {
        match kind {
            MessageKind::Availability => self.availability.as_ref(),
            MessageKind::Rate => self.rate.as_ref(),
        }
    }

    // Run the configured conversions over the top-level fields of `fields`.
    // A conversion that does not fit the value leaves it untouched.
    pub fn apply_conversions(&self, fields: &mut Map<String, Value>) {
        for (field, conversion) in &self.conversions {
            let Some(current) = fields.get(field) else {
                continue;
            };
            match conversion.apply(current) {
                Some(converted) => {
                    fields.insert(field.clone(), converted);
                }
                None => debug!(
                    pms_code = %self.pms_code,
                    field = %field,
                    ?conversion,
                    "Conversion skipped for incompatible value"
                ),
            }
        }
    }
}

fn yaml_scalar(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// A null section (`rate:` with nothing below it) counts as an empty map.
fn field_map(pms_code: &str, section: &str, value: &YamlValue) -> Option<FieldMap> {
    if value.is_null() {
        return Some(FieldMap::default());
    }
    let mapping = value.as_mapping()?;
    let mut entries = Vec::with_capacity(mapping.len());
    for (key, canonical) in mapping {
        match (yaml_scalar(key), yaml_scalar(canonical)) {
            (Some(key), Some(canonical)) => entries.push((key, canonical)),
            _ => warn!(
                pms_code,
                section,
                ?key,
                "Skipping mapping entry that is not a scalar pair"
            ),
        }
    }
    Some(FieldMap { entries })
}

fn conversions(pms_code: &str, value: Option<&YamlValue>) -> BTreeMap<String, Conversion> {
    let mut result = BTreeMap::new();
    let Some(mapping) = value.and_then(YamlValue::as_mapping) else {
        return result;
    };
    for (field, descriptor) in mapping {
        let field = yaml_scalar(field);
        let conversion = descriptor.as_str().and_then(Conversion::parse);
        match (field, conversion) {
            (Some(field), Some(conversion)) => {
                result.insert(field, conversion);
            }
            (field, _) => debug!(pms_code, ?field, "Ignoring unrecognised conversion"),
        }
    }
    result
}

// Loads mapping documents from `<mapping_dir>/<pms_code>.yaml`.
#[derive(Debug, Clone)]
pub struct MappingLoader {
    mapping_dir: PathBuf,
}

impl Default for MappingLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MAPPING_DIR)
    }
}

impl MappingLoader {
    pub fn new(mapping_dir: impl Into<PathBuf>) -> Self {
        Self {
            mapping_dir: mapping_dir.into(),
        }
    }

    pub fn mapping_dir(&self) -> &Path {
        &self.mapping_dir
    }

    pub fn mapping_path(&self, pms_code: &str) -> PathBuf {
        self.mapping_dir.join(format!("{}.yaml", pms_code))
    }

    pub fn load(&self, pms_code: &str) -> Result<MappingDocument, MappingError> {
        // PMS codes become file names, so keep them to a safe alphabet
        let code_ok = !pms_code.is_empty()
            && pms_code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !code_ok {
            return Err(MappingError::Invalid {
                pms_code: pms_code.to_string(),
                reason: "PMS code may only contain letters, digits, '_' and '-'".to_string(),
            });
        }

        let path = self.mapping_path(pms_code);
        if !path.is_file() {
            return Err(MappingError::NotFound {
                pms_code: pms_code.to_string(),
                path,
            });
        }

        let text = std::fs::read_to_string(&path)?;
        let document = MappingDocument::from_yaml_str(pms_code, &text)?;
        info!(
            pms_code,
            path = %path.display(),
            conversions = document.conversions.len(),
            "Loaded mapping"
        );
        Ok(document)
    }
}
