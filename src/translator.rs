// Translator contract shared by every PMS implementation
use crate::mapping::{FieldMap, MappingDocument, MappingError, MappingLoader};
use crate::record::{CanonicalRecord, MessageKind};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Mapping for PMS '{pms_code}' has no '{kind}' section")]
    MissingSection { pms_code: String, kind: MessageKind },

    #[error("PMS '{pms_code}' does not support {kind} messages")]
    UnsupportedMessageType { pms_code: String, kind: MessageKind },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageFormat {
    Json,
    Xml,
}

impl MessageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageFormat::Json => "JSON",
            MessageFormat::Xml => "XML",
        }
    }
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// One implementation per vendor. Instances are created through the registry
// and own their mapping cache.
pub trait Translator: Send + Sync {
    fn pms_code(&self) -> &str;

    fn supported_formats(&self) -> &[MessageFormat];

    fn supported_message_types(&self) -> &[MessageKind] {
        &MessageKind::ALL
    }

    fn mappings(&self) -> &MappingCache;

    // Structural pre-check. Returns false instead of failing.
    fn validate(&self, payload: &Value, kind: MessageKind) -> bool;

    fn translate_availability(
        &self,
        payload: &Value,
    ) -> Result<Vec<CanonicalRecord>, TranslationError>;

    fn translate_rate(&self, payload: &Value) -> Result<Vec<CanonicalRecord>, TranslationError>;

    fn supports(&self, kind: MessageKind) -> bool {
        self.supported_message_types().contains(&kind)
    }

    fn mapping_file(&self) -> PathBuf {
        self.mappings().path()
    }

    fn translate(
        &self,
        payload: &Value,
        kind: MessageKind,
    ) -> Result<Vec<CanonicalRecord>, TranslationError> {
        if !self.supports(kind) {
            return Err(TranslationError::UnsupportedMessageType {
                pms_code: self.pms_code().to_string(),
                kind,
            });
        }
        let result = match kind {
            MessageKind::Availability => self.translate_availability(payload),
            MessageKind::Rate => self.translate_rate(payload),
        };
        log_translation(self.pms_code(), kind, &result);
        result
    }
}

pub fn log_translation(
    pms_code: &str,
    kind: MessageKind,
    result: &Result<Vec<CanonicalRecord>, TranslationError>,
) {
    match result {
        Ok(records) => info!(
            pms_code,
            message_type = %kind,
            records = records.len(),
            "Successfully translated message"
        ),
        Err(e) => error!(pms_code, message_type = %kind, error = %e, "Failed to translate message"),
    }
}

// Mapping document of one translator instance: loaded on first use and kept
// for the lifetime of the instance.
#[derive(Debug)]
pub struct MappingCache {
    pms_code: String,
    loader: Arc<MappingLoader>,
    document: RwLock<Option<Arc<MappingDocument>>>,
}

impl MappingCache {
    pub fn new(pms_code: impl Into<String>, loader: Arc<MappingLoader>) -> Self {
        Self {
            pms_code: pms_code.into(),
            loader,
            document: RwLock::new(None),
        }
    }

    pub fn get(&self) -> Result<Arc<MappingDocument>, MappingError> {
        if let Some(document) = self.document.read().as_ref() {
            return Ok(Arc::clone(document));
        }
        // Concurrent first uses may both load; the last one stored wins
        let document = Arc::new(self.loader.load(&self.pms_code)?);
        *self.document.write() = Some(Arc::clone(&document));
        Ok(document)
    }

    pub fn is_loaded(&self) -> bool {
        self.document.read().is_some()
    }

    pub fn path(&self) -> PathBuf {
        self.loader.mapping_path(&self.pms_code)
    }
}

// Loads the mapping and checks it has the section for `kind`.
pub fn mapping_section(
    cache: &MappingCache,
    kind: MessageKind,
) -> Result<Arc<MappingDocument>, TranslationError> {
    let document = cache.get()?;
    if document.section(kind).is_none() {
        return Err(TranslationError::MissingSection {
            pms_code: document.pms_code.clone(),
            kind,
        });
    }
    Ok(document)
}

// Walk a dotted path through nested objects.
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, key| current.as_object()?.get(key))
}

// Resolve every entry of `field_map`. Sources are tried in order and the
// first non-null value wins; unresolved fields are left out.
pub fn map_fields(field_map: &FieldMap, sources: &[&Value]) -> Map<String, Value> {
    let mut fields = Map::new();
    for (path, canonical) in field_map.iter() {
        let value = sources
            .iter()
            .find_map(|source| resolve_path(source, path).filter(|v| !v.is_null()));
        if let Some(value) = value {
            fields.insert(canonical.to_string(), value.clone());
        }
    }
    fields
}

// Copy of `payload` with the mapping's conversions applied to its top-level
// fields. Non-object payloads are returned unchanged.
pub fn converted(mapping: &MappingDocument, payload: &Value) -> Value {
    match payload {
        Value::Object(fields) => {
            let mut fields = fields.clone();
            mapping.apply_conversions(&mut fields);
            Value::Object(fields)
        }
        other => other.clone(),
    }
}
