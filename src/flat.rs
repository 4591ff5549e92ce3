// Single-line vendors: the whole payload is one canonical record.
use crate::mapping::MappingLoader;
use crate::record::{CanonicalRecord, MessageKind};
use crate::registry::NewTranslator;
use crate::translator::{
    converted, map_fields, mapping_section, MappingCache, MessageFormat, TranslationError,
    Translator,
};
use serde_json::Value;
use std::sync::Arc;

pub struct FlatTranslator {
    pms_code: String,
    mappings: MappingCache,
}

impl FlatTranslator {
    pub fn new(pms_code: &str, loader: Arc<MappingLoader>) -> Self {
        Self {
            pms_code: pms_code.to_string(),
            mappings: MappingCache::new(pms_code, loader),
        }
    }

    fn translate_message(
        &self,
        payload: &Value,
        kind: MessageKind,
    ) -> Result<Vec<CanonicalRecord>, TranslationError> {
        if !payload.is_object() {
            return Err(TranslationError::InvalidPayload(
                "expected a JSON object or an XML document".to_string(),
            ));
        }
        let mapping = mapping_section(&self.mappings, kind)?;
        let fields = match mapping.section(kind) {
            Some(field_map) => map_fields(field_map, &[&converted(&mapping, payload)]),
            None => {
                return Err(TranslationError::MissingSection {
                    pms_code: self.pms_code.clone(),
                    kind,
                })
            }
        };
        Ok(vec![CanonicalRecord::new(kind, fields)])
    }
}

impl NewTranslator for FlatTranslator {
    fn new_translator(pms_code: &str, loader: Arc<MappingLoader>) -> Self {
        Self::new(pms_code, loader)
    }
}

impl Translator for FlatTranslator {
    fn pms_code(&self) -> &str {
        &self.pms_code
    }

    fn supported_formats(&self) -> &[MessageFormat] {
        &[MessageFormat::Json, MessageFormat::Xml]
    }

    fn mappings(&self) -> &MappingCache {
        &self.mappings
    }

    fn validate(&self, payload: &Value, _kind: MessageKind) -> bool {
        payload.is_object()
    }

    fn translate_availability(
        &self,
        payload: &Value,
    ) -> Result<Vec<CanonicalRecord>, TranslationError> {
        self.translate_message(payload, MessageKind::Availability)
    }

    fn translate_rate(&self, payload: &Value) -> Result<Vec<CanonicalRecord>, TranslationError> {
        self.translate_message(payload, MessageKind::Rate)
    }
}
