// Directory of PMS codes and the translators that handle them
use crate::cloudbeds::CloudbedsTranslator;
use crate::flat::FlatTranslator;
use crate::mapping::MappingLoader;
use crate::record::MessageKind;
use crate::translator::{MessageFormat, Translator};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub type TranslatorConstructor = fn(&str, Arc<MappingLoader>) -> Box<dyn Translator>;

#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("PMS code must not be empty")]
    InvalidCode,
}

// Translators that can be registered by type.
pub trait NewTranslator: Translator + Sized + 'static {
    fn new_translator(pms_code: &str, loader: Arc<MappingLoader>) -> Self;
}

fn construct<T: NewTranslator>(pms_code: &str, loader: Arc<MappingLoader>) -> Box<dyn Translator> {
    Box::new(T::new_translator(pms_code, loader))
}

#[derive(Clone)]
pub struct TranslatorEntry {
    pub pms_code: String,
    pub type_name: &'static str,
    constructor: TranslatorConstructor,
}

impl TranslatorEntry {
    pub fn create(&self, loader: Arc<MappingLoader>) -> Box<dyn Translator> {
        (self.constructor)(&self.pms_code, loader)
    }
}

impl std::fmt::Debug for TranslatorEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatorEntry")
            .field("pms_code", &self.pms_code)
            .field("type_name", &self.type_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslatorInfo {
    pub pms_code: String,
    pub type_name: String,
    pub supported_formats: Vec<MessageFormat>,
    pub supported_message_types: Vec<MessageKind>,
    pub mapping_file: PathBuf,
}

// "rgbridge::flat::FlatTranslator" -> "FlatTranslator"; generic arguments are dropped.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.find('<').map_or(full, |end| &full[..end]);
    base.rfind("::").map_or(base, |start| &base[start + 2..])
}

pub struct TranslatorRegistry {
    loader: Arc<MappingLoader>,
    entries: RwLock<BTreeMap<String, TranslatorEntry>>,
}

impl TranslatorRegistry {
    pub fn new(loader: Arc<MappingLoader>) -> Self {
        Self {
            loader,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn loader(&self) -> &Arc<MappingLoader> {
        &self.loader
    }

    // Registering an existing code replaces its entry.
    pub fn register(
        &self,
        pms_code: &str,
        type_name: &'static str,
        constructor: TranslatorConstructor,
    ) -> Result<(), RegistryError> {
        if pms_code.trim().is_empty() {
            return Err(RegistryError::InvalidCode);
        }
        let entry = TranslatorEntry {
            pms_code: pms_code.to_string(),
            type_name,
            constructor,
        };
        self.entries.write().insert(pms_code.to_string(), entry);
        info!(pms_code, type_name, "Registered translator");
        Ok(())
    }

    pub fn register_type<T: NewTranslator>(&self, pms_code: &str) -> Result<(), RegistryError> {
        let type_name = short_type_name(std::any::type_name::<T>());
        self.register(pms_code, type_name, construct::<T>)
    }

    pub fn unregister(&self, pms_code: &str) -> bool {
        let removed = self.entries.write().remove(pms_code).is_some();
        if removed {
            info!(pms_code, "Unregistered translator");
        }
        removed
    }

    pub fn get(&self, pms_code: &str) -> Option<TranslatorEntry> {
        self.entries.read().get(pms_code).cloned()
    }

    pub fn create(&self, pms_code: &str) -> Option<Box<dyn Translator>> {
        let entry = self.get(pms_code)?;
        Some(entry.create(Arc::clone(&self.loader)))
    }

    pub fn list(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn contains(&self, pms_code: &str) -> bool {
        self.entries.read().contains_key(pms_code)
    }

    // Builds a throwaway instance to describe the translator. No mapping is loaded.
    pub fn info(&self, pms_code: &str) -> Option<TranslatorInfo> {
        let entry = self.get(pms_code)?;
        let translator = entry.create(Arc::clone(&self.loader));
        Some(TranslatorInfo {
            pms_code: entry.pms_code.clone(),
            type_name: entry.type_name.to_string(),
            supported_formats: translator.supported_formats().to_vec(),
            supported_message_types: translator.supported_message_types().to_vec(),
            mapping_file: translator.mapping_file(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

pub fn register_builtin_translators(registry: &TranslatorRegistry) -> Result<(), RegistryError> {
    registry.register_type::<CloudbedsTranslator>("cloudbeds")?;
    registry.register_type::<FlatTranslator>("cb")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn registry() -> TranslatorRegistry {
        TranslatorRegistry::new(Arc::new(MappingLoader::new("mappings")))
    }

    #[test]
    fn test_builtin_registration() {
        let registry = registry();
        assert!(registry.is_empty());
        register_builtin_translators(&registry).unwrap();

        assert_eq!(registry.list(), vec!["cb".to_string(), "cloudbeds".to_string()]);
        assert!(registry.contains("cloudbeds"));
        assert_eq!(registry.get("cloudbeds").unwrap().type_name, "CloudbedsTranslator");

        let translator = registry.create("cb").unwrap();
        assert_eq!(translator.pms_code(), "cb");
        assert!(translator.supports(MessageKind::Rate));
    }

    #[test_case("rgbridge::cloudbeds::CloudbedsTranslator", "CloudbedsTranslator"; "module path")]
    #[test_case("rgbridge::Wrapper<rgbridge::flat::FlatTranslator>", "Wrapper"; "generic arguments")]
    #[test_case("LocalTranslator", "LocalTranslator"; "no path")]
    fn test_short_type_name(full: &'static str, expected: &str) {
        assert_eq!(short_type_name(full), expected);
    }

    #[test]
    fn test_unknown_code() {
        let registry = registry();
        assert!(registry.get("opera").is_none());
        assert!(registry.create("opera").is_none());
        assert!(registry.info("opera").is_none());
    }

    #[test]
    fn test_unregister_is_noop_when_absent() {
        let registry = registry();
        register_builtin_translators(&registry).unwrap();
        assert!(registry.unregister("cb"));
        assert!(!registry.unregister("cb"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_replaces_existing_code() {
        let registry = registry();
        registry.register_type::<CloudbedsTranslator>("acme").unwrap();
        registry.register_type::<FlatTranslator>("acme").unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("acme").unwrap().type_name, "FlatTranslator");
    }

    #[test]
    fn test_empty_code_is_rejected() {
        let registry = registry();
        assert_eq!(
            registry.register_type::<FlatTranslator>("  "),
            Err(RegistryError::InvalidCode)
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_info_describes_translator() {
        let registry = registry();
        register_builtin_translators(&registry).unwrap();
        let info = registry.info("cloudbeds").unwrap();
        assert_eq!(info.type_name, "CloudbedsTranslator");
        assert_eq!(info.supported_formats, vec![MessageFormat::Json]);
        assert_eq!(
            info.supported_message_types,
            vec![MessageKind::Availability, MessageKind::Rate]
        );
        assert_eq!(info.mapping_file, PathBuf::from("mappings/cloudbeds.yaml"));
    }
}
