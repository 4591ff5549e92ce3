// Inbound PMS message to delivered OTA documents
use crate::config::Settings;
use crate::forwarder::{ForwardError, Forwarder, InternalApiClient};
use crate::mapping::{MappingError, MappingLoader};
use crate::messages::{AvailStatusMessage, RateAmountMessage};
use crate::payload::{self, PayloadError};
use crate::record::{CanonicalRecord, MessageKind};
use crate::registry::{register_builtin_translators, TranslatorRegistry};
use crate::schema::SchemaCatalog;
use crate::translator::{MessageFormat, TranslationError, Translator};
use crate::xml_builder::{
    build_availability_document, build_rate_document, BuildError, DocumentOptions,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unknown PMS code: {0}")]
    UnknownPms(String),

    #[error("PMS '{pms_code}' does not accept {format} payloads")]
    UnsupportedFormat {
        pms_code: String,
        format: MessageFormat,
    },

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("Message validation failed for PMS '{pms_code}'")]
    ValidationFailed { pms_code: String },

    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    #[error("Canonical record does not fit the {kind} message: {source}")]
    Message {
        kind: MessageKind,
        source: serde_json::Error,
    },

    #[error("Failed to build XML: {0}")]
    Build(#[from] BuildError),

    #[error("Generated XML for hotel '{hotel_code}' failed schema validation: {diagnostic}")]
    Schema {
        hotel_code: String,
        diagnostic: String,
    },

    #[error("Failed to forward to internal API: {0}")]
    Forward(#[from] ForwardError),

    #[error("Setup error: {0}")]
    Setup(String),
}

impl DispatchError {
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::UnknownPms(_) => 404,
            DispatchError::UnsupportedFormat { .. }
            | DispatchError::Payload(_)
            | DispatchError::ValidationFailed { .. } => 400,
            DispatchError::Translation(e) => match e {
                TranslationError::Mapping(MappingError::NotFound { .. })
                | TranslationError::MissingSection { .. } => 404,
                TranslationError::Mapping(MappingError::Invalid { .. })
                | TranslationError::Mapping(MappingError::Yaml(_))
                | TranslationError::UnsupportedMessageType { .. } => 400,
                TranslationError::Mapping(MappingError::Io(_))
                | TranslationError::InvalidPayload(_) => 500,
            },
            DispatchError::Message { .. }
            | DispatchError::Build(_)
            | DispatchError::Schema { .. }
            | DispatchError::Setup(_) => 500,
            DispatchError::Forward(_) => 502,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub pms_code: String,
    pub kind: MessageKind,
    pub body: String,
    pub authorization: Option<String>,
}

impl InboundMessage {
    pub fn new(pms_code: impl Into<String>, kind: MessageKind, body: impl Into<String>) -> Self {
        Self {
            pms_code: pms_code.into(),
            kind,
            body: body.into(),
            authorization: None,
        }
    }

    pub fn with_authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = Some(authorization.into());
        self
    }
}

// One built document per hotel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotelDocument {
    pub hotel_code: String,
    pub records: usize,
    pub xml: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub hotel_code: String,
    pub records: usize,
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub pms_code: String,
    pub message_type: MessageKind,
    pub records: usize,
    pub deliveries: Vec<Delivery>,
}

// Records grouped by HotelCode, hotels in order of first appearance.
pub fn group_by_hotel(records: Vec<CanonicalRecord>) -> Vec<(String, Vec<CanonicalRecord>)> {
    let mut groups: Vec<(String, Vec<CanonicalRecord>)> = Vec::new();
    for record in records {
        let hotel_code = record.hotel_code();
        match groups.iter_mut().find(|(code, _)| *code == hotel_code) {
            Some((_, group)) => group.push(record),
            None => groups.push((hotel_code, vec![record])),
        }
    }
    groups
}

pub struct Dispatcher {
    registry: Arc<TranslatorRegistry>,
    schemas: Arc<SchemaCatalog>,
    forwarder: Arc<dyn Forwarder>,
    options: DocumentOptions,
    translators: RwLock<HashMap<String, Arc<dyn Translator>>>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<TranslatorRegistry>,
        schemas: Arc<SchemaCatalog>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            registry,
            schemas,
            forwarder,
            options: DocumentOptions::default(),
            translators: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_options(mut self, options: DocumentOptions) -> Self {
        self.options = options;
        self
    }

    // Built-in translators, schemas from SCHEMA_DIR and the internal API client.
    pub fn from_settings(settings: &Settings) -> Result<Self, DispatchError> {
        let loader = Arc::new(MappingLoader::new(settings.mapping_dir.clone()));
        let registry = TranslatorRegistry::new(loader);
        register_builtin_translators(&registry).map_err(|e| DispatchError::Setup(e.to_string()))?;
        let forwarder = InternalApiClient::from_settings(settings)?;
        Ok(Self::new(
            Arc::new(registry),
            Arc::new(SchemaCatalog::new(settings.schema_dir.clone())),
            Arc::new(forwarder),
        ))
    }

    pub fn registry(&self) -> &Arc<TranslatorRegistry> {
        &self.registry
    }

    // Translator instances are kept per code so each loads its mapping once.
    pub fn translator(&self, pms_code: &str) -> Result<Arc<dyn Translator>, DispatchError> {
        if let Some(translator) = self.translators.read().get(pms_code) {
            return Ok(Arc::clone(translator));
        }
        let translator: Arc<dyn Translator> = self
            .registry
            .create(pms_code)
            .map(Arc::from)
            .ok_or_else(|| DispatchError::UnknownPms(pms_code.to_string()))?;
        self.translators
            .write()
            .insert(pms_code.to_string(), Arc::clone(&translator));
        Ok(translator)
    }

    pub fn translate(
        &self,
        message: &InboundMessage,
    ) -> Result<Vec<CanonicalRecord>, DispatchError> {
        let translator = self.translator(&message.pms_code)?;

        let format = payload::detect_format(&message.body).ok_or(PayloadError::Empty)?;
        if !translator.supported_formats().contains(&format) {
            return Err(DispatchError::UnsupportedFormat {
                pms_code: message.pms_code.clone(),
                format,
            });
        }
        let payload = payload::parse_as(&message.body, format)?;

        if !translator.validate(&payload, message.kind) {
            warn!(pms_code = %message.pms_code, message_type = %message.kind, "Message validation failed");
            return Err(DispatchError::ValidationFailed {
                pms_code: message.pms_code.clone(),
            });
        }

        Ok(translator.translate(&payload, message.kind)?)
    }

    // Build and schema-check one document per hotel.
    pub fn render(
        &self,
        kind: MessageKind,
        records: Vec<CanonicalRecord>,
    ) -> Result<Vec<HotelDocument>, DispatchError> {
        group_by_hotel(records)
            .into_iter()
            .map(|(hotel_code, group)| {
                let xml = self.build_document(kind, &hotel_code, &group)?;
                if let Some(diagnostic) = self.schemas.validate(kind, &xml) {
                    error!(%hotel_code, message_type = %kind, %diagnostic, "Generated XML failed schema validation");
                    return Err(DispatchError::Schema {
                        hotel_code,
                        diagnostic,
                    });
                }
                Ok(HotelDocument {
                    hotel_code,
                    records: group.len(),
                    xml,
                })
            })
            .collect()
    }

    fn build_document(
        &self,
        kind: MessageKind,
        hotel_code: &str,
        records: &[CanonicalRecord],
    ) -> Result<String, DispatchError> {
        let to_message_error = |source| DispatchError::Message { kind, source };
        let xml = match kind {
            MessageKind::Availability => {
                let messages = records
                    .iter()
                    .map(AvailStatusMessage::try_from)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(to_message_error)?;
                build_availability_document(hotel_code, &messages, &self.options)?
            }
            MessageKind::Rate => {
                let messages = records
                    .iter()
                    .map(RateAmountMessage::try_from)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(to_message_error)?;
                build_rate_document(hotel_code, &messages, &self.options)?
            }
        };
        Ok(xml)
    }

    // Every document is rendered and checked before the first one is sent.
    pub async fn dispatch(&self, message: &InboundMessage) -> Result<DispatchOutcome, DispatchError> {
        info!(pms_code = %message.pms_code, message_type = %message.kind, "Received PMS message");
        let records = self.translate(message)?;
        let total = records.len();
        let documents = self.render(message.kind, records)?;

        let mut deliveries = Vec::with_capacity(documents.len());
        for document in documents {
            let response = self
                .forwarder
                .forward(message.kind, &document.xml, message.authorization.as_deref())
                .await?;
            deliveries.push(Delivery {
                hotel_code: document.hotel_code,
                records: document.records,
                status: response.status,
            });
        }

        info!(
            pms_code = %message.pms_code,
            message_type = %message.kind,
            records = total,
            documents = deliveries.len(),
            "Forwarded PMS message"
        );
        Ok(DispatchOutcome {
            pms_code: message.pms_code.clone(),
            message_type: message.kind,
            records: total,
            deliveries,
        })
    }
}
