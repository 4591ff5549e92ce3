// PMS availability and rate updates translated into OTA notification XML

pub mod cloudbeds;
pub mod config;
pub mod dispatch;
pub mod flat;
pub mod forwarder;
pub mod los;
pub mod mapping;
pub mod messages;
pub mod normalize;
pub mod payload;
pub mod record;
pub mod registry;
pub mod schema;
pub mod translator;
pub mod values;
pub mod xml_builder;

// Re-export key types for convenience
pub use config::{init_tracing, ConfigError, RetryConfig, Settings};
pub use dispatch::{DispatchError, DispatchOutcome, Dispatcher, InboundMessage};
pub use forwarder::{ForwardError, Forwarder, InternalApiClient};
pub use mapping::{MappingDocument, MappingError, MappingLoader};
pub use messages::{AvailStatusMessage, RateAmountMessage};
pub use record::{CanonicalRecord, MessageKind};
pub use registry::{register_builtin_translators, TranslatorInfo, TranslatorRegistry};
pub use schema::{validate_xml, Schema, SchemaCatalog, SchemaError};
pub use translator::{MessageFormat, TranslationError, Translator};
pub use xml_builder::{build_availability_document, build_rate_document, DocumentOptions};
