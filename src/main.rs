use clap::{Parser, Subcommand};
use rgbridge::config::{init_tracing, ConfigError, Settings};
use rgbridge::dispatch::{DispatchError, Dispatcher, InboundMessage};
use rgbridge::record::MessageKind;
use rgbridge::registry::TranslatorInfo;
use rgbridge::schema::validate_xml;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Translate PMS availability and rate updates into OTA notifications.
#[derive(Parser)]
#[command(name = "rgbridge")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a payload file and print the OTA documents without sending them.
    Translate {
        pms_code: String,
        message_type: MessageKind,
        payload: PathBuf,
    },

    /// Translate a payload file and forward the documents to the internal API.
    Dispatch {
        pms_code: String,
        message_type: MessageKind,
        payload: PathBuf,

        /// Authorization header value passed through to the internal API
        #[arg(long)]
        authorization: Option<String>,
    },

    /// Check an XML document against the schema for its message type.
    Validate {
        message_type: MessageKind,
        xml: PathBuf,
    },

    /// List registered translators.
    Translators,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Schema validation failed: {0}")]
    Invalid(String),
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

async fn run(cli: Cli, settings: Settings) -> Result<(), CliError> {
    match cli.command {
        Commands::Translate {
            pms_code,
            message_type,
            payload,
        } => {
            let dispatcher = Dispatcher::from_settings(&settings)?;
            let message = InboundMessage::new(pms_code, message_type, read(&payload)?);
            let records = dispatcher.translate(&message)?;
            for document in dispatcher.render(message_type, records)? {
                println!("{}", document.xml);
            }
        }
        Commands::Dispatch {
            pms_code,
            message_type,
            payload,
            authorization,
        } => {
            let dispatcher = Dispatcher::from_settings(&settings)?;
            let mut message = InboundMessage::new(pms_code, message_type, read(&payload)?);
            message.authorization = authorization;
            let outcome = dispatcher.dispatch(&message).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Validate { message_type, xml } => {
            let schema_path = settings.schema_dir.join(message_type.schema_file());
            if let Some(diagnostic) = validate_xml(&read(&xml)?, &schema_path) {
                return Err(CliError::Invalid(diagnostic));
            }
            println!("valid");
        }
        Commands::Translators => {
            let dispatcher = Dispatcher::from_settings(&settings)?;
            let registry = dispatcher.registry();
            let infos: Vec<TranslatorInfo> = registry
                .list()
                .iter()
                .filter_map(|code| registry.info(code))
                .collect();
            println!("{}", serde_json::to_string_pretty(&infos)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };
    if let Err(e) = init_tracing(&settings.log_level) {
        eprintln!("Error: {e}");
    }

    if let Err(e) = run(cli, settings).await {
        if let CliError::Dispatch(dispatch) = &e {
            tracing::error!(status = dispatch.status_code(), "{}", dispatch);
        }
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
