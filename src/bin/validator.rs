//! Message Contract Validator CLI
//!
//! Checks message schemas against the contract rules: envelope, version
//! sequencing and backward compatibility.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use message_contracts::config::OutputFormat;
use message_contracts::{
    CompatibilityChecker, ContractConfig, ContractError, ContractExample, ContractRepository,
    ContractService, ContractStatus, ContractVersion, ContractVersionSequencer, EnvelopeValidator,
    InMemoryContractRepository, KafkaTopicId, MessageType, NewContractRequest, PriorContract,
    Rejection, SchemaText,
};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "contract-validator")]
#[command(about = "Validate message contract schemas")]
struct Cli {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format, overrides the configuration
    #[arg(long, value_parser = parse_format)]
    format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a proposed schema is backward compatible with the previous one
    Check {
        #[arg(short, long)]
        previous: PathBuf,
        #[arg(short = 'n', long)]
        proposed: PathBuf,
        /// Report every incompatibility instead of the first
        #[arg(long)]
        all: bool,
    },

    /// Check the message envelope of a schema
    Envelope { schema: PathBuf },

    /// Print the declared version, optionally checking it follows another
    Version {
        schema: PathBuf,
        /// Latest stored version
        #[arg(long)]
        after: Option<i64>,
        /// Status of the latest stored version
        #[arg(long, default_value = "Provisioned")]
        after_status: String,
    },

    /// Request each schema in order as one message type, provisioning every accepted one
    Simulate {
        #[arg(short, long, default_value = "message")]
        message_type: String,
        /// Skip the envelope check
        #[arg(long)]
        skip_envelope: bool,
        #[arg(required = true)]
        schemas: Vec<PathBuf>,
    },
}

/// Result for one schema file
#[derive(Debug, Serialize)]
struct Outcome {
    file: String,
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<ContractVersion>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rejections: Vec<Rejection>,
}

impl Outcome {
    fn accepted(file: &Path, version: Option<ContractVersion>) -> Self {
        Self {
            file: file.display().to_string(),
            accepted: true,
            version,
            rejections: Vec::new(),
        }
    }

    /// Accepted when there is nothing to reject
    fn with_rejections(file: &Path, rejections: Vec<Rejection>) -> Self {
        Self {
            file: file.display().to_string(),
            accepted: rejections.is_empty(),
            version: None,
            rejections,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match ContractConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load configuration: {}", e);
            std::process::exit(2);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli, config) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// Returns whether every checked schema was accepted
fn run(cli: Cli, config: ContractConfig) -> anyhow::Result<bool> {
    let format = cli.format.unwrap_or(config.output.format);

    let outcomes = match cli.command {
        Commands::Check { previous, proposed, all } => {
            vec![check(&previous, &proposed, all || config.validation.report_all)?]
        }
        Commands::Envelope { schema } => vec![envelope(&schema)?],
        Commands::Version { schema, after, after_status } => {
            vec![version(&schema, after, &after_status)?]
        }
        Commands::Simulate { message_type, skip_envelope, schemas } => simulate(
            &message_type,
            config.validation.enforce_envelope && !skip_envelope,
            &schemas,
        )?,
    };

    let all_accepted = outcomes.iter().all(|o| o.accepted);
    println!("{}", format.render(&outcomes)?);
    Ok(all_accepted)
}

fn check(previous: &Path, proposed: &Path, report_all: bool) -> anyhow::Result<Outcome> {
    let previous_schema = read_schema(previous)?
        .with_context(|| format!("previous schema {} is invalid", previous.display()))?;
    let (previous_doc, proposed_doc) = match read_schema(proposed)?.and_then(|s| s.document()) {
        Ok(doc) => (previous_schema.document()?, doc),
        Err(e) => return Ok(Outcome::with_rejections(proposed, vec![e.rejection()])),
    };

    let checker = CompatibilityChecker::new();
    let rejections: Vec<Rejection> = if report_all {
        checker
            .report(&previous_doc, &proposed_doc)
            .violations
            .into_iter()
            .map(|reason| ContractError::from(reason).rejection())
            .collect()
    } else {
        checker
            .check(&previous_doc, &proposed_doc)
            .err()
            .map(|reason| ContractError::from(reason).rejection())
            .into_iter()
            .collect()
    };
    debug!(violations = rejections.len(), "Compatibility check finished");
    Ok(Outcome::with_rejections(proposed, rejections))
}

fn envelope(path: &Path) -> anyhow::Result<Outcome> {
    let result = read_schema(path)?
        .and_then(|s| s.document())
        .and_then(|doc| EnvelopeValidator::new().validate(&doc).map_err(ContractError::from));
    Ok(match result {
        Ok(()) => Outcome::accepted(path, None),
        Err(e) => Outcome::with_rejections(path, vec![e.rejection()]),
    })
}

fn version(path: &Path, after: Option<i64>, after_status: &str) -> anyhow::Result<Outcome> {
    let prior = match after {
        Some(version) => Some(PriorContract {
            version: ContractVersion::new(version)?,
            status: after_status.parse::<ContractStatus>()?,
        }),
        None => None,
    };

    let result = read_schema(path)?
        .and_then(|s| s.contract_version())
        .and_then(|v| ContractVersionSequencer::new().check(prior, v).map(|()| v));
    Ok(match result {
        Ok(v) => Outcome::accepted(path, Some(v)),
        Err(e) => Outcome::with_rejections(path, vec![e.rejection()]),
    })
}

fn simulate(message_type: &str, enforce_envelope: bool, schemas: &[PathBuf]) -> anyhow::Result<Vec<Outcome>> {
    let service = ContractService::new(InMemoryContractRepository::new());
    let topic = KafkaTopicId::new();
    let message_type = MessageType::parse(message_type)?;
    info!(topic = %topic, message_type = %message_type, "Simulating contract requests");

    let mut outcomes = Vec::with_capacity(schemas.len());
    for path in schemas {
        let schema = match read_schema(path)? {
            Ok(schema) => schema,
            Err(e) => {
                outcomes.push(Outcome::with_rejections(path, vec![e.rejection()]));
                continue;
            }
        };
        let request = NewContractRequest {
            kafka_topic_id: topic,
            message_type: message_type.clone(),
            description: format!("simulated from {}", path.display()),
            example: ContractExample::parse("{}")?,
            schema,
            requested_by: "contract-validator".to_string(),
            enforce_envelope,
        };

        match service.request_new(request) {
            Ok(id) => {
                service.register_as_provisioned(id, "contract-validator")?;
                let version = service.repository().get(id)?.schema_version();
                outcomes.push(Outcome::accepted(path, Some(version)));
            }
            Err(e) => outcomes.push(Outcome::with_rejections(path, vec![e.rejection()])),
        }
    }
    Ok(outcomes)
}

/// IO failures abort; schema errors become rejections
fn read_schema(path: &Path) -> anyhow::Result<Result<SchemaText, ContractError>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(SchemaText::parse(&text))
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "pretty" => Ok(OutputFormat::Pretty),
        "compact" => Ok(OutputFormat::Compact),
        other => Err(format!("unknown format '{}', expected pretty or compact", other)),
    }
}
