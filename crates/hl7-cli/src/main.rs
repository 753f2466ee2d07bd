//! # hl7-cli
//!
//! Command-line interface for HL7 v2 messages.
//!
//! Schema files are loaded from one or more `--schema-dir` directories; the
//! message version in MSH-12 selects which set is used.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use hl7_codec::{Er7Parser, Er7Serializer, ParserOptions};
use hl7_model::{FactoryRegistry, Message, missing_required};
use hl7_schema::{DatatypeShape, SchemaId, SchemaLoader, StructureSchema};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hl7")]
#[command(about = "HL7 v2 message tools")]
#[command(version)]
struct Cli {
    /// Directory containing schema files (repeatable)
    #[arg(short = 'd', long = "schema-dir", global = true, default_value = "schemas")]
    schema_dirs: Vec<PathBuf>,

    /// Reject unknown segments and extra fields instead of skipping them
    #[arg(long, global = true)]
    strict: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an ER7 message and print it
    Parse {
        /// Input file path
        input: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Report required children missing from an ER7 message
    Validate {
        /// Input file path
        input: PathBuf,
    },

    /// Print the declared children of a structure or datatype
    Describe {
        /// Protocol name (e.g., HL7)
        protocol: String,

        /// Schema version (e.g., 2.5.1)
        version: String,

        /// Structure or datatype name (e.g., DFT_P03, XPN)
        name: String,

        /// Print the schema as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Er7,
}

/// Exit code when validation finds missing required children
const EXIT_INVALID: u8 = 1;
/// Exit code for load, parse, and IO failures
const EXIT_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ERROR: {:#}", err);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let loader = SchemaLoader::new(cli.schema_dirs.clone());
    let sets = loader
        .load_all()
        .with_context(|| format!("Failed to load schemas from {:?}", cli.schema_dirs))?;
    debug!("Loaded {} schema set(s)", sets.len());

    match cli.command {
        Commands::Parse {
            input,
            format,
            pretty,
        } => {
            let message = parse_file(&loader, &input, cli.strict)?;
            let output = match format {
                OutputFormat::Json if pretty => serde_json::to_string_pretty(&message)?,
                OutputFormat::Json => serde_json::to_string(&message)?,
                OutputFormat::Er7 => Er7Serializer::new()
                    .serialize(&message)?
                    .replace('\r', "\n"),
            };
            println!("{}", output.trim_end());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { input } => {
            let message = parse_file(&loader, &input, cli.strict)?;
            let missing = missing_required(&message);
            if missing.is_empty() {
                println!("{}: OK ({} {})", input.display(), message.schema_id(), message.name());
                return Ok(ExitCode::SUCCESS);
            }
            for item in &missing {
                println!("missing {}", item);
            }
            eprintln!(
                "Validation summary: {} missing required element(s)",
                missing.len()
            );
            Ok(ExitCode::from(EXIT_INVALID))
        }
        Commands::Describe {
            protocol,
            version,
            name,
            json,
        } => {
            let id = SchemaId::new(protocol, version);
            let set = loader
                .registry()
                .get(&id)
                .ok_or_else(|| anyhow!("No schema set loaded for {}", id))?;

            if let Some(structure) = set.structure(&name) {
                if json {
                    println!("{}", serde_json::to_string_pretty(structure.as_ref())?);
                } else {
                    print!("{}", describe_structure(structure));
                }
            } else if let Some(datatype) = set.datatype(&name) {
                if json {
                    println!("{}", serde_json::to_string_pretty(datatype.as_ref())?);
                } else {
                    println!("{} (datatype)", datatype.name());
                    match datatype.shape() {
                        DatatypeShape::Primitive(kind) => println!("  primitive {:?}", kind),
                        DatatypeShape::Composite(components) => {
                            for (index, component) in components.iter().enumerate() {
                                println!("  {:>3}  {:<40} {}", index, component.name, component.type_ref);
                            }
                        }
                    }
                }
            } else {
                return Err(anyhow!("{} declares no structure or datatype named '{}'", id, name));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn parse_file(loader: &SchemaLoader, input: &Path, strict: bool) -> Result<Message> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let parser = Er7Parser::with_options(
        FactoryRegistry::from_registry(loader.registry()),
        ParserOptions { strict },
    );
    let message = parser
        .parse(&text)
        .with_context(|| format!("Failed to parse {}", input.display()))?;
    info!(structure = %message.name(), "Parsed {}", input.display());
    Ok(message)
}

fn describe_structure(schema: &StructureSchema) -> String {
    let mut out = format!("{} ({})\n", schema.name(), schema.kind());
    if let Some(description) = schema.description() {
        out.push_str(&format!("  {}\n", description));
    }
    for (index, child) in schema.children().iter().enumerate() {
        let mut flags = Vec::new();
        if child.required {
            flags.push("required");
        }
        if child.repeating {
            flags.push("repeating");
        }
        out.push_str(&format!(
            "  {:>3}  {:<40} {:<8} {:<32} {}\n",
            index + 1,
            child.name,
            child.kind.to_string(),
            child.type_ref,
            flags.join(", ")
        ));
    }
    out
}
