use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "specwarden")]
#[command(version)]
#[command(about = "Swagger 1.2 / 2.0 document validator and request gate", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a Swagger document (and its API declarations for 1.2)
    Validate {
        /// Path to the Swagger 2.0 document or the 1.2 resource listing
        document: PathBuf,

        /// Path to a 1.2 API declaration (repeatable, order is preserved)
        #[arg(short = 'd', long = "declaration")]
        declarations: Vec<PathBuf>,

        /// Dialect to validate against (detected from the document if not specified)
        #[arg(short, long)]
        spec_version: Option<SpecVersion>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Do not fetch remote references
        #[arg(long)]
        local: bool,
    },

    /// Print the fully resolved document, or one node of it
    Resolve {
        /// Path to the Swagger document
        document: PathBuf,

        /// JSON pointer of the node to print (e.g. "#/definitions/Pet")
        #[arg(short, long)]
        pointer: Option<String>,

        /// Output format (json or yaml)
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,

        /// Output file (stdout if not specified)
        #[arg(short = 'O', long)]
        output: Option<PathBuf>,

        /// Do not fetch remote references
        #[arg(long)]
        local: bool,
    },

    /// Print the composed schema of a model
    Compose {
        /// Path to the Swagger 2.0 document or a 1.2 API declaration
        document: PathBuf,

        /// Model name or pointer (e.g. "Pet" or "#/definitions/Pet")
        #[arg(short, long)]
        model: String,

        /// Output format (json or yaml)
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,

        /// Output file (stdout if not specified)
        #[arg(short = 'O', long)]
        output: Option<PathBuf>,

        /// Do not fetch remote references
        #[arg(long)]
        local: bool,
    },

    /// Serve a Swagger 2.0 document, validating every request against it
    Serve {
        /// Path to the Swagger 2.0 document
        document: PathBuf,

        /// Listen address (defaults to SPECWARDEN_BIND, then 127.0.0.1:3000)
        #[arg(short, long)]
        bind: Option<String>,

        /// Do not fetch remote references
        #[arg(long)]
        local: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SpecVersion {
    /// Swagger 1.2
    #[value(name = "1.2")]
    V1_2,
    /// Swagger 2.0
    #[value(name = "2.0")]
    V2_0,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}
