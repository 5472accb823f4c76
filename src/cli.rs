use crate::dispatch::ExportFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "coral-inspect")]
#[command(about = "Inspect, export and import keys of a Redis-compatible store")]
#[command(long_about = "Coral Inspect browses a Redis-compatible keyspace, renders binary values safely, and moves keys between stores as JSON or replayable commands")]
#[command(version)]
pub struct Cli {
    /// Store host
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// Store port
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Password sent with AUTH after connecting
    #[arg(short = 'a', long, global = true)]
    pub password: Option<String>,

    /// Logical database to SELECT
    #[arg(short = 'n', long, global = true)]
    pub db: Option<u32>,

    /// Largest string value (bytes) shown by `inspect` without --no-size-guard
    #[arg(long, global = true)]
    pub max_content_size: Option<u64>,

    /// Configuration file path (JSON format)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List keys matching a pattern with their type and length
    Scan {
        /// Cursor to resume from (0 starts a new scan)
        #[arg(long, default_value_t = 0)]
        cursor: u64,

        /// Glob-style pattern
        #[arg(short = 'm', long = "match", default_value = "*")]
        pattern: String,

        /// Stop once this many keys were found (0 = scan everything)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },

    /// Show a key's content, TTL, encoding and size
    Inspect {
        key: String,

        /// Fetch string values regardless of their size
        #[arg(long)]
        no_size_guard: bool,

        /// Print string values as stored, without format detection
        #[arg(long)]
        raw: bool,
    },

    /// Export keys as JSON or as replayable commands
    Export {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportKind::Json)]
        format: ExportKind,

        /// Key names given as a JSON array instead of positional arguments
        #[arg(long, conflicts_with = "keys")]
        keys_json: Option<String>,

        keys: Vec<String>,
    },

    /// Replace a key with a value decoded from JSON
    Import {
        /// Value type: string, hash, list, set or zset
        #[arg(short = 't', long = "type")]
        value_type: String,

        key: String,

        /// Time to live such as 30s, 5m or 1h30m (-1s for none)
        #[arg(long, default_value = "-1s", allow_hyphen_values = true)]
        ttl: String,

        /// JSON payload shaped for the value type
        payload: String,
    },

    /// Delete keys; succeeds whether or not they exist
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Print the server INFO text
    Info,

    /// Print the number of configured databases
    Databases,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportKind {
    /// JSON object keyed by key name
    Json,
    /// One Redis command per line
    Redis,
}

impl From<ExportKind> for ExportFormat {
    fn from(kind: ExportKind) -> Self {
        match kind {
            ExportKind::Json => ExportFormat::Json,
            ExportKind::Redis => ExportFormat::Redis,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
