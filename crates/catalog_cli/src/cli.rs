//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bulk-import tooling for the policy-document catalog
#[derive(Parser)]
#[command(name = "catalog")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// SQLite catalog database
    #[arg(long, global = true, env = "CATALOG_DB", default_value = "catalog.db")]
    pub db: PathBuf,

    /// TOML config file
    #[arg(long, global = true, env = "CATALOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true, env = "CATALOG_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Directory for rolling log files (stderr when unset)
    #[arg(long, global = true, env = "CATALOG_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import one JSON batch into a corpus
    Import {
        /// Batch file with collections, families, documents and events
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Target corpus import id
        #[arg(short, long)]
        corpus: String,

        /// Maximum number of new documents to create
        #[arg(long)]
        document_limit: Option<usize>,

        /// Audit directory (overrides config)
        #[arg(long, env = "CATALOG_AUDIT_DIR")]
        audit_dir: Option<PathBuf>,
    },

    /// Create or replace a corpus and its taxonomy
    RegisterCorpus {
        /// Corpus import id
        #[arg(long)]
        import_id: String,

        #[arg(long)]
        title: String,

        /// Owning organisation name
        #[arg(long)]
        organisation: String,

        /// Taxonomy JSON file
        #[arg(long, value_name = "FILE")]
        taxonomy: PathBuf,
    },

    /// Add a geography that families may reference
    AddGeography {
        /// Geography code, e.g. "GBR"
        value: String,

        /// Display name, e.g. "United Kingdom"
        #[arg(long)]
        display: Option<String>,
    },

    /// Add a language that documents may reference
    AddLanguage {
        name: String,

        /// ISO language code
        #[arg(long)]
        code: Option<String>,
    },

    /// Print the core library version
    Version,
}
