//! Command line argument parsing for the Tessera CLI using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tessera - an embedded vector store
#[derive(Parser, Debug, Clone)]
#[command(name = "tessera")]
#[command(about = "Store text embeddings and search them by cosine similarity")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct TesseraArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Directory holding the collection snapshots
    #[arg(
        short = 'd',
        long = "data-dir",
        env = "TESSERA_DATA_DIR",
        default_value = ".tessera"
    )]
    pub data_dir: PathBuf,

    /// JSON snapshot configuration; replaces --data-dir when given
    #[arg(short = 'c', long = "config", env = "TESSERA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl TesseraArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Insert one document
    Insert(InsertArgs),

    /// Insert documents from a JSON lines file as one batch
    Import(ImportArgs),

    /// Find the documents most similar to a query vector
    Search(SearchArgs),

    /// Remove a document by id
    Remove(RemoveArgs),

    /// Remove every document of a collection
    Clear(CollectionArgs),

    /// Show collection statistics
    Stats(CollectionArgs),
}

/// Arguments naming a single collection
#[derive(Args, Debug, Clone)]
pub struct CollectionArgs {
    /// Collection name
    pub collection: String,
}

/// Arguments for inserting a document
#[derive(Args, Debug, Clone)]
pub struct InsertArgs {
    /// Collection name
    pub collection: String,

    /// Document text
    #[arg(short, long)]
    pub text: String,

    /// Comma-separated embedding components
    #[arg(
        short = 'e',
        long = "embedding",
        value_delimiter = ',',
        allow_hyphen_values = true,
        required = true
    )]
    pub embedding: Vec<f32>,

    /// Explicit document id; an existing document with this id is replaced
    #[arg(long)]
    pub id: Option<Uuid>,
}

/// Arguments for importing documents
#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Collection name
    pub collection: String,

    /// JSON lines file with `text`, `embedding` and optional `id` fields
    pub file: PathBuf,
}

/// Arguments for searching a collection
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Collection name
    pub collection: String,

    /// Comma-separated query vector components
    #[arg(
        short = 'e',
        long = "embedding",
        value_delimiter = ',',
        allow_hyphen_values = true,
        required = true
    )]
    pub embedding: Vec<f32>,

    /// Maximum number of results
    #[arg(short = 'k', long, default_value = "10")]
    pub k: usize,

    /// Minimum similarity score
    #[arg(short, long, allow_hyphen_values = true)]
    pub threshold: Option<f32>,
}

/// Arguments for removing a document
#[derive(Args, Debug, Clone)]
pub struct RemoveArgs {
    /// Collection name
    pub collection: String,

    /// Document id
    pub id: Uuid,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
