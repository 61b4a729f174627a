//! Command implementations for the Tessera CLI.
//!
//! Every command opens one collection from the configured snapshot
//! directory, loads it, applies its operation and waits for the write to
//! reach disk before printing.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::backend::{PersistenceBackend, SnapshotBackend, SnapshotConfig};
use crate::cli::args::*;
use crate::cli::output::*;
use crate::collection::Collection;
use crate::document::{Document, DocumentId};
use crate::error::{Result, TesseraError};
use crate::registry::CollectionRegistry;
use crate::storage::file::FileStorageConfig;
use crate::storage::{Storage, StorageConfig, StorageFactory};

/// One line of an import file.
#[derive(Debug, Deserialize)]
struct ImportRecord {
    #[serde(default)]
    id: Option<DocumentId>,
    text: String,
    embedding: Vec<f32>,
}

/// Execute a CLI command.
pub fn execute_command(args: TesseraArgs) -> Result<()> {
    let config = snapshot_config(&args)?;
    let storage = StorageFactory::create(config.storage.clone())?;
    let backend = Arc::new(SnapshotBackend::with_config(storage, &config));
    let registry = CollectionRegistry::new();

    match &args.command {
        Command::Insert(insert_args) => insert(insert_args, &registry, &backend, &args),
        Command::Import(import_args) => import(import_args, &registry, &backend, &args),
        Command::Search(search_args) => search(search_args, &registry, &backend, &args),
        Command::Remove(remove_args) => remove(remove_args, &registry, &backend, &args),
        Command::Clear(clear_args) => clear(clear_args, &registry, &backend, &args),
        Command::Stats(stats_args) => show_stats(stats_args, &registry, &backend, &args),
    }
}

/// Resolve the snapshot configuration from `--config` or `--data-dir`.
pub fn snapshot_config(args: &TesseraArgs) -> Result<SnapshotConfig> {
    match &args.config {
        Some(path) => load_config(path),
        None => Ok(SnapshotConfig::new(StorageConfig::File(
            FileStorageConfig::new(&args.data_dir),
        ))),
    }
}

fn load_config(path: &Path) -> Result<SnapshotConfig> {
    let file = File::open(path).map_err(|e| {
        TesseraError::invalid_config(format!("cannot open {}: {e}", path.display()))
    })?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| TesseraError::invalid_config(format!("{}: {e}", path.display())))
}

fn open_collection(
    name: &str,
    registry: &CollectionRegistry,
    backend: &Arc<SnapshotBackend>,
) -> Result<Arc<Collection>> {
    let backend: Arc<dyn PersistenceBackend> = backend.clone();
    let collection = registry.get_or_create(name, backend)?;
    collection.load()?;
    Ok(collection)
}

fn insert(
    args: &InsertArgs,
    registry: &CollectionRegistry,
    backend: &Arc<SnapshotBackend>,
    cli_args: &TesseraArgs,
) -> Result<()> {
    let collection = open_collection(&args.collection, registry, backend)?;
    let id = collection.insert(args.id, args.text.clone(), args.embedding.clone());
    collection.flush()?;

    output_result(
        &InsertResult {
            collection: args.collection.clone(),
            id,
        },
        cli_args,
    )
}

fn import(
    args: &ImportArgs,
    registry: &CollectionRegistry,
    backend: &Arc<SnapshotBackend>,
    cli_args: &TesseraArgs,
) -> Result<()> {
    if !args.file.exists() {
        return Err(TesseraError::not_found(args.file.display().to_string()));
    }

    let start_time = Instant::now();
    let documents = read_import_file(&args.file)?;
    let count = documents.len();

    let collection = open_collection(&args.collection, registry, backend)?;
    collection.insert_batch(documents);
    collection.flush()?;

    output_result(
        &ImportResult {
            collection: args.collection.clone(),
            documents_imported: count,
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

/// Parse a JSON lines file; blank lines are skipped, a malformed line aborts
/// the whole import.
fn read_import_file(path: &Path) -> Result<Vec<Document>> {
    let reader = BufReader::new(File::open(path)?);
    let mut documents = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: ImportRecord = serde_json::from_str(&line).map_err(|e| {
            TesseraError::invalid_argument(format!(
                "{} line {}: {e}",
                path.display(),
                line_num + 1
            ))
        })?;

        documents.push(match record.id {
            Some(id) => Document::with_id(id, record.text, record.embedding),
            None => Document::new(record.text, record.embedding),
        });
    }

    log::debug!("read {} documents from {}", documents.len(), path.display());
    Ok(documents)
}

fn search(
    args: &SearchArgs,
    registry: &CollectionRegistry,
    backend: &Arc<SnapshotBackend>,
    cli_args: &TesseraArgs,
) -> Result<()> {
    let collection = open_collection(&args.collection, registry, backend)?;

    let start_time = Instant::now();
    let hits = collection.search(&args.embedding, args.k, args.threshold);

    output_result(
        &SearchResults {
            collection: args.collection.clone(),
            hits,
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

fn remove(
    args: &RemoveArgs,
    registry: &CollectionRegistry,
    backend: &Arc<SnapshotBackend>,
    cli_args: &TesseraArgs,
) -> Result<()> {
    let collection = open_collection(&args.collection, registry, backend)?;
    let removed = collection.remove(&args.id);
    collection.flush()?;

    output_result(
        &RemoveResult {
            collection: args.collection.clone(),
            id: args.id,
            removed,
        },
        cli_args,
    )
}

fn clear(
    args: &CollectionArgs,
    registry: &CollectionRegistry,
    backend: &Arc<SnapshotBackend>,
    cli_args: &TesseraArgs,
) -> Result<()> {
    let collection = open_collection(&args.collection, registry, backend)?;
    let documents_removed = collection.len();
    collection.clear();
    collection.flush()?;

    output_result(
        &ClearResult {
            collection: args.collection.clone(),
            documents_removed,
        },
        cli_args,
    )
}

fn show_stats(
    args: &CollectionArgs,
    registry: &CollectionRegistry,
    backend: &Arc<SnapshotBackend>,
    cli_args: &TesseraArgs,
) -> Result<()> {
    let collection = open_collection(&args.collection, registry, backend)?;
    let documents = collection.documents();

    let snapshot_file = backend.snapshot_name(&args.collection);
    let snapshot_bytes = if backend.storage().file_exists(&snapshot_file) {
        Some(backend.storage().file_size(&snapshot_file)?)
    } else {
        None
    };

    output_result(
        &CollectionStats {
            collection: args.collection.clone(),
            documents: documents.len(),
            dimensions: documents.first().map(|d| d.embedding.len()),
            backend: backend.kind().to_string(),
            snapshot_file: Some(snapshot_file),
            snapshot_bytes,
        },
        cli_args,
    )
}
