//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, TesseraArgs};
use crate::document::{DocumentId, SearchResult};
use crate::error::Result;

/// Rendering of a command result for a terminal.
pub trait HumanOutput {
    fn render_human(&self) -> String;
}

/// Result of inserting one document.
#[derive(Debug, Serialize, Deserialize)]
pub struct InsertResult {
    pub collection: String,
    pub id: DocumentId,
}

/// Result of a batch import.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImportResult {
    pub collection: String,
    pub documents_imported: usize,
    pub duration_ms: u64,
}

/// Result of a similarity search.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResults {
    pub collection: String,
    pub hits: Vec<SearchResult>,
    pub duration_ms: u64,
}

/// Result of removing a document.
#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveResult {
    pub collection: String,
    pub id: DocumentId,
    pub removed: bool,
}

/// Result of clearing a collection.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResult {
    pub collection: String,
    pub documents_removed: usize,
}

/// Collection statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionStats {
    pub collection: String,
    pub documents: usize,
    pub dimensions: Option<usize>,
    pub backend: String,
    pub snapshot_file: Option<String>,
    pub snapshot_bytes: Option<u64>,
}

impl HumanOutput for InsertResult {
    fn render_human(&self) -> String {
        format!("Inserted {} into {}", self.id, self.collection)
    }
}

impl HumanOutput for ImportResult {
    fn render_human(&self) -> String {
        format!(
            "Imported {} documents into {} in {}ms",
            self.documents_imported, self.collection, self.duration_ms
        )
    }
}

impl HumanOutput for SearchResults {
    fn render_human(&self) -> String {
        if self.hits.is_empty() {
            return format!("No matches in {} ({}ms)", self.collection, self.duration_ms);
        }

        let mut out = String::from("Search Results:\n═══════════════\n");
        for (i, hit) in self.hits.iter().enumerate() {
            out.push_str(&format!(
                "\nResult {}: (Score: {:.4})\n  id:   {}\n  text: {}\n",
                i + 1,
                hit.score,
                hit.id,
                hit.text
            ));
        }
        out.push_str(&format!(
            "\nTotal hits: {}\nSearch time: {}ms",
            self.hits.len(),
            self.duration_ms
        ));
        out
    }
}

impl HumanOutput for RemoveResult {
    fn render_human(&self) -> String {
        if self.removed {
            format!("Removed {} from {}", self.id, self.collection)
        } else {
            format!("{} was not in {}", self.id, self.collection)
        }
    }
}

impl HumanOutput for ClearResult {
    fn render_human(&self) -> String {
        format!(
            "Cleared {} ({} documents removed)",
            self.collection, self.documents_removed
        )
    }
}

impl HumanOutput for CollectionStats {
    fn render_human(&self) -> String {
        let mut out = format!(
            "Collection Statistics:\n══════════════════════\nName: {}\nDocuments: {}\nBackend: {}",
            self.collection, self.documents, self.backend
        );
        if let Some(dimensions) = self.dimensions {
            out.push_str(&format!("\nDimensions: {dimensions}"));
        }
        if let Some(file) = &self.snapshot_file {
            let size = self
                .snapshot_bytes
                .map_or_else(|| "not written".to_string(), |bytes| format!("{bytes} bytes"));
            out.push_str(&format!("\nSnapshot: {file} ({size})"));
        }
        out
    }
}

/// Output a result in the requested format.
pub fn output_result<T>(result: &T, args: &TesseraArgs) -> Result<()>
where
    T: Serialize + HumanOutput,
{
    match args.output_format {
        OutputFormat::Human => {
            println!("{}", result.render_human());
            Ok(())
        }
        OutputFormat::Json => output_json(result, args),
    }
}

fn output_json<T: Serialize>(result: &T, args: &TesseraArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}
