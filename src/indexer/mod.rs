// Document ingestion
// Walks a directory, parses supported files and stores their chunks

pub mod parsing;

#[cfg(test)]
mod tests;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::database::lancedb::{ChunkMetadata, DocumentChunk, DocumentType, VectorStore};
use crate::embeddings::chunking::TextSegmenter;
use crate::{RagError, Result};

pub use parsing::{markdown_to_text, normalize_text, parse_document};

/// Directory names never descended into, on top of hidden directories
const SKIPPED_DIRECTORIES: &[&str] = &[
    "node_modules",
    "target",
    "vendor",
    "bower_components",
    "__pycache__",
    "venv",
];

/// Chunks produced for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file: PathBuf,
    pub chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionFailure {
    pub file: PathBuf,
    pub error: String,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionReport {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub total_chunks: usize,
    pub files: Vec<FileReport>,
    pub failures: Vec<IngestionFailure>,
}

impl IngestionReport {
    #[inline]
    pub fn average_chunks_per_file(&self) -> f64 {
        if self.files_processed == 0 {
            return 0.0;
        }
        self.total_chunks as f64 / self.files_processed as f64
    }

    /// Human-readable summary printed by the `ingest` command
    #[inline]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Ingestion Summary ===");
        for file in &self.files {
            let _ = writeln!(out, "  {}: {} chunks", display_name(&file.file), file.chunks);
        }
        let _ = writeln!(out, "Files processed: {}", self.files_processed);
        let _ = writeln!(out, "Files skipped: {}", self.files_skipped);
        let _ = writeln!(out, "Total chunks created: {}", self.total_chunks);
        let _ = writeln!(
            out,
            "Average chunks per file: {:.1}",
            self.average_chunks_per_file()
        );

        if !self.failures.is_empty() {
            let _ = writeln!(out, "Errors:");
            for failure in &self.failures {
                let _ = writeln!(out, "  - {}: {}", display_name(&failure.file), failure.error);
            }
        }
        out
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

/// Reads `.md`/`.txt` files and feeds their chunks into a [`VectorStore`].
pub struct DocumentIngestionPipeline {
    segmenter: TextSegmenter,
    store: VectorStore,
}

impl DocumentIngestionPipeline {
    #[inline]
    pub fn new(segmenter: TextSegmenter, store: VectorStore) -> Self {
        Self { segmenter, store }
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[inline]
    pub fn into_store(self) -> VectorStore {
        self.store
    }

    /// Parse and split one file into chunks ready for storage.
    #[inline]
    pub async fn process_file(&self, path: &Path) -> Result<Vec<DocumentChunk>> {
        let document_type = document_type_of(path).ok_or_else(|| {
            RagError::Validation(format!("unsupported file type: {}", path.display()))
        })?;

        let content = fs::read_to_string(path).await?;
        let text = parse_document(&content, document_type)?;

        let pieces: Vec<String> = self
            .segmenter
            .split(&text)?
            .into_iter()
            .filter(|piece| !piece.trim().is_empty())
            .collect();

        let total_chunks = u32::try_from(pieces.len())
            .map_err(|_| RagError::Validation(format!("too many chunks in {}", path.display())))?;
        let source = display_name(path);
        let file_path = path.to_string_lossy().into_owned();
        let processed_at = Utc::now();

        let chunks = pieces
            .into_iter()
            .zip(0_u32..)
            .map(|(text, chunk_index)| DocumentChunk {
                text,
                metadata: ChunkMetadata {
                    id: None,
                    source: source.clone(),
                    file_path: file_path.clone(),
                    chunk_index,
                    total_chunks,
                    document_type,
                    processed_at,
                },
            })
            .collect();

        Ok(chunks)
    }

    /// Ingest every supported file under `directory`.
    ///
    /// A file that cannot be read, parsed or embedded is recorded in the
    /// report and skipped. Store-level failures abort the run.
    #[inline]
    pub async fn ingest_directory(&self, directory: &Path) -> Result<IngestionReport> {
        if !self.store.is_initialized() {
            return Err(RagError::NotInitialized);
        }
        if !fs::metadata(directory).await?.is_dir() {
            return Err(RagError::Validation(format!(
                "{} is not a directory",
                directory.display()
            )));
        }

        let files = collect_files(directory).await?;
        let mut report = IngestionReport::default();
        if files.is_empty() {
            warn!("No supported files found in {}", directory.display());
            return Ok(report);
        }
        info!("Found {} supported files to process", files.len());

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(files.len() as u64).with_style(
                ProgressStyle::with_template("{bar:30} [{pos}/{len}] Ingesting {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };

        for file in files {
            bar.set_message(display_name(&file));
            match self.ingest_file(&file).await {
                Ok(chunks) => {
                    debug!("Processed {}: {} chunks", file.display(), chunks);
                    report.files_processed += 1;
                    report.total_chunks += chunks;
                    report.files.push(FileReport { file, chunks });
                }
                Err(e) if is_fatal(&e) => {
                    bar.abandon();
                    return Err(e);
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", file.display(), e);
                    report.files_skipped += 1;
                    report.failures.push(IngestionFailure {
                        file,
                        error: e.to_string(),
                    });
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        info!(
            "Ingested {} files into {} chunks ({} skipped)",
            report.files_processed, report.total_chunks, report.files_skipped
        );
        Ok(report)
    }

    async fn ingest_file(&self, path: &Path) -> Result<usize> {
        let chunks = self.process_file(path).await?;
        self.store.add_documents(&chunks).await?;
        Ok(chunks.len())
    }
}

/// Failures that say the store itself is unusable rather than one file being bad
fn is_fatal(error: &RagError) -> bool {
    matches!(
        error,
        RagError::NotInitialized
            | RagError::Database(_)
            | RagError::Network(_)
            | RagError::DimensionMismatch { .. }
    )
}

fn document_type_of(path: &Path) -> Option<DocumentType> {
    path.extension()
        .and_then(|extension| extension.to_str())
        .and_then(DocumentType::from_extension)
}

fn is_skipped_directory(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRECTORIES.contains(&name)
}

/// Supported files under `root`, in sorted path order.
#[inline]
pub async fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(directory) = pending.pop() {
        let mut entries = match fs::read_dir(&directory).await {
            Ok(entries) => entries,
            Err(e) if directory == root => return Err(e.into()),
            Err(e) => {
                warn!("Skipping unreadable directory {}: {}", directory.display(), e);
                continue;
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if file_type.is_dir() {
                if is_skipped_directory(&name) {
                    debug!("Skipping directory {}", path.display());
                } else {
                    pending.push(path);
                }
            } else if file_type.is_file() && document_type_of(&path).is_some() {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
