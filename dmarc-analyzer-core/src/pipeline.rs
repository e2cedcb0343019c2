//! Per-file pipeline: decode → extract → analyze → present → archive.
//!
//! # Responsibilities
//! - Run every stage for one report file and print its verdict
//! - Keep going across files: an error is reported on stderr with the path and
//!   the next file is processed
//! - Move successfully analysed files into a `processed/` directory next to them
//!
//! The model is resolved once by the caller before a [`Pipeline`] is built.

use crate::analysis::analyze_report;
use crate::contract::InferenceClient;
use crate::decode::decode_report_file;
use crate::error::{AnalyzerError, Result};
use crate::extract::parse_report;
use crate::verdict::{present, AnalysisResult, VerdictClassifier};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Name of the archive directory created next to analysed files.
pub const PROCESSED_DIR_NAME: &str = "processed";

/// Outcome of a batch of files.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub with_concerns: usize,
    pub failures: Vec<FileFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: RunSummary) {
        self.succeeded += other.succeeded;
        self.with_concerns += other.with_concerns;
        self.failures.extend(other.failures);
    }
}

pub struct Pipeline<C> {
    client: C,
    model: String,
    classifier: Box<dyn VerdictClassifier>,
    archive_processed: bool,
}

impl<C: InferenceClient> Pipeline<C> {
    pub fn new(client: C, model: impl Into<String>, classifier: Box<dyn VerdictClassifier>) -> Self {
        Self {
            client,
            model: model.into(),
            classifier,
            archive_processed: true,
        }
    }

    /// Enables or disables moving analysed files into `processed/`.
    pub fn with_archiving(mut self, archive_processed: bool) -> Self {
        self.archive_processed = archive_processed;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Runs every stage for `path` and writes the verdict to `out`.
    pub async fn process_file<W: Write>(&self, path: &Path, out: &mut W) -> Result<AnalysisResult> {
        info!(path = %path.display(), "Processing report");
        let xml = decode_report_file(path)?;
        let report = parse_report(&xml)?;
        let result = analyze_report(&self.client, &self.model, &report, self.classifier.as_ref()).await?;
        present(&result, out).map_err(|e| AnalyzerError::io("<stdout>", e))?;

        if self.archive_processed {
            if let Some(parent) = path.parent() {
                let processed_dir = parent.join(PROCESSED_DIR_NAME);
                if let Err(e) = move_to_processed(path, &processed_dir) {
                    warn!(path = %path.display(), error = %e, "Could not move file to processed directory");
                    eprintln!("Warning: could not move {} to {}: {e}", path.display(), processed_dir.display());
                }
            }
        }
        Ok(result)
    }

    /// Processes `paths` in order; a failing file is reported and skipped.
    pub async fn run_files<W: Write>(&self, paths: &[PathBuf], out: &mut W) -> RunSummary {
        let mut summary = RunSummary::default();
        for path in paths {
            match self.process_file(path, out).await {
                Ok(result) => {
                    summary.succeeded += 1;
                    if result.has_concerns {
                        summary.with_concerns += 1;
                    }
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to process report");
                    eprintln!("Error processing {}: {e}", path.display());
                    summary.failures.push(FileFailure {
                        path: path.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed(),
            with_concerns = summary.with_concerns,
            "Finished processing files"
        );
        summary
    }
}

/// Moves `path` into `processed_dir`, appending `_1`, `_2`, … to the stem on clashes.
pub fn move_to_processed(path: &Path, processed_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(processed_dir).map_err(|e| AnalyzerError::io(processed_dir, e))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| AnalyzerError::format(path, "path has no file name"))?;
    let mut destination = processed_dir.join(file_name);

    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());
    let mut counter = 1;
    while destination.exists() {
        let candidate = match &extension {
            Some(ext) => format!("{stem}_{counter}.{ext}"),
            None => format!("{stem}_{counter}"),
        };
        destination = processed_dir.join(candidate);
        counter += 1;
    }

    fs::rename(path, &destination).map_err(|e| AnalyzerError::io(path, e))?;
    info!(from = %path.display(), to = %destination.display(), "Moved report to processed directory");
    Ok(destination)
}
