use crate::error::IngestError;
use crate::models::{BatchOptions, ProcessedFile, RawDocument};
use crate::pipeline::DocumentPipeline;
use crate::validation::validate_file_type;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let accepted = entry
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| validate_file_type(name, None));

        if accepted {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub code: &'static str,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub processed: Vec<(PathBuf, ProcessedFile)>,
    pub skipped: Vec<SkippedFile>,
}

/// Extracts every accepted document under `folder`, best effort.
pub async fn ingest_folder(
    pipeline: &DocumentPipeline,
    folder: &Path,
    options: &BatchOptions,
) -> Result<IngestionReport, IngestError> {
    let files = discover_documents(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no supported documents found in {}",
            folder.display()
        )));
    }

    let mut report = IngestionReport::default();
    let mut readable = Vec::new();
    let mut documents = Vec::new();

    for path in files {
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                documents.push(RawDocument::new(bytes, name));
                readable.push(path);
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "skipping unreadable file");
                let error = IngestError::from(error);
                report.skipped.push(SkippedFile {
                    path,
                    code: error.code(),
                    reason: error.to_string(),
                });
            }
        }
    }

    let results = pipeline.process_file_batch(documents, options).await;

    for (path, item) in readable.into_iter().zip(results) {
        match item.outcome {
            Ok(processed) => report.processed.push((path, processed)),
            Err(error) => report.skipped.push(SkippedFile {
                path,
                code: error.code(),
                reason: error.to_string(),
            }),
        }
    }

    info!(
        folder = %folder.display(),
        processed = report.processed.len(),
        skipped = report.skipped.len(),
        "folder ingestion finished"
    );

    Ok(report)
}
