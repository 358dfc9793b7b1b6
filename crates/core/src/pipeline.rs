use crate::capabilities::Capabilities;
use crate::chunking::normalize_text;
use crate::error::{FileValidationError, IngestError, Result, ValidationCode};
use crate::extractor::{extract_with_timeout, ExtractionStrategy};
use crate::models::{
    FileMetadata, ProcessedFile, ProcessingOptions, MAX_CONTENT_LENGTH, MIN_CONTENT_LENGTH,
};
use crate::telemetry::{
    NoopTelemetry, COUNTER_ERRORS, COUNTER_EXTRACTIONS, HISTOGRAM_CONTENT_LENGTH,
    HISTOGRAM_DURATION_MS, SPAN_EXTRACT,
};
use crate::traits::Telemetry;
use crate::validation::{file_extension, sanitize_file_name, validate};
use bytes::Bytes;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct DocumentPipeline {
    capabilities: Capabilities,
    telemetry: Arc<dyn Telemetry>,
}

impl Default for DocumentPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DocumentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentPipeline")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl DocumentPipeline {
    pub fn new() -> Self {
        Self {
            capabilities: Capabilities::detect(),
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub async fn extract_text_from_file(
        &self,
        bytes: Bytes,
        file_name: &str,
        mime_type: Option<&str>,
        options: &ProcessingOptions,
    ) -> Result<ProcessedFile> {
        let safe_name = sanitize_file_name(file_name);
        let extension = file_extension(&safe_name);
        let size_bytes = bytes.len();
        let started = Instant::now();

        let mut span = self.telemetry.start_span(
            SPAN_EXTRACT,
            &[
                ("file.extension", extension.clone()),
                ("file.size_bytes", size_bytes.to_string()),
            ],
        );

        let outcome = self
            .run(bytes, &safe_name, &extension, mime_type, options)
            .await
            .map_err(|error| error.for_file(&safe_name));

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        let extension_label = [("extension", extension.clone())];
        self.telemetry
            .record_histogram(HISTOGRAM_DURATION_MS, elapsed_ms, &extension_label);

        match &outcome {
            Ok(processed) => {
                let method = processed.metadata.extraction_method.as_str().to_string();
                span.set_attribute("extraction.method", method.clone());
                self.telemetry.increment_counter(
                    COUNTER_EXTRACTIONS,
                    &[("extension", extension.clone()), ("method", method)],
                );
                self.telemetry.record_histogram(
                    HISTOGRAM_CONTENT_LENGTH,
                    processed.content.len() as f64,
                    &extension_label,
                );
                info!(
                    file_name = %safe_name,
                    method = %processed.metadata.extraction_method,
                    words = processed.metadata.word_count,
                    "document extracted"
                );
            }
            Err(error) => {
                span.set_attribute("error.code", error.code().to_string());
                self.telemetry.increment_counter(
                    COUNTER_ERRORS,
                    &[
                        ("extension", extension.clone()),
                        ("error_code", error.code().to_string()),
                    ],
                );
                warn!(file_name = %safe_name, code = error.code(), error = %error, "extraction failed");
            }
        }

        span.end();
        outcome
    }

    async fn run(
        &self,
        bytes: Bytes,
        safe_name: &str,
        extension: &str,
        mime_type: Option<&str>,
        options: &ProcessingOptions,
    ) -> Result<ProcessedFile> {
        let size_bytes = bytes.len();
        let mut warnings = validate(&bytes, safe_name, options, mime_type, &self.capabilities)?;

        let strategy = ExtractionStrategy::from_extension(extension);
        debug!(file_name = %safe_name, ?strategy, "dispatching extraction");

        let extracted = extract_with_timeout(strategy, bytes, options, self.capabilities).await?;
        let content = normalize_text(&extracted.content);
        check_content_length(&content)?;

        warnings.extend(extracted.warnings);

        let metadata = FileMetadata {
            file_name: safe_name.to_string(),
            file_type: extension.to_string(),
            processed_at: Utc::now(),
            size_bytes,
            word_count: content.split_whitespace().count(),
            extraction_method: extracted.method,
            content_hash: content_hash(&content),
            page_count: extracted.page_count,
            warnings,
        };

        Ok(ProcessedFile {
            content,
            file_name: safe_name.to_string(),
            file_type: extension.to_string(),
            metadata,
        })
    }
}

fn check_content_length(content: &str) -> Result<(), IngestError> {
    let chars = content.chars().count();
    if chars < MIN_CONTENT_LENGTH {
        return Err(FileValidationError::new(
            ValidationCode::EmptyFile,
            format!("extracted text has {chars} characters, minimum is {MIN_CONTENT_LENGTH}"),
        )
        .into());
    }

    if content.len() > MAX_CONTENT_LENGTH {
        return Err(FileValidationError::new(
            ValidationCode::ContentTooLarge,
            format!(
                "extracted text is {} bytes, limit is {MAX_CONTENT_LENGTH} bytes",
                content.len()
            ),
        )
        .into());
    }

    Ok(())
}

pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub async fn extract_text_from_file(
    bytes: impl Into<Bytes>,
    file_name: &str,
    mime_type: Option<&str>,
    options: &ProcessingOptions,
) -> Result<ProcessedFile> {
    DocumentPipeline::new()
        .extract_text_from_file(bytes.into(), file_name, mime_type, options)
        .await
}
