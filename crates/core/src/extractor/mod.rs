pub mod docx;
pub mod html;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod text;

use crate::cancel::CancellationToken;
use crate::capabilities::{Capabilities, Capability};
use crate::error::{FileProcessingError, IngestError, ProcessingCode};
use crate::models::{ExtractionMethod, ExtractionResult, ProcessingOptions};
use bytes::Bytes;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    Text,
    Markdown,
    Html,
    Pdf,
    Docx,
    OpenDocument,
    Fallback,
}

impl ExtractionStrategy {
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            ".txt" => Self::Text,
            ".md" | ".markdown" => Self::Markdown,
            ".html" | ".htm" => Self::Html,
            ".pdf" => Self::Pdf,
            ".doc" | ".docx" => Self::Docx,
            ".odt" => Self::OpenDocument,
            _ => Self::Fallback,
        }
    }
}

pub fn dispatch(
    strategy: ExtractionStrategy,
    bytes: &[u8],
    options: &ProcessingOptions,
    capabilities: &Capabilities,
    cancel: &CancellationToken,
) -> Result<ExtractionResult, IngestError> {
    match strategy {
        ExtractionStrategy::Text => Ok(text::extract_plain(
            bytes,
            options.encoding,
            ExtractionMethod::Text,
        )),
        ExtractionStrategy::Markdown => Ok(text::extract_plain(
            bytes,
            options.encoding,
            ExtractionMethod::Markdown,
        )),
        ExtractionStrategy::Fallback => Ok(text::extract_plain(
            bytes,
            options.encoding,
            ExtractionMethod::Fallback,
        )),
        ExtractionStrategy::Html => Ok(html::extract_html(bytes, options, capabilities)?),
        ExtractionStrategy::Pdf => {
            capabilities.require(Capability::Pdf)?;
            run_pdf(bytes, cancel)
        }
        ExtractionStrategy::Docx => docx::extract_docx(bytes, cancel, capabilities),
        ExtractionStrategy::OpenDocument => Err(FileProcessingError::new(
            ProcessingCode::UnsupportedFormat,
            "OpenDocument text files are not supported",
        )
        .into()),
    }
}

#[cfg(feature = "pdf")]
fn run_pdf(bytes: &[u8], cancel: &CancellationToken) -> Result<ExtractionResult, IngestError> {
    pdf::extract_pdf(bytes, cancel)
}

#[cfg(not(feature = "pdf"))]
fn run_pdf(_bytes: &[u8], _cancel: &CancellationToken) -> Result<ExtractionResult, IngestError> {
    Err(FileProcessingError::dependency_missing(Capability::Pdf.as_str()).into())
}

/// Runs extraction on the blocking pool and races it against `options.timeout_ms`.
///
/// The extractor sees a child of the caller's token; when the timer wins that child
/// is cancelled, so the extractor stops at its next checkpoint and drops whatever
/// document it had open.
pub async fn extract_with_timeout(
    strategy: ExtractionStrategy,
    bytes: Bytes,
    options: &ProcessingOptions,
    capabilities: Capabilities,
) -> Result<ExtractionResult, IngestError> {
    let extract_options = options.clone();
    run_with_timeout(options, move |cancel| {
        dispatch(strategy, &bytes, &extract_options, &capabilities, cancel)
    })
    .await
}

async fn run_with_timeout<F>(
    options: &ProcessingOptions,
    extract: F,
) -> Result<ExtractionResult, IngestError>
where
    F: FnOnce(&CancellationToken) -> Result<ExtractionResult, IngestError> + Send + 'static,
{
    let cancel = options
        .signal
        .as_ref()
        .map(CancellationToken::child_token)
        .unwrap_or_default();

    let task = tokio::task::spawn_blocking({
        let cancel = cancel.clone();
        move || extract(&cancel)
    });

    match tokio::time::timeout(options.timeout(), task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => {
            warn!(error = %join_error, "extraction task did not complete");
            Err(FileProcessingError::new(
                ProcessingCode::ExtractionFailed,
                "extraction task did not complete",
            )
            .with_source(join_error)
            .into())
        }
        Err(_) => {
            cancel.cancel();
            debug!(timeout_ms = options.timeout_ms, "extraction timed out");
            Err(FileProcessingError::new(
                ProcessingCode::Timeout,
                format!("extraction exceeded {} ms", options.timeout_ms),
            )
            .into())
        }
    }
}
