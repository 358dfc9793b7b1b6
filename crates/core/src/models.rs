use crate::cancel::CancellationToken;
use crate::error::{IngestError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_MAX_FILE_SIZE_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
/// Cleaned content shorter than this many characters is rejected.
pub const MIN_CONTENT_LENGTH: usize = 10;
/// Cleaned content longer than this many bytes is rejected, never truncated.
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;
pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_BATCH_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    Latin1,
}

impl TextEncoding {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                String::from_utf8_lossy(bytes).into_owned()
            }
            Self::Latin1 => bytes.iter().map(|byte| char::from(*byte)).collect(),
        }
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Self::Latin1),
            other => Err(IngestError::InvalidArgument(format!(
                "unsupported encoding: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MimePolicy {
    #[default]
    Warn,
    Reject,
}

#[derive(Debug, Clone)]
pub struct ProcessingOptions {
    pub max_file_size_bytes: usize,
    pub timeout_ms: u64,
    pub encoding: TextEncoding,
    pub strip_html_tags: bool,
    pub signal: Option<CancellationToken>,
    pub mime_policy: MimePolicy,
}

impl ProcessingOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            encoding: TextEncoding::Utf8,
            strip_html_tags: true,
            signal: None,
            mime_policy: MimePolicy::Warn,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Bytes,
    pub file_name: String,
    pub mime_type: Option<String>,
}

impl RawDocument {
    pub fn new(bytes: impl Into<Bytes>, file_name: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            file_name: file_name.into(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Text,
    Pdf,
    Docx,
    Html,
    Markdown,
    Fallback,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Html => "html",
            Self::Markdown => "markdown",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub content: String,
    pub method: ExtractionMethod,
    pub page_count: Option<u32>,
    pub warnings: Vec<String>,
}

impl ExtractionResult {
    pub fn new(content: String, method: ExtractionMethod) -> Self {
        Self {
            content,
            method,
            page_count: None,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_name: String,
    pub file_type: String,
    pub processed_at: DateTime<Utc>,
    pub size_bytes: usize,
    pub word_count: usize,
    pub extraction_method: ExtractionMethod,
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedFile {
    pub content: String,
    pub file_name: String,
    pub file_type: String,
    pub metadata: FileMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingOptions {
    pub chunk_size: usize,
    pub overlap: usize,
    pub respect_boundaries: bool,
    pub min_chunk_size: usize,
}

impl ChunkingOptions {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            respect_boundaries: true,
            min_chunk_size: chunk_size * 3 / 10,
        }
    }

    pub fn without_boundaries(mut self) -> Self {
        self.respect_boundaries = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        if self.min_chunk_size > self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "min_chunk_size ({}) exceeds chunk_size ({})",
                self.min_chunk_size, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

/// Character window `[start, end)` of a chunk within the normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
}

impl ChunkSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub processing: ProcessingOptions,
    pub concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            processing: ProcessingOptions::default(),
            concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

#[derive(Debug)]
pub struct BatchItemResult {
    pub file_name: String,
    pub outcome: Result<ProcessedFile>,
}

impl BatchItemResult {
    pub fn result(&self) -> Option<&ProcessedFile> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&IngestError> {
        self.outcome.as_ref().err()
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}
