pub mod cancel;
pub mod capabilities;
pub mod chunking;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod telemetry;
pub mod traits;
pub mod validation;

pub use cancel::CancellationToken;
pub use capabilities::{Capabilities, Capability};
pub use chunking::{chunk_spans, chunk_text, normalize_text, normalize_whitespace};
pub use error::{
    FileProcessingError, FileValidationError, IngestError, ProcessingCode, Result, ValidationCode,
};
#[cfg(feature = "pdf")]
pub use extractor::pdf::{stream_pdf_chunks, PdfChunkStream};
pub use extractor::ExtractionStrategy;
pub use ingest::{discover_documents, ingest_folder, IngestionReport, SkippedFile};
pub use models::{
    BatchItemResult, BatchOptions, ChunkSpan, ChunkingOptions, ExtractionMethod, ExtractionResult,
    FileMetadata, MimePolicy, ProcessedFile, ProcessingOptions, RawDocument, TextEncoding,
    DEFAULT_BATCH_CONCURRENCY, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
    DEFAULT_MAX_FILE_SIZE_BYTES, DEFAULT_TIMEOUT_MS, MAX_CONTENT_LENGTH, MIN_CONTENT_LENGTH,
};
pub use orchestrator::process_file_batch;
pub use pipeline::{content_hash, extract_text_from_file, DocumentPipeline};
pub use telemetry::{MetricsTelemetry, NoopTelemetry};
pub use traits::{Telemetry, TelemetrySpan};
pub use validation::{sanitize_file_name, sniff_mime, validate, validate_file_type};
