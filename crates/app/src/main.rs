use anyhow::Context;
use bytes::Bytes;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use docingest_core::{
    chunk_spans, chunk_text, ingest_folder, validate, BatchOptions, CancellationToken,
    Capabilities, ChunkingOptions, DocumentPipeline, IngestError, MetricsTelemetry, MimePolicy,
    PdfChunkStream, ProcessingOptions, TextEncoding, DEFAULT_BATCH_CONCURRENCY, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
    DEFAULT_MAX_FILE_SIZE_BYTES, DEFAULT_TIMEOUT_MS,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docingest", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Forward extraction metrics to the installed `metrics` recorder.
    #[arg(long, global = true, env = "DOCINGEST_METRICS", default_value_t = false)]
    metrics: bool,

    #[command(flatten)]
    processing: ProcessingArgs,
}

#[derive(Args)]
struct ProcessingArgs {
    /// Reject uploads larger than this many bytes.
    #[arg(long, global = true, env = "DOCINGEST_MAX_FILE_SIZE_BYTES", default_value_t = DEFAULT_MAX_FILE_SIZE_BYTES)]
    max_file_size_bytes: usize,

    /// Extraction budget per file in milliseconds.
    #[arg(long, global = true, env = "DOCINGEST_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Encoding for plain-text files (utf-8 or latin1).
    #[arg(long, global = true, env = "DOCINGEST_ENCODING", default_value = "utf-8")]
    encoding: String,

    /// Return HTML markup verbatim instead of its visible text.
    #[arg(long, global = true, env = "DOCINGEST_KEEP_HTML", default_value_t = false)]
    keep_html: bool,

    /// Fail when the detected content type disagrees with the declared one.
    #[arg(long, global = true, env = "DOCINGEST_STRICT_MIME", default_value_t = false)]
    strict_mime: bool,
}

#[derive(Args)]
struct ChunkArgs {
    /// Target chunk length in characters.
    #[arg(long, env = "DOCINGEST_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks.
    #[arg(long, env = "DOCINGEST_CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP)]
    overlap: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Show which optional extractors this build carries.
    Capabilities,
    /// Extract normalized text from one file.
    Extract {
        #[arg(long)]
        file: PathBuf,
        /// Declared MIME type, as an upload would send it.
        #[arg(long)]
        mime_type: Option<String>,
    },
    /// Extract one file and split its text into chunks.
    Chunk {
        #[arg(long)]
        file: PathBuf,
        #[command(flatten)]
        chunking: ChunkArgs,
        /// Cut at the chunk size instead of searching for a boundary.
        #[arg(long, default_value_t = false)]
        no_boundaries: bool,
        /// Print character windows instead of chunk text.
        #[arg(long, default_value_t = false)]
        spans: bool,
    },
    /// Chunk a PDF page by page without materializing its whole text.
    StreamPdf {
        #[arg(long)]
        file: PathBuf,
        #[command(flatten)]
        chunking: ChunkArgs,
    },
    /// Extract every supported document under a folder.
    Batch {
        /// Folder that contains documents recursively.
        #[arg(long)]
        folder: PathBuf,
        /// Extractions allowed in flight at once.
        #[arg(long, env = "DOCINGEST_CONCURRENCY", default_value_t = DEFAULT_BATCH_CONCURRENCY)]
        concurrency: usize,
    },
}

impl ProcessingArgs {
    fn to_options(&self, signal: CancellationToken) -> anyhow::Result<ProcessingOptions> {
        let encoding = self.encoding.parse::<TextEncoding>()?;

        Ok(ProcessingOptions {
            max_file_size_bytes: self.max_file_size_bytes,
            timeout_ms: self.timeout_ms,
            encoding,
            strip_html_tags: !self.keep_html,
            signal: Some(signal),
            mime_policy: if self.strict_mime {
                MimePolicy::Reject
            } else {
                MimePolicy::Warn
            },
        })
    }
}

impl ChunkArgs {
    fn to_options(&self, respect_boundaries: bool) -> anyhow::Result<ChunkingOptions> {
        let mut options = ChunkingOptions::new(self.chunk_size, self.overlap);
        options.respect_boundaries = respect_boundaries;
        options.validate()?;
        Ok(options)
    }
}

async fn read_file(path: &Path) -> anyhow::Result<(Bytes, String)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("unable to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("path has no file name: {}", path.display()))?;
    Ok((Bytes::from(bytes), name))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let signal = CancellationToken::new();
    tokio::spawn({
        let signal = signal.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling extraction");
                signal.cancel();
            }
        }
    });

    let options = cli.processing.to_options(signal.clone())?;
    let mut pipeline = DocumentPipeline::new();
    if cli.metrics {
        pipeline = pipeline.with_telemetry(Arc::new(MetricsTelemetry));
    }

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "docingest boot"
    );

    match cli.command {
        Command::Capabilities => {
            let capabilities = pipeline.capabilities();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&capabilities)?);
            } else {
                println!(
                    "html={} docx={} pdf={} sniff={}",
                    capabilities.html, capabilities.docx, capabilities.pdf, capabilities.sniff
                );
                for missing in capabilities.missing() {
                    println!("missing: {missing}");
                }
            }
        }
        Command::Extract { file, mime_type } => {
            let (bytes, name) = read_file(&file).await?;
            let processed = pipeline
                .extract_text_from_file(bytes, &name, mime_type.as_deref(), &options)
                .await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&processed)?);
            } else {
                let metadata = &processed.metadata;
                println!(
                    "file={} type={} method={} words={} bytes={}",
                    metadata.file_name,
                    metadata.file_type,
                    metadata.extraction_method,
                    metadata.word_count,
                    metadata.size_bytes
                );
                if let Some(pages) = metadata.page_count {
                    println!("pages={pages}");
                }
                for warning in &metadata.warnings {
                    println!("warning: {warning}");
                }
                println!("{}", processed.content);
            }
        }
        Command::Chunk {
            file,
            chunking,
            no_boundaries,
            spans,
        } => {
            let chunking = chunking.to_options(!no_boundaries)?;
            let (bytes, name) = read_file(&file).await?;
            let processed = pipeline
                .extract_text_from_file(bytes, &name, None, &options)
                .await?;

            if spans {
                let spans = chunk_spans(&processed.content, &chunking);
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&spans)?);
                } else {
                    for (index, span) in spans.iter().enumerate() {
                        println!("[{index}] start={} end={} len={}", span.start, span.end, span.len());
                    }
                }
            } else {
                let chunks = chunk_text(&processed.content, &chunking);
                print_chunks(&chunks, cli.json)?;
            }
        }
        Command::StreamPdf { file, chunking } => {
            let chunking = chunking.to_options(true)?;
            let (bytes, name) = read_file(&file).await?;
            let stream = open_pdf_stream(
                &bytes,
                &name,
                &options,
                &chunking,
                &pipeline.capabilities(),
            )?;

            if cli.json {
                let chunks = stream.collect::<Vec<_>>();
                print_chunks(&chunks, true)?;
            } else {
                for (index, chunk) in stream.enumerate() {
                    println!("--- chunk {index} ({} chars)\n{chunk}", chunk.chars().count());
                }
            }
        }
        Command::Batch { folder, concurrency } => {
            let batch = BatchOptions {
                processing: options,
                concurrency,
            };
            let report = ingest_folder(&pipeline, &folder, &batch).await?;

            if !report.skipped.is_empty() {
                warn!(
                    "skipped_files={} for folder={}",
                    report.skipped.len(),
                    folder.display()
                );
                for skipped in &report.skipped {
                    warn!(path = %skipped.path.display(), code = skipped.code, reason = %skipped.reason, "skipped document");
                }
            }

            if cli.json {
                let processed = report
                    .processed
                    .iter()
                    .map(|(path, file)| {
                        serde_json::json!({ "path": path.display().to_string(), "file": file })
                    })
                    .collect::<Vec<_>>();
                let skipped = report
                    .skipped
                    .iter()
                    .map(|skipped| {
                        serde_json::json!({
                            "path": skipped.path.display().to_string(),
                            "code": skipped.code,
                            "reason": skipped.reason,
                        })
                    })
                    .collect::<Vec<_>>();
                println!(
                    "{}",
                    serde_json::to_string_pretty(
                        &serde_json::json!({ "processed": processed, "skipped": skipped })
                    )?
                );
            } else {
                for (path, file) in &report.processed {
                    println!(
                        "{} method={} words={}",
                        path.display(),
                        file.metadata.extraction_method,
                        file.metadata.word_count
                    );
                }
                println!(
                    "{} documents processed, {} skipped at {}",
                    report.processed.len(),
                    report.skipped.len(),
                    Utc::now().to_rfc3339()
                );
            }
        }
    }

    Ok(())
}

/// Applies the same upload checks as `extract` before paging through the PDF.
fn open_pdf_stream(
    bytes: &[u8],
    name: &str,
    options: &ProcessingOptions,
    chunking: &ChunkingOptions,
    capabilities: &Capabilities,
) -> anyhow::Result<PdfChunkStream> {
    validate(bytes, name, options, None, capabilities).map_err(IngestError::from)?;
    let signal = options
        .signal
        .as_ref()
        .map(CancellationToken::child_token)
        .unwrap_or_default();
    Ok(PdfChunkStream::open(bytes, chunking, signal)?)
}

fn print_chunks(chunks: &[String], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(chunks)?);
    } else {
        for (index, chunk) in chunks.iter().enumerate() {
            println!("--- chunk {index} ({} chars)\n{chunk}", chunk.chars().count());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docingest_core::{ProcessingCode, ValidationCode};

    fn ingest_error(error: &anyhow::Error) -> &IngestError {
        error.downcast_ref::<IngestError>().expect("ingest error")
    }

    #[test]
    fn pdf_stream_is_size_checked() {
        let options = ProcessingOptions {
            max_file_size_bytes: 8,
            ..ProcessingOptions::default()
        };
        let error = open_pdf_stream(
            b"%PDF-1.4\n%more than eight bytes",
            "big.pdf",
            &options,
            &ChunkingOptions::default(),
            &Capabilities::detect(),
        )
        .err()
        .expect("oversized pdf is rejected");
        assert_eq!(
            ingest_error(&error).validation_code(),
            Some(ValidationCode::FileTooLarge)
        );
    }

    #[test]
    fn pdf_stream_follows_the_interrupt_signal() {
        let signal = CancellationToken::new();
        signal.cancel();
        let options = ProcessingOptions {
            signal: Some(signal),
            ..ProcessingOptions::default()
        };
        let error = open_pdf_stream(
            b"%PDF-1.4\n%content",
            "doc.pdf",
            &options,
            &ChunkingOptions::default(),
            &Capabilities::detect(),
        )
        .err()
        .expect("cancelled before opening");
        assert_eq!(
            ingest_error(&error).processing_code(),
            Some(ProcessingCode::Timeout)
        );
    }
}
