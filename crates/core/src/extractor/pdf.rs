use crate::cancel::CancellationToken;
use crate::chunking::{find_break_point, normalize_whitespace};
use crate::error::{
    FileProcessingError, FileValidationError, IngestError, ProcessingCode, ValidationCode,
};
use crate::models::{ChunkingOptions, ExtractionMethod, ExtractionResult};
use lopdf::Document;
use std::collections::VecDeque;
use tracing::{debug, warn};

const PAGE_SEPARATOR: &str = "\n\n";

struct PdfHandle {
    document: Document,
    page_numbers: Vec<u32>,
}

impl PdfHandle {
    fn open(bytes: &[u8], cancel: &CancellationToken) -> Result<Self, IngestError> {
        if cancel.is_cancelled() {
            return Err(FileProcessingError::cancelled().into());
        }

        let document = Document::load_mem(bytes).map_err(|error| {
            FileValidationError::new(ValidationCode::Corrupted, "pdf could not be opened")
                .with_source(error)
        })?;
        let page_numbers = document.get_pages().into_keys().collect::<Vec<_>>();
        debug!(pages = page_numbers.len(), "opened pdf document");

        Ok(Self {
            document,
            page_numbers,
        })
    }

    fn page_count(&self) -> u32 {
        self.page_numbers.len() as u32
    }

    fn page_text(&self, page_number: u32) -> Result<String, lopdf::Error> {
        self.document
            .extract_text(&[page_number])
            .map(|text| normalize_whitespace(&text))
    }
}

#[cfg(test)]
thread_local! {
    static RELEASED_HANDLES: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

impl Drop for PdfHandle {
    fn drop(&mut self) {
        #[cfg(test)]
        RELEASED_HANDLES.with(|released| released.set(released.get() + 1));
        debug!(pages = self.page_numbers.len(), "released pdf document");
    }
}

pub fn extract_pdf(
    bytes: &[u8],
    cancel: &CancellationToken,
) -> Result<ExtractionResult, IngestError> {
    let handle = PdfHandle::open(bytes, cancel)?;
    let mut pages = Vec::new();
    let mut warnings = Vec::new();

    for &page_number in &handle.page_numbers {
        if cancel.is_cancelled() {
            return Err(FileProcessingError::cancelled().into());
        }

        match handle.page_text(page_number) {
            Ok(text) if !text.is_empty() => pages.push(text),
            Ok(_) => {}
            Err(error) => {
                warn!(page = page_number, error = %error, "skipping unreadable pdf page");
                warnings.push(format!("page {page_number} could not be read"));
            }
        }

        if cancel.is_cancelled() {
            return Err(FileProcessingError::cancelled().into());
        }
    }

    let content = pages.join(PAGE_SEPARATOR);
    if content.trim().is_empty() {
        return Err(FileProcessingError::new(
            ProcessingCode::ExtractionFailed,
            "pdf contains no extractable text; it is likely scanned or image-only",
        )
        .into());
    }

    Ok(ExtractionResult {
        content,
        method: ExtractionMethod::Pdf,
        page_count: Some(handle.page_count()),
        warnings,
    })
}

/// Lazily yields chunk-sized strings page by page without holding the whole text.
///
/// The stream is single-pass. It ends when the pages run out or its token is
/// cancelled, emitting whatever text is still buffered, and releases the document
/// as soon as it ends or is dropped.
pub struct PdfChunkStream {
    handle: Option<PdfHandle>,
    next_page: usize,
    buffer: Vec<char>,
    // Leading chars of `buffer` already emitted as the previous chunk's overlap.
    emitted: usize,
    pending: VecDeque<String>,
    options: ChunkingOptions,
    cancel: CancellationToken,
    finished: bool,
}

impl PdfChunkStream {
    pub fn open(
        bytes: &[u8],
        options: &ChunkingOptions,
        cancel: CancellationToken,
    ) -> Result<Self, IngestError> {
        let handle = PdfHandle::open(bytes, &cancel)?;

        Ok(Self {
            handle: Some(handle),
            next_page: 0,
            buffer: Vec::new(),
            emitted: 0,
            pending: VecDeque::new(),
            options: *options,
            cancel,
            finished: false,
        })
    }

    /// Token that stops the stream at the next page boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn page_count(&self) -> Option<u32> {
        self.handle.as_ref().map(PdfHandle::page_count)
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn advance(&mut self) {
        if self.cancel.is_cancelled() {
            debug!(page = self.next_page, "pdf stream cancelled");
            self.finish();
            return;
        }

        let step = match self.handle.as_ref() {
            Some(handle) => handle
                .page_numbers
                .get(self.next_page)
                .map(|&page_number| (page_number, handle.page_text(page_number))),
            None => None,
        };

        let Some((page_number, text)) = step else {
            self.finish();
            return;
        };
        self.next_page += 1;

        match text {
            Ok(text) if !text.is_empty() => {
                if !self.buffer.is_empty() {
                    self.buffer.extend(PAGE_SEPARATOR.chars());
                }
                self.buffer.extend(text.chars());
                self.flush_complete();
            }
            Ok(_) => {}
            Err(error) => {
                warn!(page = page_number, error = %error, "skipping unreadable pdf page");
            }
        }

        if self.cancel.is_cancelled() {
            self.finish();
        }
    }

    fn flush_complete(&mut self) {
        let chunk_size = self.options.chunk_size.max(1);

        while self.buffer.len() > chunk_size {
            let end = if self.options.respect_boundaries {
                find_break_point(&self.buffer, 0, chunk_size, &self.options)
            } else {
                chunk_size
            };

            self.emit(end);

            let keep_from = match end.saturating_sub(self.options.overlap) {
                0 => end,
                keep_from => keep_from,
            };
            self.buffer.drain(..keep_from);
            self.emitted = end - keep_from;
        }
    }

    fn emit(&mut self, end: usize) {
        let piece = self.buffer[..end].iter().collect::<String>();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            self.pending.push_back(trimmed.to_string());
        }
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }

        if self.buffer.len() > self.emitted {
            self.emit(self.buffer.len());
        }
        self.buffer.clear();
        self.emitted = 0;
        self.release();
        self.finished = true;
    }

    fn release(&mut self) {
        self.handle.take();
    }
}

impl Iterator for PdfChunkStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                return Some(chunk);
            }
            if self.finished {
                return None;
            }
            self.advance();
        }
    }
}

impl Drop for PdfChunkStream {
    fn drop(&mut self) {
        self.release();
    }
}

pub fn stream_pdf_chunks(
    bytes: &[u8],
    options: &ChunkingOptions,
) -> Result<PdfChunkStream, IngestError> {
    PdfChunkStream::open(bytes, options, CancellationToken::new())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    pub(crate) fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let font_id = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = document.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let operations = if text.is_empty() {
                vec![Operation::new("q", vec![]), Operation::new("Q", vec![])]
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ]
            };
            let content = Content { operations };
            let content_id = document.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("content stream encodes"),
            ));
            let page_id = document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        document.save_to(&mut bytes).expect("pdf serializes");
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::build_pdf;
    use super::*;
    use crate::chunking::chunk_text;

    const PAGES: [&str; 3] = [
        "Pump maintenance schedule for the north plant.",
        "Valve inspection happens every second week.",
        "Pressure readings above nominal must be reported.",
    ];

    #[test]
    fn every_page_is_extracted_in_order() {
        let bytes = build_pdf(&PAGES);
        let result = extract_pdf(&bytes, &CancellationToken::new()).expect("pdf should extract");

        assert_eq!(result.page_count, Some(3));
        assert_eq!(result.method, ExtractionMethod::Pdf);
        let pump = result.content.find("Pump").expect("page 1 text");
        let valve = result.content.find("Valve").expect("page 2 text");
        let pressure = result.content.find("Pressure").expect("page 3 text");
        assert!(pump < valve && valve < pressure);
        assert_eq!(result.content.matches(PAGE_SEPARATOR).count(), 2);
    }

    #[test]
    fn image_only_pdf_fails_extraction() {
        let bytes = build_pdf(&["", ""]);
        let error = extract_pdf(&bytes, &CancellationToken::new()).expect_err("no text layer");
        assert_eq!(error.processing_code(), Some(ProcessingCode::ExtractionFailed));
    }

    #[test]
    fn blank_pages_are_skipped_but_counted() {
        let bytes = build_pdf(&["First page words here.", "", "Third page words here."]);
        let result = extract_pdf(&bytes, &CancellationToken::new()).expect("pdf should extract");
        assert_eq!(result.page_count, Some(3));
        assert_eq!(result.content.matches(PAGE_SEPARATOR).count(), 1);
    }

    #[test]
    fn unreadable_bytes_are_corrupted() {
        let error = extract_pdf(b"%PDF-1.4\n%broken", &CancellationToken::new())
            .expect_err("broken pdf must fail");
        assert_eq!(error.validation_code(), Some(ValidationCode::Corrupted));
    }

    #[test]
    fn cancelled_token_stops_before_opening() {
        let token = CancellationToken::new();
        token.cancel();
        let error = extract_pdf(&build_pdf(&PAGES), &token).expect_err("cancelled");
        assert_eq!(error.processing_code(), Some(ProcessingCode::Timeout));
    }

    #[test]
    fn stream_matches_chunking_the_whole_text() {
        let long_pages = PAGES.map(|page| page.repeat(6));
        let pages = long_pages.iter().map(String::as_str).collect::<Vec<_>>();
        let bytes = build_pdf(&pages);
        let options = ChunkingOptions::new(120, 20);

        let whole = extract_pdf(&bytes, &CancellationToken::new()).expect("pdf should extract");
        let expected = chunk_text(&whole.content, &options);

        let stream = stream_pdf_chunks(&bytes, &options).expect("stream should open");
        let streamed = stream.collect::<Vec<_>>();

        assert!(streamed.len() > 3);
        assert_eq!(streamed, expected);
    }

    #[test]
    fn stream_releases_document_when_exhausted() {
        let bytes = build_pdf(&PAGES);
        let mut stream =
            stream_pdf_chunks(&bytes, &ChunkingOptions::default()).expect("stream should open");
        assert_eq!(stream.page_count(), Some(3));

        let chunks = stream.by_ref().collect::<Vec<_>>();
        assert_eq!(chunks.len(), 1);
        assert!(!stream.is_open());
        assert_eq!(stream.next(), None);
    }

    #[test]
    fn cancelling_mid_stream_flushes_and_releases() {
        let bytes = build_pdf(&PAGES);
        let options = ChunkingOptions::new(40, 10);
        let mut stream = stream_pdf_chunks(&bytes, &options).expect("stream should open");

        let first = stream.next().expect("first chunk");
        assert!(first.starts_with("Pump"));

        stream.cancellation_token().cancel();
        let rest = stream.by_ref().collect::<Vec<_>>();
        assert!(rest.iter().all(|chunk| !chunk.contains("Valve")));
        assert!(!stream.is_open());
    }

    #[test]
    fn abandoned_stream_releases_its_document() {
        let released = || RELEASED_HANDLES.with(std::cell::Cell::get);
        let bytes = build_pdf(&PAGES);
        let options = ChunkingOptions::new(40, 10);

        let before = released();
        let mut stream = stream_pdf_chunks(&bytes, &options).expect("stream should open");
        assert!(stream.next().is_some());
        assert!(stream.is_open());
        assert_eq!(released(), before);

        drop(stream);
        assert_eq!(released(), before + 1);
    }

    #[test]
    fn stream_on_broken_bytes_fails_up_front() {
        let result = stream_pdf_chunks(b"%PDF-1.4\n%broken", &ChunkingOptions::default());
        assert!(matches!(result, Err(IngestError::Validation(_))));
    }
}
