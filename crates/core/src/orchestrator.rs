use crate::error::IngestError;
use crate::models::{BatchItemResult, BatchOptions, RawDocument};
use crate::pipeline::DocumentPipeline;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

enum BatchEntry {
    Document(RawDocument),
    Missing { index: usize, file_name: String },
}

impl DocumentPipeline {
    pub async fn process_file_batch(
        &self,
        files: Vec<RawDocument>,
        options: &BatchOptions,
    ) -> Vec<BatchItemResult> {
        let entries = files.into_iter().map(BatchEntry::Document).collect();
        self.run_batch(entries, options).await
    }

    /// Aligns the parallel arrays a multipart upload produces and processes them as a batch.
    ///
    /// A name without a buffer becomes a `NOT_FOUND` result in its slot; a buffer without
    /// a name is processed as `upload-<index>`.
    pub async fn process_upload_batch(
        &self,
        names: Vec<String>,
        buffers: Vec<Bytes>,
        mime_types: Vec<Option<String>>,
        options: &BatchOptions,
    ) -> Vec<BatchItemResult> {
        let len = names.len().max(buffers.len());
        let mut names = names.into_iter();
        let mut buffers = buffers.into_iter();
        let mut mime_types = mime_types.into_iter();

        let entries = (0..len)
            .map(|index| {
                let name = names.next();
                let buffer = buffers.next();
                let mime_type = mime_types.next().flatten();
                match buffer {
                    Some(bytes) => {
                        let file_name = name.unwrap_or_else(|| format!("upload-{index}"));
                        let document = RawDocument::new(bytes, file_name);
                        BatchEntry::Document(match mime_type {
                            Some(mime_type) => document.with_mime_type(mime_type),
                            None => document,
                        })
                    }
                    None => BatchEntry::Missing {
                        index,
                        file_name: name.unwrap_or_else(|| format!("upload-{index}")),
                    },
                }
            })
            .collect();

        self.run_batch(entries, options).await
    }

    async fn run_batch(
        &self,
        entries: Vec<BatchEntry>,
        options: &BatchOptions,
    ) -> Vec<BatchItemResult> {
        let concurrency = options.concurrency.max(1);
        debug!(files = entries.len(), concurrency, "processing batch");

        let results = stream::iter(entries)
            .map(|entry| self.process_entry(entry, options))
            .buffered(concurrency)
            .collect::<Vec<_>>()
            .await;

        let failed = results.iter().filter(|item| !item.is_ok()).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "batch finished with failures");
        }
        results
    }

    async fn process_entry(&self, entry: BatchEntry, options: &BatchOptions) -> BatchItemResult {
        match entry {
            BatchEntry::Document(document) => {
                let outcome = self
                    .extract_text_from_file(
                        document.bytes,
                        &document.file_name,
                        document.mime_type.as_deref(),
                        &options.processing,
                    )
                    .await;
                BatchItemResult {
                    file_name: document.file_name,
                    outcome,
                }
            }
            BatchEntry::Missing { index, file_name } => BatchItemResult {
                outcome: Err(IngestError::MissingFile {
                    index,
                    file_name: file_name.clone(),
                }),
                file_name,
            },
        }
    }
}

pub async fn process_file_batch(
    files: Vec<RawDocument>,
    options: &BatchOptions,
) -> Vec<BatchItemResult> {
    DocumentPipeline::new().process_file_batch(files, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capabilities;
    use crate::error::ValidationCode;

    fn text_file(name: &str) -> RawDocument {
        RawDocument::new(
            format!("Contents of {name} with enough words to keep."),
            name.to_string(),
        )
    }

    #[cfg(feature = "pdf")]
    #[tokio::test]
    async fn one_corrupted_file_does_not_fail_its_siblings() {
        let files = vec![
            text_file("one.txt"),
            text_file("two.md"),
            RawDocument::new(Bytes::from_static(b"%PDF-1.4\n%broken"), "three.pdf"),
            text_file("four.txt"),
            text_file("five.txt"),
        ];

        let results = DocumentPipeline::new()
            .process_file_batch(files, &BatchOptions::default())
            .await;

        assert_eq!(results.len(), 5);
        let names = results
            .iter()
            .map(|item| item.file_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["one.txt", "two.md", "three.pdf", "four.txt", "five.txt"]);

        for (index, item) in results.iter().enumerate() {
            if index == 2 {
                assert!(item.result().is_none());
                let error = item.error().expect("corrupted pdf fails");
                assert_eq!(error.validation_code(), Some(ValidationCode::Corrupted));
            } else {
                assert!(item.result().is_some(), "{} should succeed", item.file_name);
            }
        }
    }

    #[tokio::test]
    async fn order_is_kept_with_a_single_slot() {
        let files = (0..8).map(|i| text_file(&format!("file-{i}.txt"))).collect();
        let options = BatchOptions {
            concurrency: 0,
            ..BatchOptions::default()
        };

        let results = DocumentPipeline::new()
            .with_capabilities(Capabilities::none())
            .process_file_batch(files, &options)
            .await;

        let names = results
            .iter()
            .map(|item| item.file_name.clone())
            .collect::<Vec<_>>();
        let expected = (0..8).map(|i| format!("file-{i}.txt")).collect::<Vec<_>>();
        assert_eq!(names, expected);
        assert!(results.iter().all(BatchItemResult::is_ok));
    }

    #[tokio::test]
    async fn mismatched_upload_arrays_become_not_found_slots() {
        let names = vec!["a.txt".to_string(), "b.txt".to_string(), "c.txt".to_string()];
        let buffers = vec![
            Bytes::from_static(b"first upload text body"),
            Bytes::from_static(b"second upload text body"),
        ];
        let mime_types = vec![Some("text/plain".to_string())];

        let results = DocumentPipeline::new()
            .process_upload_batch(names, buffers, mime_types, &BatchOptions::default())
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        let missing = results[2].error().expect("no buffer for c.txt");
        assert_eq!(missing.code(), "NOT_FOUND");
        assert_eq!(results[2].file_name, "c.txt");
    }

    #[tokio::test]
    async fn unnamed_buffers_get_positional_names() {
        let buffers = vec![
            Bytes::from_static(b"named buffer content"),
            Bytes::from_static(b"unnamed buffer content"),
        ];

        let results = DocumentPipeline::new()
            .process_upload_batch(
                vec!["named.txt".to_string()],
                buffers,
                Vec::new(),
                &BatchOptions::default(),
            )
            .await;

        assert_eq!(results[1].file_name, "upload-1");
        // No extension falls back to a raw decode.
        let processed = results[1].result().expect("fallback decode");
        assert_eq!(processed.content, "unnamed buffer content");
    }
}
