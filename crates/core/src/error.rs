use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    InvalidType,
    FileTooLarge,
    EmptyFile,
    Corrupted,
    ContentTooLarge,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidType => "INVALID_TYPE",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::EmptyFile => "EMPTY_FILE",
            Self::Corrupted => "CORRUPTED",
            Self::ContentTooLarge => "CONTENT_TOO_LARGE",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingCode {
    ExtractionFailed,
    Timeout,
    UnsupportedFormat,
    DependencyMissing,
}

impl ProcessingCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractionFailed => "EXTRACTION_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            Self::DependencyMissing => "DEPENDENCY_MISSING",
        }
    }
}

impl fmt::Display for ProcessingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct FileValidationError {
    pub code: ValidationCode,
    pub message: String,
    pub file_name: Option<String>,
    #[source]
    pub source: Option<BoxError>,
}

impl FileValidationError {
    pub fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            file_name: None,
            source: None,
        }
    }

    pub fn with_file(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct FileProcessingError {
    pub code: ProcessingCode,
    pub message: String,
    pub file_name: Option<String>,
    #[source]
    pub source: Option<BoxError>,
}

impl FileProcessingError {
    pub fn new(code: ProcessingCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            file_name: None,
            source: None,
        }
    }

    pub fn dependency_missing(capability: &str) -> Self {
        Self::new(
            ProcessingCode::DependencyMissing,
            format!("{capability} support is not available in this build"),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ProcessingCode::Timeout, "extraction was cancelled")
    }

    pub fn with_file(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] FileValidationError),

    #[error(transparent)]
    Processing(#[from] FileProcessingError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("batch entry {index} has no file data: {file_name}")]
    MissingFile { index: usize, file_name: String },

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl IngestError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(error) => error.code.as_str(),
            Self::Processing(error) => error.code.as_str(),
            Self::Io(_) => "IO_ERROR",
            Self::MissingFile { .. } => "NOT_FOUND",
            Self::InvalidChunkConfig(_) => "INVALID_CHUNK_CONFIG",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
        }
    }

    pub fn validation_code(&self) -> Option<ValidationCode> {
        match self {
            Self::Validation(error) => Some(error.code),
            _ => None,
        }
    }

    pub fn processing_code(&self) -> Option<ProcessingCode> {
        match self {
            Self::Processing(error) => Some(error.code),
            _ => None,
        }
    }

    pub fn for_file(self, file_name: &str) -> Self {
        match self {
            Self::Validation(error) if error.file_name.is_none() => {
                Self::Validation(error.with_file(file_name))
            }
            Self::Processing(error) if error.file_name.is_none() => {
                Self::Processing(error.with_file(file_name))
            }
            other => other,
        }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn codes_render_as_stable_strings() {
        let error: IngestError =
            FileValidationError::new(ValidationCode::FileTooLarge, "too big").into();
        assert_eq!(error.code(), "FILE_TOO_LARGE");
        assert_eq!(error.to_string(), "FILE_TOO_LARGE: too big");

        let error: IngestError = FileProcessingError::dependency_missing("html").into();
        assert_eq!(error.processing_code(), Some(ProcessingCode::DependencyMissing));
    }

    #[test]
    fn cause_is_preserved_but_not_in_message() {
        let cause = std::io::Error::new(std::io::ErrorKind::InvalidData, "xref table broken");
        let error = FileValidationError::new(ValidationCode::Corrupted, "pdf could not be opened")
            .with_source(cause);

        assert!(!error.to_string().contains("xref"));
        let source = error.source().map(|source| source.to_string());
        assert_eq!(source.as_deref(), Some("xref table broken"));
    }

    #[test]
    fn file_name_is_attached_once() {
        let error: IngestError = FileProcessingError::cancelled().with_file("first.pdf").into();
        match error.for_file("second.pdf") {
            IngestError::Processing(inner) => assert_eq!(inner.file_name.as_deref(), Some("first.pdf")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
