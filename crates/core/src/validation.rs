use crate::capabilities::Capabilities;
use crate::error::{FileValidationError, ValidationCode};
use crate::models::{MimePolicy, ProcessingOptions};
use tracing::warn;

const MAX_FILE_NAME_CHARS: usize = 255;

pub const ALLOWED_TYPES: [(&str, &str); 9] = [
    (".txt", "text/plain"),
    (".pdf", "application/pdf"),
    (".doc", "application/msword"),
    (
        ".docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (".html", "text/html"),
    (".htm", "text/html"),
    (".md", "text/markdown"),
    (".markdown", "text/markdown"),
    (".odt", "application/vnd.oasis.opendocument.text"),
];

pub fn file_extension(file_name: &str) -> String {
    let base = base_name(file_name);
    match base.rfind('.') {
        Some(index) if index > 0 => base[index..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    ALLOWED_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == extension)
        .map(|(_, mime)| *mime)
}

fn is_allowed_mime(mime: &str) -> bool {
    ALLOWED_TYPES.iter().any(|(_, allowed)| *allowed == mime)
}

fn essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
}

pub fn sanitize_file_name(file_name: &str) -> String {
    let cleaned = base_name(file_name)
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return "unnamed".to_string();
    }

    if cleaned.chars().count() <= MAX_FILE_NAME_CHARS {
        return cleaned.to_string();
    }

    // Only ASCII survives the replacement above, so byte offsets are char offsets.
    let extension = file_extension(cleaned);
    if extension.len() >= MAX_FILE_NAME_CHARS {
        return cleaned[..MAX_FILE_NAME_CHARS].to_string();
    }

    let keep = MAX_FILE_NAME_CHARS - extension.len();
    let stem = &cleaned[..cleaned.len() - extension.len()];
    format!("{}{}", &stem[..keep.min(stem.len())], extension)
}

pub fn validate_file_type(file_name: &str, mime_type: Option<&str>) -> bool {
    let extension = file_extension(file_name);
    if mime_for_extension(&extension).is_none() {
        return false;
    }

    match mime_type {
        Some(mime) => is_allowed_mime(&essence(mime)),
        None => true,
    }
}

/// Returns `None` for content without a recognizable binary signature (plain text, markup).
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    const OLE2: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

    if bytes.starts_with(b"%PDF-") {
        return Some("application/pdf");
    }
    if bytes.starts_with(&OLE2) {
        return Some("application/msword");
    }
    if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
        return Some(sniff_zip_container(bytes));
    }

    let signatures: [(&[u8], &'static str); 8] = [
        (&b"\x89PNG\r\n\x1a\n"[..], "image/png"),
        (&b"\xFF\xD8\xFF"[..], "image/jpeg"),
        (&b"GIF87a"[..], "image/gif"),
        (&b"GIF89a"[..], "image/gif"),
        (&b"\x7FELF"[..], "application/x-elf"),
        (&b"MZ"[..], "application/x-msdownload"),
        (&b"\x1F\x8B"[..], "application/gzip"),
        (&b"7z\xBC\xAF\x27\x1C"[..], "application/x-7z-compressed"),
    ];

    signatures
        .iter()
        .find(|(signature, _)| bytes.starts_with(signature))
        .map(|(_, mime)| *mime)
}

fn sniff_zip_container(bytes: &[u8]) -> &'static str {
    const ODT_MARKER: &[u8] = b"mimetypeapplication/vnd.oasis.opendocument.text";

    if bytes.len() > 30 && bytes[30..].starts_with(ODT_MARKER) {
        "application/vnd.oasis.opendocument.text"
    } else if contains(bytes, b"word/document.xml") {
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    } else {
        "application/zip"
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

pub fn validate(
    bytes: &[u8],
    file_name: &str,
    options: &ProcessingOptions,
    declared_mime: Option<&str>,
    capabilities: &Capabilities,
) -> Result<Vec<String>, FileValidationError> {
    let safe_name = sanitize_file_name(file_name);
    let mut warnings = Vec::new();

    if bytes.is_empty() {
        return Err(FileValidationError::new(ValidationCode::EmptyFile, "file is empty")
            .with_file(safe_name));
    }

    if bytes.len() > options.max_file_size_bytes {
        return Err(FileValidationError::new(
            ValidationCode::FileTooLarge,
            format!(
                "file is {} bytes, limit is {} bytes",
                bytes.len(),
                options.max_file_size_bytes
            ),
        )
        .with_file(safe_name));
    }

    if !capabilities.sniff {
        return Ok(warnings);
    }

    let Some(detected) = sniff_mime(bytes) else {
        return Ok(warnings);
    };

    if !is_allowed_mime(detected) {
        return Err(FileValidationError::new(
            ValidationCode::InvalidType,
            format!("detected content type {detected} is not accepted"),
        )
        .with_file(safe_name));
    }

    let expected = declared_mime
        .map(essence)
        .or_else(|| mime_for_extension(&file_extension(file_name)).map(str::to_string));

    if let Some(expected) = expected {
        if expected != detected {
            if options.mime_policy == MimePolicy::Reject {
                return Err(FileValidationError::new(
                    ValidationCode::InvalidType,
                    format!("declared type {expected} does not match detected type {detected}"),
                )
                .with_file(safe_name));
            }

            warn!(
                file_name = %safe_name,
                declared = %expected,
                detected = %detected,
                "declared mime type does not match file content"
            );
            warnings.push(format!(
                "declared type {expected} does not match detected type {detected}"
            ));
        }
    }

    Ok(warnings)
}
