use crate::models::{ExtractionMethod, ExtractionResult, TextEncoding};

pub fn extract_plain(
    bytes: &[u8],
    encoding: TextEncoding,
    method: ExtractionMethod,
) -> ExtractionResult {
    ExtractionResult::new(encoding.decode(bytes), method)
}
