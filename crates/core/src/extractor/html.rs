use crate::capabilities::{Capabilities, Capability};
use crate::error::FileProcessingError;
use crate::models::{ExtractionMethod, ExtractionResult, ProcessingOptions};

pub const EXCLUDED_ELEMENTS: [&str; 9] = [
    "script", "style", "head", "svg", "noscript", "iframe", "object", "embed", "applet",
];

#[cfg(feature = "html")]
const BLOCK_ELEMENTS: [&str; 16] = [
    "p", "div", "br", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article",
    "blockquote", "pre", "table",
];

/// Returns the visible text of an HTML document, or the markup itself when
/// tag stripping is turned off. Never falls back to pattern-based stripping.
pub fn extract_html(
    bytes: &[u8],
    options: &ProcessingOptions,
    capabilities: &Capabilities,
) -> Result<ExtractionResult, FileProcessingError> {
    let html = options.encoding.decode(bytes);

    if !options.strip_html_tags {
        return Ok(ExtractionResult::new(html, ExtractionMethod::Html));
    }

    capabilities.require(Capability::Html)?;
    let text = visible_text(&html)?;
    Ok(ExtractionResult::new(text.trim().to_string(), ExtractionMethod::Html))
}

#[cfg(feature = "html")]
fn visible_text(html: &str) -> Result<String, FileProcessingError> {
    let document = scraper::Html::parse_document(html);
    let mut text = String::new();
    collect_text(&document.root_element(), &mut text);
    Ok(text)
}

#[cfg(not(feature = "html"))]
fn visible_text(_html: &str) -> Result<String, FileProcessingError> {
    Err(FileProcessingError::dependency_missing(Capability::Html.as_str()))
}

#[cfg(feature = "html")]
fn collect_text(element: &scraper::ElementRef, text: &mut String) {
    for node in element.children() {
        if let Some(child) = scraper::ElementRef::wrap(node) {
            let tag_name = child.value().name();
            if EXCLUDED_ELEMENTS.contains(&tag_name) {
                continue;
            }

            let is_block = BLOCK_ELEMENTS.contains(&tag_name);
            if is_block && !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            collect_text(&child, text);
            if is_block && !text.ends_with('\n') {
                text.push('\n');
            }
        } else if let Some(fragment) = node.value().as_text() {
            text.push_str(fragment);
        }
    }
}
