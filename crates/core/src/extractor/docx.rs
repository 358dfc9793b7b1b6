use crate::cancel::CancellationToken;
use crate::capabilities::{Capabilities, Capability};
use crate::error::{
    FileProcessingError, FileValidationError, IngestError, ProcessingCode, ValidationCode,
};
use crate::models::{ExtractionMethod, ExtractionResult};
use crate::validation::sniff_mime;

pub fn extract_docx(
    bytes: &[u8],
    cancel: &CancellationToken,
    capabilities: &Capabilities,
) -> Result<ExtractionResult, IngestError> {
    capabilities.require(Capability::Docx)?;

    if cancel.is_cancelled() {
        return Err(FileProcessingError::cancelled().into());
    }

    let text = read_paragraphs(bytes).map_err(|cause| open_error(bytes, cause))?;

    if text.trim().is_empty() {
        return Err(FileProcessingError::new(
            ProcessingCode::ExtractionFailed,
            "document contains no extractable text",
        )
        .into());
    }

    Ok(ExtractionResult::new(text, ExtractionMethod::Docx))
}

fn open_error(bytes: &[u8], cause: String) -> IngestError {
    // Legacy binary .doc files are intact, just not a format the reader understands.
    if sniff_mime(bytes) == Some("application/msword") {
        FileProcessingError::new(
            ProcessingCode::ExtractionFailed,
            "legacy binary .doc documents cannot be read",
        )
        .with_source(cause)
        .into()
    } else {
        FileValidationError::new(ValidationCode::Corrupted, "document could not be opened")
            .with_source(cause)
            .into()
    }
}

#[cfg(feature = "docx")]
fn read_paragraphs(bytes: &[u8]) -> Result<String, String> {
    use docx_rs::DocumentChild;

    let docx = docx_rs::read_docx(bytes).map_err(|error| error.to_string())?;
    let mut text = String::new();

    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => push_paragraph(paragraph, &mut text),
            DocumentChild::Table(table) => push_table(table, &mut text),
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(feature = "docx")]
fn push_paragraph(paragraph: &docx_rs::Paragraph, text: &mut String) {
    push_inline(&paragraph.children, text);
    text.push('\n');
}

#[cfg(feature = "docx")]
fn push_inline(children: &[docx_rs::ParagraphChild], text: &mut String) {
    use docx_rs::{ParagraphChild, RunChild};

    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for child in &run.children {
                    match child {
                        RunChild::Text(fragment) => text.push_str(&fragment.text),
                        RunChild::Tab(_) => text.push('\t'),
                        RunChild::Break(_) => text.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => push_inline(&link.children, text),
            _ => {}
        }
    }
}

// Cells become tab-separated, rows become lines.
#[cfg(feature = "docx")]
fn push_table(table: &docx_rs::Table, text: &mut String) {
    use docx_rs::{TableCellContent, TableChild, TableRowChild};

    for TableChild::TableRow(row) in &table.rows {
        for (index, TableRowChild::TableCell(cell)) in row.cells.iter().enumerate() {
            if index > 0 {
                text.push('\t');
            }
            let mut cell_text = String::new();
            for content in &cell.children {
                match content {
                    TableCellContent::Paragraph(paragraph) => {
                        push_paragraph(paragraph, &mut cell_text)
                    }
                    TableCellContent::Table(nested) => push_table(nested, &mut cell_text),
                    _ => {}
                }
            }
            text.push_str(cell_text.trim_end());
        }
        text.push('\n');
    }
}

#[cfg(not(feature = "docx"))]
fn read_paragraphs(_bytes: &[u8]) -> Result<String, String> {
    Err(format!("{} support is not compiled in", Capability::Docx))
}
