use crate::models::{ChunkSpan, ChunkingOptions};
use once_cell::sync::Lazy;
use regex::Regex;

static HORIZONTAL_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").expect("valid regex"));

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let spaced = HORIZONTAL_RUNS.replace_all(&unified, " ");
    let trimmed_lines = spaced
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    EXCESS_BLANK_LINES
        .replace_all(&trimmed_lines, "\n\n\n")
        .trim()
        .to_string()
}

const PARAGRAPH_BREAK: &[char] = &['\n', '\n'];
const LINE_BREAK: &[char] = &['\n'];
const SENTENCE_ENDINGS: [&[char]; 6] = [
    &['.', ' '],
    &['!', ' '],
    &['?', ' '],
    &['.', '\n'],
    &['!', '\n'],
    &['?', '\n'],
];
const SPACE: &[char] = &[' '];

fn rfind_in(chars: &[char], pattern: &[char], lo: usize, hi: usize) -> Option<usize> {
    if hi > chars.len() || hi < lo + pattern.len() {
        return None;
    }

    (lo..=hi - pattern.len())
        .rev()
        .find(|&index| chars[index..index + pattern.len()] == *pattern)
}

/// Picks the end offset of a chunk starting at `start` whose ideal end is `ideal_end`.
///
/// Candidates must land in `[ideal_end - 0.3 * chunk_size, ideal_end]` and leave at
/// least `max(0.5 * chunk_size, min_chunk_size)` characters in the chunk. Paragraph
/// breaks beat line breaks, which beat sentence ends, which beat spaces. Without a
/// candidate the chunk is cut at `ideal_end`.
pub(crate) fn find_break_point(
    chars: &[char],
    start: usize,
    ideal_end: usize,
    options: &ChunkingOptions,
) -> usize {
    let chunk_size = options.chunk_size;
    let window_floor = ideal_end.saturating_sub(chunk_size * 3 / 10);
    let min_floor = start + (chunk_size / 2).max(options.min_chunk_size);
    let lo = window_floor.max(min_floor);

    if lo >= ideal_end {
        return ideal_end;
    }

    // Separator chars belong to the chunk they end; the trim drops them.
    if let Some(index) = rfind_in(chars, PARAGRAPH_BREAK, lo, ideal_end) {
        return index + PARAGRAPH_BREAK.len();
    }
    if let Some(index) = rfind_in(chars, LINE_BREAK, lo, ideal_end) {
        return index + LINE_BREAK.len();
    }

    // The break sits right after the punctuation mark.
    let sentence_end = SENTENCE_ENDINGS
        .iter()
        .filter_map(|pattern| rfind_in(chars, pattern, lo.saturating_sub(1), ideal_end))
        .max()
        .map(|index| index + 1)
        .filter(|end| *end >= lo);
    if let Some(end) = sentence_end {
        return end;
    }

    if let Some(index) = rfind_in(chars, SPACE, lo, ideal_end) {
        return index + SPACE.len();
    }

    ideal_end
}

pub fn chunk_spans(text: &str, options: &ChunkingOptions) -> Vec<ChunkSpan> {
    let chars = text.chars().collect::<Vec<_>>();
    spans_for(&chars, options)
}

fn spans_for(chars: &[char], options: &ChunkingOptions) -> Vec<ChunkSpan> {
    let total = chars.len();
    let chunk_size = options.chunk_size.max(1);
    let mut spans = Vec::new();
    let mut start = 0usize;

    while start < total {
        let ideal_end = (start + chunk_size).min(total);
        let end = if ideal_end < total && options.respect_boundaries {
            find_break_point(chars, start, ideal_end, options)
        } else {
            ideal_end
        };

        spans.push(ChunkSpan { start, end });

        if end >= total {
            break;
        }

        let next = end.saturating_sub(options.overlap);
        // Overlap as large as the window would stall the cursor.
        start = if next <= start { end } else { next };
    }

    spans
}

pub fn chunk_text(text: &str, options: &ChunkingOptions) -> Vec<String> {
    let chars = text.chars().collect::<Vec<_>>();
    spans_for(&chars, options)
        .into_iter()
        .filter_map(|span| {
            let piece = chars[span.start..span.end].iter().collect::<String>();
            let trimmed = piece.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}
