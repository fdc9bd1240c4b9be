//! Markdown-aware document splitting.
//!
//! Documents are first cut at `#`, `##` and `###` headers, each section
//! remembering the headers above it. Sections longer than the chunk size are
//! then split recursively on paragraph, line, word and finally character
//! boundaries, and the pieces are merged back up to the chunk size with a
//! configurable overlap. Sizes are measured in characters.

use std::collections::VecDeque;

/// Separators tried in order by the recursive splitter.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Deepest header level that starts a new section.
const MAX_HEADER_LEVEL: usize = 3;

/// A piece of a document ready to be embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPiece {
    pub text: String,
    pub header_path: Vec<String>,
}

/// Splits markdown into header-scoped, size-bounded pieces.
#[derive(Debug, Clone)]
pub struct MarkdownSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl MarkdownSplitter {
    /// Create a splitter. The overlap is clamped below the chunk size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    /// Split a markdown document.
    pub fn split(&self, markdown: &str) -> Vec<TextPiece> {
        split_sections(markdown)
            .into_iter()
            .flat_map(|(header_path, body)| {
                self.split_text(&body)
                    .into_iter()
                    .map(move |text| TextPiece {
                        text,
                        header_path: header_path.clone(),
                    })
            })
            .collect()
    }

    /// Recursively split plain text to fit the chunk size.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut index = separators.len().saturating_sub(1);
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || text.contains(sep) {
                index = i;
                break;
            }
        }
        let separator = separators.get(index).copied().unwrap_or("");
        let remaining = separators.get(index + 1..).unwrap_or(&[]);

        let splits: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut pieces = Vec::new();
        let mut fitting = Vec::new();
        for split in splits {
            if char_len(&split) < self.chunk_size {
                fitting.push(split);
                continue;
            }
            if !fitting.is_empty() {
                pieces.extend(self.merge(std::mem::take(&mut fitting), separator));
            }
            if remaining.is_empty() {
                pieces.push(split);
            } else {
                pieces.extend(self.split_with(&split, remaining));
            }
        }
        if !fitting.is_empty() {
            pieces.extend(self.merge(fitting, separator));
        }
        pieces
    }

    /// Join small splits into chunks, carrying an overlap between them.
    fn merge(&self, splits: Vec<String>, separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<String> = VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(&split);
            let joined_sep = if current.is_empty() { 0 } else { sep_len };

            if total + len + joined_sep > self.chunk_size && !current.is_empty() {
                push_joined(&mut chunks, &current, separator);

                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(&front) + if current.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if current.is_empty() { 0 } else { sep_len };
            current.push_back(split);
        }

        push_joined(&mut chunks, &current, separator);
        chunks
    }
}

impl Default for MarkdownSplitter {
    fn default() -> Self {
        Self::new(500, 50)
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn push_joined(chunks: &mut Vec<String>, parts: &VecDeque<String>, separator: &str) {
    let joined = parts
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn header_level(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > MAX_HEADER_LEVEL {
        return None;
    }
    let rest = &trimmed[level..];
    if rest.is_empty() || rest.starts_with(' ') {
        Some((level, rest.trim()))
    } else {
        None
    }
}

/// Cut a document at headers into `(header_path, body)` sections.
///
/// Header lines themselves are not part of any body. Lines inside fenced
/// code blocks are never treated as headers.
fn split_sections(markdown: &str) -> Vec<(Vec<String>, String)> {
    let mut sections: Vec<(Vec<String>, String)> = Vec::new();
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut body: Vec<&str> = Vec::new();
    let mut in_fence = false;

    let flush = |stack: &[(usize, String)],
                 body: &mut Vec<&str>,
                 sections: &mut Vec<(Vec<String>, String)>| {
        let text = body.join("\n");
        if !text.trim().is_empty() {
            let path = stack.iter().map(|(_, title)| title.clone()).collect();
            sections.push((path, text.trim().to_string()));
        }
        body.clear();
    };

    for line in markdown.lines() {
        let fence = line.trim_start().starts_with("```") || line.trim_start().starts_with("~~~");
        if fence {
            in_fence = !in_fence;
        }

        if !in_fence && !fence {
            if let Some((level, title)) = header_level(line) {
                flush(&stack, &mut body, &mut sections);
                while stack.last().is_some_and(|(l, _)| *l >= level) {
                    stack.pop();
                }
                if !title.is_empty() {
                    stack.push((level, title.to_string()));
                }
                continue;
            }
        }
        body.push(line);
    }
    flush(&stack, &mut body, &mut sections);

    sections
}
