//! Plain text: line splitting, word wrapping and the `txt` converter.

use super::{check_target, docx, pdf, CodecRuntime, FormatConverter};
use crate::error::MorphError;
use std::sync::Arc;

/// Split text into paragraphs, one per line. Blank lines are kept as empty
/// paragraphs so vertical spacing survives the conversion. A form feed
/// (page break) also ends a paragraph; tabs are kept.
pub fn paragraphs(text: &str) -> Vec<String> {
    let normalised = text
        .replace("\r\n", "\n")
        .replace(['\r', '\x0c'], "\n");
    normalised
        .trim_end_matches('\n')
        .split('\n')
        .map(|line| line.trim_end().to_string())
        .collect()
}

/// Join per-page text with a blank line between pages and a final newline.
pub fn join_pages(pages: &[String]) -> String {
    let mut out = pages
        .iter()
        .map(|p| p.trim_end())
        .collect::<Vec<_>>()
        .join("\n\n");
    out.push('\n');
    out
}

/// Greedy word wrap to at most `max_chars` characters per line.
///
/// Words longer than a line are hard-split. An empty input yields one empty
/// line.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();

        while chars.len() > max_chars {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = chars.split_off(max_chars);
            lines.push(chars.into_iter().collect());
            chars = rest;
        }

        let word_len = chars.len();
        if word_len == 0 {
            continue;
        }
        let needed = if current_len == 0 { word_len } else { current_len + 1 + word_len };
        if needed > max_chars {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(chars);
        current_len += word_len;
    }

    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Converter for `text/plain`.
pub struct TextConverter {
    runtime: Arc<CodecRuntime>,
}

impl TextConverter {
    pub fn new(runtime: Arc<CodecRuntime>) -> Self {
        Self { runtime }
    }
}

impl FormatConverter for TextConverter {
    fn sub_type(&self) -> &'static str {
        "txt"
    }

    fn convert_to(
        &self,
        target_type_label: &str,
        target_sub_type: &str,
        source: &[u8],
    ) -> Result<Vec<u8>, MorphError> {
        check_target("txt", target_type_label, target_sub_type)?;
        let text = std::str::from_utf8(source)
            .map_err(|e| MorphError::conversion("txt", target_sub_type, e))?;
        let paragraphs = paragraphs(text);

        let result = match target_sub_type {
            "pdf" => {
                let pdfium = self.runtime.pdfium("txt", "pdf")?;
                pdf::text_to_pdf(pdfium, &paragraphs, self.runtime.config())
            }
            "docx" => docx::write_docx(&paragraphs),
            other => Err(format!("no codec writes '{other}' from text")),
        };
        result.map_err(|e| MorphError::conversion("txt", target_sub_type, e))
    }
}
