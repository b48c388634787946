//! HTML fragment → normalized prose conversion.
//!
//! Pages arrive as raw HTML fragments. Each one is rewritten to Markdown
//! and then normalized: runs of blank lines are capped at two and the
//! document is trimmed. The transform is pure and safe to run on many
//! entries concurrently.

use html2md::rewrite_html as html_to_markdown;

use crate::error::{Error, Result};

/// Largest single fragment accepted for conversion.
pub const MAX_FRAGMENT_BYTES: usize = 8 * 1024 * 1024;

/// Maximum consecutive blank lines kept in converted output.
const MAX_BLANK_RUN: usize = 2;

/// Convert one HTML fragment to normalized text.
///
/// Empty or whitespace-only input yields an empty string.
pub fn convert(raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        return Ok(String::new());
    }

    if raw.len() > MAX_FRAGMENT_BYTES {
        return Err(Error::Conversion(format!(
            "fragment of {} bytes exceeds limit of {} bytes",
            raw.len(),
            MAX_FRAGMENT_BYTES
        )));
    }

    if raw.contains('\0') {
        return Err(Error::Conversion("fragment contains NUL bytes".to_string()));
    }

    let markdown = html_to_markdown(raw, true);
    Ok(collapse_blank_lines(&markdown))
}

/// Cap blank-line runs at [`MAX_BLANK_RUN`] and trim the whole document.
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut blank_run = 0usize;

    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run <= MAX_BLANK_RUN {
                out.push("");
            }
        } else {
            blank_run = 0;
            out.push(line);
        }
    }

    out.join("\n").trim().to_string()
}
