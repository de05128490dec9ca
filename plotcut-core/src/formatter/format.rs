//! G-code formatting: trims lines and aligns inline comments.

use crate::config::{COMMENT_COLUMN, COMMENT_MARKER};
use crate::model::InstructionLine;

/// Format a single line.
///
/// Commands with an inline comment are padded to [`COMMENT_COLUMN`] so the
/// comments line up. Long commands are never cut short.
pub fn format_line(line: &str) -> String {
    match InstructionLine::parse(line) {
        InstructionLine::Blank => String::new(),
        InstructionLine::Comment(comment) => comment.to_string(),
        InstructionLine::Command {
            code,
            comment: Some(comment),
        } => format!(
            "{:<width$} {} {}",
            code,
            COMMENT_MARKER,
            comment,
            width = COMMENT_COLUMN
        ),
        InstructionLine::Command { code, comment: None } => code.to_string(),
    }
}

/// Format a G-code document.
///
/// Line order and line count are preserved, including a trailing newline.
pub fn format_instructions(text: &str) -> String {
    text.split('\n').map(format_line).collect::<Vec<_>>().join("\n")
}
