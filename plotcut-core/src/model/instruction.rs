//! Line-level view of a G-code document.

use crate::config::COMMENT_MARKER;

/// A single G-code line, classified.
///
/// Borrowed slices are already trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionLine<'a> {
    /// Empty or whitespace-only line.
    Blank,
    /// Full-line comment, marker included.
    Comment(&'a str),
    /// Command, with the text after the first comment marker if present.
    Command {
        code: &'a str,
        comment: Option<&'a str>,
    },
}

impl<'a> InstructionLine<'a> {
    /// Classify a raw line.
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();

        if line.is_empty() {
            return InstructionLine::Blank;
        }
        if line.starts_with(COMMENT_MARKER) {
            return InstructionLine::Comment(line);
        }

        match line.split_once(COMMENT_MARKER) {
            Some((code, comment)) => InstructionLine::Command {
                code: code.trim(),
                comment: Some(comment.trim()),
            },
            None => InstructionLine::Command {
                code: line,
                comment: None,
            },
        }
    }

    /// Check if this line carries a command.
    pub fn is_command(&self) -> bool {
        matches!(self, InstructionLine::Command { .. })
    }
}

/// Count the lines of a document that are neither blank nor comments.
///
/// Used to report the size of generated output. This is deliberately not
/// the validator's line count, which counts every line.
pub fn count_instruction_lines(text: &str) -> usize {
    text.lines()
        .filter(|line| InstructionLine::parse(line).is_command())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_blank() {
        assert_eq!(InstructionLine::parse(""), InstructionLine::Blank);
        assert_eq!(InstructionLine::parse("   \t"), InstructionLine::Blank);
        assert_eq!(InstructionLine::parse("\r"), InstructionLine::Blank);
    }

    #[test]
    fn test_parse_comment() {
        assert_eq!(
            InstructionLine::parse("  ; pen up  "),
            InstructionLine::Comment("; pen up")
        );
    }

    #[test]
    fn test_parse_command_with_comment() {
        assert_eq!(
            InstructionLine::parse(" G1 X10 Y10 ;move ; again"),
            InstructionLine::Command {
                code: "G1 X10 Y10",
                comment: Some("move ; again"),
            }
        );
    }

    #[test]
    fn test_parse_command_empty_comment() {
        assert_eq!(
            InstructionLine::parse("G28;"),
            InstructionLine::Command {
                code: "G28",
                comment: Some(""),
            }
        );
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(
            InstructionLine::parse("M3 S1000\r"),
            InstructionLine::Command {
                code: "M3 S1000",
                comment: None,
            }
        );
    }

    #[test]
    fn test_count_instruction_lines() {
        let text = "; header\nG21\n\nG90 ; absolute\n   \nG0 X0 Y0\n;end\n";
        assert_eq!(count_instruction_lines(text), 3);
        assert_eq!(count_instruction_lines(""), 0);
    }

    #[test]
    fn test_count_ignores_validity() {
        // Malformed commands still count.
        assert_eq!(count_instruction_lines("X10\nG\nhello"), 3);
    }
}
