//! Structural validation of G-code text.

use crate::config::{COMMAND_PREFIXES, NUMBERED_PREFIXES};
use crate::model::InstructionLine;
use serde::Serialize;

/// A problem found on one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// 1-based line number.
    pub line_number: usize,
    pub message: String,
}

impl ValidationIssue {
    fn new(line_number: usize, message: impl Into<String>) -> Self {
        Self {
            line_number,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line_number, self.message)
    }
}

/// Validation report for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Whether validation passed.
    pub is_valid: bool,
    /// Error messages, in line order.
    pub errors: Vec<ValidationIssue>,
    /// Warning messages. Nothing produces warnings yet.
    pub warnings: Vec<ValidationIssue>,
    /// Number of lines scanned, blank and comment lines included.
    pub line_count: usize,
}

impl ValidationReport {
    /// Error messages rendered as `Line N: ...`.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Validate G-code text line by line.
///
/// Problems are reported in the returned value; scanning never stops at
/// the first bad line.
pub fn validate_instructions(text: &str) -> ValidationReport {
    let mut errors = Vec::new();
    let mut line_count = 0;

    for (idx, raw) in text.lines().enumerate() {
        let line_number = idx + 1;
        line_count = line_number;

        let code = match InstructionLine::parse(raw) {
            InstructionLine::Command { code, .. } => code,
            InstructionLine::Blank | InstructionLine::Comment(_) => continue,
        };

        let mut chars = code.chars();
        let Some(first) = chars.next() else {
            continue;
        };
        let prefix = first.to_ascii_uppercase();

        if !COMMAND_PREFIXES.contains(&prefix) {
            errors.push(ValidationIssue::new(
                line_number,
                format!("Invalid command start '{}'", first),
            ));
            continue;
        }

        if NUMBERED_PREFIXES.contains(&prefix)
            && !chars.next().is_some_and(|c| c.is_ascii_digit())
        {
            errors.push(ValidationIssue::new(line_number, "Missing command number"));
        }
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings: Vec::new(),
        line_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validate_mixed_document() {
        let report = validate_instructions("G1 X10 Y10 ; move\nG\n;comment\n");
        assert!(!report.is_valid);
        assert_eq!(report.line_count, 3);
        assert_eq!(report.error_messages(), vec!["Line 2: Missing command number"]);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_validate_report_json() {
        let report = validate_instructions("G1 X10 Y10 ; move\nGX\n;comment\n");
        insta::assert_json_snapshot!(report, @r###"
        {
          "is_valid": false,
          "errors": [
            {
              "line_number": 2,
              "message": "Missing command number"
            }
          ],
          "warnings": [],
          "line_count": 3
        }
        "###);
    }

    #[test]
    fn test_validate_zero_is_a_command_number() {
        let report = validate_instructions("G1 X10 Y10 ; move\nG0\n;comment\n");
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
        assert_eq!(report.line_count, 3);
    }

    #[test]
    fn test_validate_clean_program() {
        let text = "; plot\nG21\nG90\nM3 S1000\nT1\nN10 G0 X0 Y0\ng1 x5 y5\nM5\n";
        let report = validate_instructions(text);
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
        assert_eq!(report.line_count, 8);
    }

    #[test]
    fn test_validate_empty_document() {
        let report = validate_instructions("");
        assert!(report.is_valid);
        assert_eq!(report.line_count, 0);
    }

    #[test]
    fn test_validate_invalid_start_continues() {
        let report = validate_instructions("X10 Y10\nM;\nhello ; there\nG1 X1");
        assert_eq!(
            report.error_messages(),
            vec![
                "Line 1: Invalid command start 'X'",
                "Line 2: Missing command number",
                "Line 3: Invalid command start 'h'",
            ]
        );
        assert_eq!(report.line_count, 4);
    }

    #[test]
    fn test_validate_one_error_per_bad_prefix_line() {
        // An unrecognized prefix skips the command number check.
        let report = validate_instructions("Q");
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].line_number, 1);
    }

    #[test]
    fn test_validate_unnumbered_prefixes_need_no_digit() {
        let report = validate_instructions("T\nN\nMx\ng");
        assert_eq!(
            report.error_messages(),
            vec!["Line 3: Missing command number", "Line 4: Missing command number"]
        );
    }

    #[test]
    fn test_validate_inline_comment_stripped() {
        // The comment would be invalid if it were inspected.
        let report = validate_instructions("  G28 ;X marks the spot");
        assert!(report.is_valid);
    }

    #[test]
    fn test_validate_crlf() {
        let report = validate_instructions("G21\r\nG\r\n");
        assert_eq!(report.line_count, 2);
        assert_eq!(report.error_messages(), vec!["Line 2: Missing command number"]);
    }

    #[test]
    fn test_validate_does_not_touch_input() {
        let text = String::from("Z1\n");
        let _ = validate_instructions(&text);
        assert_eq!(text, "Z1\n");
    }
}
