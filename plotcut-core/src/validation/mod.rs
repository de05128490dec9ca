//! G-code structural validation module.

mod validate;

pub use validate::{validate_instructions, ValidationIssue, ValidationReport};
