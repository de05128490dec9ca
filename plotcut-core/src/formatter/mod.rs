//! G-code formatting module.

mod format;

pub use format::{format_instructions, format_line};
