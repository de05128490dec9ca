//! Data model types for G-code documents and conversion requests.

mod instruction;
mod request;

pub use instruction::{count_instruction_lines, InstructionLine};
pub use request::{
    archive_name, drawing_name, sanitize_filename, Artifact, ConversionRequest, ConversionResult,
    SourceFormat, Stage,
};
