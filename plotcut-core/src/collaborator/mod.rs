//! Contracts for the external conversion steps.
//!
//! The pipeline never converts geometry or builds archives itself; it hands
//! file paths to these collaborators and reports what they return.

mod external;

pub use external::ExternalTool;

use crate::config::CuttingParameters;
use crate::error::{ConversionError, PackagingError};
use std::path::{Path, PathBuf};

/// Converts a DXF exchange file to an SVG drawing.
pub trait ExchangeConverter: Send + Sync {
    /// Convert `input` and return the path of the drawing, normally `output`.
    fn exchange_to_drawing(&self, input: &Path, output: &Path) -> Result<PathBuf, ConversionError>;
}

/// Generates G-code from an SVG drawing.
pub trait ToolpathGenerator: Send + Sync {
    /// Write G-code for `drawing` to `output` and return the text.
    fn drawing_to_instructions(
        &self,
        drawing: &Path,
        params: &CuttingParameters,
        output: &Path,
    ) -> Result<String, ConversionError>;
}

/// Packages G-code into a printer-loadable 3MF archive.
pub trait ArchivePackager: Send + Sync {
    /// Build `output` from `template` and the G-code at `instructions`.
    fn instructions_to_archive(
        &self,
        template: &Path,
        output: &Path,
        instructions: &Path,
    ) -> Result<(), PackagingError>;
}

/// Stand-in for a collaborator role nobody configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

impl ExchangeConverter for Unconfigured {
    fn exchange_to_drawing(
        &self,
        _input: &Path,
        _output: &Path,
    ) -> Result<PathBuf, ConversionError> {
        Err(ConversionError::NotConfigured {
            role: "exchange converter",
        })
    }
}

impl ToolpathGenerator for Unconfigured {
    fn drawing_to_instructions(
        &self,
        _drawing: &Path,
        _params: &CuttingParameters,
        _output: &Path,
    ) -> Result<String, ConversionError> {
        Err(ConversionError::NotConfigured {
            role: "toolpath generator",
        })
    }
}

impl ArchivePackager for Unconfigured {
    fn instructions_to_archive(
        &self,
        _template: &Path,
        _output: &Path,
        _instructions: &Path,
    ) -> Result<(), PackagingError> {
        Err(PackagingError::NotConfigured)
    }
}
