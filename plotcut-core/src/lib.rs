//! plotcut-core - G-code tooling and the drawing conversion pipeline.
//!
//! This library validates and formats G-code for pen and blade plotting, and
//! orchestrates the external tools that turn SVG/DXF drawings into G-code
//! and printer-loadable 3MF archives. Every conversion runs in its own
//! temporary [`Workspace`], which is removed whatever the outcome.
//!
//! # Example
//!
//! ```no_run
//! use plotcut_core::{ConversionRequest, Pipeline, PipelineConfig, SourceFormat};
//! use std::path::Path;
//!
//! let config = PipelineConfig::load_or_default(Path::new("plotcut.json")).unwrap();
//! let pipeline = Pipeline::from_config(&config);
//! let drawing = std::fs::read("logo.svg").unwrap();
//! let request = ConversionRequest::new(drawing, SourceFormat::Drawing, "logo.svg");
//! println!("{:?}", pipeline.run(&request).unwrap());
//! ```

pub mod collaborator;
pub mod config;
pub mod error;
pub mod formatter;
pub mod model;
pub mod pipeline;
pub mod service;
pub mod validation;
pub mod workspace;

// Re-exports for convenience
pub use collaborator::{ArchivePackager, ExchangeConverter, ExternalTool, ToolpathGenerator};
pub use config::{CuttingParameters, PipelineConfig, ToolCommand};
pub use error::{
    ConversionError, PackagingError, PipelineError, ResourceError, Result, WorkspaceError,
};
pub use formatter::format_instructions;
pub use model::{Artifact, ConversionRequest, ConversionResult, SourceFormat, Stage};
pub use pipeline::{run_with_timeout, Pipeline, Target};
pub use service::Service;
pub use validation::{validate_instructions, ValidationIssue, ValidationReport};
pub use workspace::{CleanupReport, Workspace};
