//! Error types for the conversion pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Error codes for conversion processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Required resource missing (-1)
    ResourceMissing = -1,
    /// Configuration could not be read (-2)
    BadConfig = -2,
    /// Workspace could not be created or cleaned (-3)
    Workspace = -3,
    /// Converter or generator failed (E100)
    Conversion = 100,
    /// Collaborator timed out (E101)
    Timeout = 101,
    /// Packager failed (E200)
    Packaging = 200,
}

/// A stage could not produce valid output from its input.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("{tool} did not produce {path}")]
    MissingOutput { tool: String, path: PathBuf },

    #[error("{tool} timed out after {secs}s")]
    TimedOut { tool: String, secs: u64 },

    #[error("No {role} configured")]
    NotConfigured { role: &'static str },

    #[error("{0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The packaging stage could not assemble the archive.
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Template file not found: {path}")]
    TemplateMissing { path: PathBuf },

    #[error("Instructions unreadable: {path}")]
    InstructionsUnreadable { path: PathBuf },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("{tool} did not produce {path}")]
    MissingOutput { tool: String, path: PathBuf },

    #[error("{tool} timed out after {secs}s")]
    TimedOut { tool: String, secs: u64 },

    #[error("No archive packager configured")]
    NotConfigured,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A required static resource is absent or unusable.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Template file not found: {path}")]
    TemplateMissing { path: PathBuf },

    #[error("Cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },
}

/// Temporary state could not be created or fully removed.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Failed to create workspace: {0}")]
    Create(#[source] std::io::Error),

    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure outside any pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl ConversionError {
    /// Get the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ConversionError::TimedOut { .. } => ErrorCode::Timeout,
            _ => ErrorCode::Conversion,
        }
    }
}

impl PackagingError {
    /// Get the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            PackagingError::TemplateMissing { .. } => ErrorCode::ResourceMissing,
            PackagingError::TimedOut { .. } => ErrorCode::Timeout,
            _ => ErrorCode::Packaging,
        }
    }
}

impl PipelineError {
    /// Get the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            PipelineError::Resource(ResourceError::InvalidConfig { .. }) => ErrorCode::BadConfig,
            PipelineError::Resource(_) => ErrorCode::ResourceMissing,
            PipelineError::Workspace(_) => ErrorCode::Workspace,
        }
    }

    /// Get the numeric error code value.
    pub fn code_value(&self) -> i32 {
        self.code() as i32
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
