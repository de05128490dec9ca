//! Conversion requests, results and the names derived from them.

use crate::config::{
    ARCHIVE_EXT, DRAWING_EXT, EXCHANGE_EXT, FALLBACK_UPLOAD_NAME, INSTRUCTIONS_EXT,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Format of the uploaded source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// SVG drawing, fed straight to the generator.
    Drawing,
    /// DXF exchange file, converted to a drawing first.
    Exchange,
}

impl SourceFormat {
    /// Parse from a file type tag or extension (`svg`, `dxf`).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            DRAWING_EXT | "drawing" => Some(SourceFormat::Drawing),
            EXCHANGE_EXT | "exchange" => Some(SourceFormat::Exchange),
            _ => None,
        }
    }

    /// Infer the format from a file name's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_tag)
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::Drawing => write!(f, "{}", DRAWING_EXT),
            SourceFormat::Exchange => write!(f, "{}", EXCHANGE_EXT),
        }
    }
}

/// One conversion call.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Raw uploaded file content.
    pub source: Vec<u8>,
    pub format: SourceFormat,
    /// Caller's file name. Sanitized before use.
    pub output_name: String,
}

impl ConversionRequest {
    pub fn new(
        source: impl Into<Vec<u8>>,
        format: SourceFormat,
        output_name: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            format,
            output_name: output_name.into(),
        }
    }

    /// File name the upload is stored under inside a workspace.
    pub fn upload_name(&self) -> String {
        sanitize_filename(&self.output_name)
    }
}

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Request rejected before any collaborator ran.
    Input,
    /// Exchange to drawing.
    Normalize,
    /// Drawing to instructions.
    Instructions,
    /// Instructions to archive.
    Package,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Input => write!(f, "input"),
            Stage::Normalize => write!(f, "normalize"),
            Stage::Instructions => write!(f, "instructions"),
            Stage::Package => write!(f, "package"),
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Generated G-code text.
    Instructions(String),
    /// Packaged 3MF archive.
    Archive { file_name: String, bytes: Vec<u8> },
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionResult {
    Success {
        artifact: Artifact,
        /// Non-blank, non-comment lines in the generated instructions.
        line_count: usize,
    },
    Failure { stage: Stage, message: String },
}

impl ConversionResult {
    pub fn failure(stage: Stage, message: impl Into<String>) -> Self {
        ConversionResult::Failure {
            stage,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ConversionResult::Success { .. })
    }

    /// Stage that failed, if any.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            ConversionResult::Success { .. } => None,
            ConversionResult::Failure { stage, .. } => Some(*stage),
        }
    }
}

/// Reduce an uploaded file name to a safe single path component.
///
/// Path separators become spaces, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9_.-]` is dropped and leading/trailing `.`/`_` are
/// stripped.
pub fn sanitize_filename(name: &str) -> String {
    let spaced = name.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');

    if trimmed.is_empty() {
        FALLBACK_UPLOAD_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Name of the drawing produced from an exchange upload.
///
/// `part.dxf` becomes `part.svg`. Never equal to `upload_name`.
pub fn drawing_name(upload_name: &str) -> String {
    let name = replace_or_append(upload_name, EXCHANGE_EXT, DRAWING_EXT);
    if name == upload_name {
        let stem = strip_ext(upload_name, DRAWING_EXT).unwrap_or(upload_name);
        format!("{}.converted.{}", stem, DRAWING_EXT)
    } else {
        name
    }
}

/// Name of the archive for a request or instruction file name.
///
/// `plot.gcode` becomes `plot.3mf`, anything else gets `.3mf` appended.
pub fn archive_name(name: &str) -> String {
    let name = sanitize_filename(name);
    match strip_ext(&name, INSTRUCTIONS_EXT) {
        Some(stem) => format!("{}.{}", stem, ARCHIVE_EXT),
        None => format!("{}.{}", name, ARCHIVE_EXT),
    }
}

fn strip_ext<'a>(name: &'a str, ext: &str) -> Option<&'a str> {
    let (stem, found) = name.rsplit_once('.')?;
    (found.eq_ignore_ascii_case(ext) && !stem.is_empty()).then_some(stem)
}

fn replace_or_append(name: &str, from: &str, to: &str) -> String {
    match strip_ext(name, from) {
        Some(stem) => format!("{}.{}", stem, to),
        None => {
            let stem = Path::new(name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(name);
            format!("{}.{}", stem, to)
        }
    }
}
