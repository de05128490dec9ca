//! Configuration constants and settings for the converter.

use crate::error::ResourceError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// G-code comment marker.
pub const COMMENT_MARKER: char = ';';

/// Column at which inline comments are aligned by the formatter.
pub const COMMENT_COLUMN: usize = 20;

/// Characters a G-code command line may start with.
pub const COMMAND_PREFIXES: [char; 4] = ['G', 'M', 'T', 'N'];

/// Command prefixes that must be followed by a command number.
pub const NUMBERED_PREFIXES: [char; 2] = ['G', 'M'];

/// Prefix for workspace directory names.
pub const WORKSPACE_PREFIX: &str = "plotcut-";

/// Instruction file produced by the generate stage.
pub const INSTRUCTIONS_FILE: &str = "output.gcode";

/// Instruction file written when packaging caller-supplied text.
pub const PACKAGE_INPUT_FILE: &str = "temp_plot.gcode";

/// Cutting parameters rendered for external generators.
///
/// `sanitize_filename` strips leading underscores, so no upload or derived
/// name can land on this file.
pub const PARAMS_FILE: &str = "_cutting_parameters.json";

/// Fallback name for uploads whose name sanitizes to nothing.
pub const FALLBACK_UPLOAD_NAME: &str = "upload";

/// Default packaging template, relative to the working directory.
pub const DEFAULT_TEMPLATE: &str = "template.3mf";

/// Drawing extension.
pub const DRAWING_EXT: &str = "svg";

/// Exchange format extension.
pub const EXCHANGE_EXT: &str = "dxf";

/// Instruction file extension.
pub const INSTRUCTIONS_EXT: &str = "gcode";

/// Archive extension.
pub const ARCHIVE_EXT: &str = "3mf";

/// Which corner of the drawing maps to the machine origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[default]
    TopLeft,
    BottomLeft,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::TopLeft => write!(f, "top-left"),
            Origin::BottomLeft => write!(f, "bottom-left"),
        }
    }
}

/// Parameters handed to the toolpath generator.
///
/// The defaults are tuned for pen and blade plotting: no Z depth to speak of,
/// no knife offset, top-left origin with the Y axis mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CuttingParameters {
    /// Material thickness in mm.
    pub material_thickness: f64,
    /// Feed rate while cutting, mm/min.
    pub cutting_speed: f64,
    /// Feed rate for travel moves, mm/min.
    pub movement_speed: f64,
    /// Join adjacent paths into continuous cuts.
    pub join_paths: bool,
    /// Tool (knife) offset in mm.
    pub tool_offset: f64,
    pub origin: Origin,
    /// Mirror the Y axis.
    pub mirror_y: bool,
}

impl Default for CuttingParameters {
    fn default() -> Self {
        Self {
            material_thickness: 5.0,
            cutting_speed: 1000.0,
            movement_speed: 3000.0,
            join_paths: true,
            tool_offset: 0.0,
            origin: Origin::TopLeft,
            mirror_y: true,
        }
    }
}

/// An external program bound to one collaborator role.
///
/// Arguments may contain the placeholders `{input}`, `{output}`,
/// `{template}` and `{params}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Pipeline configuration, loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Packaging template archive.
    pub template: PathBuf,
    /// Parent directory for workspaces (system temp dir when unset).
    pub workspace_root: Option<PathBuf>,
    /// Per-invocation limit for external tools, in seconds.
    pub tool_timeout_secs: Option<u64>,
    /// DXF to SVG converter.
    pub exchange_converter: Option<ToolCommand>,
    /// SVG to G-code generator.
    pub toolpath_generator: Option<ToolCommand>,
    /// G-code to 3MF packager.
    pub archive_packager: Option<ToolCommand>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from(DEFAULT_TEMPLATE),
            workspace_root: None,
            tool_timeout_secs: None,
            exchange_converter: None,
            toolpath_generator: None,
            archive_packager: None,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ResourceError> {
        let content = std::fs::read_to_string(path).map_err(|source| ResourceError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|e| ResourceError::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load a configuration file if it exists, otherwise use defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ResourceError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse configuration from JSON text.
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    /// Tool timeout as a duration.
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }
}
