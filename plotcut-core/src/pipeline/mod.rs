//! Conversion pipeline: DXF → SVG → G-code → 3MF.
//!
//! Each stage hands the next one a file path inside a per-request
//! [`Workspace`]. The first failing stage ends the run and is reported as
//! [`ConversionResult::Failure`]; nothing is retried. The workspace is
//! released on every exit path.

mod timeout;

pub use timeout::run_with_timeout;

use crate::collaborator::{
    ArchivePackager, ExchangeConverter, ExternalTool, ToolpathGenerator, Unconfigured,
};
use crate::config::{
    CuttingParameters, PipelineConfig, ToolCommand, INSTRUCTIONS_EXT, INSTRUCTIONS_FILE,
    PACKAGE_INPUT_FILE,
};
use crate::error::{ResourceError, Result};
use crate::model::{
    archive_name, count_instruction_lines, drawing_name, Artifact, ConversionRequest,
    ConversionResult, SourceFormat, Stage,
};
use crate::workspace::Workspace;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How far a conversion goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    /// Stop after generating G-code.
    #[default]
    Instructions,
    /// Package the G-code into a 3MF archive.
    Archive,
}

/// A stage that did not complete.
#[derive(Debug)]
struct StageFailure {
    stage: Stage,
    message: String,
}

impl StageFailure {
    fn new(stage: Stage, cause: impl std::fmt::Display) -> Self {
        Self {
            stage,
            message: cause.to_string(),
        }
    }
}

impl From<StageFailure> for ConversionResult {
    fn from(failure: StageFailure) -> Self {
        ConversionResult::Failure {
            stage: failure.stage,
            message: failure.message,
        }
    }
}

/// Orchestrates the external conversion steps.
///
/// Holds no per-request state; share it behind an `Arc` to serve
/// concurrent requests.
pub struct Pipeline {
    converter: Box<dyn ExchangeConverter>,
    generator: Box<dyn ToolpathGenerator>,
    packager: Box<dyn ArchivePackager>,
    params: CuttingParameters,
    template: PathBuf,
    workspace_root: Option<PathBuf>,
}

impl Pipeline {
    /// Create a pipeline from its collaborators.
    pub fn new(
        converter: impl ExchangeConverter + 'static,
        generator: impl ToolpathGenerator + 'static,
        packager: impl ArchivePackager + 'static,
    ) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            converter: Box::new(converter),
            generator: Box::new(generator),
            packager: Box::new(packager),
            params: CuttingParameters::default(),
            template: defaults.template,
            workspace_root: defaults.workspace_root,
        }
    }

    /// Create a pipeline that runs the configured external tools.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let timeout = config.tool_timeout();
        let tool = |command: &Option<ToolCommand>| {
            command
                .clone()
                .map(|c| ExternalTool::new(c).with_timeout(timeout))
        };

        let converter: Box<dyn ExchangeConverter> = match tool(&config.exchange_converter) {
            Some(t) => Box::new(t),
            None => Box::new(Unconfigured),
        };
        let generator: Box<dyn ToolpathGenerator> = match tool(&config.toolpath_generator) {
            Some(t) => Box::new(t),
            None => Box::new(Unconfigured),
        };
        let packager: Box<dyn ArchivePackager> = match tool(&config.archive_packager) {
            Some(t) => Box::new(t),
            None => Box::new(Unconfigured),
        };

        Self {
            converter,
            generator,
            packager,
            params: CuttingParameters::default(),
            template: config.template.clone(),
            workspace_root: config.workspace_root.clone(),
        }
    }

    /// Set the packaging template.
    pub fn with_template(mut self, template: impl Into<PathBuf>) -> Self {
        self.template = template.into();
        self
    }

    /// Create workspaces under `root` instead of the system temp dir.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Packaging template path.
    pub fn template(&self) -> &Path {
        &self.template
    }

    /// Convert a drawing or exchange file to G-code.
    pub fn run(&self, request: &ConversionRequest) -> Result<ConversionResult> {
        self.run_target(request, Target::Instructions)
    }

    /// Convert a drawing or exchange file all the way to a 3MF archive.
    pub fn run_to_archive(&self, request: &ConversionRequest) -> Result<ConversionResult> {
        self.run_target(request, Target::Archive)
    }

    /// Convert up to `target`.
    ///
    /// Returns `Err` only for problems outside any stage: a missing
    /// template or a workspace that cannot be created.
    pub fn run_target(
        &self,
        request: &ConversionRequest,
        target: Target,
    ) -> Result<ConversionResult> {
        self.run_observed(request, target, &|_| {})
    }

    /// Package existing G-code text into a 3MF archive.
    pub fn package(&self, instructions: &str, output_name: &str) -> Result<ConversionResult> {
        if instructions.trim().is_empty() {
            return Ok(ConversionResult::failure(Stage::Input, "No G-code to convert"));
        }
        self.check_template()?;

        let mut workspace = Workspace::acquire_in(self.workspace_root.as_deref())?;
        let result = self
            .package_text(&mut workspace, instructions, output_name)
            .unwrap_or_else(ConversionResult::from);
        workspace.release();

        log_outcome(&result);
        Ok(result)
    }

    pub(crate) fn run_observed(
        &self,
        request: &ConversionRequest,
        target: Target,
        on_stage: &dyn Fn(Stage),
    ) -> Result<ConversionResult> {
        if request.source.is_empty() {
            return Ok(ConversionResult::failure(Stage::Input, "Empty source payload"));
        }
        if target == Target::Archive {
            self.check_template()?;
        }

        let mut workspace = Workspace::acquire_in(self.workspace_root.as_deref())?;
        info!(
            "Converting {} ({}) in {}",
            request.output_name,
            request.format,
            workspace.path().display()
        );

        let result = self
            .execute(&mut workspace, request, target, on_stage)
            .unwrap_or_else(ConversionResult::from);
        workspace.release();

        log_outcome(&result);
        Ok(result)
    }

    fn check_template(&self) -> std::result::Result<(), ResourceError> {
        if self.template.is_file() {
            Ok(())
        } else {
            Err(ResourceError::TemplateMissing {
                path: self.template.clone(),
            })
        }
    }

    fn execute(
        &self,
        workspace: &mut Workspace,
        request: &ConversionRequest,
        target: Target,
        on_stage: &dyn Fn(Stage),
    ) -> std::result::Result<ConversionResult, StageFailure> {
        on_stage(Stage::Normalize);
        let drawing = self.normalize(workspace, request)?;

        on_stage(Stage::Instructions);
        let (gcode_path, gcode) = self.generate(workspace, &drawing)?;
        let line_count = count_instruction_lines(&gcode);

        let artifact = match target {
            Target::Instructions => Artifact::Instructions(gcode),
            Target::Archive => {
                on_stage(Stage::Package);
                let name = archive_name(&replace_ext(&request.upload_name(), INSTRUCTIONS_EXT));
                self.package_file(workspace, &gcode_path, &name)?
            }
        };

        Ok(ConversionResult::Success {
            artifact,
            line_count,
        })
    }

    fn normalize(
        &self,
        workspace: &mut Workspace,
        request: &ConversionRequest,
    ) -> std::result::Result<PathBuf, StageFailure> {
        let upload_name = request.upload_name();
        let upload = workspace.write(&upload_name, &request.source).map_err(|e| {
            StageFailure::new(Stage::Normalize, format!("Failed to store upload: {}", e))
        })?;

        match request.format {
            SourceFormat::Drawing => {
                debug!("Using uploaded drawing {}", upload.display());
                Ok(upload)
            }
            SourceFormat::Exchange => {
                let output = workspace.file(&drawing_name(&upload_name));
                info!("Converting exchange file to drawing");
                let drawing = self
                    .converter
                    .exchange_to_drawing(&upload, &output)
                    .map_err(|e| StageFailure::new(Stage::Normalize, e))?;
                if drawing != output {
                    if drawing.parent() != Some(workspace.path()) {
                        return Err(StageFailure::new(
                            Stage::Normalize,
                            format!(
                                "Converter wrote {} outside the workspace",
                                drawing.display()
                            ),
                        ));
                    }
                    // Track whatever the converter chose so it is cleaned up.
                    if let Some(name) = drawing.file_name().and_then(|n| n.to_str()) {
                        workspace.file(name);
                    }
                }
                Ok(drawing)
            }
        }
    }

    fn generate(
        &self,
        workspace: &mut Workspace,
        drawing: &Path,
    ) -> std::result::Result<(PathBuf, String), StageFailure> {
        let name = if drawing.file_name().is_some_and(|n| n == INSTRUCTIONS_FILE) {
            format!("generated.{}", INSTRUCTIONS_EXT)
        } else {
            INSTRUCTIONS_FILE.to_string()
        };
        let output = workspace.file(&name);

        info!("Generating G-code from {}", drawing.display());
        let gcode = self
            .generator
            .drawing_to_instructions(drawing, &self.params, &output)
            .map_err(|e| StageFailure::new(Stage::Instructions, e))?;

        Ok((output, gcode))
    }

    fn package_file(
        &self,
        workspace: &mut Workspace,
        gcode: &Path,
        archive: &str,
    ) -> std::result::Result<Artifact, StageFailure> {
        let output = workspace.file(archive);

        info!("Packaging {} into {}", gcode.display(), archive);
        self.packager
            .instructions_to_archive(&self.template, &output, gcode)
            .map_err(|e| StageFailure::new(Stage::Package, e))?;

        let bytes = std::fs::read(&output).map_err(|e| {
            StageFailure::new(Stage::Package, format!("Failed to read {}: {}", archive, e))
        })?;

        Ok(Artifact::Archive {
            file_name: archive.to_string(),
            bytes,
        })
    }

    fn package_text(
        &self,
        workspace: &mut Workspace,
        instructions: &str,
        output_name: &str,
    ) -> std::result::Result<ConversionResult, StageFailure> {
        let gcode = workspace.write(PACKAGE_INPUT_FILE, instructions).map_err(|e| {
            StageFailure::new(Stage::Package, format!("Failed to store G-code: {}", e))
        })?;
        let artifact = self.package_file(workspace, &gcode, &archive_name(output_name))?;

        Ok(ConversionResult::Success {
            artifact,
            line_count: count_instruction_lines(instructions),
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("params", &self.params)
            .field("template", &self.template)
            .field("workspace_root", &self.workspace_root)
            .finish_non_exhaustive()
    }
}

fn replace_ext(name: &str, ext: &str) -> String {
    Path::new(name).with_extension(ext).to_string_lossy().into_owned()
}

fn log_outcome(result: &ConversionResult) {
    match result {
        ConversionResult::Success { line_count, .. } => {
            info!("Conversion finished: {} G-code lines", line_count)
        }
        ConversionResult::Failure { stage, message } => {
            warn!("Conversion failed at {} stage: {}", stage, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConversionError, PipelineError};
    use pretty_assertions::assert_eq;

    struct CopyConverter;

    impl ExchangeConverter for CopyConverter {
        fn exchange_to_drawing(
            &self,
            input: &Path,
            output: &Path,
        ) -> std::result::Result<PathBuf, ConversionError> {
            std::fs::copy(input, output)?;
            Ok(output.to_path_buf())
        }
    }

    struct FixedGenerator(&'static str);

    impl ToolpathGenerator for FixedGenerator {
        fn drawing_to_instructions(
            &self,
            drawing: &Path,
            _params: &CuttingParameters,
            output: &Path,
        ) -> std::result::Result<String, ConversionError> {
            assert_ne!(drawing, output);
            std::fs::write(output, self.0)?;
            Ok(self.0.to_string())
        }
    }

    /// Writes its drawing next to the workspace instead of into it.
    struct StrayConverter(PathBuf);

    impl ExchangeConverter for StrayConverter {
        fn exchange_to_drawing(
            &self,
            _input: &Path,
            _output: &Path,
        ) -> std::result::Result<PathBuf, ConversionError> {
            std::fs::write(&self.0, "<svg/>")?;
            Ok(self.0.clone())
        }
    }

    /// Leaves a directory where the G-code file was reserved.
    struct DirectoryGenerator;

    impl ToolpathGenerator for DirectoryGenerator {
        fn drawing_to_instructions(
            &self,
            _drawing: &Path,
            _params: &CuttingParameters,
            output: &Path,
        ) -> std::result::Result<String, ConversionError> {
            std::fs::create_dir(output)?;
            std::fs::write(output.join("part.gcode"), "G21\n")?;
            Ok("G21\nG0 X0 Y0\n".to_string())
        }
    }

    #[test]
    fn test_replace_ext() {
        assert_eq!(replace_ext("logo.svg", "gcode"), "logo.gcode");
        assert_eq!(replace_ext("logo", "gcode"), "logo.gcode");
    }

    #[test]
    fn test_run_drawing() {
        let base = tempfile::tempdir().unwrap();
        let generator = FixedGenerator("; plot\nG21\n\nG0 X0 Y0\n");
        let pipeline =
            Pipeline::new(Unconfigured, generator, Unconfigured).with_workspace_root(base.path());

        let request = ConversionRequest::new("<svg/>", SourceFormat::Drawing, "logo.svg");
        let result = pipeline.run(&request).unwrap();

        assert_eq!(
            result,
            ConversionResult::Success {
                artifact: Artifact::Instructions("; plot\nG21\n\nG0 X0 Y0\n".to_string()),
                line_count: 2,
            }
        );
        assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_run_exchange_unconfigured() {
        let pipeline = Pipeline::new(Unconfigured, FixedGenerator("G21\n"), Unconfigured);
        let request = ConversionRequest::new("0\nEOF\n", SourceFormat::Exchange, "part.dxf");
        let result = pipeline.run(&request).unwrap();

        assert_eq!(
            result,
            ConversionResult::failure(Stage::Normalize, "No exchange converter configured")
        );
    }

    #[test]
    fn test_run_exchange_converts_first() {
        let pipeline = Pipeline::new(CopyConverter, FixedGenerator("G21\n"), Unconfigured);
        let request = ConversionRequest::new("0\nEOF\n", SourceFormat::Exchange, "part.dxf");
        assert!(pipeline.run(&request).unwrap().is_success());
    }

    #[test]
    fn test_run_exchange_drawing_outside_workspace() {
        let base = tempfile::tempdir().unwrap();
        let work = base.path().join("work");
        std::fs::create_dir(&work).unwrap();
        let stray = base.path().join("part.svg");
        let pipeline = Pipeline::new(
            StrayConverter(stray.clone()),
            FixedGenerator("G21\n"),
            Unconfigured,
        )
        .with_workspace_root(&work);

        let request = ConversionRequest::new("0\nEOF\n", SourceFormat::Exchange, "part.dxf");
        let result = pipeline.run(&request).unwrap();

        assert_eq!(result.failed_stage(), Some(Stage::Normalize));
        if let ConversionResult::Failure { message, .. } = &result {
            assert!(message.contains("outside the workspace"), "{}", message);
        }
        assert_eq!(std::fs::read_dir(&work).unwrap().count(), 0);
    }

    #[test]
    fn test_cleanup_failure_keeps_result() {
        let base = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(Unconfigured, DirectoryGenerator, Unconfigured)
            .with_workspace_root(base.path());

        let request = ConversionRequest::new("<svg/>", SourceFormat::Drawing, "logo.svg");
        let result = pipeline.run(&request).unwrap();

        assert_eq!(
            result,
            ConversionResult::Success {
                artifact: Artifact::Instructions("G21\nG0 X0 Y0\n".to_string()),
                line_count: 2,
            }
        );
        assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_run_empty_payload() {
        let pipeline = Pipeline::new(Unconfigured, Unconfigured, Unconfigured);
        let request = ConversionRequest::new(Vec::new(), SourceFormat::Drawing, "logo.svg");
        let result = pipeline.run(&request).unwrap();
        assert_eq!(result.failed_stage(), Some(Stage::Input));
    }

    #[test]
    fn test_archive_requires_template() {
        let pipeline = Pipeline::new(Unconfigured, FixedGenerator("G21\n"), Unconfigured)
            .with_template("/nonexistent/template.3mf");
        let request = ConversionRequest::new("<svg/>", SourceFormat::Drawing, "logo.svg");

        let err = pipeline.run_to_archive(&request).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Resource(ResourceError::TemplateMissing { .. })
        ));
    }

    #[test]
    fn test_package_empty_text() {
        let pipeline = Pipeline::new(Unconfigured, Unconfigured, Unconfigured)
            .with_template("/nonexistent/template.3mf");
        let result = pipeline.package("  \n\n", "plot.gcode").unwrap();
        assert_eq!(result, ConversionResult::failure(Stage::Input, "No G-code to convert"));
    }

    #[test]
    fn test_generated_name_avoids_upload() {
        let base = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(Unconfigured, FixedGenerator("G21\n"), Unconfigured)
            .with_workspace_root(base.path());
        let request = ConversionRequest::new("<svg/>", SourceFormat::Drawing, "output.gcode");
        assert!(pipeline.run(&request).unwrap().is_success());
    }
}
