//! plotcut - CLI tool to validate, format and produce G-code for plotting.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use plotcut_core::{
    Artifact, ConversionRequest, ConversionResult, Pipeline, PipelineConfig, Service,
    SourceFormat, Target,
};

/// Convert SVG/DXF drawings to G-code and 3MF archives for pen and blade plotting.
#[derive(Parser, Debug)]
#[command(name = "plotcut")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pipeline configuration file (JSON)
    #[arg(short, long, global = true, default_value = "plotcut.json")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a G-code file for structural problems
    Validate {
        /// Input G-code file
        input: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Align comments and trim whitespace in a G-code file
    Format {
        /// Input G-code file
        input: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert an SVG or DXF drawing to G-code
    Convert {
        /// Input drawing
        input: PathBuf,

        /// Input format (inferred from the extension if omitted)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// Package the G-code into a 3MF archive
        #[arg(long)]
        archive: bool,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Package an existing G-code file into a 3MF archive
    Package {
        /// Input G-code file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Svg,
    Dxf,
}

impl From<FormatArg> for SourceFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Svg => SourceFormat::Drawing,
            FormatArg::Dxf => SourceFormat::Exchange,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = PipelineConfig::load_or_default(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let service = Service::new(Pipeline::from_config(&config));

    match args.command {
        Command::Validate { input, json } => validate(&service, &input, json),
        Command::Format { input, output } => format(&service, &input, output.as_deref()),
        Command::Convert {
            input,
            format,
            archive,
            output,
            timeout,
        } => convert(
            service.with_timeout(timeout.map(Duration::from_secs)),
            &input,
            format,
            archive,
            output,
        ),
        Command::Package { input, output } => package(&service, &input, output),
    }
}

fn validate(service: &Service, input: &Path, json: bool) -> Result<()> {
    let text = read_text(input)?;
    let report = service.validate_instructions(&text);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    for warning in &report.warnings {
        warn!("{}", warning);
    }

    for err in &report.errors {
        error!("{}", err);
    }

    if !report.is_valid {
        anyhow::bail!("Validation failed with {} error(s)", report.errors.len());
    }

    info!("Validation passed ({} lines)", report.line_count);
    Ok(())
}

fn format(service: &Service, input: &Path, output: Option<&Path>) -> Result<()> {
    let text = read_text(input)?;
    let formatted = service.format_instructions(&text);

    match output {
        Some(path) => {
            std::fs::write(path, &formatted)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Formatted: {}", path.display());
        }
        None => print!("{}", formatted),
    }

    Ok(())
}

fn convert(
    service: Service,
    input: &Path,
    format: Option<FormatArg>,
    archive: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let format = match format {
        Some(format) => SourceFormat::from(format),
        None => SourceFormat::from_path(input).with_context(|| {
            format!(
                "Cannot infer format of {}; pass --format svg or --format dxf",
                input.display()
            )
        })?,
    };

    info!("Processing: {}", input.display());

    let source =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let request = ConversionRequest::new(source, format, file_name(input));
    let target = if archive {
        Target::Archive
    } else {
        Target::Instructions
    };

    let result = service.run_conversion(request, target)?;
    write_result(result, input, output)
}

fn package(service: &Service, input: &Path, output: Option<PathBuf>) -> Result<()> {
    let text = read_text(input)?;
    let result = service.package_instructions(&text, &file_name(input))?;
    write_result(result, input, output)
}

fn write_result(result: ConversionResult, input: &Path, output: Option<PathBuf>) -> Result<()> {
    let (artifact, line_count) = match result {
        ConversionResult::Success {
            artifact,
            line_count,
        } => (artifact, line_count),
        ConversionResult::Failure { stage, message } => {
            anyhow::bail!("Conversion failed at {} stage: {}", stage, message)
        }
    };

    let (output_path, bytes) = match artifact {
        Artifact::Instructions(gcode) => (
            output.unwrap_or_else(|| input.with_extension("gcode")),
            gcode.into_bytes(),
        ),
        Artifact::Archive { file_name, bytes } => (
            output.unwrap_or_else(|| input.with_file_name(file_name)),
            bytes,
        ),
    };

    std::fs::write(&output_path, bytes)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    info!(
        "Generated: {} ({} G-code lines)",
        output_path.display(),
        line_count
    );
    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
