//! Collaborators backed by external programs.

use super::{ArchivePackager, ExchangeConverter, ToolpathGenerator};
use crate::config::{CuttingParameters, ToolCommand, PARAMS_FILE};
use crate::error::{ConversionError, PackagingError};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::debug;

/// Interval between exit checks while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A configured command run as a child process.
///
/// Arguments may reference `{input}`, `{output}`, `{template}` and
/// `{params}`. When no argument mentions `{output}`, the tool is expected to
/// write its result to stdout, which is then saved to the output path.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    command: ToolCommand,
    timeout: Option<Duration>,
}

/// Why a tool run failed, before mapping to a stage error.
#[derive(Debug)]
enum RunFailure {
    Spawn(std::io::Error),
    Exit { status: ExitStatus, stderr: String },
    TimedOut(Duration),
    MissingOutput(PathBuf),
    Io(std::io::Error),
}

#[derive(Debug, Default)]
struct Placeholders<'a> {
    input: Option<&'a Path>,
    output: Option<&'a Path>,
    template: Option<&'a Path>,
    params: Option<&'a Path>,
}

impl Placeholders<'_> {
    fn substitute(&self, arg: &str) -> String {
        let mut arg = arg.to_string();
        for (key, value) in [
            ("{input}", self.input),
            ("{output}", self.output),
            ("{template}", self.template),
            ("{params}", self.params),
        ] {
            if let Some(value) = value {
                arg = arg.replace(key, &value.to_string_lossy());
            }
        }
        arg
    }
}

impl ExternalTool {
    /// Create a tool from its command.
    pub fn new(command: ToolCommand) -> Self {
        Self {
            command,
            timeout: None,
        }
    }

    /// Kill the tool if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program name, for messages.
    pub fn name(&self) -> &str {
        &self.command.program
    }

    fn mentions(&self, placeholder: &str) -> bool {
        self.command.args.iter().any(|a| a.contains(placeholder))
    }

    fn run(&self, vars: &Placeholders<'_>) -> Result<(), RunFailure> {
        let args: Vec<String> = self.command.args.iter().map(|a| vars.substitute(a)).collect();
        let to_stdout = !self.mentions("{output}");

        debug!("Running {} {:?}", self.command.program, args);

        let mut child = Command::new(&self.command.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(if to_stdout { Stdio::piped() } else { Stdio::null() })
            .stderr(Stdio::piped())
            .spawn()
            .map_err(RunFailure::Spawn)?;

        // Drain pipes on their own threads so a chatty tool cannot block.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.timeout {
            Some(timeout) => wait_with_timeout(&mut child, timeout)?,
            None => child.wait().map_err(RunFailure::Io)?,
        };

        let stdout = join(stdout);
        let stderr = join(stderr);

        if !status.success() {
            return Err(RunFailure::Exit {
                status,
                stderr: stderr.trim().to_string(),
            });
        }

        if let Some(output) = vars.output {
            if to_stdout {
                std::fs::write(output, stdout).map_err(RunFailure::Io)?;
            }
            if !output.exists() {
                return Err(RunFailure::MissingOutput(output.to_path_buf()));
            }
        }

        Ok(())
    }

    fn conversion_error(&self, failure: RunFailure) -> ConversionError {
        let tool = self.name().to_string();
        match failure {
            RunFailure::Spawn(e) => ConversionError::ToolFailed {
                tool,
                message: format!("could not start: {}", e),
            },
            RunFailure::Exit { status, stderr } => ConversionError::ToolFailed {
                tool,
                message: exit_message(status, &stderr),
            },
            RunFailure::TimedOut(after) => ConversionError::TimedOut {
                tool,
                secs: after.as_secs(),
            },
            RunFailure::MissingOutput(path) => ConversionError::MissingOutput { tool, path },
            RunFailure::Io(e) => ConversionError::Io(e),
        }
    }

    fn packaging_error(&self, failure: RunFailure) -> PackagingError {
        let tool = self.name().to_string();
        match failure {
            RunFailure::Spawn(e) => PackagingError::ToolFailed {
                tool,
                message: format!("could not start: {}", e),
            },
            RunFailure::Exit { status, stderr } => PackagingError::ToolFailed {
                tool,
                message: exit_message(status, &stderr),
            },
            RunFailure::TimedOut(after) => PackagingError::TimedOut {
                tool,
                secs: after.as_secs(),
            },
            RunFailure::MissingOutput(path) => PackagingError::MissingOutput { tool, path },
            RunFailure::Io(e) => PackagingError::Io(e),
        }
    }
}

impl ExchangeConverter for ExternalTool {
    fn exchange_to_drawing(&self, input: &Path, output: &Path) -> Result<PathBuf, ConversionError> {
        let vars = Placeholders {
            input: Some(input),
            output: Some(output),
            ..Default::default()
        };
        self.run(&vars).map_err(|f| self.conversion_error(f))?;
        Ok(output.to_path_buf())
    }
}

impl ToolpathGenerator for ExternalTool {
    fn drawing_to_instructions(
        &self,
        drawing: &Path,
        params: &CuttingParameters,
        output: &Path,
    ) -> Result<String, ConversionError> {
        let params_path = output.with_file_name(PARAMS_FILE);
        if self.mentions("{params}") {
            let json = serde_json::to_string_pretty(params)
                .map_err(|e| ConversionError::Rejected(e.to_string()))?;
            std::fs::write(&params_path, json)?;
        }

        let vars = Placeholders {
            input: Some(drawing),
            output: Some(output),
            params: Some(&params_path),
            ..Default::default()
        };
        self.run(&vars).map_err(|f| self.conversion_error(f))?;

        Ok(std::fs::read_to_string(output)?)
    }
}

impl ArchivePackager for ExternalTool {
    fn instructions_to_archive(
        &self,
        template: &Path,
        output: &Path,
        instructions: &Path,
    ) -> Result<(), PackagingError> {
        if !template.is_file() {
            return Err(PackagingError::TemplateMissing {
                path: template.to_path_buf(),
            });
        }
        if !instructions.is_file() {
            return Err(PackagingError::InstructionsUnreadable {
                path: instructions.to_path_buf(),
            });
        }

        let vars = Placeholders {
            input: Some(instructions),
            output: Some(output),
            template: Some(template),
            ..Default::default()
        };
        self.run(&vars).map_err(|f| self.packaging_error(f))
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(e) = pipe.read_to_end(&mut buf) {
                debug!("Failed to read tool output: {}", e);
            }
            buf
        })
    })
}

fn join(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, RunFailure> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(RunFailure::Io)? {
            return Ok(status);
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RunFailure::TimedOut(timeout));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn exit_message(status: ExitStatus, stderr: &str) -> String {
    if stderr.is_empty() {
        format!("exited with {}", status)
    } else {
        format!("exited with {}: {}", status, stderr)
    }
}
