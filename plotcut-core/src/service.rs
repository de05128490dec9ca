//! Entry points for a transport layer.

use crate::error::Result;
use crate::formatter::format_instructions;
use crate::model::{ConversionRequest, ConversionResult};
use crate::pipeline::{run_with_timeout, Pipeline, Target};
use crate::validation::{validate_instructions, ValidationReport};
use std::sync::Arc;
use std::time::Duration;

/// The operations a front end exposes, with the pipeline injected.
///
/// Cloning is cheap; clones share the pipeline.
#[derive(Debug, Clone)]
pub struct Service {
    pipeline: Arc<Pipeline>,
    timeout: Option<Duration>,
}

impl Service {
    /// Create a service around a pipeline.
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            timeout: None,
        }
    }

    /// Give up on conversions that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Check G-code text for structural problems.
    pub fn validate_instructions(&self, text: &str) -> ValidationReport {
        validate_instructions(text)
    }

    /// Normalize G-code spacing and align inline comments.
    pub fn format_instructions(&self, text: &str) -> String {
        format_instructions(text)
    }

    /// Convert an uploaded drawing or exchange file.
    pub fn run_conversion(
        &self,
        request: ConversionRequest,
        target: Target,
    ) -> Result<ConversionResult> {
        match self.timeout {
            Some(timeout) => run_with_timeout(Arc::clone(&self.pipeline), request, target, timeout),
            None => self.pipeline.run_target(&request, target),
        }
    }

    /// Package G-code text into an archive named after `output_name`.
    pub fn package_instructions(&self, text: &str, output_name: &str) -> Result<ConversionResult> {
        self.pipeline.package(text, output_name)
    }
}
