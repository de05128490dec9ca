//! Wall-clock limit for a whole conversion.

use super::{Pipeline, Target};
use crate::error::Result;
use crate::model::{ConversionRequest, ConversionResult, Stage};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

/// Run a conversion, giving up on it after `timeout`.
///
/// The conversion runs on its own thread, which owns the workspace. On
/// expiry the caller gets a failure for the stage in flight while the thread
/// carries on until its collaborator returns and then releases the
/// workspace as usual.
pub fn run_with_timeout(
    pipeline: Arc<Pipeline>,
    request: ConversionRequest,
    target: Target,
    timeout: Duration,
) -> Result<ConversionResult> {
    let current = Arc::new(Mutex::new(Stage::Input));
    let progress = Arc::clone(&current);
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let on_stage = |stage: Stage| {
            if let Ok(mut current) = progress.lock() {
                *current = stage;
            }
        };
        let result = pipeline.run_observed(&request, target, &on_stage);
        // The receiver is gone if the caller already timed out.
        let _ = tx.send(result);
    });

    let stage_in_flight = || current.lock().map(|s| *s).unwrap_or(Stage::Input);

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            let stage = stage_in_flight();
            warn!("Conversion timed out after {:?} at {} stage", timeout, stage);
            Ok(ConversionResult::failure(
                stage,
                format!("timed out after {:?}", timeout),
            ))
        }
        Err(RecvTimeoutError::Disconnected) => {
            let stage = stage_in_flight();
            warn!("Conversion worker stopped at {} stage", stage);
            Ok(ConversionResult::failure(stage, "conversion worker stopped unexpectedly"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{ToolpathGenerator, Unconfigured};
    use crate::config::CuttingParameters;
    use crate::error::ConversionError;
    use crate::model::SourceFormat;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::time::Instant;

    struct SlowGenerator(Duration);

    impl ToolpathGenerator for SlowGenerator {
        fn drawing_to_instructions(
            &self,
            _drawing: &Path,
            _params: &CuttingParameters,
            output: &Path,
        ) -> std::result::Result<String, ConversionError> {
            std::thread::sleep(self.0);
            std::fs::write(output, "G21\n")?;
            Ok("G21\n".to_string())
        }
    }

    struct PanickingGenerator;

    impl ToolpathGenerator for PanickingGenerator {
        fn drawing_to_instructions(
            &self,
            _drawing: &Path,
            _params: &CuttingParameters,
            _output: &Path,
        ) -> std::result::Result<String, ConversionError> {
            panic!("generator bug");
        }
    }

    fn request() -> ConversionRequest {
        ConversionRequest::new("<svg/>", SourceFormat::Drawing, "logo.svg")
    }

    fn wait_until_empty(dir: &Path) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if std::fs::read_dir(dir).unwrap().count() == 0 {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn test_finishes_within_timeout() {
        let pipeline = Arc::new(Pipeline::new(
            Unconfigured,
            SlowGenerator(Duration::ZERO),
            Unconfigured,
        ));
        let result =
            run_with_timeout(pipeline, request(), Target::Instructions, Duration::from_secs(5))
                .unwrap();
        assert!(result.is_success());
    }

    #[test]
    fn test_timeout_reports_stage_and_still_cleans_up() {
        let base = tempfile::tempdir().unwrap();
        let pipeline = Arc::new(
            Pipeline::new(Unconfigured, SlowGenerator(Duration::from_millis(500)), Unconfigured)
                .with_workspace_root(base.path()),
        );

        let result = run_with_timeout(
            pipeline,
            request(),
            Target::Instructions,
            Duration::from_millis(150),
        )
        .unwrap();

        assert_eq!(result.failed_stage(), Some(Stage::Instructions));
        // The worker is still inside the generator; its workspace goes away
        // once it returns.
        assert!(wait_until_empty(base.path()));
    }

    #[test]
    fn test_worker_panic_is_a_failure() {
        let base = tempfile::tempdir().unwrap();
        let pipeline = Arc::new(
            Pipeline::new(Unconfigured, PanickingGenerator, Unconfigured)
                .with_workspace_root(base.path()),
        );

        let result =
            run_with_timeout(pipeline, request(), Target::Instructions, Duration::from_secs(5))
                .unwrap();

        assert_eq!(result.failed_stage(), Some(Stage::Instructions));
        assert!(wait_until_empty(base.path()));
    }
}
