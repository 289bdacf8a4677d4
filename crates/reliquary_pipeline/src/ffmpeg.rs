//! ffmpeg-backed trimmer.

use bytes::Bytes;
use reliquary_core::{MediaKind, TrimSpec};
use reliquary_error::{TransformError, TransformErrorKind};
use reliquary_interface::Transformer;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Longest stderr tail kept in an error.
const STDERR_TAIL: usize = 2048;

/// Trims video and GIF content with an `ffmpeg` binary.
///
/// Runs `ffmpeg -ss <start> [-t <duration>] -i in.<ext> out.<ext>` in a
/// scratch directory. Still images have no timeline and pass through
/// unchanged.
#[derive(Debug, Clone)]
pub struct FfmpegTrimmer {
    ffmpeg_path: PathBuf,
}

impl FfmpegTrimmer {
    /// Trimmer invoking the binary at `ffmpeg_path` (or on `PATH`).
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn seconds(d: Duration) -> String {
        format!("{:.3}", d.as_secs_f64())
    }

    fn args(spec: &TrimSpec, input: &str, output: &str) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-ss".to_string(),
            Self::seconds(spec.start().unwrap_or_default()),
        ];
        if let Some(duration) = spec.duration() {
            args.push("-t".to_string());
            args.push(Self::seconds(duration));
        }
        args.extend(["-i".to_string(), input.to_string(), output.to_string()]);
        args
    }
}

fn io_error(context: &str, e: std::io::Error) -> TransformError {
    TransformError::new(TransformErrorKind::Io(format!("{}: {}", context, e)))
}

#[async_trait::async_trait]
impl Transformer for FfmpegTrimmer {
    #[instrument(skip(self, bytes), fields(size = bytes.len(), kind = %kind))]
    async fn transform(
        &self,
        bytes: &Bytes,
        kind: MediaKind,
        extension: &str,
        spec: &TrimSpec,
    ) -> Result<Bytes, TransformError> {
        if kind == MediaKind::Image || spec.is_noop() {
            return Ok(bytes.clone());
        }

        let scratch = tempfile::tempdir().map_err(|e| io_error("scratch directory", e))?;
        let input = scratch.path().join(format!("input.{}", extension));
        let output = scratch.path().join(format!("output.{}", extension));

        tokio::fs::write(&input, bytes)
            .await
            .map_err(|e| io_error("write input", e))?;

        let args = Self::args(
            spec,
            &input.to_string_lossy(),
            &output.to_string_lossy(),
        );
        debug!(ffmpeg = %self.ffmpeg_path.display(), ?args, "Running ffmpeg");

        let result = Command::new(&self.ffmpeg_path)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                TransformError::new(TransformErrorKind::Spawn(format!(
                    "{}: {}",
                    self.ffmpeg_path.display(),
                    e
                )))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let start = stderr.len().saturating_sub(STDERR_TAIL);
            let tail = stderr.get(start..).unwrap_or(&stderr).trim().to_string();
            return Err(TransformError::new(TransformErrorKind::ToolFailed {
                status: result.status.code().unwrap_or(-1),
                stderr: tail,
            }));
        }

        let trimmed = tokio::fs::read(&output)
            .await
            .map_err(|e| io_error("read output", e))?;
        if trimmed.is_empty() {
            return Err(TransformError::new(TransformErrorKind::EmptyOutput));
        }

        debug!(before = bytes.len(), after = trimmed.len(), "Trimmed media");
        Ok(Bytes::from(trimmed))
    }
}
