use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::MediaConfig;
use crate::error::{Result, ResizeError};
use crate::progress::ProgressEvent;
use crate::resize::TranscodePlan;
use super::MediaProcessorTrait;

/// Lines of ffmpeg output kept for error reports
const STDERR_TAIL_LINES: usize = 20;

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }
}

/// Replace the final (output) argument of an ffmpeg argument list.
pub fn with_output(args: &[String], output: &Path) -> Vec<String> {
    let mut args = args.to_vec();
    if let Some(last) = args.last_mut() {
        *last = output.to_string_lossy().to_string();
    }
    args
}

/// Resolve `output` and report it when it names the same file as `input`,
/// however either path is spelled.
pub fn same_file(input: &Path, output: &Path) -> Option<PathBuf> {
    let input = std::fs::canonicalize(input).ok()?;
    let output = match std::fs::canonicalize(output) {
        Ok(resolved) => resolved,
        Err(_) => {
            let parent = match output.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            std::fs::canonicalize(parent).ok()?.join(output.file_name()?)
        }
    };
    (input == output).then_some(output)
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn run_transcode(
        &self,
        plan: &TranscodePlan,
        on_progress: &(dyn Fn(ProgressEvent) + Send + Sync),
    ) -> Result<()> {
        let parsed = plan
            .command
            .parse()
            .ok_or_else(|| ResizeError::Process("planned command has no input or output".to_string()))?;

        // ffmpeg cannot write over its own input: go through a sibling
        // temporary directory and move the result into place afterwards.
        let in_place = same_file(&parsed.input, &parsed.output);
        let (args, staged_output, _staging) = if let Some(target) = in_place {
            let parent = target.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
            let dir = tempfile::Builder::new().prefix(".resize-video-").tempdir_in(parent)?;
            let file_name = target
                .file_name()
                .ok_or_else(|| ResizeError::Process(format!("invalid output path: {}", parsed.output.display())))?;
            let staged = dir.path().join(file_name);
            (with_output(&plan.command.args, &staged), Some((staged, target)), Some(dir))
        } else {
            (plan.command.args.clone(), None, None)
        };

        info!("{}: {} -> {}", plan.command.description, parsed.input.display(), parsed.output.display());
        debug!("Executing media processing command: {} {:?}", plan.command.binary_path, args);

        let mut child = Command::new(&plan.command.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ResizeError::Process(format!("Failed to execute media processor: {}", e)))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ResizeError::Process("ffmpeg stderr was not captured".to_string()))?;

        // ffmpeg ends status updates with '\r' and log lines with '\n'
        let mut segments = BufReader::new(stderr).split(b'\r');
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

        while let Some(segment) = segments.next_segment().await? {
            for line in String::from_utf8_lossy(&segment).lines() {
                if let Some(event) = plan.progress.parse_line(line) {
                    on_progress(event);
                    continue;
                }
                if line.trim().is_empty() {
                    continue;
                }
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line.to_string());
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let stderr_tail = tail.into_iter().collect::<Vec<_>>().join("\n");
            return Err(ResizeError::Process(format!(
                "{} failed ({}): {}",
                plan.command.description, status, stderr_tail
            )));
        }

        if let Some((staged, target)) = staged_output {
            tokio::fs::rename(&staged, &target).await?;
            debug!("Replaced {} with resized file", target.display());
        }

        info!("{} completed", plan.command.description);
        Ok(())
    }

    fn check_availability(&self) -> Result<()> {
        let binary = which::which(&self.config.ffmpeg_path)
            .map_err(|e| ResizeError::Process(format!("Media processor not found: {}", e)))?;

        let output = std::process::Command::new(binary)
            .arg("-version")
            .output()
            .map_err(|e| ResizeError::Process(format!("Media processor not found: {}", e)))?;

        if output.status.success() {
            info!("Media processor is available");
            Ok(())
        } else {
            warn!("Media processor version check failed");
            Err(ResizeError::Process("Media processor version check failed".to_string()))
        }
    }

    async fn get_version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| ResizeError::Process(format!("Failed to execute media processor: {}", e)))?;

        if output.status.success() {
            let version_info = String::from_utf8_lossy(&output.stdout);
            let first_line = version_info.lines().next().unwrap_or("Unknown version");
            Ok(first_line.to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ResizeError::Process(format!("Media processor version check failed: {}", stderr)))
        }
    }
}
