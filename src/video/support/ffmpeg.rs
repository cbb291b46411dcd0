use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::ui::prelude::{Level, emit};
use crate::video::error::StageTimeout;

/// Runs one ffmpeg invocation to completion.
#[async_trait]
pub trait FfmpegRunner: Send + Sync {
    async fn run(&self, args: &[String], options: FfmpegRunOptions) -> Result<()>;
}

/// Reads media metadata.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn duration_seconds(&self, path: &Path) -> Result<f64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegRunOptions {
    /// Short stage name used in logs and errors
    pub stage: &'static str,
    /// Stream ffmpeg's stderr as debug events
    pub verbose: bool,
}

impl FfmpegRunOptions {
    pub fn new(stage: &'static str, verbose: bool) -> Self {
        Self { stage, verbose }
    }
}

#[derive(Debug, Clone)]
pub struct SystemFfmpegRunner {
    program: String,
    timeout: Option<Duration>,
}

impl SystemFfmpegRunner {
    pub fn new(program: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Default for SystemFfmpegRunner {
    fn default() -> Self {
        Self::new("ffmpeg", None)
    }
}

#[async_trait]
impl FfmpegRunner for SystemFfmpegRunner {
    async fn run(&self, args: &[String], options: FfmpegRunOptions) -> Result<()> {
        emit(
            Level::Debug,
            "ffmpeg.run",
            &format!("[{}] {} {}", options.stage, self.program, args.join(" ")),
            None,
        );

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program))?;

        let stderr = child
            .stderr
            .take()
            .context("ffmpeg stderr was not captured")?;

        let (status, capture) = with_timeout(self.timeout, async {
            let capture = read_ffmpeg_stderr(stderr, options.verbose).await?;
            let status = child.wait().await.context("Failed to wait for ffmpeg")?;
            Ok::<_, anyhow::Error>((status, capture))
        })
        .await?;

        if !status.success() {
            bail!(
                "ffmpeg exited with status {:?}: {}",
                status.code(),
                capture.summary()
            );
        }

        Ok(())
    }
}

/// Await `work`, failing with [`StageTimeout`] once `limit` elapses.
///
/// Dropping the pending future drops any child it borrows; children are
/// spawned with `kill_on_drop`, so the process dies with it.
pub async fn with_timeout<T>(
    limit: Option<Duration>,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    match limit {
        None => work.await,
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::Error::new(StageTimeout {
                seconds: limit.as_secs(),
            })),
        },
    }
}

#[derive(Debug, Default)]
struct StderrCapture {
    accumulated: String,
    last_line: String,
    error_lines: Vec<String>,
}

impl StderrCapture {
    fn push_chunk(&mut self, chunk: &str, verbose: bool) {
        self.accumulated.push_str(chunk);

        while let Some(pos) = self.accumulated.find(['\r', '\n']) {
            let line = self.accumulated[..pos].to_string();
            self.accumulated.drain(..=pos);

            if line.is_empty() {
                continue;
            }

            if verbose {
                emit(Level::Debug, "ffmpeg.stderr", &line, None);
            }

            if line.contains("error") || line.contains("Error") || line.contains("ERROR") {
                self.error_lines.push(line.clone());
            }
            self.last_line = line;
        }
    }

    fn summary(&self) -> String {
        if self.error_lines.is_empty() {
            self.last_line.trim().to_string()
        } else {
            self.error_lines.join("\n").trim().to_string()
        }
    }
}

async fn read_ffmpeg_stderr<R: AsyncRead + Unpin>(
    mut stderr: R,
    verbose: bool,
) -> Result<StderrCapture> {
    let mut buffer = [0u8; 4096];
    let mut capture = StderrCapture::default();

    loop {
        let bytes_read = stderr
            .read(&mut buffer)
            .await
            .context("Failed to read ffmpeg stderr")?;
        if bytes_read == 0 {
            break;
        }

        let chunk = String::from_utf8_lossy(&buffer[..bytes_read]);
        capture.push_chunk(&chunk, verbose);
    }

    // flush a final line that ffmpeg did not terminate
    capture.push_chunk("\n", verbose);

    Ok(capture)
}

#[derive(Debug, Clone)]
pub struct SystemMediaProbe {
    program: String,
    timeout: Option<Duration>,
}

impl SystemMediaProbe {
    pub fn new(program: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MediaProbe for SystemMediaProbe {
    async fn duration_seconds(&self, path: &Path) -> Result<f64> {
        let mut command = Command::new(&self.program);
        command
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = with_timeout(self.timeout, async {
            let output = command
                .output()
                .await
                .with_context(|| format!("Failed to run ffprobe for {}", path.display()))?;
            Ok::<_, anyhow::Error>(output)
        })
        .await?;

        if !output.status.success() {
            bail!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        parse_duration_output(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_duration_output(stdout: &str) -> Result<f64> {
    let value = stdout.trim();
    let duration: f64 = value
        .parse()
        .with_context(|| format!("Failed to parse ffprobe duration '{value}' as f64"))?;
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_keeps_error_lines_and_last_line() {
        let mut capture = StderrCapture::default();
        capture.push_chunk("frame=  1 fps=0.0\rframe=  2 fps=0", false);
        capture.push_chunk(".0\n[libx264] Error while opening encoder\nConversion failed!\n", false);

        assert_eq!(capture.last_line, "Conversion failed!");
        assert_eq!(
            capture.summary(),
            "[libx264] Error while opening encoder"
        );
    }

    #[test]
    fn capture_summary_falls_back_to_last_line() {
        let mut capture = StderrCapture::default();
        capture.push_chunk("Invalid argument\n", false);
        assert_eq!(capture.summary(), "Invalid argument");
    }

    #[tokio::test]
    async fn stderr_reader_flushes_unterminated_tail() {
        let data: &[u8] = b"first line\nNo such file or directory";
        let capture = read_ffmpeg_stderr(data, false).await.unwrap();
        assert_eq!(capture.last_line, "No such file or directory");
    }

    #[test]
    fn parses_ffprobe_duration() {
        assert_eq!(parse_duration_output("30.000000\n").unwrap(), 30.0);
        assert!(parse_duration_output("N/A").is_err());
    }

    #[tokio::test]
    async fn timeout_yields_stage_timeout() {
        let err = with_timeout(Some(Duration::from_millis(10)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, anyhow::Error>(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.downcast_ref::<StageTimeout>().unwrap().seconds, 0);
    }
}
