use super::{EncodeOutput, EncoderError, Transcoder};
use crate::config::settings::AppConfig;
use crate::infrastructure::storage::artifacts::ArtifactStore;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, info};

/// Keep failure diagnostics readable when ffmpeg dumps a long log.
const DIAGNOSTIC_TAIL_CHARS: usize = 2000;

/// Runs `ffprobe` then `ffmpeg` to produce a VOD HLS set.
#[derive(Clone, Debug)]
pub struct FfmpegEncoder {
    ffmpeg_path: String,
    ffprobe_path: String,
    segment_seconds: u32,
    manifest_file_name: String,
    segment_pattern: String,
}

impl FfmpegEncoder {
    pub fn new(config: &AppConfig, artifacts: &ArtifactStore) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffprobe_path: config.ffprobe_path.clone(),
            segment_seconds: config.hls_segment_seconds.max(1),
            manifest_file_name: artifacts.manifest_file_name().to_string(),
            segment_pattern: artifacts.segment_file_name_pattern().to_string(),
        }
    }

    pub async fn probe_duration(&self, source_path: &Path) -> Result<f64, EncoderError> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(source_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| EncoderError::Probe(format!("failed to run {}: {}", self.ffprobe_path, e)))?;

        if !output.status.success() {
            return Err(EncoderError::Probe(diagnostic(&output.stderr, output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_duration(&stdout).ok_or_else(|| {
            EncoderError::Probe(format!("no usable duration in probe output: {:?}", stdout.trim()))
        })
    }

    fn hls_args(&self, source_path: &Path, output_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-nostdin", "-y", "-i"].into_iter().map(OsString::from).collect();
        args.push(source_path.as_os_str().to_owned());
        args.extend(
            [
                "-f".to_string(),
                "hls".to_string(),
                "-hls_time".to_string(),
                self.segment_seconds.to_string(),
                "-hls_list_size".to_string(),
                "0".to_string(),
                "-hls_segment_filename".to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(output_dir.join(&self.segment_pattern).into_os_string());
        args.push(output_dir.join(&self.manifest_file_name).into_os_string());
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegEncoder {
    async fn transcode(&self, source_path: &Path, output_dir: &Path) -> Result<EncodeOutput, EncoderError> {
        let duration_seconds = self.probe_duration(source_path).await?;
        debug!("Probed {}: {:.3}s", source_path.display(), duration_seconds);

        tokio::fs::create_dir_all(output_dir).await?;
        let manifest_path = output_dir.join(&self.manifest_file_name);

        info!("🎞️ Encoding {} -> {}", source_path.display(), output_dir.display());
        let output = Command::new(&self.ffmpeg_path)
            .args(self.hls_args(source_path, output_dir))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| EncoderError::Encode(format!("failed to run {}: {}", self.ffmpeg_path, e)))?;

        if !output.status.success() {
            return Err(EncoderError::Encode(diagnostic(&output.stderr, output.status)));
        }

        if !tokio::fs::try_exists(&manifest_path).await.unwrap_or(false) {
            return Err(EncoderError::Encode(format!(
                "encoder exited successfully but produced no manifest at {}",
                manifest_path.display()
            )));
        }

        Ok(EncodeOutput {
            manifest_path,
            duration_seconds,
        })
    }
}

fn parse_duration(probe_output: &str) -> Option<f64> {
    probe_output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

fn diagnostic(stderr: &[u8], status: ExitStatus) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return format!("process exited with {}", status);
    }

    let skip = text.chars().count().saturating_sub(DIAGNOSTIC_TAIL_CHARS);
    text.chars().skip(skip).collect()
}
