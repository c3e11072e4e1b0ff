use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod ffmpeg;

pub use ffmpeg::FfmpegEncoder;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Encoder IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodeOutput {
    pub manifest_path: PathBuf,
    pub duration_seconds: f64,
}

/// Turns one source file into an HLS manifest plus segments inside `output_dir`.
///
/// Implementations never touch job records and leave partial output behind on
/// failure.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, source_path: &Path, output_dir: &Path) -> Result<EncodeOutput, EncoderError>;
}
