use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use crate::config::env::{self, EnvKey};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024 * 1024;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    /// No database configured means jobs live in memory for the lifetime of the process.
    pub database_url: Option<String>,
    pub upload_dir: PathBuf,
    pub hls_dir: PathBuf,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub hls_segment_seconds: u32,
    pub transcode_workers: usize,
    pub transcode_timeout_secs: u64,
    pub segment_cache_secs: u64,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: env::get_opt(EnvKey::DatabaseUrl),
            upload_dir: PathBuf::from(env::get_or(EnvKey::UploadDir, "./uploads")),
            hls_dir: PathBuf::from(env::get_or(EnvKey::HlsDir, "./hls")),
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg"),
            ffprobe_path: env::get_or(EnvKey::FfprobePath, "ffprobe"),
            hls_segment_seconds: env::get_parsed(EnvKey::HlsSegmentSeconds, 10),
            transcode_workers: env::get_parsed(EnvKey::TranscodeWorkers, 2).max(1),
            transcode_timeout_secs: env::get_parsed(EnvKey::TranscodeTimeoutSecs, 7200),
            segment_cache_secs: env::get_parsed(EnvKey::SegmentCacheSecs, 3600),
            max_upload_bytes: env::get_parsed(EnvKey::MaxUploadBytes, DEFAULT_MAX_UPLOAD_BYTES),
        })
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }
}
