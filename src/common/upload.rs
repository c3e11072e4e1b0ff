use crate::common::error::{AppError, AppResult};
use axum::{body::Bytes, extract::multipart::Field};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{error, warn};

const WRITE_BUFFER_SIZE: usize = 1024 * 1024;

/// Streams an upload into a file on local disk.
///
/// The file only survives if [`FileUploader::finish`] succeeds; every failure
/// path removes what was written so far.
pub struct FileUploader {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl FileUploader {
    pub async fn new(path: PathBuf) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = File::create(&path).await?;

        Ok(Self {
            path,
            writer: BufWriter::with_capacity(WRITE_BUFFER_SIZE, file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_chunk(&mut self, chunk: Bytes) -> AppResult<()> {
        self.writer.write_all(&chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flushes and fsyncs the file. Returns the number of bytes written.
    pub async fn finish(mut self) -> AppResult<u64> {
        if let Err(e) = self.writer.flush().await {
            self.abort().await;
            return Err(e.into());
        }
        if self.written == 0 {
            self.abort().await;
            return Err(AppError::validation("Uploaded file is empty"));
        }
        if let Err(e) = self.writer.get_ref().sync_all().await {
            self.abort().await;
            return Err(e.into());
        }
        Ok(self.written)
    }

    pub async fn abort(self) {
        let path = self.path;
        drop(self.writer);
        if let Err(e) = fs::remove_file(&path).await {
            warn!("Failed to remove aborted upload {}: {}", path.display(), e);
        }
    }
}

pub async fn stream_to_file(mut field: Field<'_>, path: PathBuf) -> AppResult<u64> {
    let mut uploader = FileUploader::new(path).await?;

    while let Some(chunk) = field.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                error!("Upload stream error for {}: {}", uploader.path().display(), e);
                uploader.abort().await;
                return Err(AppError::from(e));
            }
        };

        if let Err(e) = uploader.write_chunk(chunk).await {
            error!("Failed to write upload chunk: {}", e);
            uploader.abort().await;
            return Err(e);
        }
    }

    uploader.finish().await
}
