use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

const MANIFEST_FILE_NAME: &str = "playlist.m3u8";
const SEGMENT_FILE_NAME_PATTERN: &str = "segment_%03d.ts";

/// On-disk layout for uploaded sources and generated HLS sets.
///
/// ```text
/// <upload_dir>/<job id><ext>          original upload
/// <hls_dir>/<job id>/playlist.m3u8    manifest
/// <hls_dir>/<job id>/segment_000.ts   segments, zero-padded
/// ```
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    upload_dir: PathBuf,
    hls_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(upload_dir: impl Into<PathBuf>, hls_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            hls_dir: hls_dir.into(),
        }
    }

    pub async fn ensure_roots(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.hls_dir).await?;
        info!(
            "✅ Artifact roots ready (uploads: {}, hls: {})",
            self.upload_dir.display(),
            self.hls_dir.display()
        );
        Ok(())
    }

    pub fn source_file_path(&self, job_id: Uuid, extension: &str) -> PathBuf {
        self.upload_dir.join(format!("{}{}", job_id, extension))
    }

    pub fn output_dir(&self, job_id: Uuid) -> PathBuf {
        self.hls_dir.join(job_id.to_string())
    }

    pub fn manifest_file_name(&self) -> &'static str {
        MANIFEST_FILE_NAME
    }

    pub fn segment_file_name_pattern(&self) -> &'static str {
        SEGMENT_FILE_NAME_PATTERN
    }
}

/// Final dot-segment of the upload's base name, dot included, or `""`.
///
/// Directory components some clients send along with the file name are
/// dropped first, so the result never contains a path separator.
pub fn extension_of(original_file_name: &str) -> &str {
    let base = base_file_name(original_file_name);
    match base.rfind('.') {
        Some(idx) => &base[idx..],
        None => "",
    }
}

/// Base name of an upload with any client-side directories stripped.
pub fn base_file_name(original_file_name: &str) -> &str {
    original_file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_final_dot_segment_verbatim() {
        assert_eq!(extension_of("holiday.MP4"), ".MP4");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(""), "");
    }

    #[test]
    fn extension_ignores_client_directories() {
        assert_eq!(extension_of("C:\\clips.old\\raw"), "");
        assert_eq!(extension_of("../../etc/passwd"), "");
        assert_eq!(extension_of("videos.d/clip.mkv"), ".mkv");
        assert_eq!(base_file_name("a/b\\c.mov"), "c.mov");
    }

    #[test]
    fn layout_is_keyed_by_job_id() {
        let store = ArtifactStore::new("/data/uploads", "/data/hls");
        let id = Uuid::new_v4();

        let source = store.source_file_path(id, ".mkv");
        assert_eq!(source, PathBuf::from(format!("/data/uploads/{}.mkv", id)));
        assert!(source.starts_with("/data/uploads"));

        assert_eq!(store.output_dir(id), PathBuf::from(format!("/data/hls/{}", id)));
        assert_eq!(store.manifest_file_name(), "playlist.m3u8");
        assert_eq!(store.segment_file_name_pattern(), "segment_%03d.ts");
    }
}
