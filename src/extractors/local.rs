use std::path::Path;
use uuid::Uuid;

use super::VideoSource;
use crate::utils::{extension_of, format_file_size};
use crate::{PipelineError, Result};

/// Video container extensions accepted for upload
pub const ALLOWED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm", "mkv", "flv", "wmv"];

/// Upload checks done by the caller before handing a file to the pipeline
pub async fn validate_upload(path: &Path, max_bytes: u64) -> Result<()> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::InvalidInput(format!(
                "File does not exist: {}",
                path.display()
            )));
        }
        Err(e) => {
            return Err(PipelineError::InvalidInput(format!(
                "Cannot access file {}: {}",
                path.display(),
                e
            )));
        }
    };

    if !metadata.is_file() {
        return Err(PipelineError::InvalidInput(format!(
            "Path is not a file: {}",
            path.display()
        )));
    }

    let Some(extension) = extension_of(path) else {
        return Err(PipelineError::InvalidInput(
            "File must have an extension".to_string(),
        ));
    };

    if !ALLOWED_VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        return Err(PipelineError::InvalidInput(format!(
            "File type not allowed. Supported: {}",
            ALLOWED_VIDEO_EXTENSIONS
                .iter()
                .map(|ext| format!(".{}", ext))
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    if metadata.len() == 0 {
        return Err(PipelineError::InvalidInput(format!(
            "File is empty: {}",
            path.display()
        )));
    }

    if metadata.len() > max_bytes {
        return Err(PipelineError::InvalidInput(format!(
            "File is too large ({}); limit is {}",
            format_file_size(metadata.len()),
            format_file_size(max_bytes)
        )));
    }

    Ok(())
}

/// Copy a user's file into the upload directory under a fresh name.
///
/// The pipeline owns and deletes the staged copy; the original is left alone.
pub async fn stage_upload(source: &Path, upload_dir: &Path) -> Result<VideoSource> {
    tokio::fs::create_dir_all(upload_dir).await?;

    let original_name = source
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();

    let staged = upload_dir.join(Uuid::new_v4().to_string());
    tokio::fs::copy(source, &staged).await?;

    tracing::debug!("Staged {} as {}", source.display(), staged.display());

    Ok(VideoSource::LocalUpload {
        path: staged,
        original_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_accepts_supported_video() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Talk.MKV");
        std::fs::write(&file, b"fake video").unwrap();

        assert_ok!(validate_upload(&file, 1024).await);
    }

    #[tokio::test]
    async fn test_rejects_bad_uploads() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.mp4");
        assert_err!(validate_upload(&missing, 1024).await);

        let no_ext = dir.path().join("video");
        std::fs::write(&no_ext, b"x").unwrap();
        let err = validate_upload(&no_ext, 1024).await.unwrap_err();
        assert!(err.to_string().contains("extension"));

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, b"x").unwrap();
        let err = validate_upload(&text, 1024).await.unwrap_err();
        assert!(err.to_string().contains("File type not allowed"));

        let empty = dir.path().join("empty.mp4");
        std::fs::write(&empty, b"").unwrap();
        assert_err!(validate_upload(&empty, 1024).await);

        let big = dir.path().join("big.mp4");
        std::fs::write(&big, vec![0u8; 2048]).unwrap();
        let err = validate_upload(&big, 1024).await.unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn test_stage_upload_copies_and_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("clip.mp4");
        std::fs::write(&original, b"frames").unwrap();
        let uploads = dir.path().join("uploads");

        let source = stage_upload(&original, &uploads).await.unwrap();
        match source {
            VideoSource::LocalUpload { path, original_name } => {
                assert_eq!(original_name, "clip.mp4");
                assert!(path.starts_with(&uploads));
                assert_eq!(std::fs::read(&path).unwrap(), b"frames");
            }
            other => panic!("unexpected source: {:?}", other),
        }
        assert!(original.exists());
    }
}
