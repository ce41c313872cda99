use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::AudioArtifact;
use crate::Result;

/// Public directory the extracted audio is copied into for later playback
#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
    url_prefix: String,
}

/// A durable copy of an audio artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAudio {
    pub path: PathBuf,
    pub url: String,
}

impl AudioStore {
    pub fn new(dir: PathBuf, url_prefix: impl Into<String>) -> Self {
        Self {
            dir,
            url_prefix: url_prefix.into(),
        }
    }

    /// Copy `artifact` in under a fresh UUID name; never overwrites
    pub async fn persist(&self, artifact: &AudioArtifact) -> Result<StoredAudio> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let extension = artifact
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("mp3");
        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let destination = self.dir.join(&file_name);

        let mut target = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&destination)
            .await?;

        let copied = async {
            let mut source = tokio::fs::File::open(&artifact.path).await?;
            tokio::io::copy(&mut source, &mut target).await?;
            target.flush().await
        }
        .await;

        if let Err(e) = copied {
            drop(target);
            let _ = tokio::fs::remove_file(&destination).await;
            return Err(e.into());
        }

        Ok(StoredAudio {
            url: format!("{}/{}", self.url_prefix.trim_end_matches('/'), file_name),
            path: destination,
        })
    }
}
