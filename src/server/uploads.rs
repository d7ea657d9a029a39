use crate::info;
use crate::server::error::{ApiError, ApiResult};
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Directory that receives uploaded resumes.
#[derive(Clone, Debug)]
pub struct ResumeStore {
    dir: PathBuf,
}

impl ResumeStore {
    pub fn new(dir: PathBuf) -> Self {
        ResumeStore { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))
    }

    /// Writes `bytes` under the final component of `file_name`, overwriting
    /// any earlier upload with the same name. Returns the stored file name
    /// and the path written.
    pub async fn save(&self, file_name: &str, bytes: &[u8]) -> ApiResult<(String, PathBuf)> {
        let name = sanitize_file_name(file_name)
            .ok_or_else(|| ApiError::bad_request("A resume file name is required"))?;

        let path = self.dir.join(&name);
        let write = async {
            self.ensure_dir().await?;
            tokio::fs::write(&path, bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))
        };
        write
            .await
            .map_err(|e| ApiError::internal("Error saving file", e))?;

        info!("Resume saved at {} ({} bytes)", path.display(), bytes.len());
        Ok((name, path))
    }
}

/// Keeps only the last path component, so an upload can never escape the
/// uploads directory.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}
