//! Output writer.
//!
//! Artifacts are written to a temp file beside the target and renamed into
//! place, so a reader sees either the previous file or the complete new one.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use llmstxt_shared::{LlmsTxtError, Result};

/// Metadata for a written artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMeta {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Write `content` to `path` atomically (write to temp, then rename).
///
/// Missing parent directories are created.
#[instrument(skip_all, fields(path = %path.display(), size = content.len()))]
pub fn write_atomic(path: &Path, content: &str) -> Result<ArtifactMeta> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LlmsTxtError::validation(format!("not a file path: {}", path.display())))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| LlmsTxtError::io(&dir, e))?;

    let temp = dir.join(format!(".{filename}.tmp"));
    std::fs::write(&temp, content).map_err(|e| LlmsTxtError::io(&temp, e))?;

    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(LlmsTxtError::io(path, e));
    }

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let sha256 = format!("{:x}", hasher.finalize());

    debug!(sha256 = %sha256, "wrote artifact");

    Ok(ArtifactMeta {
        path: path.to_path_buf(),
        sha256,
        size_bytes: content.len(),
    })
}
