//! Persistence: write generated LaTeX (and final PDFs) to disk.
//!
//! Writes are atomic: the bytes go to a sibling `*.tmp` file which is then
//! renamed over the target, so a crash mid-write never leaves a truncated
//! `.tex` for the compiler to choke on. The content is not validated.

use crate::error::TailorError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write `latex` to `path` as UTF-8, replacing any existing file.
pub async fn persist_latex(latex: &str, path: &Path) -> Result<(), TailorError> {
    write_atomic(path, latex.as_bytes()).await?;
    debug!(path = %path.display(), bytes = latex.len(), "LaTeX persisted");
    Ok(())
}

/// Atomically write `bytes` to `path`, creating parent directories.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TailorError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| TailorError::io(parent, e))?;
    }

    let tmp_path = tmp_sibling(path);
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| TailorError::io(path, e))?;

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(TailorError::io(path, e));
    }
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let ext = path
        .extension()
        .map(|e| format!("{}.tmp", e.to_string_lossy()))
        .unwrap_or_else(|| "tmp".to_string());
    path.with_extension(ext)
}
