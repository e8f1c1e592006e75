//! Writing rendered files into the output tree.
//!
//! Writes go straight to the final path (no temp file + rename), so a reader
//! of the output tree can observe a partially written file.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const INDEX_FILE: &str = "index.html";

/// `build/<output_path>/index.html`; the empty path maps to `build/index.html`.
pub fn page_path(output: &Path, output_path: &str) -> PathBuf {
    let rel = output_path.trim_matches('/');
    if rel.is_empty() {
        output.join(INDEX_FILE)
    } else {
        output.join(rel).join(INDEX_FILE)
    }
}

pub fn write_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

/// Create parent directories, then overwrite `path`.
pub fn write_output(path: &Path, content: impl AsRef<[u8]>) -> Result<()> {
    write_parent_dirs(path)?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}
