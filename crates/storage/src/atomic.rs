use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Pretty JSON written to a temp file next to `path` and renamed over it, so
/// readers never observe a partial document.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).with_context(|| format!("failed creating dir {}", dir.display()))?;
    let mut temp = NamedTempFile::new_in(&dir)
        .with_context(|| format!("failed creating temp file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut temp, value)
        .with_context(|| format!("failed serializing {}", path.display()))?;
    temp.write_all(b"\n")?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("failed syncing temp file for {}", path.display()))?;
    temp.persist(path)
        .map_err(|error| error.error)
        .with_context(|| format!("failed replacing {}", path.display()))?;
    Ok(())
}
