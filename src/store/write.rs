//! Atomic file persistence.
//!
//! Every persisted record (ENV, CREDENTIALS, state.json, rendered provider
//! config) goes through [`safe_write`]: the content lands in a temp file in
//! the target directory, the mode is set while the file is still private,
//! and a rename swaps it into place. A concurrent reader therefore observes
//! either the old file or the new one, never a torn write, and overwriting a
//! file whose own bits are read-only still succeeds because the rename is
//! governed by directory permissions.

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tokio::fs;

/// Default mode for persisted records: owner read/write only.
pub const DEFAULT_MODE: u32 = 0o600;

pub async fn safe_write(path: &Path, content: &str, mode: u32) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&parent).await?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid target path"))?;
    let tmp_path = parent.join(format!("{}.tmp.{}", file_name, std::process::id()));

    // Records are line-oriented; a trailing newline keeps appenders and
    // `grep`-style consumers honest.
    let mut body = content.to_string();
    if !body.ends_with('\n') {
        body.push('\n');
    }

    if let Err(e) = fs::write(&tmp_path, &body).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    let mut perms = fs::metadata(&tmp_path).await?.permissions();
    perms.set_mode(mode);
    if let Err(e) = fs::set_permissions(&tmp_path, perms).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    Ok(())
}
