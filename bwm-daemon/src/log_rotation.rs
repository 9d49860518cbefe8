//! Size-based rotation for `bwm.log`.
//!
//! Rotates when the file reaches 10 MiB and keeps at most 5 copies:
//!   bwm.log → bwm.log.1 → bwm.log.2 → … → bwm.log.5

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Maximum log file size before rotation (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum number of rotated backup files to keep.
pub const MAX_ROTATED_FILES: usize = 5;

/// Rotate `log_path` if its size reached `max_bytes`.
///
/// Returns `true` if rotation occurred, `false` if the file was under the
/// threshold or does not exist yet.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };

    if size < max_bytes {
        return Ok(false);
    }

    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        if src.exists() {
            fs::rename(&src, numbered_path(log_path, n + 1))?;
        }
    }

    fs::rename(log_path, numbered_path(log_path, 1))?;
    Ok(true)
}

/// Rotate the daemon log with the default limits. Failures are logged only.
pub fn rotate_log(log_path: &Path) {
    match rotate_if_needed(log_path, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
        Ok(true) => tracing::info!(path = %log_path.display(), "log file rotated"),
        Ok(false) => {}
        Err(err) => tracing::warn!(path = %log_path.display(), error = %err, "log rotation failed"),
    }
}

/// Path of the `n`-th rotated copy of `base` (e.g. `bwm.log.2`).
fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("bwm.log");
    base.with_file_name(format!("{name}.{n}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SMALL: u64 = 1024;

    fn make_log(dir: &TempDir, size: usize) -> PathBuf {
        let path = dir.path().join("bwm.log");
        fs::write(&path, vec![b'x'; size]).unwrap();
        path
    }

    #[test]
    fn small_file_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let log = make_log(&dir, 10);
        assert!(!rotate_if_needed(&log, SMALL, MAX_ROTATED_FILES).unwrap());
        assert!(!numbered_path(&log, 1).exists());
    }

    #[test]
    fn oversized_file_moves_to_dot_one() {
        let dir = TempDir::new().unwrap();
        let log = make_log(&dir, SMALL as usize + 1);
        assert!(rotate_if_needed(&log, SMALL, MAX_ROTATED_FILES).unwrap());
        assert!(!log.exists());
        assert_eq!(
            fs::metadata(numbered_path(&log, 1)).unwrap().len(),
            SMALL + 1
        );
    }

    #[test]
    fn copies_are_capped() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("bwm.log");
        for n in 1..=MAX_ROTATED_FILES {
            fs::write(numbered_path(&log, n), format!("rotated-{n}")).unwrap();
        }
        make_log(&dir, SMALL as usize);

        assert!(rotate_if_needed(&log, SMALL, MAX_ROTATED_FILES).unwrap());
        assert_eq!(
            fs::read_to_string(numbered_path(&log, MAX_ROTATED_FILES)).unwrap(),
            format!("rotated-{}", MAX_ROTATED_FILES - 1)
        );
        assert!(!numbered_path(&log, MAX_ROTATED_FILES + 1).exists());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("bwm.log");
        assert!(!rotate_if_needed(&log, SMALL, MAX_ROTATED_FILES).unwrap());
    }
}
