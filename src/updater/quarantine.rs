//! Renaming in-use files aside and cleaning them up later.
//!
//! The operating system will not let the client delete or truncate a file
//! that the running process has mapped or open for execution, but it will
//! let the file be *renamed* within its directory. The quarantine step
//! exploits that: before a new file is written to a path that already
//! exists, the existing file is renamed to a suffixed name, freeing the
//! original path. The renamed leftovers are deleted on a later run, once
//! the process holding them has restarted.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::UpdateError;

/// Suffix appended to quarantined files. The purge pass matches on it, so
/// nothing else under the install root may end with this string.
pub const QUARANTINE_SUFFIX: &str = ".liveupdate-old";

/// First free quarantine name for `target`.
///
/// Tries `target.liveupdate-old` first, then inserts an increasing
/// integer (`target.1.liveupdate-old`, `target.2.liveupdate-old`, ...)
/// until a name is free. Two quarantines of the same path without an
/// intervening purge therefore never collide.
pub fn quarantine_path(target: &Path) -> PathBuf {
    let base = target.as_os_str().to_os_string();

    let mut plain = base.clone();
    plain.push(QUARANTINE_SUFFIX);
    let mut candidate = PathBuf::from(plain);

    let mut counter = 1u32;
    while candidate.exists() {
        let mut numbered = base.clone();
        numbered.push(format!(".{counter}{QUARANTINE_SUFFIX}"));
        candidate = PathBuf::from(numbered);
        counter += 1;
    }
    candidate
}

/// Move an existing file aside so its path can be rewritten.
///
/// The move is a single rename, atomic at the filesystem level; a crash
/// in this function leaves the bytes intact at either the original or the
/// quarantine path, never at neither. Returns the quarantine path.
pub async fn quarantine(target: &Path) -> Result<PathBuf, UpdateError> {
    let dest = quarantine_path(target);
    debug!(from = %target.display(), to = %dest.display(), "quarantining existing file");
    tokio::fs::rename(target, &dest).await.map_err(|source| UpdateError::Quarantine {
        path: target.to_path_buf(),
        source,
    })?;
    Ok(dest)
}

/// Delete quarantined files left over from previous runs.
///
/// Walks the install root recursively and removes every file carrying the
/// quarantine suffix. A deletion that fails (the file may still be held
/// by a lingering process) is logged and skipped; the next run retries.
/// Running against a root with no quarantined files is a no-op, and the
/// pass is idempotent. Returns the number of files removed.
pub async fn purge(install_root: &Path) -> usize {
    let mut removed = 0usize;
    for entry in WalkDir::new(install_root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        if !entry.file_name().to_string_lossy().ends_with(QUARANTINE_SUFFIX) {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                debug!(path = %entry.path().display(), "purged quarantined file");
                removed += 1;
            }
            Err(err) => {
                warn!(
                    path = %entry.path().display(),
                    error = %err,
                    "could not delete quarantined file, leaving it for the next run"
                );
            }
        }
    }
    if removed > 0 {
        info!(removed, root = %install_root.display(), "purged quarantined files");
    }
    removed
}
