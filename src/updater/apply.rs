//! Extracting a downloaded artifact into the install root.
//!
//! Entries are applied one at a time in archive order, never in parallel,
//! so a partial failure leaves a deterministic prefix of the archive
//! applied. Per entry the ordering is fixed: the destination is validated
//! against the install root, an existing file is quarantined, then the
//! new bytes are written. Extraction never starts before the pre-existing
//! file (if any) has been moved aside.

use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::cancel::CancelHandle;
use crate::error::UpdateError;
use crate::progress::{ProgressEvent, ProgressSink, UpdateStep};
use crate::updater::quarantine;

/// Extract every entry of the archive at `artifact` into `install_root`.
///
/// Entry names are POSIX-style paths relative to the install root. Any
/// entry that would resolve outside the root (absolute names, parent
/// components) aborts the run with [`UpdateError::PathTraversal`] before
/// anything is written for it. Cancellation is polled between entries;
/// already-applied entries stay applied.
///
/// Returns the number of entries applied.
pub(crate) async fn apply_archive(
    artifact: &Path,
    install_root: &Path,
    progress: &dyn ProgressSink,
    cancel: &CancelHandle,
) -> Result<usize, UpdateError> {
    let file = std::fs::File::open(artifact)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let total = archive.len();
    info!(entries = total, root = %install_root.display(), "applying update archive");

    for index in 0..total {
        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }

        // Pull everything needed out of the entry before the first await;
        // the borrow into the archive must not live across suspension.
        let (relative, data, is_dir, unix_mode) = {
            let mut entry = archive.by_index(index)?;
            let Some(relative) = entry.enclosed_name() else {
                return Err(UpdateError::PathTraversal { entry: entry.name().to_string() });
            };
            if entry.is_dir() {
                (relative, Vec::new(), true, None)
            } else {
                let mut data = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut data)?;
                (relative, data, false, entry.unix_mode())
            }
        };

        let dest = install_root.join(&relative);
        if is_dir {
            tokio::fs::create_dir_all(&dest).await?;
        } else {
            write_entry(&dest, &relative, &data, unix_mode).await?;
        }

        progress.report(ProgressEvent::new(
            UpdateStep::Apply,
            ((index + 1) * 100 / total) as u8,
        ));
    }

    Ok(total)
}

async fn write_entry(
    dest: &Path,
    relative: &Path,
    data: &[u8],
    unix_mode: Option<u32>,
) -> Result<(), UpdateError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::try_exists(dest).await? {
        quarantine::quarantine(dest).await?;
    }
    tokio::fs::write(dest, data).await?;

    #[cfg(unix)]
    if let Some(mode) = unix_mode {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(dest, std::fs::Permissions::from_mode(mode)).await?;
    }
    #[cfg(not(unix))]
    let _ = unix_mode;

    debug!(entry = %relative.display(), "applied archive entry");
    Ok(())
}
