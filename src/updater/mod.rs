//! The update client.
//!
//! [`UpdateClient`] drives one complete update run as a linear sequence of
//! phases:
//!
//! ```text
//! purge old files -> check versions -> confirm -> download -> verify
//!                 -> apply -> persist manifest
//! ```
//!
//! Every run starts by purging quarantined files left behind by the
//! previous run, then fetches the remote and local manifests concurrently
//! and compares them along both ordering axes. If an update is available
//! and the host's [`ConfirmationGate`] agrees, the artifact is streamed to
//! a private temporary file, checked against the manifest digest, and
//! extracted entry by entry into the install root, quarantining any file
//! that is already present. Finally the remote manifest is fetched a
//! second time and persisted as the new local manifest.
//!
//! The client performs no retries and never restarts the host process;
//! the host reacts to [`UpdateOutcome::Applied`] as it sees fit, commonly
//! by restarting itself. A manifest fetch that fails during the check is
//! treated as "version 0" so an unreachable store means "no update",
//! never a crashed check.
//!
//! # Example
//!
//! ```rust,no_run
//! use liveupdate::{CancelHandle, UpdateClient, UpdateOutcome, UpdateSource};
//!
//! # async fn example() -> Result<(), liveupdate::UpdateError> {
//! let cancel = CancelHandle::new();
//! let client = UpdateClient::new(
//!     UpdateSource::http("https://updates.example.net/myapp/v1"),
//!     "/opt/myapp",
//! )
//! .with_confirmation_gate(|info: &liveupdate::UpdateAvailableInfo| {
//!     println!("update {} -> {}", info.local_version, info.remote_version);
//!     true
//! })
//! .with_progress_sink(|event: liveupdate::ProgressEvent| {
//!     println!("{:?} {}%", event.step, event.percent);
//! })
//! .with_cancel_handle(cancel.clone());
//!
//! match client.run().await? {
//!     UpdateOutcome::Applied(info) => {
//!         println!("updated to version {}", info.remote_version);
//!         // restart the process here
//!     }
//!     UpdateOutcome::UpToDate(_) | UpdateOutcome::Declined(_) => {}
//! }
//! # Ok(())
//! # }
//! ```

pub mod quarantine;

mod apply;

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::cancel::CancelHandle;
use crate::error::UpdateError;
use crate::manifest::{VersionManifest, md5_base64};
use crate::progress::{DiscardProgress, ProgressSink};
use crate::source::UpdateSource;
use crate::version::{UpdateAvailableInfo, compare};

/// Capability interface for the "ask the user" moment.
///
/// Called exactly once per run, after the check has found an update and
/// before anything is downloaded. Returning `false` ends the run with
/// [`UpdateOutcome::Declined`] and no side effects. Implemented for any
/// `Fn(&UpdateAvailableInfo) -> bool` closure.
pub trait ConfirmationGate: Send + Sync {
    /// Decide whether the offered update should be applied.
    fn confirm(&self, info: &UpdateAvailableInfo) -> bool;
}

impl<F> ConfirmationGate for F
where
    F: Fn(&UpdateAvailableInfo) -> bool + Send + Sync,
{
    fn confirm(&self, info: &UpdateAvailableInfo) -> bool {
        self(info)
    }
}

/// The default gate: proceed without asking.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl ConfirmationGate for AutoConfirm {
    fn confirm(&self, _info: &UpdateAvailableInfo) -> bool {
        true
    }
}

/// How an update run ended, when it did not fail.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// The remote build does not supersede the local one.
    UpToDate(UpdateAvailableInfo),
    /// An update was available but the confirmation gate declined it.
    Declined(UpdateAvailableInfo),
    /// The update was downloaded, verified and applied. The host decides
    /// whether to restart.
    Applied(UpdateAvailableInfo),
}

impl UpdateOutcome {
    /// Whether files under the install root were replaced.
    #[must_use]
    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// An in-place update client for one install root.
///
/// Constructed once with its source and install root, optionally
/// customized through the `with_*` methods, then driven with [`run`].
/// Nothing on the client mutates after construction; a run borrows the
/// client immutably and may be repeated (each invocation is a fresh run,
/// typically one per process start).
///
/// One client instance per install root is assumed. Two instances
/// mutating the same root concurrently are not defended against; there
/// is no lock file.
///
/// [`run`]: UpdateClient::run
pub struct UpdateClient {
    source: UpdateSource,
    install_root: PathBuf,
    gate: Box<dyn ConfirmationGate>,
    progress: Box<dyn ProgressSink>,
    cancel: CancelHandle,
}

impl UpdateClient {
    /// Create a client reading from `source` and updating `install_root`.
    ///
    /// The install root is always explicit. Hosts that want the directory
    /// of the running binary pass it in themselves; the client never
    /// derives paths from process-global state, which keeps it honest
    /// against a temporary directory under test.
    pub fn new(source: UpdateSource, install_root: impl Into<PathBuf>) -> Self {
        Self {
            source,
            install_root: install_root.into(),
            gate: Box::new(AutoConfirm),
            progress: Box::new(DiscardProgress),
            cancel: CancelHandle::new(),
        }
    }

    /// Replace the confirmation gate. The default proceeds unconditionally.
    #[must_use]
    pub fn with_confirmation_gate(mut self, gate: impl ConfirmationGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    /// Replace the progress sink. The default discards all events.
    #[must_use]
    pub fn with_progress_sink(mut self, progress: impl ProgressSink + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    /// Attach a cancellation handle shared with the host.
    #[must_use]
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// The install root this client mutates.
    #[must_use]
    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Compare local and remote versions without changing anything.
    ///
    /// Both manifests are fetched concurrently; a side that cannot be
    /// fetched counts as version 0, so this never fails.
    pub async fn check_for_update(&self) -> UpdateAvailableInfo {
        let (remote, local) = tokio::join!(self.remote_or_baseline(), self.local_or_baseline());
        let info = compare(&local, &remote);
        debug!(
            local = info.local_version,
            remote = info.remote_version,
            available = info.update_available(),
            "version check complete"
        );
        info
    }

    /// Execute one full update run.
    ///
    /// # Errors
    ///
    /// Fails on download, verification or apply errors, and on
    /// cancellation ([`UpdateError::Cancelled`]). Entries already applied
    /// when an error occurs stay applied; there is no rollback and no
    /// automatic retry. Re-running on the next process start is the
    /// host's responsibility.
    pub async fn run(&self) -> Result<UpdateOutcome, UpdateError> {
        let result = self.run_inner().await;
        if let Err(err) = &result {
            error!(
                source = %self.source.describe(),
                root = %self.install_root.display(),
                error = %err,
                "update run failed"
            );
        }
        result
    }

    async fn run_inner(&self) -> Result<UpdateOutcome, UpdateError> {
        quarantine::purge(&self.install_root).await;

        let (remote, local) = tokio::join!(self.remote_or_baseline(), self.local_or_baseline());
        let info = compare(&local, &remote);
        if !info.update_available() {
            info!(version = info.local_version, "no update available");
            return Ok(UpdateOutcome::UpToDate(info));
        }

        if !self.gate.confirm(&info) {
            info!(
                local = info.local_version,
                remote = info.remote_version,
                "update declined by host"
            );
            return Ok(UpdateOutcome::Declined(info));
        }

        let artifact = tempfile::Builder::new()
            .prefix("liveupdate-")
            .suffix(".zip")
            .tempfile()?
            .into_temp_path();
        self.source.download_artifact(&artifact, &*self.progress, &self.cancel).await?;

        self.verify_artifact(&artifact, &remote).await?;

        apply::apply_archive(&artifact, &self.install_root, &*self.progress, &self.cancel)
            .await?;

        // Re-fetch rather than reuse the earlier copy so the persisted
        // manifest is the one the store currently serves.
        let refreshed = self.source.fetch_manifest().await?;
        refreshed.save_local(&self.install_root).await?;

        info!(
            from = info.local_version,
            to = refreshed.version,
            "update applied"
        );
        Ok(UpdateOutcome::Applied(info))
    }

    /// Gate extraction on the digest published in the manifest. Manifests
    /// from older publishers carry no digest; those are applied with a
    /// warning rather than rejected.
    async fn verify_artifact(
        &self,
        artifact: &Path,
        remote: &VersionManifest,
    ) -> Result<(), UpdateError> {
        let Some(expected) = remote.md5.as_deref() else {
            warn!("remote manifest has no digest, skipping artifact verification");
            return Ok(());
        };
        let actual = md5_base64(&tokio::fs::read(artifact).await?);
        if actual != expected.trim() {
            return Err(UpdateError::ChecksumMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
        debug!("artifact digest verified");
        Ok(())
    }

    async fn remote_or_baseline(&self) -> VersionManifest {
        match self.source.fetch_manifest().await {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(
                    source = %self.source.describe(),
                    error = %err,
                    "remote manifest unavailable, treating as version 0"
                );
                VersionManifest::default()
            }
        }
    }

    async fn local_or_baseline(&self) -> VersionManifest {
        match VersionManifest::load_local(&self.install_root).await {
            Ok(Some(manifest)) => manifest,
            Ok(None) => VersionManifest::default(),
            Err(err) => {
                warn!(
                    root = %self.install_root.display(),
                    error = %err,
                    "local manifest unreadable, treating as version 0"
                );
                VersionManifest::default()
            }
        }
    }
}
