//! Error types for the update client.
//!
//! The client reports every failure through [`UpdateError`] so hosts can
//! match on the failure class instead of parsing messages. The publisher
//! side uses `anyhow` with context strings instead; its failures terminate
//! a CLI invocation rather than a long-lived host process.
//!
//! Two failure classes deliberately never surface as errors: a manifest
//! fetch that fails during the version check (the unreachable side is
//! treated as version 0), and a quarantined file that cannot be deleted
//! during the purge pass (left for the next run). Both are logged and
//! absorbed by the orchestrator.

use std::path::PathBuf;

use thiserror::Error;

/// The error type for update-client operations.
///
/// Variants map to the failure classes of a run: manifest handling,
/// artifact transfer, integrity verification, and in-place file
/// replacement. Errors during the apply phase leave already-replaced
/// files in place; there is no rollback.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The manifest document could not be parsed.
    #[error("failed to parse version manifest")]
    ManifestParse(#[from] quick_xml::DeError),

    /// The manifest document could not be encoded.
    #[error("failed to encode version manifest")]
    ManifestEncode(#[from] quick_xml::SeError),

    /// An HTTP request failed before yielding a response body.
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// The remote side answered with a non-success status.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus {
        /// Status code returned by the server.
        status: reqwest::StatusCode,
        /// The requested URL.
        url: String,
    },

    /// The run was cancelled through its [`CancelHandle`](crate::CancelHandle).
    #[error("update run was cancelled")]
    Cancelled,

    /// The downloaded artifact does not match the digest published in the
    /// manifest. Nothing under the install root has been modified when
    /// this is returned.
    #[error("artifact digest mismatch: manifest has {expected}, downloaded bytes hash to {actual}")]
    ChecksumMismatch {
        /// Digest recorded in the remote manifest (base64).
        expected: String,
        /// Digest of the downloaded bytes (base64).
        actual: String,
    },

    /// An archive entry would resolve to a path outside the install root.
    #[error("archive entry {entry:?} escapes the install root")]
    PathTraversal {
        /// The offending entry name as stored in the archive.
        entry: String,
    },

    /// The downloaded artifact is not a readable archive.
    #[error("invalid update archive")]
    Archive(#[from] zip::result::ZipError),

    /// An existing file could not be renamed aside before replacement.
    /// Typically a permission problem; files locked by the running
    /// process can still be renamed on mainstream filesystems.
    #[error("failed to quarantine {path:?}")]
    Quarantine {
        /// The file that was to be moved aside.
        path: PathBuf,
        /// Underlying rename failure.
        #[source]
        source: std::io::Error,
    },

    /// Any other filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
