//! liveupdate - in-place self-update for deployed applications.
//!
//! A deployed application embeds the [`UpdateClient`] and, typically once
//! per start, lets it poll a caller-supplied base location for a newer
//! build. The matching `liveupdate-publish` tool packages build outputs
//! into a versioned artifact and writes it, with its manifest, to the
//! same location.
//!
//! # How an update run works
//!
//! 1. Quarantined files left by the previous run are purged.
//! 2. The remote and local manifests are fetched concurrently and
//!    compared along two independent axes: the integer publish counter
//!    and the optional product version. Either axis alone can signal an
//!    update; an unreachable side counts as version 0.
//! 3. A host-supplied [`ConfirmationGate`] decides whether to proceed.
//! 4. The artifact streams to a private temporary file with percentage
//!    progress and cooperative cancellation at every chunk.
//! 5. The download is verified against the manifest's digest, then
//!    extracted entry by entry into the install root. A destination file
//!    that already exists, including binaries the running process has
//!    locked, is renamed aside (quarantined) first; the rename is atomic,
//!    so a crash never loses the file. The leftovers are deleted by step
//!    1 of a later run, once the old process has exited.
//! 6. The remote manifest is persisted as the new local manifest and
//!    [`UpdateOutcome::Applied`] is returned. Restarting is the host's
//!    decision; the client never restarts anything itself.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use liveupdate::{UpdateClient, UpdateOutcome, UpdateSource};
//!
//! # async fn example() -> Result<(), liveupdate::UpdateError> {
//! let client = UpdateClient::new(
//!     UpdateSource::http("https://updates.example.net/myapp/v1"),
//!     "/opt/myapp",
//! );
//! if let UpdateOutcome::Applied(info) = client.run().await? {
//!     println!("updated {} -> {}, restart to pick it up",
//!              info.local_version, info.remote_version);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Publishing
//!
//! ```bash
//! liveupdate-publish --source target/release \
//!     --destination /srv/updates/myapp --destinationtype path
//!
//! liveupdate-publish --source target/release \
//!     --destination myapp/v1 --destinationtype azure \
//!     --container public --accountname acct --accountkey $KEY
//! ```
//!
//! Each publish overwrites `software.zip` and `software.xml` under the
//! destination prefix and bumps the manifest's counter by one.
//!
//! # Modules
//!
//! - [`updater`] - the client state machine and quarantine handling
//! - [`manifest`] - the shared manifest document
//! - [`version`] - two-axis version comparison
//! - [`source`] - where the client fetches from (HTTP or directory)
//! - [`store`] - where the publisher writes to (filesystem or blob)
//! - [`packager`] - build-output packaging and publishing
//! - [`progress`], [`cancel`] - host-facing progress and cancellation
//! - [`cli`] - the argument surface of `liveupdate-publish`

pub mod cancel;
pub mod cli;
pub mod error;
pub mod manifest;
pub mod packager;
pub mod progress;
pub mod source;
pub mod store;
pub mod updater;
pub mod version;

pub use cancel::CancelHandle;
pub use error::UpdateError;
pub use manifest::VersionManifest;
pub use progress::{ProgressEvent, ProgressSink, UpdateStep};
pub use source::UpdateSource;
pub use updater::{ConfirmationGate, UpdateClient, UpdateOutcome};
pub use version::UpdateAvailableInfo;
