//! Command-line surface of the publishing tool.
//!
//! `liveupdate-publish` packages a build directory and publishes it to a
//! destination store in one invocation. Failures map to distinct exit
//! codes so build pipelines can tell the classes apart:
//!
//! | code | meaning                                  |
//! |------|------------------------------------------|
//! | 0    | published                                |
//! | 2    | usage error                              |
//! | 3    | source enumeration or packaging failure  |
//! | 4    | artifact store failure                   |

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::packager::{self, PublishError, PublishOutcome};
use crate::store::ArtifactStore;

/// Package a build directory and publish it as an update.
#[derive(Debug, Parser)]
#[command(
    name = "liveupdate-publish",
    version,
    about = "Package build outputs and publish them to an update store"
)]
pub struct Cli {
    /// Build directory to package.
    #[arg(short, long, value_name = "DIR")]
    pub source: PathBuf,

    /// Destination prefix: a directory for the path backend, a blob-name
    /// prefix inside the container for the azure backend.
    #[arg(short, long, value_name = "PREFIX")]
    pub destination: String,

    /// Which kind of store the destination names.
    #[arg(long = "destinationtype", value_enum, value_name = "TYPE")]
    pub destination_type: DestinationType,

    /// Blob container to publish into (azure backend).
    #[arg(short, long, value_name = "NAME", default_value = "public")]
    pub container: String,

    /// Storage account name (azure backend).
    #[arg(short = 'a', long, value_name = "NAME", required_if_eq("destination_type", "azure"))]
    pub accountname: Option<String>,

    /// Storage account key, base64 (azure backend).
    #[arg(short = 'k', long, value_name = "KEY", required_if_eq("destination_type", "azure"))]
    pub accountkey: Option<String>,

    /// Product version to record as the manifest's secondary ordering
    /// axis. Omitted: the previously published value is carried forward.
    #[arg(long = "fileversion", value_name = "VERSION")]
    pub file_version: Option<String>,
}

/// Supported artifact store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DestinationType {
    /// Local or network filesystem directory.
    Path,
    /// Azure-style blob container.
    Azure,
}

impl Cli {
    /// Build the destination store and publish.
    pub async fn execute(self) -> Result<PublishOutcome, PublishError> {
        let store = match self.destination_type {
            DestinationType::Path => ArtifactStore::fs(&self.destination),
            DestinationType::Azure => {
                // clap enforces both through required_if_eq; this guards
                // direct construction of the struct.
                let account = self.accountname.ok_or_else(|| {
                    PublishError::Store(anyhow::anyhow!(
                        "--accountname is required with --destinationtype azure"
                    ))
                })?;
                let key = self.accountkey.ok_or_else(|| {
                    PublishError::Store(anyhow::anyhow!(
                        "--accountkey is required with --destinationtype azure"
                    ))
                })?;
                ArtifactStore::azure_blob(account, key, self.container, self.destination)
            }
        };

        packager::publish(&self.source, &store, self.file_version.as_deref()).await
    }
}

/// Exit code for a publish failure.
pub fn exit_code(error: &PublishError) -> i32 {
    match error {
        PublishError::Package(_) => 3,
        PublishError::Store(_) => 4,
    }
}
