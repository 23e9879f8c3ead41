//! Artifact stores the publisher writes to.
//!
//! A store holds exactly two names under a destination prefix:
//! `software.zip` and `software.xml`. Publishing overwrites both in
//! place; history is not kept. Two backends exist: a filesystem directory
//! (local disk or network share) and an HTTP blob store with container
//! semantics ([`azure`]). The client never uses this module; it reads
//! through [`UpdateSource`](crate::source::UpdateSource), which only
//! needs GET.

pub mod azure;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::manifest::{MANIFEST_FILE, VersionManifest};
use crate::store::azure::AzureBlobStore;

/// A publish destination.
pub enum ArtifactStore {
    /// Directory prefix on a local or network filesystem.
    Fs(FsStore),
    /// Blob container over HTTP with Shared Key authentication.
    AzureBlob(AzureBlobStore),
}

impl ArtifactStore {
    /// A filesystem store rooted at `prefix`. The directory is created on
    /// first write.
    pub fn fs(prefix: impl Into<PathBuf>) -> Self {
        Self::Fs(FsStore { prefix: prefix.into() })
    }

    /// An Azure-style blob store. `prefix` is the blob-name prefix inside
    /// the container; the container is created if missing on first write.
    pub fn azure_blob(
        account: impl Into<String>,
        key: impl Into<String>,
        container: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self::AzureBlob(AzureBlobStore::new(account, key, container, prefix))
    }

    /// Read the manifest currently published in this store.
    ///
    /// `Ok(None)` means the store has never been published to; the caller
    /// starts from the version-0 baseline.
    pub async fn fetch_manifest(&self) -> Result<Option<VersionManifest>> {
        let xml = match self {
            Self::Fs(store) => store.get_text(MANIFEST_FILE).await?,
            Self::AzureBlob(store) => store.get_text(MANIFEST_FILE).await?,
        };
        match xml {
            Some(xml) => Ok(Some(
                VersionManifest::from_xml(&xml).context("published manifest is malformed")?,
            )),
            None => Ok(None),
        }
    }

    /// Upload a local file under `name`, overwriting any previous blob.
    pub async fn put_file(&self, name: &str, local: &Path) -> Result<()> {
        match self {
            Self::Fs(store) => store.put_file(name, local).await,
            Self::AzureBlob(store) => {
                let bytes = tokio::fs::read(local)
                    .await
                    .with_context(|| format!("failed to read {}", local.display()))?;
                store.put_bytes(name, bytes, "application/zip").await
            }
        }
    }

    /// Publish a manifest, overwriting the previous one.
    pub async fn put_manifest(&self, manifest: &VersionManifest) -> Result<()> {
        let xml = manifest.to_xml().context("failed to encode manifest")?;
        match self {
            Self::Fs(store) => store.put_text(MANIFEST_FILE, &xml).await,
            Self::AzureBlob(store) => {
                store.put_bytes(MANIFEST_FILE, xml.into_bytes(), "application/xml").await
            }
        }
    }

    /// Location string for log and error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Fs(store) => store.prefix.display().to_string(),
            Self::AzureBlob(store) => store.describe(),
        }
    }
}

/// Filesystem destination: the prefix is a directory, names are files
/// directly under it.
pub struct FsStore {
    prefix: PathBuf,
}

impl FsStore {
    async fn get_text(&self, name: &str) -> Result<Option<String>> {
        let path = self.prefix.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        }
    }

    async fn put_file(&self, name: &str, local: &Path) -> Result<()> {
        self.ensure_prefix().await?;
        let dest = self.prefix.join(name);
        tokio::fs::copy(local, &dest)
            .await
            .with_context(|| format!("failed to write {}", dest.display()))?;
        debug!(dest = %dest.display(), "stored file");
        Ok(())
    }

    async fn put_text(&self, name: &str, text: &str) -> Result<()> {
        self.ensure_prefix().await?;
        let dest = self.prefix.join(name);
        tokio::fs::write(&dest, text)
            .await
            .with_context(|| format!("failed to write {}", dest.display()))?;
        debug!(dest = %dest.display(), "stored file");
        Ok(())
    }

    async fn ensure_prefix(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.prefix).await.with_context(|| {
            format!("failed to create destination directory {}", self.prefix.display())
        })
    }
}
