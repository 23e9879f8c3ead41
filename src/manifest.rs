//! The version manifest shared between publisher and client.
//!
//! A manifest is a small XML document describing the latest published
//! build. The publisher writes one next to the packaged artifact on every
//! publish; the client keeps a copy of the last manifest it applied in the
//! install root and compares the two to decide whether an update exists.
//!
//! The wire format is fixed by already-deployed stores and kept verbatim,
//! including the misspelled `FileLenght` element:
//!
//! ```xml
//! <Liveupdate>
//!   <Version>7</Version>
//!   <FileVersion>1.4.0</FileVersion>
//!   <MD5>5Z7wReuBdB3VMTLXE9bVgQ==</MD5>
//!   <FileLenght>1048576</FileLenght>
//! </Liveupdate>
//! ```
//!
//! Only `Version` is required. Manifests written by older publishers carry
//! neither `FileVersion` nor `MD5`; the client treats both as absent.

use std::io;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::UpdateError;

/// File name of the manifest, both in the store and in the install root.
pub const MANIFEST_FILE: &str = "software.xml";

/// File name of the packaged artifact in the store.
pub const ARTIFACT_FILE: &str = "software.zip";

/// Metadata describing one published build.
///
/// Immutable once published; each publish supersedes the previous manifest
/// by overwriting it in the store. The `version` counter increases by
/// exactly one per publish and is the primary ordering key; `file_version`
/// is an independent secondary axis (see [`crate::version::compare`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "Liveupdate")]
pub struct VersionManifest {
    /// Monotonic publish counter.
    #[serde(rename = "Version")]
    pub version: u32,

    /// Optional product version, an ordering axis independent of
    /// `version`. Stored as text; parsed leniently at comparison time.
    #[serde(rename = "FileVersion", default, skip_serializing_if = "Option::is_none")]
    pub file_version: Option<String>,

    /// Base64 MD5 digest of the artifact bytes at publish time.
    #[serde(rename = "MD5", default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,

    /// Artifact byte length, informational. The element name carries a
    /// historical typo that deployed stores depend on.
    #[serde(rename = "FileLenght", default, skip_serializing_if = "Option::is_none")]
    pub file_length: Option<u64>,
}

impl Default for VersionManifest {
    /// The baseline manifest: version 0, no secondary axis, no digest.
    ///
    /// Used both by the publisher when a store has no manifest yet and by
    /// the client when either side of the version check is unreachable.
    fn default() -> Self {
        Self { version: 0, file_version: None, md5: None, file_length: None }
    }
}

impl VersionManifest {
    /// Parse a manifest from its XML form.
    pub fn from_xml(xml: &str) -> Result<Self, UpdateError> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    /// Encode the manifest to its XML form.
    pub fn to_xml(&self) -> Result<String, UpdateError> {
        Ok(quick_xml::se::to_string(self)?)
    }

    /// Read the local manifest copy from an install root.
    ///
    /// Returns `Ok(None)` when no copy exists yet (a fresh installation
    /// that has never applied an update).
    pub async fn load_local(install_root: &Path) -> Result<Option<Self>, UpdateError> {
        let path = install_root.join(MANIFEST_FILE);
        let xml = match tokio::fs::read_to_string(&path).await {
            Ok(xml) => xml,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no local manifest");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Some(Self::from_xml(&xml)?))
    }

    /// Persist this manifest as the local copy in an install root.
    pub async fn save_local(&self, install_root: &Path) -> Result<(), UpdateError> {
        let path = install_root.join(MANIFEST_FILE);
        tokio::fs::write(&path, self.to_xml()?).await?;
        debug!(path = %path.display(), version = self.version, "saved local manifest");
        Ok(())
    }
}

/// Compute the base64 MD5 digest used in the manifest's `MD5` field.
pub fn md5_base64(bytes: &[u8]) -> String {
    BASE64.encode(Md5::digest(bytes))
}
