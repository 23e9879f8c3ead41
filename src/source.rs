//! Where the client fetches manifests and artifacts from.
//!
//! A source is a caller-supplied base location holding exactly two names,
//! `software.xml` and `software.zip`. Every publish overwrites both; there
//! is no versioning in the path. Two kinds of base are supported: an HTTP
//! URL and a directory (local disk or network share). Both stream the
//! artifact through the same progress and cancellation discipline.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::cancel::CancelHandle;
use crate::error::UpdateError;
use crate::manifest::{ARTIFACT_FILE, MANIFEST_FILE, VersionManifest};
use crate::progress::{PercentTracker, ProgressSink, UpdateStep};

/// A base location the client reads `software.xml` and `software.zip`
/// from. Only GET semantics are needed here; publishing goes through
/// [`ArtifactStore`](crate::store::ArtifactStore).
#[derive(Debug, Clone)]
pub enum UpdateSource {
    /// HTTP or HTTPS base URL, e.g. a public blob container prefix.
    Http(String),
    /// Directory base path, e.g. a network share.
    Dir(PathBuf),
}

impl UpdateSource {
    /// An HTTP source. A trailing slash on the base is optional.
    pub fn http(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self::Http(base.trim_end_matches('/').to_string())
    }

    /// A directory source.
    pub fn dir(base: impl Into<PathBuf>) -> Self {
        Self::Dir(base.into())
    }

    /// Human-readable location for log lines.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Http(base) => base.clone(),
            Self::Dir(base) => base.display().to_string(),
        }
    }

    /// Fetch and parse the remote manifest.
    pub async fn fetch_manifest(&self) -> Result<VersionManifest, UpdateError> {
        match self {
            Self::Http(base) => {
                let url = format!("{base}/{MANIFEST_FILE}");
                debug!(%url, "fetching remote manifest");
                let response = reqwest::get(&url).await?;
                if !response.status().is_success() {
                    return Err(UpdateError::UnexpectedStatus {
                        status: response.status(),
                        url,
                    });
                }
                VersionManifest::from_xml(&response.text().await?)
            }
            Self::Dir(base) => {
                let path = base.join(MANIFEST_FILE);
                debug!(path = %path.display(), "reading remote manifest");
                let xml = tokio::fs::read_to_string(&path).await?;
                VersionManifest::from_xml(&xml)
            }
        }
    }

    /// Stream the artifact to `dest`, reporting download percentage and
    /// aborting as soon as `cancel` fires, including mid-read.
    ///
    /// Returns the number of bytes written. On error or cancellation the
    /// destination may hold a partial download; the caller owns its
    /// cleanup (the client points this at a temporary file that is
    /// dropped either way).
    pub async fn download_artifact(
        &self,
        dest: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancelHandle,
    ) -> Result<u64, UpdateError> {
        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }
        match self {
            Self::Http(base) => {
                let url = format!("{base}/{ARTIFACT_FILE}");
                info!(%url, "downloading update artifact");
                let mut response = reqwest::get(&url).await?;
                if !response.status().is_success() {
                    return Err(UpdateError::UnexpectedStatus {
                        status: response.status(),
                        url,
                    });
                }

                let mut tracker =
                    PercentTracker::new(UpdateStep::Download, response.content_length());
                let mut out = tokio::fs::File::create(dest).await?;
                let mut written = 0u64;
                loop {
                    let chunk = tokio::select! {
                        _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
                        chunk = response.chunk() => chunk?,
                    };
                    let Some(bytes) = chunk else { break };
                    out.write_all(&bytes).await?;
                    written += bytes.len() as u64;
                    tracker.advance(written, progress);
                }
                out.flush().await?;
                tracker.finish(progress);
                Ok(written)
            }
            Self::Dir(base) => {
                let path = base.join(ARTIFACT_FILE);
                info!(path = %path.display(), "copying update artifact");
                let mut input = tokio::fs::File::open(&path).await?;
                let total = input.metadata().await?.len();

                let mut tracker = PercentTracker::new(UpdateStep::Download, Some(total));
                let mut out = tokio::fs::File::create(dest).await?;
                let mut buf = vec![0u8; 64 * 1024];
                let mut written = 0u64;
                loop {
                    let read = tokio::select! {
                        _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
                        read = input.read(&mut buf) => read?,
                    };
                    if read == 0 {
                        break;
                    }
                    out.write_all(&buf[..read]).await?;
                    written += read as u64;
                    tracker.advance(written, progress);
                }
                out.flush().await?;
                tracker.finish(progress);
                Ok(written)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressEvent;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[tokio::test]
    async fn dir_source_fetches_manifest() {
        let store = tempdir().unwrap();
        let manifest = VersionManifest { version: 4, ..Default::default() };
        tokio::fs::write(store.path().join(MANIFEST_FILE), manifest.to_xml().unwrap())
            .await
            .unwrap();

        let source = UpdateSource::dir(store.path());
        assert_eq!(source.fetch_manifest().await.unwrap(), manifest);
    }

    #[tokio::test]
    async fn dir_source_streams_artifact_with_progress() {
        let store = tempdir().unwrap();
        let payload = vec![0xabu8; 200 * 1024];
        tokio::fs::write(store.path().join(ARTIFACT_FILE), &payload).await.unwrap();

        let dest_dir = tempdir().unwrap();
        let dest = dest_dir.path().join("artifact.zip");
        let seen = Mutex::new(Vec::new());
        let sink = |event: ProgressEvent| {
            assert_eq!(event.step, UpdateStep::Download);
            seen.lock().unwrap().push(event.percent);
        };

        let source = UpdateSource::dir(store.path());
        let written = source
            .download_artifact(&dest, &sink, &CancelHandle::new())
            .await
            .unwrap();

        assert_eq!(written, payload.len() as u64);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), payload);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[tokio::test]
    async fn pre_cancelled_download_writes_nothing() {
        let store = tempdir().unwrap();
        tokio::fs::write(store.path().join(ARTIFACT_FILE), b"payload").await.unwrap();

        let dest_dir = tempdir().unwrap();
        let dest = dest_dir.path().join("artifact.zip");
        let cancel = CancelHandle::new();
        cancel.cancel();

        let source = UpdateSource::dir(store.path());
        let err = source
            .download_artifact(&dest, &crate::progress::DiscardProgress, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Cancelled));
        assert!(!dest.exists());
    }

    #[test]
    fn http_base_trailing_slash_is_normalized() {
        let source = UpdateSource::http("https://updates.example.net/app/v1/");
        let UpdateSource::Http(base) = source else { panic!("expected http source") };
        assert_eq!(base, "https://updates.example.net/app/v1");
    }
}
