//! Packaging build outputs and publishing them.
//!
//! The publishing side of the contract: enumerate the deployable files
//! under a build directory, compress them into `software.zip` with
//! source-relative entry names, digest the finished archive, bump the
//! manifest's publish counter by exactly one and upload both files to the
//! destination store. The artifact is uploaded before the manifest so a
//! client that observes the new version always finds the matching bytes.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use indicatif::ProgressBar;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use crate::manifest::{ARTIFACT_FILE, VersionManifest, md5_base64};
use crate::store::ArtifactStore;

/// File extensions considered part of a deployed build.
const PACKAGED_EXTENSIONS: &[&str] = &["dll", "config", "exe"];

/// Debug-host binaries are never shipped.
const EXCLUDED_NAME_FRAGMENT: &str = "vshost";

/// A publish failure, split by phase so the CLI can map each class to its
/// own exit code.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Enumerating or compressing the build outputs failed.
    #[error("failed to package build outputs")]
    Package(#[source] anyhow::Error),

    /// Talking to the artifact store failed.
    #[error("failed to publish to the artifact store")]
    Store(#[source] anyhow::Error),
}

/// What a successful publish did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Counter before this publish (0 for a fresh store).
    pub previous_version: u32,
    /// Counter the new manifest carries, always `previous_version + 1`.
    pub version: u32,
    /// Number of files packaged.
    pub files: usize,
    /// Byte length of the uploaded artifact.
    pub artifact_length: u64,
}

/// Package `source_dir` and publish it to `store`.
///
/// When `file_version` is given it becomes the manifest's secondary
/// ordering axis; otherwise the previously published value, if any, is
/// carried forward unchanged.
pub async fn publish(
    source_dir: &Path,
    store: &ArtifactStore,
    file_version: Option<&str>,
) -> Result<PublishOutcome, PublishError> {
    let staged = stage(source_dir).map_err(PublishError::Package)?;

    let previous = store.fetch_manifest().await.map_err(PublishError::Store)?;
    let previous_version = previous.as_ref().map_or(0, |m| m.version);
    let manifest = VersionManifest {
        version: previous_version + 1,
        file_version: file_version
            .map(str::to_string)
            .or_else(|| previous.and_then(|m| m.file_version)),
        md5: Some(staged.digest.clone()),
        file_length: Some(staged.artifact_length),
    };

    info!(dest = %store.describe(), "uploading artifact");
    store
        .put_file(ARTIFACT_FILE, &staged.archive_path)
        .await
        .map_err(PublishError::Store)?;
    store.put_manifest(&manifest).await.map_err(PublishError::Store)?;

    info!(
        previous = previous_version,
        version = manifest.version,
        files = staged.files,
        "published update"
    );
    Ok(PublishOutcome {
        previous_version,
        version: manifest.version,
        files: staged.files,
        artifact_length: staged.artifact_length,
    })
}

/// A packaged artifact waiting in its staging directory. The directory
/// (and with it the archive) is removed on drop.
struct StagedArtifact {
    _staging: tempfile::TempDir,
    archive_path: PathBuf,
    files: usize,
    artifact_length: u64,
    digest: String,
}

/// Enumerate and compress the build outputs into a staged archive.
fn stage(source_dir: &Path) -> Result<StagedArtifact> {
    ensure!(
        source_dir.is_dir(),
        "source directory {} does not exist",
        source_dir.display()
    );

    let files = collect_build_files(source_dir)?;
    ensure!(!files.is_empty(), "no build outputs found under {}", source_dir.display());
    info!(files = files.len(), source = %source_dir.display(), "packaging build outputs");

    let staging = tempfile::tempdir().context("failed to create staging directory")?;
    let archive_path = staging.path().join(ARTIFACT_FILE);
    let artifact_length = build_archive(source_dir, &files, &archive_path)?;

    let digest = md5_base64(
        &std::fs::read(&archive_path).context("failed to read staged archive")?,
    );

    Ok(StagedArtifact {
        _staging: staging,
        archive_path,
        files: files.len(),
        artifact_length,
        digest,
    })
}

/// The deployable files under `source_dir`, sorted for a deterministic
/// archive order.
pub fn collect_build_files(source_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(source_dir) {
        let entry = entry.context("failed to walk source directory")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
        let packaged = extension
            .is_some_and(|ext| PACKAGED_EXTENSIONS.contains(&ext.as_str()));
        if !packaged {
            continue;
        }
        if entry.file_name().to_string_lossy().contains(EXCLUDED_NAME_FRAGMENT) {
            debug!(path = %path.display(), "skipping debug-host binary");
            continue;
        }
        files.push(path.to_path_buf());
    }
    files.sort();
    Ok(files)
}

/// Compress `files` into a zip at `dest`, entry names relative to
/// `source_dir` with forward slashes. Returns the archive's byte length.
pub fn build_archive(source_dir: &Path, files: &[PathBuf], dest: &Path) -> Result<u64> {
    let out = std::fs::File::create(dest)
        .with_context(|| format!("failed to create archive {}", dest.display()))?;
    let mut writer = zip::ZipWriter::new(out);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let bar = ProgressBar::new(files.len() as u64);
    for path in files {
        let relative = path
            .strip_prefix(source_dir)
            .with_context(|| format!("{} is outside the source directory", path.display()))?;
        let name = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        writer
            .start_file(name.as_str(), options)
            .with_context(|| format!("failed to add archive entry {name}"))?;
        let mut input = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        std::io::copy(&mut input, &mut writer)
            .with_context(|| format!("failed to compress {}", path.display()))?;
        bar.inc(1);
    }
    bar.finish_and_clear();

    let mut out = writer.finish().context("failed to finalize archive")?;
    out.flush().context("failed to flush archive")?;

    let length = std::fs::metadata(dest).context("failed to stat archive")?.len();
    debug!(dest = %dest.display(), bytes = length, "archive staged");
    Ok(length)
}
