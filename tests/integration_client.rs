//! End-to-end update-client scenarios against temporary install roots.

use std::io::Write as _;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use liveupdate::manifest::{ARTIFACT_FILE, MANIFEST_FILE, md5_base64};
use liveupdate::packager;
use liveupdate::store::ArtifactStore;
use liveupdate::{
    CancelHandle, ProgressEvent, UpdateClient, UpdateError, UpdateOutcome, UpdateSource,
    UpdateStep, VersionManifest,
};
use tempfile::{TempDir, tempdir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Lay out a fake build directory with the given files.
fn build_tree(entries: &[(&str, &[u8])]) -> TempDir {
    let dir = tempdir().unwrap();
    for (name, bytes) in entries {
        let path = dir.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }
    dir
}

/// Publish a build directory into a fresh store directory.
async fn publish_to(store_dir: &Path, build: &TempDir) {
    let store = ArtifactStore::fs(store_dir);
    packager::publish(build.path(), &store, None).await.unwrap();
}

/// Write a zip with the given entries plus a matching manifest.
fn write_store(store_dir: &Path, manifest: &mut VersionManifest, entries: &[(&str, &[u8])]) {
    let zip_path = store_dir.join(ARTIFACT_FILE);
    let file = std::fs::File::create(&zip_path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, bytes) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();

    let bytes = std::fs::read(&zip_path).unwrap();
    manifest.md5 = Some(md5_base64(&bytes));
    manifest.file_length = Some(bytes.len() as u64);
    std::fs::write(store_dir.join(MANIFEST_FILE), manifest.to_xml().unwrap()).unwrap();
}

#[tokio::test]
async fn end_to_end_update_replaces_locked_file() {
    // Publish version 1, install it, then publish version 2.
    let store_dir = tempdir().unwrap();
    let build_v1 = build_tree(&[("app.exe", b"build one"), ("plugins/ext.dll", b"ext one")]);
    publish_to(store_dir.path(), &build_v1).await;

    let install = tempdir().unwrap();
    std::fs::copy(
        store_dir.path().join(MANIFEST_FILE),
        install.path().join(MANIFEST_FILE),
    )
    .unwrap();
    std::fs::write(install.path().join("app.exe"), b"build one").unwrap();
    // A leftover from an earlier (simulated) update run.
    std::fs::write(install.path().join("app.exe.liveupdate-old"), b"stale").unwrap();

    let build_v2 = build_tree(&[("app.exe", b"build two"), ("plugins/ext.dll", b"ext two")]);
    publish_to(store_dir.path(), &build_v2).await;

    let client = UpdateClient::new(UpdateSource::dir(store_dir.path()), install.path());

    let outcome = client.run().await.unwrap();
    assert!(outcome.applied());

    // The new build is in place and the old binary was renamed aside.
    assert_eq!(
        std::fs::read(install.path().join("app.exe")).unwrap(),
        b"build two"
    );
    assert_eq!(
        std::fs::read(install.path().join("plugins/ext.dll")).unwrap(),
        b"ext two"
    );
    assert_eq!(
        std::fs::read(install.path().join("app.exe.liveupdate-old")).unwrap(),
        b"build one"
    );

    // The local manifest advanced to the published version.
    let local = VersionManifest::load_local(install.path()).await.unwrap().unwrap();
    assert_eq!(local.version, 2);
}

#[tokio::test]
async fn progress_covers_download_and_apply() {
    let store_dir = tempdir().unwrap();
    let build = build_tree(&[("app.exe", &[7u8; 32 * 1024])]);
    publish_to(store_dir.path(), &build).await;

    let install = tempdir().unwrap();
    let events: &'static Mutex<Vec<ProgressEvent>> =
        Box::leak(Box::new(Mutex::new(Vec::new())));
    let client = UpdateClient::new(UpdateSource::dir(store_dir.path()), install.path())
        .with_progress_sink(|event: ProgressEvent| events.lock().unwrap().push(event));

    client.run().await.unwrap();

    let events = events.lock().unwrap();
    let download_final = events
        .iter()
        .filter(|e| e.step == UpdateStep::Download)
        .next_back()
        .unwrap();
    let apply_final =
        events.iter().filter(|e| e.step == UpdateStep::Apply).next_back().unwrap();
    assert_eq!(download_final.percent, 100);
    assert_eq!(apply_final.percent, 100);
}

#[tokio::test]
async fn two_axis_update_is_detected_despite_equal_counters() {
    let store_dir = tempdir().unwrap();
    let mut remote = VersionManifest {
        version: 5,
        file_version: Some("1.3.0".to_string()),
        ..Default::default()
    };
    write_store(store_dir.path(), &mut remote, &[("app.exe", b"newer product")]);

    let install = tempdir().unwrap();
    let local = VersionManifest {
        version: 5,
        file_version: Some("1.2.0".to_string()),
        ..Default::default()
    };
    local.save_local(install.path()).await.unwrap();

    let client = UpdateClient::new(UpdateSource::dir(store_dir.path()), install.path());
    let info = client.check_for_update().await;
    assert!(info.update_available());
    assert_eq!(info.local_version, 5);
    assert_eq!(info.remote_version, 5);

    let outcome = client.run().await.unwrap();
    assert!(outcome.applied());
    assert_eq!(
        std::fs::read(install.path().join("app.exe")).unwrap(),
        b"newer product"
    );
}

#[tokio::test]
async fn unreachable_remote_means_no_update() {
    let install = tempdir().unwrap();
    let local = VersionManifest { version: 3, ..Default::default() };
    local.save_local(install.path()).await.unwrap();

    let missing = install.path().join("no-such-store");
    let client = UpdateClient::new(UpdateSource::dir(&missing), install.path());

    let info = client.check_for_update().await;
    assert!(!info.update_available());
    assert_eq!(info.remote_version, 0);

    let outcome = client.run().await.unwrap();
    assert!(matches!(outcome, UpdateOutcome::UpToDate(_)));
}

#[tokio::test]
async fn purge_runs_even_when_no_update_is_available() {
    let install = tempdir().unwrap();
    std::fs::write(install.path().join("old.dll.liveupdate-old"), b"stale").unwrap();
    let local = VersionManifest { version: 3, ..Default::default() };
    local.save_local(install.path()).await.unwrap();

    let missing = install.path().join("no-such-store");
    let client = UpdateClient::new(UpdateSource::dir(&missing), install.path());
    client.run().await.unwrap();

    assert!(!install.path().join("old.dll.liveupdate-old").exists());
}

#[tokio::test]
async fn declined_update_has_no_side_effects() {
    let store_dir = tempdir().unwrap();
    let build = build_tree(&[("app.exe", b"new build")]);
    publish_to(store_dir.path(), &build).await;

    let install = tempdir().unwrap();
    let client = UpdateClient::new(UpdateSource::dir(store_dir.path()), install.path())
        .with_confirmation_gate(|_: &liveupdate::UpdateAvailableInfo| false);

    let outcome = client.run().await.unwrap();
    assert!(matches!(outcome, UpdateOutcome::Declined(_)));
    assert!(!install.path().join("app.exe").exists());
    assert!(!install.path().join(MANIFEST_FILE).exists());
}

#[tokio::test]
async fn corrupt_artifact_fails_before_touching_the_install_root() {
    let store_dir = tempdir().unwrap();
    let build = build_tree(&[("app.exe", b"good build")]);
    publish_to(store_dir.path(), &build).await;

    // Corrupt the artifact after the manifest recorded its digest.
    let zip_path = store_dir.path().join(ARTIFACT_FILE);
    let mut bytes = std::fs::read(&zip_path).unwrap();
    bytes.extend_from_slice(b"tampered");
    std::fs::write(&zip_path, bytes).unwrap();

    let install = tempdir().unwrap();
    std::fs::write(install.path().join("app.exe"), b"current build").unwrap();

    let client = UpdateClient::new(UpdateSource::dir(store_dir.path()), install.path());
    let err = client.run().await.unwrap_err();

    assert!(matches!(err, UpdateError::ChecksumMismatch { .. }));
    assert_eq!(
        std::fs::read(install.path().join("app.exe")).unwrap(),
        b"current build"
    );
    assert!(!install.path().join(MANIFEST_FILE).exists());
}

#[tokio::test]
async fn traversal_entries_never_escape_the_install_root() {
    let store_dir = tempdir().unwrap();
    let mut remote = VersionManifest { version: 1, ..Default::default() };
    write_store(store_dir.path(), &mut remote, &[("../escape.txt", b"evil")]);

    let outer = tempdir().unwrap();
    let install = outer.path().join("install");
    std::fs::create_dir_all(&install).unwrap();

    let client = UpdateClient::new(UpdateSource::dir(store_dir.path()), &install);
    let err = client.run().await.unwrap_err();

    assert!(matches!(err, UpdateError::PathTraversal { .. }));
    assert!(!outer.path().join("escape.txt").exists());
}

/// Minimal HTTP fixture: serves the manifest normally, then stalls
/// forever on the artifact after a few bytes, keeping the socket open.
async fn spawn_stalling_server(manifest: VersionManifest) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { return };
            let xml = manifest.to_xml().unwrap();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut request = Vec::new();
                loop {
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    request.extend_from_slice(&buf[..n]);
                    if request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let request = String::from_utf8_lossy(&request);
                if request.contains("software.xml") {
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{xml}",
                        xml.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                } else {
                    // Announce a large body, send a token amount, then
                    // hold the connection open without further bytes.
                    let _ = socket
                        .write_all(
                            b"HTTP/1.1 200 OK\r\nContent-Length: 1048576\r\n\r\npartial",
                        )
                        .await;
                    let _ = socket.flush().await;
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
            });
        }
    });
    addr
}

#[tokio::test]
async fn cancellation_aborts_a_stalled_download() {
    let manifest = VersionManifest { version: 2, ..Default::default() };
    let addr = spawn_stalling_server(manifest).await;

    let install = tempdir().unwrap();
    let cancel = CancelHandle::new();
    let client = UpdateClient::new(UpdateSource::http(format!("http://{addr}")), install.path())
        .with_cancel_handle(cancel.clone());

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    // The transfer never completes on its own; cancellation must end the
    // run promptly even though the server keeps the socket open.
    let result = tokio::time::timeout(Duration::from_secs(5), client.run())
        .await
        .expect("cancellation did not interrupt the stalled download");

    assert!(matches!(result.unwrap_err(), UpdateError::Cancelled));
    // Nothing was written into the install root.
    let leftovers: Vec<_> = std::fs::read_dir(install.path())
        .unwrap()
        .filter_map(Result::ok)
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
}
