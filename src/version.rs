//! Two-axis version comparison.
//!
//! A published build is ordered along two independent axes: the integer
//! publish counter (`Version`) and the optional product version
//! (`FileVersion`). An update is available when *either* axis is strictly
//! greater on the remote side. The axes are never collapsed into one
//! composite key; builds that bump only the product version while reusing
//! a publish counter must still be detected.

use semver::Version;
use tracing::warn;

use crate::manifest::VersionManifest;

/// The result of one version check.
///
/// Computed from the local and remote manifests once per check cycle and
/// handed to the host's [`ConfirmationGate`](crate::ConfirmationGate).
/// Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAvailableInfo {
    /// Publish counter of the manifest in the install root.
    pub local_version: u32,
    /// Publish counter of the manifest in the store.
    pub remote_version: u32,
    /// Product version of the local build, when present and parseable.
    pub local_file_version: Option<Version>,
    /// Product version of the remote build, when present and parseable.
    pub remote_file_version: Option<Version>,
}

impl UpdateAvailableInfo {
    /// Whether the remote build supersedes the local one.
    ///
    /// True when the remote side is strictly greater on either axis. A
    /// missing side of either axis compares as the lowest value, so an
    /// unreachable remote (version 0) never signals an update and a fresh
    /// install (no local manifest) accepts whatever is published.
    #[must_use]
    pub fn update_available(&self) -> bool {
        self.remote_version > self.local_version
            || self.remote_file_version > self.local_file_version
    }
}

/// Compare a local manifest against a remote one.
pub fn compare(local: &VersionManifest, remote: &VersionManifest) -> UpdateAvailableInfo {
    UpdateAvailableInfo {
        local_version: local.version,
        remote_version: remote.version,
        local_file_version: local.file_version.as_deref().and_then(parse_file_version),
        remote_file_version: remote.file_version.as_deref().and_then(parse_file_version),
    }
}

/// Parse a `FileVersion` value leniently.
///
/// Accepts strict semver as well as the dotted numeric forms assembly
/// versions tend to come in: one or two components are zero-padded and a
/// fourth revision component is dropped. Anything else is logged and
/// ignored so a malformed value fails open to "no update on this axis"
/// instead of aborting the check.
pub(crate) fn parse_file_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    let numeric: Option<Vec<u64>> =
        trimmed.split('.').map(|part| part.parse::<u64>().ok()).collect();
    match numeric.as_deref() {
        Some([major]) => Some(Version::new(*major, 0, 0)),
        Some([major, minor]) => Some(Version::new(*major, *minor, 0)),
        Some([major, minor, patch, _revision]) => Some(Version::new(*major, *minor, *patch)),
        _ => {
            warn!(value = raw, "unparseable FileVersion, ignoring for comparison");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(version: u32, file_version: Option<&str>) -> VersionManifest {
        VersionManifest {
            version,
            file_version: file_version.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn counter_axis_signals_update() {
        let info = compare(&manifest(1, None), &manifest(2, None));
        assert!(info.update_available());
        assert_eq!(info.local_version, 1);
        assert_eq!(info.remote_version, 2);
    }

    #[test]
    fn equal_and_older_counters_do_not() {
        assert!(!compare(&manifest(2, None), &manifest(2, None)).update_available());
        assert!(!compare(&manifest(3, None), &manifest(2, None)).update_available());
    }

    #[test]
    fn file_version_axis_signals_update_despite_equal_counters() {
        let local = manifest(5, Some("1.2.0"));
        let remote = manifest(5, Some("1.3.0"));
        assert!(compare(&local, &remote).update_available());
    }

    #[test]
    fn axes_are_independent_not_composite() {
        // Remote is behind on the file-version axis but ahead on the
        // counter; the counter alone must signal the update.
        let local = manifest(1, Some("2.0.0"));
        let remote = manifest(2, Some("1.0.0"));
        assert!(compare(&local, &remote).update_available());
    }

    #[test]
    fn missing_sides_compare_as_lowest() {
        // Unreachable remote: both axes at their floor, no update.
        assert!(!compare(&manifest(4, Some("1.0.0")), &VersionManifest::default())
            .update_available());
        // Fresh install: anything published wins.
        assert!(compare(&VersionManifest::default(), &manifest(1, None)).update_available());
        // A remote that gains a file version where the local has none.
        assert!(compare(&manifest(5, None), &manifest(5, Some("0.1.0"))).update_available());
    }

    #[test]
    fn comparison_matches_the_two_axis_formula() {
        let cases = [
            (manifest(1, None), manifest(2, None)),
            (manifest(2, None), manifest(2, None)),
            (manifest(5, Some("1.2.0")), manifest(5, Some("1.3.0"))),
            (manifest(5, Some("1.3.0")), manifest(5, Some("1.3.0"))),
            (manifest(0, None), manifest(0, Some("0.0.1"))),
            (manifest(9, Some("3.0.0")), manifest(8, Some("2.0.0"))),
        ];
        for (local, remote) in cases {
            let info = compare(&local, &remote);
            let expected = remote.version > local.version
                || remote.file_version.as_deref().and_then(parse_file_version)
                    > local.file_version.as_deref().and_then(parse_file_version);
            assert_eq!(info.update_available(), expected, "{local:?} vs {remote:?}");
        }
    }

    #[test]
    fn lenient_file_version_parsing() {
        assert_eq!(parse_file_version("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_file_version("1.2"), Some(Version::new(1, 2, 0)));
        assert_eq!(parse_file_version("2"), Some(Version::new(2, 0, 0)));
        assert_eq!(parse_file_version("1.2.3.4"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_file_version(" 1.0.0 "), Some(Version::new(1, 0, 0)));
        assert_eq!(parse_file_version(""), None);
        assert_eq!(parse_file_version("not-a-version"), None);
    }
}
