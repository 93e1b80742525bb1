// src/reconcile.rs

//! Reconciliation of two repository snapshots
//!
//! Classifies every record of a remote (published) snapshot against a local
//! (freshly built) snapshot. A remote record is stale when a local record
//! with the same package name supersedes it under the chosen policy.

use crate::repository::PackageRecord;
use crate::version::vercmp;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// When does a local record supersede a remote one?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalePolicy {
    /// Only a strictly newer local version replaces the remote record
    Newer,
    /// A rebuild with an unchanged version also replaces it
    NewerOrEqual,
}

impl StalePolicy {
    /// `strict = true` selects [`StalePolicy::NewerOrEqual`]
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            StalePolicy::NewerOrEqual
        } else {
            StalePolicy::Newer
        }
    }

    fn supersedes(self, local_vs_remote: Ordering) -> bool {
        match self {
            StalePolicy::Newer => local_vs_remote == Ordering::Greater,
            StalePolicy::NewerOrEqual => local_vs_remote != Ordering::Less,
        }
    }
}

/// Outcome of comparing a remote snapshot against a local one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Remote records superseded by a local record
    pub stale: Vec<PackageRecord>,
    /// Remote records whose package exists locally but is not superseded
    pub current: Vec<PackageRecord>,
    /// Remote records whose package does not exist locally at all
    pub orphaned: Vec<PackageRecord>,
}

impl Reconciliation {
    pub fn stale_filenames(&self) -> HashSet<&str> {
        self.stale.iter().map(|r| r.filename.as_str()).collect()
    }

    pub fn stale_names(&self) -> HashSet<&str> {
        self.stale.iter().map(|r| r.pkgname.as_str()).collect()
    }
}

/// Classify every remote record against the local snapshot
///
/// Collections may hold several records per package name (e.g. one per
/// architecture); a remote record is compared with every local record of the
/// same name and is stale if any of them supersedes it. Remote order is
/// preserved within each class.
pub fn reconcile(
    local: &[PackageRecord],
    remote: &[PackageRecord],
    policy: StalePolicy,
) -> Reconciliation {
    let mut local_versions: HashMap<&str, Vec<&str>> = HashMap::new();
    for record in local {
        local_versions
            .entry(record.pkgname.as_str())
            .or_default()
            .push(record.version.as_str());
    }

    let mut result = Reconciliation::default();
    for record in remote {
        match local_versions.get(record.pkgname.as_str()) {
            None => result.orphaned.push(record.clone()),
            Some(versions) => {
                let superseded = versions
                    .iter()
                    .any(|v| policy.supersedes(vercmp(v, &record.version)));

                if superseded {
                    debug!("{} {} is stale", record.pkgname, record.version);
                    result.stale.push(record.clone());
                } else {
                    result.current.push(record.clone());
                }
            }
        }
    }

    result
}

/// Just the stale remote records
pub fn find_stale(
    local: &[PackageRecord],
    remote: &[PackageRecord],
    policy: StalePolicy,
) -> Vec<PackageRecord> {
    reconcile(local, remote, policy).stale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(name: &str, version: &str) -> PackageRecord {
        PackageRecord::new(
            format!("{}-{}-x86_64.pkg.tar.zst", name, version),
            name,
            version,
        )
    }

    #[test]
    fn test_newer_local_marks_remote_stale() {
        let local = vec![pkg("foo", "1.1-1"), pkg("baz", "1.0-1")];
        let remote = vec![pkg("foo", "1.0-1"), pkg("bar", "2.0-1")];

        let result = reconcile(&local, &remote, StalePolicy::Newer);
        assert_eq!(result.stale, vec![pkg("foo", "1.0-1")]);
        assert!(result.current.is_empty());
        assert_eq!(result.orphaned, vec![pkg("bar", "2.0-1")]);
    }

    #[test]
    fn test_equal_version_depends_on_policy() {
        let local = vec![pkg("foo", "1.0-1")];
        let remote = vec![pkg("foo", "1.0-1")];

        let lenient = reconcile(&local, &remote, StalePolicy::Newer);
        assert!(lenient.stale.is_empty());
        assert_eq!(lenient.current, remote);

        let strict = reconcile(&local, &remote, StalePolicy::NewerOrEqual);
        assert_eq!(strict.stale, remote);
    }

    #[test]
    fn test_older_local_never_stale() {
        let local = vec![pkg("foo", "0.9-1")];
        let remote = vec![pkg("foo", "1.0-1")];

        for policy in [StalePolicy::Newer, StalePolicy::NewerOrEqual] {
            let result = reconcile(&local, &remote, policy);
            assert!(result.stale.is_empty());
            assert_eq!(result.current, remote);
        }
    }

    #[test]
    fn test_unmatched_name_never_stale() {
        let local = vec![pkg("foo", "9.9-1")];
        let remote = vec![pkg("bar", "1.0-1")];

        for policy in [StalePolicy::Newer, StalePolicy::NewerOrEqual] {
            assert!(find_stale(&local, &remote, policy).is_empty());
        }
    }

    #[test]
    fn test_non_strict_matches_comparator() {
        let versions = ["1.0-1", "1.0-2", "1.0.1-1", "1:0.5-1", "1.0rc1-1", "2.0-1"];
        for local_version in versions {
            for remote_version in versions {
                let local = vec![pkg("foo", local_version)];
                let remote = vec![pkg("foo", remote_version)];
                let stale = !find_stale(&local, &remote, StalePolicy::Newer).is_empty();
                assert_eq!(
                    stale,
                    vercmp(local_version, remote_version) == Ordering::Greater,
                    "local {} remote {}",
                    local_version,
                    remote_version
                );
            }
        }
    }

    #[test]
    fn test_duplicates_compared_against_every_match() {
        // Two local builds of the same package (e.g. two architectures)
        let local = vec![pkg("foo", "0.9-1"), pkg("foo", "1.1-1")];
        let remote = vec![pkg("foo", "1.0-1")];

        let result = reconcile(&local, &remote, StalePolicy::Newer);
        // Classified once even though several local records match
        assert_eq!(result.stale, vec![pkg("foo", "1.0-1")]);
    }

    #[test]
    fn test_stale_sets() {
        let local = vec![pkg("foo", "2.0-1")];
        let remote = vec![pkg("foo", "1.0-1")];
        let result = reconcile(&local, &remote, StalePolicy::from_strict(false));

        assert!(result.stale_names().contains("foo"));
        assert!(result.stale_filenames().contains("foo-1.0-1-x86_64.pkg.tar.zst"));
    }
}
