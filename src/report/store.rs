//! On-disk report snapshots.
//!
//! Each scan persists one YAML document named
//! `<cluster>_sanitize_<timestamp>.yaml`. The timestamp format sorts
//! lexicographically, so filename order is scan order. The diff engine
//! reads the two most recent snapshots; `prune` enforces the configured
//! retention.

use crate::tally::Report;
use std::fs;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Report store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Report directory unavailable")]
    NoDirectory,

    #[error("Report I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report serialization failed: {0}")]
    Serde(#[from] serde_yaml::Error),
}

/// Directory-backed store of report snapshots.
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    /// Open a store over an explicit directory, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Open the store in the platform data directory.
    pub fn open_default() -> Result<Self, StoreError> {
        let base = dirs::data_dir().ok_or(StoreError::NoDirectory)?;
        Self::new(base.join("kube-sanitize"))
    }

    /// Persist one report snapshot, returning its path.
    pub fn save(&self, report: &Report) -> Result<PathBuf, StoreError> {
        let filename = format!(
            "{}_sanitize_{}.yaml",
            sanitize_cluster(&report.cluster),
            report.timestamp.format(TIMESTAMP_FORMAT)
        );
        let path = self.dir.join(filename);
        fs::write(&path, serde_yaml::to_string(report)?)?;
        Ok(path)
    }

    /// Snapshot paths for one cluster, most recent first.
    pub fn list(&self, cluster: &str) -> Result<Vec<PathBuf>, StoreError> {
        let prefix = format!("{}_sanitize_", sanitize_cluster(cluster));
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "yaml")
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect();
        paths.sort();
        paths.reverse();
        Ok(paths)
    }

    /// Load one snapshot.
    pub fn load(&self, path: &Path) -> Result<Report, StoreError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// The two most recent snapshots for a cluster, oldest first.
    /// `None` when fewer than two scans are on disk.
    pub fn last_two(&self, cluster: &str) -> Result<Option<(Report, Report)>, StoreError> {
        let paths = self.list(cluster)?;
        if paths.len() < 2 {
            return Ok(None);
        }
        let newest = self.load(&paths[0])?;
        let previous = self.load(&paths[1])?;
        Ok(Some((previous, newest)))
    }

    /// Delete snapshots beyond the retention count, oldest first.
    pub fn prune(&self, cluster: &str, retention: usize) -> Result<(), StoreError> {
        for path in self.list(cluster)?.into_iter().skip(retention) {
            log::debug!("Pruning report snapshot {}", path.display());
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Cluster identities can carry host separators; keep filenames flat.
fn sanitize_cluster(cluster: &str) -> String {
    cluster
        .chars()
        .map(|c| if c == '/' || c == ':' { '-' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::Outcome;
    use crate::tally::Section;
    use chrono::{Duration, TimeZone, Utc};

    fn report(cluster: &str, offset_secs: i64) -> Report {
        let mut report = Report::new(cluster, vec![Section::new("pods", Outcome::new())], vec![]);
        report.timestamp = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
            + Duration::seconds(offset_secs);
        report
    }

    #[test]
    fn save_uses_cluster_and_timestamp() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ReportStore::new(tmp.path()).unwrap();

        let path = store.save(&report("prod", 0)).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("prod_sanitize_"));
        assert!(name.ends_with(".yaml"));
    }

    #[test]
    fn last_two_returns_oldest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ReportStore::new(tmp.path()).unwrap();

        let older = report("prod", 0);
        let newer = report("prod", 60);
        store.save(&older).unwrap();
        store.save(&newer).unwrap();
        // A different cluster's snapshots never leak in.
        store.save(&report("staging", 30)).unwrap();

        let (first, second) = store.last_two("prod").unwrap().unwrap();
        assert_eq!(first.timestamp, older.timestamp);
        assert_eq!(second.timestamp, newer.timestamp);
    }

    #[test]
    fn last_two_needs_two_snapshots() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ReportStore::new(tmp.path()).unwrap();
        store.save(&report("prod", 0)).unwrap();
        assert!(store.last_two("prod").unwrap().is_none());
    }

    #[test]
    fn prune_keeps_newest() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ReportStore::new(tmp.path()).unwrap();
        for i in 0..5 {
            store.save(&report("prod", i * 60)).unwrap();
        }

        store.prune("prod", 2).unwrap();
        let paths = store.list("prod").unwrap();
        assert_eq!(paths.len(), 2);
        // Most recent snapshot survives.
        let (_, newest) = store.last_two("prod").unwrap().unwrap();
        assert_eq!(
            newest.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            report("prod", 4 * 60).timestamp.format(TIMESTAMP_FORMAT).to_string()
        );
    }
}
