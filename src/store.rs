//! Snapshot file
//!
//! Warm-start cache of the raffle state, stored as JSON. The service stays the source of truth:
//! the snapshot is reconciled by a refresh whenever the console is online.

use std::path::{Path, PathBuf};

use drawdesk_core::Snapshot;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Serde(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io error: {}", e),
            Error::Serde(e) => write!(f, "invalid snapshot: {}", e),
        }
    }
}
impl std::error::Error for Error {}

#[derive(Debug, Clone)]
pub struct SnapshotFile(PathBuf);

impl SnapshotFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self(path.into())
    }
    pub fn path(&self) -> &Path {
        &self.0
    }
    /// Reads the snapshot. A missing file is an empty raffle.
    pub async fn load(&self) -> Result<Snapshot, Error> {
        if !self.0.exists() {
            return Ok(Snapshot::default());
        }
        let file_content = tokio::fs::read_to_string(&self.0).await.map_err(Error::Io)?;
        serde_json::from_str(&file_content).map_err(Error::Serde)
    }
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), Error> {
        if let Some(parent) = self.0.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(Error::Io)?;
        }
        let value = serde_json::to_string_pretty(snapshot).map_err(Error::Serde)?;
        tokio::fs::write(&self.0, value).await.map_err(Error::Io)
    }
}

#[cfg(test)]
mod tests {
    use drawdesk_core::{Category, Prize, PrizeId, Ticket};

    use super::*;

    fn tmp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("drawdesk-{}-{}", std::process::id(), name))
    }

    #[tokio::test]
    async fn missing_file_is_empty_raffle() {
        let file = SnapshotFile::new(tmp_path("missing/raffle.json"));
        let snapshot = file.load().await.unwrap();
        assert_eq!(snapshot, Snapshot::default());
        assert_eq!(snapshot.categories, Category::defaults());
    }
    #[tokio::test]
    async fn save_then_load() {
        let dir = tmp_path("store");
        let file = SnapshotFile::new(dir.join("nested/raffle.json"));
        let snapshot = Snapshot {
            tickets: vec![Ticket::new("0001").unwrap()],
            prizes: vec![Prize::new(PrizeId::new("7"), "Bike", Category::new("A").unwrap())],
            ..Default::default()
        };
        file.save(&snapshot).await.unwrap();
        assert_eq!(file.load().await.unwrap(), snapshot);
        std::fs::remove_dir_all(dir).unwrap();
    }
    #[tokio::test]
    async fn corrupted_file() {
        let path = tmp_path("corrupted.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(SnapshotFile::new(&path).load().await, Err(Error::Serde(_))));
        std::fs::remove_file(path).unwrap();
    }
}
