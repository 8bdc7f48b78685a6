use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Append-only journal of settled draws, one JSON object per line.
pub struct DrawJournal {
    path: PathBuf,
}

#[derive(Serialize)]
struct JournalEntry<'a, D> {
    datetime: DateTime<Utc>,
    data: &'a D,
}

impl DrawJournal {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
        }
    }
    pub async fn push<D: Serialize>(&self, data: &D) -> Result<(), String> {
        use async_std::fs::OpenOptions;
        use async_std::prelude::*;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()).map(PathBuf::from) {
            async_std::fs::create_dir_all(&parent).await
                .map_err(|e| format!("audit: Unable to create {}: {}", parent.to_string_lossy(), e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path).await
            .map_err(|e| format!("audit: Unable to open the journal: {}", e))?;
        let mut line = serde_json::to_string(&JournalEntry {
            datetime: Utc::now(),
            data,
        })
            .map_err(|e| format!("audit: Unable to serialize the entry: {}", e))?;
        line.push('\n');
        file.write_all(line.as_bytes()).await
            .map_err(|e| format!("audit: Unable to write the journal: {}", e))?;
        file.flush().await
            .map_err(|e| format!("audit: Unable to write the journal: {}", e))
    }
}
