use std::path::{Path, PathBuf};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::data::model::FullSnapshot;
use crate::error::PersistError;

/// Best-effort on-disk copy of the latest snapshot. Written, never read back.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the cache file. Goes through a temp file and rename so the file is never torn.
    pub async fn write(&self, snapshot: &FullSnapshot) -> Result<(), PersistError> {
        let bytes = encode_indented(snapshot)?;
        let tmp = self.tmp_path();

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|source| self.io_error(&tmp, source))?;

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| self.io_error(&self.path, source))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> PersistError {
        PersistError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

// One-space indent
fn encode_indented(snapshot: &FullSnapshot) -> Result<Vec<u8>, PersistError> {
    let mut bytes = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut bytes, PrettyFormatter::with_indent(b" "));
    snapshot.serialize(&mut serializer)?;
    Ok(bytes)
}
