use std::path::{Path, PathBuf};

use snafu::ResultExt;

use salus_core::Message;

use crate::error::{
    CreateStoreDirectorySnafu, ReadStoreSnafu, SerializeHistorySnafu, StorageResult,
    WriteStoreSnafu,
};

pub const DEFAULT_HISTORY_RELATIVE_PATH: &str = ".salus/history.json";

/// Persists the full conversation as one JSON array of messages.
///
/// The store is write-through: the controller saves after every observable
/// mutation, and each save overwrites the previous value wholesale. There
/// are no partial or merge writes and no versioning field; any shape the
/// message types cannot deserialize is treated as corruption.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_HISTORY_RELATIVE_PATH))
    }
}

impl HistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted conversation.
    ///
    /// Returns `None` when the file is missing, does not parse as a message
    /// array, or parses to an empty one. A value that cannot be used is
    /// deleted before returning so the next load does not retry the same
    /// bad payload.
    pub fn load(&self) -> StorageResult<Option<Vec<Message>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&self.path).context(ReadStoreSnafu {
            stage: "read-store",
            path: display_path(&self.path),
        })?;

        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(messages) if !messages.is_empty() => Ok(Some(messages)),
            Ok(_) => {
                self.discard("persisted chat history is empty");
                Ok(None)
            }
            Err(error) => {
                tracing::warn!(
                    path = %display_path(&self.path),
                    error = %error,
                    "persisted chat history is corrupt"
                );
                self.discard("persisted chat history is corrupt");
                Ok(None)
            }
        }
    }

    /// Serializes and writes the full conversation, creating the parent
    /// directory on demand.
    pub fn save(&self, conversation: &[Message]) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateStoreDirectorySnafu {
                stage: "create-store-directory",
                path: display_path(parent),
            })?;
        }

        let serialized = serde_json::to_string(conversation).context(SerializeHistorySnafu {
            stage: "serialize-history",
        })?;

        std::fs::write(&self.path, serialized).context(WriteStoreSnafu {
            stage: "write-store",
            path: display_path(&self.path),
        })
    }

    // Removal failure is only logged: the caller already treats the value
    // as absent, and a leftover file merely costs one more discard attempt.
    fn discard(&self, reason: &'static str) {
        if let Err(error) = std::fs::remove_file(&self.path) {
            tracing::warn!(
                path = %display_path(&self.path),
                error = %error,
                reason,
                "failed to remove unusable history store"
            );
        }
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
