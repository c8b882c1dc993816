pub mod error;
mod history;

pub use error::{StorageError, StorageResult};
pub use history::{DEFAULT_HISTORY_RELATIVE_PATH, HistoryStore};
