use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("failed to create history store directory at {path}"))]
    CreateStoreDirectory {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to read history store from {path}"))]
    ReadStore {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to write history store to {path}"))]
    WriteStore {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize chat history"))]
    SerializeHistory {
        stage: &'static str,
        source: serde_json::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;
