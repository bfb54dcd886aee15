use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model error: {0}")]
    Model(#[from] navtree::Error),

    #[error("invalid model in {path}: {source}")]
    InvalidModel {
        path: PathBuf,
        #[source]
        source: navtree::Error,
    },

    #[error("failed to write {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no session snapshot at {0}")]
    NoSession(PathBuf),

    #[error("invalid product name: {0:?}")]
    InvalidProduct(String),
}
