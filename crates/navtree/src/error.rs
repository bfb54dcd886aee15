use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("state {state_id:?} lists widget {widget_id:?} which is missing from all-widgets")]
    UnknownWidget { state_id: String, widget_id: String },

    #[error("widget {widget_id:?} has an invalid location: {reason}")]
    InvalidLocation { widget_id: String, reason: String },

    #[error("state tree is nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("merge needs at least one of a shared tree or a session tree")]
    NothingToMerge,
}
