#![doc = include_str!("../README.md")]

pub mod context;
pub mod error;
pub mod layout;
pub mod provider;
pub mod session;

pub use context::SessionContext;
pub use error::{Result, StoreError};
pub use layout::{ModelLayout, SHARED_DIR_ENV, SHARED_MODEL_FILE};
pub use provider::{FsProvider, ModelProvider};
pub use session::{Session, SessionOutcome, Workspace};
