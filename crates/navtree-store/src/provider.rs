use crate::error::{Result, StoreError};
use navtree::v1::StateTree;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Loads and saves model documents.
pub trait ModelProvider {
    /// Load the document at `path`.
    ///
    /// A missing or unreadable file is `Ok(None)`; a file that is present
    /// but is not a valid model is an error.
    fn load(&self, path: &Path) -> Result<Option<StateTree>>;

    /// Save `tree` to `path`, replacing any previous document.
    fn save(&self, path: &Path, tree: &StateTree) -> Result<()>;
}

/// Filesystem provider. Saves go to a temporary file next to the target
/// and are renamed into place, so a failed save leaves the previous
/// document intact.
#[derive(Debug, Clone, Default)]
pub struct FsProvider {
    pretty: bool,
}

impl FsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl ModelProvider for FsProvider {
    fn load(&self, path: &Path) -> Result<Option<StateTree>> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no model file");
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "unable to read model file; treating as absent"
                );
                return Ok(None);
            }
        };

        StateTree::from_json(&json)
            .map(Some)
            .map_err(|source| StoreError::InvalidModel {
                path: path.to_path_buf(),
                source,
            })
    }

    fn save(&self, path: &Path, tree: &StateTree) -> Result<()> {
        let json = if self.pretty {
            tree.to_json_pretty()?
        } else {
            tree.to_json()?
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let persist_err = |source: std::io::Error| StoreError::Persist {
            path: path.to_path_buf(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(persist_err)?;
        tmp.write_all(json.as_bytes()).map_err(persist_err)?;
        tmp.as_file().sync_all().map_err(persist_err)?;
        tmp.persist(path).map_err(|e| persist_err(e.error))?;

        tracing::info!(path = %path.display(), bytes = json.len(), "saved model");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navtree::v1::{State, Widget};
    use tempfile::TempDir;

    fn sample() -> StateTree {
        StateTree::new(State::home().with_widget(Widget::action("w1").with_meta("href", "/a")))
            .with_product("shop")
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/shared-state.json");
        let provider = FsProvider::new();

        provider.save(&path, &sample()).unwrap();
        let loaded = provider.load(&path).unwrap().unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_pretty_output() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.json");
        FsProvider::new().with_pretty(true).save(&path, &sample()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"product\": \"shop\""));
    }

    #[test]
    fn test_load_missing_is_none() {
        let temp = TempDir::new().unwrap();
        let loaded = FsProvider::new().load(&temp.path().join("nope.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_directory_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(FsProvider::new().load(temp.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_malformed_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        fs::write(&path, r#"{"state": {"visible-widgets": []}}"#).unwrap();

        let err = FsProvider::new().load(&path).unwrap_err();
        match err {
            StoreError::InvalidModel { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_save_replaces_and_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.json");
        let provider = FsProvider::new();

        provider.save(&path, &StateTree::home()).unwrap();
        provider.save(&path, &sample()).unwrap();

        assert_eq!(provider.load(&path).unwrap().unwrap(), sample());
        let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
