use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the shared model folder.
pub const SHARED_DIR_ENV: &str = "NAVTREE_SHARED_DIR";

/// File name of a product's shared model.
pub const SHARED_MODEL_FILE: &str = "shared-state.json";

const DEFAULT_DIR: &str = "data";
const SESSION_FILE_PREFIX: &str = "session-state-";
const SESSION_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Where shared models and session snapshots live on disk.
///
/// ```text
/// <shared_dir>/<product>/shared-state.json
/// <data_dir>/<product>/session-state-2021-05-17_09-57-12.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLayout {
    shared_dir: PathBuf,
    data_dir: PathBuf,
}

impl Default for ModelLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelLayout {
    /// Both folders default to `data/`; the shared folder honours
    /// [`SHARED_DIR_ENV`].
    pub fn new() -> Self {
        let shared_dir = env::var_os(SHARED_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DIR));
        Self {
            shared_dir,
            data_dir: PathBuf::from(DEFAULT_DIR),
        }
    }

    pub fn with_shared_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.shared_dir = dir.into();
        self
    }

    pub fn with_data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn shared_dir(&self) -> &Path {
        &self.shared_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn product_dir(&self, product: &str) -> Result<PathBuf> {
        Ok(self.shared_dir.join(check_product(product)?))
    }

    pub fn shared_model_file(&self, product: &str) -> Result<PathBuf> {
        Ok(self.product_dir(product)?.join(SHARED_MODEL_FILE))
    }

    pub fn session_dir(&self, product: &str) -> Result<PathBuf> {
        Ok(self.data_dir.join(check_product(product)?))
    }

    pub fn session_file(&self, product: &str, at: DateTime<Utc>) -> Result<PathBuf> {
        Ok(self.session_dir(product)?.join(format!(
            "{}{}.json",
            SESSION_FILE_PREFIX,
            at.format(SESSION_TIME_FORMAT)
        )))
    }

    /// Products with a folder in the shared dir, sorted by name.
    pub fn list_products(&self) -> Result<Vec<String>> {
        if !self.shared_dir.exists() {
            return Ok(Vec::new());
        }

        let mut products = Vec::new();
        for entry in std::fs::read_dir(&self.shared_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                products.push(name.to_string());
            }
        }
        products.sort();
        Ok(products)
    }

    /// Session snapshot files recorded for `product`, oldest first.
    pub fn list_sessions(&self, product: &str) -> Result<Vec<PathBuf>> {
        let dir = self.session_dir(product)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_session = path.extension().and_then(|s| s.to_str()) == Some("json")
                && path
                    .file_name()
                    .and_then(|s| s.to_str())
                    .is_some_and(|name| name.starts_with(SESSION_FILE_PREFIX));
            if is_session {
                sessions.push(path);
            }
        }
        sessions.sort();
        Ok(sessions)
    }
}

/// Product names become folder names, so they must be a single plain
/// path component.
fn check_product(product: &str) -> Result<&str> {
    let invalid = product.is_empty()
        || product == "."
        || product == ".."
        || product.contains(['/', '\\'])
        || product.contains('\0');
    if invalid {
        return Err(StoreError::InvalidProduct(product.to_string()));
    }
    Ok(product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn test_path_resolution() {
        let temp = TempDir::new().unwrap();
        let layout = ModelLayout::new()
            .with_shared_dir(temp.path().join("shared"))
            .with_data_dir(temp.path().join("data"));

        assert_eq!(
            layout.shared_model_file("shop").unwrap(),
            temp.path().join("shared/shop/shared-state.json")
        );
        assert_eq!(
            layout.session_dir("shop").unwrap(),
            temp.path().join("data/shop")
        );
    }

    #[test]
    fn test_session_file_name() {
        let layout = ModelLayout::new().with_data_dir("/tmp/navtree");
        // 2021-05-17 09:57:12 UTC
        let path = layout.session_file("shop", at(1_621_245_432_207)).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/tmp/navtree/shop/session-state-2021-05-17_09-57-12.json")
        );
    }

    #[test]
    fn test_rejects_bad_product_names() {
        let layout = ModelLayout::new();
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(
                matches!(layout.product_dir(bad), Err(StoreError::InvalidProduct(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(layout.product_dir("my-shop_2").is_ok());
    }

    #[test]
    fn test_list_products() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("shop")).unwrap();
        fs::create_dir(temp.path().join("blog")).unwrap();
        fs::write(temp.path().join("stray.json"), "{}").unwrap();

        let layout = ModelLayout::new().with_shared_dir(temp.path());
        assert_eq!(layout.list_products().unwrap(), vec!["blog", "shop"]);
    }

    #[test]
    fn test_list_products_no_dir() {
        let layout = ModelLayout::new().with_shared_dir("/nonexistent/navtree/shared");
        assert!(layout.list_products().unwrap().is_empty());
    }

    #[test]
    fn test_list_sessions() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("shop");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("session-state-2021-05-18_10-00-00.json"), "{}").unwrap();
        fs::write(dir.join("session-state-2021-05-17_09-57-12.json"), "{}").unwrap();
        fs::write(dir.join("shared-state.json"), "{}").unwrap();
        fs::write(dir.join("session-state-notes.txt"), "").unwrap();

        let layout = ModelLayout::new().with_data_dir(temp.path());
        let sessions = layout.list_sessions("shop").unwrap();
        assert_eq!(
            sessions,
            vec![
                dir.join("session-state-2021-05-17_09-57-12.json"),
                dir.join("session-state-2021-05-18_10-00-00.json"),
            ]
        );
        assert!(layout.list_sessions("other").unwrap().is_empty());
    }
}
