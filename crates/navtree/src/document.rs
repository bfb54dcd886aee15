use crate::codec;
use crate::error::Result;
use crate::query;
use crate::types::{State, Widget};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A persisted model: one product's state tree plus its bookkeeping.
///
/// `counterparts` is the lookup table for [`Widget::matching_widget`] links
/// that point outside `root` (into a parallel tree). Links that resolve
/// inside `root` need no entry.
///
/// # JSON shape
///
/// ```json
/// {
///   "product": "shop",
///   "last-updated-at-ms": 1621245432207,
///   "paths": [ { "id": "p1", "tester": "alex", "widgets": ["162124543220764"] } ],
///   "state": {
///     "state-id": "0",
///     "bookmarks": "Home",
///     "visible-widgets": [ { "id": "162124543220764", "next-state": null } ]
///   },
///   "issues": [],
///   "all-widgets": [ { "id": "162124543220764", "type": "ACTION", … } ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StateTree {
    pub product: Option<String>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub paths: Vec<PathSummary>,
    pub root: State,
    pub counterparts: BTreeMap<String, Widget>,
}

impl StateTree {
    pub fn new(root: State) -> Self {
        Self {
            product: None,
            last_updated_at: None,
            paths: Vec::new(),
            root,
            counterparts: BTreeMap::new(),
        }
    }

    /// A tree holding only a fresh home state.
    pub fn home() -> Self {
        Self::new(State::home())
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn with_path(mut self, path: PathSummary) -> Self {
        self.paths.push(path);
        self
    }

    /// Resolve a matched-widget id inside the tree first, then among the
    /// out-of-tree counterparts.
    pub fn resolve_widget(&self, widget_id: &str) -> Option<&Widget> {
        query::find_widget(&self.root, widget_id).or_else(|| self.counterparts.get(widget_id))
    }

    /// Add session path summaries whose ids are not yet present.
    pub fn absorb_paths(&mut self, paths: &[PathSummary]) {
        for path in paths {
            if !self.paths.iter().any(|p| p.id == path.id) {
                self.paths.push(path.clone());
            }
        }
    }

    /// Add out-of-tree counterparts whose ids are not yet known.
    pub fn absorb_counterparts(&mut self, counterparts: &BTreeMap<String, Widget>) {
        for (id, widget) in counterparts {
            self.counterparts
                .entry(id.clone())
                .or_insert_with(|| widget.clone());
        }
    }

    /// Parse a model document from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        codec::from_json(json)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        codec::to_json(self)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        codec::to_json_pretty(self)
    }
}

/// Summary of one completed exploration session, carried through merges
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PathSummary {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tester: Option<String>,
    /// Ids of the widgets used, in the order they were used.
    #[serde(default)]
    pub widgets: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_tree() {
        let tree = StateTree::home().with_product("shop");
        assert!(tree.root.is_home());
        assert_eq!(tree.product.as_deref(), Some("shop"));
        assert!(tree.paths.is_empty());
        assert!(tree.counterparts.is_empty());
    }

    #[test]
    fn test_resolve_widget_prefers_tree() {
        let mut tree = StateTree::new(
            State::home().with_widget(Widget::action("w1").with_text("in tree")),
        );
        tree.counterparts.insert(
            "w1".into(),
            Widget::action("w1").with_text("outside"),
        );
        tree.counterparts
            .insert("w9".into(), Widget::action("w9"));

        assert_eq!(
            tree.resolve_widget("w1").unwrap().text.as_deref(),
            Some("in tree")
        );
        assert_eq!(tree.resolve_widget("w9").unwrap().id, "w9");
        assert!(tree.resolve_widget("nope").is_none());
    }

    #[test]
    fn test_absorb_paths_dedupes_by_id() {
        let p1 = PathSummary {
            id: "p1".into(),
            ..Default::default()
        };
        let p2 = PathSummary {
            id: "p2".into(),
            tester: Some("bob".into()),
            ..Default::default()
        };
        let mut tree = StateTree::home().with_path(p1.clone());
        tree.absorb_paths(&[p1, p2]);
        assert_eq!(tree.paths.len(), 2);
        assert_eq!(tree.paths[1].tester.as_deref(), Some("bob"));
    }

    #[test]
    fn test_absorb_counterparts_keeps_existing() {
        let mut tree = StateTree::home();
        tree.counterparts
            .insert("w1".into(), Widget::action("w1").with_text("first"));

        let mut incoming = BTreeMap::new();
        incoming.insert("w1".to_string(), Widget::action("w1").with_text("second"));
        incoming.insert("w2".to_string(), Widget::action("w2"));
        tree.absorb_counterparts(&incoming);

        assert_eq!(tree.counterparts.len(), 2);
        assert_eq!(tree.counterparts["w1"].text.as_deref(), Some("first"));
    }

    #[test]
    fn test_path_summary_keeps_unknown_fields() {
        let json = r#"{"id":"p1","tester":"alex","widgets":["a","b"],"score":7}"#;
        let path: PathSummary = serde_json::from_str(json).unwrap();
        assert_eq!(path.widgets, vec!["a", "b"]);
        assert_eq!(path.extra["score"], serde_json::json!(7));

        let back = serde_json::to_string(&path).unwrap();
        assert!(back.contains("\"score\":7"));
        assert!(back.contains("\"tester\":\"alex\""));
    }
}
