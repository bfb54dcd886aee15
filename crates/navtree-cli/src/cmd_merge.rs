use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use navtree::v1::{StateTree, merge};
use std::path::PathBuf;

use crate::doc_io;

pub fn run(
    session: PathBuf,
    shared: Option<PathBuf>,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<()> {
    let session = doc_io::read_tree(&session)?;
    let shared = shared.map(|path| doc_io::read_tree(&path)).transpose()?;

    let merged = merge_documents(shared, &session, Utc::now())?;
    doc_io::write_tree(&merged, output.as_ref(), pretty)
}

/// Fold an annotated session document into a shared document. Document
/// level data (paths, counterparts) is unioned; the shared side wins on
/// the product name.
fn merge_documents(
    shared: Option<StateTree>,
    session: &StateTree,
    now: DateTime<Utc>,
) -> Result<StateTree> {
    let root = merge::merge_at(shared.as_ref().map(|tree| &tree.root), Some(&session.root), now)
        .context("Merge failed")?;

    let mut merged = shared.unwrap_or_else(StateTree::home);
    merged.root = root;
    if merged.product.is_none() {
        merged.product = session.product.clone();
    }
    merged.last_updated_at = Some(now);
    merged.absorb_paths(&session.paths);
    merged.absorb_counterparts(&session.counterparts);
    tracing::debug!(
        paths = merged.paths.len(),
        counterparts = merged.counterparts.len(),
        "merged documents"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use navtree::v1::diff::annotate_diff;
    use navtree::v1::{PathSummary, State, Widget, query};
    use tempfile::TempDir;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn link(id: &str, href: &str) -> Widget {
        Widget::action(id).with_meta("href", href)
    }

    fn annotated_session() -> StateTree {
        let snapshot = State::home().with_widget(link("a", "/a"));
        let mut captured = State::home()
            .with_widget(link("a", "/a"))
            .with_widget(link("b", "/b"));
        annotate_diff(Some(&snapshot), Some(&mut captured));
        StateTree::new(captured)
            .with_product("shop")
            .with_path(PathSummary {
                id: "session-1".into(),
                ..Default::default()
            })
    }

    #[test]
    fn test_merge_into_shared() {
        let shared = StateTree::new(State::home().with_widget(link("a", "/a")));
        let merged = merge_documents(Some(shared), &annotated_session(), at(5_000)).unwrap();

        let ids: Vec<_> = merged.root.widgets.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(merged.root.diff().is_none());
        assert_eq!(merged.product.as_deref(), Some("shop"));
        assert_eq!(merged.last_updated_at, Some(at(5_000)));
        assert_eq!(merged.paths.len(), 1);
    }

    #[test]
    fn test_merge_without_shared_copies_session() {
        let merged = merge_documents(None, &annotated_session(), at(5_000)).unwrap();
        assert_eq!(query::all_widgets(&merged.root).len(), 2);
        assert!(merged.root.diff().is_none());
    }

    #[test]
    fn test_run_reads_and_writes_files() {
        let temp = TempDir::new().unwrap();
        let session = temp.path().join("session.json");
        let out = temp.path().join("merged.json");
        doc_io::write_tree(&annotated_session(), Some(&session), false).unwrap();

        run(session, None, Some(out.clone()), false).unwrap();
        let merged = doc_io::read_tree(&out).unwrap();
        assert!(query::find_widget(&merged.root, "b").is_some());
    }
}
