//! Folding an annotated session tree into the shared tree.
//!
//! The merge is asymmetric: the shared tree is the copy base and the
//! session's diff annotations drive every decision, so `merge(a, b)` and
//! `merge(b, a)` generally differ. Field conflicts on matched widgets are
//! resolved last-writer-biased (see [`merge_into`]), not by a three-way
//! merge.

use crate::error::{Error, Result};
use crate::query;
use crate::types::{DIFF_KEY, DiffType, State, Widget};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Separator used when both sides reported text for the same widget.
pub const TEXT_SEPARATOR: &str = " | ";

/// Merge `session` into `shared`, tombstoning deletions with the current
/// time. See [`merge_at`].
pub fn merge(shared: Option<&State>, session: Option<&State>) -> Result<State> {
    merge_at(shared, session, Utc::now())
}

/// Merge `session` into a deep copy of `shared`.
///
/// Neither input is modified. With only one side present the result is a
/// deep copy of that side; with neither the call is a caller bug and fails
/// with [`Error::NothingToMerge`]. Diff annotations are stripped from every
/// state of the result.
///
/// Per session diff entry:
/// - `DELETED`: the shared widget with that id and its whole next-state
///   sub-tree are tombstoned at `now`. A missing widget is ignored.
/// - `CREATED`: a structurally equal shared widget absorbs the session
///   widget's fields and the two next states are merged; otherwise the
///   session widget and its sub-tree are appended.
/// - `NO_CHANGES`: only the two next states are merged.
/// - anything else is logged and skipped.
///
/// # Examples
///
/// ```
/// use navtree::v1::{diff, merge, State, Widget};
///
/// let shared = State::home().with_widget(Widget::action("a").with_meta("href", "/a"));
/// let snapshot = shared.deep_copy();
/// let mut session = shared
///     .deep_copy()
///     .with_widget(Widget::action("b").with_meta("href", "/b"));
///
/// diff::annotate_diff(Some(&snapshot), Some(&mut session));
/// let merged = merge::merge(Some(&shared), Some(&session)).unwrap();
///
/// assert_eq!(merged.widgets.len(), 2);
/// assert!(merged.diff().is_none());
/// ```
pub fn merge_at(
    shared: Option<&State>,
    session: Option<&State>,
    now: DateTime<Utc>,
) -> Result<State> {
    let mut result = match (shared, session) {
        (None, None) => return Err(Error::NothingToMerge),
        (Some(shared), None) => shared.deep_copy(),
        (None, Some(session)) => session.deep_copy(),
        (Some(shared), Some(session)) => {
            let mut result = shared.deep_copy();
            fold_into(&mut result, session, now);
            result
        }
    };
    query::strip_diff_annotations(&mut result);
    Ok(result)
}

fn fold_into(shared: &mut State, session: &State, now: DateTime<Utc>) {
    for (key, value) in &session.metadata {
        if key != DIFF_KEY && !shared.metadata.contains_key(key) {
            shared.metadata.insert(key.clone(), value.clone());
        }
    }

    let Some(diff) = session.diff() else {
        tracing::debug!(state_id = %session.id, "session state carries no diff annotations");
        return;
    };

    let session_widgets = first_by_id(&session.widgets);
    let mut shared_positions: HashMap<String, usize> = first_by_id(&shared.widgets)
        .into_iter()
        .map(|(id, index)| (id.to_string(), index))
        .collect();

    for (widget_id, diff_type) in diff.iter() {
        match diff_type {
            DiffType::Deleted => match shared_positions.get(widget_id) {
                Some(&index) => {
                    let count = query::tombstone_subtree(&mut shared.widgets[index], now);
                    tracing::debug!(widget_id, count, "tombstoned deleted widget");
                }
                None => {
                    tracing::debug!(widget_id, "deleted widget not in shared state");
                }
            },
            DiffType::Created => {
                let Some(created) = session_widgets.get(widget_id).map(|&i| &session.widgets[i])
                else {
                    tracing::debug!(widget_id, "created widget missing from session state");
                    continue;
                };
                match shared.position_of_same(created) {
                    Some(index) => {
                        let target = &mut shared.widgets[index];
                        tracing::debug!(
                            widget_id,
                            into = %target.id,
                            "merging created widget into its shared counterpart"
                        );
                        merge_into(target, created);
                        fold_next_states(target, created, now);
                    }
                    None => {
                        tracing::debug!(widget_id, "appending created widget");
                        shared_positions
                            .entry(created.id.clone())
                            .or_insert(shared.widgets.len());
                        shared.widgets.push(created.clone());
                    }
                }
            }
            DiffType::NoChanges => {
                let Some(unchanged) =
                    session_widgets.get(widget_id).map(|&i| &session.widgets[i])
                else {
                    continue;
                };
                let index = shared_positions
                    .get(widget_id)
                    .copied()
                    .or_else(|| shared.position_of_same(unchanged));
                match index {
                    Some(index) => fold_next_states(&mut shared.widgets[index], unchanged, now),
                    None => {
                        tracing::debug!(widget_id, "unchanged widget not in shared state");
                    }
                }
            }
            other => {
                tracing::warn!(widget_id, diff_type = %other, "no merging strategy for diff type");
            }
        }
    }
}

/// Position of the first widget carrying each id.
fn first_by_id(widgets: &[Widget]) -> HashMap<&str, usize> {
    let mut positions = HashMap::with_capacity(widgets.len());
    for (index, widget) in widgets.iter().enumerate() {
        positions.entry(widget.id.as_str()).or_insert(index);
    }
    positions
}

fn fold_next_states(target: &mut Widget, session: &Widget, now: DateTime<Utc>) {
    let Some(session_next) = session.navigable_next_state() else {
        return;
    };
    match target.navigable_next_state_mut() {
        Some(shared_next) => fold_into(shared_next, session_next, now),
        None => {
            tracing::debug!(
                widget_id = %target.id,
                state_id = %session_next.id,
                "adopting next state from session"
            );
            target.next_state = Some(Box::new(session_next.clone()));
        }
    }
}

/// Copy `changed`'s fields onto `target`.
///
/// Metadata keys from `changed` overwrite; the widget type, reported and
/// resolved dates, and resolved text are taken from `changed` as they are
/// (including when absent); reported text is combined with
/// [`choose_text`].
pub fn merge_into(target: &mut Widget, changed: &Widget) {
    for (key, value) in &changed.metadata {
        target.metadata.insert(key.clone(), value.clone());
    }
    if changed.matching_widget.is_some() {
        target.matching_widget = changed.matching_widget.clone();
    }
    target.widget_type = changed.widget_type;
    target.reported_text = choose_text(
        target.reported_text.as_deref(),
        changed.reported_text.as_deref(),
    );
    target.reported_at = changed.reported_at;
    target.resolved_at = changed.resolved_at;
    target.resolved_text = changed.resolved_text.clone();
}

/// Union of two optional texts: both non-empty are joined with
/// [`TEXT_SEPARATOR`], otherwise the non-empty one wins.
///
/// ```
/// use navtree::v1::merge::choose_text;
///
/// assert_eq!(choose_text(Some("A"), Some("B")).as_deref(), Some("A | B"));
/// assert_eq!(choose_text(Some(""), Some("B")).as_deref(), Some("B"));
/// assert_eq!(choose_text(None, None), None);
/// ```
pub fn choose_text(current: Option<&str>, incoming: Option<&str>) -> Option<String> {
    let current = current.filter(|s| !s.is_empty());
    let incoming = incoming.filter(|s| !s.is_empty());
    match (current, incoming) {
        (Some(a), Some(b)) => Some(format!("{a}{TEXT_SEPARATOR}{b}")),
        (Some(a), None) => Some(a.to_string()),
        (None, Some(b)) => Some(b.to_string()),
        (None, None) => None,
    }
}
