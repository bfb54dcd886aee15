//! Lookup and traversal operations over state trees.
//!
//! All walks use explicit work stacks rather than recursion, follow widgets
//! in list order, and treat a next state that is the home state as absent.
//! Lookups return `None` when nothing matches.

use crate::types::{State, Widget};
use chrono::{DateTime, Utc};

/// Find a widget by id anywhere beneath `root` (inclusive).
///
/// # Examples
///
/// ```
/// use navtree::v1::{State, Widget, query};
///
/// let root = State::home().with_widget(
///     Widget::action("w1").with_next_state(State::new("S1").with_widget(Widget::action("w2"))),
/// );
///
/// assert_eq!(query::find_widget(&root, "w2").unwrap().id, "w2");
/// assert!(query::find_widget(&root, "missing").is_none());
/// ```
pub fn find_widget<'a>(root: &'a State, widget_id: &str) -> Option<&'a Widget> {
    all_widgets(root).into_iter().find(|w| w.id == widget_id)
}

/// Mutable variant of [`find_widget`].
pub fn find_widget_mut<'a>(root: &'a mut State, widget_id: &str) -> Option<&'a mut Widget> {
    let mut stack = vec![root];
    while let Some(state) = stack.pop() {
        for widget in state.widgets.iter_mut() {
            if widget.id == widget_id {
                return Some(widget);
            }
            if let Some(next) = widget.navigable_next_state_mut() {
                stack.push(next);
            }
        }
    }
    None
}

/// The state that directly owns the widget with `widget_id`.
///
/// # Examples
///
/// ```
/// use navtree::v1::{State, Widget, query};
///
/// let root = State::home().with_widget(
///     Widget::action("w1").with_next_state(State::new("S1").with_widget(Widget::action("w2"))),
/// );
///
/// assert_eq!(query::find_owner(&root, "w2").unwrap().id, "S1");
/// assert_eq!(query::find_owner(&root, "w1").unwrap().id, "0");
/// ```
pub fn find_owner<'a>(root: &'a State, widget_id: &str) -> Option<&'a State> {
    all_states(root)
        .into_iter()
        .find(|s| s.widgets.iter().any(|w| w.id == widget_id))
}

/// Find a state by id anywhere beneath `root` (inclusive).
pub fn find_state<'a>(root: &'a State, state_id: &str) -> Option<&'a State> {
    all_states(root).into_iter().find(|s| s.id == state_id)
}

/// Every state reachable from `root`, root first, depth-first.
pub fn all_states(root: &State) -> Vec<&State> {
    let mut result = Vec::new();
    let mut stack = vec![root];
    while let Some(state) = stack.pop() {
        result.push(state);
        for widget in state.widgets.iter().rev() {
            if let Some(next) = widget.navigable_next_state() {
                stack.push(next);
            }
        }
    }
    result
}

/// Every widget reachable from `root`, depth-first: each widget is followed
/// by the widgets of its next state before its next sibling.
pub fn all_widgets(root: &State) -> Vec<&Widget> {
    let mut result = Vec::new();
    let mut stack: Vec<&Widget> = root.widgets.iter().rev().collect();
    while let Some(widget) = stack.pop() {
        result.push(widget);
        if let Some(next) = widget.navigable_next_state() {
            stack.extend(next.widgets.iter().rev());
        }
    }
    result
}

/// Every widget beneath `widget` (exclusive), following its next state.
pub fn descendants(widget: &Widget) -> Vec<&Widget> {
    widget
        .navigable_next_state()
        .map(all_widgets)
        .unwrap_or_default()
}

/// Widgets reported as issues.
pub fn issues(root: &State) -> Vec<&Widget> {
    all_widgets(root)
        .into_iter()
        .filter(|w| w.is_issue())
        .collect()
}

/// Widgets carrying a tombstone marker.
pub fn tombstoned_widgets(root: &State) -> Vec<&Widget> {
    all_widgets(root)
        .into_iter()
        .filter(|w| w.is_tombstoned())
        .collect()
}

/// Tombstone `widget` and every widget in its next-state sub-tree.
/// Returns how many widgets carry a tombstone afterwards.
pub fn tombstone_subtree(widget: &mut Widget, at: DateTime<Utc>) -> usize {
    widget.tombstone(at);
    let mut count = 1;
    let mut stack: Vec<&mut State> = widget.navigable_next_state_mut().into_iter().collect();
    while let Some(state) = stack.pop() {
        for child in state.widgets.iter_mut() {
            child.tombstone(at);
            count += 1;
            if let Some(next) = child.navigable_next_state_mut() {
                stack.push(next);
            }
        }
    }
    count
}

/// Physically remove tombstoned widgets (and their sub-trees) from the tree.
/// Returns the number of widgets removed directly.
pub fn prune_tombstoned(root: &mut State) -> usize {
    let mut removed = 0;
    let mut stack = vec![root];
    while let Some(state) = stack.pop() {
        let before = state.widgets.len();
        state.widgets.retain(|w| !w.is_tombstoned());
        removed += before - state.widgets.len();
        for widget in state.widgets.iter_mut() {
            if let Some(next) = widget.navigable_next_state_mut() {
                stack.push(next);
            }
        }
    }
    removed
}

/// Remove the transient diff annotation from every reachable state.
pub fn strip_diff_annotations(root: &mut State) {
    let mut stack = vec![root];
    while let Some(state) = stack.pop() {
        state.take_diff();
        for widget in state.widgets.iter_mut() {
            if let Some(next) = widget.navigable_next_state_mut() {
                stack.push(next);
            }
        }
    }
}

/// Build a widget-id → widget lookup over the whole tree.
pub fn widget_index(root: &State) -> std::collections::HashMap<&str, &Widget> {
    all_widgets(root)
        .into_iter()
        .map(|w| (w.id.as_str(), w))
        .collect()
}
