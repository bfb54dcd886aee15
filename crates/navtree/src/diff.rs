//! Diff annotation of a session tree against its session-start snapshot.

use crate::types::{DIFF_KEY, DiffMap, DiffType, MetaValue, State, Widget};
use serde::Serialize;

/// Annotate every state of `after` with a [`DiffMap`] classifying its
/// widgets against the matching state of `before`.
///
/// Each after-widget is matched to the first structurally equal widget
/// still unmatched in `before` (see [`Widget::same_as`]): a match is
/// `NO_CHANGES` and the two next states are compared in turn, no match is
/// `CREATED` and its sub-tree is compared against nothing. Before-widgets
/// left unmatched are recorded as `DELETED` under their own id, replacing
/// the annotation of an after-widget that reuses the id.
///
/// `before` is never modified. Links back to the home state are treated as
/// absent on both sides. With no `after` there is nothing to annotate.
///
/// # Examples
///
/// ```
/// use navtree::v1::{diff, DiffType, State, Widget};
///
/// let before = State::home()
///     .with_widget(Widget::action("a").with_meta("href", "/a"))
///     .with_widget(Widget::action("b").with_meta("href", "/b"));
/// let mut after = State::home()
///     .with_widget(Widget::action("a2").with_meta("href", "/a"))
///     .with_widget(Widget::action("c").with_meta("href", "/c"));
///
/// diff::annotate_diff(Some(&before), Some(&mut after));
///
/// let annotation = after.diff().unwrap();
/// assert_eq!(annotation.get("a2"), Some(DiffType::NoChanges));
/// assert_eq!(annotation.get("c"), Some(DiffType::Created));
/// assert_eq!(annotation.get("b"), Some(DiffType::Deleted));
/// ```
pub fn annotate_diff(before: Option<&State>, after: Option<&mut State>) {
    let Some(after) = after else {
        return;
    };

    let mut stack: Vec<(Option<&State>, &mut State)> = vec![(before, after)];
    while let Some((before, after)) = stack.pop() {
        let mut remaining: Vec<&Widget> = before
            .map(|state| state.widgets.iter().collect())
            .unwrap_or_default();
        let mut diff = DiffMap::new();

        let State {
            widgets, metadata, ..
        } = after;

        for widget in widgets.iter_mut() {
            let matched = remaining
                .iter()
                .position(|candidate| candidate.same_as(widget))
                .map(|index| remaining.remove(index));

            let diff_type = if matched.is_some() {
                DiffType::NoChanges
            } else {
                DiffType::Created
            };
            diff.insert(widget.id.clone(), diff_type);

            if let Some(next) = widget.navigable_next_state_mut() {
                let before_next = matched.and_then(Widget::navigable_next_state);
                stack.push((before_next, next));
            }
        }

        for deleted in remaining {
            if let Some(previous) = diff.insert(deleted.id.clone(), DiffType::Deleted) {
                tracing::debug!(
                    widget_id = %deleted.id,
                    %previous,
                    "unmatched widget shares an id with an after widget; deletion wins"
                );
            }
        }

        metadata.insert(DIFF_KEY.to_string(), MetaValue::Diff(diff));
    }
}

/// Annotation counts across an annotated tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub created: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub changed: usize,
}

impl DiffSummary {
    pub fn total(&self) -> usize {
        self.created + self.deleted + self.unchanged + self.changed
    }

    /// True when the session neither added nor removed anything.
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.deleted == 0 && self.changed == 0
    }
}

/// Count the diff annotations on every state reachable from `root`.
pub fn summarize(root: &State) -> DiffSummary {
    let mut summary = DiffSummary::default();
    for state in crate::query::all_states(root) {
        let Some(diff) = state.diff() else {
            continue;
        };
        for (_, diff_type) in diff.iter() {
            match diff_type {
                DiffType::Created => summary.created += 1,
                DiffType::Deleted => summary.deleted += 1,
                DiffType::NoChanges => summary.unchanged += 1,
                DiffType::Changed => summary.changed += 1,
            }
        }
    }
    summary
}
