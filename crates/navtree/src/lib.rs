#![doc = include_str!("../README.md")]

mod codec;
mod diff;
mod document;
mod error;
mod merge;
mod query;
mod types;

pub use error::{Error, Result};

pub mod v1 {
    //! Versioned public API for navigation trees.
    //!
    //! # Entity model
    //!
    //! - [`State`]: one screen and the widgets visible on it
    //! - [`Widget`]: an interactive element, optionally leading to a next state
    //! - [`WidgetType`], [`WidgetSubtype`], [`WidgetStatus`], [`WidgetVisibility`]
    //! - [`Rect`]: on-screen location
    //! - [`MetaValue`]: a state metadata entry (text or diff annotation)
    //!
    //! # Documents
    //!
    //! - [`StateTree`]: a persisted model: product, paths, root state, and
    //!   the out-of-tree counterparts of matched widgets
    //! - [`PathSummary`]: one recorded exploration path
    //! - [`codec`]: JSON encoding with a deduplicated widget catalog
    //!
    //! # Diff and merge
    //!
    //! - [`diff`]: classify a session tree against its starting snapshot
    //! - [`merge`]: fold an annotated session tree into the shared tree
    //! - [`DiffType`], [`DiffMap`]
    //!
    //! # Example: one session, end to end
    //!
    //! ```
    //! use navtree::v1::*;
    //!
    //! let shared = StateTree::new(
    //!     State::home().with_widget(Widget::action("login").with_meta("href", "/login")),
    //! );
    //!
    //! // Load, explore, and come back with one new widget.
    //! let loaded = StateTree::from_json(&shared.to_json().unwrap()).unwrap();
    //! let snapshot = loaded.root.deep_copy();
    //! let mut captured = loaded.root.deep_copy();
    //! captured.widgets.push(Widget::action("cart").with_meta("href", "/cart"));
    //!
    //! diff::annotate_diff(Some(&snapshot), Some(&mut captured));
    //! assert_eq!(diff::summarize(&captured).created, 1);
    //!
    //! let merged = merge::merge(Some(&shared.root), Some(&captured)).unwrap();
    //! assert_eq!(query::all_widgets(&merged).len(), 2);
    //! ```

    /// Lookups and walks over a state tree.
    ///
    /// Walks follow widgets in list order and never step into a next state
    /// that is the home state.
    ///
    /// # Example
    ///
    /// ```
    /// use navtree::v1::{State, Widget, query};
    ///
    /// let root = State::home().with_widget(
    ///     Widget::action("w1").with_next_state(
    ///         State::new("S1").with_widget(Widget::action("w2")),
    ///     ),
    /// );
    ///
    /// assert_eq!(query::find_owner(&root, "w2").unwrap().id, "S1");
    /// assert_eq!(query::all_states(&root).len(), 2);
    /// ```
    pub mod query {
        pub use crate::query::{
            all_states, all_widgets, descendants, find_owner, find_state, find_widget,
            find_widget_mut, issues, prune_tombstoned, strip_diff_annotations, tombstone_subtree,
            tombstoned_widgets, widget_index,
        };
    }

    /// JSON encoding of [`StateTree`](crate::v1::StateTree) documents.
    pub mod codec {
        pub use crate::codec::{MAX_STATE_DEPTH, from_json, to_json, to_json_pretty};
    }

    /// Diff annotation of a session tree.
    pub mod diff {
        pub use crate::diff::{DiffSummary, annotate_diff, summarize};
    }

    /// Merging an annotated session tree into the shared tree.
    pub mod merge {
        pub use crate::merge::{TEXT_SEPARATOR, choose_text, merge, merge_at, merge_into};
    }

    pub use crate::document::{PathSummary, StateTree};
    pub use crate::types::{
        DELETED_AT_KEY, DIFF_KEY, DiffMap, DiffType, HOME_BOOKMARK, HOME_STATE_ID, MATCHING_KEYS,
        MetaValue, Rect, State, Widget, WidgetStatus, WidgetSubtype, WidgetType, WidgetVisibility,
    };
}
