use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Id of the home (root) state.
pub const HOME_STATE_ID: &str = "0";

/// Bookmark given to a freshly created home state.
pub const HOME_BOOKMARK: &str = "Home";

/// Reserved state metadata key holding the transient [`DiffMap`].
pub const DIFF_KEY: &str = "multi-user-diff-widgets";

/// Widget metadata key holding the tombstone timestamp (epoch millis).
pub const DELETED_AT_KEY: &str = "multi-user-merge-deleted-at";

/// Metadata keys compared by [`Widget::same_as`].
pub const MATCHING_KEYS: [&str; 5] = ["href", "xpath", "text", "tag", "class"];

// ============================================================================
// Widget enums
// ============================================================================

/// What kind of element a widget is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WidgetType {
    Action,
    Check,
    Issue,
}

/// How a widget is interacted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WidgetSubtype {
    TypeAction,
    LeftClickAction,
    LongClickAction,
    RightClickAction,
    DoubleClickAction,
    DragAction,
    SwipeAction,
    MoveAction,
    SelectAction,
    GoHomeAction,
    TextCheck,
    ImageCheck,
}

/// Whether the widget was located on screen during capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WidgetStatus {
    Located,
    Unlocated,
    Valid,
    Updated,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WidgetVisibility {
    Visible,
    Hidden,
    Suggestion,
}

// ============================================================================
// Diff annotations
// ============================================================================

/// Classification of a widget after comparing a session tree with its
/// session-start snapshot.
///
/// `Changed` is part of the vocabulary but the diff engine never emits it;
/// the merge engine treats it like any other type without a merge strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffType {
    Created,
    Deleted,
    Changed,
    NoChanges,
}

impl DiffType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffType::Created => "CREATED",
            DiffType::Deleted => "DELETED",
            DiffType::Changed => "CHANGED",
            DiffType::NoChanges => "NO_CHANGES",
        }
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiffType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(DiffType::Created),
            "DELETED" => Ok(DiffType::Deleted),
            "CHANGED" => Ok(DiffType::Changed),
            "NO_CHANGES" => Ok(DiffType::NoChanges),
            other => Err(format!("unknown diff type {:?}", other)),
        }
    }
}

/// Widget id → [`DiffType`], in insertion order.
///
/// Insertion order is the order the diff engine visited widgets (after-side
/// widgets in list order, then unmatched before-side widgets), which keeps
/// the merge engine's append order deterministic.
///
/// # JSON shape
///
/// ```json
/// { "1621245": "NO_CHANGES", "1621246": "CREATED", "1621001": "DELETED" }
/// ```
///
/// Unknown type strings are skipped (with a warning) when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffMap {
    entries: Vec<(String, DiffType)>,
    /// Id → position in `entries`.
    index: HashMap<String, usize>,
}

impl DiffMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the annotation for `id`, returning the previous one.
    /// A replaced entry keeps its original position.
    pub fn insert(&mut self, id: impl Into<String>, diff_type: DiffType) -> Option<DiffType> {
        let id = id.into();
        if let Some(&position) = self.index.get(&id) {
            return Some(std::mem::replace(&mut self.entries[position].1, diff_type));
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push((id, diff_type));
        None
    }

    pub fn get(&self, id: &str) -> Option<DiffType> {
        self.index.get(id).map(|&position| self.entries[position].1)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DiffType)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for DiffMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, diff_type) in &self.entries {
            map.serialize_entry(id, diff_type.as_str())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DiffMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DiffMapVisitor;

        impl<'de> Visitor<'de> for DiffMapVisitor {
            type Value = DiffMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of widget id to diff type")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<DiffMap, A::Error> {
                let mut diff = DiffMap::new();
                while let Some((id, raw)) = access.next_entry::<String, String>()? {
                    match raw.parse::<DiffType>() {
                        Ok(diff_type) => {
                            diff.insert(id, diff_type);
                        }
                        Err(reason) => {
                            tracing::warn!(widget_id = %id, %reason, "skipping diff annotation");
                        }
                    }
                }
                Ok(diff)
            }
        }

        deserializer.deserialize_map(DiffMapVisitor)
    }
}

/// A state metadata value.
///
/// Plain metadata is text; the reserved [`DIFF_KEY`] entry holds the
/// structured diff annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaValue {
    Text(String),
    Diff(DiffMap),
}

impl MetaValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            MetaValue::Diff(_) => None,
        }
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Screen location of a widget, in capture pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// A node of the navigation tree: one distinct screen and the widgets
/// visible on it.
///
/// States own their widgets, and widgets own their next state, so a tree is
/// a plain owned structure and [`Clone`] is a full deep copy.
///
/// # Builder API
///
/// ```
/// use navtree::v1::{State, Widget};
///
/// let home = State::home()
///     .with_widget(Widget::action("w1").with_meta("href", "https://example.com/login"));
///
/// assert!(home.is_home());
/// assert_eq!(home.widgets.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: String,
    pub bookmark: Option<String>,
    pub product_versions: Vec<String>,
    /// Visible widgets, in discovery order.
    pub widgets: Vec<Widget>,
    pub metadata: BTreeMap<String, MetaValue>,
}

impl State {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bookmark: None,
            product_versions: Vec::new(),
            widgets: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// A fresh home-only tree.
    pub fn home() -> Self {
        Self::new(HOME_STATE_ID).with_bookmark(HOME_BOOKMARK)
    }

    pub fn with_bookmark(mut self, bookmark: impl Into<String>) -> Self {
        self.bookmark = Some(bookmark.into());
        self
    }

    pub fn with_widget(mut self, widget: Widget) -> Self {
        self.widgets.push(widget);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_meta_text(key, value);
        self
    }

    pub fn is_home(&self) -> bool {
        self.id == HOME_STATE_ID
    }

    /// Independent copy of this state and everything beneath it.
    ///
    /// Matched-widget links are ids, so they keep pointing at the same
    /// widget whether it lives inside the copy or in a parallel tree.
    pub fn deep_copy(&self) -> State {
        self.clone()
    }

    /// Widget directly owned by this state.
    pub fn widget(&self, id: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    pub fn widget_mut(&mut self, id: &str) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.id == id)
    }

    /// Index of the first widget structurally equal to `widget`.
    pub fn position_of_same(&self, widget: &Widget) -> Option<usize> {
        self.widgets.iter().position(|w| w.same_as(widget))
    }

    pub fn meta(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    pub fn meta_text(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(MetaValue::as_text)
    }

    pub fn set_meta_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata
            .insert(key.into(), MetaValue::Text(value.into()));
    }

    /// The diff annotation attached by the diff engine, if any.
    pub fn diff(&self) -> Option<&DiffMap> {
        match self.metadata.get(DIFF_KEY) {
            Some(MetaValue::Diff(diff)) => Some(diff),
            _ => None,
        }
    }

    pub fn set_diff(&mut self, diff: DiffMap) {
        self.metadata.insert(DIFF_KEY.to_string(), MetaValue::Diff(diff));
    }

    pub fn take_diff(&mut self) -> Option<DiffMap> {
        match self.metadata.remove(DIFF_KEY) {
            Some(MetaValue::Diff(diff)) => Some(diff),
            Some(other) => {
                self.metadata.insert(DIFF_KEY.to_string(), other);
                None
            }
            None => None,
        }
    }
}

// ============================================================================
// Widget
// ============================================================================

/// An interactive element discovered in a state.
///
/// Identity for diffing and merging is structural, see [`Widget::same_as`].
/// `matching_widget` is a weak link by id to a structurally matched widget
/// that normally lives in a parallel tree; it is never walked as a child.
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: String,
    pub text: Option<String>,
    pub weight: f64,
    pub widget_type: WidgetType,
    pub subtype: WidgetSubtype,
    pub status: WidgetStatus,
    pub visibility: WidgetVisibility,
    pub created_at: Option<DateTime<Utc>>,
    pub reported_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_by_plugin: Option<String>,
    pub comment: Option<String>,
    pub reported_text: Option<String>,
    pub reported_by: Option<String>,
    pub resolved_text: Option<String>,
    pub location: Option<Rect>,
    /// Matching hints (`xpath`, `href`, `tag`, `class`, `text`, ...) and the
    /// tombstone marker.
    pub metadata: BTreeMap<String, String>,
    pub matching_widget: Option<String>,
    pub next_state: Option<Box<State>>,
}

impl Widget {
    pub fn new(
        id: impl Into<String>,
        widget_type: WidgetType,
        subtype: WidgetSubtype,
    ) -> Self {
        Self {
            id: id.into(),
            text: None,
            weight: 0.0,
            widget_type,
            subtype,
            status: WidgetStatus::Located,
            visibility: WidgetVisibility::Visible,
            created_at: None,
            reported_at: None,
            resolved_at: None,
            created_by: None,
            created_by_plugin: None,
            comment: None,
            reported_text: None,
            reported_by: None,
            resolved_text: None,
            location: None,
            metadata: BTreeMap::new(),
            matching_widget: None,
            next_state: None,
        }
    }

    /// A visible, located left-click action.
    pub fn action(id: impl Into<String>) -> Self {
        Self::new(id, WidgetType::Action, WidgetSubtype::LeftClickAction)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_next_state(mut self, state: State) -> Self {
        self.next_state = Some(Box::new(state));
        self
    }

    pub fn with_location(mut self, location: Rect) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_reported_text(mut self, text: impl Into<String>) -> Self {
        self.reported_text = Some(text.into());
        self
    }

    pub fn with_created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = Some(actor.into());
        self
    }

    pub fn with_matching_widget(mut self, id: impl Into<String>) -> Self {
        self.matching_widget = Some(id.into());
        self
    }

    /// Structural equality used by diff and merge.
    ///
    /// Two widgets are the same when subtype, visibility, and every key in
    /// [`MATCHING_KEYS`] agree (a key missing on both sides agrees). Ids,
    /// actors, and timestamps are ignored.
    pub fn same_as(&self, other: &Widget) -> bool {
        self.subtype == other.subtype
            && self.visibility == other.visibility
            && MATCHING_KEYS
                .iter()
                .all(|key| self.metadata.get(*key) == other.metadata.get(*key))
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn is_issue(&self) -> bool {
        self.widget_type == WidgetType::Issue
    }

    /// Next state for tree walks; a link back to home counts as none.
    pub fn navigable_next_state(&self) -> Option<&State> {
        self.next_state.as_deref().filter(|s| !s.is_home())
    }

    pub fn navigable_next_state_mut(&mut self) -> Option<&mut State> {
        self.next_state.as_deref_mut().filter(|s| !s.is_home())
    }

    /// When the widget was tombstoned by a merge, if it was.
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        let millis: i64 = self.metadata.get(DELETED_AT_KEY)?.trim().parse().ok()?;
        if millis <= 0 {
            return None;
        }
        DateTime::from_timestamp_millis(millis)
    }

    pub fn is_tombstoned(&self) -> bool {
        self.deleted_at().is_some()
    }

    /// Mark the widget as logically deleted. An existing tombstone keeps
    /// its original timestamp.
    pub fn tombstone(&mut self, at: DateTime<Utc>) {
        if self.is_tombstoned() {
            return;
        }
        self.metadata
            .insert(DELETED_AT_KEY.to_string(), at.timestamp_millis().to_string());
    }
}
