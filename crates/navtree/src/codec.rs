//! JSON encoding of a [`StateTree`].
//!
//! Widgets are written once into a flat `all-widgets` catalog; the nested
//! `state` object carries only widget ids plus each widget's next state.
//! Matched-widget counterparts that live outside the tree are appended to
//! the catalog so the document loads standalone.

use crate::document::{PathSummary, StateTree};
use crate::error::{Error, Result};
use crate::query;
use crate::types::{
    DIFF_KEY, DiffMap, MetaValue, Rect, State, Widget, WidgetStatus, WidgetSubtype, WidgetType,
    WidgetVisibility,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Deepest state nesting accepted when decoding, root included. Encoding
/// has no limit; this only stops runaway or cyclic input.
pub const MAX_STATE_DEPTH: usize = 2048;

/// Each state level costs three JSON levels (state, visible-widgets, slot).
const MAX_JSON_NESTING: usize = MAX_STATE_DEPTH * 3 + 8;

const MATCHING_WIDGET_KEY: &str = "matching_widget";

// ============================================================================
// Public API
// ============================================================================

/// Encode a tree as compact JSON.
pub fn to_json(tree: &StateTree) -> Result<String> {
    Ok(serde_json::to_string(&encode(tree)?)?)
}

/// Encode a tree as pretty-printed JSON.
pub fn to_json_pretty(tree: &StateTree) -> Result<String> {
    Ok(serde_json::to_string_pretty(&encode(tree)?)?)
}

/// Decode a model document.
///
/// Fails without returning a partial tree when an identity or type field is
/// missing, when a state lists a widget id absent from the catalog, or when
/// the input nests deeper than [`MAX_STATE_DEPTH`] states.
///
/// # Examples
///
/// ```
/// use navtree::v1::{codec, State, StateTree, Widget};
///
/// let tree = StateTree::new(State::home().with_widget(Widget::action("w1")));
/// let json = codec::to_json(&tree).unwrap();
/// assert!(json.contains(r#""next-state":null"#));
///
/// let back = codec::from_json(&json).unwrap();
/// assert_eq!(back.root, tree.root);
/// ```
pub fn from_json(json: &str) -> Result<StateTree> {
    if nesting_depth(json) > MAX_JSON_NESTING {
        return Err(Error::TooDeep(MAX_STATE_DEPTH));
    }
    let mut de = serde_json::Deserializer::from_str(json);
    de.disable_recursion_limit();
    let doc = ModelDoc::deserialize(&mut de)?;
    de.end()?;
    decode(doc)
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ModelDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    product: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_millis"
    )]
    last_updated_at_ms: Option<i64>,
    #[serde(default)]
    paths: Vec<PathSummary>,
    state: StateNode,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    all_widgets: Vec<WidgetRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StateNode {
    state_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bookmarks: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "string_or_list"
    )]
    product_version: Vec<String>,
    #[serde(default)]
    visible_widgets: Vec<WidgetSlot>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    meta_data: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct WidgetSlot {
    id: String,
    /// Always written; `null` when the widget leads nowhere or back home.
    #[serde(default)]
    next_state: Option<Box<StateNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta_data: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct WidgetRecord {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, deserialize_with = "lenient_weight")]
    weight: f64,
    #[serde(rename = "type")]
    widget_type: WidgetType,
    subtype: WidgetSubtype,
    status: WidgetStatus,
    visibility: WidgetVisibility,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_millis"
    )]
    created_date_ms: Option<i64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_millis"
    )]
    reported_date_ms: Option<i64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_millis"
    )]
    resolved_date_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_by_plugin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reported_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reported_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolved_text: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    meta_data: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<LocationRecord>,
}

/// Rectangle with each coordinate written as a decimal string.
#[derive(Debug, Serialize, Deserialize)]
struct LocationRecord {
    #[serde(default)]
    x: Value,
    #[serde(default)]
    y: Value,
    #[serde(default)]
    width: Value,
    #[serde(default)]
    height: Value,
}

fn lenient_weight<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_millis<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn string_or_list<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => vec![s],
        Value::Array(items) => items.iter().filter_map(value_text).collect(),
        _ => Vec::new(),
    })
}

/// Metadata values are strings; other scalars are kept in their JSON form.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn to_millis(at: Option<DateTime<Utc>>) -> Option<i64> {
    at.map(|t| t.timestamp_millis())
}

fn from_millis(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}

// ============================================================================
// Encoding
// ============================================================================

fn encode(tree: &StateTree) -> Result<ModelDoc> {
    let state = encode_state(&tree.root)?;
    let issues = query::issues(&tree.root)
        .into_iter()
        .map(|w| w.id.clone())
        .collect();

    Ok(ModelDoc {
        product: tree.product.clone(),
        last_updated_at_ms: to_millis(tree.last_updated_at),
        paths: tree.paths.clone(),
        state,
        issues,
        all_widgets: catalog(tree),
    })
}

fn encode_state(state: &State) -> Result<StateNode> {
    let mut visible_widgets = Vec::with_capacity(state.widgets.len());
    for widget in &state.widgets {
        let next_state = match widget.navigable_next_state() {
            Some(next) => Some(Box::new(encode_state(next)?)),
            None => None,
        };
        visible_widgets.push(WidgetSlot {
            id: widget.id.clone(),
            next_state,
            meta_data: None,
        });
    }

    let mut meta_data = BTreeMap::new();
    for (key, value) in &state.metadata {
        let value = match value {
            MetaValue::Text(text) => Value::String(text.clone()),
            MetaValue::Diff(diff) => serde_json::to_value(diff)?,
        };
        meta_data.insert(key.clone(), value);
    }

    Ok(StateNode {
        state_id: state.id.clone(),
        bookmarks: state.bookmark.clone(),
        product_version: state.product_versions.clone(),
        visible_widgets,
        meta_data,
    })
}

/// Every reachable widget once, in walk order, followed by the
/// out-of-tree counterparts their matched-widget links point at.
fn catalog(tree: &StateTree) -> Vec<WidgetRecord> {
    let placed = query::all_widgets(&tree.root);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut records = Vec::new();

    for widget in &placed {
        if seen.insert(widget.id.as_str()) {
            records.push(WidgetRecord::from(*widget));
        }
    }

    for widget in &placed {
        let Some(target) = widget.matching_widget.as_deref() else {
            continue;
        };
        if seen.contains(target) {
            continue;
        }
        match tree.counterparts.get(target) {
            Some(counterpart) => {
                seen.insert(target);
                records.push(WidgetRecord::from(counterpart));
            }
            None => {
                tracing::warn!(
                    widget_id = %widget.id,
                    matching_widget = %target,
                    "matched widget is not in the tree or its counterparts"
                );
            }
        }
    }

    records
}

impl From<&Widget> for WidgetRecord {
    fn from(widget: &Widget) -> Self {
        let mut meta_data: BTreeMap<String, Value> = widget
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        if let Some(target) = &widget.matching_widget {
            meta_data.insert(MATCHING_WIDGET_KEY.to_string(), Value::String(target.clone()));
        }

        Self {
            id: widget.id.clone(),
            text: widget.text.clone(),
            weight: widget.weight,
            widget_type: widget.widget_type,
            subtype: widget.subtype,
            status: widget.status,
            visibility: widget.visibility,
            created_date_ms: to_millis(widget.created_at),
            reported_date_ms: to_millis(widget.reported_at),
            resolved_date_ms: to_millis(widget.resolved_at),
            created_by: widget.created_by.clone(),
            created_by_plugin: widget.created_by_plugin.clone(),
            comment: widget.comment.clone(),
            reported_text: widget.reported_text.clone(),
            reported_by: widget.reported_by.clone(),
            resolved_text: widget.resolved_text.clone(),
            meta_data,
            location: widget.location.map(LocationRecord::from),
        }
    }
}

impl From<Rect> for LocationRecord {
    fn from(rect: Rect) -> Self {
        Self {
            x: Value::String(rect.x.to_string()),
            y: Value::String(rect.y.to_string()),
            width: Value::String(rect.width.to_string()),
            height: Value::String(rect.height.to_string()),
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

fn decode(doc: ModelDoc) -> Result<StateTree> {
    let mut order = Vec::with_capacity(doc.all_widgets.len());
    let mut catalog: HashMap<String, Widget> = HashMap::with_capacity(doc.all_widgets.len());
    for record in doc.all_widgets {
        let widget = record.into_widget()?;
        if catalog.contains_key(&widget.id) {
            tracing::debug!(widget_id = %widget.id, "duplicate catalog entry ignored");
            continue;
        }
        order.push(widget.id.clone());
        catalog.insert(widget.id.clone(), widget);
    }

    let mut placed = HashSet::new();
    let mut root = build_state(doc.state, &catalog, &mut placed, 1)?;
    let referenced = resolve_matching_links(&mut root, &catalog);

    let counterparts = order
        .iter()
        .filter(|id| referenced.contains(*id) && !placed.contains(*id))
        .filter_map(|id| catalog.get(id).map(|w| (id.clone(), w.clone())))
        .collect();

    Ok(StateTree {
        product: doc.product,
        last_updated_at: from_millis(doc.last_updated_at_ms),
        paths: doc.paths,
        root,
        counterparts,
    })
}

fn build_state(
    node: StateNode,
    catalog: &HashMap<String, Widget>,
    placed: &mut HashSet<String>,
    depth: usize,
) -> Result<State> {
    if depth > MAX_STATE_DEPTH {
        return Err(Error::TooDeep(MAX_STATE_DEPTH));
    }

    let mut state = State::new(node.state_id);
    state.bookmark = node.bookmarks;
    state.product_versions = node.product_version;
    state.metadata = decode_state_meta(node.meta_data)?;

    for slot in node.visible_widgets {
        let mut widget = catalog
            .get(&slot.id)
            .cloned()
            .ok_or_else(|| Error::UnknownWidget {
                state_id: state.id.clone(),
                widget_id: slot.id.clone(),
            })?;

        if let Some(target) = slot
            .meta_data
            .as_ref()
            .and_then(|meta| meta.get(MATCHING_WIDGET_KEY))
            .and_then(value_text)
            .filter(|id| !id.is_empty())
        {
            widget.matching_widget = Some(target);
        }

        if let Some(next) = slot.next_state {
            let next = build_state(*next, catalog, placed, depth + 1)?;
            widget.next_state = Some(Box::new(next));
        }

        placed.insert(widget.id.clone());
        state.widgets.push(widget);
    }

    Ok(state)
}

fn decode_state_meta(raw: BTreeMap<String, Value>) -> Result<BTreeMap<String, MetaValue>> {
    let mut metadata = BTreeMap::new();
    for (key, value) in raw {
        let value = match value {
            Value::Null => continue,
            Value::Object(_) if key == DIFF_KEY => {
                MetaValue::Diff(serde_json::from_value::<DiffMap>(value)?)
            }
            Value::String(s) => MetaValue::Text(s),
            other => MetaValue::Text(other.to_string()),
        };
        metadata.insert(key, value);
    }
    Ok(metadata)
}

/// Drop matched-widget links whose target is not in the catalog and return
/// the ids of the links that resolved.
fn resolve_matching_links(root: &mut State, catalog: &HashMap<String, Widget>) -> HashSet<String> {
    let mut referenced = HashSet::new();
    let mut stack = vec![root];
    while let Some(state) = stack.pop() {
        for widget in state.widgets.iter_mut() {
            if let Some(target) = widget.matching_widget.take() {
                if catalog.contains_key(&target) {
                    referenced.insert(target.clone());
                    widget.matching_widget = Some(target);
                } else {
                    tracing::warn!(
                        widget_id = %widget.id,
                        matching_widget = %target,
                        "dropping link to a widget missing from all-widgets"
                    );
                }
            }
            if let Some(next) = widget.navigable_next_state_mut() {
                stack.push(next);
            }
        }
    }
    referenced
}

impl WidgetRecord {
    fn into_widget(self) -> Result<Widget> {
        let location = match &self.location {
            Some(loc) => Some(loc.to_rect(&self.id)?),
            None => None,
        };

        let mut widget = Widget::new(self.id, self.widget_type, self.subtype);
        widget.text = self.text;
        widget.weight = self.weight;
        widget.status = self.status;
        widget.visibility = self.visibility;
        widget.created_at = from_millis(self.created_date_ms);
        widget.reported_at = from_millis(self.reported_date_ms);
        widget.resolved_at = from_millis(self.resolved_date_ms);
        widget.created_by = self.created_by;
        widget.created_by_plugin = self.created_by_plugin;
        widget.comment = self.comment;
        widget.reported_text = self.reported_text;
        widget.reported_by = self.reported_by;
        widget.resolved_text = self.resolved_text;
        widget.location = location;

        for (key, value) in self.meta_data {
            if key == MATCHING_WIDGET_KEY {
                widget.matching_widget = value_text(&value).filter(|id| !id.is_empty());
            } else if let Some(text) = value_text(&value) {
                widget.metadata.insert(key, text);
            }
        }

        Ok(widget)
    }
}

impl LocationRecord {
    fn to_rect(&self, widget_id: &str) -> Result<Rect> {
        Ok(Rect::new(
            coordinate(widget_id, "x", &self.x)?,
            coordinate(widget_id, "y", &self.y)?,
            coordinate(widget_id, "width", &self.width)?,
            coordinate(widget_id, "height", &self.height)?,
        ))
    }
}

fn coordinate(widget_id: &str, name: &str, value: &Value) -> Result<i32> {
    let invalid = |reason: String| Error::InvalidLocation {
        widget_id: widget_id.to_string(),
        reason,
    };
    match value {
        Value::String(s) => s
            .trim()
            .parse::<i32>()
            .map_err(|e| invalid(format!("{name} {s:?}: {e}"))),
        Value::Number(n) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| invalid(format!("{name} {n} is not a 32-bit integer"))),
        Value::Null => Err(invalid(format!("{name} is missing"))),
        other => Err(invalid(format!("{name} has unexpected value {other}"))),
    }
}

/// Deepest array/object nesting in `json`, ignoring brackets inside strings.
fn nesting_depth(json: &str) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for byte in json.bytes() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                max = max.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}
