use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use navtree::v1::{State, StateTree, Widget, WidgetSubtype, WidgetType, query};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::doc_io;

#[derive(Subcommand, Debug)]
pub enum QueryOp {
    /// Look up a widget by id (inside the tree or among its counterparts)
    Widget {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Widget ID
        #[arg(long)]
        id: String,
    },
    /// Find the state that lists a widget
    Owner {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Widget ID
        #[arg(long)]
        id: String,
    },
    /// Look up a state by id
    State {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// State ID
        #[arg(long)]
        id: String,
    },
    /// List reported issues
    Issues {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,
    },
    /// List widgets deleted by a merge
    Tombstoned {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct WidgetView<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    widget_type: WidgetType,
    subtype: WidgetSubtype,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reported_text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: &'a BTreeMap<String, String>,
}

impl<'a> WidgetView<'a> {
    fn new(widget: &'a Widget, owner: Option<&'a State>) -> Self {
        Self {
            id: &widget.id,
            widget_type: widget.widget_type,
            subtype: widget.subtype,
            text: widget.text.as_deref(),
            state: owner.map(|s| s.id.as_str()),
            next_state: widget.next_state.as_deref().map(|s| s.id.as_str()),
            reported_text: widget.reported_text.as_deref(),
            deleted_at: widget.deleted_at(),
            metadata: &widget.metadata,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct StateView<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bookmark: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    product_versions: &'a Vec<String>,
    widgets: Vec<&'a str>,
}

impl<'a> StateView<'a> {
    fn new(state: &'a State) -> Self {
        Self {
            id: &state.id,
            bookmark: state.bookmark.as_deref(),
            product_versions: &state.product_versions,
            widgets: state.widgets.iter().map(|w| w.id.as_str()).collect(),
        }
    }
}

pub fn run(op: QueryOp, pretty: bool) -> Result<()> {
    match op {
        QueryOp::Widget { input, id } => {
            let tree = doc_io::read_tree(&input)?;
            print_json(&widget(&tree, &id)?, pretty)
        }
        QueryOp::Owner { input, id } => {
            let tree = doc_io::read_tree(&input)?;
            print_json(&owner(&tree, &id)?, pretty)
        }
        QueryOp::State { input, id } => {
            let tree = doc_io::read_tree(&input)?;
            print_json(&state(&tree, &id)?, pretty)
        }
        QueryOp::Issues { input } => {
            let tree = doc_io::read_tree(&input)?;
            print_json(&listing(&tree, query::issues(&tree.root)), pretty)
        }
        QueryOp::Tombstoned { input } => {
            let tree = doc_io::read_tree(&input)?;
            print_json(&listing(&tree, query::tombstoned_widgets(&tree.root)), pretty)
        }
    }
}

fn widget<'a>(tree: &'a StateTree, id: &str) -> Result<WidgetView<'a>> {
    let Some(found) = tree.resolve_widget(id) else {
        bail!("No widget with id {:?}", id);
    };
    Ok(WidgetView::new(found, query::find_owner(&tree.root, id)))
}

fn owner<'a>(tree: &'a StateTree, id: &str) -> Result<StateView<'a>> {
    match query::find_owner(&tree.root, id) {
        Some(state) => Ok(StateView::new(state)),
        None => bail!("No state lists widget {:?}", id),
    }
}

fn state<'a>(tree: &'a StateTree, id: &str) -> Result<StateView<'a>> {
    match query::find_state(&tree.root, id) {
        Some(state) => Ok(StateView::new(state)),
        None => bail!("No state with id {:?}", id),
    }
}

fn listing<'a>(tree: &'a StateTree, widgets: Vec<&'a Widget>) -> Vec<WidgetView<'a>> {
    widgets
        .into_iter()
        .map(|w| WidgetView::new(w, query::find_owner(&tree.root, &w.id)))
        .collect()
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}
