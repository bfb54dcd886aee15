//! Generate Graphviz DOT visualizations from navtree state trees.
//!
//! States become nodes and widgets become the edges between them: each
//! widget is drawn from the state that owns it to the state it leads to,
//! or to a small leaf marker when it leads nowhere. The home state is
//! double-bordered. Widgets tombstoned by a merge are drawn dashed red
//! and reported issues are highlighted in orange.
//!
//! # Example
//!
//! ```
//! use navtree::v1::{State, StateTree, Widget};
//! use navtree_dot::{render, RenderOptions};
//!
//! let cart = State::new("1").with_bookmark("Cart");
//! let tree = StateTree::new(
//!     State::home().with_widget(Widget::action("w1").with_text("Cart").with_next_state(cart)),
//! )
//! .with_product("shop");
//!
//! let dot = render(&tree, &RenderOptions::default());
//! assert!(dot.contains("digraph navtree"));
//! assert!(dot.contains("\"0\" -> \"1\""));
//! ```
//!
//! Pipe the output through Graphviz to produce images:
//!
//! ```bash
//! navtree render dot -i shared-state.json | dot -Tpng -o model.png
//! ```

use std::collections::HashSet;

use navtree::v1::{State, StateTree, Widget};

const TOMBSTONE_COLOR: &str = "#cc0000";
const ISSUE_COLOR: &str = "#ff8c00";
const HOME_FILL: &str = "#cce5ff";
const STATE_FILL: &str = "#f8f9fa";
const MAX_LABEL_CHARS: usize = 40;

/// Options controlling what information is rendered in the DOT output.
pub struct RenderOptions {
    /// Append each widget's id to its edge label.
    pub show_widget_ids: bool,
    /// Draw tombstoned widgets (and everything beneath them).
    pub show_tombstoned: bool,
    /// Draw ISSUE widgets in orange.
    pub highlight_issues: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_widget_ids: false,
            show_tombstoned: true,
            highlight_issues: true,
        }
    }
}

/// Render a [`StateTree`] as a DOT digraph.
pub fn render(tree: &StateTree, options: &RenderOptions) -> String {
    let mut dot = String::new();
    dot.push_str("digraph navtree {\n");
    dot.push_str("  rankdir=TB;\n");
    dot.push_str("  node [shape=box, style=rounded, fontname=\"Helvetica\"];\n");
    dot.push_str("  edge [color=\"#666666\", fontname=\"Helvetica\", fontsize=10];\n\n");

    if let Some(product) = &tree.product {
        dot.push_str("  labelloc=\"t\";\n");
        dot.push_str(&format!("  label=\"{}\";\n", escape_dot(product)));
        dot.push_str("  fontsize=16;\n");
        dot.push_str("  fontname=\"Helvetica-Bold\";\n\n");
    }

    let mut emitted: HashSet<&str> = HashSet::new();
    let mut edges = String::new();
    let mut stack = vec![&tree.root];

    while let Some(state) = stack.pop() {
        if emitted.insert(state.id.as_str()) {
            dot.push_str(&format_state_node(state));
        }

        for widget in &state.widgets {
            let tombstoned = widget.is_tombstoned();
            if tombstoned && !options.show_tombstoned {
                continue;
            }

            let target = match widget.next_state.as_deref() {
                Some(next) => next.id.clone(),
                None => {
                    let leaf = format!("leaf_{}", widget.id);
                    dot.push_str(&format!(
                        "  \"{}\" [label=\"\", shape=point, width=0.12{}];\n",
                        escape_dot(&leaf),
                        if tombstoned {
                            format!(", color=\"{}\"", TOMBSTONE_COLOR)
                        } else {
                            String::new()
                        }
                    ));
                    leaf
                }
            };

            edges.push_str(&format!(
                "  \"{}\" -> \"{}\" [{}];\n",
                escape_dot(&state.id),
                escape_dot(&target),
                edge_attributes(widget, options)
            ));
        }

        for widget in state.widgets.iter().rev() {
            if widget.is_tombstoned() && !options.show_tombstoned {
                continue;
            }
            if let Some(next) = widget.navigable_next_state() {
                stack.push(next);
            }
        }
    }

    dot.push('\n');
    dot.push_str(&edges);

    // Legend
    dot.push_str("\n  subgraph cluster_legend {\n");
    dot.push_str("    label=\"Legend\";\n");
    dot.push_str("    fontname=\"Helvetica-Bold\";\n");
    dot.push_str("    style=filled;\n");
    dot.push_str("    fillcolor=\"#f8f8f8\";\n");
    dot.push_str("    node [shape=box, style=\"rounded,filled\", width=0.9, fontname=\"Helvetica\", fontsize=10];\n");
    dot.push_str(&format!(
        "    leg_home [label=\"home\", fillcolor=\"{}\", peripheries=2];\n",
        HOME_FILL
    ));
    dot.push_str(&format!(
        "    leg_state [label=\"state\", fillcolor=\"{}\"];\n",
        STATE_FILL
    ));
    dot.push_str("    leg_home -> leg_state [label=\"widget\"];\n");
    if options.show_tombstoned {
        dot.push_str(&format!(
            "    leg_deleted [label=\"deleted\", fillcolor=\"#ffcccc\", style=\"rounded,filled,dashed\", color=\"{}\"];\n",
            TOMBSTONE_COLOR
        ));
        dot.push_str("    leg_state -> leg_deleted [style=invis];\n");
    }
    if options.highlight_issues {
        dot.push_str(&format!(
            "    leg_issue [label=\"issue\", fillcolor=\"#ffe5cc\", color=\"{}\"];\n",
            ISSUE_COLOR
        ));
        dot.push_str("    leg_state -> leg_issue [style=invis];\n");
    }
    dot.push_str("  }\n");

    dot.push_str("}\n");
    dot
}

fn format_state_node(state: &State) -> String {
    let mut rows = vec![];
    match &state.bookmark {
        Some(bookmark) => {
            rows.push(format!("<b>{}</b>", escape_html(bookmark)));
            rows.push(format!(
                "<font point-size=\"9\" color=\"#666666\">{}</font>",
                escape_html(&state.id)
            ));
        }
        None => rows.push(format!("<b>{}</b>", escape_html(&state.id))),
    }
    if !state.product_versions.is_empty() {
        rows.push(format!(
            "<font point-size=\"8\" color=\"gray\">{}</font>",
            escape_html(&state.product_versions.join(", "))
        ));
    }

    let (fill, peripheries) = if state.is_home() {
        (HOME_FILL, 2)
    } else {
        (STATE_FILL, 1)
    };
    format!(
        "  \"{}\" [label=<{}>, fillcolor=\"{}\", style=\"rounded,filled\", peripheries={}];\n",
        escape_dot(&state.id),
        rows.join("<br/>"),
        fill,
        peripheries
    )
}

fn edge_attributes(widget: &Widget, options: &RenderOptions) -> String {
    let mut label = widget_label(widget);
    if options.show_widget_ids {
        label = format!("{} [{}]", label, widget.id);
    }

    let mut attrs = vec![format!("label=\"{}\"", escape_dot(&label))];
    if widget.is_tombstoned() {
        attrs.push(format!("color=\"{}\"", TOMBSTONE_COLOR));
        attrs.push(format!("fontcolor=\"{}\"", TOMBSTONE_COLOR));
        attrs.push("style=dashed".to_string());
    } else if widget.is_issue() && options.highlight_issues {
        attrs.push(format!("color=\"{}\"", ISSUE_COLOR));
        attrs.push(format!("fontcolor=\"{}\"", ISSUE_COLOR));
        attrs.push("penwidth=2".to_string());
    }
    attrs.join(", ")
}

/// What a widget shows on its edge: its text, else its `text` metadata,
/// else its id. Long labels are cut with an ellipsis.
fn widget_label(widget: &Widget) -> String {
    let text = widget
        .text
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| widget.meta("text").filter(|t| !t.trim().is_empty()))
        .or_else(|| widget.reported_text.as_deref())
        .unwrap_or(&widget.id);

    if text.chars().count() > MAX_LABEL_CHARS {
        format!("{}\u{2026}", safe_prefix(text, MAX_LABEL_CHARS - 3))
    } else {
        text.to_string()
    }
}

fn safe_prefix(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Escape a string for use in DOT label attributes (double-quoted context).
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Escape a string for use inside HTML-like DOT labels.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use navtree::v1::{WidgetType, query};

    fn sample_tree() -> StateTree {
        let cart = State::new("1")
            .with_bookmark("Cart")
            .with_widget(Widget::action("w2").with_text("Checkout"));
        StateTree::new(
            State::home()
                .with_widget(Widget::action("w1").with_text("Open cart").with_next_state(cart)),
        )
        .with_product("shop")
    }

    fn tombstone(tree: &mut StateTree, widget_id: &str) {
        let at = DateTime::from_timestamp_millis(1_621_245_432_207).unwrap();
        query::find_widget_mut(&mut tree.root, widget_id)
            .unwrap()
            .tombstone(at);
    }

    // ── escape_dot ────────────────────────────────────────────────────

    #[test]
    fn test_escape_dot_quotes() {
        assert_eq!(escape_dot(r#"say "hello""#), r#"say \"hello\""#);
    }

    #[test]
    fn test_escape_dot_backslash() {
        assert_eq!(escape_dot(r"path\to\file"), r"path\\to\\file");
    }

    #[test]
    fn test_escape_dot_newline() {
        assert_eq!(escape_dot("line1\nline2"), r"line1\nline2");
    }

    // ── escape_html ───────────────────────────────────────────────────

    #[test]
    fn test_escape_html_combined() {
        assert_eq!(
            escape_html(r#"<a href="x">&</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
    }

    // ── safe_prefix ───────────────────────────────────────────────────

    #[test]
    fn test_safe_prefix_multibyte() {
        assert_eq!(safe_prefix("日本語", 2), "日本");
        assert_eq!(safe_prefix("abc", 8), "abc");
    }

    // ── render ────────────────────────────────────────────────────────

    #[test]
    fn test_render_basic() {
        let dot = render(&sample_tree(), &RenderOptions::default());
        assert!(dot.starts_with("digraph navtree {"));
        assert!(dot.contains("label=\"shop\""));
        assert!(dot.contains("\"0\" -> \"1\" [label=\"Open cart\"]"));
        assert!(dot.contains("\"1\" -> \"leaf_w2\" [label=\"Checkout\"]"));
        assert!(dot.contains("cluster_legend"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_render_home_and_bookmark() {
        let dot = render(&sample_tree(), &RenderOptions::default());
        assert!(dot.contains("\"0\" [label=<<b>Home</b>"));
        assert!(dot.contains(&format!(
            "fillcolor=\"{}\", style=\"rounded,filled\", peripheries=2",
            HOME_FILL
        )));
        assert!(dot.contains(
            "\"1\" [label=<<b>Cart</b><br/><font point-size=\"9\" color=\"#666666\">1</font>>"
        ));
    }

    #[test]
    fn test_render_state_emitted_once() {
        let tree = StateTree::new(
            State::home()
                .with_widget(Widget::action("a").with_next_state(State::new("1")))
                .with_widget(Widget::action("b").with_next_state(State::new("1"))),
        );
        let dot = render(&tree, &RenderOptions::default());
        assert_eq!(dot.matches("\n  \"1\" [label=").count(), 1);
        assert!(dot.contains("\"0\" -> \"1\" [label=\"a\"]"));
        assert!(dot.contains("\"0\" -> \"1\" [label=\"b\"]"));
    }

    #[test]
    fn test_render_link_back_home() {
        let tree = StateTree::new(
            State::home().with_widget(Widget::action("back").with_next_state(State::home())),
        );
        let dot = render(&tree, &RenderOptions::default());
        assert!(dot.contains("\"0\" -> \"0\" [label=\"back\"]"));
        assert!(!dot.contains("leaf_back"));
    }

    #[test]
    fn test_render_tombstoned_dashed_red() {
        let mut tree = sample_tree();
        tombstone(&mut tree, "w1");
        let dot = render(&tree, &RenderOptions::default());
        assert!(dot.contains(&format!(
            "\"0\" -> \"1\" [label=\"Open cart\", color=\"{}\", fontcolor=\"{}\", style=dashed]",
            TOMBSTONE_COLOR, TOMBSTONE_COLOR
        )));
        assert!(dot.contains("leg_deleted"));
    }

    #[test]
    fn test_render_hide_tombstoned_skips_subtree() {
        let mut tree = sample_tree();
        tombstone(&mut tree, "w1");
        let options = RenderOptions {
            show_tombstoned: false,
            ..Default::default()
        };
        let dot = render(&tree, &options);
        assert!(!dot.contains("Open cart"));
        assert!(!dot.contains("Checkout"));
        assert!(!dot.contains("<b>Cart</b>"));
        assert!(!dot.contains("leg_deleted"));
    }

    #[test]
    fn test_render_issue_highlight() {
        let mut issue = Widget::action("bug").with_reported_text("Button does nothing");
        issue.widget_type = WidgetType::Issue;
        let tree = StateTree::new(State::home().with_widget(issue));

        let dot = render(&tree, &RenderOptions::default());
        assert!(dot.contains(&format!(
            "[label=\"Button does nothing\", color=\"{}\", fontcolor=\"{}\", penwidth=2]",
            ISSUE_COLOR, ISSUE_COLOR
        )));

        let plain = RenderOptions {
            highlight_issues: false,
            ..Default::default()
        };
        let dot = render(&tree, &plain);
        assert!(dot.contains("[label=\"Button does nothing\"];"));
        assert!(!dot.contains("leg_issue"));
    }

    #[test]
    fn test_render_widget_ids() {
        let options = RenderOptions {
            show_widget_ids: true,
            ..Default::default()
        };
        let dot = render(&sample_tree(), &options);
        assert!(dot.contains("label=\"Open cart [w1]\""));
    }

    #[test]
    fn test_render_label_fallbacks() {
        let tree = StateTree::new(
            State::home()
                .with_widget(Widget::action("m").with_meta("text", "From meta"))
                .with_widget(Widget::action("bare")),
        );
        let dot = render(&tree, &RenderOptions::default());
        assert!(dot.contains("[label=\"From meta\"]"));
        assert!(dot.contains("\"0\" -> \"leaf_bare\" [label=\"bare\"]"));
    }

    #[test]
    fn test_render_truncates_long_text() {
        let tree = StateTree::new(
            State::home().with_widget(Widget::action("w").with_text("x".repeat(60))),
        );
        let dot = render(&tree, &RenderOptions::default());
        assert!(dot.contains(&format!("{}\u{2026}", "x".repeat(37))));
        assert!(!dot.contains(&"x".repeat(38)));
    }

    #[test]
    fn test_render_escapes_text() {
        let tree = StateTree::new(
            State::home()
                .with_bookmark("A & <B>")
                .with_widget(Widget::action("q").with_text(r#"say "hi""#)),
        );
        let dot = render(&tree, &RenderOptions::default());
        assert!(dot.contains("<b>A &amp; &lt;B&gt;</b>"));
        assert!(dot.contains(r#"label="say \"hi\"""#));
    }
}
