use anyhow::Result;
use navtree::v1::{StateTree, query};
use std::path::PathBuf;

use crate::doc_io;

pub fn run(input: PathBuf) -> Result<()> {
    let tree = doc_io::read_tree(&input)?;
    println!("Valid: {}", describe(&tree));
    Ok(())
}

fn describe(tree: &StateTree) -> String {
    let states = query::all_states(&tree.root).len();
    let widgets = query::all_widgets(&tree.root).len();
    let tombstoned = query::tombstoned_widgets(&tree.root).len();
    let issues = query::issues(&tree.root).len();

    let mut text = format!(
        "{} states, {} widgets ({} deleted, {} issues), {} paths",
        states,
        widgets,
        tombstoned,
        issues,
        tree.paths.len()
    );
    if let Some(product) = &tree.product {
        text = format!("{} [{}]", text, product);
    }
    text
}
