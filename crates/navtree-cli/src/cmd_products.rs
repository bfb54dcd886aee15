use anyhow::{Context, Result};
use navtree_store::ModelLayout;
use std::path::PathBuf;

pub fn run(shared_dir: Option<PathBuf>) -> Result<()> {
    for product in list(shared_dir)? {
        println!("{}", product);
    }
    Ok(())
}

fn list(shared_dir: Option<PathBuf>) -> Result<Vec<String>> {
    let mut layout = ModelLayout::new();
    if let Some(dir) = shared_dir {
        layout = layout.with_shared_dir(dir);
    }
    layout
        .list_products()
        .with_context(|| format!("Failed to list {:?}", layout.shared_dir()))
}
