use anyhow::Result;
use navtree::v1::StateTree;
use navtree::v1::diff::{self, DiffSummary};
use std::path::PathBuf;

use crate::doc_io;

pub fn run(
    before: Option<PathBuf>,
    after: PathBuf,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<()> {
    if before.is_none() {
        tracing::debug!("no snapshot given; every widget counts as created");
    }
    let before = before.map(|path| doc_io::read_tree(&path)).transpose()?;
    let mut after = doc_io::read_tree(&after)?;

    let summary = annotate(before.as_ref(), &mut after);
    eprintln!("{}", format_summary(&summary));
    doc_io::write_tree(&after, output.as_ref(), pretty)
}

fn annotate(before: Option<&StateTree>, after: &mut StateTree) -> DiffSummary {
    diff::annotate_diff(before.map(|tree| &tree.root), Some(&mut after.root));
    diff::summarize(&after.root)
}

pub(crate) fn format_summary(summary: &DiffSummary) -> String {
    format!(
        "{} created, {} deleted, {} unchanged",
        summary.created, summary.deleted, summary.unchanged
    )
}
