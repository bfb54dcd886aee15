use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::doc_io;

#[derive(Subcommand, Debug)]
pub enum RenderFormat {
    /// Render as Graphviz DOT
    Dot {
        /// Input file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Append widget ids to edge labels
        #[arg(long)]
        show_ids: bool,

        /// Leave out widgets deleted by a merge
        #[arg(long)]
        hide_tombstoned: bool,

        /// Draw issues like any other widget
        #[arg(long)]
        no_issue_highlight: bool,
    },
}

pub fn run(format: RenderFormat) -> Result<()> {
    match format {
        RenderFormat::Dot {
            input,
            output,
            show_ids,
            hide_tombstoned,
            no_issue_highlight,
        } => {
            let tree = doc_io::read_tree(&input)?;
            let options = navtree_dot::RenderOptions {
                show_widget_ids: show_ids,
                show_tombstoned: !hide_tombstoned,
                highlight_issues: !no_issue_highlight,
            };
            let dot = navtree_dot::render(&tree, &options);
            doc_io::write_output(dot.trim_end(), output.as_ref())
        }
    }
}
