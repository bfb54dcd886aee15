mod cmd_diff;
mod cmd_merge;
mod cmd_products;
mod cmd_query;
mod cmd_render;
mod cmd_session;
mod cmd_validate;
mod doc_io;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "navtree")]
#[command(about = "Diff, merge, query, and visualize shared navigation state models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Log merge decisions and file operations to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that a model document decodes and report its size
    Validate {
        /// Input file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Annotate a session tree with what changed since its snapshot
    Diff {
        /// Snapshot taken at session start; omit to treat every widget as new
        #[arg(long)]
        before: Option<PathBuf>,

        /// Tree as it was at session end (use - for stdin)
        #[arg(long)]
        after: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Merge an annotated session document into a shared document
    Merge {
        /// Annotated session document (use - for stdin)
        #[arg(long)]
        session: PathBuf,

        /// Shared document; omit to start from the session alone
        #[arg(long)]
        shared: Option<PathBuf>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load a product's shared model and write a session-start snapshot
    Begin {
        #[command(flatten)]
        target: cmd_session::Target,

        /// Where to write the snapshot (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Finish a session: diff, merge into the shared model, and save both
    Sync {
        #[command(flatten)]
        target: cmd_session::Target,

        /// Snapshot written when the session began
        #[arg(long)]
        snapshot: PathBuf,

        /// Tree as it was at session end (use - for stdin)
        #[arg(long)]
        session: PathBuf,

        /// Tester who ran the session
        #[arg(long)]
        tester: Option<String>,

        /// Version of the product under test
        #[arg(long)]
        product_version: Option<String>,

        /// When the session began (RFC 3339); defaults to the snapshot's
        /// last update time
        #[arg(long)]
        started_at: Option<String>,
    },
    /// Look things up in a model document
    Query {
        #[command(subcommand)]
        op: cmd_query::QueryOp,
    },
    /// Render a model document to other formats
    Render {
        #[command(subcommand)]
        format: cmd_render::RenderFormat,
    },
    /// List products that have a shared model folder
    Products {
        /// Shared model folder (defaults to $NAVTREE_SHARED_DIR or ./data)
        #[arg(long)]
        shared_dir: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate { input } => cmd_validate::run(input),
        Commands::Diff {
            before,
            after,
            output,
        } => cmd_diff::run(before, after, output, cli.pretty),
        Commands::Merge {
            session,
            shared,
            output,
        } => cmd_merge::run(session, shared, output, cli.pretty),
        Commands::Begin { target, output } => cmd_session::run_begin(target, output, cli.pretty),
        Commands::Sync {
            target,
            snapshot,
            session,
            tester,
            product_version,
            started_at,
        } => cmd_session::run_sync(
            target,
            cmd_session::SyncArgs {
                snapshot,
                session,
                tester,
                product_version,
                started_at,
            },
            cli.pretty,
        ),
        Commands::Query { op } => cmd_query::run(op, cli.pretty),
        Commands::Render { format } => cmd_render::run(format),
        Commands::Products { shared_dir } => cmd_products::run(shared_dir),
    }
}
