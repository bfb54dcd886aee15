use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use navtree::v1::diff::DiffSummary;
use navtree_store::{FsProvider, ModelLayout, SessionContext, SessionOutcome, Workspace};
use serde::Serialize;
use std::path::PathBuf;

use crate::cmd_diff::format_summary;
use crate::doc_io;

/// Which product, and where its models live.
#[derive(Args, Debug)]
pub struct Target {
    /// Product under test
    #[arg(long)]
    pub product: String,

    /// Shared model folder (defaults to $NAVTREE_SHARED_DIR or ./data)
    #[arg(long)]
    pub shared_dir: Option<PathBuf>,

    /// Session snapshot folder (defaults to ./data)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl Target {
    fn layout(&self) -> ModelLayout {
        let mut layout = ModelLayout::new();
        if let Some(dir) = &self.shared_dir {
            layout = layout.with_shared_dir(dir);
        }
        if let Some(dir) = &self.data_dir {
            layout = layout.with_data_dir(dir);
        }
        layout
    }

    fn workspace(&self, pretty: bool) -> Workspace {
        Workspace::with_provider(self.layout(), FsProvider::new().with_pretty(pretty))
    }
}

pub struct SyncArgs {
    pub snapshot: PathBuf,
    pub session: PathBuf,
    pub tester: Option<String>,
    pub product_version: Option<String>,
    pub started_at: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct SyncReport {
    product: String,
    shared: PathBuf,
    session: PathBuf,
    #[serde(flatten)]
    summary: DiffSummary,
}

pub fn run_begin(target: Target, output: Option<PathBuf>, pretty: bool) -> Result<()> {
    let workspace = target.workspace(pretty);
    let session = workspace
        .begin_session(SessionContext::new(target.product.clone()))
        .with_context(|| format!("Failed to load shared model for {:?}", target.product))?;
    doc_io::write_tree(&session.working_copy(), output.as_ref(), pretty)
}

pub fn run_sync(target: Target, args: SyncArgs, pretty: bool) -> Result<()> {
    let outcome = sync(&target, args, pretty, Utc::now())?;
    eprintln!("{}", format_summary(&outcome.summary));

    let report = SyncReport {
        product: target.product,
        shared: outcome.shared_path,
        session: outcome.session_path,
        summary: outcome.summary,
    };
    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);
    Ok(())
}

fn sync(
    target: &Target,
    args: SyncArgs,
    pretty: bool,
    now: DateTime<Utc>,
) -> Result<SessionOutcome> {
    let workspace = target.workspace(pretty);

    let mut context = SessionContext::new(target.product.clone());
    if let Some(tester) = args.tester {
        context = context.with_tester(tester);
    }
    if let Some(version) = args.product_version {
        context = context.with_product_version(version);
    }

    let captured = doc_io::read_tree(&args.session)?;
    let started_at = args
        .started_at
        .as_deref()
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .with_context(|| format!("Invalid --started-at {:?}", s))
        })
        .transpose()?;

    let session = workspace
        .resume_session(context, &args.snapshot, started_at)
        .with_context(|| format!("Failed to load snapshot {:?}", args.snapshot))?;

    workspace
        .finish_session_at(session, captured, now)
        .with_context(|| format!("Failed to sync session for {:?}", target.product))
}
