use crate::context::SessionContext;
use crate::error::{Result, StoreError};
use crate::layout::ModelLayout;
use crate::provider::{FsProvider, ModelProvider};
use chrono::{DateTime, Utc};
use navtree::v1::diff::{self, DiffSummary};
use navtree::v1::{DiffType, PathSummary, State, StateTree, merge, query};
use std::path::{Path, PathBuf};

/// Shared models of all products under one [`ModelLayout`].
#[derive(Debug, Clone)]
pub struct Workspace<P = FsProvider> {
    layout: ModelLayout,
    provider: P,
}

impl Workspace<FsProvider> {
    pub fn new(layout: ModelLayout) -> Self {
        Self::with_provider(layout, FsProvider::new())
    }
}

impl<P: ModelProvider> Workspace<P> {
    pub fn with_provider(layout: ModelLayout, provider: P) -> Self {
        Self { layout, provider }
    }

    pub fn layout(&self) -> &ModelLayout {
        &self.layout
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The product's current shared model, if one was saved.
    pub fn load_shared(&self, product: &str) -> Result<Option<StateTree>> {
        self.provider.load(&self.layout.shared_model_file(product)?)
    }

    pub fn begin_session(&self, context: SessionContext) -> Result<Session> {
        self.begin_session_at(context, Utc::now())
    }

    /// Load the product's shared model and snapshot it.
    ///
    /// Without a shared model a fresh home-only tree is created and saved
    /// first, so the product shows up in [`ModelLayout::list_products`].
    pub fn begin_session_at(&self, context: SessionContext, now: DateTime<Utc>) -> Result<Session> {
        let path = self.layout.shared_model_file(&context.product)?;
        let tree = match self.provider.load(&path)? {
            Some(tree) => tree,
            None => {
                tracing::info!(product = %context.product, "starting a new shared model");
                let mut tree = StateTree::home().with_product(context.product.clone());
                tree.last_updated_at = Some(now);
                self.provider.save(&path, &tree)?;
                tree
            }
        };
        Ok(Session::new(context, now, tree))
    }

    /// Rebuild a session from a snapshot document saved at session start.
    ///
    /// Without an explicit start time the snapshot's last update time is
    /// used, falling back to now.
    pub fn resume_session(
        &self,
        context: SessionContext,
        snapshot: &Path,
        started_at: Option<DateTime<Utc>>,
    ) -> Result<Session> {
        let tree = self
            .provider
            .load(snapshot)?
            .ok_or_else(|| StoreError::NoSession(snapshot.to_path_buf()))?;
        let started_at = started_at
            .or(tree.last_updated_at)
            .unwrap_or_else(Utc::now);
        Ok(Session::new(context, started_at, tree))
    }

    pub fn finish_session(&self, session: Session, captured: StateTree) -> Result<SessionOutcome> {
        self.finish_session_at(session, captured, Utc::now())
    }

    /// Diff the captured tree against the session snapshot, merge it into
    /// the shared model as it is on disk now, and save both.
    ///
    /// The shared model is reloaded rather than taken from the session so
    /// that sessions finishing in between are not lost. It is written only
    /// after the merge succeeded. The annotated session tree is kept as a
    /// session snapshot file.
    pub fn finish_session_at(
        &self,
        session: Session,
        mut captured: StateTree,
        now: DateTime<Utc>,
    ) -> Result<SessionOutcome> {
        let Session {
            context,
            started_at,
            snapshot,
            ..
        } = session;
        let product = context.product.as_str();
        let shared_path = self.layout.shared_model_file(product)?;
        let session_path = self.layout.session_file(product, now)?;

        diff::annotate_diff(Some(&snapshot), Some(&mut captured.root));
        let summary = diff::summarize(&captured.root);
        tracing::debug!(
            product,
            created = summary.created,
            deleted = summary.deleted,
            unchanged = summary.unchanged,
            "annotated session tree"
        );

        let current = self.provider.load(&shared_path)?;
        if current.is_none() {
            tracing::warn!(product, "shared model vanished during the session; rebuilding it");
        }
        let root = merge::merge_at(
            current.as_ref().map(|tree| &tree.root),
            Some(&captured.root),
            now,
        )?;

        let mut merged = current.unwrap_or_else(StateTree::home);
        merged.root = root;
        merged.product = Some(context.product.clone());
        merged.last_updated_at = Some(now);
        merged.absorb_counterparts(&captured.counterparts);
        if let Some(version) = &context.product_version
            && !merged.root.product_versions.contains(version)
        {
            merged.root.product_versions.push(version.clone());
        }
        merged.absorb_paths(&captured.paths);
        merged.absorb_paths(&[path_summary(&context, &session_path, &captured.root, started_at, now)]);

        self.provider.save(&shared_path, &merged)?;

        captured.product = Some(context.product.clone());
        captured.last_updated_at = Some(now);
        self.provider.save(&session_path, &captured)?;

        tracing::info!(
            product,
            tester = context.tester.as_deref().unwrap_or("unknown"),
            created = summary.created,
            deleted = summary.deleted,
            "session merged into shared model"
        );

        Ok(SessionOutcome {
            merged,
            summary,
            shared_path,
            session_path,
        })
    }
}

/// The record of one finished session added to the shared model's paths:
/// who explored, when, for how long, and the widgets the session added.
fn path_summary(
    context: &SessionContext,
    session_path: &Path,
    annotated: &State,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
) -> PathSummary {
    let id = session_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("session")
        .to_string();
    let widgets = query::all_widgets(annotated)
        .into_iter()
        .filter(|widget| {
            query::find_owner(annotated, &widget.id)
                .and_then(State::diff)
                .and_then(|diff| diff.get(&widget.id))
                == Some(DiffType::Created)
        })
        .map(|widget| widget.id.clone())
        .collect();

    PathSummary {
        id: id.clone(),
        product_version: context.product_version.clone(),
        session_id: Some(id),
        session_duration: Some((finished_at - started_at).num_milliseconds().max(0)),
        created_at_ms: Some(started_at.timestamp_millis()),
        tester: context.tester.clone(),
        widgets,
        extra: Default::default(),
    }
}

/// An exploration session in progress.
#[derive(Debug, Clone)]
pub struct Session {
    context: SessionContext,
    started_at: DateTime<Utc>,
    loaded: StateTree,
    snapshot: State,
}

impl Session {
    fn new(context: SessionContext, started_at: DateTime<Utc>, loaded: StateTree) -> Self {
        let snapshot = loaded.root.deep_copy();
        Self {
            context,
            started_at,
            loaded,
            snapshot,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The shared model as loaded at session start.
    pub fn loaded(&self) -> &StateTree {
        &self.loaded
    }

    /// The private snapshot the captured tree is diffed against.
    pub fn snapshot(&self) -> &State {
        &self.snapshot
    }

    /// A fresh copy of the loaded model for the session to grow.
    pub fn working_copy(&self) -> StateTree {
        self.loaded.clone()
    }
}

/// What finishing a session produced.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub merged: StateTree,
    pub summary: DiffSummary,
    pub shared_path: PathBuf,
    pub session_path: PathBuf,
}
