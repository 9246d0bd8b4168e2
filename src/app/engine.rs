use crate::adapters::memory::MemoryLineageStore;
use crate::adapters::sqlite::SqliteLineageStore;
use crate::app::dto::*;
use crate::config::{ResolverSettings, StoreSettings};
use crate::domain::error::StoreError;
use crate::domain::ports::LineageRepository;
use crate::domain::resolver::LineageResolver;
use anyhow::Context as _;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The caller sent something unusable. Maps to a 4xx.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, EngineError::Store(e) if e.is_unavailable())
    }
}

/// Application service shared by the HTTP, MCP and CLI front ends.
///
/// Cheap to clone. Holds no per-request state: every `resolve` builds a
/// fresh resolver against the shared store.
#[derive(Clone)]
pub struct LineageEngine {
    store: Arc<dyn LineageRepository>,
    settings: ResolverSettings,
}

impl LineageEngine {
    pub fn new(store: Arc<dyn LineageRepository>, settings: ResolverSettings) -> Self {
        Self { store, settings }
    }

    /// Open the SQLite store described by `settings`.
    pub fn open_sqlite(store: &StoreSettings, resolver: ResolverSettings) -> anyhow::Result<Self> {
        let sqlite = if store.is_in_memory() {
            SqliteLineageStore::open_in_memory()
        } else {
            SqliteLineageStore::open(&store.path)
        }
        .with_context(|| format!("Failed to open lineage store {}", store.path.display()))?;
        info!(store = %sqlite.describe(), "lineage store ready");
        Ok(Self::new(Arc::new(sqlite), resolver))
    }

    /// Serve from a JSON snapshot held in memory. Ingested facts are not persisted.
    pub fn load_snapshot(path: &Path, resolver: ResolverSettings) -> anyhow::Result<Self> {
        let store = MemoryLineageStore::load_json(path)?;
        info!(store = %store.describe(), "lineage snapshot loaded");
        Ok(Self::new(Arc::new(store), resolver))
    }

    pub fn settings(&self) -> ResolverSettings {
        self.settings
    }

    pub fn resolve(&self, req: LineageRequest) -> EngineResult<LineageResponse> {
        if req.node_id <= 0 {
            return Err(EngineError::InvalidRequest(format!(
                "node id must be a positive integer, got {}",
                req.node_id
            )));
        }
        let max_depth = req.max_depth.or(self.settings.max_depth);
        LineageResolver::new(self.store.as_ref())
            .with_max_depth(max_depth)
            .resolve_upstream(req.node_id)
            .inspect_err(|e| warn!(root = req.node_id, error = %e, "lineage resolution failed"))
            .map_err(EngineError::from)
    }

    pub fn search(&self, req: SearchRequest) -> EngineResult<SearchResponse> {
        let limit = req
            .limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .min(DEFAULT_SEARCH_LIMIT);
        let query = req.q.trim();
        let items = self.store.search_nodes(query, limit)?;
        Ok(SearchResponse {
            total_matches: self.store.count_matches(query)?,
            items,
        })
    }

    pub fn ingest(&self, req: IngestRequest) -> EngineResult<IngestResponse> {
        if req.nodes.is_empty() && req.edges.is_empty() {
            return Err(EngineError::InvalidRequest(
                "batch contains no nodes and no edges".into(),
            ));
        }
        let receipt = self.store.append_facts(&req)?;
        info!(
            nodes = receipt.node_ids.len(),
            edges = receipt.edges_count,
            "lineage facts ingested"
        );
        Ok(IngestResponse {
            status: "success".into(),
            nodes_count: receipt.node_ids.len(),
            node_ids: receipt.node_ids,
            edges_count: receipt.edges_count,
        })
    }

    pub fn health(&self) -> EngineResult<HealthResponse> {
        let counts = self.store.counts()?;
        Ok(HealthResponse {
            store: self.store.describe(),
            node_count: counts.node_count,
            edge_count: counts.edge_count,
            max_depth: self.settings.max_depth,
        })
    }
}
