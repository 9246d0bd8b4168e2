//! Mock store implementations for integration tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use lineage_trace::domain::edge::ParentEdge;
use lineage_trace::domain::error::{StoreError, StoreResult};
use lineage_trace::domain::node::{LineageNode, NodeId};
use lineage_trace::domain::ports::{
    FactBatch, IngestReceipt, LineageRepository, LineageSink, LineageStore, NodeCatalog,
    NodeSummary, StoreCounts,
};

/// Store whose backend is down: every call fails with `Unavailable`.
pub struct UnavailableStore;

impl LineageStore for UnavailableStore {
    fn fetch_node(&self, _id: NodeId) -> StoreResult<Option<LineageNode>> {
        Err(StoreError::unavailable("connection refused"))
    }

    fn fetch_parent_edges(&self, _id: NodeId) -> StoreResult<Vec<ParentEdge>> {
        Err(StoreError::unavailable("connection refused"))
    }
}

impl NodeCatalog for UnavailableStore {
    fn search_nodes(&self, _query: &str, _limit: usize) -> StoreResult<Vec<NodeSummary>> {
        Err(StoreError::unavailable("connection refused"))
    }

    fn count_matches(&self, _query: &str) -> StoreResult<usize> {
        Err(StoreError::unavailable("connection refused"))
    }

    fn counts(&self) -> StoreResult<StoreCounts> {
        Err(StoreError::unavailable("connection refused"))
    }
}

impl LineageSink for UnavailableStore {
    fn append_facts(&self, _batch: &FactBatch) -> StoreResult<IngestReceipt> {
        Err(StoreError::unavailable("connection refused"))
    }
}

impl LineageRepository for UnavailableStore {
    fn describe(&self) -> String {
        "unavailable".into()
    }
}

/// Wraps a store and records every call in order.
pub struct RecordingStore<S> {
    pub inner: S,
    pub calls: Mutex<Vec<String>>,
}

impl<S> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }
}

impl<S: LineageStore> LineageStore for RecordingStore<S> {
    fn fetch_node(&self, id: NodeId) -> StoreResult<Option<LineageNode>> {
        self.calls.lock().unwrap().push(format!("node:{id}"));
        self.inner.fetch_node(id)
    }

    fn fetch_parent_edges(&self, id: NodeId) -> StoreResult<Vec<ParentEdge>> {
        self.calls.lock().unwrap().push(format!("parents:{id}"));
        self.inner.fetch_parent_edges(id)
    }
}

/// Delegating store whose `fetch_node` blocks for `delay` first.
pub struct SlowStore<S> {
    pub inner: S,
    pub delay: Duration,
}

impl<S: LineageStore> LineageStore for SlowStore<S> {
    fn fetch_node(&self, id: NodeId) -> StoreResult<Option<LineageNode>> {
        std::thread::sleep(self.delay);
        self.inner.fetch_node(id)
    }

    fn fetch_parent_edges(&self, id: NodeId) -> StoreResult<Vec<ParentEdge>> {
        self.inner.fetch_parent_edges(id)
    }
}

impl<S: NodeCatalog> NodeCatalog for SlowStore<S> {
    fn search_nodes(&self, query: &str, limit: usize) -> StoreResult<Vec<NodeSummary>> {
        self.inner.search_nodes(query, limit)
    }

    fn count_matches(&self, query: &str) -> StoreResult<usize> {
        self.inner.count_matches(query)
    }

    fn counts(&self) -> StoreResult<StoreCounts> {
        self.inner.counts()
    }
}

impl<S: LineageSink> LineageSink for SlowStore<S> {
    fn append_facts(&self, batch: &FactBatch) -> StoreResult<IngestReceipt> {
        self.inner.append_facts(batch)
    }
}

impl<S: LineageRepository> LineageRepository for SlowStore<S> {
    fn describe(&self) -> String {
        format!("slow {}", self.inner.describe())
    }
}
