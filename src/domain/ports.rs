use crate::domain::edge::ParentEdge;
use crate::domain::error::{StoreError, StoreResult};
use crate::domain::node::{LineageNode, NodeId, NodeType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Read side of the graph store (implemented by Infrastructure).
///
/// Each call is an independent round-trip; adapters do not cache.
pub trait LineageStore: Send + Sync {
    /// Look up one node. `Ok(None)` means the id does not exist.
    fn fetch_node(&self, id: NodeId) -> StoreResult<Option<LineageNode>>;

    /// All edges whose downstream endpoint is `id`, in stable store order.
    fn fetch_parent_edges(&self, id: NodeId) -> StoreResult<Vec<ParentEdge>>;
}

/// Filtered listing over stored nodes
pub trait NodeCatalog: Send + Sync {
    /// Case-insensitive substring match on table, column or procedure name.
    /// Newest nodes first. An empty query matches everything.
    fn search_nodes(&self, query: &str, limit: usize) -> StoreResult<Vec<NodeSummary>>;

    /// Number of nodes `search_nodes` would match with no limit.
    fn count_matches(&self, query: &str) -> StoreResult<usize>;

    fn counts(&self) -> StoreResult<StoreCounts>;
}

/// Write side: producers append lineage facts here.
pub trait LineageSink: Send + Sync {
    /// Insert a batch of nodes and edges atomically. Either every fact lands or none does.
    fn append_facts(&self, batch: &FactBatch) -> StoreResult<IngestReceipt>;
}

/// Everything the application layer needs from a store.
pub trait LineageRepository: LineageStore + NodeCatalog + LineageSink {
    /// Human-readable location of the backing store, for health output.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NodeSummary {
    pub node_id: NodeId,
    pub proc_name: Option<String>,
    pub table_name: String,
    pub column_name: String,
    pub node_type: String,
    /// Upstream node ids, in edge order.
    pub parent_ids: Vec<NodeId>,
    /// Transform labels of the parent edges, in edge order.
    pub transform_types: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StoreCounts {
    pub node_count: usize,
    pub edge_count: usize,
}

/// A node to be created; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NewNode {
    /// Batch-local handle that edges in the same batch can reference.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub proc_name: Option<String>,
    pub table_name: String,
    pub column_name: String,
    pub node_type: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl NewNode {
    pub fn into_node(self, node_id: NodeId) -> LineageNode {
        LineageNode {
            node_id,
            proc_name: self.proc_name,
            table_name: self.table_name,
            column_name: self.column_name,
            node_type: NodeType::from(self.node_type),
            attributes: self.attributes,
        }
    }
}

/// Edge endpoint: an existing node id, or the `key` of a node in the same batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum NodeRef {
    Id(NodeId),
    Key(String),
}

impl NodeRef {
    /// Resolve against the keys assigned so far in the current batch.
    pub fn resolve(&self, keys: &HashMap<String, NodeId>) -> StoreResult<NodeId> {
        match self {
            NodeRef::Id(id) if *id > 0 => Ok(*id),
            NodeRef::Id(id) => Err(StoreError::InvalidFact(format!(
                "node id must be positive, got {id}"
            ))),
            NodeRef::Key(key) => keys
                .get(key)
                .copied()
                .ok_or_else(|| StoreError::InvalidFact(format!("unknown node key '{key}'"))),
        }
    }

    /// Like [`NodeRef::resolve`], but an `Id` must also name a node the store
    /// already holds, as checked by `exists`.
    pub fn resolve_existing(
        &self,
        keys: &HashMap<String, NodeId>,
        exists: impl FnOnce(NodeId) -> StoreResult<bool>,
    ) -> StoreResult<NodeId> {
        let id = self.resolve(keys)?;
        if matches!(self, NodeRef::Id(_)) && !exists(id)? {
            return Err(StoreError::InvalidFact(format!("unknown node id {id}")));
        }
        Ok(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NewEdge {
    pub upstream: NodeRef,
    pub downstream: NodeRef,
    #[serde(default)]
    pub transform_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FactBatch {
    #[serde(default)]
    pub nodes: Vec<NewNode>,
    #[serde(default)]
    pub edges: Vec<NewEdge>,
}

impl FactBatch {
    /// Checks that need no store access: required names present, batch keys unique.
    pub fn validate(&self) -> StoreResult<()> {
        let mut seen = std::collections::HashSet::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if node.table_name.is_empty() || node.column_name.is_empty() {
                return Err(StoreError::InvalidFact(format!(
                    "node #{i} needs both table_name and column_name"
                )));
            }
            if node.node_type.is_empty() {
                return Err(StoreError::InvalidFact(format!("node #{i} has no node_type")));
            }
            if let Some(key) = &node.key
                && !seen.insert(key.as_str())
            {
                return Err(StoreError::InvalidFact(format!("duplicate node key '{key}'")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct IngestReceipt {
    /// Ids assigned to `FactBatch::nodes`, in batch order.
    pub node_ids: Vec<NodeId>,
    pub edges_count: usize,
}
