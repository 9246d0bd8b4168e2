use crate::domain::node::NodeId;
use crate::domain::ports::{FactBatch, NodeSummary};
use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use crate::domain::graph::{GraphEdge, GraphNode, TraversalGraph as LineageResponse};

/// Default and ceiling for search result size.
pub const DEFAULT_SEARCH_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LineageRequest {
    /// Node to start the upstream walk from (positive integer).
    pub node_id: NodeId,
    /// Override the configured depth bound for this call.
    #[serde(default)]
    pub max_depth: Option<usize>,
}

impl LineageRequest {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchRequest {
    /// Substring matched against table, column and procedure names.
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchResponse {
    pub items: Vec<NodeSummary>,
    /// Matching nodes in the store; can exceed `items.len()` when the limit cut the list.
    pub total_matches: usize,
}

pub type IngestRequest = FactBatch;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IngestResponse {
    pub status: String,
    pub node_ids: Vec<NodeId>,
    pub nodes_count: usize,
    pub edges_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthResponse {
    pub store: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub max_depth: Option<usize>,
}
