use crate::domain::node::NodeId;
use serde::{Deserialize, Serialize};

/// Label emitted for an edge that has no recorded transformation (direct copy).
pub const DIRECT_LABEL: &str = "Direct";

/// A "derived-from" edge as returned by the store: `upstream_id → <queried node>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentEdge {
    pub upstream_id: NodeId,
    pub transform_type: Option<String>,
}

impl ParentEdge {
    pub fn new(upstream_id: NodeId, transform_type: Option<&str>) -> Self {
        Self {
            upstream_id,
            transform_type: transform_type.map(String::from),
        }
    }

    /// Transform label with absent/empty values normalized to [`DIRECT_LABEL`].
    pub fn label(&self) -> &str {
        normalize_transform(self.transform_type.as_deref())
    }
}

/// A stored edge, both endpoints explicit. Used by the in-memory store and ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub upstream_node_id: NodeId,
    pub downstream_node_id: NodeId,
    #[serde(default)]
    pub transform_type: Option<String>,
}

pub fn normalize_transform(transform_type: Option<&str>) -> &str {
    match transform_type {
        Some(t) if !t.is_empty() => t,
        _ => DIRECT_LABEL,
    }
}
