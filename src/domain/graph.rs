use crate::domain::edge::ParentEdge;
use crate::domain::node::{LineageNode, NodeId};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Node as emitted for visualization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub node_type: String,
    pub full_info: Map<String, Value>,
}

impl From<&LineageNode> for GraphNode {
    fn from(node: &LineageNode) -> Self {
        Self {
            id: node.node_id.to_string(),
            label: node.label(),
            node_type: node.node_type.to_string(),
            full_info: node.full_record(),
        }
    }
}

/// Edge as emitted for visualization: `source` is the upstream node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub label: String,
}

impl GraphEdge {
    pub fn derived(parent: &ParentEdge, target: NodeId) -> Self {
        Self {
            source: parent.upstream_id.to_string(),
            target: target.to_string(),
            label: parent.label().to_string(),
        }
    }
}

/// Output of one upstream resolution. Owned by the call that built it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TraversalGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Set when a depth bound stopped expansion somewhere.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl TraversalGraph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Petgraph view of the result, e.g. for DOT rendering.
    ///
    /// Edge endpoints that were never emitted as nodes (dangling parents)
    /// get a placeholder node labelled with the bare id.
    pub fn to_digraph(&self) -> DiGraph<String, String> {
        let mut graph = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(self.nodes.len());

        for node in &self.nodes {
            let idx = graph.add_node(node.label.replace('\n', "."));
            index.insert(node.id.as_str(), idx);
        }

        for edge in &self.edges {
            let source = *index
                .entry(edge.source.as_str())
                .or_insert_with(|| graph.add_node(edge.source.clone()));
            let target = *index
                .entry(edge.target.as_str())
                .or_insert_with(|| graph.add_node(edge.target.clone()));
            graph.add_edge(source, target, edge.label.clone());
        }

        graph
    }
}

/// Accumulates the output of a traversal, enforcing node dedup.
#[derive(Debug, Default)]
pub struct GraphAssembler {
    emitted: HashSet<NodeId>,
    graph: TraversalGraph,
}

impl GraphAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `node` unless its id was already emitted. First attributes win.
    /// Returns `true` if the node was added.
    pub fn add_node_once(&mut self, node: &LineageNode) -> bool {
        if !self.emitted.insert(node.node_id) {
            return false;
        }
        self.graph.nodes.push(GraphNode::from(node));
        true
    }

    /// Edges are never deduplicated.
    pub fn push_edge(&mut self, parent: &ParentEdge, target: NodeId) {
        self.graph.edges.push(GraphEdge::derived(parent, target));
    }

    pub fn mark_truncated(&mut self) {
        self.graph.truncated = true;
    }

    pub fn finish(self) -> TraversalGraph {
        self.graph
    }
}
