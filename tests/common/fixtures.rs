//! Store fixtures shared by integration tests.
#![allow(dead_code)]

use lineage_trace::adapters::memory::MemoryLineageStore;
use lineage_trace::adapters::sqlite::SqliteLineageStore;
use lineage_trace::domain::node::{LineageNode, NodeId};
use lineage_trace::domain::ports::{FactBatch, LineageSink, NewEdge, NewNode, NodeRef};
use serde_json::Map;

/// (upstream, downstream, transform)
pub type EdgeSpec = (NodeId, NodeId, Option<&'static str>);

/// Memory store with nodes `ids` (table "T", column "c<id>") and the given edges.
pub fn memory_store(ids: &[NodeId], edges: &[EdgeSpec]) -> MemoryLineageStore {
    let store = MemoryLineageStore::new();
    for &id in ids {
        store
            .insert_node(LineageNode::new(id, "T", format!("c{id}"), "TRANSFORM"))
            .unwrap();
    }
    for &(up, down, transform) in edges {
        store.insert_edge(up, down, transform).unwrap();
    }
    store
}

/// Same shape as [`memory_store`] on SQLite. Ids are store-assigned, so the
/// nodes are `1..=node_count`.
pub fn sqlite_store(node_count: usize, edges: &[EdgeSpec]) -> SqliteLineageStore {
    let store = SqliteLineageStore::open_in_memory().unwrap();
    let nodes = (1..=node_count)
        .map(|i| NewNode {
            key: None,
            proc_name: Some("sp_fixture".into()),
            table_name: "T".into(),
            column_name: format!("c{i}"),
            node_type: "TRANSFORM".into(),
            attributes: Map::new(),
        })
        .collect();
    let edges = edges
        .iter()
        .map(|&(up, down, transform)| NewEdge {
            upstream: NodeRef::Id(up),
            downstream: NodeRef::Id(down),
            transform_type: transform.map(String::from),
        })
        .collect();
    let receipt = store.append_facts(&FactBatch { nodes, edges }).unwrap();
    assert_eq!(receipt.node_ids.len(), node_count);
    store
}
