use crate::domain::edge::{LineageEdge, ParentEdge, normalize_transform};
use crate::domain::error::{StoreError, StoreResult};
use crate::domain::node::{LineageNode, NodeId};
use crate::domain::ports::{
    FactBatch, IngestReceipt, LineageRepository, LineageSink, LineageStore, NodeCatalog,
    NodeSummary, StoreCounts,
};
use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Serialized form of a whole store: what `--snapshot` files contain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub nodes: Vec<LineageNode>,
    #[serde(default)]
    pub edges: Vec<LineageEdge>,
}

#[derive(Debug, Default)]
struct Tables {
    nodes: BTreeMap<NodeId, LineageNode>,
    edges: Vec<LineageEdge>,
}

impl Tables {
    fn next_id(&self) -> NodeId {
        self.nodes.keys().next_back().copied().unwrap_or(0) + 1
    }
}

/// In-process store. Edge order is insertion order.
#[derive(Debug, Default)]
pub struct MemoryLineageStore {
    tables: RwLock<Tables>,
    origin: Option<PathBuf>,
}

impl MemoryLineageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let nodes = snapshot
            .nodes
            .into_iter()
            .map(|n| (n.node_id, n))
            .collect();
        Self {
            tables: RwLock::new(Tables {
                nodes,
                edges: snapshot.edges,
            }),
            origin: None,
        }
    }

    pub fn load_json(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).context("Failed to parse snapshot JSON")?;
        let mut store = Self::from_snapshot(snapshot);
        store.origin = Some(path.to_path_buf());
        Ok(store)
    }

    pub fn insert_node(&self, node: LineageNode) -> StoreResult<()> {
        self.write()?.nodes.insert(node.node_id, node);
        Ok(())
    }

    pub fn insert_edge(
        &self,
        upstream: NodeId,
        downstream: NodeId,
        transform_type: Option<&str>,
    ) -> StoreResult<()> {
        self.write()?.edges.push(LineageEdge {
            upstream_node_id: upstream,
            downstream_node_id: downstream,
            transform_type: transform_type.map(String::from),
        });
        Ok(())
    }

    pub fn snapshot(&self) -> StoreResult<Snapshot> {
        let tables = self.read()?;
        Ok(Snapshot {
            nodes: tables.nodes.values().cloned().collect(),
            edges: tables.edges.clone(),
        })
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }
}

/// Case-insensitive substring match on table, column or procedure name.
/// `needle` is already lowercased.
fn matches_query(node: &LineageNode, needle: &str) -> bool {
    let hit = |field: &str| field.to_lowercase().contains(needle);
    hit(&node.table_name) || hit(&node.column_name) || node.proc_name.as_deref().is_some_and(hit)
}

impl LineageStore for MemoryLineageStore {
    fn fetch_node(&self, id: NodeId) -> StoreResult<Option<LineageNode>> {
        Ok(self.read()?.nodes.get(&id).cloned())
    }

    fn fetch_parent_edges(&self, id: NodeId) -> StoreResult<Vec<ParentEdge>> {
        Ok(self
            .read()?
            .edges
            .iter()
            .filter(|e| e.downstream_node_id == id)
            .map(|e| ParentEdge {
                upstream_id: e.upstream_node_id,
                transform_type: e.transform_type.clone(),
            })
            .collect())
    }
}

impl NodeCatalog for MemoryLineageStore {
    fn search_nodes(&self, query: &str, limit: usize) -> StoreResult<Vec<NodeSummary>> {
        let tables = self.read()?;
        let needle = query.to_lowercase();
        let items = tables
            .nodes
            .values()
            .rev()
            .filter(|n| matches_query(n, &needle))
            .take(limit)
            .map(|n| {
                let parents: Vec<&LineageEdge> = tables
                    .edges
                    .iter()
                    .filter(|e| e.downstream_node_id == n.node_id)
                    .collect();
                NodeSummary {
                    node_id: n.node_id,
                    proc_name: n.proc_name.clone(),
                    table_name: n.table_name.clone(),
                    column_name: n.column_name.clone(),
                    node_type: n.node_type.to_string(),
                    parent_ids: parents.iter().map(|e| e.upstream_node_id).collect(),
                    transform_types: parents
                        .iter()
                        .map(|e| normalize_transform(e.transform_type.as_deref()).to_string())
                        .collect(),
                }
            })
            .collect();
        Ok(items)
    }

    fn count_matches(&self, query: &str) -> StoreResult<usize> {
        let tables = self.read()?;
        let needle = query.to_lowercase();
        Ok(tables.nodes.values().filter(|n| matches_query(n, &needle)).count())
    }

    fn counts(&self) -> StoreResult<StoreCounts> {
        let tables = self.read()?;
        Ok(StoreCounts {
            node_count: tables.nodes.len(),
            edge_count: tables.edges.len(),
        })
    }
}

impl LineageSink for MemoryLineageStore {
    fn append_facts(&self, batch: &FactBatch) -> StoreResult<IngestReceipt> {
        batch.validate()?;
        let mut tables = self.write()?;

        // Stage everything first so a bad reference leaves the tables untouched.
        let mut next_id = tables.next_id();
        let mut keys = HashMap::new();
        let mut staged_nodes = Vec::with_capacity(batch.nodes.len());
        for new_node in &batch.nodes {
            let id = next_id;
            next_id += 1;
            if let Some(key) = &new_node.key {
                keys.insert(key.clone(), id);
            }
            staged_nodes.push(new_node.clone().into_node(id));
        }

        let staged_ids: HashSet<NodeId> = staged_nodes.iter().map(|n| n.node_id).collect();
        let mut staged_edges = Vec::with_capacity(batch.edges.len());
        for edge in &batch.edges {
            let exists = |id: NodeId| -> StoreResult<bool> {
                Ok(tables.nodes.contains_key(&id) || staged_ids.contains(&id))
            };
            staged_edges.push(LineageEdge {
                upstream_node_id: edge.upstream.resolve(&keys)?,
                downstream_node_id: edge.downstream.resolve_existing(&keys, exists)?,
                transform_type: edge.transform_type.clone(),
            });
        }

        let node_ids = staged_nodes.iter().map(|n| n.node_id).collect();
        for node in staged_nodes {
            tables.nodes.insert(node.node_id, node);
        }
        let edges_count = staged_edges.len();
        tables.edges.extend(staged_edges);

        Ok(IngestReceipt {
            node_ids,
            edges_count,
        })
    }
}

impl LineageRepository for MemoryLineageStore {
    fn describe(&self) -> String {
        match &self.origin {
            Some(path) => format!("memory (snapshot {})", path.display()),
            None => "memory".to_string(),
        }
    }
}
