use crate::app::dto::{IngestRequest, LineageRequest, SearchRequest};
use crate::app::engine::LineageEngine;
use crate::domain::node::NodeId;
use anyhow::{Context as _, Result};
use petgraph::dot::Dot;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TraceFormat {
    /// `{nodes, edges}` as served over HTTP
    Json,
    /// Graphviz DOT
    Dot,
    /// Human-readable listing
    Text,
}

/// Resolve upstream lineage for `node_id` and print it in `format`.
pub fn trace_lineage(
    engine: &LineageEngine,
    node_id: NodeId,
    max_depth: Option<usize>,
    format: TraceFormat,
) -> Result<()> {
    let graph = engine.resolve(LineageRequest { node_id, max_depth })?;

    match format {
        TraceFormat::Json => println!("{}", serde_json::to_string_pretty(&graph)?),
        TraceFormat::Dot => println!("{}", Dot::new(&graph.to_digraph())),
        TraceFormat::Text => {
            println!("Upstream lineage of node {}:", node_id);
            println!("{}", "=".repeat(60));
            if graph.nodes.is_empty() {
                println!("  (node not found)");
                return Ok(());
            }
            println!("\nNodes ({}):", graph.nodes.len());
            for node in &graph.nodes {
                println!(
                    "  [{}] {:>6}  {}",
                    node.node_type,
                    node.id,
                    node.label.replace('\n', ".")
                );
            }
            println!("\nEdges ({}):", graph.edges.len());
            for edge in &graph.edges {
                println!("  {} -> {}  ({})", edge.source, edge.target, edge.label);
            }
            if graph.truncated {
                println!("\n  depth bound reached; some ancestors were not expanded");
            }
        }
    }
    Ok(())
}

pub fn search_nodes(engine: &LineageEngine, query: &str, limit: Option<usize>) -> Result<()> {
    println!("Searching lineage nodes matching: \"{}\"", query);
    println!("{}", "=".repeat(80));
    let result = engine.search(SearchRequest {
        q: query.to_string(),
        limit,
    })?;

    if result.items.len() < result.total_matches {
        println!(
            "Found {} node(s), showing the newest {}:\n",
            result.total_matches,
            result.items.len()
        );
    } else {
        println!("Found {} node(s):\n", result.total_matches);
    }
    for item in &result.items {
        println!(
            "{:>6}  [{}] {}.{}  proc={}",
            item.node_id,
            item.node_type,
            item.table_name,
            item.column_name,
            item.proc_name.as_deref().unwrap_or("-")
        );
        if !item.parent_ids.is_empty() {
            let parents: Vec<String> = item
                .parent_ids
                .iter()
                .zip(&item.transform_types)
                .map(|(id, t)| format!("{id} ({t})"))
                .collect();
            println!("        <- {}", parents.join(", "));
        }
    }
    Ok(())
}

/// Load a JSON fact batch (`{nodes, edges}`) and append it to the store.
pub fn ingest_file(engine: &LineageEngine, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read facts file: {}", path.display()))?;
    let batch: IngestRequest =
        serde_json::from_str(&content).context("Failed to parse facts JSON")?;

    let result = engine.ingest(batch)?;
    println!(
        "Ingested {} node(s) and {} edge(s)",
        result.nodes_count, result.edges_count
    );
    if !result.node_ids.is_empty() {
        let ids: Vec<String> = result.node_ids.iter().map(|id| id.to_string()).collect();
        println!("  New node ids: {}", ids.join(", "));
    }
    Ok(())
}

pub fn print_health(engine: &LineageEngine) -> Result<()> {
    let health = engine.health()?;
    println!("Store:      {}", health.store);
    println!("Nodes:      {}", health.node_count);
    println!("Edges:      {}", health.edge_count);
    match health.max_depth {
        Some(depth) => println!("Max depth:  {}", depth),
        None => println!("Max depth:  unbounded"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteLineageStore;
    use crate::config::ResolverSettings;
    use std::sync::Arc;

    fn engine() -> LineageEngine {
        let store = SqliteLineageStore::open_in_memory().unwrap();
        LineageEngine::new(Arc::new(store), ResolverSettings::default())
    }

    #[test]
    fn test_ingest_file_and_trace() {
        let engine = engine();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.json");
        std::fs::write(
            &path,
            r#"{
                "nodes": [
                    {"key": "a", "table_name": "src", "column_name": "a", "node_type": "SOURCE"},
                    {"key": "b", "table_name": "tgt", "column_name": "b", "node_type": "TARGET"}
                ],
                "edges": [{"upstream": "a", "downstream": "b", "transform_type": "CAST"}]
            }"#,
        )
        .unwrap();

        ingest_file(&engine, &path).unwrap();
        assert_eq!(engine.health().unwrap().edge_count, 1);

        for format in [TraceFormat::Json, TraceFormat::Dot, TraceFormat::Text] {
            trace_lineage(&engine, 2, None, format).unwrap();
        }
        search_nodes(&engine, "src", None).unwrap();
        print_health(&engine).unwrap();
    }

    #[test]
    fn test_ingest_file_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(ingest_file(&engine(), &path).is_err());
        assert!(ingest_file(&engine(), &dir.path().join("missing.json")).is_err());
    }
}
