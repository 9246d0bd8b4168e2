use crate::adapters::sqlite::schema::{self, ATTRIBUTES_COLUMN};
use crate::domain::edge::{ParentEdge, normalize_transform};
use crate::domain::error::{StoreError, StoreResult};
use crate::domain::node::{CORE_FIELDS, LineageNode, NodeId};
use crate::domain::ports::{
    FactBatch, IngestReceipt, LineageRepository, LineageSink, LineageStore, NodeCatalog,
    NodeSummary, StoreCounts,
};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, _) = &err
            && code.code == ErrorCode::ConstraintViolation
        {
            return StoreError::InvalidFact(err.to_string());
        }
        StoreError::Unavailable {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// SQLite lineage store.
///
/// One connection behind a mutex: concurrent callers are serialized per
/// statement, and each fetch is its own query.
pub struct SqliteLineageStore {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl SqliteLineageStore {
    /// Open or create the database at `path` and bootstrap the schema.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Unavailable {
                message: format!("cannot create {}: {e}", parent.display()),
                source: Some(Box::new(e)),
            })?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database (tests, demos).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, location: Option<PathBuf>) -> StoreResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::unavailable("sqlite connection lock poisoned"))
    }
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::from(b.to_vec()),
    }
}

/// Map a `SELECT *` row to a node. Every non-core column lands in `attributes`;
/// the JSON `attributes` column is unpacked into it without overriding real columns.
fn row_to_node(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<LineageNode> {
    let text = |name: &str| -> rusqlite::Result<String> {
        Ok(row.get::<_, Option<String>>(name)?.unwrap_or_default())
    };
    let mut node = LineageNode::new(
        row.get::<_, NodeId>("node_id")?,
        text("table_name")?,
        text("column_name")?,
        text("node_type")?,
    );
    node.proc_name = row.get("proc_name")?;

    let mut packed = None;
    for (i, name) in columns.iter().enumerate() {
        if CORE_FIELDS.contains(&name.as_str()) {
            continue;
        }
        let value = json_value(row.get_ref(i)?);
        if name == ATTRIBUTES_COLUMN
            && let Value::String(raw) = &value
            && let Ok(Value::Object(extra)) = serde_json::from_str::<Value>(raw)
        {
            packed = Some(extra);
            continue;
        }
        node.attributes.insert(name.clone(), value);
    }
    for (key, value) in packed.into_iter().flatten() {
        node.attributes.entry(key).or_insert(value);
    }
    Ok(node)
}

/// `%query%` with LIKE wildcards in the query itself escaped.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl LineageStore for SqliteLineageStore {
    fn fetch_node(&self, id: NodeId) -> StoreResult<Option<LineageNode>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT * FROM lineage_nodes WHERE node_id = ?1")?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let node = stmt
            .query_row(params![id], |row| row_to_node(row, &columns))
            .optional()?;
        Ok(node)
    }

    fn fetch_parent_edges(&self, id: NodeId) -> StoreResult<Vec<ParentEdge>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT upstream_node_id, transform_type
             FROM lineage_edges
             WHERE downstream_node_id = ?1
             ORDER BY edge_id",
        )?;
        let edges = stmt
            .query_map(params![id], |row| {
                Ok(ParentEdge {
                    upstream_id: row.get(0)?,
                    transform_type: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }
}

impl NodeCatalog for SqliteLineageStore {
    fn search_nodes(&self, query: &str, limit: usize) -> StoreResult<Vec<NodeSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT n.node_id, n.proc_name, n.table_name, n.column_name, n.node_type,
                    e.upstream_node_id, e.transform_type
             FROM (
                 SELECT * FROM lineage_nodes
                 WHERE table_name LIKE ?1 ESCAPE '\\'
                    OR column_name LIKE ?1 ESCAPE '\\'
                    OR proc_name LIKE ?1 ESCAPE '\\'
                 ORDER BY node_id DESC
                 LIMIT ?2
             ) n
             LEFT JOIN lineage_edges e ON e.downstream_node_id = n.node_id
             ORDER BY n.node_id DESC, e.edge_id",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = stmt.query(params![like_pattern(query), limit])?;
        let mut items: Vec<NodeSummary> = Vec::new();
        while let Some(row) = rows.next()? {
            let node_id: NodeId = row.get(0)?;
            if items.last().is_none_or(|item| item.node_id != node_id) {
                items.push(NodeSummary {
                    node_id,
                    proc_name: row.get(1)?,
                    table_name: row.get(2)?,
                    column_name: row.get(3)?,
                    node_type: row.get(4)?,
                    parent_ids: Vec::new(),
                    transform_types: Vec::new(),
                });
            }
            if let (Some(upstream), Some(item)) = (row.get::<_, Option<NodeId>>(5)?, items.last_mut())
            {
                let transform: Option<String> = row.get(6)?;
                item.parent_ids.push(upstream);
                item.transform_types
                    .push(normalize_transform(transform.as_deref()).to_string());
            }
        }
        Ok(items)
    }

    fn count_matches(&self, query: &str) -> StoreResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM lineage_nodes
             WHERE table_name LIKE ?1 ESCAPE '\\'
                OR column_name LIKE ?1 ESCAPE '\\'
                OR proc_name LIKE ?1 ESCAPE '\\'",
            params![like_pattern(query)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn counts(&self) -> StoreResult<StoreCounts> {
        let conn = self.conn()?;
        let node_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM lineage_nodes", [], |row| row.get(0))?;
        let edge_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM lineage_edges", [], |row| row.get(0))?;
        Ok(StoreCounts {
            node_count: node_count as usize,
            edge_count: edge_count as usize,
        })
    }
}

impl LineageSink for SqliteLineageStore {
    fn append_facts(&self, batch: &FactBatch) -> StoreResult<IngestReceipt> {
        batch.validate()?;
        let mut conn = self.conn()?;
        // Dropping the transaction without commit rolls it back.
        let tx = conn.transaction()?;

        let mut keys = HashMap::new();
        let mut node_ids = Vec::with_capacity(batch.nodes.len());
        {
            let mut insert_node = tx.prepare_cached(
                "INSERT INTO lineage_nodes (proc_name, table_name, column_name, node_type, attributes)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for node in &batch.nodes {
                let attributes = Value::Object(node.attributes.clone()).to_string();
                insert_node.execute(params![
                    node.proc_name,
                    node.table_name,
                    node.column_name,
                    node.node_type,
                    attributes
                ])?;
                let id = tx.last_insert_rowid();
                if let Some(key) = &node.key {
                    keys.insert(key.clone(), id);
                }
                node_ids.push(id);
            }
        }

        {
            let mut insert_edge = tx.prepare_cached(
                "INSERT INTO lineage_edges (downstream_node_id, upstream_node_id, transform_type)
                 VALUES (?1, ?2, ?3)",
            )?;
            let mut node_exists =
                tx.prepare_cached("SELECT 1 FROM lineage_nodes WHERE node_id = ?1")?;
            for edge in &batch.edges {
                // Upstream ids may dangle; the resolver tolerates them.
                let downstream = edge
                    .downstream
                    .resolve_existing(&keys, |id| Ok(node_exists.exists([id])?))?;
                let upstream = edge.upstream.resolve(&keys)?;
                insert_edge.execute(params![downstream, upstream, edge.transform_type])?;
            }
        }

        tx.commit()?;
        Ok(IngestReceipt {
            node_ids,
            edges_count: batch.edges.len(),
        })
    }
}

impl LineageRepository for SqliteLineageStore {
    fn describe(&self) -> String {
        match &self.location {
            Some(path) => format!("sqlite ({})", path.display()),
            None => "sqlite (in-memory)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{NewEdge, NewNode, NodeRef};
    use serde_json::Map;

    fn seed(store: &SqliteLineageStore) {
        let conn = store.conn().unwrap();
        conn.execute_batch(
            "INSERT INTO lineage_nodes (node_id, proc_name, table_name, column_name, node_type)
                 VALUES (1, 'sp_a', 'T', 'x', 'SOURCE'),
                        (2, 'sp_a', 'T', 'y', 'SOURCE'),
                        (3, 'sp_b', 'T', 'z', 'TARGET');
             INSERT INTO lineage_edges (downstream_node_id, upstream_node_id, transform_type)
                 VALUES (3, 1, 'JOIN'), (3, 2, ''), (3, 1, NULL);",
        )
        .unwrap();
    }

    #[test]
    fn test_fetch_node_and_missing() {
        let store = SqliteLineageStore::open_in_memory().unwrap();
        seed(&store);

        let node = store.fetch_node(1).unwrap().unwrap();
        assert_eq!(node.table_name, "T");
        assert_eq!(node.proc_name.as_deref(), Some("sp_a"));
        assert_eq!(node.node_type.as_str(), "SOURCE");
        assert!(node.attributes.is_empty());

        assert!(store.fetch_node(404).unwrap().is_none());
    }

    #[test]
    fn test_parent_edges_in_insertion_order() {
        let store = SqliteLineageStore::open_in_memory().unwrap();
        seed(&store);
        let parents = store.fetch_parent_edges(3).unwrap();
        assert_eq!(
            parents,
            vec![
                ParentEdge::new(1, Some("JOIN")),
                ParentEdge::new(2, Some("")),
                ParentEdge::new(1, None),
            ]
        );
        assert!(store.fetch_parent_edges(1).unwrap().is_empty());
    }

    #[test]
    fn test_extra_columns_reach_full_record() {
        let store = SqliteLineageStore::open_in_memory().unwrap();
        seed(&store);
        {
            let conn = store.conn().unwrap();
            conn.execute_batch(
                "ALTER TABLE lineage_nodes ADD COLUMN owner TEXT;
                 UPDATE lineage_nodes
                    SET owner = 'finance', attributes = '{\"sla_hours\": 4, \"owner\": \"ignored\"}'
                  WHERE node_id = 3;",
            )
            .unwrap();
        }

        let node = store.fetch_node(3).unwrap().unwrap();
        assert_eq!(node.attributes["owner"], "finance");
        assert_eq!(node.attributes["sla_hours"], 4);
        assert!(!node.attributes.contains_key(ATTRIBUTES_COLUMN));

        let record = node.full_record();
        assert_eq!(record["node_id"], 3);
        assert_eq!(record["column_name"], "z");
    }

    #[test]
    fn test_search_groups_parents() {
        let store = SqliteLineageStore::open_in_memory().unwrap();
        seed(&store);

        let items = store.search_nodes("t", 100).unwrap();
        assert_eq!(
            items.iter().map(|i| i.node_id).collect::<Vec<_>>(),
            vec![3, 2, 1]
        );
        assert_eq!(items[0].parent_ids, vec![1, 2, 1]);
        assert_eq!(items[0].transform_types, vec!["JOIN", "Direct", "Direct"]);
        assert!(items[1].parent_ids.is_empty());

        let by_proc = store.search_nodes("SP_B", 100).unwrap();
        assert_eq!(by_proc.len(), 1);
        assert_eq!(by_proc[0].node_id, 3);

        assert_eq!(store.search_nodes("", 2).unwrap().len(), 2);
        assert!(store.search_nodes("%", 100).unwrap().is_empty());
    }

    #[test]
    fn test_append_facts_commits_and_rolls_back() {
        let store = SqliteLineageStore::open_in_memory().unwrap();
        let node = |key: &str, column: &str| NewNode {
            key: Some(key.into()),
            proc_name: Some("Auto_Parsed_SP".into()),
            table_name: "source_table".into(),
            column_name: column.into(),
            node_type: "SOURCE".into(),
            attributes: Map::new(),
        };

        let ok = FactBatch {
            nodes: vec![node("a", "field_a"), node("c", "result_c")],
            edges: vec![NewEdge {
                upstream: NodeRef::Key("a".into()),
                downstream: NodeRef::Key("c".into()),
                transform_type: Some("COALESCE".into()),
            }],
        };
        let receipt = store.append_facts(&ok).unwrap();
        assert_eq!(receipt.node_ids.len(), 2);
        let parents = store.fetch_parent_edges(receipt.node_ids[1]).unwrap();
        assert_eq!(parents, vec![ParentEdge::new(receipt.node_ids[0], Some("COALESCE"))]);

        let bad = FactBatch {
            nodes: vec![node("b", "field_b")],
            edges: vec![NewEdge {
                upstream: NodeRef::Key("b".into()),
                downstream: NodeRef::Key("nope".into()),
                transform_type: None,
            }],
        };
        assert!(matches!(
            store.append_facts(&bad),
            Err(StoreError::InvalidFact(_))
        ));
        assert_eq!(
            store.counts().unwrap(),
            StoreCounts {
                node_count: 2,
                edge_count: 1
            }
        );
    }

    #[test]
    fn test_append_facts_requires_existing_downstream_id() {
        let store = SqliteLineageStore::open_in_memory().unwrap();
        seed(&store);
        let edge = |upstream, downstream| NewEdge {
            upstream: NodeRef::Id(upstream),
            downstream: NodeRef::Id(downstream),
            transform_type: None,
        };

        let err = store
            .append_facts(&FactBatch {
                nodes: vec![],
                edges: vec![edge(1, 2), edge(999, 12345)],
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidFact(ref msg) if msg.contains("12345")));
        assert_eq!(store.counts().unwrap().edge_count, 3);

        // a dangling upstream id is kept
        let receipt = store
            .append_facts(&FactBatch {
                nodes: vec![],
                edges: vec![edge(999, 2)],
            })
            .unwrap();
        assert_eq!(receipt.edges_count, 1);
        assert_eq!(store.fetch_parent_edges(2).unwrap(), vec![ParentEdge::new(999, None)]);
    }

    #[test]
    fn test_count_matches_ignores_limit() {
        let store = SqliteLineageStore::open_in_memory().unwrap();
        seed(&store);
        assert_eq!(store.search_nodes("", 1).unwrap().len(), 1);
        assert_eq!(store.count_matches("").unwrap(), 3);
        assert_eq!(store.count_matches("sp_a").unwrap(), 2);
        assert_eq!(store.count_matches("%").unwrap(), 0);
    }

    #[test]
    fn test_missing_table_is_unavailable_not_empty() {
        let store = SqliteLineageStore::open_in_memory().unwrap();
        store
            .conn()
            .unwrap()
            .execute_batch("DROP TABLE lineage_edges;")
            .unwrap();
        let err = store.fetch_parent_edges(1).unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("a_b%"), "%a\\_b\\%%");
        assert_eq!(like_pattern(""), "%%");
    }
}
