use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Store-assigned node identifier
pub type NodeId = i64;

/// Column names that make up a node's core attributes in the full record.
pub const CORE_FIELDS: [&str; 5] = [
    "node_id",
    "proc_name",
    "table_name",
    "column_name",
    "node_type",
];

/// Node category. Open enumeration: unknown tags are carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Source,
    Target,
    Transform,
    Other(String),
}

impl NodeType {
    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Source => "SOURCE",
            NodeType::Target => "TARGET",
            NodeType::Transform => "TRANSFORM",
            NodeType::Other(tag) => tag,
        }
    }
}

impl From<String> for NodeType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "SOURCE" => NodeType::Source,
            "TARGET" => NodeType::Target,
            "TRANSFORM" => NodeType::Transform,
            _ => NodeType::Other(tag),
        }
    }
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        NodeType::from(tag.to_string())
    }
}

impl From<NodeType> for String {
    fn from(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Other(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked data element (table column or procedure output).
///
/// Read-only once fetched. `attributes` holds whatever else the store keeps
/// for the node; it is never interpreted, only carried into [`LineageNode::full_record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageNode {
    pub node_id: NodeId,
    #[serde(default)]
    pub proc_name: Option<String>,
    pub table_name: String,
    pub column_name: String,
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl LineageNode {
    pub fn new(
        node_id: NodeId,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        node_type: impl Into<NodeType>,
    ) -> Self {
        Self {
            node_id,
            proc_name: None,
            table_name: table_name.into(),
            column_name: column_name.into(),
            node_type: node_type.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_proc(mut self, proc_name: impl Into<String>) -> Self {
        self.proc_name = Some(proc_name.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Display label: table and column on separate lines.
    pub fn label(&self) -> String {
        format!("{}\n{}", self.table_name, self.column_name)
    }

    /// The complete stored record. Core fields always win over same-named extra attributes.
    pub fn full_record(&self) -> Map<String, Value> {
        let mut record = self.attributes.clone();
        record.insert("node_id".into(), Value::from(self.node_id));
        record.insert(
            "proc_name".into(),
            self.proc_name.clone().map(Value::from).unwrap_or(Value::Null),
        );
        record.insert("table_name".into(), Value::from(self.table_name.as_str()));
        record.insert("column_name".into(), Value::from(self.column_name.as_str()));
        record.insert("node_type".into(), Value::from(self.node_type.as_str()));
        record
    }
}
