//! SQLite-backed lineage store.
//!
//! Two tables: `lineage_nodes` (one row per tracked column) and
//! `lineage_edges` (`upstream_node_id → downstream_node_id`, labelled with a
//! transform type). Extra node attributes live in a JSON `attributes`
//! column; any additional columns added to `lineage_nodes` by other tools are
//! also carried into the node's full record.

pub mod schema;
pub mod store;

pub use store::SqliteLineageStore;
