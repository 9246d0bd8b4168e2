pub mod node;
pub mod edge;
pub mod graph;
pub mod error;
pub mod resolver;
pub mod ports;
