//! lineage-trace library — upstream data-lineage resolution over a pluggable graph store.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod server;
