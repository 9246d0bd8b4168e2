pub mod store;

pub use store::{MemoryLineageStore, Snapshot};
