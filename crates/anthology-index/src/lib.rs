//! Flat vector index over corpus chunks: build, persist, load and search.
pub mod index;
pub mod manager;
pub mod retriever;
pub mod store;

pub use index::{IndexEntry, VectorIndex};
pub use manager::{IndexManager, IndexState};
pub use retriever::FlatRetriever;
