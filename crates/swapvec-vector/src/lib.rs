//! SwapVec vector crate - vectorizer, in-memory vector store, and the live batch processor.
//!
//! Provides a deterministic feature vectorizer for swap records, a bounded
//! in-memory store with Euclidean nearest-neighbor search, and the
//! `LiveProcessor` that ties them together over a bounded worker pool.

pub mod processor;
pub mod store;
pub mod vectorizer;

pub use processor::{BatchReport, LiveProcessor, ProcessorConfig, ProcessorStats, SkipReason, SkippedRecord};
pub use store::{MemoryVectorStore, SearchHit, VectorRecord, VectorStore};
pub use vectorizer::{record_id, MinimalSwapVectorizer, SwapVectorizer, SWAP_VECTOR_DIM};
