//! In-memory vector store with bounded capacity and brute-force L2 search.
//!
//! Records are keyed by id and never overwritten or evicted. A single write
//! lock covers the duplicate check, the capacity check and the insert, so
//! concurrent callers sharing one store cannot race two records under the
//! same id or past the capacity.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use swapvec_core::error::{Result, SwapvecError};

use crate::vectorizer::SWAP_VECTOR_DIM;

/// A stored vector with its id and auxiliary metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    /// Auxiliary fields of the source swap (timestamp, signature, slot, ...).
    pub metadata: Value,
}

/// A single hit returned from a nearest-neighbor search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    /// Euclidean distance to the query. Lower is closer.
    pub distance: f64,
    pub metadata: Value,
}

/// Keyed vector storage used by the live processor.
///
/// Object safe so that several processors can share one
/// `Arc<dyn VectorStore>`.
pub trait VectorStore: Send + Sync {
    /// Insert a new record. Fails with `DuplicateId` if the id is already
    /// present and `StoreFull` if the store is at capacity.
    fn insert(&self, id: String, vector: Vec<f32>, metadata: Value) -> Result<()>;

    /// Fetch a record by id, or `NotFound`.
    fn get(&self, id: &str) -> Result<VectorRecord>;

    /// Whether `id` is stored. Read through a poisoned lock.
    fn contains(&self, id: &str) -> bool;

    /// Number of records currently stored. Read through a poisoned lock.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of records the store accepts.
    fn capacity(&self) -> usize;

    /// The `k` records closest to `query`, by ascending distance.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;
}

#[derive(Debug, Clone)]
struct StoredEntry {
    /// Insertion sequence number, used to break distance ties.
    seq: u64,
    vector: Vec<f32>,
    metadata: Value,
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<String, StoredEntry>,
    next_seq: u64,
}

/// Thread-safe in-memory `VectorStore`.
///
/// Search is O(n) brute force over Euclidean distance, ties broken by
/// insertion order.
#[derive(Debug)]
pub struct MemoryVectorStore {
    inner: RwLock<StoreInner>,
    capacity: usize,
    dimensions: usize,
}

impl MemoryVectorStore {
    /// Create an empty store for vectors of `dimensions` length.
    pub fn new(capacity: usize, dimensions: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                entries: HashMap::with_capacity(capacity.min(1 << 16)),
                next_seq: 0,
            }),
            capacity,
            dimensions,
        }
    }

    /// Create an empty store for swap vectors.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(capacity, SWAP_VECTOR_DIM)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(SwapvecError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl VectorStore for MemoryVectorStore {
    fn insert(&self, id: String, vector: Vec<f32>, metadata: Value) -> Result<()> {
        self.check_dimensions(&vector)?;

        let mut inner = self
            .inner
            .write()
            .map_err(|e| SwapvecError::Storage(format!("Lock poisoned: {}", e)))?;

        if inner.entries.contains_key(&id) {
            return Err(SwapvecError::DuplicateId(id));
        }
        if inner.entries.len() >= self.capacity {
            return Err(SwapvecError::StoreFull {
                capacity: self.capacity,
            });
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            id,
            StoredEntry {
                seq,
                vector,
                metadata,
            },
        );
        Ok(())
    }

    fn get(&self, id: &str) -> Result<VectorRecord> {
        let inner = self
            .inner
            .read()
            .map_err(|e| SwapvecError::Storage(format!("Lock poisoned: {}", e)))?;

        inner
            .entries
            .get(id)
            .map(|entry| VectorRecord {
                id: id.to_string(),
                vector: entry.vector.clone(),
                metadata: entry.metadata.clone(),
            })
            .ok_or_else(|| SwapvecError::NotFound(id.to_string()))
    }

    fn contains(&self, id: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .contains_key(id)
    }

    fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.check_dimensions(query)?;

        let inner = self
            .inner
            .read()
            .map_err(|e| SwapvecError::Storage(format!("Lock poisoned: {}", e)))?;

        let mut scored: Vec<(f64, u64, &String, &StoredEntry)> = inner
            .entries
            .iter()
            .map(|(id, entry)| (euclidean_distance(query, &entry.vector), entry.seq, id, entry))
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, _, id, entry)| SearchHit {
                id: id.clone(),
                distance,
                metadata: entry.metadata.clone(),
            })
            .collect())
    }
}

/// Euclidean (L2) distance, accumulated in f64.
fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x as f64) - (*y as f64);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
