//! Live swap processor.
//!
//! `LiveProcessor` takes batches of raw swap payloads through three stages:
//! 1. Parse into `SwapRecord`s (failures are skipped and reported)
//! 2. Vectorize on a worker pool bounded by `max_workers`
//! 3. Insert into the shared vector store, in input order
//!
//! The returned ids line up with the input order regardless of which worker
//! finished first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use swapvec_core::config::ProcessingConfig;
use swapvec_core::error::{Result, SwapvecError};
use swapvec_core::types::SwapRecord;

use crate::store::VectorStore;
use crate::vectorizer::{record_id, SwapVectorizer};

/// Processor construction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Number of records vectorized concurrently.
    pub max_workers: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self { max_workers: 4 }
    }
}

impl From<&ProcessingConfig> for ProcessorConfig {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            max_workers: config.max_workers,
        }
    }
}

/// Why a batch element produced no id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SkipReason {
    /// The payload could not be parsed into a `SwapRecord`.
    Malformed(String),
    /// The record parsed but could not be vectorized.
    Vectorization(String),
    /// The batch deadline expired before the record was vectorized.
    Abandoned,
}

/// One batch element that was left out of the id list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    /// Position of the element in the submitted batch.
    pub index: usize,
    pub signature: Option<String>,
    pub reason: SkipReason,
}

/// Outcome of one `process_swaps` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Vector ids in input order. Skipped elements are omitted.
    pub ids: Vec<String>,
    /// Elements that produced no id, in input order.
    pub skipped: Vec<SkippedRecord>,
    /// Records newly inserted by this call.
    pub stored: usize,
    /// Records whose id was already in the store; the existing id is reported.
    pub duplicates: usize,
    /// True when the deadline expired before every record was vectorized.
    pub deadline_exceeded: bool,
}

/// Point-in-time processor counters, for an external observability layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorStats {
    pub batches: u64,
    pub records_received: u64,
    pub records_stored: u64,
    pub duplicates: u64,
    pub records_skipped: u64,
    pub store_size: usize,
}

#[derive(Debug, Default)]
struct Counters {
    batches: AtomicU64,
    records_received: AtomicU64,
    records_stored: AtomicU64,
    duplicates: AtomicU64,
    records_skipped: AtomicU64,
}

type VectorizeOutcome = (usize, Result<(SwapRecord, Vec<f32>)>);

/// Per-element state while a batch is in flight.
enum Slot {
    Malformed(SkippedRecord),
    Pending,
    Done(Result<(SwapRecord, Vec<f32>)>),
}

/// Batch orchestrator: parse, vectorize on a bounded pool, store.
///
/// The store is shared (several processors may feed one store); the worker
/// pool is owned and lives until `shutdown`.
pub struct LiveProcessor<V: SwapVectorizer> {
    vectorizer: Arc<V>,
    store: Arc<dyn VectorStore>,
    workers: Arc<Semaphore>,
    max_workers: usize,
    counters: Counters,
}

impl<V: SwapVectorizer + 'static> LiveProcessor<V> {
    /// Create a processor. Fails with `Config` if `max_workers` is zero.
    pub fn new(vectorizer: V, store: Arc<dyn VectorStore>, config: ProcessorConfig) -> Result<Self> {
        if config.max_workers == 0 {
            return Err(SwapvecError::Config(
                "max_workers must be at least 1".to_string(),
            ));
        }

        info!(max_workers = config.max_workers, "Live processor ready");

        Ok(Self {
            vectorizer: Arc::new(vectorizer),
            store,
            workers: Arc::new(Semaphore::new(config.max_workers)),
            max_workers: config.max_workers,
            counters: Counters::default(),
        })
    }

    /// Create a processor with the default pool size of 4.
    pub fn with_defaults(vectorizer: V, store: Arc<dyn VectorStore>) -> Result<Self> {
        Self::new(vectorizer, store, ProcessorConfig::default())
    }

    /// Process a batch with no deadline.
    pub async fn process_swaps(&self, raw_batch: &[Value]) -> Result<BatchReport> {
        self.run_batch(raw_batch, None).await
    }

    /// Process a batch, abandoning vectorization still in flight at
    /// `deadline`. Records finished before the deadline are still stored.
    pub async fn process_swaps_until(
        &self,
        raw_batch: &[Value],
        deadline: Instant,
    ) -> Result<BatchReport> {
        self.run_batch(raw_batch, Some(deadline)).await
    }

    async fn run_batch(&self, raw_batch: &[Value], deadline: Option<Instant>) -> Result<BatchReport> {
        if self.workers.is_closed() {
            return Err(SwapvecError::ShuttingDown);
        }

        self.counters.batches.fetch_add(1, Ordering::Relaxed);
        self.counters
            .records_received
            .fetch_add(raw_batch.len() as u64, Ordering::Relaxed);

        // Stage 1: parse.
        let mut slots: Vec<Slot> = Vec::with_capacity(raw_batch.len());
        let mut parsed: Vec<(usize, SwapRecord)> = Vec::with_capacity(raw_batch.len());
        for (index, raw) in raw_batch.iter().enumerate() {
            match SwapRecord::from_value(raw) {
                Ok(record) => {
                    parsed.push((index, record));
                    slots.push(Slot::Pending);
                }
                Err(e) => {
                    debug!(index, error = %e, "Skipping malformed swap");
                    slots.push(Slot::Malformed(SkippedRecord {
                        index,
                        signature: SwapRecord::signature_hint(raw),
                        reason: SkipReason::Malformed(e.to_string()),
                    }));
                }
            }
        }

        // Stage 2: vectorize on the bounded pool.
        let mut tasks = JoinSet::new();
        for (index, record) in parsed {
            let workers = Arc::clone(&self.workers);
            let vectorizer = Arc::clone(&self.vectorizer);
            tasks.spawn(async move {
                let permit = match workers.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (index, Err(SwapvecError::ShuttingDown)),
                };
                // The permit lives on the blocking thread: an abandoned
                // vectorization keeps its worker slot until it returns.
                let outcome = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    vectorizer.vectorize(&record).map(|vector| (record, vector))
                })
                .await
                .unwrap_or_else(|e| {
                    Err(SwapvecError::Vectorization(format!(
                        "Vectorization task panicked: {}",
                        e
                    )))
                });
                (index, outcome)
            });
        }

        let deadline_exceeded = drain_tasks(&mut tasks, &mut slots, deadline).await;
        if deadline_exceeded {
            warn!(
                abandoned = tasks.len(),
                "Batch deadline expired; abandoning in-flight vectorization"
            );
            tasks.abort_all();
        }

        // Stage 3: insert in input order.
        let mut report = BatchReport {
            deadline_exceeded,
            ..BatchReport::default()
        };
        let total = slots.len();
        let mut slots = slots.into_iter().enumerate();
        while let Some((index, slot)) = slots.next() {
            match slot {
                Slot::Done(Err(SwapvecError::ShuttingDown)) => {
                    self.record_outcome(&report);
                    return Err(SwapvecError::ShuttingDown);
                }
                Slot::Done(Ok((record, vector))) => {
                    let id = record_id(&record.signature);
                    match self.store.insert(id.clone(), vector, record_metadata(&record)) {
                        Ok(()) => {
                            report.stored += 1;
                            report.ids.push(id);
                        }
                        Err(SwapvecError::DuplicateId(existing)) => {
                            debug!(id = %existing, signature = %record.signature, "Swap already stored");
                            report.duplicates += 1;
                            report.ids.push(existing);
                        }
                        Err(SwapvecError::StoreFull { capacity }) => {
                            let mut pending = 1;
                            for (rest_index, rest) in slots.by_ref() {
                                match rest {
                                    Slot::Done(Ok(_)) => pending += 1,
                                    other => report.skipped.extend(skipped_entry(
                                        raw_batch,
                                        rest_index,
                                        other,
                                        deadline_exceeded,
                                    )),
                                }
                            }
                            self.record_outcome(&report);
                            warn!(
                                capacity,
                                stored = report.stored,
                                pending,
                                "Vector store full; aborting batch"
                            );
                            return Err(SwapvecError::CapacityExhausted {
                                capacity,
                                stored: report.stored,
                                pending,
                            });
                        }
                        Err(e) => {
                            self.record_outcome(&report);
                            return Err(e);
                        }
                    }
                }
                other => {
                    if let Slot::Done(Err(ref e)) = other {
                        debug!(index, error = %e, "Skipping swap that failed to vectorize");
                    }
                    report
                        .skipped
                        .extend(skipped_entry(raw_batch, index, other, deadline_exceeded));
                }
            }
        }

        self.record_outcome(&report);

        info!(
            received = total,
            stored = report.stored,
            duplicates = report.duplicates,
            skipped = report.skipped.len(),
            deadline_exceeded = report.deadline_exceeded,
            store_size = self.store.len(),
            "Batch processed"
        );

        Ok(report)
    }

    fn record_outcome(&self, report: &BatchReport) {
        self.counters
            .records_stored
            .fetch_add(report.stored as u64, Ordering::Relaxed);
        self.counters
            .duplicates
            .fetch_add(report.duplicates as u64, Ordering::Relaxed);
        self.counters
            .records_skipped
            .fetch_add(report.skipped.len() as u64, Ordering::Relaxed);
    }

    /// Snapshot of the processor counters and current store size.
    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            batches: self.counters.batches.load(Ordering::Relaxed),
            records_received: self.counters.records_received.load(Ordering::Relaxed),
            records_stored: self.counters.records_stored.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            records_skipped: self.counters.records_skipped.load(Ordering::Relaxed),
            store_size: self.store.len(),
        }
    }

    pub fn store_size(&self) -> usize {
        self.store.len()
    }

    /// Get a reference to the shared vector store.
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Close the worker pool. Subsequent batches fail with `ShuttingDown`.
    pub fn shutdown(&self) {
        self.workers.close();
        info!("Live processor shut down");
    }
}

/// Drain finished vectorization tasks into their slots. Returns true if the
/// deadline fired first.
async fn drain_tasks(
    tasks: &mut JoinSet<VectorizeOutcome>,
    slots: &mut [Slot],
    deadline: Option<Instant>,
) -> bool {
    let expiry = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(expiry);

    loop {
        tokio::select! {
            biased;
            joined = tasks.join_next() => match joined {
                Some(Ok((index, outcome))) => slots[index] = Slot::Done(outcome),
                Some(Err(e)) => warn!(error = %e, "Vectorization task failed to join"),
                None => return false,
            },
            _ = &mut expiry => return true,
        }
    }
}

/// Skip entry for a slot that produced no vector. A slot still pending
/// without an expired deadline lost its task to a join failure.
fn skipped_entry(
    raw_batch: &[Value],
    index: usize,
    slot: Slot,
    deadline_exceeded: bool,
) -> Option<SkippedRecord> {
    let reason = match slot {
        Slot::Malformed(skipped) => return Some(skipped),
        Slot::Done(Ok(_)) => return None,
        Slot::Done(Err(e)) => SkipReason::Vectorization(e.to_string()),
        Slot::Pending if deadline_exceeded => SkipReason::Abandoned,
        Slot::Pending => {
            SkipReason::Vectorization("Vectorization task did not complete".to_string())
        }
    };
    Some(SkippedRecord {
        index,
        signature: SwapRecord::signature_hint(&raw_batch[index]),
        reason,
    })
}

/// Auxiliary fields stored alongside each vector.
fn record_metadata(record: &SwapRecord) -> Value {
    serde_json::json!({
        "timestamp": record.timestamp,
        "signature": &record.signature,
        "slot": record.slot,
        "swap_type": &record.swap_type,
        "program_id": &record.program_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryVectorStore;
    use crate::vectorizer::MinimalSwapVectorizer;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn make_swap(i: u64) -> Value {
        json!({
            "swap_data": {
                "timestamp": 1_700_000_000u64 + i,
                "signature": format!("test_sig_{i}"),
                "type": "swap",
                "program_id": "program1",
                "slot": 12345 + i,
                "success": true,
                "instructions": ["instruction1", "instruction2"],
                "inner_instructions": ["inner1"],
                "program_ids": ["program1", "program2"]
            },
            "token_balances": {
                "token_in": {"decimals": 9},
                "token_out": {"decimals": 6},
                "pre_token_balance_in": 5_000_000_000u64 + i * 1_000_000,
                "post_token_balance_in": 4_000_000_000u64 + i * 1_000_000,
                "pre_token_balance_out": 10_000_000 + i * 1_000,
                "post_token_balance_out": 12_000_000 + i * 1_000
            }
        })
    }

    fn make_processor(capacity: usize, max_workers: usize) -> LiveProcessor<MinimalSwapVectorizer> {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::with_capacity(capacity));
        LiveProcessor::new(
            MinimalSwapVectorizer::new(),
            store,
            ProcessorConfig { max_workers },
        )
        .unwrap()
    }

    /// Vectorizer that sleeps for records whose signature ends in "slow".
    struct SlowVectorizer;

    impl SwapVectorizer for SlowVectorizer {
        fn vectorize(&self, record: &SwapRecord) -> Result<Vec<f32>> {
            if record.signature.ends_with("slow") {
                std::thread::sleep(Duration::from_millis(500));
            }
            MinimalSwapVectorizer.vectorize(record)
        }

        fn dimensions(&self) -> usize {
            crate::vectorizer::SWAP_VECTOR_DIM
        }
    }

    /// Vectorizer that records how many calls run at once.
    #[derive(Clone, Default)]
    struct CountingVectorizer {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl SwapVectorizer for CountingVectorizer {
        fn vectorize(&self, record: &SwapRecord) -> Result<Vec<f32>> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            self.active.fetch_sub(1, Ordering::SeqCst);
            MinimalSwapVectorizer.vectorize(record)
        }

        fn dimensions(&self) -> usize {
            crate::vectorizer::SWAP_VECTOR_DIM
        }
    }

    struct PanickingVectorizer;

    impl SwapVectorizer for PanickingVectorizer {
        fn vectorize(&self, record: &SwapRecord) -> Result<Vec<f32>> {
            if record.signature == "test_sig_1" {
                panic!("vectorizer bug");
            }
            MinimalSwapVectorizer.vectorize(record)
        }

        fn dimensions(&self) -> usize {
            crate::vectorizer::SWAP_VECTOR_DIM
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::with_capacity(10));
        let result = LiveProcessor::new(
            MinimalSwapVectorizer::new(),
            store,
            ProcessorConfig { max_workers: 0 },
        );
        assert!(matches!(result, Err(SwapvecError::Config(_))));
    }

    #[test]
    fn test_with_defaults_uses_four_workers() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::with_capacity(10));
        let processor = LiveProcessor::with_defaults(MinimalSwapVectorizer::new(), store).unwrap();
        assert_eq!(processor.max_workers(), 4);
        assert_eq!(processor.stats(), ProcessorStats::default());
    }

    #[test]
    fn test_config_from_processing_config() {
        let processing = ProcessingConfig {
            max_workers: 7,
            ..ProcessingConfig::default()
        };
        assert_eq!(ProcessorConfig::from(&processing).max_workers, 7);
        assert_eq!(ProcessorConfig::default().max_workers, 4);
    }

    #[tokio::test]
    async fn test_process_batch_stores_all() {
        let processor = make_processor(100, 4);
        let batch: Vec<Value> = (0..10).map(make_swap).collect();

        let report = processor.process_swaps(&batch).await.unwrap();
        assert_eq!(report.ids.len(), 10);
        assert_eq!(report.stored, 10);
        assert!(report.skipped.is_empty());
        assert!(!report.deadline_exceeded);
        assert_eq!(processor.store_size(), 10);

        for (i, id) in report.ids.iter().enumerate() {
            assert_eq!(id, &record_id(&format!("test_sig_{i}")));
            let record = processor.store().get(id).unwrap();
            assert_eq!(record.metadata["signature"], format!("test_sig_{i}"));
            assert_eq!(record.metadata["slot"], 12345 + i as u64);
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let processor = make_processor(10, 2);
        let report = processor.process_swaps(&[]).await.unwrap();
        assert_eq!(report, BatchReport::default());
        assert_eq!(processor.stats().batches, 1);
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped() {
        let processor = make_processor(100, 4);
        let mut batch: Vec<Value> = (0..10).map(make_swap).collect();
        batch[3]["token_balances"]["token_in"]
            .as_object_mut()
            .unwrap()
            .remove("decimals");

        let report = processor.process_swaps(&batch).await.unwrap();
        assert_eq!(report.ids.len(), 9);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 3);
        assert_eq!(report.skipped[0].signature.as_deref(), Some("test_sig_3"));
        assert!(matches!(report.skipped[0].reason, SkipReason::Malformed(_)));
        assert!(!report.ids.contains(&record_id("test_sig_3")));
    }

    #[tokio::test]
    async fn test_vectorization_failure_is_skipped() {
        let processor = make_processor(100, 4);
        let mut batch: Vec<Value> = (0..5).map(make_swap).collect();
        batch[1]["token_balances"]["token_out"]["decimals"] = json!(40);
        batch[4]["token_balances"]["post_token_balance_in"] = json!(-1);

        let report = processor.process_swaps(&batch).await.unwrap();
        assert_eq!(report.ids.len(), 3);
        let skipped: Vec<usize> = report.skipped.iter().map(|s| s.index).collect();
        assert_eq!(skipped, vec![1, 4]);
        assert!(report
            .skipped
            .iter()
            .all(|s| matches!(s.reason, SkipReason::Vectorization(_))));
        assert_eq!(processor.store_size(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_signature_reuses_id() {
        let processor = make_processor(100, 4);
        let batch = vec![make_swap(1), make_swap(2), make_swap(1)];

        let report = processor.process_swaps(&batch).await.unwrap();
        assert_eq!(report.ids.len(), 3);
        assert_eq!(report.ids[0], report.ids[2]);
        assert_eq!(report.stored, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(processor.store_size(), 2);

        let again = processor.process_swaps(&batch[..1]).await.unwrap();
        assert_eq!(again.ids, vec![report.ids[0].clone()]);
        assert_eq!(again.duplicates, 1);
        assert_eq!(processor.store_size(), 2);
    }

    #[tokio::test]
    async fn test_store_full_is_batch_level() {
        let processor = make_processor(4, 2);
        let batch: Vec<Value> = (0..6).map(make_swap).collect();

        let err = processor.process_swaps(&batch).await.unwrap_err();
        match err {
            SwapvecError::CapacityExhausted {
                capacity,
                stored,
                pending,
            } => {
                assert_eq!(capacity, 4);
                assert_eq!(stored, 4);
                assert_eq!(pending, 2);
            }
            other => panic!("Expected CapacityExhausted, got {other:?}"),
        }
        assert_eq!(processor.store_size(), 4);
        assert_eq!(processor.stats().records_stored, 4);
    }

    #[tokio::test]
    async fn test_full_store_still_resolves_known_records() {
        let processor = make_processor(2, 2);
        let batch: Vec<Value> = (0..2).map(make_swap).collect();
        let first = processor.process_swaps(&batch).await.unwrap();

        let second = processor.process_swaps(&batch).await.unwrap();
        assert_eq!(first.ids, second.ids);
        assert_eq!(second.duplicates, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deadline_abandons_slow_records() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::with_capacity(100));
        let processor = LiveProcessor::new(
            SlowVectorizer,
            Arc::clone(&store),
            ProcessorConfig { max_workers: 4 },
        )
        .unwrap();

        let mut batch: Vec<Value> = (0..4).map(make_swap).collect();
        batch[2]["swap_data"]["signature"] = json!("test_sig_slow");

        let deadline = Instant::now() + Duration::from_millis(200);
        let report = processor.process_swaps_until(&batch, deadline).await.unwrap();

        assert!(report.deadline_exceeded);
        assert_eq!(report.ids.len(), 3);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 2);
        assert_eq!(report.skipped[0].reason, SkipReason::Abandoned);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abandoned_work_keeps_its_worker_slot() {
        let vectorizer = CountingVectorizer::default();
        let peak = Arc::clone(&vectorizer.peak);
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::with_capacity(100));
        let processor =
            LiveProcessor::new(vectorizer, store, ProcessorConfig { max_workers: 2 }).unwrap();

        let first: Vec<Value> = (0..2).map(make_swap).collect();
        let deadline = Instant::now() + Duration::from_millis(50);
        let report = processor.process_swaps_until(&first, deadline).await.unwrap();
        assert!(report.deadline_exceeded);
        assert_eq!(report.skipped.len(), 2);

        let second: Vec<Value> = (2..4).map(make_swap).collect();
        let report = processor.process_swaps(&second).await.unwrap();
        assert_eq!(report.ids.len(), 2);

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_store_full_pending_counts_only_storable_records() {
        let processor = make_processor(4, 2);
        let mut batch: Vec<Value> = (0..6).map(make_swap).collect();
        batch.push(json!({"swap_data": "nope"}));

        let err = processor.process_swaps(&batch).await.unwrap_err();
        assert!(matches!(
            err,
            SwapvecError::CapacityExhausted {
                capacity: 4,
                stored: 4,
                pending: 2
            }
        ));
        let stats = processor.stats();
        assert_eq!(stats.records_stored, 4);
        assert_eq!(stats.records_skipped, 1);
    }

    #[tokio::test]
    async fn test_panicking_vectorizer_is_reported_as_failure() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::with_capacity(100));
        let processor =
            LiveProcessor::new(PanickingVectorizer, store, ProcessorConfig { max_workers: 2 })
                .unwrap();
        let batch: Vec<Value> = (0..3).map(make_swap).collect();

        let report = processor.process_swaps(&batch).await.unwrap();
        assert_eq!(report.ids.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
        assert!(matches!(report.skipped[0].reason, SkipReason::Vectorization(_)));
    }

    #[test]
    fn test_unfinished_slot_without_deadline_is_not_abandoned() {
        let batch = vec![make_swap(0)];

        let lost = skipped_entry(&batch, 0, Slot::Pending, false).unwrap();
        assert!(matches!(lost.reason, SkipReason::Vectorization(_)));
        assert_eq!(lost.signature.as_deref(), Some("test_sig_0"));

        let abandoned = skipped_entry(&batch, 0, Slot::Pending, true).unwrap();
        assert_eq!(abandoned.reason, SkipReason::Abandoned);
    }

    #[tokio::test]
    async fn test_generous_deadline_completes() {
        let processor = make_processor(100, 2);
        let batch: Vec<Value> = (0..5).map(make_swap).collect();
        let deadline = Instant::now() + Duration::from_secs(30);

        let report = processor.process_swaps_until(&batch, deadline).await.unwrap();
        assert!(!report.deadline_exceeded);
        assert_eq!(report.ids.len(), 5);
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let processor = make_processor(100, 4);
        let mut batch: Vec<Value> = (0..5).map(make_swap).collect();
        batch.push(json!({"swap_data": "nope"}));

        processor.process_swaps(&batch).await.unwrap();
        processor.process_swaps(&batch[..2]).await.unwrap();

        let stats = processor.stats();
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.records_received, 8);
        assert_eq!(stats.records_stored, 5);
        assert_eq!(stats.duplicates, 2);
        assert_eq!(stats.records_skipped, 1);
        assert_eq!(stats.store_size, 5);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_batches() {
        let processor = make_processor(10, 2);
        processor.shutdown();
        let err = processor.process_swaps(&[make_swap(0)]).await.unwrap_err();
        assert!(matches!(err, SwapvecError::ShuttingDown));
    }

    #[test]
    fn test_record_metadata_fields() {
        let record = SwapRecord::from_value(&make_swap(7)).unwrap();
        let metadata = record_metadata(&record);
        assert_eq!(metadata["signature"], "test_sig_7");
        assert_eq!(metadata["timestamp"], 1_700_000_007i64);
        assert_eq!(metadata["slot"], 12352u64);
        assert_eq!(metadata["program_id"], "program1");
    }

    #[test]
    fn test_batch_report_serializes() {
        let report = BatchReport {
            ids: vec!["a".into()],
            skipped: vec![SkippedRecord {
                index: 1,
                signature: None,
                reason: SkipReason::Abandoned,
            }],
            stored: 1,
            duplicates: 0,
            deadline_exceeded: true,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["skipped"][0]["reason"]["kind"], "abandoned");
        assert_eq!(value["deadline_exceeded"], true);
    }
}
