//! Buffered batch replay with per-batch timing.
//!
//! Timing lives here, in the caller, so the processor itself stays free of
//! wall-clock side effects.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{error, info, warn};

use swapvec_core::error::SwapvecError;
use swapvec_vector::{BatchReport, LiveProcessor, SwapVectorizer};

/// Feeds buffered swaps to a `LiveProcessor` and keeps processing times.
pub struct BatchReplay<V: SwapVectorizer> {
    processor: LiveProcessor<V>,
    trade_buffer: Vec<Value>,
    processing_times: Vec<Duration>,
    deadline: Option<Duration>,
}

impl<V: SwapVectorizer + 'static> BatchReplay<V> {
    pub fn new(processor: LiveProcessor<V>, deadline: Option<Duration>) -> Self {
        Self {
            processor,
            trade_buffer: Vec::new(),
            processing_times: Vec::new(),
            deadline,
        }
    }

    /// Replace the buffered trades.
    pub fn buffer(&mut self, trades: Vec<Value>) {
        self.trade_buffer = trades;
    }

    /// Process the buffered trades, log timing, and clear the buffer.
    ///
    /// The buffer is cleared on failure too, so a bad batch is never
    /// resubmitted.
    pub async fn process_buffer(&mut self) -> Option<Result<BatchReport, SwapvecError>> {
        if self.trade_buffer.is_empty() {
            return None;
        }

        let trades = std::mem::take(&mut self.trade_buffer);
        let start = Instant::now();

        let result = match self.deadline {
            Some(budget) => {
                self.processor
                    .process_swaps_until(&trades, tokio::time::Instant::now() + budget)
                    .await
            }
            None => self.processor.process_swaps(&trades).await,
        };

        let elapsed = start.elapsed();

        match &result {
            Ok(report) => {
                self.processing_times.push(elapsed);
                info!(
                    trades = trades.len(),
                    processing_secs = elapsed.as_secs_f64(),
                    average_secs = self.average().as_secs_f64(),
                    "Processing results"
                );
                info!(vector_ids = ?report.ids, "Vector IDs");
                if !report.skipped.is_empty() {
                    warn!(skipped = ?report.skipped, "Swaps skipped");
                }
                if report.deadline_exceeded {
                    warn!("Batch deadline exceeded");
                }
            }
            Err(e) => error!(error = %e, "Error processing buffer"),
        }

        Some(result)
    }

    /// Mean processing time over successful batches.
    pub fn average(&self) -> Duration {
        if self.processing_times.is_empty() {
            return Duration::ZERO;
        }
        self.processing_times.iter().sum::<Duration>() / self.processing_times.len() as u32
    }

    pub fn batches_timed(&self) -> usize {
        self.processing_times.len()
    }

    pub fn processor(&self) -> &LiveProcessor<V> {
        &self.processor
    }
}
