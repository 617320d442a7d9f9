//! Swap vectorizer trait and implementations.
//!
//! - `SwapVectorizer` is the contract the processor depends on: a pure,
//!   CPU-bound transform from one `SwapRecord` to a fixed-length vector.
//! - `MinimalSwapVectorizer` derives a 20-dimensional feature vector from the
//!   normalised balance deltas and the structural fields of the swap.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use chrono::Timelike;
use uuid::Uuid;

use swapvec_core::error::{Result, SwapvecError};
use swapvec_core::types::{SwapRecord, TokenBalance};

/// Dimension of every vector produced by `MinimalSwapVectorizer`.
pub const SWAP_VECTOR_DIM: usize = 20;

/// Largest decimal precision accepted for a token.
pub const MAX_DECIMALS: i64 = 18;

/// Namespace for UUIDv5 vector ids derived from transaction signatures.
const SWAP_ID_NAMESPACE: Uuid = Uuid::from_u128(0x5a3e_9c21_7f04_4b6d_9e18_c2d7_40a1_b355);

/// Derive the vector id for a swap from its transaction signature.
///
/// The same signature always maps to the same id, across processes.
pub fn record_id(signature: &str) -> String {
    Uuid::new_v5(&SWAP_ID_NAMESPACE, signature.as_bytes()).to_string()
}

/// Converts swap records into fixed-dimensional vectors.
///
/// Implementations must be deterministic and free of I/O and shared mutable
/// state, since the processor runs them concurrently on a worker pool without
/// locking.
pub trait SwapVectorizer: Send + Sync {
    /// Produce the vector for one record.
    fn vectorize(&self, record: &SwapRecord) -> Result<Vec<f32>>;

    /// Return the dimensionality of vectors produced by this vectorizer.
    fn dimensions(&self) -> usize;
}

/// Feature-engineered vectorizer for swap records.
///
/// | idx  | feature                                          |
/// |------|--------------------------------------------------|
/// | 0    | amount of token_in spent, `(pre - post) / 10^d`  |
/// | 1    | amount of token_out received, `(post - pre) / 10^d` |
/// | 2    | execution price `amount_out / amount_in`         |
/// | 3, 4 | signed `ln(1 + abs(x))` of the two amounts       |
/// | 5..=8| `ln(1 + x)` of normalised pre/post balances      |
/// | 9, 10| relative balance change of token_in / token_out  |
/// | 11   | success flag                                     |
/// | 12   | instruction count                                |
/// | 13   | inner instruction count                          |
/// | 14   | distinct program id count                        |
/// | 15   | program id bucket in `[0, 1)`                    |
/// | 16   | swap type bucket in `[0, 1)`                     |
/// | 17,18| decimals of token_in / token_out over 18         |
/// | 19   | hour of day over 24                              |
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalSwapVectorizer;

impl MinimalSwapVectorizer {
    pub fn new() -> Self {
        Self
    }

    fn scale(token: &TokenBalance, side: &str) -> Result<f64> {
        if !(0..=MAX_DECIMALS).contains(&token.decimals) {
            return Err(SwapvecError::Vectorization(format!(
                "{side} decimals {} outside 0..={MAX_DECIMALS}",
                token.decimals
            )));
        }
        if token.pre_balance < 0 || token.post_balance < 0 {
            return Err(SwapvecError::Vectorization(format!(
                "{side} balance is negative (pre {}, post {})",
                token.pre_balance, token.post_balance
            )));
        }
        Ok(10f64.powi(token.decimals as i32))
    }

    /// Map a string to a stable bucket in `[0, 1)`.
    fn bucket(value: &str) -> f64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        // 24 bits so the value stays exact (and below 1.0) as an f32.
        (hasher.finish() >> 40) as f64 / (1u64 << 24) as f64
    }

    fn relative_change(token: &TokenBalance) -> f64 {
        if token.pre_balance == 0 {
            0.0
        } else {
            token.delta() as f64 / token.pre_balance as f64
        }
    }
}

fn signed_log1p(x: f64) -> f64 {
    x.signum() * x.abs().ln_1p()
}

impl SwapVectorizer for MinimalSwapVectorizer {
    fn vectorize(&self, record: &SwapRecord) -> Result<Vec<f32>> {
        let scale_in = Self::scale(&record.token_in, "token_in")?;
        let scale_out = Self::scale(&record.token_out, "token_out")?;

        let hour = record
            .observed_at()
            .map(|t| t.hour())
            .ok_or_else(|| {
                SwapvecError::Vectorization(format!(
                    "timestamp {} out of range",
                    record.timestamp
                ))
            })?;

        // Positive when token_in was spent and token_out received; the signs
        // flip for swaps recorded in the opposite direction.
        let amount_in = -(record.token_in.delta() as f64) / scale_in;
        let amount_out = record.token_out.delta() as f64 / scale_out;
        let price = if amount_in == 0.0 {
            0.0
        } else {
            amount_out / amount_in
        };

        let distinct_programs: BTreeSet<&str> =
            record.program_ids.iter().map(String::as_str).collect();

        let features: [f64; SWAP_VECTOR_DIM] = [
            amount_in,
            amount_out,
            price,
            signed_log1p(amount_in),
            signed_log1p(amount_out),
            (record.token_in.pre_balance as f64 / scale_in).ln_1p(),
            (record.token_in.post_balance as f64 / scale_in).ln_1p(),
            (record.token_out.pre_balance as f64 / scale_out).ln_1p(),
            (record.token_out.post_balance as f64 / scale_out).ln_1p(),
            Self::relative_change(&record.token_in),
            Self::relative_change(&record.token_out),
            if record.success { 1.0 } else { 0.0 },
            record.instructions.len() as f64,
            record.inner_instructions.len() as f64,
            distinct_programs.len() as f64,
            Self::bucket(&record.program_id),
            Self::bucket(&record.swap_type),
            record.token_in.decimals as f64 / MAX_DECIMALS as f64,
            record.token_out.decimals as f64 / MAX_DECIMALS as f64,
            hour as f64 / 24.0,
        ];

        let mut vector = Vec::with_capacity(SWAP_VECTOR_DIM);
        for (idx, value) in features.into_iter().enumerate() {
            let v = value as f32;
            if !v.is_finite() {
                return Err(SwapvecError::Vectorization(format!(
                    "feature {idx} is not finite for {}",
                    record.signature
                )));
            }
            vector.push(v);
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        SWAP_VECTOR_DIM
    }
}
