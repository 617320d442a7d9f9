use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Result, SwapvecError};

// =============================================================================
// Swap records
// =============================================================================

/// Balance movement of one token within a swap, in raw base units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    /// Decimal places of the token mint. Valid range is 0..=18; the parser
    /// keeps whatever integer it was given and the vectorizer enforces it.
    pub decimals: i64,
    /// Balance before the swap executed.
    pub pre_balance: i128,
    /// Balance after the swap executed.
    pub post_balance: i128,
}

impl TokenBalance {
    /// Signed balance change (`post - pre`) in base units.
    pub fn delta(&self) -> i128 {
        self.post_balance - self.pre_balance
    }
}

/// One observed swap event, the unit of input to the vectorizer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecord {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Signature of the originating transaction. Unique per swap.
    pub signature: String,
    /// Free-form event kind, `"swap"` unless the source says otherwise.
    pub swap_type: String,
    /// Block height analogue.
    pub slot: u64,
    pub success: bool,
    /// Program that executed the swap.
    pub program_id: String,
    pub instructions: Vec<String>,
    pub inner_instructions: Vec<String>,
    /// Every program touched by the transaction, in call order.
    pub program_ids: Vec<String>,
    pub token_in: TokenBalance,
    pub token_out: TokenBalance,
}

impl SwapRecord {
    /// Parse a raw payload with `swap_data` and `token_balances` sections.
    ///
    /// `timestamp`, `signature` and both tokens' `decimals` are required.
    /// Other fields fall back to empty/zero values when absent but must have
    /// the right type when present.
    pub fn from_value(raw: &Value) -> Result<Self> {
        let signature = Self::signature_hint(raw);

        if !raw.get("swap_data").is_some_and(Value::is_object) {
            return Err(SwapvecError::malformed(
                signature,
                "missing or non-object `swap_data`",
            ));
        }
        if !raw.get("token_balances").is_some_and(Value::is_object) {
            return Err(SwapvecError::malformed(
                signature,
                "missing or non-object `token_balances`",
            ));
        }

        let payload = RawSwapPayload::deserialize(raw)
            .map_err(|e| SwapvecError::malformed(signature, e.to_string()))?;

        Ok(payload.into())
    }

    /// Best-effort read of `swap_data.signature` from a payload that may be
    /// otherwise malformed.
    pub fn signature_hint(raw: &Value) -> Option<String> {
        raw.get("swap_data")
            .and_then(|d| d.get("signature"))
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    /// Timestamp as a UTC datetime, if it is in chrono's representable range.
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

// =============================================================================
// Wire shapes
// =============================================================================

#[derive(Deserialize)]
struct RawSwapPayload {
    swap_data: RawSwapData,
    token_balances: RawTokenBalances,
}

#[derive(Deserialize)]
struct RawSwapData {
    timestamp: i64,
    signature: String,
    #[serde(rename = "type", default = "default_swap_type")]
    swap_type: String,
    #[serde(default)]
    program_id: String,
    #[serde(default)]
    slot: u64,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    instructions: Vec<String>,
    #[serde(default)]
    inner_instructions: Vec<String>,
    #[serde(default)]
    program_ids: Vec<String>,
}

#[derive(Deserialize)]
struct RawTokenMeta {
    decimals: i64,
}

#[derive(Deserialize)]
struct RawTokenBalances {
    token_in: RawTokenMeta,
    token_out: RawTokenMeta,
    #[serde(default, deserialize_with = "integer_balance")]
    pre_token_balance_in: i128,
    #[serde(default, deserialize_with = "integer_balance")]
    post_token_balance_in: i128,
    #[serde(default, deserialize_with = "integer_balance")]
    pre_token_balance_out: i128,
    #[serde(default, deserialize_with = "integer_balance")]
    post_token_balance_out: i128,
}

fn default_swap_type() -> String {
    "swap".to_string()
}

/// Balances span the full u64 range and may arrive negative from a broken
/// upstream, so both JSON integer forms are widened to i128. Floats are
/// rejected.
fn integer_balance<'de, D>(deserializer: D) -> std::result::Result<i128, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(v) = number.as_i64() {
        Ok(v as i128)
    } else if let Some(v) = number.as_u64() {
        Ok(v as i128)
    } else {
        Err(serde::de::Error::custom(format!(
            "balance must be an integer, got {}",
            number
        )))
    }
}

impl From<RawSwapPayload> for SwapRecord {
    fn from(raw: RawSwapPayload) -> Self {
        let RawSwapPayload {
            swap_data: data,
            token_balances: balances,
        } = raw;

        SwapRecord {
            timestamp: data.timestamp,
            signature: data.signature,
            swap_type: data.swap_type,
            slot: data.slot,
            success: data.success,
            program_id: data.program_id,
            instructions: data.instructions,
            inner_instructions: data.inner_instructions,
            program_ids: data.program_ids,
            token_in: TokenBalance {
                decimals: balances.token_in.decimals,
                pre_balance: balances.pre_token_balance_in,
                post_balance: balances.post_token_balance_in,
            },
            token_out: TokenBalance {
                decimals: balances.token_out.decimals,
                pre_balance: balances.pre_token_balance_out,
                post_balance: balances.post_token_balance_out,
            },
        }
    }
}
