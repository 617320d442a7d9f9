//! Synthetic swap payloads in the acquisition layer's wire shape.

use serde_json::{json, Value};

/// Build the `i`-th synthetic swap observed at `base_timestamp + i`.
///
/// Balances drift with `i` so every swap vectorizes differently while the
/// economic shape (1 token_in spent at 9 decimals for 2 token_out at 6
/// decimals) stays fixed.
pub fn synthetic_swap(i: u64, base_timestamp: i64) -> Value {
    json!({
        "swap_data": {
            "timestamp": base_timestamp + i as i64,
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

/// Generate `count` synthetic swaps.
pub fn synthetic_trades(count: u64, base_timestamp: i64) -> Vec<Value> {
    (0..count)
        .map(|i| synthetic_swap(i, base_timestamp))
        .collect()
}
