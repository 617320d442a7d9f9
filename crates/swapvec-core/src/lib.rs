//! SwapVec core crate - configuration, error taxonomy, and the swap record model.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ProviderStatus, SwapvecConfig};
pub use error::{Result, SwapvecError};
pub use types::{SwapRecord, TokenBalance};
