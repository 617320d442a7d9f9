//! CLI argument definitions for the SwapVec batch replay driver.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use swapvec_core::config::SwapvecConfig;

/// Replays synthetic swap batches through the vectorization pipeline and reports timing.
#[derive(Parser, Debug)]
#[command(name = "swapvec", version, about)]
pub struct CliArgs {
    /// Path to the TOML configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Path to a .env file loaded before the environment is read.
    #[arg(long = "env-file")]
    pub env_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Vectorization worker pool size.
    #[arg(short = 'w', long = "workers")]
    pub workers: Option<usize>,

    /// Swaps per batch.
    #[arg(short = 'b', long = "batch-size")]
    pub batch_size: Option<usize>,

    /// Number of synthetic swaps to generate.
    #[arg(short = 'n', long = "trades", default_value_t = 50)]
    pub trades: u64,

    /// Pause between batches in milliseconds.
    #[arg(long = "pause-ms", default_value_t = 100)]
    pub pause_ms: u64,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SWAPVEC_CONFIG env var > ./swapvec.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("SWAPVEC_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("swapvec.toml")
    }

    /// Overlay CLI flags onto a configuration that already carries file and
    /// environment values.
    pub fn apply(&self, config: &mut SwapvecConfig) {
        if let Some(workers) = self.workers {
            config.processing.max_workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            config.processing.batch_size = batch_size;
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.to_lowercase();
        }
    }
}
