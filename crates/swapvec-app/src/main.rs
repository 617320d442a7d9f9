//! SwapVec application binary - composition root.
//!
//! Ties the workspace crates into a batch replay driver:
//! 1. Load `.env`, the TOML config, environment overrides, and CLI flags
//! 2. Initialize tracing from the resolved log level
//! 3. Build the vector store and live processor
//! 4. Replay synthetic swaps in `batch_size` batches, timing each batch
//! 5. Log the processor counters

mod cli;
mod replay;
mod synthetic;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use swapvec_core::config::SwapvecConfig;
use swapvec_vector::{LiveProcessor, MemoryVectorStore, MinimalSwapVectorizer, ProcessorConfig, VectorStore};

use crate::cli::CliArgs;
use crate::replay::BatchReplay;
use crate::synthetic::synthetic_trades;

/// Resolve configuration: defaults < config file < environment < CLI flags.
fn resolve_config(args: &CliArgs) -> Result<SwapvecConfig, Box<dyn std::error::Error>> {
    match args.env_file {
        Some(ref path) => {
            dotenvy::from_path(path)?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let config_file = args.resolve_config_path();
    let mut config = if config_file.exists() {
        SwapvecConfig::load(&config_file)?
    } else {
        SwapvecConfig::default()
    };
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Subscriber used before the configured log level is known.
fn bootstrap_subscriber<W>(make_writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_writer(make_writer)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Provisional subscriber while the config (and its log level) resolves.
    let config = tracing::subscriber::with_default(bootstrap_subscriber(std::io::stderr), || {
        resolve_config(&args)
    })?;

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting SwapVec v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        max_workers = config.processing.max_workers,
        batch_size = config.processing.batch_size,
        vector_cache_size = config.processing.vector_cache_size,
        memory_limit = %config.processing.memory_limit,
        "Configuration resolved"
    );
    config.log_provider_status();

    // Vector store (single shared instance).
    let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::with_capacity(
        config.processing.vector_cache_size,
    ));

    let processor = LiveProcessor::new(
        MinimalSwapVectorizer::new(),
        Arc::clone(&store),
        ProcessorConfig::from(&config.processing),
    )?;

    let mut replay = BatchReplay::new(processor, config.processing.deadline());

    let trades = synthetic_trades(args.trades, chrono::Utc::now().timestamp());
    let pause = Duration::from_millis(args.pause_ms);

    for batch in trades.chunks(config.processing.batch_size) {
        replay.buffer(batch.to_vec());
        replay.process_buffer().await;
        tokio::time::sleep(pause).await;
    }

    let stats = replay.processor().stats();
    tracing::info!(
        batches = stats.batches,
        received = stats.records_received,
        stored = stats.records_stored,
        duplicates = stats.duplicates,
        skipped = stats.records_skipped,
        store_size = stats.store_size,
        average_secs = replay.average().as_secs_f64(),
        "Replay finished"
    );

    replay.processor().shutdown();
    Ok(())
}
