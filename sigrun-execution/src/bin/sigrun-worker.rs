//! Worker process launched by the pool. Speaks the IPC protocol on
//! stdin/stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "sigrun-worker")]
#[command(about = "Sigrun worker process (launched by the worker pool)")]
#[command(version)]
struct Args {
    /// Identifier assigned by the pool
    #[arg(long)]
    worker_id: u64,

    /// Log level (trace, debug, info, warn, error); falls back to SIGRUN_LOG_LEVEL
    #[arg(long, env = "SIGRUN_LOG_LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    sigrun_logging::init_worker_tracing(args.log_level.as_deref())
        .context("Failed to initialize worker logging")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build worker runtime")?;

    runtime
        .block_on(sigrun_runtime::worker_main(args.worker_id))
        .with_context(|| format!("Worker {} failed", args.worker_id))
}
