//! Ordered delivery of block notifications to the index.
//!
//! The host feeds `Connect`/`Disconnect` notifications into an mpsc
//! channel; the subscriber drains it one notification at a time, which
//! preserves the single-writer discipline the durable index assumes.

use crate::index::{AddrIndex, BlockIdOracle, IndexNtfn};
use crate::index::levels::IndexBucket;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Cooperative interrupt flag consulted at coarse boundaries (startup,
/// index drop, between notifications).  Per-block work is never cancelled
/// mid-flight.
#[derive(Default)]
pub struct ShutdownFlag {
    interrupted: AtomicBool,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

/// Drains block notifications into the index until the channel closes or
/// shutdown is requested.  A connect failure aborts the loop with the
/// error; disconnect failures are handled (logged) inside the index.
pub async fn run_index_subscriber<B, O>(
    index: Arc<AddrIndex<B, O>>,
    mut ntfns: mpsc::Receiver<IndexNtfn>,
    shutdown: Arc<ShutdownFlag>,
) -> Result<()>
where
    B: IndexBucket + Send + Sync + 'static,
    O: BlockIdOracle + Send + Sync + 'static,
{
    while let Some(ntfn) = ntfns.recv().await {
        if shutdown.is_interrupted() {
            info!("{}: subscriber interrupted, stopping", index.name());
            break;
        }

        let (kind, block_hash, height) = match &ntfn {
            IndexNtfn::Connect { block, .. } => ("connect", block.hash(), block.header.height),
            IndexNtfn::Disconnect { block, .. } => {
                ("disconnect", block.hash(), block.header.height)
            }
        };

        index
            .process_notification(&ntfn)
            .with_context(|| format!("{}: unable to {kind} block {block_hash}", index.name()))?;

        debug!(kind, block = %block_hash, height, "{}: processed notification", index.name());
    }

    Ok(())
}
