// ai
//! 🚰 The SourceWorker — pulls pages out of the source and pushes them down the channel
//! until the source runs dry, the sink stops listening, or someone cancels the run.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_channel::Sender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Worker;
use crate::backends::{Source, SourceBackend};
use crate::common::{LineBatch, PipelineStats};

#[derive(Debug)]
pub(crate) struct SourceWorker {
    tx: Sender<LineBatch>,
    source: SourceBackend,
    cancel: CancellationToken,
    stats: Arc<PipelineStats>,
}

impl SourceWorker {
    pub(crate) fn new(
        tx: Sender<LineBatch>,
        source: SourceBackend,
        cancel: CancellationToken,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            tx,
            source,
            cancel,
            stats,
        }
    }
}

impl Worker for SourceWorker {
    fn start(mut self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📤 SourceWorker started pumping pages...");
            loop {
                let next = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        info!("🛑 SourceWorker cancelled, no more pages");
                        break;
                    }
                    next = self.source.next_batch() => next.context("SourceWorker failed to read a batch")?,
                };
                let Some(batch) = next else {
                    debug!("🏁 SourceWorker: source ran dry.");
                    break;
                };
                self.stats.add_records_read(batch.len() as u64);
                // -- a page that was read gets delivered, cancelled or not
                let sent = self.tx.send(batch).await;
                if sent.is_err() {
                    debug!("🔌 SourceWorker: sink hung up, stopping.");
                    break;
                }
            }
            // -- dropping `tx` here closes the channel; the sink drains and closes
            Ok(())
        })
    }
}
