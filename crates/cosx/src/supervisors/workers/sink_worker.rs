// ai
//! 🗑️ The SinkWorker — patient, tireless, and deeply unbothered by the chaos happening
//! upstream. It receives pages. It sinks pages. It asks no questions.

use anyhow::{Context, Result};
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::debug;

use super::Worker;
use crate::backends::{Sink, SinkBackend};
use crate::common::LineBatch;

#[derive(Debug)]
pub(crate) struct SinkWorker {
    rx: Receiver<LineBatch>,
    sink: SinkBackend,
}

impl SinkWorker {
    pub(crate) fn new(rx: Receiver<LineBatch>, sink: SinkBackend) -> Self {
        Self { rx, sink }
    }
}

impl Worker for SinkWorker {
    fn start(mut self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📥 SinkWorker started draining channel...");
            loop {
                match self.rx.recv().await {
                    Ok(batch) => {
                        debug!(
                            "🪣 SinkWorker received a page of {} records ({} bytes)",
                            batch.len(),
                            batch.total_bytes()
                        );
                        self.sink
                            .receive(batch)
                            .await
                            .context("SinkWorker failed to receive batch")?;
                    }
                    Err(_) => {
                        // -- closed and empty. the source is done, so are we.
                        debug!("🏁 SinkWorker: Channel closed. Shutting down.");
                        self.sink.close().await.context("SinkWorker failed to close sink")?;
                        return Ok(());
                    }
                }
            }
        })
    }
}
