use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::backends::Sink;
use crate::common::{LineBatch, PipelineStats};

/// 🫙 Nothing to configure. It's a Vec.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct InMemorySinkConfig {}

/// 📦 A sink that never forgets.
///
/// Clone-able because tests need to peek inside after handing the sink to the pipeline.
/// Every clone shares the same Vec.
#[derive(Debug, Clone)]
pub(crate) struct InMemorySink {
    pub(crate) received: Arc<Mutex<Vec<String>>>,
    stats: Arc<PipelineStats>,
}

impl InMemorySink {
    pub(crate) fn new(stats: Arc<PipelineStats>) -> Self {
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
            stats,
        }
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn receive(&mut self, batch: LineBatch) -> Result<()> {
        self.stats.add_records_written(batch.len() as u64);
        self.received.lock().await.extend(batch.records);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
