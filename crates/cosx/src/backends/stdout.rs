// ai
//! 🖨️ Stdout sink — one record per line, straight to the terminal or whatever it's piped into.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{self, AsyncWriteExt, BufWriter, Stdout};

use crate::backends::Sink;
use crate::common::{LineBatch, PipelineStats};

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct StdoutSinkConfig {}

#[derive(Debug)]
pub(crate) struct StdoutSink {
    out: BufWriter<Stdout>,
    stats: Arc<PipelineStats>,
}

impl StdoutSink {
    pub(crate) fn new(stats: Arc<PipelineStats>) -> Self {
        Self {
            out: BufWriter::new(io::stdout()),
            stats,
        }
    }
}

#[async_trait]
impl Sink for StdoutSink {
    async fn receive(&mut self, batch: LineBatch) -> Result<()> {
        let count = batch.len() as u64;
        for record in batch.records {
            self.out.write_all(record.as_bytes()).await?;
            self.out.write_all(b"\n").await?;
        }
        // -- flush per page so a long-running scan shows up promptly
        self.out
            .flush()
            .await
            .context("💀 stdout stopped listening. broken pipe, probably. someone closed `head`.")?;
        self.stats.add_records_written(count);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.out.flush().await.context("💀 final flush to stdout failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn the_one_where_stdout_counts_what_it_printed() {
        let the_stats = Arc::new(PipelineStats::default());
        let mut the_sink = StdoutSink::new(the_stats.clone());
        the_sink
            .receive(LineBatch::new(vec!["stdout sink line one".to_string(), "stdout sink line two".to_string()]))
            .await
            .unwrap();
        the_sink.close().await.unwrap();
        assert_eq!(the_stats.summary(Duration::ZERO).records_written, 2);
    }
}
