// ai
//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where workers toil endlessly..."
//! 🎬 "One supervisor dared to manage them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor — builds both ends of the pipeline from config, wires them together
//! with a bounded channel, starts the workers and waits for them.
//!
//! ⚠️ DO NOT MAKE THIS PUB EVER. The workers are the supervisor's private minions.
//!
//! 🧠 Knowledge graph:
//! - Backends are built before any worker starts, so config and credential errors surface
//!   before a single record moves.
//! - Cancellation: the caller's token, plus an optional `run_for_secs` timer that cancels a
//!   child of it. Cancelling stops the source; the sink still drains and closes.
//! - A sink worker that fails cancels the same child token, so the source stops even when
//!   it is parked waiting for new objects.
//! - The result is a `RunSummary` built from the shared `PipelineStats`.

mod workers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app_config::{AppConfig, RuntimeConfig};
use crate::backends::{SinkBackend, SourceBackend};
use crate::common::{PipelineStats, RunSummary};
use crate::storage::Connector;
use workers::{SinkWorker, SourceWorker, Worker};

pub(crate) struct Supervisor {
    app_config: AppConfig,
}

impl Supervisor {
    pub(crate) fn new(app_config: AppConfig) -> Self {
        Self { app_config }
    }

    /// 🧵 Build the backends, run the workers, report what happened.
    pub(crate) async fn start_workers(
        &self,
        connector: &dyn Connector,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let stats = Arc::new(PipelineStats::default());
        let source = SourceBackend::from_config(&self.app_config.source_config, connector, stats.clone())
            .await
            .context("💀 Failed to build the source backend")?;
        let sink = SinkBackend::from_config(&self.app_config.sink_config, connector, stats.clone())
            .await
            .context("💀 Failed to build the sink backend")?;

        run_pipeline(source, sink, &self.app_config.runtime, cancel, stats).await
    }
}

/// 🚰➡️🕳️ Pump `source` into `sink` until the source runs dry or the run is cancelled.
pub(crate) async fn run_pipeline(
    source: SourceBackend,
    sink: SinkBackend,
    runtime: &RuntimeConfig,
    cancel: CancellationToken,
    stats: Arc<PipelineStats>,
) -> Result<RunSummary> {
    let started = Instant::now();
    let run_token = cancel.child_token();
    let deadline = runtime.run_for_secs.map(|secs| {
        let token = run_token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            info!("⏰ run_for_secs = {} reached, wrapping up", secs);
            token.cancel();
        })
    });

    let (tx, rx) = async_channel::bounded(runtime.queue_capacity.max(1));
    info!("🚀 pipeline starting (queue capacity {})", runtime.queue_capacity);
    let source_handle = SourceWorker::new(tx, source, run_token.clone(), stats.clone()).start();
    let sink_handle = SinkWorker::new(rx, sink).start();
    // -- a source parked on an empty bucket never sees the channel close, so a dead sink
    //    has to stop it by hand
    let sink_watch = run_token.clone();
    let sink_done = async move {
        let result = sink_handle.await;
        if !matches!(result, Ok(Ok(()))) {
            warn!("💀 sink worker failed, stopping the source");
            sink_watch.cancel();
        }
        result
    };

    let (source_result, sink_result) = tokio::join!(source_handle, sink_done);
    if let Some(deadline) = deadline {
        deadline.abort();
    }
    source_result.context("💀 the source worker panicked")??;
    sink_result.context("💀 the sink worker panicked")??;

    let summary = stats.summary(started.elapsed());
    info!(
        "🏁 pipeline finished: {} records read, {} written in {} objects, {} failed uploads",
        summary.records_read, summary.records_written, summary.objects_written, summary.upload_failures
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::{SinkConfig, SourceConfig};
    use crate::backends::{CommonSourceConfig, InMemorySourceConfig};
    use crate::storage::SharedStoreConnector;
    use futures::TryStreamExt;
    use object_store::ObjectStore;
    use object_store::memory::InMemory;
    use std::collections::HashMap;

    fn in_memory_source(records: &[&str], page: usize) -> InMemorySourceConfig {
        InMemorySourceConfig {
            records: records.iter().map(|r| r.to_string()).collect(),
            common_config: CommonSourceConfig {
                max_batch_size_docs: page,
                ..CommonSourceConfig::default()
            },
        }
    }

    #[tokio::test]
    async fn the_one_where_every_record_crosses_the_channel_in_order() {
        let the_stats = Arc::new(PipelineStats::default());
        let the_source = SourceBackend::InMemory(crate::backends::in_mem::InMemorySource::new(in_memory_source(
            &["a", "b", "c", "d", "e"],
            2,
        )));
        let the_sink = crate::backends::in_mem::InMemorySink::new(the_stats.clone());
        let the_received = the_sink.received.clone();

        let the_summary = run_pipeline(
            the_source,
            SinkBackend::InMemory(the_sink),
            &RuntimeConfig::default(),
            CancellationToken::new(),
            the_stats,
        )
        .await
        .unwrap();

        assert_eq!(*the_received.lock().await, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(the_summary.records_read, 5);
        assert_eq!(the_summary.records_written, 5);
    }

    #[tokio::test]
    async fn the_one_where_the_supervisor_fills_a_bucket_from_config() {
        let the_store = Arc::new(InMemory::new());
        let the_connector = SharedStoreConnector::new(the_store.clone());
        let the_sink_config = toml::from_str(
            "bucket = \"b\"\nendpoint = \"cos.example\"\nobject = \"out/%OBJECTNUM.txt\"\ntuples_per_object = 2",
        )
        .unwrap();
        let the_supervisor = Supervisor::new(AppConfig {
            source_config: SourceConfig::InMemory(in_memory_source(&["1", "2", "3"], 10)),
            sink_config: SinkConfig::Object(the_sink_config),
            runtime: RuntimeConfig::default(),
            app_configs: HashMap::new(),
        });

        let the_summary = the_supervisor
            .start_workers(&the_connector, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(the_summary.records_read, 3);
        assert_eq!(the_summary.records_written, 3);
        assert_eq!(the_summary.objects_written, 2);

        let the_keys: Vec<String> = the_store
            .list(None)
            .map_ok(|m| m.location.to_string())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(the_keys.len(), 2);
    }

    #[tokio::test]
    async fn the_one_where_run_for_secs_ends_an_endless_scan() {
        let the_connector = SharedStoreConnector::new(Arc::new(InMemory::new()));
        let the_source_config = toml::from_str("bucket = \"b\"\nendpoint = \"cos.example\"\npoll_interval_secs = 0.05").unwrap();
        let the_supervisor = Supervisor::new(AppConfig {
            source_config: SourceConfig::ObjectScan(the_source_config),
            sink_config: SinkConfig::InMemory(Default::default()),
            runtime: RuntimeConfig {
                run_for_secs: Some(1),
                ..RuntimeConfig::default()
            },
            app_configs: HashMap::new(),
        });

        let the_summary = tokio::time::timeout(
            Duration::from_secs(10),
            the_supervisor.start_workers(&the_connector, CancellationToken::new()),
        )
        .await
        .expect("💀 the deadline should have stopped the scan")
        .unwrap();
        assert_eq!(the_summary.records_read, 0);
    }

    #[tokio::test]
    async fn the_one_where_cancel_stops_the_scan_and_the_sink_still_closes() {
        let the_store = Arc::new(InMemory::new());
        the_store
            .put(&"in/a.txt".into(), "x\ny\n".into())
            .await
            .unwrap();
        let the_connector = SharedStoreConnector::new(the_store.clone());
        let the_supervisor = Supervisor::new(AppConfig {
            source_config: SourceConfig::ObjectScan(
                toml::from_str("bucket = \"b\"\nendpoint = \"cos.example\"\npoll_interval_secs = 0.05").unwrap(),
            ),
            sink_config: SinkConfig::Object(
                toml::from_str("bucket = \"b\"\nendpoint = \"cos.example\"\nobject = \"out/%OBJECTNUM.txt\"").unwrap(),
            ),
            runtime: RuntimeConfig::default(),
            app_configs: HashMap::new(),
        });

        let the_cancel = CancellationToken::new();
        let the_trigger = the_cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            the_trigger.cancel();
        });

        let the_summary = the_supervisor.start_workers(&the_connector, the_cancel).await.unwrap();
        assert_eq!(the_summary.records_read, 2);
        // -- default count rollover never fired, so close() wrote the one object
        assert_eq!(the_summary.objects_written, 1);
        let the_body = the_store
            .get(&"out/0.txt".into())
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(&the_body[..], b"x\ny\n");
    }

    #[tokio::test]
    async fn the_one_where_a_schema_mismatch_stops_a_scan_that_would_wait_forever() {
        let the_store = Arc::new(InMemory::new());
        the_store
            .put(&"in/a.txt".into(), "{\"a\":1}\n{\"b\":2}\n".into())
            .await
            .unwrap();
        let the_connector = SharedStoreConnector::new(the_store.clone());
        let the_supervisor = Supervisor::new(AppConfig {
            source_config: SourceConfig::ObjectScan(
                toml::from_str("bucket = \"b\"\nendpoint = \"cos.example\"\ndirectory = \"in\"\npoll_interval_secs = 0.05")
                    .unwrap(),
            ),
            sink_config: SinkConfig::Parquet(
                toml::from_str("bucket = \"b\"\nendpoint = \"cos.example\"\nobject = \"t/%OBJECTNUM.parquet\"").unwrap(),
            ),
            runtime: RuntimeConfig::default(),
            app_configs: HashMap::new(),
        });

        let the_error = tokio::time::timeout(
            Duration::from_secs(5),
            the_supervisor.start_workers(&the_connector, CancellationToken::new()),
        )
        .await
        .expect("💀 the run kept going after the sink gave up")
        .unwrap_err();
        assert!(the_error.chain().any(|cause| {
            cause
                .downcast_ref::<crate::error::WriteError>()
                .is_some_and(|e| matches!(e, crate::error::WriteError::SchemaMismatch(_)))
        }));
    }

    #[tokio::test]
    async fn the_one_where_a_bad_sink_config_fails_before_anything_moves() {
        let the_connector = SharedStoreConnector::new(Arc::new(InMemory::new()));
        let the_supervisor = Supervisor::new(AppConfig {
            source_config: SourceConfig::InMemory(in_memory_source(&["1"], 10)),
            sink_config: SinkConfig::Object(
                toml::from_str("bucket = \"b\"\nendpoint = \"cos.example\"\nobject = \"no-placeholder.txt\"").unwrap(),
            ),
            runtime: RuntimeConfig::default(),
            app_configs: HashMap::new(),
        });
        let the_error = the_supervisor
            .start_workers(&the_connector, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(format!("{the_error:#}").contains("sink backend"));
    }
}
