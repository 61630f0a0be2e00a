// ai
//! 📦 Common data structures — what travels between the source worker and the sink worker.
//!
//! 🎬 *[a batch of lines boards the channel. nobody checks its tickets. it is a channel.]*
//!
//! 🧠 Knowledge graph:
//! - `LineBatch`: one page of records, each record one line without its line ending.
//! - `PipelineStats`: atomics shared by every worker and backend of one run. Updated as
//!   things happen, snapshotted into a `RunSummary` at the end.
//! - `RunSummary`: the numbers the CLI prints in its table. Plain data, no atomics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// 📦 A page of records on its way from a source to a sink.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LineBatch {
    pub records: Vec<String>,
}

impl LineBatch {
    pub(crate) fn new(records: Vec<String>) -> Self {
        Self { records }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// 📊 Payload bytes, line endings not included.
    pub(crate) fn total_bytes(&self) -> usize {
        self.records.iter().map(String::len).sum()
    }
}

/// 🔢 Live counters for one pipeline run.
#[derive(Debug, Default)]
pub(crate) struct PipelineStats {
    records_read: AtomicU64,
    records_written: AtomicU64,
    objects_written: AtomicU64,
    upload_failures: AtomicU64,
    missing_objects: AtomicU64,
}

impl PipelineStats {
    pub(crate) fn add_records_read(&self, n: u64) {
        self.records_read.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_records_written(&self, n: u64) {
        self.records_written.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_objects_written(&self, n: u64) {
        self.objects_written.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_upload_failure(&self) {
        self.upload_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_missing_object(&self) {
        self.missing_objects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn summary(&self, elapsed: Duration) -> RunSummary {
        RunSummary {
            records_read: self.records_read.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            objects_written: self.objects_written.load(Ordering::Relaxed),
            upload_failures: self.upload_failures.load(Ordering::Relaxed),
            missing_objects: self.missing_objects.load(Ordering::Relaxed),
            elapsed,
        }
    }
}

/// 🧾 What happened during a run. Printed by the CLI, asserted on by tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// 📥 Records the source produced
    pub records_read: u64,
    /// 📤 Records the sink delivered (for object sinks: inside successfully uploaded objects)
    pub records_written: u64,
    pub objects_written: u64,
    /// 💀 Uploads that failed. Logged, counted, not fatal.
    pub upload_failures: u64,
    /// 👻 Keys that were listed but gone by the time we read them
    pub missing_objects: u64,
    pub elapsed: Duration,
}
