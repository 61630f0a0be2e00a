// ai
//! ✍️ Writers — batching sinks that turn a trickle of records into a row of objects.
//!
//! 🎬 *[a record arrives. then another. the buffer grows. somewhere, a timer ticks.]*
//! *[nobody knows who will flush first. the mutex knows. the mutex always knows.]*
//!
//! Both the text `ObjectWriter` and the columnar `ParquetWriter` share one state machine,
//! `RollingWriter<E>`, and differ only in their `ObjectEncoder`:
//!
//! ```text
//! write(item) ──► [Mutex<WriterState>] ──► encoder.append(item)
//!                        │                     │ count/size due?
//!      timer tick ───────┤                     ▼
//!                        └──────────► flush: encode → put(key N) → reset → N += 1
//! ```
//!
//! 🧠 Knowledge graph:
//! - One `tokio::sync::Mutex` per writer guards append, append-driven flush and timer flush.
//!   The upload happens while holding it, so nobody ever sees half an object.
//! - The counter only moves after a successful `put`. A failed upload leaves the buffer and
//!   the counter alone, and the caller gets an `UploadError` to retry or give up on.
//! - Time-based writers own a background task that stops on `close()` or drop, cooperatively,
//!   through a `CancellationToken`.
//! - Idle writers flush nothing. Empty objects are a crime against `ls`. 🦆

mod columnar;
mod text;

pub use columnar::{ColumnType, ParquetCompression, ParquetWriter, ParquetWriterConfig, Row};
pub use text::{ObjectWriter, ObjectWriterConfig, TextCompression};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::Utc;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{ConfigurationError, UploadError, WriteError};
use crate::object_name::ObjectNameTemplate;
use crate::rollover::{MIN_TIME_PER_OBJECT, RolloverPolicy};

/// 🧱 Knows how to buffer items and turn the buffer into one object body.
///
/// # Contract 📜
/// - `append` either buffers the item or rejects it without touching the buffer.
/// - `encode` must not clear anything. The upload might fail and we'll want a second try.
/// - `reset` clears the buffer after a successful upload. Anything sticky across objects
///   (like a parquet schema) survives `reset`.
pub(crate) trait ObjectEncoder: Send + 'static {
    type Item: Send;

    fn append(&mut self, item: Self::Item) -> Result<(), WriteError>;
    fn buffered_records(&self) -> usize;
    fn buffered_bytes(&self) -> usize;
    fn encode(&self) -> Result<Bytes, WriteError>;
    fn reset(&mut self);
}

struct WriterState<E> {
    encoder: E,
    next_object_num: u64,
    last_key: Option<String>,
}

struct Shared<E> {
    store: Arc<dyn ObjectStore>,
    template: ObjectNameTemplate,
    policy: RolloverPolicy,
    state: Mutex<WriterState<E>>,
    objects_written: AtomicU64,
    records_written: AtomicU64,
}

impl<E: ObjectEncoder> Shared<E> {
    /// 📤 Upload whatever is buffered under the next name. Caller holds the lock.
    async fn flush_locked(&self, state: &mut WriterState<E>) -> Result<Option<String>, WriteError> {
        let records = state.encoder.buffered_records();
        if records == 0 {
            return Ok(None);
        }

        let body = state.encoder.encode()?;
        let location = ObjectPath::from(self.template.render(state.next_object_num, Utc::now()));
        let key = location.to_string();
        let body_len = body.len();

        self.store
            .put(&location, PutPayload::from(body))
            .await
            .map_err(|source| UploadError {
                key: key.clone(),
                source,
            })?;

        state.encoder.reset();
        state.next_object_num += 1;
        state.last_key = Some(key.clone());
        self.objects_written.fetch_add(1, Ordering::Relaxed);
        self.records_written.fetch_add(records as u64, Ordering::Relaxed);
        debug!(
            "🪣 rolled over '{}': {} records, {} bytes, next object number {}",
            key, records, body_len, state.next_object_num
        );
        Ok(Some(key))
    }
}

/// 🔄 The shared rollover state machine behind every writer.
pub(crate) struct RollingWriter<E: ObjectEncoder> {
    shared: Arc<Shared<E>>,
    timer: Option<(CancellationToken, JoinHandle<()>)>,
}

impl<E: ObjectEncoder> RollingWriter<E> {
    /// 🚀 Validate the policy, and if it is time-based, start the rollover timer.
    ///
    /// # Panics
    /// Time-based writers spawn a tokio task, so they must be created inside a tokio runtime.
    pub(crate) fn new(
        store: Arc<dyn ObjectStore>,
        template: ObjectNameTemplate,
        policy: RolloverPolicy,
        encoder: E,
    ) -> Result<Self, ConfigurationError> {
        validate_policy(&policy)?;

        let shared = Arc::new(Shared {
            store,
            template,
            policy,
            state: Mutex::new(WriterState {
                encoder,
                next_object_num: 0,
                last_key: None,
            }),
            objects_written: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
        });

        let timer = policy.interval().map(|interval| {
            let cancel = CancellationToken::new();
            let handle = tokio::spawn(run_timer(shared.clone(), interval, cancel.clone()));
            (cancel, handle)
        });

        Ok(Self { shared, timer })
    }

    /// 📥 Buffer one item; flush synchronously if the count or size threshold is reached.
    pub(crate) async fn write(&self, item: E::Item) -> Result<(), WriteError> {
        let mut state = self.shared.state.lock().await;
        state.encoder.append(item)?;
        let due = self.shared.policy.is_due_after_append(
            state.encoder.buffered_records(),
            state.encoder.buffered_bytes(),
        );
        if due {
            self.shared.flush_locked(&mut state).await?;
        }
        Ok(())
    }

    /// 📤 Force a rollover now. Returns the key written, or `None` if nothing was buffered.
    pub(crate) async fn flush(&self) -> Result<Option<String>, WriteError> {
        let mut state = self.shared.state.lock().await;
        self.shared.flush_locked(&mut state).await
    }

    /// 🗑️ Stop the timer, then flush what's left. Best-effort: an upload error is returned,
    /// but the timer is stopped either way.
    ///
    /// Returns the last key this writer ever wrote, whether that was this final flush or an
    /// earlier rollover. `None` only if nothing was ever uploaded.
    pub(crate) async fn close(&mut self) -> Result<Option<String>, WriteError> {
        if let Some((cancel, handle)) = self.timer.take() {
            cancel.cancel();
            if let Err(join_error) = handle.await {
                warn!("⏱️ rollover timer ended badly: {}", join_error);
            }
        }
        let mut state = self.shared.state.lock().await;
        self.shared.flush_locked(&mut state).await?;
        Ok(state.last_key.clone())
    }

    pub(crate) async fn buffered_records(&self) -> usize {
        self.shared.state.lock().await.encoder.buffered_records()
    }

    pub(crate) fn objects_written(&self) -> u64 {
        self.shared.objects_written.load(Ordering::Relaxed)
    }

    pub(crate) fn records_written(&self) -> u64 {
        self.shared.records_written.load(Ordering::Relaxed)
    }

    pub(crate) fn policy(&self) -> RolloverPolicy {
        self.shared.policy
    }
}

impl<E: ObjectEncoder> Drop for RollingWriter<E> {
    fn drop(&mut self) {
        // -- dropped without close(): the timer stops, anything still buffered is gone
        if let Some((cancel, _)) = self.timer.take() {
            cancel.cancel();
        }
    }
}

fn validate_policy(policy: &RolloverPolicy) -> Result<(), ConfigurationError> {
    match policy {
        RolloverPolicy::Count(0) => Err(ConfigurationError::ZeroThreshold {
            parameter: "tuples_per_object",
        }),
        RolloverPolicy::Size(0) => Err(ConfigurationError::ZeroThreshold {
            parameter: "bytes_per_object",
        }),
        RolloverPolicy::Time(interval) if *interval < MIN_TIME_PER_OBJECT => {
            Err(ConfigurationError::UnsupportedGranularity {
                given: format!("{interval:?}"),
            })
        }
        _ => Ok(()),
    }
}

/// ⏱️ The rollover timer. Ticks at the interval, flushes non-empty buffers, logs failures.
async fn run_timer<E: ObjectEncoder>(
    shared: Arc<Shared<E>>,
    interval: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                trace!("⏱️ rollover timer cancelled, clocking out");
                return;
            }
            _ = ticker.tick() => {
                let mut state = shared.state.lock().await;
                match shared.flush_locked(&mut state).await {
                    Ok(Some(key)) => trace!("⏱️ timer rolled over '{}'", key),
                    Ok(None) => trace!("⏱️ timer fired on an empty buffer, nothing to do"),
                    Err(e) => warn!(
                        "💀 timer flush failed, {} records stay buffered for the next attempt: {}",
                        state.encoder.buffered_records(),
                        e
                    ),
                }
            }
        }
    }
}
