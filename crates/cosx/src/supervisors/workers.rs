// ai
//! 🧵 Workers: the two tasks that actually move records while the Supervisor takes all the
//! credit in the sprint retro.
//!
//! ```text
//! SourceWorker ──LineBatch──► [async_channel, bounded] ──LineBatch──► SinkWorker
//! ```
//!
//! 🧠 Knowledge graph:
//! - The source worker owns the only `Sender`. When it returns, the channel closes.
//! - The sink worker drains until the channel is closed and empty, then closes its sink.
//! - Either one failing drops its end of the channel, which winds the other one down. 🦆

use anyhow::Result;
use tokio::task::JoinHandle;

mod sink_worker;
mod source_worker;

pub(super) use sink_worker::SinkWorker;
pub(super) use source_worker::SourceWorker;

/// 🏗️ A background worker, that does work. duh.
pub(super) trait Worker {
    /// 🚀 Spawn onto the runtime. The handle yields the worker's verdict.
    fn start(self) -> JoinHandle<Result<()>>;
}
