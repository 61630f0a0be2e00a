// ai
//! 🔭 Remote scanner — polls a bucket for keys it has never seen before.
//!
//! 🎬 *[the scanner lists the bucket. it sees hw0.txt. "new," it says. it lists again.
//! hw0.txt is still there. "old news," it says, and emits nothing. it is very sure.]*
//!
//! 🧠 Knowledge graph:
//! - `ScanFilter`: optional directory prefix + optional regex. The regex is anchored and
//!   must match the whole trailing name (the last path segment), not a substring of it.
//! - `ObjectScanner` owns its cursor: a `HashSet` of every key it ever emitted. Not persisted.
//!   Restart the scanner and it will happily tell you about everything again.
//! - `spawn` runs the poll loop as one tokio task. Listing errors are logged and the next
//!   tick tries again. A dropped receiver or a cancelled token ends the loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use object_store::ObjectStore;
use object_store::path::Path as ObjectPath;
use regex::Regex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::ConfigurationError;

/// ⏲️ How long to wait between listings when nobody said.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// 🧹 Which keys are worth reporting.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    directory: Option<String>,
    pattern: Option<Regex>,
}

impl ScanFilter {
    /// ✅ Build a filter. `pattern` is compiled anchored, so `test0.txt` matches
    /// `test0.txt` and not `test0.txt.bak`.
    pub fn new(directory: Option<&str>, pattern: Option<&str>) -> Result<Self, ConfigurationError> {
        let directory = directory
            .map(|d| d.trim_matches('/'))
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        let pattern = pattern
            .map(|p| {
                Regex::new(&format!("^(?:{p})$")).map_err(|e| ConfigurationError::InvalidPattern {
                    pattern: p.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;
        Ok(Self { directory, pattern })
    }

    pub fn directory(&self) -> Option<&str> {
        self.directory.as_deref()
    }

    /// 🎯 Does this key pass? Directory is checked by path segment, pattern by trailing name.
    pub fn matches(&self, key: &str) -> bool {
        if let Some(dir) = &self.directory {
            let inside = key
                .strip_prefix(dir.as_str())
                .is_some_and(|rest| rest.starts_with('/'));
            if !inside {
                return false;
            }
        }
        match &self.pattern {
            Some(re) => {
                let name = key.rsplit('/').next().unwrap_or(key);
                re.is_match(name)
            }
            None => true,
        }
    }
}

/// 🔭 Polls the store and reports each matching key exactly once.
pub struct ObjectScanner {
    store: Arc<dyn ObjectStore>,
    filter: ScanFilter,
    seen: HashSet<String>,
    poll_interval: Duration,
}

impl std::fmt::Debug for ObjectScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectScanner")
            .field("filter", &self.filter)
            .field("seen", &self.seen.len())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl ObjectScanner {
    pub fn new(store: Arc<dyn ObjectStore>, filter: ScanFilter) -> Self {
        Self {
            store,
            filter,
            seen: HashSet::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// 📋 One listing pass. Returns keys not emitted before, in listing order, and
    /// remembers them so the next pass stays quiet about them.
    pub async fn poll_once(&mut self) -> Result<Vec<String>, object_store::Error> {
        let prefix = self.filter.directory().map(ObjectPath::from);
        let listed: Vec<String> = self
            .store
            .list(prefix.as_ref())
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await?;

        let mut fresh = Vec::new();
        for key in listed {
            if self.filter.matches(&key) && self.seen.insert(key.clone()) {
                fresh.push(key);
            }
        }
        trace!("🔭 poll found {} new keys ({} seen total)", fresh.len(), self.seen.len());
        Ok(fresh)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// 🚀 Run the poll loop on its own task, pushing new keys into `sender`.
    pub fn spawn(
        mut self,
        sender: async_channel::Sender<String>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "🔭 scanner started (directory {:?}, every {:?})",
                self.filter.directory(),
                self.poll_interval
            );
            loop {
                match self.poll_once().await {
                    Ok(keys) => {
                        for key in keys {
                            debug!("🔭 new object '{}'", key);
                            if sender.send(key).await.is_err() {
                                debug!("🔭 nobody is listening anymore, scanner going home");
                                return;
                            }
                        }
                    }
                    Err(e) => warn!("💀 listing failed, trying again next poll: {}", e),
                }
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("🔭 scanner cancelled after seeing {} keys", self.seen.len());
                        return;
                    }
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        })
    }
}
