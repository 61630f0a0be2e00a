// ai
//! ⏱️ Rollover policy — when does an in-flight object stop being in flight?
//!
//! Three triggers, pick exactly one per writer:
//! - `Count(n)`: after n records. The default, at `DEFAULT_TUPLES_PER_OBJECT`.
//! - `Time(d)`: every d, but only if something was buffered. No empty objects.
//! - `Size(b)`: once the encoded body reaches b bytes.
//!
//! 🧠 Knowledge graph: `time_per_object` arrives as a bare number of seconds or as an
//! explicit duration. Both go through the same rule: below one second is rejected,
//! at or above one second is truncated to whole seconds. The plain writer and the
//! parquet writer share this rule, no asymmetric special cases. A string is the wrong type.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigurationError;

/// 📦 Records per object when nobody said otherwise.
pub const DEFAULT_TUPLES_PER_OBJECT: usize = 1000;

/// ⏱️ Smallest rollover interval we are willing to schedule.
pub const MIN_TIME_PER_OBJECT: Duration = Duration::from_secs(1);

/// 🎛️ The raw `time_per_object` parameter, before anyone judged it.
///
/// Deserializes untagged: a number is seconds, a `{ secs, nanos }` table is an explicit
/// duration, and a string is kept only so it can be rejected with a useful message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TimePerObject {
    Seconds(f64),
    Exact(Duration),
    Text(String),
}

impl From<Duration> for TimePerObject {
    fn from(value: Duration) -> Self {
        TimePerObject::Exact(value)
    }
}

impl From<f64> for TimePerObject {
    fn from(value: f64) -> Self {
        TimePerObject::Seconds(value)
    }
}

impl From<u64> for TimePerObject {
    fn from(value: u64) -> Self {
        TimePerObject::Exact(Duration::from_secs(value))
    }
}

impl TimePerObject {
    /// ✂️ Validate and truncate to whole seconds.
    pub fn to_interval(&self) -> Result<Duration, ConfigurationError> {
        let interval = match self {
            TimePerObject::Seconds(secs) => {
                if !secs.is_finite() || *secs < MIN_TIME_PER_OBJECT.as_secs_f64() {
                    return Err(ConfigurationError::UnsupportedGranularity {
                        given: format!("{secs} seconds"),
                    });
                }
                // -- Duration::from_secs_f64 would panic on absurd values; anything past u64 seconds is "forever" anyway
                Duration::from_secs(secs.trunc().min(u64::MAX as f64) as u64)
            }
            TimePerObject::Exact(duration) => {
                if *duration < MIN_TIME_PER_OBJECT {
                    return Err(ConfigurationError::UnsupportedGranularity {
                        given: format!("{duration:?}"),
                    });
                }
                Duration::from_secs(duration.as_secs())
            }
            TimePerObject::Text(text) => {
                return Err(ConfigurationError::WrongType {
                    found: format!("the string {text:?}"),
                });
            }
        };
        Ok(interval)
    }
}

/// 🔄 The rollover trigger, fixed at construction for the writer's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverPolicy {
    Count(usize),
    Time(Duration),
    Size(usize),
}

impl Default for RolloverPolicy {
    fn default() -> Self {
        RolloverPolicy::Count(DEFAULT_TUPLES_PER_OBJECT)
    }
}

impl RolloverPolicy {
    /// 🎯 Pick the single policy from the three optional knobs.
    ///
    /// Nothing given → `Count(DEFAULT_TUPLES_PER_OBJECT)`. More than one given →
    /// `ConflictingRollover`. Zero thresholds are rejected, because "flush after zero
    /// records" is a philosophical position, not a configuration.
    pub fn from_params(
        tuples_per_object: Option<usize>,
        time_per_object: Option<&TimePerObject>,
        bytes_per_object: Option<usize>,
    ) -> Result<Self, ConfigurationError> {
        let given: Vec<&str> = [
            tuples_per_object.map(|_| "tuples_per_object"),
            time_per_object.map(|_| "time_per_object"),
            bytes_per_object.map(|_| "bytes_per_object"),
        ]
        .into_iter()
        .flatten()
        .collect();
        if given.len() > 1 {
            return Err(ConfigurationError::ConflictingRollover {
                given: given.join(", "),
            });
        }

        if let Some(count) = tuples_per_object {
            if count == 0 {
                return Err(ConfigurationError::ZeroThreshold {
                    parameter: "tuples_per_object",
                });
            }
            return Ok(RolloverPolicy::Count(count));
        }
        if let Some(time) = time_per_object {
            return Ok(RolloverPolicy::Time(time.to_interval()?));
        }
        if let Some(bytes) = bytes_per_object {
            if bytes == 0 {
                return Err(ConfigurationError::ZeroThreshold {
                    parameter: "bytes_per_object",
                });
            }
            return Ok(RolloverPolicy::Size(bytes));
        }
        Ok(RolloverPolicy::default())
    }

    /// 🧮 Should the buffer be flushed right after an append?
    /// Time-based writers never flush on append; their timer does it.
    pub(crate) fn is_due_after_append(&self, buffered_records: usize, buffered_bytes: usize) -> bool {
        match self {
            RolloverPolicy::Count(n) => buffered_records >= *n,
            RolloverPolicy::Size(limit) => buffered_bytes >= *limit,
            RolloverPolicy::Time(_) => false,
        }
    }

    pub(crate) fn interval(&self) -> Option<Duration> {
        match self {
            RolloverPolicy::Time(d) => Some(*d),
            _ => None,
        }
    }
}
