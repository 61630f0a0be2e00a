// ai
//! # Previously, on cosx...
//!
//! 🎬 Someone needed records without a file. Someone needed to check what a pipeline wrote
//! without a bucket. Someone wrote a backend so simple it lives entirely in RAM.
//!
//! `in_mem` provides an in-memory [`Source`](crate::backends::Source) that pours the
//! `records` list from config, and an in-memory [`Sink`](crate::backends::Sink) that hoards
//! what it receives behind an `Arc<Mutex<...>>` so tests can peek inside.
//!
//! ✅ No network calls. No disk I/O. Just vibes and heap memory. 🦆

mod in_mem_sink;
mod in_mem_source;

pub use in_mem_sink::InMemorySinkConfig;
pub(crate) use in_mem_sink::InMemorySink;
pub use in_mem_source::InMemorySourceConfig;
pub(crate) use in_mem_source::InMemorySource;
