// ai
//! 📊 progress.rs — "Are we there yet?" — every pipeline, every time, forever.
//!
//! One `ProgressMetrics` per source. Files know their size and get a bar. Bucket scans and
//! in-memory lists don't know when they'll end, so they get a spinner and a record count.
//!
//! ⚠️ Watching the spinner will not make the bucket fill faster. 🦆

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

// -- 📏 one mebibyte. not a megabyte.
const MIB: f64 = 1024.0 * 1024.0;

/// 🔢 "1000000" → "1,000,000".
pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS for the long hauls.
pub(crate) fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 🎨 Two right-aligned columns, no borders. Rates on the left, totals on the right.
fn render_rates(name: &str, docs_per_sec: f64, total_docs: u64, bytes_per_sec: f64, elapsed: Duration) -> String {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec![
        Cell::new(format!("{} records/s", format_number(docs_per_sec as u64))).set_alignment(CellAlignment::Right),
        Cell::new(format!("{} records", format_number(total_docs))).set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![
        Cell::new(format!("{:.2} MiB/s", bytes_per_sec / MIB)).set_alignment(CellAlignment::Right),
        Cell::new(format!("{} elapsed", format_duration(elapsed))).set_alignment(CellAlignment::Right),
    ]);
    format!("source: {name}\n{table}")
}

/// 📊 Tracks bytes and records for one source and keeps a bar or spinner current.
///
/// Rates use a sliding 5 second window so one fat page doesn't look like a trend.
pub(crate) struct ProgressMetrics {
    source_name: String,
    total_size: u64,
    total_bytes: u64,
    total_docs: u64,
    progress_bar: ProgressBar,
    rate_samples: VecDeque<(Instant, u64, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressMetrics")
            .field("source_name", &self.source_name)
            .field("total_size", &self.total_size)
            .field("total_bytes", &self.total_bytes)
            .field("total_docs", &self.total_docs)
            .finish()
    }
}

impl ProgressMetrics {
    /// 🚀 `total_size` of 0 means "no idea", which gets a spinner instead of a bar.
    pub(crate) fn new(source_name: String, total_size: u64) -> Self {
        let progress_bar = if total_size > 0 {
            let bar = ProgressBar::new(total_size);
            if let Ok(style) = ProgressStyle::default_bar().template("{msg}\n| [{bar:40.cyan/blue}] {percent}%") {
                bar.set_style(style.progress_chars("=>-"));
            }
            bar
        } else {
            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
                spinner.set_style(style);
            }
            spinner
        };

        let start_time = Instant::now();
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64, 0u64));

        Self {
            source_name,
            total_size,
            total_bytes: 0,
            total_docs: 0,
            progress_bar,
            rate_samples,
            start_time,
        }
    }

    /// 🔄 Account for one page worth of bytes and records.
    pub(crate) fn update(&mut self, bytes_read: u64, docs_read: u64) {
        self.total_bytes += bytes_read;
        self.total_docs += docs_read;

        let (docs_per_sec, bytes_per_sec) = self.calculate_rates();
        self.progress_bar.set_message(render_rates(
            &self.source_name,
            docs_per_sec,
            self.total_docs,
            bytes_per_sec,
            self.start_time.elapsed(),
        ));
        if self.total_size > 0 {
            self.progress_bar.set_position(self.total_bytes);
        } else {
            self.progress_bar.tick();
        }
    }

    pub(crate) fn total_docs(&self) -> u64 {
        self.total_docs
    }

    pub(crate) fn finish(&self) {
        self.progress_bar.finish();
    }

    fn calculate_rates(&mut self) -> (f64, f64) {
        let now = Instant::now();
        let window = Duration::from_secs(5);
        while let Some(&(timestamp, _, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > window {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples.push_back((now, self.total_bytes, self.total_docs));

        if let Some(&(oldest_time, oldest_bytes, oldest_docs)) = self.rate_samples.front() {
            let elapsed = now.duration_since(oldest_time).as_secs_f64();
            if elapsed > 0.0 {
                let bytes_delta = self.total_bytes.saturating_sub(oldest_bytes);
                let docs_delta = self.total_docs.saturating_sub(oldest_docs);
                return (docs_delta as f64 / elapsed, bytes_delta as f64 / elapsed);
            }
        }
        // -- 💤 not enough elapsed time for a rate yet
        (0.0, 0.0)
    }
}
