//! Load progress reporting
//!
//! The loader only sees a `&dyn ProgressSink`; the CLI picks the
//! implementation with `--progress`.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Receives per-table progress from the loader.
pub trait ProgressSink: Send + Sync {
    /// A table starts loading with `total` records.
    fn begin(&self, table: &str, total: u64);
    /// `n` more records were written.
    fn advance(&self, n: u64);
    /// The current table is done.
    fn finish(&self);
    /// The current table stopped early on an error.
    fn abandon(&self);
}

/// Selects a [`ProgressSink`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ProgressMode {
    /// Bar on a terminal, log lines otherwise
    #[default]
    Auto,
    Bar,
    Log,
    None,
}

impl ProgressMode {
    pub fn sink(self) -> Box<dyn ProgressSink> {
        match self {
            ProgressMode::Auto if std::io::stderr().is_terminal() => Box::new(BarProgress::new()),
            ProgressMode::Auto | ProgressMode::Log => Box::new(LogProgress::new()),
            ProgressMode::Bar => Box::new(BarProgress::new()),
            ProgressMode::None => Box::new(NoProgress),
        }
    }
}

/// indicatif bar on stderr, one per table.
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{msg:>14} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn begin(&self, table: &str, total: u64) {
        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
        bar.set_style(Self::style());
        bar.set_message(table.to_string());
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn advance(&self, n: u64) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(ref bar) = *slot {
                bar.inc(n);
            }
        }
    }

    fn finish(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish();
            }
        }
    }

    fn abandon(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.abandon();
            }
        }
    }
}

#[derive(Debug, Default)]
struct LogState {
    table: String,
    total: u64,
    done: u64,
    /// Next percentage (multiple of 10) worth a log line
    next_step: u64,
}

/// `info!` line every 10% of a table.
#[derive(Debug, Default)]
pub struct LogProgress {
    state: Mutex<LogState>,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for LogProgress {
    fn begin(&self, table: &str, total: u64) {
        info!(table, total, "Loading table");
        if let Ok(mut state) = self.state.lock() {
            *state = LogState {
                table: table.to_string(),
                total,
                done: 0,
                next_step: 10,
            };
        }
    }

    fn advance(&self, n: u64) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.done += n;
        if state.total == 0 {
            return;
        }

        let percent = state.done.saturating_mul(100) / state.total;
        if percent >= state.next_step && percent < 100 {
            info!(
                table = %state.table,
                done = state.done,
                total = state.total,
                "{}% loaded",
                percent / 10 * 10
            );
            state.next_step = percent / 10 * 10 + 10;
        }
    }

    fn finish(&self) {
        if let Ok(state) = self.state.lock() {
            debug!(table = %state.table, records = state.done, "Progress complete");
        }
    }

    fn abandon(&self) {
        if let Ok(state) = self.state.lock() {
            warn!(
                table = %state.table,
                done = state.done,
                total = state.total,
                "Table load abandoned"
            );
        }
    }
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn begin(&self, _table: &str, _total: u64) {}
    fn advance(&self, _n: u64) {}
    fn finish(&self) {}
    fn abandon(&self) {}
}
