//! Run-scoped harvest state
//!
//! One [`RunState`] is created per run and owned by that run's harvester.
//! Nothing in it is shared across runs.

use std::path::PathBuf;

/// Mutable counters and flags of one harvest run
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// Records written so far, across every tab tried
    pub total_records: usize,

    /// File the last batch was written to
    pub last_saved_path: Option<PathBuf>,

    /// Whether the output file has received its header row in this run
    pub header_written: bool,

    /// Whether any page produced at least one record
    pub found_records: bool,

    /// Consecutive iterations without new records
    pub stall_count: u32,

    /// Recovery scrolls performed in the current attempt
    pub recovery_attempts: u32,

    /// Consecutive rate-limited responses
    pub rate_limit_count: u32,

    /// Whether a pagination response has been processed in the current attempt
    pub page_seen: bool,

    /// Timeouts while waiting for the first page of the current attempt
    pub first_page_timeouts: u32,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the per-attempt counters before navigating a (new) tab
    ///
    /// Totals, the saved path and the header flag carry over, since every
    /// attempt writes to the same file.
    pub fn begin_attempt(&mut self) {
        self.stall_count = 0;
        self.recovery_attempts = 0;
        self.rate_limit_count = 0;
        self.page_seen = false;
        self.first_page_timeouts = 0;
    }

    /// Records a saved batch
    pub fn record_batch(&mut self, count: usize, path: PathBuf) {
        self.total_records += count;
        self.last_saved_path = Some(path);
        if count > 0 {
            self.found_records = true;
        }
    }

    pub fn record_stall(&mut self) {
        self.stall_count += 1;
    }

    pub fn clear_stalls(&mut self) {
        self.stall_count = 0;
    }
}
