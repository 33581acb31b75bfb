use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pipeline phase a [Progress] report refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Chunks are sorted and written to the working directory
    Sorting,
    /// Sorted chunks are merged into the output
    Merging,
}

/// Snapshot passed to a registered [ProgressHook]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    phase: Phase,
    chunks: usize,
    records: u64,
}

impl Progress {
    pub(crate) fn new(phase: Phase, chunks: usize, records: u64) -> Progress {
        Progress {
            phase,
            chunks,
            records,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of chunks taking part in the phase
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Records sorted or merged so far
    pub fn records(&self) -> u64 {
        self.records
    }
}

/// Callback the caller may register with [Sort::with_progress_hook](crate::sort::Sort::with_progress_hook)
pub type ProgressHook = Arc<dyn Fn(&Progress) + Send + Sync>;

pub(crate) struct ProgressReporter {
    hook: Option<(Duration, ProgressHook)>,
    last: Instant,
}

impl ProgressReporter {
    pub(crate) fn new(hook: Option<(Duration, ProgressHook)>) -> ProgressReporter {
        ProgressReporter {
            hook,
            last: Instant::now(),
        }
    }

    /// Calls the hook if at least the registered interval passed since the last call.
    /// `progress` is only evaluated when the hook is due.
    pub(crate) fn tick<F>(&mut self, progress: F)
    where
        F: FnOnce() -> Progress,
    {
        if let Some((interval, hook)) = &self.hook {
            if self.last.elapsed() >= *interval {
                hook(&progress());
                self.last = Instant::now();
            }
        }
    }

    pub(crate) fn report(&mut self, progress: Progress) {
        if let Some((_, hook)) = &self.hook {
            hook(&progress);
            self.last = Instant::now();
        }
    }
}
