//! Progress reporting and the aggregate run report.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tracing::{info, warn};
use unbsp_map::CorrectionState;

use crate::error::DecompileError;

/// Receives progress as `processed` out of `total` work items (brushes plus entities).
pub trait ProgressReporter: Send + Sync {
    fn set_progress(&self, processed: usize, total: usize);
}

/// Discards progress updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn set_progress(&self, _processed: usize, _total: usize) {}
}

/// Logs progress through `tracing`, at most once per whole percent.
#[derive(Debug, Default)]
pub struct TracingReporter {
    last_percent: AtomicUsize,
}

impl TracingReporter {
    /// The new whole percent, if `processed` crossed into one no earlier call has reported.
    fn crossed_percent(&self, processed: usize, total: usize) -> Option<usize> {
        let percent = processed * 100 / total.max(1);
        (self.last_percent.fetch_max(percent, Ordering::Relaxed) < percent).then_some(percent)
    }
}

impl ProgressReporter for TracingReporter {
    fn set_progress(&self, processed: usize, total: usize) {
        if let Some(percent) = self.crossed_percent(processed, total) {
            info!("Decompiling... {percent}% ({processed}/{total})");
        }
    }
}

/// Shared work counter feeding a [`ProgressReporter`]. Safe to advance from several threads.
pub(crate) struct Progress<'a> {
    processed: AtomicUsize,
    total: usize,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> Progress<'a> {
    pub(crate) fn new(total: usize, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            processed: AtomicUsize::new(0),
            total,
            reporter,
        }
    }

    pub(crate) fn advance(&self) {
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        self.reporter.set_progress(processed, self.total);
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Counts and diagnostics for a run. Built per entity and merged after the join.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecompileReport {
    pub entities_processed: usize,
    pub brushes_emitted: usize,
    pub good_brushes: usize,
    pub simple_corrected: usize,
    pub advanced_corrected: usize,
    pub failed_brushes: usize,
    /// Brushes whose sides were all discarded.
    pub empty_brushes: usize,
    /// Compiler-only and bevel sides thrown away.
    pub discarded_sides: usize,
    pub clip_sides: usize,
    pub real_faces: usize,
    /// Recovered with a documented default.
    pub warnings: Vec<DecompileError>,
    /// A brush, side or entity was skipped.
    pub errors: Vec<DecompileError>,
}

impl DecompileReport {
    pub fn warn(&mut self, warning: DecompileError) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn error(&mut self, error: DecompileError) {
        warn!("Skipped: {error}");
        self.errors.push(error);
    }

    pub fn record_state(&mut self, state: CorrectionState) {
        match state {
            CorrectionState::Accepted => self.good_brushes += 1,
            CorrectionState::SimpleCorrected => self.simple_corrected += 1,
            CorrectionState::AdvancedCorrected => self.advanced_corrected += 1,
            CorrectionState::Failed => self.failed_brushes += 1,
            CorrectionState::Unprocessed | CorrectionState::Classified => {}
        }
    }

    pub fn merge(&mut self, other: DecompileReport) {
        self.entities_processed += other.entities_processed;
        self.brushes_emitted += other.brushes_emitted;
        self.good_brushes += other.good_brushes;
        self.simple_corrected += other.simple_corrected;
        self.advanced_corrected += other.advanced_corrected;
        self.failed_brushes += other.failed_brushes;
        self.empty_brushes += other.empty_brushes;
        self.discarded_sides += other.discarded_sides;
        self.clip_sides += other.clip_sides;
        self.real_faces += other.real_faces;
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn log_summary(&self) {
        info!(
            "Decompiled {} brushes from {} entities ({} warnings, {} errors)",
            self.brushes_emitted,
            self.entities_processed,
            self.warning_count(),
            self.error_count()
        );
        info!(
            "Good brushes: {}, simple corrected: {}, advanced corrected: {}, failed: {}",
            self.good_brushes, self.simple_corrected, self.advanced_corrected, self.failed_brushes
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(usize, usize)>>);

    impl ProgressReporter for Recorder {
        fn set_progress(&self, processed: usize, total: usize) {
            self.0.lock().unwrap().push((processed, total));
        }
    }

    #[test]
    fn progress_counts_up_to_total() {
        let recorder = Recorder::default();
        let progress = Progress::new(3, &recorder);
        progress.advance();
        progress.advance();
        progress.advance();
        assert_eq!(*recorder.0.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn tracing_reporter_logs_once_per_percent() {
        let reporter = TracingReporter::default();
        let logged: Vec<usize> = (1..=400)
            .filter_map(|processed| reporter.crossed_percent(processed, 400))
            .collect();
        assert_eq!(logged, (1..=100).collect::<Vec<_>>());

        // Late updates from other threads never move the percentage backwards.
        assert_eq!(reporter.crossed_percent(10, 400), None);
        assert_eq!(reporter.crossed_percent(0, 0), None);
    }

    #[test]
    fn merge_adds_counts_and_keeps_diagnostics() {
        let mut a = DecompileReport {
            brushes_emitted: 2,
            good_brushes: 2,
            ..Default::default()
        };
        let mut b = DecompileReport::default();
        b.record_state(CorrectionState::SimpleCorrected);
        b.record_state(CorrectionState::Failed);
        b.error(DecompileError::DegenerateGeometry {
            at: crate::error::Location::brush(1, 9),
        });
        a.merge(b);
        assert_eq!(a.good_brushes, 2);
        assert_eq!(a.simple_corrected, 1);
        assert_eq!(a.failed_brushes, 1);
        assert_eq!(a.error_count(), 1);
    }
}
