use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between a loop's workers.
#[derive(Default, Debug)]
pub struct LoopDiagnostics {
    pub accepted_inputs: AtomicU64,
    pub suppressed_inputs: AtomicU64,
    /// Measurements the plant could not hand over because the controller lagged.
    pub dropped_measurements: AtomicU64,
    /// Controller outputs the plant side had no room for.
    pub dropped_outputs: AtomicU64,
}

impl LoopDiagnostics {
    pub fn record_input(&self, accepted: bool) {
        if accepted {
            self.accepted_inputs.fetch_add(1, Ordering::Relaxed);
        } else {
            self.suppressed_inputs.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_dropped_measurement(&self) {
        self.dropped_measurements.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_output(&self) {
        self.dropped_outputs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn suppression_ratio(&self) -> f64 {
        let accepted = self.accepted_inputs.load(Ordering::Relaxed);
        let suppressed = self.suppressed_inputs.load(Ordering::Relaxed);
        match accepted + suppressed {
            0 => 0.0,
            total => suppressed as f64 / total as f64,
        }
    }
}
