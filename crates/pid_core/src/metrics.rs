use std::sync::{atomic::{AtomicUsize, Ordering}, Arc, Mutex};
use serde::Serialize;

use crate::station::StationOutput;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CycleRecord {
    pub cycle_id: u64,
    pub mode: String,
    pub timestamp_ms: u64,
    pub setpoint: Option<f64>,
    pub actual: Option<f64>,
    pub output: Option<f64>,
    pub error: Option<f64>,
    pub limited: bool,
    pub suppressed: bool,
    pub elapsed_ms: Option<f64>,
    pub manual: bool,
}

impl CycleRecord {
    pub fn from_output(cycle_id: u64, mode: &str, timestamp_ms: u64, output: &StationOutput) -> Self {
        match output {
            StationOutput::Auto(out) => Self {
                cycle_id,
                mode: mode.to_string(),
                timestamp_ms: out.timestamp_ms,
                setpoint: Some(out.setpoint),
                actual: Some(out.actual),
                output: Some(out.output),
                error: Some(out.error),
                limited: out.limited,
                suppressed: out.suppressed,
                elapsed_ms: Some(out.elapsed_ms),
                manual: false,
            },
            // manual cycles carry no controller state
            StationOutput::Manual(value) => Self {
                cycle_id,
                mode: mode.to_string(),
                timestamp_ms,
                setpoint: None,
                actual: None,
                output: *value,
                error: None,
                limited: false,
                suppressed: false,
                elapsed_ms: None,
                manual: true,
            },
        }
    }
}

/// Thread-safe recorder with internal mutability.
/// Clones share the same storage.
#[derive(Clone, Default)]
pub struct CycleRecorder {
    results: Arc<Mutex<Vec<CycleRecord>>>,
    limited_cycles: Arc<AtomicUsize>,
}

impl CycleRecorder {
    pub fn new() -> Self {
        Self {
            results: Arc::new(Mutex::new(Vec::with_capacity(10_000))),
            limited_cycles: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn record(&self, result: CycleRecord) {
        if let Ok(mut data) = self.results.lock() {
            if result.limited {
                self.limited_cycles.fetch_add(1, Ordering::Relaxed);
            }
            data.push(result);
        }
    }

    pub fn get_results(&self) -> Vec<CycleRecord> {
        self.results.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.results.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn limited_cycles(&self) -> usize {
        self.limited_cycles.load(Ordering::Relaxed)
    }

    pub fn save_to_csv(&self, filename: &str) -> Result<(), Box<dyn std::error::Error>> {
        let data = self.get_results();
        let mut wtr = csv::Writer::from_path(filename)?;
        for record in data.iter() {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        tracing::info!(records = data.len(), filename, "saved cycle records");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_cycles_are_flagged() {
        let record = CycleRecord::from_output(3, "periodic", 77, &StationOutput::Manual(Some(4.0)));
        assert!(record.manual);
        assert_eq!(record.output, Some(4.0));
        assert_eq!(record.timestamp_ms, 77);
        assert_eq!(record.error, None);
    }

    #[test]
    fn clones_share_storage_and_count_limited() {
        let recorder = CycleRecorder::new();
        let handle = recorder.clone();
        let mut record = CycleRecord::from_output(0, "event", 0, &StationOutput::Manual(None));
        record.limited = true;
        handle.record(record.clone());
        record.limited = false;
        handle.record(record);
        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.limited_cycles(), 1);
    }

    #[test]
    fn writes_csv_with_header() {
        let recorder = CycleRecorder::new();
        recorder.record(CycleRecord::from_output(1, "event", 5, &StationOutput::Manual(Some(2.0))));
        let path = std::env::temp_dir().join(format!("pid_core_cycles_{}.csv", std::process::id()));
        let path = path.to_str().unwrap().to_string();
        recorder.save_to_csv(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(written.starts_with("cycle_id,mode,timestamp_ms"));
        assert_eq!(written.lines().count(), 2);
    }
}
