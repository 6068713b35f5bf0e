pub mod actuator;
pub mod sensor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pid_core::{CycleRecorder, LoopConfig, LoopDiagnostics, SystemClock};

const CHANNEL_CAPACITY: usize = 64;

/// Runs one control loop on OS threads for `duration_ms` and returns the
/// recorded cycles.
pub fn run_experiment(config: LoopConfig) -> CycleRecorder {
    run_experiment_with_diagnostics(config).0
}

pub fn run_experiment_with_diagnostics(config: LoopConfig) -> (CycleRecorder, Arc<LoopDiagnostics>) {
    let recorder = CycleRecorder::new();
    let diagnostics = Arc::new(LoopDiagnostics::default());

    let station = match config.build_station(SystemClock) {
        Ok(station) => station,
        Err(err) => {
            tracing::error!(%err, experiment = %config.experiment_name, "cannot start control loop");
            return (recorder, diagnostics);
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let (measurement_tx, measurement_rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
    let (output_tx, output_rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
    let start_time = Instant::now();

    tracing::info!(experiment = %config.experiment_name, mode = config.mode(), "threaded loop starting");

    let sensor = {
        let config = config.clone();
        let diagnostics = Arc::clone(&diagnostics);
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || {
            sensor::run_sensor_thread(config, measurement_tx, output_rx, diagnostics, shutdown, start_time)
        })
    };

    let actuator = {
        let config = config.clone();
        let recorder = recorder.clone();
        let diagnostics = Arc::clone(&diagnostics);
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || {
            actuator::run_actuator_thread(config, station, measurement_rx, output_tx, recorder, diagnostics, shutdown)
        })
    };

    thread::sleep(Duration::from_millis(config.duration_ms));
    shutdown.store(true, Ordering::Relaxed);

    if sensor.join().is_err() {
        tracing::error!("sensor thread panicked");
    }
    if actuator.join().is_err() {
        tracing::error!("actuator thread panicked");
    }

    tracing::info!(cycles = recorder.len(), "threaded loop stopped");
    (recorder, diagnostics)
}
