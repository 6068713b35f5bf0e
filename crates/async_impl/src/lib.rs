pub mod actuator;
pub mod sensor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};

use pid_core::{CycleRecorder, LoopConfig, LoopDiagnostics, SystemClock};

const CHANNEL_CAPACITY: usize = 64;

/// Runs one control loop as Tokio tasks for `duration_ms` and returns the
/// recorded cycles.
pub async fn run_experiment(config: LoopConfig) -> CycleRecorder {
    run_experiment_with_diagnostics(config).await.0
}

pub async fn run_experiment_with_diagnostics(config: LoopConfig) -> (CycleRecorder, Arc<LoopDiagnostics>) {
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
    let (measurement_tx, measurement_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (output_tx, output_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let start_time = Instant::now();

    tracing::info!(experiment = %config.experiment_name, mode = config.mode(), "async loop starting");

    let sensor = tokio::spawn(sensor::run_sensor_task(
        config.clone(),
        measurement_tx,
        output_rx,
        Arc::clone(&diagnostics),
        Arc::clone(&shutdown),
        start_time,
    ));

    let actuator = tokio::spawn(actuator::run_actuator_task(
        config.clone(),
        station,
        measurement_rx,
        output_tx,
        recorder.clone(),
        Arc::clone(&diagnostics),
        Arc::clone(&shutdown),
    ));

    sleep(Duration::from_millis(config.duration_ms)).await;
    shutdown.store(true, Ordering::Relaxed);

    if let Err(err) = sensor.await {
        tracing::error!(%err, "sensor task failed");
    }
    if let Err(err) = actuator.await {
        tracing::error!(%err, "actuator task failed");
    }

    tracing::info!(cycles = recorder.len(), "async loop stopped");
    (recorder, diagnostics)
}
