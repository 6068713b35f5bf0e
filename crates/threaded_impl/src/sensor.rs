use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pid_core::{Clock, FirstOrderPlant, LoopConfig, LoopDiagnostics, Measurement, SystemClock};

/// Advances the simulated plant on its own period and publishes noisy
/// measurements. Actuator outputs arrive on `output_rx`.
pub fn run_sensor_thread(
    config: LoopConfig,
    sender: SyncSender<Measurement>,
    output_rx: Receiver<f64>,
    diagnostics: Arc<LoopDiagnostics>,
    shutdown_flag: Arc<AtomicBool>,
    start_time: Instant,
) {
    let period = Duration::from_millis(config.plant_period_ms.max(1));
    let dt_secs = period.as_secs_f64();
    let mut plant = FirstOrderPlant::new(config.plant.clone());
    let mut id = 0u64;
    let mut next_tick = start_time;

    while !shutdown_flag.load(Ordering::Relaxed) {
        let expected = next_tick;
        next_tick += period;

        let now = Instant::now();
        if now < expected {
            thread::sleep(expected - now);
        }

        while let Ok(output) = output_rx.try_recv() {
            plant.set_input(output);
        }
        plant.step(dt_secs);

        let measurement = Measurement {
            id,
            timestamp_ms: SystemClock.now_ms(),
            value: plant.measure(),
        };

        match sender.try_send(measurement) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                diagnostics.record_dropped_measurement();
                tracing::trace!(id, "measurement dropped, controller busy");
            }
            Err(TrySendError::Disconnected(_)) => break,
        }

        id += 1;
    }
}
