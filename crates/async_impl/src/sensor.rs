use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{sleep_until, Duration, Instant};

use pid_core::{Clock, FirstOrderPlant, LoopConfig, LoopDiagnostics, Measurement, SystemClock};

pub async fn run_sensor_task(
    config: LoopConfig,
    sender: mpsc::Sender<Measurement>,
    mut output_rx: mpsc::Receiver<f64>,
    diagnostics: Arc<LoopDiagnostics>,
    shutdown_flag: Arc<AtomicBool>,
    start_time: Instant,
) {
    let period = Duration::from_millis(config.plant_period_ms.max(1));
    let dt_secs = period.as_secs_f64();
    let mut plant = FirstOrderPlant::new(config.plant.clone());
    let mut id: u64 = 0;
    let mut next_tick = start_time;

    while !shutdown_flag.load(Ordering::Relaxed) {
        next_tick += period;
        sleep_until(next_tick).await;

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
            Err(TrySendError::Closed(_)) => break,
        }

        id += 1;
    }
}
