use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pid_core::{
    Clock, ControlStation, CycleRecord, CycleRecorder, LoopConfig, LoopDiagnostics, Measurement,
    StationOutput, SystemClock,
};

/// Longest blocking wait, so the shutdown flag is polled even on long cycles.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Runs the controller: gates measurements through the suppression band and
/// ticks the station either on the cycle or on every accepted input.
pub fn run_actuator_thread(
    config: LoopConfig,
    mut station: ControlStation<SystemClock>,
    receiver: Receiver<Measurement>,
    output_tx: SyncSender<f64>,
    recorder: CycleRecorder,
    diagnostics: Arc<LoopDiagnostics>,
    shutdown_flag: Arc<AtomicBool>,
) {
    let cycle = config.cycle();
    let mode = config.mode();
    let name = station.name().to_string();
    let mut cycle_id = 0u64;
    let mut next_tick = Instant::now();

    let mut emit = |out: StationOutput| {
        if let Some(value) = out.value() {
            if output_tx.try_send(value).is_err() {
                diagnostics.record_dropped_output();
            }
        }
        if let StationOutput::Auto(control) = &out {
            if control.limited {
                tracing::debug!(station = %name, cycle_id, output = control.output, "output limited");
            }
        }
        recorder.record(CycleRecord::from_output(cycle_id, mode, SystemClock.now_ms(), &out));
        cycle_id += 1;
    };

    while !shutdown_flag.load(Ordering::Relaxed) {
        let wait = match cycle {
            Some(_) => next_tick.saturating_duration_since(Instant::now()).min(SHUTDOWN_POLL),
            None => SHUTDOWN_POLL,
        };

        match receiver.recv_timeout(wait) {
            Ok(measurement) => {
                let accepted = station.controller_mut().set_actual(measurement.value);
                diagnostics.record_input(accepted);
                if accepted && cycle.is_none() {
                    if let Some(out) = station.tick() {
                        emit(out);
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(period) = cycle {
            if Instant::now() >= next_tick {
                next_tick += period;
                if let Some(out) = station.tick() {
                    emit(out);
                }
            }
        }
    }
}
