use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use pid_core::{
    Clock, ControlStation, CycleRecord, CycleRecorder, LoopConfig, LoopDiagnostics, Measurement,
    StationOutput, SystemClock,
};

const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

struct Emitter {
    name: String,
    mode: &'static str,
    cycle_id: u64,
    output_tx: mpsc::Sender<f64>,
    recorder: CycleRecorder,
    diagnostics: Arc<LoopDiagnostics>,
}

impl Emitter {
    fn emit(&mut self, out: StationOutput) {
        if let Some(value) = out.value() {
            if self.output_tx.try_send(value).is_err() {
                self.diagnostics.record_dropped_output();
            }
        }
        if let StationOutput::Auto(control) = &out {
            if control.limited {
                tracing::debug!(station = %self.name, cycle_id = self.cycle_id, output = control.output, "output limited");
            }
        }
        self.recorder
            .record(CycleRecord::from_output(self.cycle_id, self.mode, SystemClock.now_ms(), &out));
        self.cycle_id += 1;
    }
}

/// Async counterpart of the threaded actuator loop. A periodic interval and
/// the measurement channel are raced with `select!`; in event-driven mode
/// only accepted measurements trigger an update.
pub async fn run_actuator_task(
    config: LoopConfig,
    mut station: ControlStation<SystemClock>,
    mut receiver: mpsc::Receiver<Measurement>,
    output_tx: mpsc::Sender<f64>,
    recorder: CycleRecorder,
    diagnostics: Arc<LoopDiagnostics>,
    shutdown: Arc<AtomicBool>,
) {
    let event_driven = config.cycle().is_none();
    let mut ticker = interval(config.cycle().unwrap_or(SHUTDOWN_POLL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown_poll = interval(SHUTDOWN_POLL);

    let mut emitter = Emitter {
        name: station.name().to_string(),
        mode: config.mode(),
        cycle_id: 0,
        output_tx,
        recorder,
        diagnostics: Arc::clone(&diagnostics),
    };

    while !shutdown.load(Ordering::Relaxed) {
        tokio::select! {
            _ = ticker.tick(), if !event_driven => {
                if let Some(out) = station.tick() {
                    emitter.emit(out);
                }
            }
            received = receiver.recv() => {
                let Some(measurement) = received else { break };
                let accepted = station.controller_mut().set_actual(measurement.value);
                diagnostics.record_input(accepted);
                if accepted && event_driven {
                    if let Some(out) = station.tick() {
                        emitter.emit(out);
                    }
                }
            }
            _ = shutdown_poll.tick() => {}
        }
    }
}
