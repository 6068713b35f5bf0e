//! Run / hold / manual supervision around a [`Controller`].
//!
//! The loop is running only while it is neither held nor in manual mode. In
//! manual mode the operator's value is passed through as the output and the
//! controller is not updated.

use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::pid::{ControlOutput, Controller};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum StationOutput {
    Auto(ControlOutput),
    Manual(Option<f64>),
}

impl StationOutput {
    pub fn value(&self) -> Option<f64> {
        match self {
            StationOutput::Auto(out) => Some(out.output),
            StationOutput::Manual(value) => *value,
        }
    }
}

#[derive(Debug)]
pub struct ControlStation<C: Clock = SystemClock> {
    name: String,
    controller: Controller<C>,
    hold: bool,
    manual: bool,
    manual_value: Option<f64>,
    log_calc: bool,
}

impl<C: Clock> ControlStation<C> {
    /// Starts held unless `auto_start` is set.
    pub fn new(name: impl Into<String>, controller: Controller<C>, auto_start: bool) -> Self {
        Self {
            name: name.into(),
            controller,
            hold: !auto_start,
            manual: false,
            manual_value: None,
            log_calc: false,
        }
    }

    /// Log every update at info instead of debug.
    pub fn with_log_calc(mut self, log_calc: bool) -> Self {
        self.log_calc = log_calc;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        !(self.hold || self.manual)
    }

    pub fn is_held(&self) -> bool {
        self.hold
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }

    pub fn controller(&self) -> &Controller<C> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller<C> {
        &mut self.controller
    }

    /// One cadence step. `None` while held.
    pub fn tick(&mut self) -> Option<StationOutput> {
        if self.manual {
            return Some(StationOutput::Manual(self.manual_value));
        }
        if self.hold {
            return None;
        }

        let out = self.controller.update();
        if self.log_calc {
            tracing::info!(station = %self.name, ?out, "update");
        } else {
            tracing::debug!(station = %self.name, ?out, "update");
        }
        Some(StationOutput::Auto(out))
    }

    /// Returns the immediate output when this resumes the loop.
    pub fn set_hold(&mut self, hold: bool) -> Option<StationOutput> {
        let was_running = self.is_running();
        self.hold = hold;
        self.apply_transition(was_running)
    }

    /// Entering manual yields the manual value right away; leaving it resumes
    /// the loop (unless held) with an immediate update.
    pub fn set_manual(&mut self, manual: bool) -> Option<StationOutput> {
        let was_running = self.is_running();
        self.manual = manual;
        if manual {
            self.apply_transition(was_running);
            tracing::debug!(station = %self.name, value = ?self.manual_value, "manual value used as output");
            return Some(StationOutput::Manual(self.manual_value));
        }
        self.apply_transition(was_running)
    }

    pub fn set_manual_value(&mut self, value: f64) -> Option<StationOutput> {
        self.manual_value = Some(value);
        self.manual.then_some(StationOutput::Manual(self.manual_value))
    }

    pub fn reset(&mut self) {
        tracing::debug!(station = %self.name, "controller reset");
        self.controller.reset();
    }

    fn apply_transition(&mut self, was_running: bool) -> Option<StationOutput> {
        match (was_running, self.is_running()) {
            (false, true) => {
                tracing::info!(station = %self.name, "controller starting");
                self.controller.restart();
                self.tick()
            }
            (true, false) => {
                tracing::info!(station = %self.name, "controller stopped");
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::pid::ControllerConfig;

    fn station(auto_start: bool) -> (ControlStation<ManualClock>, ManualClock) {
        let clock = ManualClock::new(0);
        let config = ControllerConfig {
            reset_time: 5.0,
            ..ControllerConfig::with_gain(2.0, 0.0, 100.0)
        };
        let mut controller = Controller::with_clock(config, clock.clone()).unwrap();
        controller.set_setpoint(50.0).unwrap();
        controller.set_actual(40.0);
        (ControlStation::new("C-1", controller, auto_start), clock)
    }

    #[test]
    fn held_station_produces_nothing() {
        let (mut station, _) = station(false);
        assert!(station.is_held());
        assert!(!station.is_running());
        assert_eq!(station.tick(), None);
    }

    #[test]
    fn releasing_hold_updates_immediately_with_fresh_dt() {
        let (mut station, clock) = station(true);
        station.tick();
        station.set_hold(true);
        clock.advance(3_600_000);

        match station.set_hold(false) {
            Some(StationOutput::Auto(out)) => assert_eq!(out.elapsed_ms, 1000.0),
            other => panic!("expected an immediate update, got {other:?}"),
        }
    }

    #[test]
    fn manual_mode_passes_operator_value_through() {
        let (mut station, _) = station(true);
        assert_eq!(station.set_manual_value(12.5), None);
        assert_eq!(station.set_manual(true), Some(StationOutput::Manual(Some(12.5))));
        assert_eq!(station.tick().and_then(|o| o.value()), Some(12.5));
        assert_eq!(station.set_manual_value(7.0), Some(StationOutput::Manual(Some(7.0))));

        let resumed = station.set_manual(false);
        assert!(matches!(resumed, Some(StationOutput::Auto(_))));
    }

    #[test]
    fn leaving_manual_while_held_stays_quiet() {
        let (mut station, _) = station(false);
        station.set_manual(true);
        assert_eq!(station.set_manual(false), None);
        assert_eq!(station.tick(), None);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn transitions_logged_at_info_without_log_calc() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let (mut station, _) = station(false);
            station.set_hold(false);
            station.set_hold(true);
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("controller starting"), "{logs}");
        assert!(logs.contains("controller stopped"), "{logs}");
        assert_eq!(logs.lines().count(), 2, "per-update line stays at debug: {logs}");
    }
}
