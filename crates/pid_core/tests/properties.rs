use pid_core::{Controller, ControllerConfig, ManualClock};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Setter {
    /// `true` sets the lower bound.
    Bound(bool, f64),
    /// `true` sets the gain, `false` the proportional band.
    Proportional(bool, f64),
    ResetTime(f64),
    DerivativeTime(f64),
    Offset(f64),
    Suppression(f64),
    Setpoint(f64),
    Actual(f64),
    Update(u64),
    Reset,
}

fn setter() -> impl Strategy<Value = Setter> {
    prop_oneof![
        (any::<bool>(), -1e3f64..1e3).prop_map(|(lower, v)| Setter::Bound(lower, v)),
        (any::<bool>(), -10f64..500.0).prop_map(|(gain, v)| Setter::Proportional(gain, v)),
        (-5f64..600.0).prop_map(Setter::ResetTime),
        (-5f64..60.0).prop_map(Setter::DerivativeTime),
        (-50f64..50.0).prop_map(Setter::Offset),
        (-1f64..5.0).prop_map(Setter::Suppression),
        (-1e3f64..1e3).prop_map(Setter::Setpoint),
        (-1e3f64..1e3).prop_map(Setter::Actual),
        (0u64..5_000).prop_map(Setter::Update),
        Just(Setter::Reset),
    ]
}

fn apply(pid: &mut Controller<ManualClock>, clock: &ManualClock, op: &Setter) {
    // rejected calls are fine here; only the invariants matter
    match *op {
        Setter::Bound(lower, v) => {
            let _ = if lower { pid.set_min(v) } else { pid.set_max(v) };
        }
        Setter::Proportional(gain, v) => {
            let _ = if gain { pid.set_gain(v) } else { pid.set_proportional_band(v) };
        }
        Setter::ResetTime(v) => {
            let _ = pid.set_reset_time(v);
        }
        Setter::DerivativeTime(v) => {
            let _ = pid.set_derivative_time(v);
        }
        Setter::Offset(v) => {
            let _ = pid.set_offset(v);
        }
        Setter::Suppression(v) => {
            let _ = pid.set_suppression(v);
        }
        Setter::Setpoint(v) => {
            let _ = pid.set_setpoint(v);
        }
        Setter::Actual(v) => {
            pid.set_actual(v);
        }
        Setter::Update(ms) => {
            clock.advance(ms);
            pid.update();
        }
        Setter::Reset => pid.reset(),
    }
}

proptest! {
    #[test]
    fn invariants_survive_any_setter_sequence(
        use_band in any::<bool>(),
        ops in prop::collection::vec(setter(), 1..60),
    ) {
        let config = if use_band {
            ControllerConfig::with_proportional_band(40.0, 0.0, 100.0)
        } else {
            ControllerConfig::with_gain(2.5, 0.0, 100.0)
        };
        let clock = ManualClock::new(0);
        let mut pid = Controller::with_clock(config, clock.clone()).unwrap();

        for op in &ops {
            apply(&mut pid, &clock, op);

            let params = pid.params();
            prop_assert!(params.min < params.max);
            prop_assert!(params.gain > 0.0 && params.gain.is_finite());
            prop_assert!(params.proportional_band > 0.0 && params.proportional_band.is_finite());
            prop_assert_eq!(params.use_proportional_band, use_band);
            let span = params.max - params.min;
            prop_assert!((params.gain * params.proportional_band - span).abs() <= 1e-9 * span.max(1.0));
            prop_assert!(params.suppression >= 0.0);
        }
    }

    #[test]
    fn output_always_within_bounds(
        ops in prop::collection::vec(setter(), 1..60),
    ) {
        let config = ControllerConfig {
            reset_time: 30.0,
            derivative_time: 1.0,
            ..ControllerConfig::with_gain(4.0, -20.0, 80.0)
        };
        let clock = ManualClock::new(0);
        let mut pid = Controller::with_clock(config, clock.clone()).unwrap();

        for op in &ops {
            apply(&mut pid, &clock, op);
            let params = pid.params();
            let out = pid.update();
            prop_assert!(out.output >= params.min && out.output <= params.max);
            prop_assert_eq!(out.integral.is_some(), params.reset_time != 0.0);
            prop_assert_eq!(out.derivative.is_some(), params.derivative_time != 0.0);
            prop_assert!(out.elapsed_ms > 0.0);
        }
    }

    #[test]
    fn extreme_inputs_stay_within_bounds(
        inputs in prop::collection::vec((prop::num::f64::NORMAL, prop::num::f64::NORMAL), 1..20),
        on_actual in any::<bool>(),
    ) {
        let config = ControllerConfig {
            reset_time: 10.0,
            derivative_time: 2.0,
            derivative_on_actual_only: on_actual,
            ..ControllerConfig::with_gain(2.0, 0.0, 100.0)
        };
        let clock = ManualClock::new(0);
        let mut pid = Controller::with_clock(config, clock.clone()).unwrap();

        for &(setpoint, actual) in &inputs {
            pid.set_setpoint(setpoint).unwrap();
            pid.set_actual(actual);
            let out = pid.update();
            prop_assert!(out.output >= 0.0 && out.output <= 100.0);
            prop_assert!(!out.limited || out.output == 0.0 || out.output == 100.0);
            prop_assert!(out.error.is_finite());
            prop_assert!(out.integral.unwrap().is_finite());
            prop_assert!(out.derivative.unwrap().is_finite());
            clock.advance(100);
        }
    }

    #[test]
    fn gain_band_round_trip(
        kp in 0.01f64..1e3,
        min in -1e3f64..0.0,
        span in 0.1f64..1e3,
    ) {
        let config = ControllerConfig::with_gain(1.0, min, min + span);
        let mut pid = Controller::with_clock(config, ManualClock::new(0)).unwrap();

        pid.set_gain(kp).unwrap();
        let band = pid.proportional_band();
        pid.set_proportional_band(band).unwrap();
        prop_assert!((pid.gain() - kp).abs() <= 1e-9 * kp);
    }

    #[test]
    fn suppression_gate(
        start in -100f64..100.0,
        delta in -10f64..10.0,
        band in 0f64..5.0,
    ) {
        let mut pid = Controller::with_clock(
            ControllerConfig::with_gain(1.0, 0.0, 1.0),
            ManualClock::new(0),
        ).unwrap();
        pid.set_actual(start);
        let current = pid.actual();
        pid.set_suppression(band).unwrap();

        let target = current + delta;
        let accepted = pid.set_actual(target);
        prop_assert_eq!(accepted, (target - current).abs() >= band);
        prop_assert_eq!(pid.actual(), if accepted { target } else { current });
    }
}
