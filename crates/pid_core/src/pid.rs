//! PID controller with gain / proportional-band duality, back-calculating
//! anti-windup and an input suppression gate.

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::{ConfigError, InvalidInputError};

/// Δt used when no real interval is available: on the first `update()` after
/// construction, `reset()` or `restart()`, and when the clock reports no
/// progress since the previous call. It is a fixed stand-in, not a measurement.
pub const FALLBACK_DT_SECS: f64 = 1.0;

/// The authoritative half of the gain / proportional-band pair. The other half
/// is always derived from it and the current output span.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Proportional {
    Gain(f64),
    Band(f64),
}

impl Proportional {
    fn gain(self, span: f64) -> f64 {
        match self {
            Proportional::Gain(kp) => kp,
            Proportional::Band(xp) => span / xp,
        }
    }

    fn band(self, span: f64) -> f64 {
        match self {
            Proportional::Gain(kp) => span / kp,
            Proportional::Band(xp) => xp,
        }
    }
}

fn default_min() -> f64 {
    0.0
}

fn default_max() -> f64 {
    100.0
}

/// Construction input. Exactly one of `gain` / `proportional_band` must be set;
/// the one given stays authoritative for the controller's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub gain: Option<f64>,
    #[serde(default)]
    pub proportional_band: Option<f64>,
    #[serde(default = "default_min")]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
    /// Integral time constant in seconds, 0 disables the integral term.
    #[serde(default)]
    pub reset_time: f64,
    /// Derivative time constant in seconds, 0 disables the derivative term.
    #[serde(default)]
    pub derivative_time: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub suppression: f64,
    #[serde(default)]
    pub derivative_on_actual_only: bool,
    #[serde(default)]
    pub invert: bool,
}

impl ControllerConfig {
    pub fn with_gain(gain: f64, min: f64, max: f64) -> Self {
        Self {
            gain: Some(gain),
            ..Self::bare(min, max)
        }
    }

    pub fn with_proportional_band(proportional_band: f64, min: f64, max: f64) -> Self {
        Self {
            proportional_band: Some(proportional_band),
            ..Self::bare(min, max)
        }
    }

    fn bare(min: f64, max: f64) -> Self {
        Self {
            gain: None,
            proportional_band: None,
            min,
            max,
            reset_time: 0.0,
            derivative_time: 0.0,
            offset: 0.0,
            suppression: 0.0,
            derivative_on_actual_only: false,
            invert: false,
        }
    }
}

/// Snapshot of the current tuning, returned by value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerParams {
    pub min: f64,
    pub max: f64,
    pub gain: f64,
    pub proportional_band: f64,
    pub use_proportional_band: bool,
    pub reset_time: f64,
    pub derivative_time: f64,
    pub offset: f64,
    pub suppression: f64,
    pub derivative_on_actual_only: bool,
    pub invert: bool,
}

/// Result of one `update()`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlOutput {
    pub timestamp_ms: u64,
    pub setpoint: f64,
    pub actual: f64,
    pub offset: f64,
    pub output: f64,
    pub error: f64,
    pub limited: bool,
    pub suppressed: bool,
    pub elapsed_ms: f64,
    /// Accumulated error·seconds after clamping; `None` while `reset_time` is 0.
    pub integral: Option<f64>,
    /// Rate of change feeding the derivative term; `None` while `derivative_time` is 0.
    pub derivative: Option<f64>,
}

/// Single-loop PID controller. Not `Sync`-safe by contract: callers serialize
/// access to an instance (wrap it in a `Mutex` to share it).
#[derive(Debug)]
pub struct Controller<C: Clock = SystemClock> {
    clock: C,

    min: f64,
    max: f64,
    proportional: Proportional,
    reset_time: f64,
    derivative_time: f64,
    offset: f64,
    suppression: f64,
    derivative_on_actual_only: bool,
    invert: bool,

    setpoint: f64,
    actual: f64,
    last_actual: f64,
    last_error: f64,
    integral: Option<f64>,
    last_timestamp: Option<u64>,
    limited: bool,
    suppressed: bool,
}

impl Controller<SystemClock> {
    pub fn new(config: ControllerConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Controller<C> {
    pub fn with_clock(config: ControllerConfig, clock: C) -> Result<Self, ConfigError> {
        check_bounds(config.min, config.max)?;
        let span = config.max - config.min;

        let proportional = match (config.gain, config.proportional_band) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingProportional),
            (None, None) => return Err(ConfigError::MissingProportional),
            (Some(kp), None) => Proportional::Gain(check_gain(kp, span)?),
            (None, Some(xp)) => Proportional::Band(check_band(xp, span)?),
        };

        let reset_time = InvalidInputError::check_non_negative("reset_time", config.reset_time)?;
        let derivative_time =
            InvalidInputError::check_non_negative("derivative_time", config.derivative_time)?;
        let suppression = InvalidInputError::check_non_negative("suppression", config.suppression)?;
        let offset = InvalidInputError::check_finite("offset", config.offset)?;

        Ok(Self {
            clock,
            min: config.min,
            max: config.max,
            proportional,
            reset_time,
            derivative_time,
            offset,
            suppression,
            derivative_on_actual_only: config.derivative_on_actual_only,
            invert: config.invert,
            setpoint: 0.0,
            actual: 0.0,
            last_actual: 0.0,
            last_error: 0.0,
            integral: (reset_time != 0.0).then_some(0.0),
            last_timestamp: None,
            limited: false,
            suppressed: false,
        })
    }

    /// Hysteresis gate. The actual value only moves when it differs from the
    /// current one by at least `suppression`; returns whether it moved.
    pub fn set_actual(&mut self, value: f64) -> bool {
        let accepted = value.is_finite() && (value - self.actual).abs() >= self.suppression;
        if accepted {
            self.actual = value;
        } else {
            tracing::trace!(value, actual = self.actual, "actual value suppressed");
        }
        self.suppressed = !accepted;
        accepted
    }

    pub fn set_setpoint(&mut self, value: f64) -> Result<(), InvalidInputError> {
        self.setpoint = InvalidInputError::check_finite("setpoint", value)?;
        Ok(())
    }

    pub fn set_offset(&mut self, value: f64) -> Result<(), InvalidInputError> {
        self.offset = InvalidInputError::check_finite("offset", value)?;
        Ok(())
    }

    pub fn set_suppression(&mut self, value: f64) -> Result<(), InvalidInputError> {
        self.suppression = InvalidInputError::check_non_negative("suppression", value)?;
        Ok(())
    }

    /// Sets the gain. In band mode the band is re-derived so that the
    /// effective gain becomes `kp`.
    pub fn set_gain(&mut self, kp: f64) -> Result<(), ConfigError> {
        let span = self.span();
        let kp = check_gain(kp, span)?;
        self.proportional = match self.proportional {
            Proportional::Gain(_) => Proportional::Gain(kp),
            Proportional::Band(_) => Proportional::Band(check_band(span / kp, span)?),
        };
        Ok(())
    }

    /// Sets the proportional band. In gain mode the gain is re-derived so that
    /// the effective band becomes `xp`.
    pub fn set_proportional_band(&mut self, xp: f64) -> Result<(), ConfigError> {
        let span = self.span();
        let xp = check_band(xp, span)?;
        self.proportional = match self.proportional {
            Proportional::Band(_) => Proportional::Band(xp),
            Proportional::Gain(_) => Proportional::Gain(check_gain(span / xp, span)?),
        };
        Ok(())
    }

    pub fn set_min(&mut self, min: f64) -> Result<(), ConfigError> {
        self.set_bounds(min, self.max)
    }

    pub fn set_max(&mut self, max: f64) -> Result<(), ConfigError> {
        self.set_bounds(self.min, max)
    }

    fn set_bounds(&mut self, min: f64, max: f64) -> Result<(), ConfigError> {
        check_bounds(min, max)?;
        // the derived half must stay positive and finite under the new span
        let span = max - min;
        match self.proportional {
            Proportional::Gain(kp) => {
                check_band(span / kp, span)?;
            }
            Proportional::Band(xp) => {
                check_gain(span / xp, span)?;
            }
        }
        self.min = min;
        self.max = max;
        Ok(())
    }

    /// Setting 0 drops the integral term entirely; setting a non-zero value
    /// after 0 starts it from an empty accumulator.
    pub fn set_reset_time(&mut self, tn: f64) -> Result<(), InvalidInputError> {
        let tn = InvalidInputError::check_non_negative("reset_time", tn)?;
        self.reset_time = tn;
        self.integral = match (tn != 0.0, self.integral) {
            (false, _) => None,
            (true, Some(sum)) => Some(sum),
            (true, None) => Some(0.0),
        };
        Ok(())
    }

    pub fn set_derivative_time(&mut self, tv: f64) -> Result<(), InvalidInputError> {
        self.derivative_time = InvalidInputError::check_non_negative("derivative_time", tv)?;
        Ok(())
    }

    pub fn set_invert(&mut self, invert: bool) {
        self.invert = invert;
    }

    pub fn update(&mut self) -> ControlOutput {
        let now = self.clock.now_ms();
        let dt = self.elapsed_secs(now);

        // finite inputs can still overflow; every stored term stays finite
        let error = saturate(if self.invert {
            self.actual - self.setpoint
        } else {
            self.setpoint - self.actual
        });

        if let Some(sum) = self.integral.as_mut() {
            *sum = saturate(*sum + error * dt);
        }

        let derivative = (self.derivative_time != 0.0).then(|| {
            saturate(if self.derivative_on_actual_only {
                (self.actual - self.last_actual) / dt
            } else {
                (error - self.last_error) / dt
            })
        });

        let gain = self.gain();
        let mut y = gain * error;
        if let Some(sum) = self.integral {
            y += gain * sum / self.reset_time;
        }
        if let Some(rate) = derivative {
            y += gain * self.derivative_time * rate;
        }
        y += self.offset;
        if y.is_nan() {
            // opposing infinite terms; fall back on the direction of the error
            y = if error >= 0.0 { f64::INFINITY } else { f64::NEG_INFINITY };
        }

        let bound = if y > self.max {
            Some(self.max)
        } else if y < self.min {
            Some(self.min)
        } else {
            None
        };

        self.limited = bound.is_some();
        if let Some(bound) = bound {
            // back-calculate so the unclamped formula lands exactly on the bound
            if let Some(sum) = self.integral.as_mut() {
                let rate = derivative.unwrap_or(0.0);
                *sum = saturate(
                    self.reset_time * ((bound - self.offset) / gain - error - self.derivative_time * rate),
                );
            }
            y = bound;
        }

        self.last_timestamp = Some(now);
        self.last_actual = self.actual;
        self.last_error = error;

        ControlOutput {
            timestamp_ms: now,
            setpoint: self.setpoint,
            actual: self.actual,
            offset: self.offset,
            output: y,
            error,
            limited: self.limited,
            suppressed: self.suppressed,
            elapsed_ms: dt * 1000.0,
            integral: self.integral,
            derivative,
        }
    }

    /// Clears integral history and derivative tracking. Tuning, setpoint and
    /// actual value are untouched.
    pub fn reset(&mut self) {
        self.integral = (self.reset_time != 0.0).then_some(0.0);
        self.last_error = 0.0;
        self.last_actual = 0.0;
        self.last_timestamp = None;
        self.limited = false;
    }

    /// Forgets only the previous timestamp, so a loop resuming after a pause
    /// does not see the pause as one huge Δt.
    pub fn restart(&mut self) {
        self.last_timestamp = None;
    }

    pub fn params(&self) -> ControllerParams {
        let span = self.span();
        ControllerParams {
            min: self.min,
            max: self.max,
            gain: self.proportional.gain(span),
            proportional_band: self.proportional.band(span),
            use_proportional_band: matches!(self.proportional, Proportional::Band(_)),
            reset_time: self.reset_time,
            derivative_time: self.derivative_time,
            offset: self.offset,
            suppression: self.suppression,
            derivative_on_actual_only: self.derivative_on_actual_only,
            invert: self.invert,
        }
    }

    pub fn gain(&self) -> f64 {
        self.proportional.gain(self.span())
    }

    pub fn proportional_band(&self) -> f64 {
        self.proportional.band(self.span())
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn actual(&self) -> f64 {
        self.actual
    }

    pub fn is_limited(&self) -> bool {
        self.limited
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    fn span(&self) -> f64 {
        self.max - self.min
    }

    fn elapsed_secs(&self, now: u64) -> f64 {
        match self.last_timestamp {
            None => FALLBACK_DT_SECS,
            Some(last) => match now.saturating_sub(last) {
                0 => FALLBACK_DT_SECS,
                ms => ms as f64 / 1000.0,
            },
        }
    }
}

/// Pulls an overflowed value back to the largest finite magnitude. NaN maps
/// to 0.
fn saturate(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(f64::MIN, f64::MAX)
    }
}

fn check_bounds(min: f64, max: f64) -> Result<(), ConfigError> {
    if min.is_finite() && max.is_finite() && min < max {
        Ok(())
    } else {
        Err(ConfigError::InvalidBounds { min, max })
    }
}

// `span / value` must also be positive and finite, otherwise the derived half
// of the pair would break the duality.
fn check_gain(kp: f64, span: f64) -> Result<f64, ConfigError> {
    if kp.is_finite() && kp > 0.0 && (span / kp).is_finite() && span / kp > 0.0 {
        Ok(kp)
    } else {
        Err(ConfigError::InvalidGain(kp))
    }
}

fn check_band(xp: f64, span: f64) -> Result<f64, ConfigError> {
    if xp.is_finite() && xp > 0.0 && (span / xp).is_finite() && span / xp > 0.0 {
        Ok(xp)
    } else {
        Err(ConfigError::InvalidProportionalBand(xp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn controller(config: ControllerConfig) -> Controller<ManualClock> {
        Controller::with_clock(config, ManualClock::new(10_000)).unwrap()
    }

    #[test]
    fn gain_mode_derives_band_from_span() {
        let pid = controller(ControllerConfig::with_gain(2.0, 0.0, 100.0));
        let params = pid.params();
        assert_eq!(params.gain, 2.0);
        assert_eq!(params.proportional_band, 50.0);
        assert!(!params.use_proportional_band);
    }

    #[test]
    fn band_mode_derives_gain_from_span() {
        let pid = controller(ControllerConfig::with_proportional_band(25.0, 0.0, 100.0));
        assert_eq!(pid.gain(), 4.0);
        assert!(pid.params().use_proportional_band);
    }

    #[test]
    fn bound_change_keeps_authoritative_half() {
        let mut by_gain = controller(ControllerConfig::with_gain(2.0, 0.0, 100.0));
        by_gain.set_max(200.0).unwrap();
        assert_eq!(by_gain.gain(), 2.0);
        assert_eq!(by_gain.proportional_band(), 100.0);

        let mut by_band = controller(ControllerConfig::with_proportional_band(50.0, 0.0, 100.0));
        by_band.set_min(-100.0).unwrap();
        assert_eq!(by_band.proportional_band(), 50.0);
        assert_eq!(by_band.gain(), 4.0);
    }

    #[test]
    fn set_gain_in_band_mode_stays_in_band_mode() {
        let mut pid = controller(ControllerConfig::with_proportional_band(50.0, 0.0, 100.0));
        pid.set_gain(5.0).unwrap();
        let params = pid.params();
        assert!(params.use_proportional_band);
        assert!((params.gain - 5.0).abs() < 1e-12);
        assert!((params.proportional_band - 20.0).abs() < 1e-12);
    }

    #[test]
    fn rejected_bound_leaves_controller_untouched() {
        let mut pid = controller(ControllerConfig::with_gain(2.0, 0.0, 100.0));
        assert_eq!(
            pid.set_min(100.0),
            Err(ConfigError::InvalidBounds { min: 100.0, max: 100.0 })
        );
        assert!(pid.set_max(-5.0).is_err());
        assert!(pid.set_max(f64::INFINITY).is_err());
        let params = pid.params();
        assert_eq!((params.min, params.max), (0.0, 100.0));
    }

    #[test]
    fn construction_rejects_bad_proportional_setup() {
        let both = ControllerConfig {
            proportional_band: Some(10.0),
            ..ControllerConfig::with_gain(1.0, 0.0, 100.0)
        };
        assert_eq!(
            Controller::new(both).unwrap_err(),
            ConfigError::ConflictingProportional
        );

        let neither = ControllerConfig {
            gain: None,
            ..ControllerConfig::with_gain(1.0, 0.0, 100.0)
        };
        assert_eq!(Controller::new(neither).unwrap_err(), ConfigError::MissingProportional);

        assert_eq!(
            Controller::new(ControllerConfig::with_gain(0.0, 0.0, 100.0)).unwrap_err(),
            ConfigError::InvalidGain(0.0)
        );
        assert_eq!(
            Controller::new(ControllerConfig::with_proportional_band(-1.0, 0.0, 100.0)).unwrap_err(),
            ConfigError::InvalidProportionalBand(-1.0)
        );
        assert!(matches!(
            Controller::new(ControllerConfig::with_gain(1.0, 5.0, 5.0)),
            Err(ConfigError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn construction_rejects_negative_time_constants() {
        let config = ControllerConfig {
            reset_time: -3.0,
            ..ControllerConfig::with_gain(1.0, 0.0, 100.0)
        };
        assert_eq!(
            Controller::new(config).unwrap_err(),
            ConfigError::InvalidInput(InvalidInputError::Negative { name: "reset_time", value: -3.0 })
        );
    }

    #[test]
    fn integral_presence_follows_reset_time() {
        let mut pid = controller(ControllerConfig::with_gain(1.0, -100.0, 100.0));
        pid.set_setpoint(1.0).unwrap();
        assert_eq!(pid.update().integral, None);

        pid.set_reset_time(10.0).unwrap();
        assert!(pid.update().integral.is_some());

        pid.set_reset_time(0.0).unwrap();
        assert_eq!(pid.update().integral, None);
    }

    #[test]
    fn zero_clock_progress_uses_fallback_dt() {
        let clock = ManualClock::new(5_000);
        let mut pid = Controller::with_clock(ControllerConfig::with_gain(1.0, 0.0, 100.0), clock.clone()).unwrap();
        assert_eq!(pid.update().elapsed_ms, 1000.0);
        assert_eq!(pid.update().elapsed_ms, 1000.0);
        clock.advance(250);
        assert_eq!(pid.update().elapsed_ms, 250.0);
        // a clock stepping backwards is treated like no progress
        clock.set(1_000);
        assert_eq!(pid.update().elapsed_ms, 1000.0);
    }

    #[test]
    fn restart_forgets_time_but_keeps_integral() {
        let clock = ManualClock::new(0);
        let config = ControllerConfig {
            reset_time: 10.0,
            ..ControllerConfig::with_gain(1.0, -100.0, 100.0)
        };
        let mut pid = Controller::with_clock(config, clock.clone()).unwrap();
        pid.set_setpoint(2.0).unwrap();
        assert_eq!(pid.update().integral, Some(2.0));

        clock.advance(60_000);
        pid.restart();
        let out = pid.update();
        assert_eq!(out.elapsed_ms, 1000.0);
        assert_eq!(out.integral, Some(4.0));
    }

    #[test]
    fn invert_flips_error_sign() {
        let mut pid = controller(ControllerConfig {
            invert: true,
            ..ControllerConfig::with_gain(2.0, 0.0, 100.0)
        });
        pid.set_setpoint(20.0).unwrap();
        pid.set_actual(30.0);
        let out = pid.update();
        assert_eq!(out.error, 10.0);
        assert_eq!(out.output, 20.0);
    }

    #[test]
    fn params_snapshot_is_detached() {
        let mut pid = controller(ControllerConfig::with_gain(2.0, 0.0, 100.0));
        let mut snapshot = pid.params();
        snapshot.gain = 99.0;
        snapshot.max = -1.0;
        assert_eq!(pid.gain(), 2.0);
        pid.set_offset(3.0).unwrap();
        assert_eq!(snapshot.offset, 0.0);
        assert_eq!(pid.params().offset, 3.0);
    }
}
