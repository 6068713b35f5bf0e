use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlantConfig {
    pub gain: f64,
    pub time_constant_secs: f64,
    pub ambient: f64,
    pub initial: f64,
    /// Amplitude of uniform measurement noise.
    pub noise: f64,
    pub seed: u64,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            gain: 1.0,
            time_constant_secs: 2.0,
            ambient: 0.0,
            initial: 0.0,
            noise: 0.0,
            seed: 42,
        }
    }
}

/// First-order lag process closing the loop in simulations:
/// the value relaxes towards `gain * input + ambient` with time constant `tau`.
#[derive(Debug)]
pub struct FirstOrderPlant {
    config: PlantConfig,
    value: f64,
    input: f64,
    rng: StdRng,
}

impl FirstOrderPlant {
    pub fn new(config: PlantConfig) -> Self {
        Self {
            value: config.initial,
            input: 0.0,
            rng: StdRng::seed_from_u64(config.seed),
            config,
        }
    }

    pub fn set_input(&mut self, input: f64) {
        self.input = input;
    }

    pub fn step(&mut self, dt_secs: f64) -> f64 {
        let target = self.config.gain * self.input + self.config.ambient;
        let tau = self.config.time_constant_secs.max(f64::EPSILON);
        let alpha = (dt_secs / tau).min(1.0);
        self.value += (target - self.value) * alpha;
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Current value as seen by a noisy sensor.
    pub fn measure(&mut self) -> f64 {
        let amplitude = self.config.noise;
        if amplitude > 0.0 {
            self.value + self.rng.gen_range(-amplitude..amplitude)
        } else {
            self.value
        }
    }
}
