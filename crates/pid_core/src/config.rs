use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::{ConfigError, LoadError};
use crate::pid::{Controller, ControllerConfig};
use crate::plant::PlantConfig;
use crate::station::ControlStation;

pub const MIN_CYCLE_MS: u64 = 100;
pub const MAX_CYCLE_MS: u64 = 3600 * 1000;

#[derive(Debug, Deserialize, Clone)]
pub struct LoopConfig {
    pub experiment_name: String,
    pub duration_ms: u64,
    /// Update period; absent means event-driven (update on every accepted input).
    #[serde(default)]
    pub cycle_ms: Option<u64>,
    #[serde(default = "default_plant_period_ms")]
    pub plant_period_ms: u64,
    #[serde(default)]
    pub setpoint: f64,
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
    #[serde(default)]
    pub log_calc: bool,
    pub controller: ControllerConfig,
    #[serde(default)]
    pub plant: PlantConfig,
}

fn default_plant_period_ms() -> u64 {
    20
}

fn default_auto_start() -> bool {
    true
}

pub fn load_config(path: &str) -> Result<LoopConfig, LoadError> {
    let content = fs::read_to_string(path)?;
    let config: LoopConfig = toml::from_str(&content)?;
    // surface bad tuning at load time rather than at loop start
    Controller::new(config.controller)?;
    Ok(config.validated())
}

impl LoopConfig {
    pub fn from_file(path: &str) -> Result<Self, LoadError> {
        load_config(path)
    }

    /// Clamps the cycle time into `[MIN_CYCLE_MS, MAX_CYCLE_MS]`.
    pub fn validated(mut self) -> Self {
        if let Some(cycle) = self.cycle_ms {
            if cycle < MIN_CYCLE_MS {
                tracing::warn!(experiment = %self.experiment_name, cycle, "invalid cycle time, set to 100ms");
                self.cycle_ms = Some(MIN_CYCLE_MS);
            } else if cycle > MAX_CYCLE_MS {
                tracing::warn!(experiment = %self.experiment_name, cycle, "invalid cycle time, set to 3600s");
                self.cycle_ms = Some(MAX_CYCLE_MS);
            }
        }
        self
    }

    pub fn cycle(&self) -> Option<Duration> {
        self.cycle_ms.map(Duration::from_millis)
    }

    pub fn mode(&self) -> &'static str {
        if self.cycle_ms.is_some() {
            "periodic"
        } else {
            "event"
        }
    }

    pub fn build_controller<C: Clock>(&self, clock: C) -> Result<Controller<C>, ConfigError> {
        let mut controller = Controller::with_clock(self.controller, clock)?;
        controller.set_setpoint(self.setpoint)?;
        Ok(controller)
    }

    pub fn build_station<C: Clock>(&self, clock: C) -> Result<ControlStation<C>, ConfigError> {
        let controller = self.build_controller(clock)?;
        let station = ControlStation::new(self.experiment_name.clone(), controller, self.auto_start)
            .with_log_calc(self.log_calc);
        tracing::info!(station = station.name(), params = ?station.controller().params(), "controller initialized");
        Ok(station)
    }
}
