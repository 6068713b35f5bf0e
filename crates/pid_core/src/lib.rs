pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod metrics;
pub mod pid;
pub mod plant;
pub mod station;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, LoopConfig};
pub use diagnostics::LoopDiagnostics;
pub use error::{ConfigError, InvalidInputError, LoadError};
pub use metrics::{CycleRecord, CycleRecorder};
pub use pid::{ControlOutput, Controller, ControllerConfig, ControllerParams, FALLBACK_DT_SECS};
pub use plant::{FirstOrderPlant, PlantConfig};
pub use station::{ControlStation, StationOutput};

/// One reading from the simulated sensor.
#[derive(Debug, Clone, Copy)]
pub struct Measurement {
    pub id: u64,
    pub timestamp_ms: u64,
    pub value: f64,
}
