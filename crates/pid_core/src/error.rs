use thiserror::Error;

/// Invalid static tuning. Raised at construction or by the offending setter;
/// the controller is left exactly as it was.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("invalid output bounds: min {min} must be finite and less than max {max}")]
    InvalidBounds { min: f64, max: f64 },

    #[error("gain must be positive and finite, got {0}")]
    InvalidGain(f64),

    #[error("proportional band must be positive and finite, got {0}")]
    InvalidProportionalBand(f64),

    #[error("both gain and proportional band given; specify exactly one")]
    ConflictingProportional,

    #[error("neither gain nor proportional band given")]
    MissingProportional,

    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),
}

/// Out-of-domain value passed to a setter.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum InvalidInputError {
    #[error("{name} must be a finite number, got {value}")]
    NotFinite { name: &'static str, value: f64 },

    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },
}

impl InvalidInputError {
    pub(crate) fn check_finite(name: &'static str, value: f64) -> Result<f64, Self> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Self::NotFinite { name, value })
        }
    }

    pub(crate) fn check_non_negative(name: &'static str, value: f64) -> Result<f64, Self> {
        let value = Self::check_finite(name, value)?;
        if value < 0.0 {
            Err(Self::Negative { name, value })
        } else {
            Ok(value)
        }
    }
}

/// Failure to read a loop configuration file.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid controller tuning: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_and_nan_are_rejected() {
        assert_eq!(
            InvalidInputError::check_non_negative("suppression", -0.5),
            Err(InvalidInputError::Negative { name: "suppression", value: -0.5 })
        );
        assert!(matches!(
            InvalidInputError::check_non_negative("tn", f64::NAN),
            Err(InvalidInputError::NotFinite { name: "tn", .. })
        ));
        assert_eq!(InvalidInputError::check_non_negative("tv", 0.0), Ok(0.0));
    }

    #[test]
    fn messages_name_the_parameter() {
        let err = ConfigError::from(InvalidInputError::Negative { name: "reset_time", value: -1.0 });
        assert_eq!(err.to_string(), "reset_time must not be negative, got -1");
    }
}
