use thiserror::Error;

use crate::config::AreaType;

/// Client-input errors. Any of these rejects the whole request before the
/// optimizer runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("request contains no approaches")]
    NoApproaches,

    #[error("approach id must not be empty")]
    EmptyApproachId,

    #[error("duplicate approach id `{0}`")]
    DuplicateApproach(String),

    #[error("approach `{0}` is not one of the configured approaches")]
    UnknownApproach(String),

    #[error("approach `{approach}`: lanes must be within 1..=4, got {lanes}")]
    LanesOutOfRange { approach: String, lanes: u32 },

    #[error("approach `{approach}`: queue length must be a non-negative number, got {value}")]
    InvalidQueueLength { approach: String, value: f64 },

    #[error("approach `{approach}`: current green time must be positive, got {value}")]
    InvalidGreenTime { approach: String, value: f64 },

    #[error("cycle time must be a positive number, got {0}")]
    InvalidCycleTime(f64),
}

/// Policy configuration that cannot drive the optimizer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("no saturation flow configured for area type `{0}`")]
    MissingSaturationFlow(AreaType),

    #[error("min green time ({min}) exceeds max green time ({max})")]
    GreenBounds { min: f64, max: f64 },

    #[error("max green time ({max}) is below the largest pedestrian floor ({required})")]
    PedestrianCeiling { max: f64, required: f64 },

    #[error("saturation flow for `{area}` must be positive, got {value}")]
    SaturationFlow { area: AreaType, value: f64 },

    #[error("min cycle time ({min}) exceeds max cycle time ({max})")]
    CycleBounds { min: f64, max: f64 },

    #[error("{field} must be a non-negative number, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("spillback ratio must be within (0, 1], got {0}")]
    SpillbackRatio(f64),
}
