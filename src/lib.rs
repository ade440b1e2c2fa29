//! Traffic signal timing advisory.
//!
//! Turns per-approach demand (vehicle counts, queues, pedestrians, congestion)
//! into bounded green-time recommendations for one intersection cycle.

pub mod advisor;
pub mod calculator;
pub mod config;
pub mod error;
pub mod format;
pub mod metrics;
pub mod optimizer;
pub mod server;

pub use advisor::{AdviseRequest, Advisory, TrafficAdvisor};
pub use calculator::{SignalTiming, TrafficCalculator};
pub use config::{AreaType, PolicyConfig};
pub use error::{PolicyError, ValidationError};
pub use metrics::{ApproachData, CongestionLevel, TrafficMetrics, VehicleCounts};
pub use optimizer::{Analysis, Optimization, SignalOptimizer};
