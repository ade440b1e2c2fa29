use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use crate::config::PolicyConfig;
use crate::error::ValidationError;

/// Vehicle class -> observed count. Ordered so PCU sums are reproducible.
pub type VehicleCounts = BTreeMap<String, u32>;

pub const MAX_LANES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionLevel {
    Free,
    Stable,
    Congested,
    SeverelyCongested,
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CongestionLevel::Free => "free",
            CongestionLevel::Stable => "stable",
            CongestionLevel::Congested => "congested",
            CongestionLevel::SeverelyCongested => "severely_congested",
        };
        f.write_str(s)
    }
}

/// One approach as reported by the metrics producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproachData {
    pub approach_id: String,
    pub vehicle_counts: VehicleCounts,
    pub queue_length: f64,
    pub lanes: u32,
    pub congestion_level: CongestionLevel,
    pub pedestrian_count: u32,
    pub current_green_time: f64,
    #[serde(default)]
    pub link_length: Option<f64>,
}

/// Validated demand for one approach.
///
/// Immutable once built. Derived quantities (`demand_pcu`, `density`,
/// `congestion_factor`, `spillback_risk`) are recomputed from the stored
/// fields on every call and never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficMetrics {
    approach_id: String,
    vehicle_counts: VehicleCounts,
    queue_length: f64,
    lanes: u32,
    congestion_level: CongestionLevel,
    pedestrian_count: u32,
    current_green_time: f64,
    link_length: Option<f64>,
}

impl TryFrom<ApproachData> for TrafficMetrics {
    type Error = ValidationError;

    fn try_from(data: ApproachData) -> Result<Self, Self::Error> {
        if data.approach_id.trim().is_empty() {
            return Err(ValidationError::EmptyApproachId);
        }
        if !(1..=MAX_LANES).contains(&data.lanes) {
            return Err(ValidationError::LanesOutOfRange {
                approach: data.approach_id,
                lanes: data.lanes,
            });
        }
        if !(data.queue_length >= 0.0) || !data.queue_length.is_finite() {
            return Err(ValidationError::InvalidQueueLength {
                approach: data.approach_id,
                value: data.queue_length,
            });
        }
        if !(data.current_green_time > 0.0) || !data.current_green_time.is_finite() {
            return Err(ValidationError::InvalidGreenTime {
                approach: data.approach_id,
                value: data.current_green_time,
            });
        }

        Ok(Self {
            approach_id: data.approach_id,
            vehicle_counts: data.vehicle_counts,
            queue_length: data.queue_length,
            lanes: data.lanes,
            congestion_level: data.congestion_level,
            pedestrian_count: data.pedestrian_count,
            current_green_time: data.current_green_time,
            link_length: data.link_length,
        })
    }
}

impl TrafficMetrics {
    pub fn approach_id(&self) -> &str {
        &self.approach_id
    }

    pub fn vehicle_counts(&self) -> &VehicleCounts {
        &self.vehicle_counts
    }

    pub fn queue_length(&self) -> f64 {
        self.queue_length
    }

    pub fn lanes(&self) -> u32 {
        self.lanes
    }

    pub fn congestion_level(&self) -> CongestionLevel {
        self.congestion_level
    }

    pub fn pedestrian_count(&self) -> u32 {
        self.pedestrian_count
    }

    pub fn current_green_time(&self) -> f64 {
        self.current_green_time
    }

    pub fn link_length(&self) -> Option<f64> {
        self.link_length
    }

    /// Demand in passenger car units: sum of count x class weight.
    pub fn demand_pcu(&self, policy: &PolicyConfig) -> f64 {
        self.vehicle_counts
            .iter()
            .map(|(class, &count)| f64::from(count) * policy.pcu_weight(class))
            .sum()
    }

    /// PCU per lane.
    pub fn density(&self, policy: &PolicyConfig) -> f64 {
        self.demand_pcu(policy) / f64::from(self.lanes.max(1))
    }

    pub fn congestion_factor(&self, policy: &PolicyConfig) -> f64 {
        policy.congestion_factor(self.congestion_level)
    }

    /// True when the queue fills at least `spillback_ratio` of the link.
    /// Without a positive link length there is nothing to spill back into.
    pub fn spillback_risk(&self, policy: &PolicyConfig) -> bool {
        match self.link_length {
            Some(link) if link > 0.0 => self.queue_length / link >= policy.spillback_ratio,
            _ => false,
        }
    }
}
