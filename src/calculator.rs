use serde::Serialize;
use std::sync::Arc;

use crate::config::{AreaType, PolicyConfig};
use crate::error::PolicyError;
use crate::metrics::TrafficMetrics;

/// Pedestrians beyond this count earn extra crossing time.
const PEDESTRIAN_GROUP_THRESHOLD: u32 = 20;
const SECONDS_PER_EXTRA_PEDESTRIAN: f64 = 0.1;
pub const MAX_EXTRA_PEDESTRIAN_TIME: f64 = 10.0;

/// Start-up plus clearance loss per cycle used by the Webster estimate.
pub const DEFAULT_LOST_TIME: f64 = 4.0;

/// Final timing for one approach.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalTiming {
    pub approach_id: String,
    pub green_time: f64,
    pub yellow_time: f64,
    pub all_red_time: f64,
    pub pedestrian_time: f64,
}

impl SignalTiming {
    pub fn total_time(&self) -> f64 {
        self.green_time + self.yellow_time + self.all_red_time
    }
}

/// Traffic engineering formulas bound to one area type.
#[derive(Debug, Clone)]
pub struct TrafficCalculator {
    policy: Arc<PolicyConfig>,
    area_type: AreaType,
    saturation_flow: f64,
}

impl TrafficCalculator {
    /// Bind `policy` to an area type. The policy is validated first, so a
    /// hand-built config gets the same checks as one read from a file.
    pub fn new(policy: Arc<PolicyConfig>, area_type: AreaType) -> Result<Self, PolicyError> {
        policy.validate()?;
        let saturation_flow = policy.saturation_flow_for(area_type)?;
        Ok(Self {
            policy,
            area_type,
            saturation_flow,
        })
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn area_type(&self) -> AreaType {
        self.area_type
    }

    /// Vehicles per hour per lane for this area type.
    pub fn saturation_flow(&self) -> f64 {
        self.saturation_flow
    }

    /// Minimum green needed for pedestrians to cross.
    ///
    /// Large groups add 0.1 s per pedestrian above 20, capped at 10 s extra.
    pub fn pedestrian_time(&self, pedestrian_count: u32) -> f64 {
        let mut time = self.policy.min_pedestrian_time;
        if pedestrian_count > PEDESTRIAN_GROUP_THRESHOLD {
            let extra = f64::from(pedestrian_count - PEDESTRIAN_GROUP_THRESHOLD)
                * SECONDS_PER_EXTRA_PEDESTRIAN;
            time += extra.min(MAX_EXTRA_PEDESTRIAN_TIME);
        }
        time
    }

    /// Demand flow in PCU per hour, treating the current green as the
    /// observation window.
    pub fn demand_flow(&self, metrics: &TrafficMetrics) -> f64 {
        metrics.demand_pcu(&self.policy) / metrics.current_green_time() * 3600.0
    }

    /// Webster's estimate `g = (v / s) * (C - L)`, scaled by the congestion
    /// multiplier.
    pub fn required_green_time(
        &self,
        metrics: &TrafficMetrics,
        cycle_time: f64,
        lost_time: f64,
    ) -> f64 {
        let capacity = self.saturation_flow * f64::from(metrics.lanes());
        let flow_ratio = self.demand_flow(metrics) / capacity;
        flow_ratio * (cycle_time - lost_time) * metrics.congestion_factor(&self.policy)
    }
}
