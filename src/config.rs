use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::HashMap, fmt, fs, hash::Hash, path::Path, str::FromStr};

use crate::calculator::MAX_EXTRA_PEDESTRIAN_TIME;
use crate::error::PolicyError;
use crate::metrics::CongestionLevel;

/// Area classification used to pick a saturation flow rate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaType {
    #[default]
    Urban,
    Suburban,
    Rural,
}

impl fmt::Display for AreaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AreaType::Urban => "urban",
            AreaType::Suburban => "suburban",
            AreaType::Rural => "rural",
        };
        f.write_str(s)
    }
}

impl FromStr for AreaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "urban" => Ok(AreaType::Urban),
            "suburban" => Ok(AreaType::Suburban),
            "rural" => Ok(AreaType::Rural),
            other => anyhow::bail!("unknown area type `{}`", other),
        }
    }
}

/// Traffic engineering policy: PCU weights, saturation flows, timing bounds.
///
/// Loaded once at startup and shared read-only. Every field has a default,
/// so a policy file only needs to list the values it overrides. Map entries
/// in a file are laid over the default map key by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Passenger car units per vehicle class; unlisted classes weigh 1.0.
    #[serde(deserialize_with = "over_default_pcu")]
    pub vehicle_pcu: HashMap<String, f64>,
    /// Vehicles per hour per lane.
    #[serde(deserialize_with = "over_default_saturation_flow")]
    pub saturation_flow: HashMap<AreaType, f64>,
    pub min_green_time: f64,
    pub max_green_time: f64,
    pub min_pedestrian_time: f64,
    pub yellow_time: f64,
    pub all_red_time: f64,
    #[serde(deserialize_with = "over_default_congestion_multipliers")]
    pub congestion_multipliers: HashMap<CongestionLevel, f64>,
    pub min_cycle_time: f64,
    pub max_cycle_time: f64,
    pub default_cycle_time: f64,
    /// Queue-to-link length ratio at which an approach is at risk of spillback.
    pub spillback_ratio: f64,
}

fn default_vehicle_pcu() -> HashMap<String, f64> {
    [
        ("car", 1.0),
        ("motorcycle", 0.5),
        ("auto", 0.8),
        ("bus", 3.0),
        ("truck", 3.5),
        ("bicycle", 0.5),
        ("pedestrian", 0.2),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_saturation_flow() -> HashMap<AreaType, f64> {
    [
        (AreaType::Urban, 1800.0),
        (AreaType::Suburban, 2000.0),
        (AreaType::Rural, 1600.0),
    ]
    .into_iter()
    .collect()
}

fn default_congestion_multipliers() -> HashMap<CongestionLevel, f64> {
    [
        (CongestionLevel::Free, 0.9),
        (CongestionLevel::Stable, 1.0),
        (CongestionLevel::Congested, 1.2),
        (CongestionLevel::SeverelyCongested, 1.5),
    ]
    .into_iter()
    .collect()
}

fn merge_over<'de, D, K, V>(
    deserializer: D,
    mut base: HashMap<K, V>,
) -> Result<HashMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
    K: Deserialize<'de> + Eq + Hash,
    V: Deserialize<'de>,
{
    base.extend(HashMap::<K, V>::deserialize(deserializer)?);
    Ok(base)
}

fn over_default_pcu<'de, D: Deserializer<'de>>(d: D) -> Result<HashMap<String, f64>, D::Error> {
    merge_over(d, default_vehicle_pcu())
}

fn over_default_saturation_flow<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<HashMap<AreaType, f64>, D::Error> {
    merge_over(d, default_saturation_flow())
}

fn over_default_congestion_multipliers<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<HashMap<CongestionLevel, f64>, D::Error> {
    merge_over(d, default_congestion_multipliers())
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            vehicle_pcu: default_vehicle_pcu(),
            saturation_flow: default_saturation_flow(),
            min_green_time: 15.0,
            max_green_time: 120.0,
            min_pedestrian_time: 7.0,
            yellow_time: 3.0,
            all_red_time: 2.0,
            congestion_multipliers: default_congestion_multipliers(),
            min_cycle_time: 60.0,
            max_cycle_time: 180.0,
            default_cycle_time: 120.0,
            spillback_ratio: 0.8,
        }
    }
}

impl PolicyConfig {
    /// Read a JSON policy file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read policy at {}", path.display()))?;
        let policy: PolicyConfig = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse policy {}", path.display()))?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        let non_negative = [
            ("min_green_time", self.min_green_time),
            ("max_green_time", self.max_green_time),
            ("min_pedestrian_time", self.min_pedestrian_time),
            ("yellow_time", self.yellow_time),
            ("all_red_time", self.all_red_time),
            ("min_cycle_time", self.min_cycle_time),
            ("max_cycle_time", self.max_cycle_time),
            ("default_cycle_time", self.default_cycle_time),
        ];
        for (field, value) in non_negative {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(PolicyError::Negative { field, value });
            }
        }
        for &weight in self.vehicle_pcu.values() {
            if !(weight >= 0.0) {
                return Err(PolicyError::Negative {
                    field: "vehicle_pcu",
                    value: weight,
                });
            }
        }
        for (&area, &flow) in &self.saturation_flow {
            if !(flow > 0.0) || !flow.is_finite() {
                return Err(PolicyError::SaturationFlow { area, value: flow });
            }
        }
        for &multiplier in self.congestion_multipliers.values() {
            if !(multiplier >= 0.0) || !multiplier.is_finite() {
                return Err(PolicyError::Negative {
                    field: "congestion_multipliers",
                    value: multiplier,
                });
            }
        }
        if self.min_green_time > self.max_green_time {
            return Err(PolicyError::GreenBounds {
                min: self.min_green_time,
                max: self.max_green_time,
            });
        }
        // The pedestrian floor is applied after the max-green clamp, so the
        // largest possible floor must already fit under it.
        let pedestrian_ceiling = self.min_pedestrian_time + MAX_EXTRA_PEDESTRIAN_TIME;
        if self.max_green_time < pedestrian_ceiling {
            return Err(PolicyError::PedestrianCeiling {
                max: self.max_green_time,
                required: pedestrian_ceiling,
            });
        }
        if self.min_cycle_time > self.max_cycle_time {
            return Err(PolicyError::CycleBounds {
                min: self.min_cycle_time,
                max: self.max_cycle_time,
            });
        }
        if !(self.spillback_ratio > 0.0 && self.spillback_ratio <= 1.0) {
            return Err(PolicyError::SpillbackRatio(self.spillback_ratio));
        }
        Ok(())
    }

    pub fn pcu_weight(&self, class: &str) -> f64 {
        self.vehicle_pcu.get(class).copied().unwrap_or(1.0)
    }

    pub fn congestion_factor(&self, level: CongestionLevel) -> f64 {
        self.congestion_multipliers
            .get(&level)
            .copied()
            .unwrap_or(1.0)
    }

    pub fn saturation_flow_for(&self, area: AreaType) -> Result<f64, PolicyError> {
        self.saturation_flow
            .get(&area)
            .copied()
            .ok_or(PolicyError::MissingSaturationFlow(area))
    }

    /// Yellow plus all-red time inserted after each green phase.
    pub fn interphase_time(&self) -> f64 {
        self.yellow_time + self.all_red_time
    }
}
