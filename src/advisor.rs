use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::calculator::{SignalTiming, DEFAULT_LOST_TIME};
use crate::config::{AreaType, PolicyConfig};
use crate::error::{PolicyError, ValidationError};
use crate::format::OutputFormat;
use crate::metrics::{ApproachData, TrafficMetrics};
use crate::optimizer::{aggregate::round_to_tenth, Analysis, Optimization, SignalOptimizer};

/// One advisory request as sent by a client.
#[derive(Debug, Clone, Deserialize)]
pub struct AdviseRequest {
    pub approaches: Vec<ApproachData>,
    #[serde(default)]
    pub current_cycle_time: Option<f64>,
    #[serde(default)]
    pub emergency_vehicle_present: bool,
    #[serde(default)]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub format: OutputFormat,
}

/// Recommendation handed back to the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advisory {
    /// Approach -> green seconds, in request order.
    pub recommended_green_times: IndexMap<String, f64>,
    pub cycle_time: f64,
    pub timings: Vec<SignalTiming>,
    pub reasoning: Vec<String>,
    pub safety_confirmation: Vec<String>,
    pub operational_advice: Vec<String>,
    pub warnings: Vec<String>,
    pub analysis: Analysis,
    pub timestamp_ms: i64,
}

pub struct TrafficAdvisor {
    optimizer: SignalOptimizer,
    allowed_approaches: Option<HashSet<String>>,
}

impl TrafficAdvisor {
    pub fn new(policy: Arc<PolicyConfig>, area_type: AreaType) -> Result<Self, PolicyError> {
        Ok(Self {
            optimizer: SignalOptimizer::new(policy, area_type)?,
            allowed_approaches: None,
        })
    }

    /// Only accept requests whose approach ids are in `ids`.
    pub fn with_allowed_approaches<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_approaches = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn policy(&self) -> &PolicyConfig {
        self.optimizer.policy()
    }

    pub fn area_type(&self) -> AreaType {
        self.optimizer.calculator().area_type()
    }

    /// Validate a request, run the optimizer and explain the result.
    ///
    /// Any invalid approach rejects the whole request.
    pub fn process(&self, request: AdviseRequest) -> Result<Advisory, ValidationError> {
        if let Some(time_of_day) = &request.time_of_day {
            tracing::debug!("time of day hint: {}", time_of_day);
        }
        self.check_allowed(request.approaches.iter().map(|a| a.approach_id.as_str()))?;

        let metrics = request
            .approaches
            .into_iter()
            .map(TrafficMetrics::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let cycle_time = request
            .current_cycle_time
            .unwrap_or(self.policy().default_cycle_time);

        self.run(&metrics, cycle_time, request.emergency_vehicle_present)
    }

    /// Advise on already-built metrics with the default cycle time.
    pub fn advise(&self, metrics: &[TrafficMetrics]) -> Result<Advisory, ValidationError> {
        self.check_allowed(metrics.iter().map(TrafficMetrics::approach_id))?;
        self.run(metrics, self.policy().default_cycle_time, false)
    }

    fn check_allowed<'a>(
        &self,
        mut ids: impl Iterator<Item = &'a str>,
    ) -> Result<(), ValidationError> {
        let Some(allowed) = &self.allowed_approaches else {
            return Ok(());
        };
        match ids.find(|id| !allowed.contains(*id)) {
            Some(unknown) => Err(ValidationError::UnknownApproach(unknown.to_string())),
            None => Ok(()),
        }
    }

    fn run(
        &self,
        metrics: &[TrafficMetrics],
        cycle_time: f64,
        emergency_vehicle_present: bool,
    ) -> Result<Advisory, ValidationError> {
        let optimization = self.optimizer.optimize(metrics, cycle_time)?;
        Ok(self.build_advisory(optimization, metrics, cycle_time, emergency_vehicle_present))
    }

    fn build_advisory(
        &self,
        optimization: Optimization,
        metrics: &[TrafficMetrics],
        requested_cycle: f64,
        emergency_vehicle_present: bool,
    ) -> Advisory {
        let policy = self.policy();
        let calculator = self.optimizer.calculator();
        let Optimization {
            timings,
            actual_cycle_time,
            analysis,
        } = optimization;

        let recommended_green_times = timings
            .iter()
            .map(|t| (t.approach_id.clone(), t.green_time))
            .collect();

        // Timings come out in the same order as the metrics went in.
        let reasoning = timings
            .iter()
            .zip(metrics)
            .map(|(t, m)| {
                let webster = calculator.required_green_time(m, requested_cycle, DEFAULT_LOST_TIME);
                format!(
                    "Approach {}: Demand = {:.1} PCU, Congestion = {}, Pedestrians = {}, \
                     Webster estimate = {:.1}s. Recommended {:.1}s green.",
                    t.approach_id,
                    m.demand_pcu(policy),
                    m.congestion_level(),
                    m.pedestrian_count(),
                    webster,
                    t.green_time
                )
            })
            .collect();

        let safety_confirmation = vec![
            format!(
                "Green times within {}s to {}s limits.",
                policy.min_green_time, policy.max_green_time
            ),
            format!("Pedestrian minimum {}s ensured.", policy.min_pedestrian_time),
            format!(
                "Each phase ends with {}s yellow and {}s all-red clearance.",
                policy.yellow_time, policy.all_red_time
            ),
        ];

        let mut operational_advice: Vec<String> = analysis
            .spillback_risks
            .iter()
            .map(|r| {
                format!(
                    "Spillback risk on {} (queue {}m): {}",
                    r.approach, r.queue_length, r.recommendation
                )
            })
            .collect();
        if emergency_vehicle_present {
            operational_advice.push("Emergency vehicle detected: override signals".to_string());
        }

        let cycle_time = round_to_tenth(actual_cycle_time);
        let mut warnings = Vec::new();
        if actual_cycle_time > policy.max_cycle_time {
            tracing::warn!(
                "realized cycle {:.1}s exceeds maximum {}s",
                actual_cycle_time,
                policy.max_cycle_time
            );
            warnings.push(format!(
                "Cycle time {:.1}s exceeds recommended maximum of {}s",
                cycle_time, policy.max_cycle_time
            ));
        } else if actual_cycle_time < policy.min_cycle_time {
            warnings.push(format!(
                "Cycle time {:.1}s is below recommended minimum of {}s",
                cycle_time, policy.min_cycle_time
            ));
        }

        Advisory {
            recommended_green_times,
            cycle_time,
            timings,
            reasoning,
            safety_confirmation,
            operational_advice,
            warnings,
            analysis,
            timestamp_ms: now_ms(),
        }
    }
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{CongestionLevel, VehicleCounts};

    fn advisor() -> TrafficAdvisor {
        TrafficAdvisor::new(Arc::new(PolicyConfig::default()), AreaType::Urban).unwrap()
    }

    fn approach(id: &str, cars: u32) -> ApproachData {
        ApproachData {
            approach_id: id.to_string(),
            vehicle_counts: [("car".to_string(), cars)].into_iter().collect(),
            queue_length: 10.0,
            lanes: 2,
            congestion_level: CongestionLevel::Stable,
            pedestrian_count: 3,
            current_green_time: 30.0,
            link_length: Some(100.0),
        }
    }

    fn request(approaches: Vec<ApproachData>) -> AdviseRequest {
        AdviseRequest {
            approaches,
            current_cycle_time: None,
            emergency_vehicle_present: false,
            time_of_day: None,
            format: OutputFormat::Text,
        }
    }

    #[test]
    fn keeps_request_order() {
        let advisory = advisor()
            .process(request(vec![approach("W", 5), approach("E", 20), approach("N", 9)]))
            .unwrap();

        let keys: Vec<_> = advisory.recommended_green_times.keys().cloned().collect();
        assert_eq!(keys, ["W", "E", "N"]);
        assert_eq!(advisory.reasoning.len(), 3);
        assert!(advisory.reasoning[1].starts_with("Approach E: Demand = 20.0 PCU"));
    }

    #[test]
    fn one_bad_approach_rejects_everything() {
        let mut bad = approach("S", 4);
        bad.lanes = 7;

        let err = advisor()
            .process(request(vec![approach("N", 3), bad]))
            .unwrap_err();

        assert_eq!(
            err,
            ValidationError::LanesOutOfRange {
                approach: "S".into(),
                lanes: 7
            }
        );
    }

    #[test]
    fn enforces_allowed_approaches() {
        let advisor = advisor().with_allowed_approaches(["N", "S", "E", "W"]);

        let err = advisor
            .process(request(vec![approach("N", 3), approach("NE", 3)]))
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownApproach("NE".into()));

        assert!(advisor.process(request(vec![approach("N", 3)])).is_ok());
    }

    #[test]
    fn advise_enforces_allowed_approaches() {
        let advisor = advisor().with_allowed_approaches(["N", "S", "E", "W"]);
        let metrics: Vec<_> = [approach("S", 4), approach("NE", 3)]
            .into_iter()
            .map(|a| TrafficMetrics::try_from(a).unwrap())
            .collect();

        let err = advisor.advise(&metrics).unwrap_err();
        assert_eq!(err, ValidationError::UnknownApproach("NE".into()));

        assert!(advisor.advise(&metrics[..1]).is_ok());
    }

    #[test]
    fn emergency_and_spillback_advice() {
        let mut jammed = approach("N", 40);
        jammed.queue_length = 95.0;
        let mut req = request(vec![jammed, approach("S", 5)]);
        req.emergency_vehicle_present = true;

        let advisory = advisor().process(req).unwrap();

        assert_eq!(advisory.analysis.spillback_risks.len(), 1);
        assert_eq!(advisory.operational_advice.len(), 2);
        assert!(advisory.operational_advice[0].starts_with("Spillback risk on N"));
        assert_eq!(
            advisory.operational_advice[1],
            "Emergency vehicle detected: override signals"
        );
    }

    #[test]
    fn warns_when_cycle_overruns_maximum() {
        // Long requested cycle, every approach congested and spilling back.
        let approaches: Vec<_> = ["N", "S"]
            .iter()
            .map(|id| ApproachData {
                queue_length: 90.0,
                ..approach(id, 50)
            })
            .collect();
        let mut req = request(approaches);
        req.current_cycle_time = Some(240.0);

        let advisory = advisor().process(req).unwrap();

        // 0.5 share each -> 180 -> 120 cap -> scaled to 115 -> extended back to 120.
        assert_eq!(advisory.cycle_time, 250.0);
        assert_eq!(advisory.warnings.len(), 1);
        assert!(advisory.warnings[0].contains("exceeds recommended maximum"));
    }

    #[test]
    fn warns_when_cycle_runs_short() {
        let advisory = advisor()
            .process(request(vec![ApproachData {
                vehicle_counts: VehicleCounts::new(),
                ..approach("N", 0)
            }]))
            .unwrap();

        // Even split gives 120 -> capped 120 -> scaled to 115, total 120.
        assert_eq!(advisory.cycle_time, 120.0);
        assert!(advisory.warnings.is_empty());

        let mut req = request(vec![approach("N", 1), approach("S", 1)]);
        req.current_cycle_time = Some(30.0);
        let short = advisor().process(req).unwrap();
        assert_eq!(short.cycle_time, 40.0);
        assert!(short.warnings[0].contains("below recommended minimum"));
    }

    #[test]
    fn advise_uses_default_cycle() {
        let metrics: Vec<_> = ["N", "S", "E", "W"]
            .iter()
            .map(|id| {
                TrafficMetrics::try_from(ApproachData {
                    vehicle_counts: VehicleCounts::new(),
                    ..approach(id, 0)
                })
                .unwrap()
            })
            .collect();

        let advisory = advisor().advise(&metrics).unwrap();

        assert_eq!(advisory.cycle_time, 120.0);
        assert!(advisory.recommended_green_times.values().all(|g| *g == 25.0));
    }
}
