//! Signal timing optimization.
//!
//! Demand weighting -> safety bounds -> capacity normalization -> risk
//! adjustment -> aggregation. Every stage is a pure function over the
//! approaches passed in; the optimizer holds only read-only policy.

pub mod aggregate;
pub mod clamp;
pub mod normalize;
pub mod risk;
pub mod weighting;

use serde::Serialize;
use std::{collections::HashSet, sync::Arc};

use crate::calculator::{SignalTiming, TrafficCalculator};
use crate::config::{AreaType, PolicyConfig};
use crate::error::{PolicyError, ValidationError};
use crate::metrics::TrafficMetrics;

pub use risk::{Analysis, CongestionWarning, PedestrianAlert, SpillbackRisk};

/// Green time carried from one stage to the next for a single approach.
#[derive(Debug, Clone, Copy)]
pub struct Allocation<'a> {
    pub metrics: &'a TrafficMetrics,
    pub green: f64,
}

impl<'a> Allocation<'a> {
    pub fn new(metrics: &'a TrafficMetrics, green: f64) -> Self {
        Self { metrics, green }
    }

    pub fn with_green(self, green: f64) -> Self {
        Self { green, ..self }
    }
}

/// Result of one optimization call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Optimization {
    pub timings: Vec<SignalTiming>,
    /// Sum of green, yellow and all-red over all approaches.
    pub actual_cycle_time: f64,
    pub analysis: Analysis,
}

#[derive(Debug, Clone)]
pub struct SignalOptimizer {
    calculator: TrafficCalculator,
}

impl SignalOptimizer {
    pub fn new(policy: Arc<PolicyConfig>, area_type: AreaType) -> Result<Self, PolicyError> {
        Ok(Self {
            calculator: TrafficCalculator::new(policy, area_type)?,
        })
    }

    pub fn calculator(&self) -> &TrafficCalculator {
        &self.calculator
    }

    pub fn policy(&self) -> &PolicyConfig {
        self.calculator.policy()
    }

    /// Recommend green times for the given approaches.
    ///
    /// The request is checked as a whole before any stage runs: it needs at
    /// least one approach, distinct approach ids and a positive cycle time.
    pub fn optimize(
        &self,
        metrics: &[TrafficMetrics],
        current_cycle_time: f64,
    ) -> Result<Optimization, ValidationError> {
        validate_request(metrics, current_cycle_time)?;
        let policy = self.policy();

        let targets = weighting::weight_by_demand(metrics, policy, current_cycle_time);
        let bounded = clamp::apply_safety_bounds(targets, &self.calculator);
        let normalized = normalize::fit_to_cycle(bounded, policy, current_cycle_time);
        let (adjusted, analysis) = risk::assess_risks(normalized, policy);
        let (timings, actual_cycle_time) = aggregate::assemble(&adjusted, &self.calculator);

        tracing::debug!(
            "optimized {} approaches: requested cycle {}s, realized {:.1}s",
            timings.len(),
            current_cycle_time,
            actual_cycle_time
        );

        Ok(Optimization {
            timings,
            actual_cycle_time,
            analysis,
        })
    }
}

fn validate_request(metrics: &[TrafficMetrics], cycle_time: f64) -> Result<(), ValidationError> {
    if metrics.is_empty() {
        return Err(ValidationError::NoApproaches);
    }
    if !(cycle_time > 0.0) || !cycle_time.is_finite() {
        return Err(ValidationError::InvalidCycleTime(cycle_time));
    }
    let mut seen = HashSet::with_capacity(metrics.len());
    for m in metrics {
        if !seen.insert(m.approach_id()) {
            return Err(ValidationError::DuplicateApproach(m.approach_id().to_string()));
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::metrics::ApproachData;

    fn optimizer() -> SignalOptimizer {
        SignalOptimizer::new(Arc::new(PolicyConfig::default()), AreaType::Urban).unwrap()
    }

    #[test]
    fn rejects_empty_request() {
        assert_eq!(
            optimizer().optimize(&[], 120.0),
            Err(ValidationError::NoApproaches)
        );
    }

    #[test]
    fn rejects_duplicate_approaches() {
        let metrics = vec![approach("N"), approach("S"), approach("N")];
        assert_eq!(
            optimizer().optimize(&metrics, 120.0),
            Err(ValidationError::DuplicateApproach("N".into()))
        );
    }

    #[test]
    fn rejects_non_positive_cycle() {
        let metrics = vec![approach("N")];
        assert_eq!(
            optimizer().optimize(&metrics, 0.0),
            Err(ValidationError::InvalidCycleTime(0.0))
        );
        assert!(optimizer().optimize(&metrics, f64::NAN).is_err());
    }

    #[test]
    fn zero_demand_four_way() {
        let metrics: Vec<_> = ["N", "S", "E", "W"]
            .iter()
            .enumerate()
            .map(|(i, id)| {
                TrafficMetrics::try_from(ApproachData {
                    lanes: 1 + (i as u32 % 3),
                    ..data(id)
                })
                .unwrap()
            })
            .collect();

        let out = optimizer().optimize(&metrics, 120.0).unwrap();

        assert_eq!(out.timings.len(), 4);
        for t in &out.timings {
            assert_eq!(t.green_time, 25.0);
        }
        assert!((out.actual_cycle_time - 120.0).abs() < 1e-9);
        assert_eq!(out.analysis, Analysis::default());
    }

    #[test]
    fn single_approach_gets_bounded_cycle() {
        let metrics = vec![with_cars("only", 12)];

        let out = optimizer().optimize(&metrics, 120.0).unwrap();

        // ratio 1.0 -> x1.5 -> 180 -> clamped to 120 -> scaled to 115
        assert_eq!(out.timings[0].green_time, 115.0);
        assert_eq!(out.actual_cycle_time, 120.0);
    }

    #[test]
    fn identical_inputs_give_identical_output() {
        let metrics = vec![
            with_cars("N", 14),
            queued("S", 60.0, Some(70.0)),
            with_pedestrians("E", 33),
        ];
        let opt = optimizer();
        let a = opt.optimize(&metrics, 110.0).unwrap();
        let b = opt.optimize(&metrics, 110.0).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.actual_cycle_time.to_bits(), b.actual_cycle_time.to_bits());
    }
}
