use super::Allocation;
use crate::config::PolicyConfig;
use crate::metrics::TrafficMetrics;

/// Demand-share brackets, largest first. The first bracket whose threshold
/// the ratio reaches wins.
const DOMINANCE_BRACKETS: [(f64, f64); 3] = [(0.35, 1.5), (0.25, 1.3), (0.15, 1.1)];

/// Multiplier that favours approaches carrying a large share of demand.
pub fn dominance_weight(demand_ratio: f64) -> f64 {
    DOMINANCE_BRACKETS
        .iter()
        .find(|(threshold, _)| demand_ratio >= *threshold)
        .map(|(_, weight)| *weight)
        .unwrap_or(1.0)
}

/// Pre-clamp green targets proportional to each approach's PCU share.
///
/// Targets are not required to sum to `cycle_time`; the dominance multiplier
/// over-allocates busy approaches and capacity normalization reconciles it.
/// With no measurable demand anywhere the cycle is split evenly.
pub fn weight_by_demand<'a>(
    metrics: &'a [TrafficMetrics],
    policy: &PolicyConfig,
    cycle_time: f64,
) -> Vec<Allocation<'a>> {
    if metrics.is_empty() {
        return Vec::new();
    }

    let demands: Vec<f64> = metrics.iter().map(|m| m.demand_pcu(policy)).collect();
    let total_demand: f64 = demands.iter().sum();

    if total_demand == 0.0 {
        let equal_green = cycle_time / metrics.len() as f64;
        tracing::debug!("no measurable demand; splitting {}s evenly", cycle_time);
        return metrics
            .iter()
            .map(|m| Allocation::new(m, equal_green))
            .collect();
    }

    metrics
        .iter()
        .zip(demands)
        .map(|(m, demand)| {
            let ratio = demand / total_demand;
            let weight = dominance_weight(ratio);
            let green = cycle_time * ratio * weight;
            tracing::debug!(
                "approach={} demand={:.1} ratio={:.3} weight={} target={:.2}",
                m.approach_id(),
                demand,
                ratio,
                weight,
                green
            );
            Allocation::new(m, green)
        })
        .collect()
}
