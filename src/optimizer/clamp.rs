use super::Allocation;
use crate::calculator::TrafficCalculator;

/// Bound each target to `[min_green, max_green]`, then raise it to the
/// approach's pedestrian floor. The floor is applied after the bounds and is
/// not re-clamped.
pub fn apply_safety_bounds<'a>(
    targets: Vec<Allocation<'a>>,
    calculator: &TrafficCalculator,
) -> Vec<Allocation<'a>> {
    let policy = calculator.policy();
    targets
        .into_iter()
        .map(|target| {
            let bounded = target
                .green
                .max(policy.min_green_time)
                .min(policy.max_green_time);
            let ped_time = calculator.pedestrian_time(target.metrics.pedestrian_count());
            target.with_green(bounded.max(ped_time))
        })
        .collect()
}
