use super::Allocation;
use crate::config::PolicyConfig;

/// Green time left in the cycle once every approach's yellow and all-red
/// intervals are paid for. Never negative.
pub fn available_green(policy: &PolicyConfig, cycle_time: f64, approaches: usize) -> f64 {
    let total_interphase = approaches as f64 * policy.interphase_time();
    let available = cycle_time - total_interphase;
    if available <= 0.0 {
        tracing::warn!(
            "cycle of {}s leaves no green after {}s of interphase across {} approaches",
            cycle_time,
            total_interphase,
            approaches
        );
    }
    available.max(0.0)
}

/// Shrink greens proportionally when they overrun the available green.
///
/// Each scaled green is floored at `min_green_time`. Spare capacity is never
/// handed back out, so an undersubscribed cycle simply runs short.
pub fn fit_to_cycle<'a>(
    greens: Vec<Allocation<'a>>,
    policy: &PolicyConfig,
    cycle_time: f64,
) -> Vec<Allocation<'a>> {
    let total_required: f64 = greens.iter().map(|a| a.green).sum();
    let available = available_green(policy, cycle_time, greens.len());

    if total_required <= available {
        return greens;
    }

    let scale_factor = available / total_required;
    tracing::debug!(
        "required {:.1}s exceeds available {:.1}s; scaling by {:.4}",
        total_required,
        available,
        scale_factor
    );
    greens
        .into_iter()
        .map(|a| {
            let scaled = (a.green * scale_factor).max(policy.min_green_time);
            a.with_green(scaled)
        })
        .collect()
}
