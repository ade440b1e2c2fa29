use super::Allocation;
use crate::calculator::{SignalTiming, TrafficCalculator};

/// Round to one decimal, breaking exact ties toward the even digit.
///
/// Ties are judged on the exact binary value, not on its decimal spelling:
/// `20.25` is a true tie and becomes `20.2`, while `2.45` is stored slightly
/// above the tie and becomes `2.5`.
pub fn round_to_tenth(value: f64) -> f64 {
    let scaled = value * 10.0;
    // Rounding error of the multiplication, exact thanks to the fused op.
    let residual = value.mul_add(10.0, -scaled);
    let floor = scaled.floor();

    let rounded = if scaled - floor == 0.5 {
        if residual > 0.0 {
            floor + 1.0
        } else if residual < 0.0 {
            floor
        } else if floor % 2.0 == 0.0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };
    rounded / 10.0
}

/// Build the final timings and the realized cycle length.
///
/// The realized cycle is the sum of every approach's green, yellow and
/// all-red; it can differ from the requested cycle.
pub fn assemble(
    greens: &[Allocation<'_>],
    calculator: &TrafficCalculator,
) -> (Vec<SignalTiming>, f64) {
    let policy = calculator.policy();
    let timings: Vec<SignalTiming> = greens
        .iter()
        .map(|a| SignalTiming {
            approach_id: a.metrics.approach_id().to_string(),
            green_time: round_to_tenth(a.green),
            yellow_time: policy.yellow_time,
            all_red_time: policy.all_red_time,
            pedestrian_time: calculator.pedestrian_time(a.metrics.pedestrian_count()),
        })
        .collect();

    let actual_cycle_time: f64 = timings.iter().map(SignalTiming::total_time).sum();
    (timings, actual_cycle_time)
}
