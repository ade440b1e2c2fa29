use serde::Serialize;

use super::Allocation;
use crate::config::PolicyConfig;

/// Green multiplier granted to an approach at risk of spillback.
pub const SPILLBACK_EXTENSION: f64 = 1.3;
/// Pedestrian count above which an alert is raised.
pub const PEDESTRIAN_ALERT_THRESHOLD: u32 = 15;

const SPILLBACK_RECOMMENDATION: &str = "Consider emergency green extension";
const PEDESTRIAN_ALERT_MESSAGE: &str = "High pedestrian activity";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpillbackRisk {
    pub approach: String,
    pub queue_length: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PedestrianAlert {
    pub approach: String,
    pub pedestrian_count: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CongestionWarning {
    pub approach: String,
    pub message: String,
}

/// Diagnostics gathered while adjusting for operational risk. Entries follow
/// the approach order of the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Analysis {
    pub spillback_risks: Vec<SpillbackRisk>,
    /// Reserved; nothing populates it yet.
    pub congestion_warnings: Vec<CongestionWarning>,
    pub pedestrian_alerts: Vec<PedestrianAlert>,
}

/// Extend greens on approaches at risk of spillback and flag heavy
/// pedestrian activity.
///
/// Runs after capacity normalization, so extensions may push the cycle back
/// over budget. Each extension is still capped at `max_green_time`.
pub fn assess_risks<'a>(
    greens: Vec<Allocation<'a>>,
    policy: &PolicyConfig,
) -> (Vec<Allocation<'a>>, Analysis) {
    let mut analysis = Analysis::default();

    let adjusted: Vec<_> = greens
        .into_iter()
        .map(|a| {
            let metrics = a.metrics;
            let mut green = a.green;

            if metrics.spillback_risk(policy) {
                tracing::warn!(
                    "spillback risk on {} (queue {}m)",
                    metrics.approach_id(),
                    metrics.queue_length()
                );
                analysis.spillback_risks.push(SpillbackRisk {
                    approach: metrics.approach_id().to_string(),
                    queue_length: metrics.queue_length(),
                    recommendation: SPILLBACK_RECOMMENDATION.to_string(),
                });
                green = (green * SPILLBACK_EXTENSION).min(policy.max_green_time);
            }

            if metrics.pedestrian_count() > PEDESTRIAN_ALERT_THRESHOLD {
                analysis.pedestrian_alerts.push(PedestrianAlert {
                    approach: metrics.approach_id().to_string(),
                    pedestrian_count: metrics.pedestrian_count(),
                    message: PEDESTRIAN_ALERT_MESSAGE.to_string(),
                });
            }

            a.with_green(green)
        })
        .collect();

    (adjusted, analysis)
}
