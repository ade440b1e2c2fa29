use serde::Deserialize;
use serde_json::{json, Value};

use crate::advisor::Advisory;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

const RULE_WIDTH: usize = 60;

/// Sectioned report for chat-style consumers.
pub fn to_plain_text(advisory: &Advisory) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![
        rule.clone(),
        "ADAPTIVE TRAFFIC SIGNAL ADVISORY".to_string(),
        rule.clone(),
        String::new(),
        "RECOMMENDED SIGNAL TIMINGS:".to_string(),
    ];

    for (approach, green) in &advisory.recommended_green_times {
        lines.push(format!("  Approach {}: {:.1} seconds green", approach, green));
    }
    lines.push(format!("  Total Cycle Time: {:.1} seconds", advisory.cycle_time));

    lines.push(String::new());
    lines.push("ENGINEERING ANALYSIS:".to_string());
    lines.extend(advisory.reasoning.iter().map(|r| format!("  - {}", r)));

    lines.push(String::new());
    lines.push("SAFETY CONFIRMATION:".to_string());
    lines.extend(advisory.safety_confirmation.iter().map(|s| format!("  + {}", s)));

    if !advisory.operational_advice.is_empty() {
        lines.push(String::new());
        lines.push("OPERATIONAL ADVICE:".to_string());
        lines.extend(advisory.operational_advice.iter().map(|a| format!("  - {}", a)));
    }

    if !advisory.warnings.is_empty() {
        lines.push(String::new());
        lines.push("WARNINGS:".to_string());
        lines.extend(advisory.warnings.iter().map(|w| format!("  ! {}", w)));
    }

    lines.push(String::new());
    lines.push(rule.clone());
    lines.push(format!("Generated at {} ms", advisory.timestamp_ms));
    lines.push(rule);

    lines.join("\n")
}

/// Structured payload for dashboards.
///
/// With no operational advice, `police_action` falls back to the standard
/// apply / observe / re-run checklist.
pub fn to_json(advisory: &Advisory) -> Value {
    let police_action: Vec<&str> = if advisory.operational_advice.is_empty() {
        vec![
            "Apply the recommended green times",
            "Observe traffic for one full cycle",
            "Re-run advisory if congestion persists",
        ]
    } else {
        advisory.operational_advice.iter().map(String::as_str).collect()
    };

    json!({
        "status": "success",
        "timestamp_ms": advisory.timestamp_ms,
        "signal_timings": {
            "per_approach": advisory.recommended_green_times,
            "total_cycle_time": advisory.cycle_time,
        },
        "reasoning_points": advisory.reasoning,
        "safety_status": {
            "confirmed": true,
            "checks": advisory.safety_confirmation,
        },
        "police_action": police_action,
        "warnings": advisory.warnings,
        "analysis": advisory.analysis,
    })
}
