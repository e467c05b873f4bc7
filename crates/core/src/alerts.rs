//! Dashboard alert rules.
//!
//! Alerts are computed over the zero-filled daily timeline so the rules see
//! quiet days as zeros rather than gaps. The last timeline entry is "today".

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::Severity;

/// One calendar day of the dashboard timeline (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineDay {
    pub date: NaiveDate,
    pub total: i64,
    pub ai_detected: i64,
    pub human_detected: i64,
}

/// A fired alert rule.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
}

/// Minimum prior-window sample count for the AI-rate spike rule.
const SPIKE_MIN_SAMPLES: i64 = 20;

/// Minimum prior-window volume for the volume-drop rule.
const DROP_MIN_BASELINE: i64 = 50;

/// Evaluate all alert rules against a timeline.
///
/// `ai_rate_spike` fires when today's AI rate exceeds twice the trailing
/// 14-day average (given at least 20 prior samples); `volume_drop` fires
/// when today's volume falls below 20 % of the trailing 14-day median
/// (given a prior baseline of at least 50 analyses).
pub fn evaluate(timeline: &[TimelineDay]) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let Some((today, prior)) = timeline.split_last() else {
        return alerts;
    };
    let trailing_start = prior.len().saturating_sub(14);
    let trailing = &prior[trailing_start..];

    if let Some(alert) = ai_rate_spike(today, trailing) {
        alerts.push(alert);
    }
    if let Some(alert) = volume_drop(today, trailing) {
        alerts.push(alert);
    }
    alerts
}

fn ai_rate_spike(today: &TimelineDay, trailing: &[TimelineDay]) -> Option<Alert> {
    let trailing_total: i64 = trailing.iter().map(|d| d.total).sum();
    if trailing_total < SPIKE_MIN_SAMPLES || today.total == 0 {
        return None;
    }
    let trailing_ai: i64 = trailing.iter().map(|d| d.ai_detected).sum();
    let trailing_rate = trailing_ai as f64 / trailing_total as f64;
    let today_rate = today.ai_detected as f64 / today.total as f64;
    if today_rate > 2.0 * trailing_rate {
        return Some(Alert {
            code: "ai_rate_spike",
            severity: Severity::Warning,
            message: format!(
                "AI detection rate {:.0}% on {} is more than double the trailing average of {:.0}%",
                today_rate * 100.0,
                today.date,
                trailing_rate * 100.0
            ),
        });
    }
    None
}

fn volume_drop(today: &TimelineDay, trailing: &[TimelineDay]) -> Option<Alert> {
    let baseline: i64 = trailing.iter().map(|d| d.total).sum();
    if baseline < DROP_MIN_BASELINE {
        return None;
    }
    let mut totals: Vec<i64> = trailing.iter().map(|d| d.total).collect();
    totals.sort_unstable();
    let median = if totals.len() % 2 == 1 {
        totals[totals.len() / 2] as f64
    } else {
        (totals[totals.len() / 2 - 1] + totals[totals.len() / 2]) as f64 / 2.0
    };
    if (today.total as f64) < 0.2 * median {
        return Some(Alert {
            code: "volume_drop",
            severity: Severity::Info,
            message: format!(
                "Analysis volume on {} ({}) fell below 20% of the trailing median ({:.0})",
                today.date, today.total, median
            ),
        });
    }
    None
}
