use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::{Alert, AlertDetection, AlertKind, DailyAggregate, MovingAverages, TriggeredWindow, Window};
use crate::trend::{round1, DailyBuckets};

pub const DEFAULT_APPROACH_THRESHOLD: f64 = 3.0;
pub const DEFAULT_MIN_DAILY_ASSESSMENTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertPolicy {
    /// Largest gap below a moving average that still counts as approaching it.
    pub approach_threshold: f64,
    /// Same-day assessments required before a day is evaluated at all.
    pub min_daily_assessments: usize,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            approach_threshold: DEFAULT_APPROACH_THRESHOLD,
            min_daily_assessments: DEFAULT_MIN_DAILY_ASSESSMENTS,
        }
    }
}

/// Which rule decides a high alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertVariant {
    /// Today's average is above the moving average.
    #[default]
    Threshold,
    /// Today's average is above the moving average and yesterday's was not.
    Crossover,
}

impl fmt::Display for AlertVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertVariant::Threshold => write!(f, "threshold"),
            AlertVariant::Crossover => write!(f, "crossover"),
        }
    }
}

impl FromStr for AlertVariant {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "threshold" => Ok(AlertVariant::Threshold),
            "crossover" => Ok(AlertVariant::Crossover),
            other => Err(Error::Parse(format!(
                "unknown alert variant '{other}' (expected threshold or crossover)"
            ))),
        }
    }
}

pub fn detect(
    buckets: &DailyBuckets,
    target: NaiveDate,
    policy: &AlertPolicy,
    variant: AlertVariant,
) -> AlertDetection {
    match variant {
        AlertVariant::Threshold => detect_alerts(buckets, target, policy),
        AlertVariant::Crossover => detect_crossover_alerts(buckets, target, policy),
    }
}

/// High alert when the day's average is above any moving average; otherwise
/// a low alert when it sits within the approach threshold below one.
pub fn detect_alerts(buckets: &DailyBuckets, target: NaiveDate, policy: &AlertPolicy) -> AlertDetection {
    let Some(today) = evaluable_day(buckets, target, policy) else {
        return AlertDetection::default();
    };
    let averages = buckets.moving_averages(target);

    let exceeded = triggered(&averages, |ma| today.average > ma);
    classify(&today, &averages, exceeded, policy)
}

/// Like [`detect_alerts`], but a window only raises a high alert when the
/// previous calendar day's average was at or below that same moving average.
/// No data yesterday means no crossover.
pub fn detect_crossover_alerts(
    buckets: &DailyBuckets,
    target: NaiveDate,
    policy: &AlertPolicy,
) -> AlertDetection {
    let Some(today) = evaluable_day(buckets, target, policy) else {
        return AlertDetection::default();
    };
    let averages = buckets.moving_averages(target);
    let yesterday = target.pred_opt().and_then(|day| buckets.aggregate(day));

    let crossed = match &yesterday {
        Some(previous) => triggered(&averages, |ma| today.average > ma && previous.average <= ma),
        None => Vec::new(),
    };
    classify(&today, &averages, crossed, policy)
}

fn evaluable_day(buckets: &DailyBuckets, target: NaiveDate, policy: &AlertPolicy) -> Option<DailyAggregate> {
    buckets
        .aggregate(target)
        .filter(|today| today.count >= policy.min_daily_assessments)
}

fn triggered<F>(averages: &MovingAverages, rule: F) -> Vec<TriggeredWindow>
where
    F: Fn(f64) -> bool,
{
    Window::ALL
        .into_iter()
        .filter_map(|window| {
            averages
                .get(window)
                .filter(|ma| rule(*ma))
                .map(|moving_average| TriggeredWindow { window, moving_average })
        })
        .collect()
}

fn classify(
    today: &DailyAggregate,
    averages: &MovingAverages,
    high_windows: Vec<TriggeredWindow>,
    policy: &AlertPolicy,
) -> AlertDetection {
    if !high_windows.is_empty() {
        return AlertDetection {
            evaluated: true,
            high_alert: Some(alert(AlertKind::High, today, high_windows)),
            low_alert: None,
        };
    }

    // Both sides carry one decimal, so rounding the gap keeps 3.0 exactly 3.0.
    let approached = triggered(averages, |ma| {
        let gap = round1(ma - today.average);
        gap > 0.0 && gap <= policy.approach_threshold
    });
    AlertDetection {
        evaluated: true,
        high_alert: None,
        low_alert: (!approached.is_empty()).then(|| alert(AlertKind::Low, today, approached)),
    }
}

fn alert(kind: AlertKind, today: &DailyAggregate, triggered_windows: Vec<TriggeredWindow>) -> Alert {
    Alert {
        kind,
        reference_day: today.date,
        daily_average: today.average,
        assessment_count: today.count,
        triggered_windows,
    }
}
