use std::fmt::Write;

use chrono::NaiveDate;

use crate::alerts::{AlertPolicy, AlertVariant};
use crate::models::{Alert, AlertKind, Window};
use crate::series;
use crate::trend::DailyBuckets;

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.1}"),
        None => "insufficient data".to_string(),
    }
}

fn describe_alert(alert: &Alert) -> String {
    let heading = match alert.kind {
        AlertKind::High => "High alert: daily average above",
        AlertKind::Low => "Low alert: daily average approaching",
    };
    format!(
        "{} {} (daily average {:.1} over {} assessments)",
        heading,
        alert.windows_label(),
        alert.daily_average,
        alert.assessment_count
    )
}

pub fn build_report(
    label: Option<&str>,
    as_of: NaiveDate,
    days: u32,
    buckets: &DailyBuckets,
    policy: &AlertPolicy,
    variant: AlertVariant,
) -> String {
    let summary = series::summarize(buckets, as_of, policy, variant);
    let points = series::recent_series(buckets, as_of, days);

    let mut output = String::new();
    let label = label.unwrap_or("patient");

    let _ = writeln!(output, "# Assessment Trend Report");
    let _ = writeln!(output, "Generated for {} (as of {})", label, as_of);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Moving Averages");

    for window in Window::ALL {
        let _ = writeln!(
            output,
            "- {}: {}",
            window,
            format_value(summary.averages.get(window))
        );
    }
    match &summary.latest {
        Some(latest) => {
            let _ = writeln!(
                output,
                "- Latest day {}: average {:.1} over {} assessments",
                latest.date, latest.average, latest.count
            );
        }
        None => {
            let _ = writeln!(output, "- No assessments recorded yet.");
        }
    }
    let _ = writeln!(
        output,
        "- Streak: {} consecutive days, {} days with data",
        summary.streak, summary.days_with_data
    );
    if !summary.has_sufficient_data {
        let _ = writeln!(
            output,
            "- Fewer than {} days of data; trends are provisional.",
            series::SUFFICIENT_DATA_DAYS
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alerts ({variant})");

    if summary.detection.is_empty() {
        let _ = writeln!(output, "No alerts for {}.", as_of);
    } else {
        for alert in summary.detection.alerts() {
            let _ = writeln!(output, "- {}", describe_alert(alert));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Scores");

    if points.iter().all(|point| point.daily_average.is_none()) {
        let _ = writeln!(output, "No assessments in the last {} days.", days);
    } else {
        for point in points.iter().rev() {
            match point.daily_average {
                Some(average) => {
                    let _ = writeln!(
                        output,
                        "- {}: {:.1} ({} assessments) | MA7 {} | MA14 {} | MA30 {}",
                        point.date,
                        average,
                        point.count,
                        format_value(point.averages.ma7),
                        format_value(point.averages.ma14),
                        format_value(point.averages.ma30)
                    );
                }
                None => {
                    let _ = writeln!(output, "- {}: no data", point.date);
                }
            }
        }
    }

    output
}
