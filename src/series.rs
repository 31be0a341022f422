use chrono::{Days, NaiveDate};
use tracing::warn;

use crate::alerts::{self, AlertPolicy, AlertVariant};
use crate::models::{ChartPoint, TrendSummary};
use crate::trend::DailyBuckets;

/// Days of distinct data before a trend is considered established.
pub const SUFFICIENT_DATA_DAYS: usize = 7;

/// Dashboard default for the recent-days chart.
pub const DEFAULT_SERIES_DAYS: u32 = 30;

/// One point per calendar day in `[start, end]`, gaps included.
pub fn chart_series(buckets: &DailyBuckets, start: NaiveDate, end: NaiveDate) -> Vec<ChartPoint> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|day| {
            let aggregate = buckets.aggregate(day);
            ChartPoint {
                date: day,
                daily_average: aggregate.as_ref().map(|a| a.average),
                count: aggregate.map(|a| a.count).unwrap_or(0),
                averages: buckets.moving_averages(day),
            }
        })
        .collect()
}

/// The last `days` calendar days ending at `end`.
pub fn recent_series(buckets: &DailyBuckets, end: NaiveDate, days: u32) -> Vec<ChartPoint> {
    if days == 0 {
        return Vec::new();
    }
    match end.checked_sub_days(Days::new(u64::from(days) - 1)) {
        Some(start) => chart_series(buckets, start, end),
        None => {
            warn!(%end, days, "series reaches before the earliest supported date");
            Vec::new()
        }
    }
}

/// Consecutive days with data, counted back from the latest one.
///
/// A gap of more than one day before `as_of` breaks the streak, so a patient
/// who has not assessed yet today still keeps yesterday's run.
pub fn streak(buckets: &DailyBuckets, as_of: NaiveDate) -> u32 {
    let mut days = buckets.days_on_or_before(as_of);
    let Some(latest) = days.next() else {
        return 0;
    };
    if (as_of - latest).num_days() > 1 {
        return 0;
    }

    let mut count = 1;
    let mut previous = latest;
    for day in days {
        if (previous - day).num_days() != 1 {
            break;
        }
        count += 1;
        previous = day;
    }
    count
}

pub fn summarize(
    buckets: &DailyBuckets,
    as_of: NaiveDate,
    policy: &AlertPolicy,
    variant: AlertVariant,
) -> TrendSummary {
    let days_with_data = buckets.days_on_or_before(as_of).count();

    TrendSummary {
        as_of,
        latest: buckets
            .latest_on_or_before(as_of)
            .and_then(|day| buckets.aggregate(day)),
        averages: buckets.moving_averages(as_of),
        detection: alerts::detect(buckets, as_of, policy, variant),
        days_with_data,
        streak: streak(buckets, as_of),
        has_sufficient_data: days_with_data >= SUFFICIENT_DATA_DAYS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    #[test]
    fn series_keeps_empty_days_distinct_from_zero() {
        let buckets = DailyBuckets::from_scores(vec![(day(1), 0), (day(3), 12)]);
        let series = chart_series(&buckets, day(1), day(3));

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].daily_average, Some(0.0));
        assert_eq!(series[1].daily_average, None);
        assert_eq!(series[1].count, 0);
        assert_eq!(series[2].daily_average, Some(12.0));
    }

    #[test]
    fn series_carries_moving_averages_per_day() {
        let scores: Vec<_> = (1..=7).map(|n| (day(n), 8 + 2 * n as i32)).collect();
        let buckets = DailyBuckets::from_scores(scores);
        let series = recent_series(&buckets, day(7), 7);

        assert_eq!(series.first().unwrap().date, day(1));
        assert_eq!(series[2].averages.ma7, None);
        assert_eq!(series[3].averages.ma7, Some(13.0));
        assert_eq!(series[6].averages.ma7, Some(16.0));
        assert_eq!(series[6].averages.ma30, None);
    }

    #[test]
    fn series_length_beyond_the_calendar_is_empty() {
        let buckets = DailyBuckets::from_scores(vec![(day(1), 10)]);
        assert!(recent_series(&buckets, day(1), u32::MAX).is_empty());
        assert!(recent_series(&buckets, day(1), 0).is_empty());
        assert_eq!(recent_series(&buckets, day(1), 1).len(), 1);
    }

    #[test]
    fn streak_tolerates_a_missing_today() {
        let buckets = DailyBuckets::from_scores(vec![
            (day(2), 10),
            (day(4), 10),
            (day(5), 10),
            (day(6), 10),
        ]);
        assert_eq!(streak(&buckets, day(6)), 3);
        assert_eq!(streak(&buckets, day(7)), 3);
        assert_eq!(streak(&buckets, day(8)), 0);
        assert_eq!(streak(&buckets, day(4)), 1);
        assert_eq!(streak(&DailyBuckets::default(), day(4)), 0);
    }

    #[test]
    fn summary_reports_latest_day_and_sufficiency() {
        let scores: Vec<_> = (1..=6).map(|n| (day(n), 20)).collect();
        let buckets = DailyBuckets::from_scores(scores);
        let summary = summarize(&buckets, day(7), &AlertPolicy::default(), AlertVariant::Threshold);

        assert_eq!(summary.latest.as_ref().unwrap().date, day(6));
        assert_eq!(summary.days_with_data, 6);
        assert!(!summary.has_sufficient_data);
        assert_eq!(summary.averages.ma7, Some(20.0));
        assert!(summary.detection.is_empty());
        assert_eq!(summary.streak, 6);
    }
}
