use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use tracing::{debug, warn};

use crate::alerts::{self, AlertPolicy, AlertVariant};
use crate::calendar::DayCalendar;
use crate::models::{AlertDetection, AssessmentRecord, DailyAggregate, MovingAverages, Window};

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Bucket {
    total: i64,
    count: usize,
}

impl Bucket {
    fn mean(&self) -> f64 {
        self.total as f64 / self.count as f64
    }
}

/// Scores grouped by calendar day. Days without records are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyBuckets {
    days: BTreeMap<NaiveDate, Bucket>,
}

impl DailyBuckets {
    pub fn from_scores<I>(scores: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, i32)>,
    {
        let mut days: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
        for (day, score) in scores {
            let entry = days.entry(day).or_default();
            entry.total += i64::from(score);
            entry.count += 1;
        }
        Self { days }
    }

    /// Most recent day with data on or before `as_of`.
    pub fn latest_on_or_before(&self, as_of: NaiveDate) -> Option<NaiveDate> {
        self.days.range(..=as_of).next_back().map(|(day, _)| *day)
    }

    pub fn days_on_or_before(&self, as_of: NaiveDate) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.range(..=as_of).rev().map(|(day, _)| *day)
    }

    pub fn aggregate(&self, day: NaiveDate) -> Option<DailyAggregate> {
        self.days.get(&day).map(|bucket| DailyAggregate {
            date: day,
            average: round1(bucket.mean()),
            count: bucket.count,
        })
    }

    pub fn aggregates(&self) -> impl Iterator<Item = DailyAggregate> + '_ {
        self.days.iter().map(|(day, bucket)| DailyAggregate {
            date: *day,
            average: round1(bucket.mean()),
            count: bucket.count,
        })
    }

    /// Mean of per-day means over `[end - window_days, end]`.
    ///
    /// `None` unless at least `ceil(window_days / 2)` days in the window
    /// have data. A window reaching past the earliest representable date is
    /// clamped to it.
    pub fn moving_average(&self, window_days: u32, end: NaiveDate) -> Option<f64> {
        let start = end
            .checked_sub_days(Days::new(u64::from(window_days)))
            .unwrap_or(NaiveDate::MIN);
        let daily_means: Vec<f64> = self
            .days
            .range(start..=end)
            .map(|(_, bucket)| bucket.mean())
            .collect();

        let required = window_days.div_ceil(2) as usize;
        if daily_means.is_empty() || daily_means.len() < required {
            return None;
        }

        let mean = daily_means.iter().sum::<f64>() / daily_means.len() as f64;
        Some(round1(mean))
    }

    pub fn moving_averages(&self, end: NaiveDate) -> MovingAverages {
        MovingAverages {
            ma7: self.moving_average(Window::Week.days(), end),
            ma14: self.moving_average(Window::Fortnight.days(), end),
            ma30: self.moving_average(Window::Month.days(), end),
        }
    }
}

/// Entry point for the trend computations over a patient's history.
///
/// Every call re-buckets the records it is given; nothing is cached between
/// calls.
#[derive(Debug, Clone, Default)]
pub struct TrendAnalytics {
    calendar: DayCalendar,
    policy: AlertPolicy,
}

impl TrendAnalytics {
    pub fn new(calendar: DayCalendar, policy: AlertPolicy) -> Self {
        Self { calendar, policy }
    }

    pub fn calendar(&self) -> &DayCalendar {
        &self.calendar
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    /// Buckets usable records by day, skipping soft-deleted ones and those
    /// with a missing score or an unparseable timestamp.
    pub fn buckets(&self, records: &[AssessmentRecord]) -> DailyBuckets {
        let scores: Vec<(NaiveDate, i32)> = records
            .iter()
            .filter_map(|record| self.day_and_score(record))
            .collect();

        let skipped = records.len() - scores.len();
        if skipped > 0 {
            debug!(skipped, total = records.len(), "excluded records from aggregation");
        }
        DailyBuckets::from_scores(scores)
    }

    fn day_and_score(&self, record: &AssessmentRecord) -> Option<(NaiveDate, i32)> {
        if record.is_deleted {
            debug!(id = %record.id, "skipping soft-deleted record");
            return None;
        }
        let Some(score) = record.total_score else {
            debug!(id = %record.id, "skipping record without a score");
            return None;
        };
        let Some(day) = record
            .completed_at
            .as_deref()
            .and_then(|timestamp| self.calendar.day_of(timestamp))
        else {
            debug!(id = %record.id, completed_at = ?record.completed_at, "skipping record with unparseable timestamp");
            return None;
        };

        if score < 0 || score > record.max_score {
            warn!(id = %record.id, score, max_score = record.max_score, "score outside instrument range");
        }
        Some((day, score))
    }

    pub fn compute_daily_average(
        &self,
        records: &[AssessmentRecord],
        target: NaiveDate,
    ) -> Option<DailyAggregate> {
        self.buckets(records).aggregate(target)
    }

    pub fn compute_moving_average(
        &self,
        records: &[AssessmentRecord],
        window_days: u32,
        end: NaiveDate,
    ) -> Option<f64> {
        self.buckets(records).moving_average(window_days, end)
    }

    pub fn moving_averages(&self, records: &[AssessmentRecord], end: NaiveDate) -> MovingAverages {
        self.buckets(records).moving_averages(end)
    }

    pub fn daily_aggregates(&self, records: &[AssessmentRecord]) -> Vec<DailyAggregate> {
        self.buckets(records).aggregates().collect()
    }

    pub fn detect_alerts(&self, records: &[AssessmentRecord], target: NaiveDate) -> AlertDetection {
        alerts::detect_alerts(&self.buckets(records), target, &self.policy)
    }

    pub fn detect_crossover_alerts(
        &self,
        records: &[AssessmentRecord],
        target: NaiveDate,
    ) -> AlertDetection {
        alerts::detect_crossover_alerts(&self.buckets(records), target, &self.policy)
    }

    pub fn detect(
        &self,
        records: &[AssessmentRecord],
        target: NaiveDate,
        variant: AlertVariant,
    ) -> AlertDetection {
        alerts::detect(&self.buckets(records), target, &self.policy, variant)
    }
}
