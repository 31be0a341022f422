use chrono::FixedOffset;

use crate::alerts::{AlertPolicy, DEFAULT_APPROACH_THRESHOLD, DEFAULT_MIN_DAILY_ASSESSMENTS};
use crate::calendar::{parse_offset, DayCalendar};
use crate::error::{Error, Result};
use crate::trend::TrendAnalytics;

/// Clinic local time. Days are bucketed here unless configured otherwise.
pub const DEFAULT_UTC_OFFSET: &str = "+08:00";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub utc_offset: FixedOffset,
    pub approach_threshold: f64,
    pub min_daily_assessments: usize,
}

impl Config {
    pub fn new(utc_offset: &str, approach_threshold: f64, min_daily_assessments: usize) -> Result<Self> {
        let utc_offset = parse_offset(utc_offset).map_err(|err| Error::Config(err.to_string()))?;

        if !approach_threshold.is_finite() || approach_threshold <= 0.0 {
            return Err(Error::Config(format!(
                "approach threshold must be a positive number, got {approach_threshold}"
            )));
        }
        if min_daily_assessments == 0 {
            return Err(Error::Config(
                "minimum daily assessments must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            utc_offset,
            approach_threshold,
            min_daily_assessments,
        })
    }

    pub fn calendar(&self) -> DayCalendar {
        DayCalendar::new(self.utc_offset)
    }

    pub fn policy(&self) -> AlertPolicy {
        AlertPolicy {
            approach_threshold: self.approach_threshold,
            min_daily_assessments: self.min_daily_assessments,
        }
    }

    pub fn analytics(&self) -> TrendAnalytics {
        TrendAnalytics::new(self.calendar(), self.policy())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            utc_offset: DayCalendar::default().offset(),
            approach_threshold: DEFAULT_APPROACH_THRESHOLD,
            min_daily_assessments: DEFAULT_MIN_DAILY_ASSESSMENTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_parsed_defaults() {
        let parsed = Config::new(
            DEFAULT_UTC_OFFSET,
            DEFAULT_APPROACH_THRESHOLD,
            DEFAULT_MIN_DAILY_ASSESSMENTS,
        )
        .unwrap();
        assert_eq!(parsed, Config::default());
        assert_eq!(parsed.policy(), AlertPolicy::default());
    }

    #[test]
    fn library_and_cli_defaults_share_a_calendar() {
        let analytics = TrendAnalytics::default();
        assert_eq!(analytics.calendar(), &Config::default().calendar());
        assert_eq!(analytics.policy(), &Config::default().policy());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(Config::new("nowhere", 3.0, 3), Err(Error::Config(_))));
        assert!(matches!(Config::new("Z", 0.0, 3), Err(Error::Config(_))));
        assert!(matches!(Config::new("Z", f64::NAN, 3), Err(Error::Config(_))));
        assert!(matches!(Config::new("Z", 3.0, 0), Err(Error::Config(_))));
    }
}
