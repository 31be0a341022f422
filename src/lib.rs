pub mod alerts;
pub mod calendar;
pub mod config;
pub mod error;
pub mod import;
pub mod ledger;
pub mod models;
pub mod report;
pub mod series;
pub mod trend;

pub use alerts::{AlertPolicy, AlertVariant};
pub use calendar::DayCalendar;
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::AlertLedger;
pub use models::{
    Alert, AlertDetection, AlertKind, AssessmentRecord, ChartPoint, DailyAggregate, MovingAverages,
    TrendSummary, TriggeredWindow, Window,
};
pub use trend::{DailyBuckets, TrendAnalytics};
