use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 14 questions, 4 points each.
pub const DEFAULT_MAX_SCORE: i32 = 56;

/// One completed questionnaire as delivered by the history API.
///
/// `total_score` and `completed_at` stay optional and unparsed here; records
/// missing either are dropped when the analytics bucket them by day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: String,
    pub total_score: Option<i32>,
    pub max_score: i32,
    pub completed_at: Option<String>,
    pub level: Option<String>,
    pub is_deleted: bool,
}

impl AssessmentRecord {
    pub fn new(id: impl Into<String>, total_score: i32, completed_at: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            total_score: Some(total_score),
            max_score: DEFAULT_MAX_SCORE,
            completed_at: Some(completed_at.into()),
            level: None,
            is_deleted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub average: f64,
    pub count: usize,
}

/// Moving-average windows shown on the dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "14d")]
    Fortnight,
    #[serde(rename = "30d")]
    Month,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Week, Window::Fortnight, Window::Month];

    pub fn days(self) -> u32 {
        match self {
            Window::Week => 7,
            Window::Fortnight => 14,
            Window::Month => 30,
        }
    }

    pub fn from_days(days: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|window| window.days() == days)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MA{}", self.days())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MovingAverages {
    pub ma7: Option<f64>,
    pub ma14: Option<f64>,
    pub ma30: Option<f64>,
}

impl MovingAverages {
    pub fn get(&self, window: Window) -> Option<f64> {
        match window {
            Window::Week => self.ma7,
            Window::Fortnight => self.ma14,
            Window::Month => self.ma30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// Daily average above a moving average.
    High,
    /// Daily average just below a moving average.
    Low,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::High => write!(f, "high"),
            AlertKind::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggeredWindow {
    pub window: Window,
    pub moving_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub reference_day: NaiveDate,
    pub daily_average: f64,
    pub assessment_count: usize,
    pub triggered_windows: Vec<TriggeredWindow>,
}

impl Alert {
    pub fn windows_label(&self) -> String {
        self.triggered_windows
            .iter()
            .map(|t| format!("{} {:.1}", t.window, t.moving_average))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// At most one of `high_alert` / `low_alert` is ever set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertDetection {
    /// False when the day had too few assessments to be checked at all.
    #[serde(default)]
    pub evaluated: bool,
    pub high_alert: Option<Alert>,
    pub low_alert: Option<Alert>,
}

impl AlertDetection {
    pub fn is_empty(&self) -> bool {
        self.high_alert.is_none() && self.low_alert.is_none()
    }

    pub fn get(&self, kind: AlertKind) -> Option<&Alert> {
        match kind {
            AlertKind::High => self.high_alert.as_ref(),
            AlertKind::Low => self.low_alert.as_ref(),
        }
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.high_alert.iter().chain(self.low_alert.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub daily_average: Option<f64>,
    pub count: usize,
    #[serde(flatten)]
    pub averages: MovingAverages,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub as_of: NaiveDate,
    pub latest: Option<DailyAggregate>,
    pub averages: MovingAverages,
    pub detection: AlertDetection,
    pub days_with_data: usize,
    pub streak: u32,
    pub has_sufficient_data: bool,
}
