use std::io::Write;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Alert, AlertDetection, AlertKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub alert: Alert,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn matches(&self, date: NaiveDate, kind: AlertKind) -> bool {
        self.alert.reference_day == date && self.alert.kind == kind
    }
}

/// Emitted alerts and their read state, owned by whoever calls the analytics.
///
/// At most one entry exists per `(day, kind)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertLedger {
    entries: Vec<LedgerEntry>,
}

impl AlertLedger {
    /// A missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no alert ledger yet");
            return Ok(Self::default());
        }
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn unread(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().filter(|entry| !entry.is_read)
    }

    pub fn mark_read(&mut self, id: Uuid) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.is_read = true;
                true
            }
            None => false,
        }
    }

    /// Folds a fresh detection for `date` into the ledger and returns the
    /// entries that were newly created.
    ///
    /// A detection for a day that was never evaluated leaves the ledger
    /// untouched. Otherwise unread alerts from earlier days are marked read,
    /// and for `date` itself each kind is updated and flagged unread again
    /// while it still fires, and removed once it stops.
    pub fn reconcile(&mut self, date: NaiveDate, detection: &AlertDetection) -> Vec<LedgerEntry> {
        if !detection.evaluated {
            debug!(%date, "too few assessments to evaluate, ledger unchanged");
            return Vec::new();
        }

        let mut resolved = 0usize;
        for entry in self
            .entries
            .iter_mut()
            .filter(|entry| !entry.is_read && entry.alert.reference_day < date)
        {
            entry.is_read = true;
            resolved += 1;
        }
        if resolved > 0 {
            info!(resolved, %date, "marked earlier alerts as read");
        }

        let mut created = Vec::new();
        for kind in [AlertKind::High, AlertKind::Low] {
            match detection.get(kind) {
                Some(alert) => {
                    if let Some(index) = self.entries.iter().position(|e| e.matches(date, kind)) {
                        let existing = &mut self.entries[index];
                        existing.alert = alert.clone();
                        existing.is_read = false;
                    } else {
                        let entry = LedgerEntry {
                            id: Uuid::new_v4(),
                            alert: alert.clone(),
                            is_read: false,
                            created_at: Utc::now(),
                        };
                        info!(%date, %kind, windows = %alert.windows_label(), "new score alert");
                        created.push(entry.clone());
                        self.entries.push(entry);
                    }
                }
                None => {
                    let before = self.entries.len();
                    self.entries.retain(|entry| !entry.matches(date, kind));
                    if self.entries.len() < before {
                        info!(%date, %kind, "alert no longer applies, removed");
                    }
                }
            }
        }
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TriggeredWindow, Window};

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, n).unwrap()
    }

    fn alert(kind: AlertKind, date: NaiveDate, daily_average: f64) -> Alert {
        Alert {
            kind,
            reference_day: date,
            daily_average,
            assessment_count: 3,
            triggered_windows: vec![TriggeredWindow {
                window: Window::Week,
                moving_average: 15.0,
            }],
        }
    }

    fn high(date: NaiveDate, daily_average: f64) -> AlertDetection {
        AlertDetection {
            evaluated: true,
            high_alert: Some(alert(AlertKind::High, date, daily_average)),
            low_alert: None,
        }
    }

    #[test]
    fn creates_then_updates_same_day_alert() {
        let mut ledger = AlertLedger::default();
        let created = ledger.reconcile(day(1), &high(day(1), 18.0));
        assert_eq!(created.len(), 1);

        ledger.mark_read(created[0].id);
        assert_eq!(ledger.unread().count(), 0);

        let created = ledger.reconcile(day(1), &high(day(1), 19.5));
        assert!(created.is_empty());
        assert_eq!(ledger.entries().len(), 1);
        assert_eq!(ledger.entries()[0].alert.daily_average, 19.5);
        assert!(!ledger.entries()[0].is_read);
    }

    #[test]
    fn removes_alert_that_stopped_firing() {
        let mut ledger = AlertLedger::default();
        ledger.reconcile(day(1), &high(day(1), 18.0));
        let quiet = AlertDetection {
            evaluated: true,
            ..AlertDetection::default()
        };
        ledger.reconcile(day(1), &quiet);
        assert!(ledger.entries().is_empty());
    }

    #[test]
    fn newer_day_resolves_earlier_unread_alerts() {
        let mut ledger = AlertLedger::default();
        ledger.reconcile(day(1), &high(day(1), 18.0));
        let low = AlertDetection {
            evaluated: true,
            high_alert: None,
            low_alert: Some(alert(AlertKind::Low, day(2), 13.0)),
        };
        ledger.reconcile(day(2), &low);

        let unread: Vec<_> = ledger.unread().collect();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].alert.kind, AlertKind::Low);
        assert_eq!(ledger.entries().len(), 2);
    }

    #[test]
    fn unevaluated_day_keeps_earlier_unread_and_same_day_alerts() {
        let mut ledger = AlertLedger::default();
        ledger.reconcile(day(7), &high(day(7), 18.0));

        // no assessments yet on day 8
        let created = ledger.reconcile(day(8), &AlertDetection::default());
        assert!(created.is_empty());
        assert_eq!(ledger.unread().count(), 1);

        // a soft-delete leaves day 7 below the same-day floor
        ledger.reconcile(day(7), &AlertDetection::default());
        assert_eq!(ledger.entries().len(), 1);
        assert!(!ledger.entries()[0].is_read);
    }

    #[test]
    fn mark_read_reports_unknown_ids() {
        let mut ledger = AlertLedger::default();
        assert!(!ledger.mark_read(Uuid::new_v4()));
    }

    #[test]
    fn survives_a_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");

        assert_eq!(AlertLedger::load(&path).unwrap(), AlertLedger::default());

        let mut ledger = AlertLedger::default();
        ledger.reconcile(day(3), &high(day(3), 21.0));
        ledger.save(&path).unwrap();
        assert_eq!(AlertLedger::load(&path).unwrap(), ledger);
    }
}
