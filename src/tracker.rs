use chrono::{NaiveDate, TimeZone};
use serde::Serialize;
use tracing::warn;

use crate::engine::{self, DashboardMetrics};
use crate::models::{DateEntry, Flow, MalformedEntryError, StoredEntry, Timeline};
use crate::validator::{DisabledReason, SelectionAction, SelectionContext, Verdict};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackerError {
    #[error("selection rejected: {0}")]
    SelectionRejected(DisabledReason),
    #[error("nothing tracked on {0}")]
    NothingToDelete(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Mark {
        date: NaiveDate,
        action: SelectionAction,
        flow: Option<Flow>,
    },
    Delete {
        date: NaiveDate,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The period is still open after the mark.
    ComeBackTomorrow,
    PeriodCompleted,
    Deleted { removed: usize },
}

/// Loaded entries plus the records that failed to decode.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<MalformedEntryError>,
}

/// Owns one user's entries. Every mutation ends with a derive step, so
/// projected entries always reflect the current period marks.
#[derive(Debug, Clone)]
pub struct CycleTracker {
    entries: Vec<DateEntry>,
    ovulation_day: i64,
}

impl CycleTracker {
    pub fn new(ovulation_day: i64) -> Self {
        Self { entries: Vec::new(), ovulation_day }
    }

    /// Builds a tracker from persisted records, skipping the malformed ones.
    pub fn load<Tz: TimeZone>(
        records: Vec<serde_json::Value>,
        tz: &Tz,
        ovulation_day: i64,
    ) -> (Self, LoadReport) {
        let mut tracker = Self::new(ovulation_day);
        let mut report = LoadReport::default();

        for record in records {
            match StoredEntry::from_value(record, tz) {
                Ok(entry)
                    if entry.timeline == Some(Timeline::Start)
                        && engine::project_cycle(entry.date, ovulation_day).is_none() =>
                {
                    let e = MalformedEntryError::OutOfRange(entry.day_key());
                    warn!("⚠️ Skipping malformed stored entry: {}", e);
                    report.skipped.push(e);
                }
                Ok(entry) if entry.is_period() => {
                    tracker.upsert_period(entry);
                    report.loaded += 1;
                }
                Ok(entry) => {
                    warn!("⚠️ Ignoring stored {:?} entry on {}", entry.category, entry.day_key());
                }
                Err(e) => {
                    warn!("⚠️ Skipping malformed stored entry: {}", e);
                    report.skipped.push(e);
                }
            }
        }

        tracker.derive();
        (tracker, report)
    }

    pub fn entries(&self) -> &[DateEntry] {
        &self.entries
    }

    pub fn period_entries(&self) -> impl Iterator<Item = &DateEntry> {
        self.entries.iter().filter(|entry| entry.is_period())
    }

    /// No period entries tracked, so nothing worth persisting or caching.
    pub fn is_empty(&self) -> bool {
        self.period_entries().next().is_none()
    }

    pub fn period_on(&self, date: NaiveDate) -> Option<&DateEntry> {
        self.period_entries().find(|entry| entry.date == date)
    }

    pub fn derived_on(&self, date: NaiveDate) -> impl Iterator<Item = &DateEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.is_derived() && entry.date == date)
    }

    pub fn has_open_period(&self) -> bool {
        engine::has_open_period(&self.entries)
    }

    pub fn metrics(&self, today: NaiveDate) -> DashboardMetrics {
        DashboardMetrics::compute(&self.entries, today, self.ovulation_day)
    }

    pub fn selection(&self, today: NaiveDate) -> SelectionContext {
        SelectionContext::new(&self.entries, today)
    }

    pub fn check(&self, today: NaiveDate, date: NaiveDate, action: SelectionAction) -> Verdict {
        self.selection(today).check(date, action)
    }

    /// Records for the persistence layer: period entries only.
    pub fn stored_records<Tz: TimeZone>(&self, tz: &Tz) -> Vec<StoredEntry> {
        self.period_entries()
            .map(|entry| StoredEntry::encode(entry, tz))
            .collect()
    }

    pub fn apply(&mut self, command: Command, today: NaiveDate) -> Result<Outcome, TrackerError> {
        match command {
            Command::Mark { date, action, flow } => {
                let verdict = self.check(today, date, action);
                if let Some(reason) = verdict.reason {
                    return Err(TrackerError::SelectionRejected(reason));
                }
                self.upsert_period(DateEntry::period(date, Some(action.timeline()), flow));
                self.derive();
                Ok(if self.has_open_period() {
                    Outcome::ComeBackTomorrow
                } else {
                    Outcome::PeriodCompleted
                })
            }
            Command::Delete { date } => {
                let before = self.entries.len();
                self.entries
                    .retain(|entry| !(entry.is_period() && entry.date == date));
                let removed = before - self.entries.len();
                if removed == 0 {
                    return Err(TrackerError::NothingToDelete(date));
                }
                self.derive();
                Ok(Outcome::Deleted { removed })
            }
        }
    }

    /// A new period entry replaces whatever was tracked on that day.
    fn upsert_period(&mut self, entry: DateEntry) {
        self.entries.retain(|existing| existing.date != entry.date);
        self.entries.push(entry);
    }

    fn derive(&mut self) {
        engine::recompute_derived_entries(&mut self.entries, self.ovulation_day);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Countdown, DEFAULT_OVULATION_DAY};
    use crate::models::{Category, Timeline};
    use chrono::Utc;
    use serde_json::json;

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn mark(day: u32, action: SelectionAction) -> Command {
        Command::Mark { date: jan(day), action, flow: Some(Flow::Medium) }
    }

    #[test]
    fn full_period_flow() {
        let mut tracker = CycleTracker::new(DEFAULT_OVULATION_DAY);

        let outcome = tracker.apply(mark(1, SelectionAction::MarkStart), jan(1)).unwrap();
        assert_eq!(outcome, Outcome::ComeBackTomorrow);
        assert_eq!(tracker.entries().len(), 6);

        let outcome = tracker.apply(mark(2, SelectionAction::MarkOther), jan(2)).unwrap();
        assert_eq!(outcome, Outcome::ComeBackTomorrow);

        let outcome = tracker.apply(mark(4, SelectionAction::MarkEnd), jan(4)).unwrap();
        assert_eq!(outcome, Outcome::PeriodCompleted);
        assert!(!tracker.has_open_period());
        assert_eq!(tracker.period_entries().count(), 3);
        assert_eq!(tracker.derived_on(jan(14)).count(), 1);

        let metrics = tracker.metrics(jan(13));
        assert_eq!(metrics.days_until_ovulation, Some(Countdown::Days(2)));
    }

    #[test]
    fn rejected_mark_leaves_state_untouched() {
        let mut tracker = CycleTracker::new(DEFAULT_OVULATION_DAY);
        tracker.apply(mark(1, SelectionAction::MarkStart), jan(1)).unwrap();
        let before = tracker.entries().to_vec();

        let err = tracker.apply(mark(5, SelectionAction::MarkStart), jan(6)).unwrap_err();
        assert_eq!(err, TrackerError::SelectionRejected(DisabledReason::PeriodAlreadyOpen));
        assert_eq!(tracker.entries(), before.as_slice());
    }

    #[test]
    fn delete_removes_the_day_and_its_projection() {
        let mut tracker = CycleTracker::new(DEFAULT_OVULATION_DAY);
        tracker.apply(mark(1, SelectionAction::MarkStart), jan(1)).unwrap();

        let outcome = tracker.apply(Command::Delete { date: jan(1) }, jan(2)).unwrap();
        assert_eq!(outcome, Outcome::Deleted { removed: 1 });
        assert!(tracker.entries().is_empty());

        let err = tracker.apply(Command::Delete { date: jan(1) }, jan(2)).unwrap_err();
        assert_eq!(err, TrackerError::NothingToDelete(jan(1)));
    }

    #[test]
    fn load_skips_malformed_records_and_derives() {
        let records = vec![
            json!({ "date": "1704067200.0", "dateType": "period", "timeline": "Start", "flowType": "heavy" }),
            json!({ "dateType": "period", "timeline": "End" }),
            json!({ "date": "1704067200.0", "dateType": "ovulation" }),
            json!("garbage"),
        ];
        let (tracker, report) = CycleTracker::load(records, &Utc, DEFAULT_OVULATION_DAY);

        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(tracker.period_entries().count(), 1);
        assert_eq!(tracker.entries().iter().filter(|e| e.is_derived()).count(), 5);
        assert!(tracker.has_open_period());
    }

    #[test]
    fn start_at_the_calendar_edge_is_skipped() {
        let last = Utc
            .from_utc_datetime(&NaiveDate::MAX.and_time(chrono::NaiveTime::MIN))
            .timestamp();
        let records = vec![
            json!({ "date": format!("{last}.0"), "dateType": "period", "timeline": "Start" }),
            json!({ "date": "1704067200.0", "dateType": "period", "timeline": "Start" }),
        ];
        let (tracker, report) = CycleTracker::load(records, &Utc, DEFAULT_OVULATION_DAY);

        assert_eq!(report.loaded, 1);
        assert!(matches!(report.skipped.as_slice(), [MalformedEntryError::OutOfRange(_)]));
        assert!(tracker.period_on(NaiveDate::MAX).is_none());
        assert_eq!(tracker.entries().iter().filter(|e| e.is_derived()).count(), 5);
    }

    #[test]
    fn duplicate_stored_days_collapse_to_the_last_one() {
        let records = vec![
            json!({ "date": "1704067200.0", "dateType": "period", "timeline": "Start" }),
            json!({ "date": "1704070800.0", "dateType": "period", "timeline": "Just another day" }),
        ];
        let (tracker, _) = CycleTracker::load(records, &Utc, DEFAULT_OVULATION_DAY);
        let entry = tracker.period_on(jan(1)).unwrap();
        assert_eq!(entry.timeline, Some(Timeline::Other));
    }

    #[test]
    fn stored_records_hold_period_entries_only() {
        let mut tracker = CycleTracker::new(DEFAULT_OVULATION_DAY);
        tracker.apply(mark(1, SelectionAction::MarkStart), jan(1)).unwrap();

        let records = tracker.stored_records(&Utc);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date_type.as_deref(), Some(Category::Period.as_str()));
    }
}
