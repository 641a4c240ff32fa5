use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::has_open_period;
use crate::models::{DateEntry, Timeline};

/// The three marking buttons offered for a selected day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionAction {
    MarkStart,
    MarkEnd,
    MarkOther,
}

impl SelectionAction {
    pub fn timeline(self) -> Timeline {
        match self {
            SelectionAction::MarkStart => Timeline::Start,
            SelectionAction::MarkEnd => Timeline::End,
            SelectionAction::MarkOther => Timeline::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledReason {
    PeriodAlreadyOpen,
    NoOpenPeriod,
    NotAfterLatestPeriodDay,
    NotAfterPeriodStart,
    BeforeLatestPeriodDay,
    SameDayAsLatestPeriodDay,
    InTheFuture,
    OnProjectedDay,
    StartBeforeProjectedWindow,
}

impl fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            DisabledReason::PeriodAlreadyOpen => "a period is already in progress",
            DisabledReason::NoOpenPeriod => "no period is in progress",
            DisabledReason::NotAfterLatestPeriodDay => "day must come after the last tracked period day",
            DisabledReason::NotAfterPeriodStart => "day must come after the period start",
            DisabledReason::BeforeLatestPeriodDay => "day is earlier than the last tracked period day",
            DisabledReason::SameDayAsLatestPeriodDay => "day is already the last tracked period day",
            DisabledReason::InTheFuture => "day is in the future",
            DisabledReason::OnProjectedDay => "day is a projected fertile or ovulation day",
            DisabledReason::StartBeforeProjectedWindow => {
                "a new period cannot start before a projected fertile or ovulation day"
            }
        };
        f.write_str(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DisabledReason>,
}

impl Verdict {
    fn enabled() -> Self {
        Self { enabled: true, reason: None }
    }

    fn disabled(reason: DisabledReason) -> Self {
        Self { enabled: false, reason: Some(reason) }
    }
}

/// Snapshot of the history facts every candidate is checked against.
#[derive(Debug, Clone)]
pub struct SelectionContext {
    today: NaiveDate,
    open_period: bool,
    latest_period_day: Option<NaiveDate>,
    latest_start: Option<NaiveDate>,
    projected_days: HashSet<NaiveDate>,
    latest_projected_day: Option<NaiveDate>,
}

impl SelectionContext {
    pub fn new(entries: &[DateEntry], today: NaiveDate) -> Self {
        let periods = entries.iter().filter(|entry| entry.is_period());
        let latest_period_day = periods.clone().map(|entry| entry.date).max();
        let latest_start = periods
            .filter(|entry| entry.timeline == Some(Timeline::Start))
            .map(|entry| entry.date)
            .max();
        let projected_days: HashSet<NaiveDate> = entries
            .iter()
            .filter(|entry| entry.is_derived())
            .map(|entry| entry.date)
            .collect();
        let latest_projected_day = projected_days.iter().copied().max();

        Self {
            today,
            open_period: has_open_period(entries),
            latest_period_day,
            latest_start,
            projected_days,
            latest_projected_day,
        }
    }

    pub fn has_open_period(&self) -> bool {
        self.open_period
    }

    /// Base eligibility first, then the vetoes. The first failing rule is
    /// reported.
    pub fn check(&self, date: NaiveDate, action: SelectionAction) -> Verdict {
        if let Some(reason) = self.base_rule(date, action).or_else(|| self.veto(date, action)) {
            return Verdict::disabled(reason);
        }
        Verdict::enabled()
    }

    fn base_rule(&self, date: NaiveDate, action: SelectionAction) -> Option<DisabledReason> {
        match action {
            SelectionAction::MarkStart if self.open_period => Some(DisabledReason::PeriodAlreadyOpen),
            SelectionAction::MarkStart => None,
            _ if !self.open_period => Some(DisabledReason::NoOpenPeriod),
            SelectionAction::MarkEnd => match self.latest_period_day {
                Some(latest) if date > latest => self.not_in_future(date),
                _ => Some(DisabledReason::NotAfterLatestPeriodDay),
            },
            SelectionAction::MarkOther => match self.latest_start {
                Some(start) if date > start => self.not_in_future(date),
                _ => Some(DisabledReason::NotAfterPeriodStart),
            },
        }
    }

    fn not_in_future(&self, date: NaiveDate) -> Option<DisabledReason> {
        (date > self.today).then_some(DisabledReason::InTheFuture)
    }

    fn veto(&self, date: NaiveDate, action: SelectionAction) -> Option<DisabledReason> {
        if let Some(latest) = self.latest_period_day {
            if date < latest {
                return Some(DisabledReason::BeforeLatestPeriodDay);
            }
            if date == latest {
                return Some(DisabledReason::SameDayAsLatestPeriodDay);
            }
        }
        if date > self.today {
            return Some(DisabledReason::InTheFuture);
        }
        if self.projected_days.contains(&date) {
            return Some(DisabledReason::OnProjectedDay);
        }
        if action == SelectionAction::MarkStart
            && self.latest_projected_day.is_some_and(|projected| date < projected)
        {
            return Some(DisabledReason::StartBeforeProjectedWindow);
        }
        None
    }
}

/// One-shot form of [`SelectionContext::check`].
pub fn check_selection(
    entries: &[DateEntry],
    today: NaiveDate,
    date: NaiveDate,
    action: SelectionAction,
) -> Verdict {
    SelectionContext::new(entries, today).check(date, action)
}
