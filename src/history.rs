use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{DateEntry, Flow, Timeline};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodDay {
    pub date: NaiveDate,
    pub timeline: Option<Timeline>,
    pub flow: Option<Flow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub open: bool,
    pub days: Vec<PeriodDay>,
}

impl TrackedPeriod {
    /// Days spanned, both ends included.
    pub fn length(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleStat {
    pub cycle_number: usize,
    pub period_length: i64,
    pub cycle_length: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodHistory {
    pub periods: Vec<TrackedPeriod>,
    pub cycle_stats: Vec<CycleStat>,
    pub average_period_length: f64,
    pub average_cycle_length: f64,
}

/// Groups period days into periods. A Start opens a period, an End closes
/// it; days marked outside any period are dropped.
pub fn group_periods(entries: &[DateEntry]) -> Vec<TrackedPeriod> {
    let mut days: Vec<&DateEntry> = entries.iter().filter(|entry| entry.is_period()).collect();
    days.sort_by_key(|entry| entry.date);

    let mut grouped = Vec::new();
    let mut current: Vec<PeriodDay> = Vec::new();

    for entry in days {
        let day = PeriodDay { date: entry.date, timeline: entry.timeline, flow: entry.flow };
        match entry.timeline {
            Some(Timeline::Start) => {
                if let Some(period) = close(&mut current, true) {
                    grouped.push(period);
                }
                current.push(day);
            }
            Some(Timeline::End) if !current.is_empty() => {
                current.push(day);
                if let Some(period) = close(&mut current, false) {
                    grouped.push(period);
                }
            }
            _ if !current.is_empty() => current.push(day),
            _ => {}
        }
    }

    if let Some(period) = close(&mut current, true) {
        grouped.push(period);
    }
    grouped
}

fn close(current: &mut Vec<PeriodDay>, open: bool) -> Option<TrackedPeriod> {
    let start_date = current.first()?.date;
    let end_date = current.last()?.date;
    Some(TrackedPeriod { start_date, end_date, open, days: current.drain(..).collect() })
}

pub fn period_history(entries: &[DateEntry]) -> PeriodHistory {
    let periods = group_periods(entries);

    let cycle_stats: Vec<CycleStat> = periods
        .iter()
        .enumerate()
        .map(|(i, period)| CycleStat {
            cycle_number: i + 1,
            period_length: period.length(),
            // 0 for the ongoing cycle
            cycle_length: periods
                .get(i + 1)
                .map(|next| (next.start_date - period.start_date).num_days())
                .unwrap_or(0),
        })
        .collect();

    let count = cycle_stats.len() as f64;
    let total_period: i64 = cycle_stats.iter().map(|s| s.period_length).sum();
    let total_cycle: i64 = cycle_stats.iter().map(|s| s.cycle_length).sum();

    PeriodHistory {
        average_period_length: if count > 0.0 { total_period as f64 / count } else { 0.0 },
        average_cycle_length: if count > 0.0 { total_cycle as f64 / count } else { 0.0 },
        periods,
        cycle_stats,
    }
}
