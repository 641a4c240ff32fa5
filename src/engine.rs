use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::dates::{add_days, days_between};
use crate::models::{Category, DateEntry, Timeline};

/// Estimated days from the first day of a period to ovulation.
pub const DEFAULT_OVULATION_DAY: i64 = 14;

/// Numeric stand-in for "ovulation was yesterday" wherever the countdown is
/// used arithmetically.
pub const ONE_DAY_AGO_SENTINEL: i64 = -999;

const FERTILE_DAYS_BEFORE_OVULATION: i64 = 3;

/// The ovulation/fertile cluster for one period start, or `None` when part of
/// it falls outside the representable calendar.
pub fn project_cycle(start: NaiveDate, ovulation_day: i64) -> Option<Vec<DateEntry>> {
    let ovulation = add_days(start, ovulation_day - 1)?;
    let mut cluster = vec![
        DateEntry::derived(ovulation, Category::Ovulation),
        DateEntry::derived(add_days(ovulation, 1)?, Category::Fertile),
    ];
    for offset in 1..=FERTILE_DAYS_BEFORE_OVULATION {
        cluster.push(DateEntry::derived(add_days(ovulation, -offset)?, Category::Fertile));
    }
    Some(cluster)
}

/// Drops every derived entry and projects a fresh ovulation/fertile cluster
/// from each period start. Starts that cannot be projected get no cluster.
pub fn recompute_derived_entries(entries: &mut Vec<DateEntry>, ovulation_day: i64) {
    entries.retain(|entry| !entry.is_derived());

    let clusters: Vec<DateEntry> = entries
        .iter()
        .filter(|entry| entry.is_period() && entry.timeline == Some(Timeline::Start))
        .filter_map(|entry| project_cycle(entry.date, ovulation_day))
        .flatten()
        .collect();
    entries.extend(clusters);
}

/// True while Start and End markings are unbalanced.
pub fn has_open_period(entries: &[DateEntry]) -> bool {
    let count = |timeline: Timeline| {
        entries
            .iter()
            .filter(|entry| entry.is_period() && entry.timeline == Some(timeline))
            .count()
    };
    count(Timeline::Start) != count(Timeline::End)
}

/// Latest projected ovulation day, by date rather than insertion order.
pub fn latest_ovulation(entries: &[DateEntry]) -> Option<NaiveDate> {
    entries
        .iter()
        .filter(|entry| entry.category == Category::Ovulation)
        .map(|entry| entry.date)
        .max()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Countdown {
    Days(i64),
    OneDayAgo,
}

impl Countdown {
    pub fn as_days(self) -> i64 {
        match self {
            Countdown::Days(days) => days,
            Countdown::OneDayAgo => ONE_DAY_AGO_SENTINEL,
        }
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Countdown::OneDayAgo => f.write_str("1 DAY AGO"),
            Countdown::Days(days) if days <= 0 => f.write_str("TODAY"),
            Countdown::Days(1) => f.write_str("1 DAY"),
            Countdown::Days(days) => write!(f, "{days} DAYS"),
        }
    }
}

/// Days until the latest ovulation day. The ovulation day itself reads 0,
/// the day after reads as [`Countdown::OneDayAgo`], anything older is absent,
/// and future days count one extra.
pub fn days_until_ovulation(entries: &[DateEntry], today: NaiveDate) -> Option<Countdown> {
    let ovulation = latest_ovulation(entries)?;
    let difference = days_between(today, ovulation);
    match difference {
        -1 => Some(Countdown::OneDayAgo),
        0 => Some(Countdown::Days(0)),
        d if d < 0 => None,
        d => Some(Countdown::Days(d + 1)),
    }
}

pub fn days_until_fertile(ovulation: Option<Countdown>) -> Option<i64> {
    ovulation.map(|countdown| (countdown.as_days() - FERTILE_DAYS_BEFORE_OVULATION).max(0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PregnancyChance {
    #[serde(rename = "Very low")]
    VeryLow,
    #[serde(rename = "Low")]
    Low,
    #[serde(rename = "Medium")]
    Medium,
    #[serde(rename = "High")]
    High,
}

pub fn pregnancy_chance(ovulation: Option<Countdown>) -> PregnancyChance {
    match ovulation.map(Countdown::as_days) {
        None => PregnancyChance::VeryLow,
        Some(days) if days <= 0 => PregnancyChance::High,
        Some(1..=3) => PregnancyChance::Medium,
        Some(_) => PregnancyChance::Low,
    }
}

/// Fill fraction of the ovulation ring. Unclamped.
pub fn ovulation_progress(ovulation: Option<Countdown>, ovulation_day: i64) -> f64 {
    match ovulation {
        None => 0.0,
        Some(countdown) => (ovulation_day - countdown.as_days()) as f64 / ovulation_day as f64,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub has_open_period: bool,
    pub days_until_ovulation: Option<Countdown>,
    pub days_until_fertile: Option<i64>,
    pub pregnancy_chance: PregnancyChance,
    pub ovulation_progress: f64,
}

impl DashboardMetrics {
    pub fn compute(entries: &[DateEntry], today: NaiveDate, ovulation_day: i64) -> Self {
        let ovulation = days_until_ovulation(entries, today);
        Self {
            has_open_period: has_open_period(entries),
            days_until_ovulation: ovulation,
            days_until_fertile: days_until_fertile(ovulation),
            pregnancy_chance: pregnancy_chance(ovulation),
            ovulation_progress: ovulation_progress(ovulation, ovulation_day),
        }
    }

    pub fn ovulation_label(&self) -> Option<String> {
        self.days_until_ovulation.map(|countdown| countdown.to_string())
    }

    pub fn fertile_headline(&self) -> Option<&'static str> {
        self.days_until_fertile
            .map(|days| if days <= 0 { "YOU MAY BE FERTILE" } else { "FERTILE IN" })
    }

    pub fn fertile_label(&self) -> Option<String> {
        self.days_until_fertile
            .map(|days| Countdown::Days(days).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Flow;
    use std::collections::HashSet;

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn start(date: NaiveDate) -> DateEntry {
        DateEntry::period(date, Some(Timeline::Start), Some(Flow::Medium))
    }

    fn derived_set(entries: &[DateEntry], category: Category) -> HashSet<NaiveDate> {
        entries
            .iter()
            .filter(|entry| entry.category == category)
            .map(|entry| entry.date)
            .collect()
    }

    #[test]
    fn start_without_room_for_a_cluster_projects_nothing() {
        let mut entries = vec![start(NaiveDate::MAX), start(jan(1))];
        recompute_derived_entries(&mut entries, DEFAULT_OVULATION_DAY);
        assert_eq!(derived_set(&entries, Category::Ovulation), HashSet::from([jan(14)]));
        assert!(project_cycle(NaiveDate::MAX, DEFAULT_OVULATION_DAY).is_none());
    }

    #[test]
    fn start_projects_one_ovulation_and_four_fertile_days() {
        let mut entries = vec![start(jan(1))];
        recompute_derived_entries(&mut entries, DEFAULT_OVULATION_DAY);

        let ovulation: Vec<_> = entries
            .iter()
            .filter(|e| e.category == Category::Ovulation)
            .collect();
        assert_eq!(ovulation.len(), 1);
        assert_eq!(ovulation[0].date, jan(14));

        let fertile: Vec<_> = entries
            .iter()
            .filter(|e| e.category == Category::Fertile)
            .collect();
        assert_eq!(fertile.len(), 4);
        assert_eq!(
            derived_set(&entries, Category::Fertile),
            HashSet::from([jan(11), jan(12), jan(13), jan(15)])
        );
    }

    #[test]
    fn derivation_is_idempotent() {
        let mut entries = vec![
            start(jan(1)),
            DateEntry::period(jan(3), Some(Timeline::Other), Some(Flow::Heavy)),
            DateEntry::period(jan(5), Some(Timeline::End), Some(Flow::Light)),
        ];
        recompute_derived_entries(&mut entries, DEFAULT_OVULATION_DAY);
        let first = entries.clone();
        recompute_derived_entries(&mut entries, DEFAULT_OVULATION_DAY);
        assert_eq!(entries, first);
        assert_eq!(entries.len(), 8);
    }

    #[test]
    fn each_start_gets_its_own_cluster() {
        let mut entries = vec![
            start(jan(1)),
            DateEntry::period(jan(4), Some(Timeline::End), None),
            start(jan(29)),
        ];
        recompute_derived_entries(&mut entries, DEFAULT_OVULATION_DAY);
        assert_eq!(
            derived_set(&entries, Category::Ovulation),
            HashSet::from([jan(14), NaiveDate::from_ymd_opt(2024, 2, 11).unwrap()])
        );
        assert_eq!(entries.iter().filter(|e| e.is_derived()).count(), 10);
    }

    #[test]
    fn removing_the_start_clears_its_cluster() {
        let mut entries = vec![start(jan(1))];
        recompute_derived_entries(&mut entries, DEFAULT_OVULATION_DAY);
        entries.retain(|e| e.date != jan(1));
        recompute_derived_entries(&mut entries, DEFAULT_OVULATION_DAY);
        assert!(entries.is_empty());
    }

    #[test]
    fn configured_ovulation_day_moves_the_cluster() {
        let mut entries = vec![start(jan(1))];
        recompute_derived_entries(&mut entries, 16);
        assert_eq!(latest_ovulation(&entries), Some(jan(16)));
    }

    #[test]
    fn open_period_tracks_start_end_balance() {
        let mut entries = vec![start(jan(1))];
        assert!(has_open_period(&entries));
        entries.push(DateEntry::period(jan(2), Some(Timeline::Other), None));
        assert!(has_open_period(&entries));
        entries.push(DateEntry::period(jan(5), Some(Timeline::End), None));
        assert!(!has_open_period(&entries));
        recompute_derived_entries(&mut entries, DEFAULT_OVULATION_DAY);
        assert!(!has_open_period(&entries));
        assert!(!has_open_period(&[]));
    }

    #[test]
    fn countdown_boundaries() {
        let entries = vec![DateEntry::derived(jan(10), Category::Ovulation)];
        assert_eq!(days_until_ovulation(&entries, jan(10)), Some(Countdown::Days(0)));
        assert_eq!(days_until_ovulation(&entries, jan(11)), Some(Countdown::OneDayAgo));
        assert_eq!(days_until_ovulation(&entries, jan(9)), Some(Countdown::Days(2)));
        assert_eq!(days_until_ovulation(&entries, jan(15)), None);
        assert_eq!(days_until_ovulation(&entries, jan(12)), None);
        assert_eq!(days_until_ovulation(&[], jan(10)), None);
    }

    #[test]
    fn countdown_uses_latest_ovulation_by_date() {
        let entries = vec![
            DateEntry::derived(jan(20), Category::Ovulation),
            DateEntry::derived(jan(5), Category::Ovulation),
        ];
        assert_eq!(days_until_ovulation(&entries, jan(18)), Some(Countdown::Days(3)));
    }

    #[test]
    fn fertile_countdown_floors_at_zero() {
        assert_eq!(days_until_fertile(Some(Countdown::Days(10))), Some(7));
        assert_eq!(days_until_fertile(Some(Countdown::Days(2))), Some(0));
        assert_eq!(days_until_fertile(Some(Countdown::OneDayAgo)), Some(0));
        assert_eq!(days_until_fertile(None), None);
    }

    #[test]
    fn pregnancy_chance_buckets() {
        assert_eq!(pregnancy_chance(Some(Countdown::Days(0))), PregnancyChance::High);
        assert_eq!(pregnancy_chance(Some(Countdown::OneDayAgo)), PregnancyChance::High);
        assert_eq!(pregnancy_chance(Some(Countdown::Days(2))), PregnancyChance::Medium);
        assert_eq!(pregnancy_chance(Some(Countdown::Days(3))), PregnancyChance::Medium);
        assert_eq!(pregnancy_chance(Some(Countdown::Days(5))), PregnancyChance::Low);
        assert_eq!(pregnancy_chance(None), PregnancyChance::VeryLow);
    }

    #[test]
    fn progress_is_not_clamped() {
        assert_eq!(ovulation_progress(None, 14), 0.0);
        assert_eq!(ovulation_progress(Some(Countdown::Days(7)), 14), 0.5);
        assert_eq!(ovulation_progress(Some(Countdown::Days(0)), 14), 1.0);
        assert!(ovulation_progress(Some(Countdown::Days(20)), 14) < 0.0);
        assert!(ovulation_progress(Some(Countdown::OneDayAgo), 14) > 1.0);
    }

    #[test]
    fn countdown_labels() {
        assert_eq!(Countdown::OneDayAgo.to_string(), "1 DAY AGO");
        assert_eq!(Countdown::Days(0).to_string(), "TODAY");
        assert_eq!(Countdown::Days(1).to_string(), "1 DAY");
        assert_eq!(Countdown::Days(12).to_string(), "12 DAYS");
    }

    #[test]
    fn dashboard_for_a_fresh_period() {
        let mut entries = vec![start(jan(1))];
        recompute_derived_entries(&mut entries, DEFAULT_OVULATION_DAY);
        let metrics = DashboardMetrics::compute(&entries, jan(2), DEFAULT_OVULATION_DAY);

        assert!(metrics.has_open_period);
        assert_eq!(metrics.days_until_ovulation, Some(Countdown::Days(13)));
        assert_eq!(metrics.days_until_fertile, Some(10));
        assert_eq!(metrics.pregnancy_chance, PregnancyChance::Low);
        assert_eq!(metrics.ovulation_progress, 1.0 / 14.0);
        assert_eq!(metrics.fertile_headline(), Some("FERTILE IN"));
        assert_eq!(metrics.fertile_label().as_deref(), Some("10 DAYS"));
    }
}
