use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone};

/// Canonical identity of a calendar day, e.g. "9, July 2021".
pub fn day_key(date: NaiveDate) -> String {
    date.format("%-d, %B %Y").to_string()
}

/// `None` once the result leaves the calendar chrono can represent.
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    Duration::try_days(days).and_then(|delta| date.checked_add_signed(delta))
}

/// Drops the time of day, keeping the calendar day as seen in `dt`'s own zone.
pub fn truncate_to_day<Tz: TimeZone>(dt: &DateTime<Tz>) -> NaiveDate {
    dt.date_naive()
}

/// Whole days from `from` to `to`; negative when `to` is in the past.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// First instant of `date` in `tz`. Zones that skip midnight fall back to noon.
pub fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .or_else(|| {
            let noon = NaiveTime::from_hms_opt(12, 0, 0)?;
            tz.from_local_datetime(&date.and_time(noon)).earliest()
        })
}
