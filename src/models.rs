use chrono::{NaiveDate, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};

use crate::dates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Period,
    Fertile,
    Ovulation,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Period => "period",
            Category::Fertile => "fertile",
            Category::Ovulation => "ovulation",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "period" => Some(Category::Period),
            "fertile" => Some(Category::Fertile),
            "ovulation" => Some(Category::Ovulation),
            _ => None,
        }
    }

    pub fn is_derived(self) -> bool {
        matches!(self, Category::Fertile | Category::Ovulation)
    }

    fn base_color(self) -> Rgba {
        match self {
            Category::Period => Rgba::new(0.902, 0.439, 0.367, 1.0),
            Category::Fertile => Rgba::new(0.923, 0.678, 0.346, 1.0),
            Category::Ovulation => Rgba::new(0.259, 0.757, 0.969, 1.0),
        }
    }
}

/// Role of a period day within its period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeline {
    #[serde(rename = "Start")]
    Start,
    #[serde(rename = "End")]
    End,
    #[serde(rename = "Just another day")]
    Other,
}

impl Timeline {
    pub fn as_str(self) -> &'static str {
        match self {
            Timeline::Start => "Start",
            Timeline::End => "End",
            Timeline::Other => "Just another day",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Start" => Some(Timeline::Start),
            "End" => Some(Timeline::End),
            "Just another day" => Some(Timeline::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Light,
    Medium,
    Heavy,
}

impl Flow {
    pub fn as_str(self) -> &'static str {
        match self {
            Flow::Light => "light",
            Flow::Medium => "medium",
            Flow::Heavy => "heavy",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "light" => Some(Flow::Light),
            "medium" => Some(Flow::Medium),
            "heavy" => Some(Flow::Heavy),
            _ => None,
        }
    }

    fn opacity(self) -> f64 {
        match self {
            Flow::Light => 0.4,
            Flow::Medium => 0.7,
            Flow::Heavy => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgba {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Rgba {
    const fn new(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self { red, green, blue, alpha }
    }
}

/// One tagged calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateEntry {
    pub date: NaiveDate,
    pub category: Category,
    pub timeline: Option<Timeline>,
    pub flow: Option<Flow>,
}

impl DateEntry {
    pub fn period(date: NaiveDate, timeline: Option<Timeline>, flow: Option<Flow>) -> Self {
        Self { date, category: Category::Period, timeline, flow }
    }

    pub fn derived(date: NaiveDate, category: Category) -> Self {
        Self { date, category, timeline: None, flow: None }
    }

    pub fn is_period(&self) -> bool {
        self.category == Category::Period
    }

    pub fn is_derived(&self) -> bool {
        self.category.is_derived()
    }

    pub fn day_key(&self) -> String {
        dates::day_key(self.date)
    }

    /// Calendar color. A flow shades the period color by intensity.
    pub fn color(&self) -> Rgba {
        let period = Category::Period.base_color();
        match self.flow {
            Some(flow) => Rgba { alpha: flow.opacity(), ..period },
            None => self.category.base_color(),
        }
    }
}

/// Persisted form of an entry. Field names match the stored record layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "dateType", default, skip_serializing_if = "Option::is_none")]
    pub date_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_tag", skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(
        rename = "flowType",
        default,
        deserialize_with = "lenient_tag",
        skip_serializing_if = "Option::is_none"
    )]
    pub flow_type: Option<String>,
}

/// Optional tags of the wrong JSON type read as "no value".
fn lenient_tag<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedEntryError {
    #[error("unreadable record: {0}")]
    Unreadable(String),
    #[error("missing mandatory field `{0}`")]
    MissingField(&'static str),
    #[error("unparseable date `{0}`")]
    InvalidDate(String),
    #[error("unknown date type `{0}`")]
    InvalidCategory(String),
    #[error("period start on {0} is too late to project")]
    OutOfRange(String),
}

impl StoredEntry {
    pub fn encode<Tz: TimeZone>(entry: &DateEntry, tz: &Tz) -> Self {
        let seconds = dates::start_of_day(entry.date, tz)
            .map(|start| start.timestamp())
            .unwrap_or_default();
        Self {
            date: Some(format!("{:.1}", seconds as f64)),
            date_type: Some(entry.category.as_str().to_string()),
            timeline: entry.timeline.map(|t| t.as_str().to_string()),
            flow_type: entry.flow.map(|f| f.as_str().to_string()),
        }
    }

    /// Mandatory fields must parse; tags outside the known vocabulary become `None`.
    pub fn decode<Tz: TimeZone>(&self, tz: &Tz) -> Result<DateEntry, MalformedEntryError> {
        let raw_date = self.date.as_deref().ok_or(MalformedEntryError::MissingField("date"))?;
        let raw_type = self
            .date_type
            .as_deref()
            .ok_or(MalformedEntryError::MissingField("dateType"))?;

        let seconds: f64 = raw_date
            .trim()
            .parse()
            .map_err(|_| MalformedEntryError::InvalidDate(raw_date.to_string()))?;
        if !seconds.is_finite() {
            return Err(MalformedEntryError::InvalidDate(raw_date.to_string()));
        }
        let instant = tz
            .timestamp_opt(seconds.floor() as i64, 0)
            .single()
            .ok_or_else(|| MalformedEntryError::InvalidDate(raw_date.to_string()))?;
        let category = Category::parse(raw_type)
            .ok_or_else(|| MalformedEntryError::InvalidCategory(raw_type.to_string()))?;

        let (timeline, flow) = if category == Category::Period {
            (
                self.timeline.as_deref().and_then(Timeline::parse),
                self.flow_type.as_deref().and_then(Flow::parse),
            )
        } else {
            (None, None)
        };

        Ok(DateEntry {
            date: dates::truncate_to_day(&instant),
            category,
            timeline,
            flow,
        })
    }

    pub fn from_value<Tz: TimeZone>(
        value: serde_json::Value,
        tz: &Tz,
    ) -> Result<DateEntry, MalformedEntryError> {
        let rendered = value.to_string();
        let stored: StoredEntry = serde_json::from_value(value)
            .map_err(|_| MalformedEntryError::Unreadable(rendered))?;
        stored.decode(tz)
    }
}
