use crate::model::{NodeId, RichText};
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use std::fmt;

/// A declared database column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,

    /// Notion property type (`title`, `select`, `relation`, ...)
    pub kind: String,
}

impl Column {
    pub fn is_title(&self) -> bool {
        self.kind == "title"
    }
}

/// Typed value of one record property
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// `title` and `rich_text` properties
    Text(RichText),
    Number(Option<f64>),
    /// `select` and `status` properties
    Select(Option<String>),
    MultiSelect(Vec<String>),
    Date(Option<DateValue>),
    Relation(Vec<NodeId>),
    Checkbox(bool),
    /// `url`, `email`, `phone_number`, string formulas and unique IDs
    Plain(Option<String>),
    /// `people`, `created_by`, `last_edited_by`
    People(Vec<String>),
    /// File attachments as URLs
    Files(Vec<String>),
    /// A property type with no textual rendering
    Unsupported(String),
}

/// A single date or a date range
#[derive(Debug, Clone, PartialEq)]
pub struct DateValue {
    pub start: IsoDate,
    pub end: Option<IsoDate>,
}

/// A calendar day or an instant with its original offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IsoDate {
    Day(NaiveDate),
    Instant(DateTime<FixedOffset>),
}

impl IsoDate {
    /// Parses `YYYY-MM-DD` or an RFC 3339 timestamp
    pub fn parse(raw: &str) -> Option<Self> {
        if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(Self::Day(day));
        }
        DateTime::parse_from_rfc3339(raw).ok().map(Self::Instant)
    }
}

impl fmt::Display for IsoDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day(day) => write!(f, "{}", day.format("%Y-%m-%d")),
            Self::Instant(at) => write!(f, "{}", at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.end {
            Some(end) => write!(f, "{} → {}", self.start, end),
            None => write!(f, "{}", self.start),
        }
    }
}
