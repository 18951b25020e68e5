//! Built-in date and time commands
//!
//! `getCurrentDateTime <what>` answers with the current time, date or
//! weekday. `getDateTime <what> <when> <unit>` does the same for a moment
//! relative to now ("3 days", "friday") or for an explicit date/time.
//! The current time is passed in so answers are deterministic under test.

use crate::grammar::TypoTolerance;
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const DATE_FORMAT: &str = "%d.%m.%Y";
pub const DAY_FORMAT: &str = "%A";

const DOTTED_DATE_FORMATS: [&str; 6] = [
    "%d.%m.%y",
    "%d.%m.%Y",
    "%d.%B.%y",
    "%d.%B.%Y",
    "%A.%d.%B.%y",
    "%A.%d.%B.%Y",
];
const ISO_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d"];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("sunday", Weekday::Sun),
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
];

/// What part of a moment the user asked about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeKind {
    Time,
    Date,
    Day,
}

impl DateTimeKind {
    /// Classify a (possibly misspelled) "time", "date" or "day"
    pub fn classify(word: &str) -> Option<Self> {
        let word = word.to_lowercase();
        let tolerance = TypoTolerance::default();
        [
            ("time", DateTimeKind::Time),
            ("date", DateTimeKind::Date),
            ("day", DateTimeKind::Day),
        ]
        .into_iter()
        .find(|(name, _)| word == *name || tolerance.accepts(name, &word))
        .map(|(_, kind)| kind)
    }

    pub fn format(&self) -> &'static str {
        match self {
            DateTimeKind::Time => TIME_FORMAT,
            DateTimeKind::Date => DATE_FORMAT,
            DateTimeKind::Day => DAY_FORMAT,
        }
    }
}

/// Answer for `getCurrentDateTime`
pub fn current_date_time(what: &str, now: NaiveDateTime) -> String {
    match DateTimeKind::classify(what) {
        Some(DateTimeKind::Time) => format!("It is {}", now.format(TIME_FORMAT)),
        Some(kind) => format!("Today is {}", now.format(kind.format())),
        None => {
            tracing::warn!("Invalid argument for getCurrentDateTime: {}", what);
            "Sorry, I didn't get that".to_string()
        }
    }
}

/// Answer for `getDateTime`
///
/// # Arguments
/// * `what` - "time", "date" or "day": selects the output format
/// * `when` - a weekday, a number of `unit`s from now, or a date/time
/// * `unit` - "hour(s)", "day(s)", "week(s)" or "month(s)" for numeric `when`
pub fn date_time(what: &str, when: &str, unit: &str, now: NaiveDateTime) -> String {
    let Some(kind) = DateTimeKind::classify(what) else {
        return format!("Sorry, I don't understand what you want ({})", what);
    };

    if let Some(weekday) = parse_weekday(when) {
        return next_weekday(now, weekday).format(kind.format()).to_string();
    }

    if !when.is_empty() && when.chars().all(|c| c.is_ascii_digit()) {
        return match offset(now, when, unit) {
            Some(moment) => moment.format(kind.format()).to_string(),
            None => format!("Sorry, I don't understand the unit ({})", unit),
        };
    }

    match parse_moment(when, now) {
        Some(moment) => moment.format(kind.format()).to_string(),
        None => format!("Sorry, I couldn't understand the date \"{}\"", when),
    }
}

fn parse_weekday(word: &str) -> Option<Weekday> {
    let word = word.to_lowercase();
    let tolerance = TypoTolerance::default();
    WEEKDAYS
        .iter()
        .find(|(name, _)| word == *name || tolerance.accepts(name, &word))
        .map(|(_, day)| *day)
}

/// Next occurrence of `weekday`, a full week ahead if it is today
fn next_weekday(now: NaiveDateTime, weekday: Weekday) -> NaiveDateTime {
    let today = now.weekday().num_days_from_sunday() as i64;
    let target = weekday.num_days_from_sunday() as i64;
    let mut diff = (target - today + 7) % 7;
    if diff == 0 {
        diff = 7;
    }
    now + Duration::days(diff)
}

fn offset(now: NaiveDateTime, amount: &str, unit: &str) -> Option<NaiveDateTime> {
    let amount: u32 = amount.parse().ok()?;
    match unit.to_lowercase().as_str() {
        "hour" | "hours" => now.checked_add_signed(Duration::hours(amount.into())),
        "day" | "days" => now.checked_add_signed(Duration::days(amount.into())),
        "week" | "weeks" => now.checked_add_signed(Duration::weeks(amount.into())),
        "month" | "months" => now.checked_add_months(Months::new(amount)),
        _ => None,
    }
}

/// Find the first known format that parses `input`
///
/// Inputs with a `.` are tried as dotted dates, inputs with a `-` as ISO
/// dates, everything else as a time of day.
pub fn find_format(input: &str) -> Option<&'static str> {
    candidate_formats(input)
        .iter()
        .copied()
        .find(|format| parse_with(input, format).is_some())
}

fn candidate_formats(input: &str) -> &'static [&'static str] {
    if input.contains('.') {
        &DOTTED_DATE_FORMATS
    } else if input.contains('-') {
        &ISO_DATE_FORMATS
    } else {
        &TIME_FORMATS
    }
}

/// Parse `input` with `format`; a bare time means today at that time
fn parse_with(input: &str, format: &str) -> Option<ParsedMoment> {
    if let Ok(moment) = NaiveDateTime::parse_from_str(input, format) {
        return Some(ParsedMoment::DateTime(moment));
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, format) {
        return Some(ParsedMoment::Date(date));
    }
    NaiveTime::parse_from_str(input, format)
        .ok()
        .map(ParsedMoment::Time)
}

enum ParsedMoment {
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

fn parse_moment(input: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let format = find_format(input)?;
    Some(match parse_with(input, format)? {
        ParsedMoment::DateTime(moment) => moment,
        ParsedMoment::Date(date) => date.and_hms_opt(0, 0, 0)?,
        ParsedMoment::Time(time) => now.date().and_time(time),
    })
}
