//! Time, day and month token parsing.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ScheduleError;

/// Regex fragment matching a time of day (`9`, `9:30`, `9am`, `12:15 pm`, `noon`).
pub(crate) const TIME: &str = r"(?:\d{1,2}(?::\d{2})?\s*(?:am|pm)?|noon|midnight)";

/// Regex fragment matching a weekday name or abbreviation, optionally plural.
pub(crate) const DAY: &str = r"(?:sun(?:day)?|mon(?:day)?|tue(?:s(?:day)?)?|wed(?:nesday)?|thu(?:r(?:s(?:day)?)?)?|fri(?:day)?|sat(?:urday)?)s?";

pub(crate) const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub(crate) const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

static TIME_PARTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?::(\d{2}))?(am|pm)?$").expect("time pattern is valid")
});

/// A wall-clock time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub const DEFAULT: TimeOfDay = TimeOfDay { hour: 9, minute: 0 };

    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Parse a time token, folding 12-hour values into 24-hour ones.
pub(crate) fn parse_time(token: &str, input: &str) -> Result<TimeOfDay, ScheduleError> {
    let invalid = || ScheduleError::InvalidTime {
        input: input.to_string(),
        token: token.to_string(),
    };

    let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.as_str() {
        "noon" => return Ok(TimeOfDay::new(12, 0)),
        "midnight" => return Ok(TimeOfDay::new(0, 0)),
        _ => {}
    }

    let caps = TIME_PARTS.captures(&compact).ok_or_else(invalid)?;
    let hour: u32 = caps[1].parse().map_err(|_| invalid())?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().map_err(|_| invalid())?,
        None => 0,
    };
    if minute > 59 {
        return Err(invalid());
    }

    let hour = match caps.get(3).map(|m| m.as_str()) {
        Some(meridiem) => {
            if !(1..=12).contains(&hour) {
                return Err(invalid());
            }
            match (meridiem, hour) {
                ("am", 12) => 0,
                ("am", h) => h,
                ("pm", 12) => 12,
                (_, h) => h + 12,
            }
        }
        None if hour > 23 => return Err(invalid()),
        None => hour,
    };

    Ok(TimeOfDay::new(hour, minute))
}

/// Parse a weekday token into cron numbering (0 = Sunday).
pub(crate) fn parse_day(token: &str, input: &str) -> Result<u32, ScheduleError> {
    fn lookup(name: &str) -> Option<u32> {
        let day = match name {
            "sun" | "sunday" => 0,
            "mon" | "monday" => 1,
            "tue" | "tues" | "tuesday" => 2,
            "wed" | "wednesday" => 3,
            "thu" | "thur" | "thurs" | "thursday" => 4,
            "fri" | "friday" => 5,
            "sat" | "saturday" => 6,
            _ => return None,
        };
        Some(day)
    }

    let name = token.trim().to_lowercase();
    lookup(&name)
        .or_else(|| name.strip_suffix('s').and_then(lookup))
        .ok_or_else(|| ScheduleError::InvalidDay {
            input: input.to_string(),
            token: token.to_string(),
        })
}

/// Parse a month token into 1-based numbering.
pub(crate) fn parse_month(token: &str, input: &str) -> Result<u32, ScheduleError> {
    let month = match token.trim().to_lowercase().as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => {
            return Err(ScheduleError::InvalidMonth {
                input: input.to_string(),
                token: token.to_string(),
            });
        }
    };
    Ok(month)
}

/// Longest day-of-month for a month, counting February 29.
pub(crate) fn max_day_of_month(month: u32) -> u32 {
    match month {
        2 => 29,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}
