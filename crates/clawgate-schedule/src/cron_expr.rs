//! Five-field cron validation and next-run computation.
//!
//! The `cron` crate expects a seconds field and numbers weekdays 1-7 from
//! Sunday, while crontab numbers them 0-7 with both 0 and 7 meaning Sunday.
//! Expressions are checked against crontab ranges here and translated before
//! being handed to `cron::Schedule`.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::ScheduleError;

const FIELDS: [(&str, u32, u32); 5] = [
    ("minute", 0, 59),
    ("hour", 0, 23),
    ("day-of-month", 1, 31),
    ("month", 1, 12),
    ("day-of-week", 0, 7),
];

/// Check that `expr` is a well-formed five-field crontab expression.
pub fn validate_cron(expr: &str) -> Result<(), ScheduleError> {
    to_schedule(expr).map(|_| ())
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    Tz::from_str(name).map_err(|_| ScheduleError::UnknownTimezone(name.to_string()))
}

/// IANA name of the zone crontab lines fire in.
///
/// `TZ` wins when it names a known zone, then the system setting, then UTC.
pub fn host_timezone() -> String {
    detect_timezone(
        std::env::var("TZ").ok().as_deref(),
        iana_time_zone::get_timezone().ok(),
    )
}

fn detect_timezone(tz_env: Option<&str>, system: Option<String>) -> String {
    tz_env
        .map(|tz| tz.trim_start_matches(':').to_string())
        .into_iter()
        .chain(system)
        .find(|name| parse_timezone(name).is_ok())
        .unwrap_or_else(|| "UTC".to_string())
}

/// Next firing time of `expr` strictly after `after`, evaluated in `timezone`.
pub fn next_run(
    expr: &str,
    timezone: &str,
    after: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    let schedule = to_schedule(expr)?;
    let tz = parse_timezone(timezone)?;
    Ok(schedule
        .after(&after.with_timezone(&tz))
        .next()
        .map(|t| t.with_timezone(&Utc)))
}

fn to_schedule(expr: &str) -> Result<Schedule, ScheduleError> {
    let invalid = |reason: String| ScheduleError::InvalidCron {
        input: expr.to_string(),
        reason,
    };

    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != FIELDS.len() {
        return Err(invalid(format!(
            "expected 5 fields, found {}",
            fields.len()
        )));
    }

    for (field, (name, min, max)) in fields.iter().zip(FIELDS) {
        expand_field(field, min, max).map_err(|reason| invalid(format!("{name}: {reason}")))?;
    }

    let weekday = translate_weekdays(fields[4]).map_err(invalid)?;
    let quartz = format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], weekday
    );
    Schedule::from_str(&quartz).map_err(|e| invalid(e.to_string()))
}

/// Rewrite a crontab weekday field into the `cron` crate's 1-7 numbering.
fn translate_weekdays(field: &str) -> Result<String, String> {
    if field == "*" {
        return Ok(field.to_string());
    }
    let days: BTreeSet<u32> = expand_field(field, 0, 7)?
        .into_iter()
        .map(|d| d % 7)
        .collect();
    Ok(days
        .iter()
        .map(|d| (d + 1).to_string())
        .collect::<Vec<_>>()
        .join(","))
}

/// Expand one cron field into the set of values it selects.
fn expand_field(field: &str, min: u32, max: u32) -> Result<BTreeSet<u32>, String> {
    let number = |s: &str| -> Result<u32, String> {
        s.parse::<u32>()
            .map_err(|_| format!("'{s}' is not a number"))
    };

    let mut values = BTreeSet::new();
    for part in field.split(',') {
        if part.is_empty() {
            return Err(format!("empty list element in '{field}'"));
        }

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step = number(step)?;
                if step == 0 {
                    return Err("step cannot be 0".to_string());
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (number(a)?, number(b)?)
        } else {
            let start = number(range)?;
            if part.contains('/') {
                (start, max)
            } else {
                (start, start)
            }
        };

        if lo < min || hi > max {
            return Err(format!("'{part}' is outside {min}-{max}"));
        }
        if lo > hi {
            return Err(format!("'{part}' is a reversed range"));
        }

        values.extend((lo..=hi).step_by(step as usize));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validate_accepts_common_shapes() {
        for expr in [
            "* * * * *",
            "*/15 * * * *",
            "0 9 * * 1",
            "0 9 * * 1-5",
            "30 6 1,15 * *",
            "0 0 1 1 *",
            "0 9 * * 0,6",
            "0 9 * * 7",
            "5-55/10 * * * *",
        ] {
            assert!(validate_cron(expr).is_ok(), "{expr} should be valid");
        }
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        for expr in [
            "* * * *",
            "* * * * * *",
            "60 * * * *",
            "0 24 * * *",
            "0 0 0 * *",
            "0 0 * 13 *",
            "0 0 * * 8",
            "*/0 * * * *",
            "5-1 * * * *",
            "a * * * *",
            "1,,2 * * * *",
        ] {
            assert!(validate_cron(expr).is_err(), "{expr} should be invalid");
        }
    }

    #[test]
    fn test_translate_weekdays() {
        assert_eq!(translate_weekdays("*").unwrap(), "*");
        assert_eq!(translate_weekdays("0").unwrap(), "1");
        assert_eq!(translate_weekdays("7").unwrap(), "1");
        assert_eq!(translate_weekdays("1-5").unwrap(), "2,3,4,5,6");
        assert_eq!(translate_weekdays("0,6").unwrap(), "1,7");
        assert_eq!(translate_weekdays("5-7").unwrap(), "1,6,7");
    }

    #[test]
    fn test_next_run_weekly_utc() {
        // 2026-10-19 is a Monday.
        let after = Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap();
        let next = next_run("0 9 * * 1", "UTC", after).unwrap().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 26, 9, 0, 0).unwrap());

        let next = next_run("0 9 * * 0", "UTC", after).unwrap().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 25, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_respects_timezone() {
        let after = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let next = next_run("0 9 * * *", "America/New_York", after)
            .unwrap()
            .unwrap();
        // 09:00 EDT is 13:00 UTC.
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 7, 1, 13, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_one_time_in_host_zone() {
        // 02:00 in New York; "in 23 minutes" compiled there fires the same day.
        let after = Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap();
        let next = next_run("23 2 19 10 *", "America/New_York", after)
            .unwrap()
            .unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 19, 6, 23, 0).unwrap());
    }

    #[test]
    fn test_detect_timezone() {
        assert_eq!(
            detect_timezone(Some("America/New_York"), Some("Europe/Paris".into())),
            "America/New_York"
        );
        assert_eq!(detect_timezone(Some(":Asia/Tokyo"), None), "Asia/Tokyo");
        assert_eq!(
            detect_timezone(Some("EST5EDT,M3.2.0,M11.1.0"), Some("Europe/Paris".into())),
            "Europe/Paris"
        );
        assert_eq!(detect_timezone(None, Some("Not/AZone".into())), "UTC");
        assert_eq!(detect_timezone(None, None), "UTC");
    }

    #[test]
    fn test_host_timezone_is_known() {
        assert!(parse_timezone(&host_timezone()).is_ok());
    }

    #[test]
    fn test_next_run_unknown_timezone() {
        let err = next_run("0 9 * * *", "Nowhere/Special", Utc::now()).unwrap_err();
        assert_eq!(err, ScheduleError::UnknownTimezone("Nowhere/Special".into()));
    }

    #[test]
    fn test_expand_field_step_from_start() {
        let values = expand_field("50/5", 0, 59).unwrap();
        assert_eq!(values.into_iter().collect::<Vec<_>>(), vec![50, 55]);
    }
}
