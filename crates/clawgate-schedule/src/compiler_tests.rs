use super::*;
use chrono::NaiveDate;

/// Monday 2026-10-19 10:30 local.
fn monday_morning() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap()
}

fn cron(input: &str) -> String {
    compile_at(input, monday_morning())
        .unwrap_or_else(|e| panic!("'{input}' failed: {e}"))
        .cron_expression
}

#[test]
fn test_day_and_time_forms() {
    assert_eq!(cron("9am every Monday"), "0 9 * * 1");
    assert_eq!(cron("every monday at 9am"), "0 9 * * 1");
    assert_eq!(cron("every friday 17:45"), "45 17 * * 5");
    assert_eq!(cron("at 5:30pm every fri"), "30 17 * * 5");
    assert_eq!(cron("noon on sundays"), "0 12 * * 0");
    assert_eq!(cron("every Wednesday"), "0 9 * * 3");
    assert_eq!(cron("every thurs at 12am"), "0 0 * * 4");
}

#[test]
fn test_interval_forms() {
    assert_eq!(cron("every 15 minutes"), "*/15 * * * *");
    assert_eq!(cron("every minute"), "* * * * *");
    assert_eq!(cron("every 2 hours"), "0 */2 * * *");
    assert_eq!(cron("every hour"), "0 * * * *");
    assert_eq!(cron("every 3 days"), "0 9 */3 * *");
    assert_eq!(cron("every day"), "0 9 * * *");
    assert_eq!(cron("every week"), "0 9 * * 1");
    assert_eq!(cron("every month"), "0 9 1 * *");
}

#[test]
fn test_week_and_month_intervals_ignore_count() {
    // Documented limitation: only minute, hour and day intervals honour N.
    assert_eq!(cron("every 2 weeks"), "0 9 * * 1");
    assert_eq!(cron("every 3 months"), "0 9 1 * *");
}

#[test]
fn test_interval_out_of_range() {
    for input in ["every 0 minutes", "every 60 minutes", "every 24 hours", "every 32 days"] {
        assert!(
            matches!(
                compile_at(input, monday_morning()),
                Err(ScheduleError::InvalidValue { .. })
            ),
            "{input} should be rejected"
        );
    }
}

#[test]
fn test_weekday_and_weekend() {
    assert_eq!(cron("every weekday"), "0 9 * * 1-5");
    assert_eq!(cron("every weekend"), "0 9 * * 0,6");
    assert_eq!(cron("every weekday at 8:30am"), "30 8 * * 1-5");
}

#[test]
fn test_daily_forms() {
    assert_eq!(cron("daily"), "0 9 * * *");
    assert_eq!(cron("everyday"), "0 9 * * *");
    assert_eq!(cron("daily at 18:00"), "0 18 * * *");
    assert_eq!(cron("everyday 7pm"), "0 19 * * *");
    assert_eq!(cron("6:15am daily"), "15 6 * * *");
    assert_eq!(cron("every day at midnight"), "0 0 * * *");
}

#[test]
fn test_bare_time_shorthand() {
    assert_eq!(cron("7am"), "0 7 * * *");
    assert_eq!(cron("at 11pm"), "0 23 * * *");
    assert_eq!(cron("12am"), "0 0 * * *");
    assert_eq!(cron("12pm"), "0 12 * * *");
}

#[test]
fn test_raw_passthrough() {
    assert_eq!(cron("0 9 * * *"), "0 9 * * *");
    assert_eq!(cron("*/5 8-18 * * 1-5"), "*/5 8-18 * * 1-5");
    assert_eq!(cron("  30   6 1,15 * *  "), "30 6 1,15 * *");
}

#[test]
fn test_raw_passthrough_rejects_out_of_range() {
    let err = compile_at("61 9 * * *", monday_morning()).unwrap_err();
    match err {
        ScheduleError::InvalidCron { input, .. } => assert_eq!(input, "61 9 * * *"),
        other => panic!("expected InvalidCron, got {other:?}"),
    }
}

#[test]
fn test_relative_in() {
    let compiled = compile_at("in 45 minutes", monday_morning()).unwrap();
    assert_eq!(compiled.cron_expression, "15 11 19 10 *");
    assert!(compiled.is_one_time);

    assert_eq!(cron("in 20 hours"), "30 6 20 10 *");
    assert_eq!(cron("in 2 days"), "30 10 21 10 *");
}

#[test]
fn test_relative_in_out_of_range() {
    for input in ["in 4294967295 hours", "in 4294967295 days"] {
        let err = compile_at(input, monday_morning()).unwrap_err();
        assert!(
            matches!(&err, ScheduleError::InvalidValue { token, .. } if token == "4294967295"),
            "{input}: {err}"
        );
    }
}

#[test]
fn test_relative_today() {
    let compiled = compile_at("at 5pm today", monday_morning()).unwrap();
    assert_eq!(compiled.cron_expression, "0 17 19 10 *");
    assert!(compiled.is_one_time);
    assert_eq!(compiled.description, "Once at 2026-10-19 17:00");
}

#[test]
fn test_relative_today_in_past() {
    let err = compile_at("at 9am today", monday_morning()).unwrap_err();
    assert!(matches!(err, ScheduleError::TimeInPast { .. }));
    let err = compile_at("10:30 today", monday_morning()).unwrap_err();
    assert!(matches!(err, ScheduleError::TimeInPast { .. }));
}

#[test]
fn test_relative_next_day() {
    // Monday asking for "next monday" skips a full week.
    assert_eq!(cron("next monday"), "0 9 26 10 *");
    assert_eq!(cron("next friday at 10am"), "0 10 23 10 *");
    assert_eq!(cron("next sun at 8:15pm"), "15 20 25 10 *");
    assert!(compile_at("next friday", monday_morning()).unwrap().is_one_time);
}

#[test]
fn test_tomorrow() {
    assert_eq!(cron("tomorrow"), "0 9 20 10 *");
    assert_eq!(cron("tomorrow at 7:15am"), "15 7 20 10 *");
}

#[test]
fn test_relative_forms_crossing_year_end() {
    let new_years_eve = NaiveDate::from_ymd_opt(2026, 12, 31)
        .unwrap()
        .and_hms_opt(23, 50, 0)
        .unwrap();
    let compiled = compile_at("in 20 minutes", new_years_eve).unwrap();
    assert_eq!(compiled.cron_expression, "10 0 1 1 *");
}

#[test]
fn test_absolute_dates_recur_yearly() {
    let compiled = compile_at("on the 1st of january", monday_morning()).unwrap();
    assert_eq!(compiled.cron_expression, "0 9 1 1 *");
    assert!(!compiled.is_one_time);
    assert_eq!(compiled.description, "Every year on January 1 at 09:00");

    assert_eq!(cron("on 14th of feb at 8pm"), "0 20 14 2 *");
    assert_eq!(cron("on march 5th"), "0 9 5 3 *");
    assert_eq!(cron("on the 29th of february"), "0 9 29 2 *");
}

#[test]
fn test_absolute_date_errors() {
    assert!(matches!(
        compile_at("on the 31st of april", monday_morning()),
        Err(ScheduleError::InvalidValue { .. })
    ));
    assert!(matches!(
        compile_at("on the 3rd of smarch", monday_morning()),
        Err(ScheduleError::InvalidMonth { .. })
    ));
}

#[test]
fn test_count_suffix() {
    let compiled = compile_at("every tuesday 4x", monday_morning()).unwrap();
    assert_eq!(compiled.cron_expression, "0 9 * * 2");
    assert_eq!(compiled.max_runs, Some(4));
    assert_eq!(compiled.description, "Every Tuesday at 09:00, 4 times");

    let compiled = compile_at("every 2 hours 3 times", monday_morning()).unwrap();
    assert_eq!(compiled.cron_expression, "0 */2 * * *");
    assert_eq!(compiled.max_runs, Some(3));

    let compiled = compile_at("Daily at 8am 1 time", monday_morning()).unwrap();
    assert_eq!(compiled.max_runs, Some(1));
    assert!(compiled.description.ends_with(", once"));
}

#[test]
fn test_count_suffix_zero_rejected() {
    assert!(matches!(
        compile_at("every tuesday 0x", monday_morning()),
        Err(ScheduleError::InvalidValue { .. })
    ));
}

#[test]
fn test_case_and_whitespace_insensitive() {
    assert_eq!(cron("  EVERY   Monday   AT  9AM "), "0 9 * * 1");
    assert_eq!(cron("Every 15 Minutes"), "*/15 * * * *");
}

#[test]
fn test_unrecognized_fails() {
    let err = compile_at("not a real schedule", monday_morning()).unwrap_err();
    assert_eq!(
        err,
        ScheduleError::Unrecognized {
            input: "not a real schedule".to_string()
        }
    );
    assert_eq!(compile_at("   ", monday_morning()).unwrap_err(), ScheduleError::Empty);
}

#[test]
fn test_bad_time_fails_whole_expression() {
    let err = compile_at("every monday at 25:00", monday_morning()).unwrap_err();
    assert!(matches!(err, ScheduleError::InvalidTime { .. }));
    let err = compile_at("13pm daily", monday_morning()).unwrap_err();
    assert!(matches!(err, ScheduleError::InvalidTime { .. }));
}

#[test]
fn test_fixed_forms_are_idempotent() {
    for input in [
        "9am every Monday",
        "every 15 minutes",
        "every weekday",
        "daily at 18:00",
        "on the 1st of january",
        "7am",
        "0 9 * * *",
        "every tuesday 4x",
    ] {
        let first = compile(input).unwrap();
        let second = compile(input).unwrap();
        assert_eq!(first, second, "{input} must compile identically");
    }
}

#[test]
fn test_compiled_output_is_valid_cron() {
    for input in [
        "every 15 minutes",
        "every weekend",
        "next friday at 10am",
        "on the 29th of february",
        "in 45 minutes",
    ] {
        let compiled = compile_at(input, monday_morning()).unwrap();
        assert!(validate_cron(&compiled.cron_expression).is_ok(), "{input}");
    }
}

#[test]
fn test_serialized_shape() {
    let compiled = compile_at("every tuesday 4x", monday_morning()).unwrap();
    let json = serde_json::to_value(&compiled).unwrap();
    assert_eq!(json["cronExpression"], "0 9 * * 2");
    assert_eq!(json["maxRuns"], 4);
    assert!(json.get("isOneTime").is_none());
}
