//! Schedule expression compiler.
//!
//! Grammar rules are tried in order and the first matching rule wins, so the
//! more specific shapes (a day with a time) sit ahead of looser ones (a bare
//! day). Once a rule matches, a bad token inside it fails the whole
//! expression; later rules are not consulted.
//!
//! Interval limitation: `every N weeks` and `every N months` ignore `N` and
//! step by a single unit (Monday 09:00 and the 1st at 09:00 respectively).

use std::sync::LazyLock;

use chrono::{Datelike, Duration, Local, NaiveDateTime, Timelike};
use regex::{Captures, Regex};
use serde::Serialize;

use crate::cron_expr::validate_cron;
use crate::error::ScheduleError;
use crate::tokens::{
    DAY, DAY_NAMES, MONTH_NAMES, TIME, TimeOfDay, max_day_of_month, parse_day, parse_month,
    parse_time,
};

/// Result of compiling a schedule expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledSchedule {
    /// Normalized five-field cron expression.
    pub cron_expression: String,
    /// Human readable rendering of the schedule.
    pub description: String,
    /// Run budget from a `Nx` / `N times` suffix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_runs: Option<u32>,
    /// Set for relative forms that resolve to a single date.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_one_time: bool,
}

impl CompiledSchedule {
    fn recurring(cron_expression: String, description: String) -> Self {
        Self {
            cron_expression,
            description,
            max_runs: None,
            is_one_time: false,
        }
    }

    fn once(at: NaiveDateTime) -> Self {
        Self {
            cron_expression: format!("{} {} {} {} *", at.minute(), at.hour(), at.day(), at.month()),
            description: format!("Once at {}", at.format("%Y-%m-%d %H:%M")),
            max_runs: None,
            is_one_time: true,
        }
    }
}

/// Compile a schedule expression against the local clock.
pub fn compile(input: &str) -> Result<CompiledSchedule, ScheduleError> {
    compile_at(input, Local::now().naive_local())
}

/// Compile a schedule expression, resolving relative forms against `now`.
pub fn compile_at(input: &str, now: NaiveDateTime) -> Result<CompiledSchedule, ScheduleError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ScheduleError::Empty);
    }

    let Some(caps) = COUNT_SUFFIX.captures(trimmed) else {
        return compile_base(trimmed, input, now);
    };

    let token = &caps[2];
    let count: u32 = token
        .parse()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ScheduleError::invalid_value(input, token, "run count must be at least 1"))?;

    let mut compiled = compile_base(&caps[1], input, now)?;
    compiled.max_runs = Some(count);
    compiled.description = match count {
        1 => format!("{}, once", compiled.description),
        n => format!("{}, {} times", compiled.description, n),
    };
    Ok(compiled)
}

fn compile_base(
    expression: &str,
    input: &str,
    now: NaiveDateTime,
) -> Result<CompiledSchedule, ScheduleError> {
    let normalized = normalize(expression);
    let ctx = RuleContext { input, now };

    for rule in RULES.iter() {
        if let Some(caps) = rule.pattern.captures(&normalized) {
            return (rule.build)(&caps, &ctx);
        }
    }

    Err(ScheduleError::Unrecognized {
        input: input.to_string(),
    })
}

fn normalize(expression: &str) -> String {
    expression
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

static COUNT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)\s+(\d+)\s*(?:x|times?)$").expect("count suffix pattern is valid")
});

struct RuleContext<'a> {
    input: &'a str,
    now: NaiveDateTime,
}

type Build = fn(&Captures<'_>, &RuleContext<'_>) -> Result<CompiledSchedule, ScheduleError>;

struct Rule {
    pattern: Regex,
    build: Build,
}

impl Rule {
    fn new(pattern: &str, build: Build) -> Self {
        Self {
            pattern: Regex::new(&format!("^(?:{pattern})$")).expect("schedule rule pattern is valid"),
            build,
        }
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        // 1. every [N] <unit>(s)
        Rule::new(
            r"every (?:(?P<n>\d+) )?(?P<unit>minute|min|hour|hr|day|week|month)s?",
            interval,
        ),
        // 2. day + time, time + day, bare day
        Rule::new(
            &format!(r"every (?P<day>{DAY}) (?:at )?(?P<time>{TIME})"),
            weekly,
        ),
        Rule::new(
            &format!(r"(?:at )?(?P<time>{TIME}) (?:every|on) (?P<day>{DAY})"),
            weekly,
        ),
        Rule::new(&format!(r"every (?P<day>{DAY})"), weekly),
        // 3. weekday / weekend sets
        Rule::new(
            &format!(r"every (?P<set>weekday|weekend)s?(?: at (?P<time>{TIME}))?"),
            day_set,
        ),
        // 4. daily forms
        Rule::new(
            &format!(r"(?:daily|everyday|every day)(?: at)? (?P<time>{TIME})"),
            daily,
        ),
        Rule::new(
            &format!(r"(?:at )?(?P<time>{TIME}) (?:daily|everyday|every day)"),
            daily,
        ),
        Rule::new(r"daily|everyday", daily),
        // 5. relative one-time forms
        Rule::new(
            r"in (?P<n>\d+) (?P<unit>minute|min|hour|hr|day)s?",
            relative_in,
        ),
        Rule::new(&format!(r"(?:at )?(?P<time>{TIME}) today"), today),
        Rule::new(&format!(r"tomorrow(?: at (?P<time>{TIME}))?"), tomorrow),
        Rule::new(
            &format!(r"next (?P<day>{DAY})(?: at (?P<time>{TIME}))?"),
            next_day,
        ),
        // 6. absolute yearly dates
        Rule::new(
            &format!(
                r"on (?:the )?(?P<dom>\d{{1,2}})(?:st|nd|rd|th)? of (?P<month>[a-z]+)(?: at (?P<time>{TIME}))?"
            ),
            yearly,
        ),
        Rule::new(
            &format!(
                r"on (?P<month>[a-z]+) (?P<dom>\d{{1,2}})(?:st|nd|rd|th)?(?: at (?P<time>{TIME}))?"
            ),
            yearly,
        ),
        // 7. bare 12-hour time
        Rule::new(r"(?:at )?(?P<time>\d{1,2}(?::\d{2})? ?(?:am|pm))", daily),
        // 8. raw cron passthrough
        Rule::new(r"[\d*/,\-]+(?: [\d*/,\-]+){4}", raw),
    ]
});

fn number(caps: &Captures<'_>, name: &str, ctx: &RuleContext<'_>) -> Result<Option<u32>, ScheduleError> {
    caps.name(name)
        .map(|m| {
            m.as_str()
                .parse::<u32>()
                .map_err(|_| ScheduleError::invalid_value(ctx.input, m.as_str(), "not a number"))
        })
        .transpose()
}

fn time_or_default(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<TimeOfDay, ScheduleError> {
    match caps.name("time") {
        Some(m) => parse_time(m.as_str(), ctx.input),
        None => Ok(TimeOfDay::DEFAULT),
    }
}

fn interval(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<CompiledSchedule, ScheduleError> {
    let n = number(caps, "n", ctx)?.unwrap_or(1);
    let unit = &caps["unit"];

    let bounded = |max: u32, what: &str| {
        if (1..=max).contains(&n) {
            Ok(if n == 1 { "*".to_string() } else { format!("*/{n}") })
        } else {
            Err(ScheduleError::invalid_value(
                ctx.input,
                n.to_string(),
                format!("{what} interval must be between 1 and {max}"),
            ))
        }
    };
    let every = |singular: &str| match n {
        1 => format!("Every {singular}"),
        n => format!("Every {n} {singular}s"),
    };

    let compiled = match unit {
        "minute" | "min" => {
            let step = bounded(59, "minute")?;
            CompiledSchedule::recurring(format!("{step} * * * *"), every("minute"))
        }
        "hour" | "hr" => {
            let step = bounded(23, "hour")?;
            CompiledSchedule::recurring(format!("0 {step} * * *"), every("hour"))
        }
        "day" => {
            let step = bounded(31, "day")?;
            CompiledSchedule::recurring(
                format!("0 9 {step} * *"),
                format!("{} at {}", every("day"), TimeOfDay::DEFAULT),
            )
        }
        "week" => {
            bounded(u32::MAX, "week")?;
            CompiledSchedule::recurring(
                "0 9 * * 1".to_string(),
                format!("Every week on Monday at {}", TimeOfDay::DEFAULT),
            )
        }
        _ => {
            bounded(u32::MAX, "month")?;
            CompiledSchedule::recurring(
                "0 9 1 * *".to_string(),
                format!("Every month on the 1st at {}", TimeOfDay::DEFAULT),
            )
        }
    };
    Ok(compiled)
}

fn weekly(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<CompiledSchedule, ScheduleError> {
    let day = parse_day(&caps["day"], ctx.input)?;
    let time = time_or_default(caps, ctx)?;
    Ok(CompiledSchedule::recurring(
        format!("{} {} * * {}", time.minute, time.hour, day),
        format!("Every {} at {}", DAY_NAMES[day as usize], time),
    ))
}

fn day_set(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<CompiledSchedule, ScheduleError> {
    let time = time_or_default(caps, ctx)?;
    let (days, label) = match &caps["set"] {
        "weekday" => ("1-5", "weekday"),
        _ => ("0,6", "weekend day"),
    };
    Ok(CompiledSchedule::recurring(
        format!("{} {} * * {}", time.minute, time.hour, days),
        format!("Every {label} at {time}"),
    ))
}

fn daily(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<CompiledSchedule, ScheduleError> {
    let time = time_or_default(caps, ctx)?;
    Ok(CompiledSchedule::recurring(
        format!("{} {} * * *", time.minute, time.hour),
        format!("Every day at {time}"),
    ))
}

fn relative_in(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<CompiledSchedule, ScheduleError> {
    let n = number(caps, "n", ctx)?.unwrap_or(0);
    if n == 0 {
        return Err(ScheduleError::invalid_value(
            ctx.input,
            "0",
            "offset must be at least 1",
        ));
    }
    let offset = match &caps["unit"] {
        "minute" | "min" => Duration::try_minutes(i64::from(n)),
        "hour" | "hr" => Duration::try_hours(i64::from(n)),
        _ => Duration::try_days(i64::from(n)),
    };
    let at = offset
        .and_then(|offset| ctx.now.checked_add_signed(offset))
        .ok_or_else(|| {
            ScheduleError::invalid_value(ctx.input, n.to_string(), "offset is too far in the future")
        })?;
    Ok(CompiledSchedule::once(at))
}

fn today(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<CompiledSchedule, ScheduleError> {
    let token = &caps["time"];
    let time = parse_time(token, ctx.input)?;
    let current = TimeOfDay::new(ctx.now.hour(), ctx.now.minute());
    if time <= current {
        return Err(ScheduleError::TimeInPast {
            input: ctx.input.to_string(),
            token: token.to_string(),
        });
    }
    Ok(CompiledSchedule::once(at_time(ctx.now, 0, time)))
}

fn tomorrow(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<CompiledSchedule, ScheduleError> {
    let time = time_or_default(caps, ctx)?;
    Ok(CompiledSchedule::once(at_time(ctx.now, 1, time)))
}

fn next_day(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<CompiledSchedule, ScheduleError> {
    let day = parse_day(&caps["day"], ctx.input)?;
    let time = time_or_default(caps, ctx)?;
    let today = ctx.now.weekday().num_days_from_sunday();
    let ahead = match (day + 7 - today) % 7 {
        0 => 7,
        n => n,
    };
    Ok(CompiledSchedule::once(at_time(ctx.now, i64::from(ahead), time)))
}

fn yearly(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<CompiledSchedule, ScheduleError> {
    let month = parse_month(&caps["month"], ctx.input)?;
    let dom = number(caps, "dom", ctx)?.unwrap_or(0);
    let max = max_day_of_month(month);
    if !(1..=max).contains(&dom) {
        return Err(ScheduleError::invalid_value(
            ctx.input,
            dom.to_string(),
            format!("{} has days 1-{}", MONTH_NAMES[month as usize - 1], max),
        ));
    }
    let time = time_or_default(caps, ctx)?;
    Ok(CompiledSchedule::recurring(
        format!("{} {} {} {} *", time.minute, time.hour, dom, month),
        format!(
            "Every year on {} {} at {}",
            MONTH_NAMES[month as usize - 1],
            dom,
            time
        ),
    ))
}

fn raw(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<CompiledSchedule, ScheduleError> {
    let expr = caps[0].to_string();
    validate_cron(&expr).map_err(|e| match e {
        ScheduleError::InvalidCron { reason, .. } => ScheduleError::InvalidCron {
            input: ctx.input.to_string(),
            reason,
        },
        other => other,
    })?;
    let description = format!("Cron schedule {expr}");
    Ok(CompiledSchedule::recurring(expr, description))
}

/// `now`'s date shifted by `days`, at `time`.
fn at_time(now: NaiveDateTime, days: i64, time: TimeOfDay) -> NaiveDateTime {
    let date = now.date() + Duration::days(days);
    date.and_hms_opt(time.hour, time.minute, 0)
        .unwrap_or_else(|| date.and_time(now.time()))
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;
