//! Cron schedule parsing
//!
//! Accepts classic five-field crontab expressions (minute precision) as well
//! as six/seven-field expressions with seconds and the `@daily` style
//! shorthands.

use chrono::{DateTime, TimeZone};
use cron::Schedule;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Empty schedule expression")]
    Empty,

    #[error("Invalid cron schedule '{expression}': {reason}")]
    Invalid { expression: String, reason: String },
}

/// A parsed cron expression
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
}

impl CronSchedule {
    /// The expression as supplied by the operator
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First trigger strictly after `after`
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.after(after).next()
    }

    /// The next `count` trigger times after `after`
    pub fn upcoming<Tz: TimeZone>(&self, after: &DateTime<Tz>, count: usize) -> Vec<DateTime<Tz>> {
        self.schedule.after(after).take(count).collect()
    }
}

/// Parse a schedule expression
pub fn parse_schedule(expression: &str) -> Result<CronSchedule, ScheduleError> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(ScheduleError::Empty);
    }

    let normalized = normalize_expression(trimmed);
    let schedule = Schedule::from_str(&normalized).map_err(|e| ScheduleError::Invalid {
        expression: trimmed.to_string(),
        reason: e.to_string(),
    })?;

    Ok(CronSchedule {
        expression: trimmed.to_string(),
        schedule,
    })
}

/// Turn a crontab expression into the seconds-first form the parser expects
fn normalize_expression(expression: &str) -> String {
    if expression.starts_with('@') {
        return expression.to_string();
    }

    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return fields.join(" ");
    }

    format!(
        "0 {} {} {} {} {}",
        fields[0],
        fields[1],
        fields[2],
        fields[3],
        translate_day_of_week(fields[4])
    )
}

const DAY_NAMES: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// Crontab numbers days 0-7 with Sunday as 0 or 7; names are unambiguous.
fn translate_day_of_week(field: &str) -> String {
    field
        .split(',')
        .map(translate_day_item)
        .collect::<Vec<_>>()
        .join(",")
}

fn translate_day_item(item: &str) -> String {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => (range, Some(step)),
        None => (item, None),
    };

    let translated = match range.split_once('-') {
        Some((start, end)) => match (day_number(start), day_number(end)) {
            // A range ending on Sunday-as-7 cannot wrap, so split it.
            (Some(s), Some(7)) if s > 0 && step.is_none() => {
                return format!("{}-SAT,SUN", DAY_NAMES[s]);
            }
            (Some(s), Some(e)) => format!("{}-{}", DAY_NAMES[s], DAY_NAMES[e]),
            _ => range.to_string(),
        },
        None => match day_number(range) {
            Some(n) => DAY_NAMES[n].to_string(),
            None => range.to_string(),
        },
    };

    match step {
        Some(step) => format!("{}/{}", translated, step),
        None => translated,
    }
}

fn day_number(value: &str) -> Option<usize> {
    value.parse::<usize>().ok().filter(|n| *n <= 7)
}
