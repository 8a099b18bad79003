//! Schedule derivation
//!
//! Turns a policy's kind and parameters into a standard five-field cron
//! expression (`minute hour day-of-month month day-of-week`) and validates
//! custom expressions before anything is registered.

use stowage_core::domain::policy::{SchedulePolicy, ScheduleKind};

use crate::error::{BackupError, Result};

const DEFAULT_TIME: &str = "02:00";
const DEFAULT_DAY_OF_WEEK: u8 = 0;
const DEFAULT_DAY_OF_MONTH: u8 = 1;

/// (name, min, max) for each of the five fields
const FIELDS: [(&str, u32, u32); 5] = [
    ("minute", 0, 59),
    ("hour", 0, 23),
    ("day-of-month", 1, 31),
    ("month", 1, 12),
    ("day-of-week", 0, 7),
];

/// Derives the five-field expression for a schedule
///
/// `custom` is only read for [`ScheduleKind::Custom`]; the other kinds only
/// read the parameters they need and fall back to 02:00, Sunday and the 1st.
pub fn schedule_to_cron(
    kind: ScheduleKind,
    time_of_day: Option<&str>,
    day_of_week: Option<u8>,
    day_of_month: Option<u8>,
    custom: Option<&str>,
) -> Result<String> {
    let time = || parse_time(time_of_day.unwrap_or(DEFAULT_TIME));

    let expr = match kind {
        ScheduleKind::Daily => {
            let (hour, minute) = time()?;
            format!("{} {} * * *", minute, hour)
        }
        ScheduleKind::Weekly => {
            let (hour, minute) = time()?;
            let day = day_of_week.unwrap_or(DEFAULT_DAY_OF_WEEK);
            if day > 6 {
                return Err(invalid(format!("day of week {} is not in 0-6", day)));
            }
            format!("{} {} * * {}", minute, hour, day)
        }
        ScheduleKind::Monthly => {
            let (hour, minute) = time()?;
            let day = day_of_month.unwrap_or(DEFAULT_DAY_OF_MONTH);
            if !(1..=31).contains(&day) {
                return Err(invalid(format!("day of month {} is not in 1-31", day)));
            }
            format!("{} {} {} * *", minute, hour, day)
        }
        ScheduleKind::Custom => {
            let expr = custom
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .ok_or_else(|| invalid("custom schedules need a cron expression"))?;
            validate_cron(expr)?;
            expr.split_whitespace().collect::<Vec<_>>().join(" ")
        }
    };

    Ok(expr)
}

/// [`schedule_to_cron`] applied to a stored policy
pub fn policy_cron(policy: &SchedulePolicy) -> Result<String> {
    schedule_to_cron(
        policy.kind,
        policy.time_of_day.as_deref(),
        policy.day_of_week,
        policy.day_of_month,
        policy.cron_expression.as_deref(),
    )
}

/// Checks a five-field cron expression
pub fn validate_cron(expr: &str) -> Result<()> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != FIELDS.len() {
        return Err(invalid(format!(
            "expected 5 fields, got {} in {:?}",
            fields.len(),
            expr
        )));
    }

    for (field, (name, min, max)) in fields.iter().zip(FIELDS) {
        validate_field(field, min, max)
            .map_err(|reason| invalid(format!("{} field {:?}: {}", name, field, reason)))?;
    }

    Ok(())
}

/// Seconds-first form registered with the cron primitive
pub fn to_trigger_expression(expr: &str) -> String {
    format!("0 {}", expr.trim())
}

fn validate_field(field: &str, min: u32, max: u32) -> std::result::Result<(), String> {
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (part, None),
        };

        if let Some(step) = step {
            match step.parse::<u32>() {
                Ok(0) => return Err("step must be greater than 0".to_string()),
                Ok(_) => {}
                Err(_) => return Err(format!("invalid step {:?}", step)),
            }
        }

        if range == "*" {
            continue;
        }

        let (start, end) = match range.split_once('-') {
            Some((start, end)) => (parse_value(start, min, max)?, parse_value(end, min, max)?),
            None => {
                let value = parse_value(range, min, max)?;
                (value, value)
            }
        };

        if start > end {
            return Err(format!("range {}-{} is reversed", start, end));
        }
    }

    Ok(())
}

fn parse_value(raw: &str, min: u32, max: u32) -> std::result::Result<u32, String> {
    let value: u32 = raw
        .parse()
        .map_err(|_| format!("invalid value {:?}", raw))?;

    if value < min || value > max {
        return Err(format!("{} is not in {}-{}", value, min, max));
    }

    Ok(value)
}

/// Parses `HH:MM` into (hour, minute)
fn parse_time(raw: &str) -> Result<(u8, u8)> {
    let bad = || invalid(format!("time of day {:?} is not HH:MM", raw));

    let (hour, minute) = raw.trim().split_once(':').ok_or_else(bad)?;
    let hour: u8 = hour.parse().map_err(|_| bad())?;
    let minute: u8 = minute.parse().map_err(|_| bad())?;

    if hour > 23 || minute > 59 {
        return Err(bad());
    }

    Ok((hour, minute))
}

fn invalid(reason: impl Into<String>) -> BackupError {
    BackupError::ScheduleValidationFailed(reason.into())
}
