//! Strict validation of schedule edits.
//!
//! Edits arrive as raw strings, the way a user typed them. A draft either
//! becomes a [`DayRule`] or is rejected with the first problem found; callers
//! validate every draft before touching the stored schedule so that a bad
//! field never results in a partial write.

use chrono::Weekday;
use std::fmt;

use super::{DayRule, WeeklySchedule, palette, parse_time_of_day, weekday_key};

/// A rejected field, with a message suitable for showing to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{day}: invalid {field}: {message}")]
pub struct ValidationError {
    pub day: String,
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(day: Weekday, field: &'static str, message: impl fmt::Display) -> Self {
        Self {
            day: weekday_key(day).to_string(),
            field,
            message: message.to_string(),
        }
    }
}

/// Unvalidated field values for one day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayDraft {
    pub color: String,
    pub on_time: String,
    pub off_time: String,
    pub use_sunrise: bool,
    pub sunrise_offset: String,
    pub use_sunset: bool,
    pub sunset_offset: String,
}

impl From<&DayRule> for DayDraft {
    fn from(rule: &DayRule) -> Self {
        Self {
            color: rule.color.clone(),
            on_time: rule.on_time.clone(),
            off_time: rule.off_time.clone(),
            use_sunrise: rule.use_sunrise,
            sunrise_offset: rule.sunrise_offset.to_string(),
            use_sunset: rule.use_sunset,
            sunset_offset: rule.sunset_offset.to_string(),
        }
    }
}

impl DayDraft {
    /// Check every field and produce the rule to store for `day`.
    pub fn validate(&self, day: Weekday) -> Result<DayRule, ValidationError> {
        let color = match self.color.trim() {
            "" => palette::default_color().name,
            name => palette::find_by_name_loose(name)
                .map(|entry| entry.name)
                .ok_or_else(|| {
                    ValidationError::new(day, "color", format!("unknown color '{name}'"))
                })?,
        };

        let sunrise_offset = parse_offset(day, "sunrise_offset", &self.sunrise_offset)?;
        let sunset_offset = parse_offset(day, "sunset_offset", &self.sunset_offset)?;

        let on_time = if self.use_sunrise {
            String::new()
        } else {
            parse_clock(day, "on_time", &self.on_time)?
        };
        let off_time = if self.use_sunset {
            String::new()
        } else {
            parse_clock(day, "off_time", &self.off_time)?
        };

        Ok(DayRule {
            color: color.to_string(),
            on_time,
            off_time,
            use_sunrise: self.use_sunrise,
            sunrise_offset,
            use_sunset: self.use_sunset,
            sunset_offset,
        })
    }
}

/// Validate all drafts, then apply them to `schedule` in one step.
///
/// Nothing is applied unless every draft is valid.
pub fn apply_drafts(
    schedule: &WeeklySchedule,
    drafts: &[(Weekday, DayDraft)],
) -> Result<WeeklySchedule, ValidationError> {
    let rules = drafts
        .iter()
        .map(|(day, draft)| draft.validate(*day).map(|rule| (*day, rule)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rules
        .into_iter()
        .fold(schedule.clone(), |acc, (day, rule)| acc.with_rule(day, rule)))
}

fn parse_offset(day: Weekday, field: &'static str, input: &str) -> Result<i64, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed.parse::<i64>().map_err(|_| {
        ValidationError::new(day, field, format!("'{trimmed}' is not a whole number of minutes"))
    })
}

fn parse_clock(day: Weekday, field: &'static str, input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    match parse_time_of_day(trimmed) {
        Some(_) => Ok(trimmed.to_string()),
        None => Err(ValidationError::new(
            day,
            field,
            format!("'{trimmed}' is not a time (expected HH:MM)"),
        )),
    }
}
