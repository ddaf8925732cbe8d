//! Loading and saving the schedule file.
//!
//! Loading never fails. Every day starts from the default rule and only the
//! fields that are present with a usable type overwrite it, so one bad value
//! costs exactly that value. Saving is best effort: failures are logged and
//! reported through the return value, never raised.

use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use super::{DayRule, WEEK, WeeklySchedule, weekday_key};
use crate::config::write_json_atomic;

/// Load the weekly schedule from `path`, falling back to defaults per field.
pub fn load_schedule(path: &Path) -> WeeklySchedule {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log_indented!("No schedule at {}, using defaults", path.display());
            return WeeklySchedule::default();
        }
        Err(e) => {
            log_warning!("Could not read schedule {}: {e}", path.display());
            return WeeklySchedule::default();
        }
    };

    parse_schedule(&text, path)
}

/// Parse schedule JSON leniently. `origin` is only used in warnings.
pub fn parse_schedule(text: &str, origin: &Path) -> WeeklySchedule {
    let mut schedule = WeeklySchedule::default();

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            log_warning!("Malformed schedule file {}: {e}", origin.display());
            log_indented!("Using the default schedule");
            return schedule;
        }
    };

    let Some(days) = value.as_object() else {
        log_warning!(
            "Schedule file {} is not a JSON object, using defaults",
            origin.display()
        );
        return schedule;
    };

    for day in WEEK {
        let key = weekday_key(day);
        match days.get(key) {
            Some(Value::Object(fields)) => {
                merge_day(schedule.rule_mut(day), key, fields);
            }
            Some(_) => log_warning!("Schedule entry for {key} is not an object, using defaults"),
            None => {}
        }
    }

    schedule
}

fn merge_day(rule: &mut DayRule, day: &str, fields: &Map<String, Value>) {
    if let Some(value) = fields.get("color") {
        match value.as_str() {
            Some(color) => rule.color = color.to_string(),
            None => warn_field(day, "color", value),
        }
    }
    if let Some(value) = fields.get("on_time") {
        match value.as_str() {
            Some(time) => rule.on_time = time.to_string(),
            None => warn_field(day, "on_time", value),
        }
    }
    if let Some(value) = fields.get("off_time") {
        match value.as_str() {
            Some(time) => rule.off_time = time.to_string(),
            None => warn_field(day, "off_time", value),
        }
    }
    if let Some(value) = fields.get("sunrise") {
        match value.as_bool() {
            Some(flag) => rule.use_sunrise = flag,
            None => warn_field(day, "sunrise", value),
        }
    }
    if let Some(value) = fields.get("sunset") {
        match value.as_bool() {
            Some(flag) => rule.use_sunset = flag,
            None => warn_field(day, "sunset", value),
        }
    }
    if let Some(value) = fields.get("sunrise_offset") {
        rule.sunrise_offset = read_offset(day, "sunrise_offset", value);
    }
    if let Some(value) = fields.get("sunset_offset") {
        rule.sunset_offset = read_offset(day, "sunset_offset", value);
    }
}

fn warn_field(day: &str, field: &str, value: &Value) {
    log_warning!("Ignoring invalid {field} {value} for {day}, keeping default");
}

/// Offsets are whole minutes. Integral floats are truncated and numeric
/// strings are parsed; anything else becomes 0.
fn read_offset(day: &str, field: &str, value: &Value) -> i64 {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed.unwrap_or_else(|| {
        log_warning!("Invalid offset {value} for {day} {field}, using 0");
        0
    })
}

/// Persist `schedule` to `path`. Returns whether the write succeeded.
pub fn save_schedule(schedule: &WeeklySchedule, path: &Path) -> bool {
    match write_json_atomic(path, schedule) {
        Ok(()) => {
            log_indented!("Schedule saved to {}", path.display());
            true
        }
        Err(e) => {
            log_error!("Failed to save schedule: {e}");
            false
        }
    }
}
