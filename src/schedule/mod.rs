//! Weekly LED schedule: the rule model, its persistence, and its evaluation.
//!
//! A schedule holds exactly one [`DayRule`] per weekday. Each rule switches
//! the LED on at a fixed clock time or at sunrise plus an offset, and off at
//! a fixed clock time or at sunset plus an offset, in the rule's color.
//!
//! ## Module Structure
//!
//! - [`palette`]: the fixed color table referenced by name from rules
//! - [`store`]: lenient loading and atomic saving of the schedule file
//! - [`evaluator`]: decides the active color for an instant, including
//!   intervals that run past midnight
//! - [`validation`]: strict checking of user edits before they are written
//!
//! ## File format
//!
//! ```json
//! {
//!     "Hétfő": {
//!         "color": "Kék",
//!         "on_time": "18:00",
//!         "off_time": "",
//!         "sunrise": false,
//!         "sunrise_offset": 0,
//!         "sunset": true,
//!         "sunset_offset": 30
//!     }
//! }
//! ```
//!
//! Weekday keys are the Hungarian day names, Monday first.

use chrono::{NaiveTime, Weekday};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

pub mod evaluator;
pub mod palette;
pub mod store;
pub mod validation;

pub use evaluator::{RuleWindow, active_color, resolve_window};
pub use palette::ColorEntry;
pub use store::{load_schedule, save_schedule};
pub use validation::{DayDraft, ValidationError};


/// Weekdays in file order.
pub const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Schedule file keys, indexed from Monday.
pub const WEEKDAY_KEYS: [&str; 7] = [
    "Hétfő",
    "Kedd",
    "Szerda",
    "Csütörtök",
    "Péntek",
    "Szombat",
    "Vasárnap",
];

/// The schedule file key for a weekday.
pub fn weekday_key(day: Weekday) -> &'static str {
    WEEKDAY_KEYS[day.num_days_from_monday() as usize]
}

/// Resolve a weekday from a schedule key or an English day name ("mon", "Friday").
pub fn parse_weekday(input: &str) -> Option<Weekday> {
    let trimmed = input.trim();
    WEEKDAY_KEYS
        .iter()
        .position(|key| key.to_lowercase() == trimmed.to_lowercase())
        .map(|index| WEEK[index])
        .or_else(|| trimmed.parse::<Weekday>().ok())
}

/// Parse an "HH:MM" (or "HH:MM:SS") local time of day. Empty input is `None`.
pub fn parse_time_of_day(input: &str) -> Option<NaiveTime> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .ok()
}

/// One weekday's on/off rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRule {
    /// Palette entry name.
    pub color: String,
    /// Fixed on time, used only when `use_sunrise` is false.
    pub on_time: String,
    /// Fixed off time, used only when `use_sunset` is false.
    pub off_time: String,
    #[serde(rename = "sunrise")]
    pub use_sunrise: bool,
    /// Minutes added to sunrise (may be negative).
    pub sunrise_offset: i64,
    #[serde(rename = "sunset")]
    pub use_sunset: bool,
    /// Minutes added to sunset (may be negative).
    pub sunset_offset: i64,
}

impl Default for DayRule {
    fn default() -> Self {
        Self {
            color: palette::default_color().name.to_string(),
            on_time: String::new(),
            off_time: String::new(),
            use_sunrise: false,
            sunrise_offset: 0,
            use_sunset: false,
            sunset_offset: 0,
        }
    }
}

impl DayRule {
    /// A rule that switches on and off at fixed clock times.
    pub fn fixed(color: &str, on_time: &str, off_time: &str) -> Self {
        Self {
            color: color.to_string(),
            on_time: on_time.to_string(),
            off_time: off_time.to_string(),
            ..Self::default()
        }
    }

    /// A rule that does nothing on its day: no usable color and no usable times.
    pub fn is_noop(&self) -> bool {
        let has_on = self.use_sunrise || parse_time_of_day(&self.on_time).is_some();
        let has_off = self.use_sunset || parse_time_of_day(&self.off_time).is_some();
        self.color.trim().is_empty() && !has_on && !has_off
    }

    /// Human-readable summary of the on trigger, e.g. "sunrise+15m" or "18:00".
    pub fn describe_on(&self) -> String {
        describe_trigger(self.use_sunrise, "sunrise", self.sunrise_offset, &self.on_time)
    }

    /// Human-readable summary of the off trigger.
    pub fn describe_off(&self) -> String {
        describe_trigger(self.use_sunset, "sunset", self.sunset_offset, &self.off_time)
    }
}

fn describe_trigger(sun_relative: bool, event: &str, offset: i64, time: &str) -> String {
    if sun_relative {
        match offset {
            0 => event.to_string(),
            o if o > 0 => format!("{event}+{o}m"),
            o => format!("{event}{o}m"),
        }
    } else if time.trim().is_empty() {
        "-".to_string()
    } else {
        time.trim().to_string()
    }
}

/// Seven rules, one per weekday.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WeeklySchedule {
    days: [DayRule; 7],
}

impl WeeklySchedule {
    pub fn rule(&self, day: Weekday) -> &DayRule {
        &self.days[day.num_days_from_monday() as usize]
    }

    pub fn rule_mut(&mut self, day: Weekday) -> &mut DayRule {
        &mut self.days[day.num_days_from_monday() as usize]
    }

    /// Replace the rule for one weekday, returning the builder for chaining.
    pub fn with_rule(mut self, day: Weekday, rule: DayRule) -> Self {
        *self.rule_mut(day) = rule;
        self
    }

    /// Iterate rules in Monday-first order.
    pub fn iter(&self) -> impl Iterator<Item = (Weekday, &DayRule)> {
        WEEK.iter().copied().zip(self.days.iter())
    }
}

// Serialized as an object keyed by weekday name, Monday first, so saved files
// are stable across runs.
impl Serialize for WeeklySchedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.days.len()))?;
        for (day, rule) in self.iter() {
            map.serialize_entry(weekday_key(day), rule)?;
        }
        map.end()
    }
}
