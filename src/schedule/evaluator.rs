//! Decides which color, if any, the LED should show at a given instant.
//!
//! A rule is resolved against a concrete date into an on/off window. When the
//! off time is not after the on time the window is taken to run past
//! midnight, so the off time moves to the following day. Because such a
//! window starts on one weekday and ends on the next, evaluation looks at
//! yesterday's rule first and today's rule second; the first window that
//! contains `now` wins.
//!
//! Yesterday's rule is resolved without sun anchors. Sun times are computed
//! for today only, so a sun-relative rule can never carry over from the
//! previous day.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone};

use super::{DayRule, WeeklySchedule, palette, parse_time_of_day};

/// A rule resolved against one date.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleWindow<Z: TimeZone> {
    pub on: Option<DateTime<Z>>,
    pub off: Option<DateTime<Z>>,
}

impl<Z: TimeZone> RuleWindow<Z> {
    /// Whether both ends resolved and `now` lies in `[on, off)`.
    pub fn contains(&self, now: &DateTime<Z>) -> bool {
        match (&self.on, &self.off) {
            (Some(on), Some(off)) => on <= now && now < off,
            _ => false,
        }
    }
}

/// Resolve `rule` on `date` in `zone`.
///
/// Sun anchors contribute only their local time of day, rebased onto `date`
/// and shifted by the rule's offset. A missing anchor or an unparseable clock
/// time leaves that end of the window unresolved.
pub fn resolve_window<Z: TimeZone>(
    rule: &DayRule,
    date: NaiveDate,
    zone: &Z,
    sunrise: Option<&DateTime<Z>>,
    sunset: Option<&DateTime<Z>>,
) -> RuleWindow<Z> {
    let on = if rule.use_sunrise {
        sunrise.and_then(|anchor| rebase(anchor, date, zone, rule.sunrise_offset))
    } else {
        parse_time_of_day(&rule.on_time).and_then(|time| local_at(zone, date, time))
    };

    let off = if rule.use_sunset {
        sunset.and_then(|anchor| rebase(anchor, date, zone, rule.sunset_offset))
    } else {
        parse_time_of_day(&rule.off_time).and_then(|time| local_at(zone, date, time))
    };

    let off = match (&on, off) {
        (Some(on), Some(off)) if off <= *on => Some(off + Duration::hours(24)),
        (_, off) => off,
    };

    RuleWindow { on, off }
}

/// The command payload for the color that should be showing at `now`.
///
/// `None` means the LED should be off: no window contains `now`, or the
/// winning rule names a color missing from the palette.
pub fn active_color<Z: TimeZone>(
    schedule: &WeeklySchedule,
    now: &DateTime<Z>,
    sunrise: Option<&DateTime<Z>>,
    sunset: Option<&DateTime<Z>>,
) -> Option<&'static str> {
    let zone = now.timezone();
    let today = now.date_naive();
    let yesterday = today.pred_opt()?;

    let carry_over = schedule.rule(yesterday.weekday());
    let own = schedule.rule(today.weekday());

    let winner = if resolve_window(carry_over, yesterday, &zone, None, None).contains(now) {
        carry_over
    } else if resolve_window(own, today, &zone, sunrise, sunset).contains(now) {
        own
    } else {
        return None;
    };

    palette::find_by_name(&winner.color).map(|entry| entry.command_hex)
}

fn local_at<Z: TimeZone>(zone: &Z, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Z>> {
    zone.from_local_datetime(&date.and_time(time)).earliest()
}

fn rebase<Z: TimeZone>(
    anchor: &DateTime<Z>,
    date: NaiveDate,
    zone: &Z,
    offset_minutes: i64,
) -> Option<DateTime<Z>> {
    let time = anchor.with_timezone(zone).time();
    let offset = Duration::try_minutes(offset_minutes)?;
    local_at(zone, date, time).and_then(|at| at.checked_add_signed(offset))
}
