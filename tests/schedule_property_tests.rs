use chrono::{DateTime, NaiveDate, TimeZone, Utc, Weekday};
use proptest::prelude::*;

use luxlink::schedule::{DayRule, WeeklySchedule, active_color, palette};

const MINUTES_PER_DAY: u32 = 24 * 60;

fn friday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
}

fn hhmm(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

fn at(date: NaiveDate, minutes: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(minutes / 60, minutes % 60, 0).unwrap())
}

fn blue() -> &'static str {
    palette::find_by_name("Kék").unwrap().command_hex
}

fn friday_only(rule: DayRule) -> WeeklySchedule {
    WeeklySchedule::default().with_rule(Weekday::Fri, rule)
}

/// Same-day windows: on strictly before off.
fn same_day_window() -> impl Strategy<Value = (u32, u32)> {
    (0..MINUTES_PER_DAY - 1).prop_flat_map(|on| (Just(on), on + 1..MINUTES_PER_DAY))
}

/// Overnight windows: off at or before on.
fn overnight_window() -> impl Strategy<Value = (u32, u32)> {
    (0..MINUTES_PER_DAY).prop_flat_map(|on| (Just(on), 0..=on))
}

proptest! {
    /// A same-day rule is active exactly inside its half-open window.
    #[test]
    fn test_same_day_window_is_half_open(
        (on, off) in same_day_window(),
        now in 0..MINUTES_PER_DAY,
    ) {
        let schedule = friday_only(DayRule::fixed("Kék", &hhmm(on), &hhmm(off)));
        let verdict = active_color(&schedule, &at(friday(), now), None, None);

        let expected = (on <= now && now < off).then(blue);
        prop_assert_eq!(verdict, expected);
    }

    /// An overnight rule runs from its on time to the off time on the next
    /// day, even though the next day has no rule of its own.
    #[test]
    fn test_overnight_window_carries_into_next_day(
        (on, off) in overnight_window(),
        now in 0..MINUTES_PER_DAY,
    ) {
        let schedule = friday_only(DayRule::fixed("Kék", &hhmm(on), &hhmm(off)));
        let saturday = friday().succ_opt().unwrap();

        let on_friday = active_color(&schedule, &at(friday(), now), None, None);
        prop_assert_eq!(on_friday, (now >= on).then(blue));

        let on_saturday = active_color(&schedule, &at(saturday, now), None, None);
        prop_assert_eq!(on_saturday, (now < off).then(blue));
    }

    /// A sunrise-anchored rule behaves like a fixed rule at the anchor's time
    /// of day plus the offset, whatever date the anchor was computed for.
    #[test]
    fn test_sun_anchor_matches_equivalent_fixed_rule(
        anchor in 240..600u32,
        offset in -180..180i64,
        anchor_day_shift in -3..3i64,
        now in 0..MINUTES_PER_DAY,
    ) {
        let shifted = (anchor as i64 + offset) as u32;
        let anchor_date = friday() + chrono::Duration::days(anchor_day_shift);
        let sunrise = at(anchor_date, anchor);

        let sun_rule = DayRule {
            use_sunrise: true,
            sunrise_offset: offset,
            ..DayRule::fixed("Kék", "", "22:00")
        };
        let fixed_rule = DayRule::fixed("Kék", &hhmm(shifted), "22:00");

        let now = at(friday(), now);
        prop_assert_eq!(
            active_color(&friday_only(sun_rule), &now, Some(&sunrise), None),
            active_color(&friday_only(fixed_rule), &now, None, None)
        );
    }

    /// The verdict is either off or a payload from the palette.
    #[test]
    fn test_verdict_is_off_or_palette_payload(
        color_index in 0..palette::PALETTE.len(),
        on in 0..MINUTES_PER_DAY,
        off in 0..MINUTES_PER_DAY,
        now in 0..MINUTES_PER_DAY,
    ) {
        let entry = &palette::PALETTE[color_index];
        let schedule = friday_only(DayRule::fixed(entry.name, &hhmm(on), &hhmm(off)));

        match active_color(&schedule, &at(friday(), now), None, None) {
            None => {}
            Some(payload) => prop_assert_eq!(payload, entry.command_hex),
        }
    }
}
