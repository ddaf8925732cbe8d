//! `schedule` and `schedule set`.

use anyhow::{Context, Result};
use chrono::{Datelike, Local, Weekday};

use crate::args::{ScheduleEdit, Trigger};
use crate::config::ConfigPaths;
use crate::constants::LOCK_FILE_NAME;
use crate::geo::{resolve_coordinates, sun_times};
use crate::io::lock::running_pid;
use crate::io::{runtime_file, signals};
use crate::schedule::validation::apply_drafts;
use crate::schedule::{
    DayDraft, DayRule, WeeklySchedule, load_schedule, palette, resolve_window, save_schedule,
    weekday_key,
};

/// Print the week, today's resolved window, and what the LED should show now.
pub async fn handle_schedule_show_command(paths: &ConfigPaths) -> Result<()> {
    log_version!();

    let path = paths.schedule_path();
    let schedule = load_schedule(&path);
    let now = Local::now();
    let today = now.date_naive();

    log_block_start!("Weekly schedule ({})", path.display());
    print_week(&schedule, today.weekday());

    let rule = schedule.rule(today.weekday());
    let sun = if rule.use_sunrise || rule.use_sunset {
        let location = resolve_coordinates().await;
        sun_times(location.latitude, location.longitude, today, &Local)
    } else {
        None
    };
    let (sunrise, sunset) = match &sun {
        Some((sunrise, sunset)) => (Some(sunrise), Some(sunset)),
        None => (None, None),
    };

    log_block_start!("Today ({})", weekday_key(today.weekday()));
    let window = resolve_window(rule, today, &Local, sunrise, sunset);
    match (&window.on, &window.off) {
        (Some(on), Some(off)) => {
            let next_day = if off.date_naive() > today { " (next day)" } else { "" };
            log_indented!("Window: {} - {}{next_day}", on.format("%H:%M"), off.format("%H:%M"));
        }
        _ if rule.is_noop() => log_indented!("Window: none (no rule)"),
        _ => log_indented!("Window: none"),
    }

    match crate::schedule::active_color(&schedule, &now, sunrise, sunset)
        .and_then(palette::find_by_command)
    {
        Some(entry) => log_indented!("Now: on, {}", entry.name),
        None => log_indented!("Now: off"),
    }

    log_end!();
    Ok(())
}

/// Validate the edit for every selected day and save it all at once.
pub fn handle_schedule_set_command(
    paths: &ConfigPaths,
    days: &[Weekday],
    edit: &ScheduleEdit,
) -> Result<()> {
    log_version!();

    let path = paths.schedule_path();
    let schedule = load_schedule(&path);
    let drafts: Vec<(Weekday, DayDraft)> = days
        .iter()
        .map(|day| (*day, apply_edit(DayDraft::from(schedule.rule(*day)), edit)))
        .collect();

    let updated = apply_drafts(&schedule, &drafts).context("Schedule not saved")?;

    if !save_schedule(&updated, &path) {
        anyhow::bail!("Failed to save {}", path.display());
    }

    log_block_start!("Schedule saved");
    for day in days {
        log_indented!("{:<10} {}", weekday_key(*day), describe_rule(updated.rule(*day)));
    }

    if let Some(pid) = running_pid(&runtime_file(LOCK_FILE_NAME)) {
        signals::send_reload(pid).context("Failed to notify the running daemon")?;
        log_decorated!("Running daemon notified");
    }

    log_end!();
    Ok(())
}

/// Overlay the command-line changes on a day's current values.
pub(crate) fn apply_edit(mut draft: DayDraft, edit: &ScheduleEdit) -> DayDraft {
    if let Some(color) = &edit.color {
        draft.color = color.clone();
    }
    match &edit.on {
        Some(Trigger::At(time)) => {
            draft.use_sunrise = false;
            draft.on_time = time.clone();
        }
        Some(Trigger::Sun(offset)) => {
            draft.use_sunrise = true;
            draft.sunrise_offset = offset.clone();
        }
        None => {}
    }
    match &edit.off {
        Some(Trigger::At(time)) => {
            draft.use_sunset = false;
            draft.off_time = time.clone();
        }
        Some(Trigger::Sun(offset)) => {
            draft.use_sunset = true;
            draft.sunset_offset = offset.clone();
        }
        None => {}
    }
    draft
}

/// One line per day: color and triggers, or a marker for a rule that does nothing.
pub(crate) fn describe_rule(rule: &DayRule) -> String {
    if rule.is_noop() {
        return "(no rule)".to_string();
    }
    format!(
        "{:<8} {} - {}",
        rule.color,
        rule.describe_on(),
        rule.describe_off()
    )
}

fn print_week(schedule: &WeeklySchedule, today: Weekday) {
    for (day, rule) in schedule.iter() {
        let marker = if day == today { '▸' } else { ' ' };
        log_indented!("{marker} {:<10} {}", weekday_key(day), describe_rule(rule));
    }
}
