//! `sun`: where luxlink thinks it is and when the sun rises and sets today.

use anyhow::Result;
use chrono::Local;

use crate::geo::{SunTracker, resolve_coordinates};

pub async fn handle_sun_command() -> Result<()> {
    log_version!();
    log_block_start!("Resolving location...");

    let location = resolve_coordinates().await;
    if location.located {
        log_indented!("{location}");
    } else {
        log_indented!("{location} (fallback)");
    }

    let today = Local::now().date_naive();
    let mut tracker = SunTracker::new(location, Local);
    match tracker.for_date(today) {
        Some(times) => {
            log_block_start!("Sun times for {today}");
            log_indented!("Sunrise: {}", times.sunrise.format("%H:%M:%S"));
            log_indented!("Sunset:  {}", times.sunset.format("%H:%M:%S"));
            let daylight = times.sunset.clone() - times.sunrise.clone();
            log_indented!(
                "Daylight: {}h {:02}m",
                daylight.num_hours(),
                daylight.num_minutes() % 60
            );
        }
        None => log_block_start!("No sunrise or sunset today at this location"),
    }

    log_end!();
    Ok(())
}
