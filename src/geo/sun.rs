//! Sunrise and sunset times.

use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use sunrise::{Coordinates, SolarDay, SolarEvent};

use super::Location;

/// Sunrise and sunset on one date, together with where they were computed.
#[derive(Debug, Clone, PartialEq)]
pub struct SunTimes<Z: TimeZone> {
    pub sunrise: DateTime<Z>,
    pub sunset: DateTime<Z>,
    pub latitude: f64,
    pub longitude: f64,
    pub located: bool,
}

/// Sunrise and sunset for `date` at the given coordinates, converted to `zone`.
///
/// Returns `None` for invalid coordinates and for results that do not form a
/// sensible day (sunset not after sunrise, or times far from `date`), which
/// happens near the poles.
pub fn sun_times<Z: TimeZone>(
    latitude: f64,
    longitude: f64,
    date: NaiveDate,
    zone: &Z,
) -> Option<(DateTime<Z>, DateTime<Z>)> {
    let coord = Coordinates::new(latitude, longitude)?;
    let solar_day = SolarDay::new(coord, date);
    let sunrise = solar_day
        .event_time(SolarEvent::Sunrise)
        .with_timezone(zone);
    let sunset = solar_day.event_time(SolarEvent::Sunset).with_timezone(zone);

    let near = |t: &DateTime<Z>| (t.date_naive() - date).abs() <= Duration::days(1);
    if sunrise < sunset && near(&sunrise) && near(&sunset) {
        Some((sunrise, sunset))
    } else {
        None
    }
}

/// Caches sun times for the current date and recomputes when the date changes.
#[derive(Debug, Clone)]
pub struct SunTracker<Z: TimeZone> {
    location: Location,
    zone: Z,
    cached: Option<(NaiveDate, Option<SunTimes<Z>>)>,
}

impl<Z: TimeZone> SunTracker<Z> {
    pub fn new(location: Location, zone: Z) -> Self {
        Self {
            location,
            zone,
            cached: None,
        }
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Sun times for `date`, computing them on first use of each date.
    pub fn for_date(&mut self, date: NaiveDate) -> Option<&SunTimes<Z>> {
        let stale = !matches!(&self.cached, Some((cached_date, _)) if *cached_date == date);
        if stale {
            let times = sun_times(self.location.latitude, self.location.longitude, date, &self.zone)
                .map(|(sunrise, sunset)| SunTimes {
                    sunrise,
                    sunset,
                    latitude: self.location.latitude,
                    longitude: self.location.longitude,
                    located: self.location.located,
                });
            if times.is_none() {
                log_warning!(
                    "No sunrise/sunset on {date} at {}, sun-relative rules are inactive",
                    self.location
                );
            }
            self.cached = Some((date, times));
        }
        self.cached.as_ref().and_then(|(_, times)| times.as_ref())
    }
}
