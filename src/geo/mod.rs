//! Location and sunrise/sunset times for sun-relative schedule rules.
//!
//! ## Module Structure
//!
//! - [`location`]: IP-based geolocation with a fixed fallback
//! - [`sun`]: astronomical sunrise/sunset for a date, and a per-day cache
//!
//! Neither half ever fails outward. A lookup that cannot reach the network
//! reports the fallback coordinates with `located == false`; a sun
//! computation that produces nonsense (polar day or night) reports no sun
//! times, which the evaluator treats as "sun-relative rules inactive".

pub mod location;
pub mod sun;

pub use location::{IpLocator, resolve_coordinates};
pub use sun::{SunTimes, SunTracker, sun_times};

#[cfg(test)]
mod tests;

/// Coordinates used for sun calculations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// True when the coordinates came from a successful lookup.
    pub located: bool,
}

impl Location {
    pub fn fallback() -> Self {
        Self {
            latitude: crate::constants::FALLBACK_LATITUDE,
            longitude: crate::constants::FALLBACK_LONGITUDE,
            located: false,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lat_dir = if self.latitude >= 0.0 { 'N' } else { 'S' };
        let lon_dir = if self.longitude >= 0.0 { 'E' } else { 'W' };
        write!(
            f,
            "{:.4}°{lat_dir}, {:.4}°{lon_dir}",
            self.latitude.abs(),
            self.longitude.abs()
        )
    }
}
