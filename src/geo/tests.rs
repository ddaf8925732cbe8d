use super::*;
use chrono::{NaiveDate, Timelike, Utc};
use chrono_tz::Europe::Budapest;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// # Sun times

#[test]
fn test_budapest_midsummer_sun_times() {
    let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
    let (sunrise, sunset) = sun_times(47.4979, 19.0402, date, &Budapest).unwrap();

    assert_eq!(sunrise.date_naive(), date);
    assert_eq!(sunset.date_naive(), date);
    // Roughly 04:45 and 20:45 local summer time.
    assert!((4..=5).contains(&sunrise.hour()), "sunrise at {sunrise}");
    assert!((20..=21).contains(&sunset.hour()), "sunset at {sunset}");
}

#[test]
fn test_invalid_coordinates_give_no_sun_times() {
    let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
    assert!(sun_times(95.0, 0.0, date, &Utc).is_none());
    assert!(sun_times(0.0, 200.0, date, &Utc).is_none());
}

#[test]
fn test_polar_night_does_not_panic() {
    let date = NaiveDate::from_ymd_opt(2024, 12, 21).unwrap();
    // Whatever the calculation produces, it must be a sane day or nothing.
    if let Some((sunrise, sunset)) = sun_times(78.22, 15.65, date, &Utc) {
        assert!(sunrise < sunset);
    }
}

#[test]
fn test_tracker_recomputes_on_date_change() {
    let mut tracker = SunTracker::new(Location::fallback(), Budapest);
    let day_one = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let day_two = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

    let first = tracker.for_date(day_one).cloned().unwrap();
    assert!(!first.located);
    assert_eq!(first.latitude, crate::constants::FALLBACK_LATITUDE);
    assert_eq!(tracker.for_date(day_one).cloned().unwrap(), first);

    let second = tracker.for_date(day_two).cloned().unwrap();
    assert_eq!(second.sunrise.date_naive(), day_two);
    assert_ne!(first.sunrise, second.sunrise);
}

#[test]
fn test_location_display() {
    let location = Location {
        latitude: -33.8688,
        longitude: 151.2093,
        located: true,
    };
    assert_eq!(location.to_string(), "33.8688°S, 151.2093°E");
}

// # Geolocation

/// Serve a single canned HTTP response on an ephemeral port.
async fn serve_once(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });
    format!("http://{addr}/json/")
}

#[tokio::test]
async fn test_successful_lookup_is_located() {
    let url = serve_once(r#"{"status":"success","lat":52.52,"lon":13.405}"#).await;
    let location = IpLocator::new(url, Duration::from_secs(5)).resolve().await;
    assert!(location.located);
    assert_eq!(location.latitude, 52.52);
    assert_eq!(location.longitude, 13.405);
}

#[tokio::test]
async fn test_failed_status_falls_back() {
    let url = serve_once(r#"{"status":"fail","message":"private range"}"#).await;
    let location = IpLocator::new(url, Duration::from_secs(5)).resolve().await;
    assert_eq!(location, Location::fallback());
}

#[tokio::test]
async fn test_lookup_timeout_falls_back() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Accept and never answer.
        let _held = listener.accept().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let locator = IpLocator::new(format!("http://{addr}/json/"), Duration::from_millis(200));
    let location = locator.resolve().await;
    assert_eq!(location, Location::fallback());
    assert!(!location.located);
}

#[tokio::test]
async fn test_unreachable_service_falls_back() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let locator = IpLocator::new(format!("http://{addr}/json/"), Duration::from_secs(2));
    assert_eq!(locator.resolve().await, Location::fallback());
}
