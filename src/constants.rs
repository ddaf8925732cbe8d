//! Application-wide constants: supervisor timing, device protocol, defaults.

use std::time::Duration;

// # Connection supervision timing

/// Upper bound for a single connect call.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Keep-alive interval while the link is idle.
pub const PING_INTERVAL: Duration = Duration::from_secs(20);

/// Idle threshold after which a ping is sent early, provided the previous
/// ping is at least this old as well.
pub const INACTIVITY_PING_THRESHOLD: Duration = Duration::from_secs(5);

/// Pause between fast reconnect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Fast connect attempts before escalating to a rescan by name.
pub const MAX_CONNECT_ATTEMPTS: u32 = 3;

/// Back-off after a rescan that did not find the device.
pub const RESCAN_DELAY: Duration = Duration::from_secs(5);

/// Discovery window used when re-locating a known device by name.
pub const RESCAN_TIMEOUT: Duration = Duration::from_secs(15);

/// Pacing sleep of the supervisor loop.
pub const LOOP_SLEEP: Duration = Duration::from_millis(500);

/// Minimum time between two schedule evaluations while connected.
pub const SCHEDULE_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Back-off after an unexpected fault escapes a loop iteration.
pub const FAULT_BACKOFF: Duration = Duration::from_secs(2);

/// Discovery window for user-requested scans.
pub const USER_SCAN_TIMEOUT: Duration = Duration::from_secs(12);

/// How long a control client waits for the outcome of a connect request.
pub const CONNECT_REPORT_TIMEOUT: Duration = Duration::from_secs(60);

// # Device protocol

/// GATT characteristic receiving command writes.
pub const COMMAND_CHARACTERISTIC_UUID: &str = "0000fff3-0000-1000-8000-00805f9b34fb";

/// No-op command used as keep-alive.
pub const KEEP_ALIVE_COMMAND: &str = "7e00000000000000ef";

/// Switches the LED off.
pub const POWER_OFF_COMMAND: &str = "7e00050300000000ef";

// # Location

/// Coordinates used when IP geolocation is unavailable.
pub const FALLBACK_LATITUDE: f64 = 47.4338;
pub const FALLBACK_LONGITUDE: f64 = 19.1931;

/// IP geolocation endpoint (plain HTTP on the free tier).
pub const GEOLOCATION_URL: &str = "http://ip-api.com/json/";

pub const GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(10);

// # Files

pub const SETTINGS_FILE_NAME: &str = "led_settings.json";
pub const SCHEDULE_FILE_NAME: &str = "led_schedule.json";
pub const LOCK_FILE_NAME: &str = "luxlink.lock";
pub const SOCKET_FILE_NAME: &str = "luxlink.sock";

// # Exit codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
