//! End-to-end tests of the daemon wiring over a scripted transport.
//!
//! These run the real supervisor, command worker, persistence task, and
//! control socket; only the radio and the wall clock are replaced.

use chrono::{Local, TimeZone};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use luxlink::config::{ConfigPaths, Settings};
use luxlink::constants::POWER_OFF_COMMAND;
use luxlink::geo::Location;
use luxlink::ipc::{ControlClient, ControlServer, Request, Response};
use luxlink::logger::Log;
use luxlink::schedule::{DayRule, WEEK, WeeklySchedule, palette, save_schedule};
use luxlink::supervisor::{ConnectionState, Event, Status};
use luxlink::time_source::FixedClock;
use luxlink::transport::DeviceIdentity;
use luxlink::transport::fake::ScriptedTransport;
use luxlink::{Services, start_services};

const ADDRESS: &str = "BE:16:F8:1D:4E:02";

fn device() -> DeviceIdentity {
    DeviceIdentity::new("LEDDMX-03", ADDRESS)
}

fn command_for(name: &str) -> &'static str {
    palette::find_by_name(name).unwrap().command_hex
}

fn always(color: &str) -> WeeklySchedule {
    WEEK.iter().fold(WeeklySchedule::default(), |acc, day| {
        acc.with_rule(*day, DayRule::fixed(color, "00:00", "00:00"))
    })
}

struct Daemon {
    _dir: TempDir,
    paths: ConfigPaths,
    transport: ScriptedTransport,
    services: Services,
    stop: CancellationToken,
}

impl Daemon {
    /// Start with `device()` remembered, so the supervisor auto-connects.
    fn start(remembered: Option<DeviceIdentity>) -> Self {
        Log::set_enabled(false);
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::from_dir(dir.path());

        let mut settings = Settings::default();
        if let Some(device) = &remembered {
            settings.remember_device(device);
        }
        settings.save(&paths.settings_path()).unwrap();

        let transport = ScriptedTransport::new();
        let stop = CancellationToken::new();
        let clock = FixedClock::new(Local.with_ymd_and_hms(2024, 6, 14, 12, 0, 0).unwrap());
        let services = start_services(
            transport.clone(),
            Arc::new(clock),
            Location::fallback(),
            paths.clone(),
            stop.clone(),
            false,
        );

        Self {
            _dir: dir,
            paths,
            transport,
            services,
            stop,
        }
    }

    fn serve(&self, socket: &Path) {
        let server = ControlServer::bind(socket).unwrap();
        tokio::spawn(server.serve(self.services.control_context(), self.stop.clone()));
    }

    async fn wait_for_status(&self, wanted: impl Fn(&Status) -> bool) -> Status {
        let mut status = self.services.supervisor.watch_status();
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                let current = status.borrow_and_update().clone();
                if wanted(&current) {
                    return current;
                }
                status.changed().await.unwrap();
            }
        })
        .await
        .expect("status never reached the wanted state")
    }

    async fn wait_for_settings(&self, wanted: impl Fn(&Settings) -> bool) -> Settings {
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                let settings = Settings::load(&self.paths.settings_path());
                if wanted(&settings) {
                    return settings;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("settings never reached the wanted state")
    }

    async fn shutdown(self) -> ScriptedTransport {
        self.stop.cancel();
        self.services.join().await;
        self.transport
    }
}

async fn call(socket: &Path, request: Request) -> (Vec<Response>, bool) {
    let mut client = ControlClient::connect(socket).await.unwrap().unwrap();
    let mut seen = Vec::new();
    let (ok, _) = client
        .call(&request, |response| seen.push(response.clone()))
        .await
        .unwrap();
    (seen, ok)
}

#[tokio::test]
async fn test_auto_connect_and_status_over_socket() {
    let daemon = Daemon::start(Some(device()));
    let socket_dir = tempfile::tempdir().unwrap();
    let socket = socket_dir.path().join("luxlink.sock");
    daemon.serve(&socket);

    daemon
        .wait_for_status(|s| s.state == ConnectionState::Connected)
        .await;

    let (responses, ok) = call(&socket, Request::Status).await;
    assert!(ok);
    match &responses[0] {
        Response::Status { status } => {
            assert_eq!(status.state, ConnectionState::Connected);
            assert_eq!(status.device, Some(device()));
        }
        other => panic!("expected a status response, got {other:?}"),
    }

    let transport = daemon.shutdown().await;
    assert_eq!(transport.linked_address(), None);
}

#[tokio::test]
async fn test_set_color_over_socket_writes_palette_payload() {
    let daemon = Daemon::start(Some(device()));
    let socket_dir = tempfile::tempdir().unwrap();
    let socket = socket_dir.path().join("luxlink.sock");
    daemon.serve(&socket);

    // No rule is active, so the first check switches the LED off.
    daemon.wait_for_status(|s| !s.led.is_on).await;

    let (_, ok) = call(
        &socket,
        Request::SetColor {
            color: "Kék".to_string(),
        },
    )
    .await;
    assert!(ok);

    let status = daemon.wait_for_status(|s| s.led.is_on).await;
    assert_eq!(status.led.color_name(), Some("Kék"));

    let (_, ok) = call(&socket, Request::PowerOff).await;
    assert!(ok);

    let transport = daemon.shutdown().await;
    let writes = transport.writes();
    let kek = writes.iter().position(|w| w == command_for("Kék")).unwrap();
    assert_eq!(writes[0], POWER_OFF_COMMAND);
    assert_eq!(writes[kek + 1..].first().map(String::as_str), Some(POWER_OFF_COMMAND));
}

#[tokio::test]
async fn test_unknown_color_is_reported_as_failure() {
    let daemon = Daemon::start(None);
    let socket_dir = tempfile::tempdir().unwrap();
    let socket = socket_dir.path().join("luxlink.sock");
    daemon.serve(&socket);

    let mut client = ControlClient::connect(&socket).await.unwrap().unwrap();
    let (ok, message) = client
        .call(
            &Request::SetColor {
                color: "Lila".to_string(),
            },
            |_| {},
        )
        .await
        .unwrap();

    assert!(!ok);
    assert_eq!(message.as_deref(), Some("Unknown color 'Lila'"));
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_command_without_link_fails() {
    let daemon = Daemon::start(None);
    let socket_dir = tempfile::tempdir().unwrap();
    let socket = socket_dir.path().join("luxlink.sock");
    daemon.serve(&socket);

    let (_, ok) = call(&socket, Request::PowerOn).await;
    assert!(!ok);
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_user_disconnect_forgets_device() {
    let daemon = Daemon::start(Some(device()));
    let socket_dir = tempfile::tempdir().unwrap();
    let socket = socket_dir.path().join("luxlink.sock");
    daemon.serve(&socket);

    daemon
        .wait_for_status(|s| s.state == ConnectionState::Connected)
        .await;

    let (_, ok) = call(&socket, Request::Disconnect).await;
    assert!(ok);

    let settings = daemon
        .wait_for_settings(|s| s.last_device_address.is_none())
        .await;
    assert_eq!(settings.last_device_name, None);
    assert!(settings.auto_connect_on_startup);

    let status = daemon.wait_for_status(|s| s.device.is_none()).await;
    assert_eq!(status.state, ConnectionState::Disconnected);
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_watch_streams_status_then_events() {
    let daemon = Daemon::start(None);
    let socket_dir = tempfile::tempdir().unwrap();
    let socket = socket_dir.path().join("luxlink.sock");
    daemon.serve(&socket);

    let mut watcher = ControlClient::connect(&socket).await.unwrap().unwrap();
    watcher.send(&Request::Watch).await.unwrap();
    match watcher.next().await.unwrap() {
        Some(Response::Status { status }) => assert_eq!(status.device, None),
        other => panic!("expected the initial status, got {other:?}"),
    }

    let (_, ok) = call(
        &socket,
        Request::SetColor {
            color: "Lila".to_string(),
        },
    )
    .await;
    assert!(!ok);

    let next = tokio::time::timeout(Duration::from_secs(10), watcher.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        next,
        Some(Response::Event {
            event: Event::CommandError {
                message: "Unknown color 'Lila'".to_string()
            }
        })
    );
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_no_daemon_means_no_client() {
    let socket_dir = tempfile::tempdir().unwrap();
    let socket = socket_dir.path().join("luxlink.sock");
    assert!(ControlClient::connect(&socket).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_user_connect_is_persisted() {
    let daemon = Daemon::start(None);
    daemon.transport.push_scan(vec![
        DeviceIdentity::new("Other", "11:22:33:44:55:66"),
        device(),
    ]);
    let mut events = daemon.services.events.subscribe();

    let found = daemon.services.controller.connect("LEDDMX-03").wait().await;
    assert_eq!(found, Ok(device()));

    loop {
        match events.recv().await.unwrap() {
            Event::ConnectResult { device: connected } => {
                assert_eq!(connected, device());
                break;
            }
            Event::ConnectError { message } => panic!("connect failed: {message}"),
            _ => {}
        }
    }

    let settings = daemon
        .wait_for_settings(|s| s.last_device_address.is_some())
        .await;
    assert_eq!(settings.last_device(), Some(device()));
    assert_eq!(settings.last_device_name.as_deref(), Some("LEDDMX-03"));
    daemon.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reload_applies_new_schedule() {
    let daemon = Daemon::start(Some(device()));
    daemon.wait_for_status(|s| !s.led.is_on).await;

    assert!(save_schedule(&always("Zöld"), &daemon.paths.schedule_path()));
    daemon.services.reload();

    let status = daemon.wait_for_status(|s| s.led.is_on).await;
    assert_eq!(status.led.color_name(), Some("Zöld"));

    let transport = daemon.shutdown().await;
    assert!(transport.writes().contains(&command_for("Zöld").to_string()));
}
