use super::*;
use crate::constants::PING_INTERVAL;
use crate::geo::{Location, SunTracker};
use crate::schedule::{DayRule, WEEK, palette};
use crate::time_source::FixedClock;
use crate::transport::fake::{Call, ScriptedTransport};
use crate::transport::share;
use chrono::{Local, TimeZone};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const ADDRESS: &str = "BE:16:F8:1D:4E:02";

fn device() -> DeviceIdentity {
    DeviceIdentity::new("LEDDMX-03", ADDRESS)
}

fn kek() -> &'static str {
    palette::find_by_name("Kék").unwrap().command_hex
}

/// On all day, every day, in blue.
fn always_blue() -> WeeklySchedule {
    WEEK.iter().fold(WeeklySchedule::default(), |acc, day| {
        acc.with_rule(*day, DayRule::fixed("Kék", "00:00", "00:00"))
    })
}

struct Harness {
    transport: ScriptedTransport,
    handle: SupervisorHandle,
    events: broadcast::Receiver<Event>,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl Harness {
    fn start(
        transport: ScriptedTransport,
        target: Option<DeviceIdentity>,
        schedule: WeeklySchedule,
        led: LedState,
    ) -> Self {
        let clock = FixedClock::new(Local.with_ymd_and_hms(2024, 6, 14, 12, 0, 0).unwrap());
        let bus = EventBus::new();
        let events = bus.subscribe();
        let stop = CancellationToken::new();
        let (supervisor, handle) = Supervisor::new(
            share(transport.clone()),
            Arc::new(clock),
            SunTracker::new(Location::fallback(), Local),
            schedule,
            bus,
            stop.clone(),
        );
        let supervisor = supervisor.with_target(target).with_led(led);
        let task = tokio::spawn(supervisor.run());
        Self {
            transport,
            handle,
            events,
            stop,
            task,
        }
    }

    /// Connected to `device()` with nothing for the schedule to correct.
    fn quiet(transport: ScriptedTransport) -> Self {
        Self::start(
            transport,
            Some(device()),
            WeeklySchedule::default(),
            LedState::off(palette::default_color().command_hex),
        )
    }

    fn drain_events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    fn connects(&self) -> Vec<String> {
        self.transport
            .calls()
            .into_iter()
            .filter_map(|(_, call)| match call {
                Call::Connect(address) => Some(address),
                _ => None,
            })
            .collect()
    }

    fn pings_between(&self, from: Instant, to: Instant) -> usize {
        self.transport
            .calls()
            .iter()
            .filter(|(at, call)| {
                *at > from && *at <= to && *call == Call::Write(KEEP_ALIVE_COMMAND.to_string())
            })
            .count()
    }

    async fn stop(self) -> ScriptedTransport {
        self.stop.cancel();
        self.task.await.unwrap();
        self.transport
    }
}

fn states(events: &[Event]) -> Vec<ConnectionState> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::ConnectionStateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

async fn wait(seconds: f64) {
    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
}

// # Reconnection

#[tokio::test(start_paused = true)]
async fn test_connects_after_fewer_than_max_failures_without_rescan() {
    let transport = ScriptedTransport::new();
    transport.fail_connects(2);
    let harness = Harness::quiet(transport);

    wait(5.0).await;

    assert_eq!(harness.connects().len(), 3);
    assert!(
        !harness.transport.calls().iter().any(|(_, call)| *call == Call::Scan),
        "no rescan expected"
    );
    assert_eq!(harness.handle.status().state, ConnectionState::Connected);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_rescans_by_name_after_max_failures() {
    let moved = DeviceIdentity::new("LEDDMX-03", "BE:16:F8:1D:4E:99");
    let transport = ScriptedTransport::new();
    transport.fail_connects(3).push_scan(vec![
        DeviceIdentity::new("Other", "11:22:33:44:55:66"),
        moved.clone(),
    ]);
    let mut harness = Harness::quiet(transport);

    wait(25.0).await;

    let calls: Vec<Call> = harness.transport.calls().into_iter().map(|(_, c)| c).collect();
    assert_eq!(
        &calls[..5],
        &[
            Call::Connect(ADDRESS.to_string()),
            Call::Connect(ADDRESS.to_string()),
            Call::Connect(ADDRESS.to_string()),
            Call::Scan,
            Call::Connect(moved.address.clone()),
        ]
    );

    let status = harness.handle.status();
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.device.unwrap().address, moved.address);

    let events = harness.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::ConnectionStateChanged { state: ConnectionState::Connected, device: Some(d) }
            if d.address == moved.address
    )));
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_rescan_miss_backs_off_before_next_round() {
    let transport = ScriptedTransport::new();
    transport.fail_connects(6).push_scan(vec![]);
    let harness = Harness::quiet(transport);

    wait(30.0).await;

    let calls = harness.transport.calls();
    let scan_at = calls
        .iter()
        .find(|(_, call)| *call == Call::Scan)
        .map(|(at, _)| *at)
        .unwrap();
    let next_connect = calls
        .iter()
        .find(|(at, call)| *at > scan_at && matches!(call, Call::Connect(_)))
        .map(|(at, _)| *at)
        .unwrap();

    // Scan window plus rescan back-off.
    assert!(next_connect.duration_since(scan_at) >= RESCAN_TIMEOUT + RESCAN_DELAY);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_rescan_backs_off_like_a_miss() {
    let transport = ScriptedTransport::new();
    transport.fail_connects(6).fail_next_scan();
    let harness = Harness::quiet(transport);

    wait(15.0).await;

    let calls = harness.transport.calls();
    let scan_at = calls
        .iter()
        .find(|(_, call)| *call == Call::Scan)
        .map(|(at, _)| *at)
        .unwrap();
    let next_connect = calls
        .iter()
        .find(|(at, call)| *at > scan_at && matches!(call, Call::Connect(_)))
        .map(|(at, _)| *at)
        .unwrap();

    // The scan failed at once, so the whole gap is the rescan back-off.
    assert!(next_connect.duration_since(scan_at) >= RESCAN_DELAY);
    assert_eq!(harness.handle.status().device, Some(device()));
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_idle_without_target() {
    let harness = Harness::start(
        ScriptedTransport::new(),
        None,
        WeeklySchedule::default(),
        LedState::default(),
    );
    wait(10.0).await;
    assert!(harness.connects().is_empty());
    assert_eq!(harness.handle.status().state, ConnectionState::Disconnected);
    harness.stop().await;
}

// # User connect and disconnect

#[tokio::test(start_paused = true)]
async fn test_user_connect_reports_result() {
    let mut harness = Harness::start(
        ScriptedTransport::new(),
        None,
        WeeklySchedule::default(),
        LedState::off(kek()),
    );
    assert!(harness.handle.send(Inbox::Connect(device())));

    wait(2.0).await;

    let events = harness.drain_events();
    assert!(events.contains(&Event::ConnectResult { device: device() }));
    assert_eq!(
        states(&events),
        vec![ConnectionState::Connecting, ConnectionState::Connected]
    );
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_user_connect_failure_reported_once() {
    let transport = ScriptedTransport::new();
    transport.fail_connects(2);
    let mut harness = Harness::start(
        transport,
        None,
        WeeklySchedule::default(),
        LedState::off(kek()),
    );
    harness.handle.send(Inbox::Connect(device()));

    wait(5.0).await;

    let events = harness.drain_events();
    let errors = events
        .iter()
        .filter(|e| matches!(e, Event::ConnectError { .. }))
        .count();
    assert_eq!(errors, 1);
    assert!(!events.iter().any(|e| matches!(e, Event::ConnectResult { .. })));
    assert_eq!(harness.handle.status().state, ConnectionState::Connected);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_user_disconnect_drops_target() {
    let mut harness = Harness::quiet(ScriptedTransport::new());
    wait(2.0).await;
    harness.drain_events();

    harness.handle.send(Inbox::Disconnect);
    wait(5.0).await;

    let events = harness.drain_events();
    assert!(events.contains(&Event::ConnectionStateChanged {
        state: ConnectionState::Disconnected,
        device: None,
    }));
    assert_eq!(harness.connects().len(), 1);
    assert!(harness.transport.linked_address().is_none());
    let status = harness.handle.status();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert!(status.device.is_none());
    harness.stop().await;
}

// # Keep-alive

#[tokio::test(start_paused = true)]
async fn test_idle_link_is_pinged() {
    let harness = Harness::quiet(ScriptedTransport::new());
    let start = Instant::now();

    wait(PING_INTERVAL.as_secs_f64() + 1.0).await;

    // First ping right after connecting, then more while idle.
    assert!(harness.pings_between(start, Instant::now()) >= 2);
    let late = Instant::now() - Duration::from_secs(6);
    assert!(harness.pings_between(late, Instant::now()) >= 1);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_no_ping_right_after_user_command() {
    let harness = Harness::start(
        ScriptedTransport::new(),
        Some(device()),
        always_blue(),
        LedState::on(kek()),
    );
    wait(7.25).await;

    let command_at = Instant::now();
    harness.handle.send(Inbox::CommandApplied {
        led: LedState::on(kek()),
        at: command_at,
    });

    wait(4.5).await;
    assert_eq!(harness.pings_between(command_at, Instant::now()), 0);

    wait(1.5).await;
    assert!(harness.pings_between(command_at, Instant::now()) >= 1);
    harness.stop().await;
}

// # Schedule corrections

#[tokio::test(start_paused = true)]
async fn test_initial_belief_switches_led_off_when_no_rule_is_active() {
    let harness = Harness::start(
        ScriptedTransport::new(),
        Some(device()),
        WeeklySchedule::default(),
        LedState::default(),
    );
    wait(12.0).await;

    let writes = harness.transport.writes();
    let offs = writes.iter().filter(|w| *w == POWER_OFF_COMMAND).count();
    assert_eq!(offs, 1);
    assert_eq!(writes[0], POWER_OFF_COMMAND);
    assert!(!harness.handle.status().led.is_on);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_active_rule_written_once() {
    let harness = Harness::start(
        ScriptedTransport::new(),
        Some(device()),
        always_blue(),
        LedState::off(kek()),
    );
    wait(30.0).await;

    let writes = harness.transport.writes();
    assert_eq!(writes.iter().filter(|w| *w == kek()).count(), 1);
    assert_eq!(harness.handle.status().led, LedState::on(kek()));
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_replaced_schedule_is_applied() {
    let harness = Harness::quiet(ScriptedTransport::new());
    wait(2.0).await;
    assert!(!harness.transport.writes().contains(&kek().to_string()));

    harness.handle.send(Inbox::ReplaceSchedule(always_blue()));
    wait(2.0).await;
    assert!(harness.transport.writes().contains(&kek().to_string()));
    harness.stop().await;
}

// # Degradation

#[tokio::test(start_paused = true)]
async fn test_write_failure_degrades_and_reconnects() {
    let mut harness = Harness::quiet(ScriptedTransport::new());
    wait(1.0).await;
    harness.drain_events();

    harness.transport.fail_next_write();
    wait(8.0).await;

    let events = harness.drain_events();
    assert_eq!(
        states(&events),
        vec![
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
        ]
    );
    assert!(
        harness
            .transport
            .calls()
            .iter()
            .any(|(_, call)| *call == Call::Disconnect)
    );
    assert_eq!(harness.connects().len(), 2);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_dropped_link_is_noticed() {
    let harness = Harness::quiet(ScriptedTransport::new());
    wait(1.0).await;

    harness.transport.drop_link();
    wait(2.0).await;

    assert_eq!(harness.connects().len(), 2);
    assert_eq!(harness.handle.status().state, ConnectionState::Connected);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_link_lost_message_degrades() {
    let mut harness = Harness::quiet(ScriptedTransport::new());
    wait(1.0).await;
    harness.drain_events();

    harness.handle.send(Inbox::LinkLost);
    wait(1.0).await;

    let events = harness.drain_events();
    assert_eq!(states(&events).first(), Some(&ConnectionState::Disconnected));
    harness.stop().await;
}

// # Shutdown

#[tokio::test(start_paused = true)]
async fn test_stop_disconnects_and_exits() {
    let harness = Harness::quiet(ScriptedTransport::new());
    wait(3.0).await;
    let status = harness.handle.watch_status();

    let transport = harness.stop().await;

    let (_, last) = transport.calls().last().cloned().unwrap();
    assert_eq!(last, Call::Disconnect);
    assert!(transport.linked_address().is_none());
    assert_eq!(status.borrow().state, ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_rescan() {
    let transport = ScriptedTransport::new();
    transport.fail_connects(3);
    let harness = Harness::quiet(transport);

    // Inside the rescan window.
    wait(5.0).await;
    let stopped_at = Instant::now();
    let transport = harness.stop().await;

    assert!(Instant::now().duration_since(stopped_at) < LOOP_SLEEP);
    assert_eq!(transport.calls().iter().filter(|(_, c)| *c == Call::Scan).count(), 1);
}
