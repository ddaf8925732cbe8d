//! The connection supervisor: the one task that owns the device link.
//!
//! The supervisor runs a small state machine over [`ConnectionState`]:
//!
//! ```text
//!            attempt < 3            connect ok
//! Disconnected ────────► Connecting ──────────► Connected
//!      ▲                     │                      │
//!      │   connect failed    │   write failed or    │
//!      └─────────────────────┘   link dropped       │
//!      └────────────────────────────────────────────┘
//! ```
//!
//! After [`MAX_CONNECT_ATTEMPTS`] failed attempts it rescans for the target by
//! name, since some devices rotate their address, then starts a new round of
//! attempts. While connected it evaluates the schedule every
//! [`SCHEDULE_CHECK_INTERVAL`](crate::constants::SCHEDULE_CHECK_INTERVAL) and writes a correction when the belief about
//! the LED differs from the verdict, and it keeps the link warm with pings.
//!
//! Everything else talks to the supervisor through its inbox and observes it
//! through [`Event`]s and the [`Status`] watch channel. Transport errors never
//! leave the loop: they degrade the state and the normal reconnect path takes
//! over. Only the stop token ends the loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedMutexGuard, mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::constants::{
    CONNECT_TIMEOUT, FAULT_BACKOFF, KEEP_ALIVE_COMMAND, LOOP_SLEEP, MAX_CONNECT_ATTEMPTS,
    POWER_OFF_COMMAND, RECONNECT_DELAY, RESCAN_DELAY, RESCAN_TIMEOUT,
};
use crate::geo::SunTracker;
use crate::schedule::{WeeklySchedule, active_color};
use crate::time_source::Clock;
use crate::transport::{DeviceIdentity, SharedLink, Transport, TransportError};

pub mod events;
pub mod state;

pub use events::{Event, EventBus};
pub use state::{ConnectionState, LedState, Status};

use state::{ping_due, rescan_due, schedule_check_due};

#[cfg(test)]
mod tests;

/// Upper bound for releasing the link after a stop.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Messages accepted by the supervisor.
#[derive(Debug, Clone)]
pub enum Inbox {
    /// Target `device` and report the outcome as a user connect.
    Connect(DeviceIdentity),
    /// Drop the link and the target.
    Disconnect,
    /// A user command was written; the belief is updated and pings back off.
    CommandApplied { led: LedState, at: Instant },
    /// A user command found the link gone.
    LinkLost,
    ReplaceSchedule(WeeklySchedule),
    /// Target `device` silently, as after a settings reload.
    Retarget(DeviceIdentity),
}

/// How long to wait before the next iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pace {
    Now,
    Tick,
    Idle,
    Retry,
    Rescan,
    Backoff,
    Stop,
}

impl Pace {
    fn delay(self) -> Option<Duration> {
        match self {
            Pace::Now => Some(Duration::ZERO),
            Pace::Tick | Pace::Idle => Some(LOOP_SLEEP),
            Pace::Retry => Some(RECONNECT_DELAY),
            Pace::Rescan => Some(RESCAN_DELAY),
            Pace::Backoff => Some(FAULT_BACKOFF),
            Pace::Stop => None,
        }
    }
}

/// Cloneable handle for talking to a running supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    inbox: mpsc::UnboundedSender<Inbox>,
    status: watch::Receiver<Status>,
}

impl SupervisorHandle {
    /// Deliver `message`. Returns false once the supervisor has exited.
    pub fn send(&self, message: Inbox) -> bool {
        self.inbox.send(message).is_ok()
    }

    pub fn inbox(&self) -> mpsc::UnboundedSender<Inbox> {
        self.inbox.clone()
    }

    pub fn status(&self) -> Status {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<Status> {
        self.status.clone()
    }
}

pub struct Supervisor<T: Transport> {
    link: SharedLink<T>,
    clock: Arc<dyn Clock>,
    sun: SunTracker<chrono::Local>,
    schedule: WeeklySchedule,
    inbox: mpsc::UnboundedReceiver<Inbox>,
    events: EventBus,
    status: watch::Sender<Status>,
    stop: CancellationToken,
    debug_enabled: bool,

    state: ConnectionState,
    target: Option<DeviceIdentity>,
    attempts: u32,
    led: LedState,
    report_connect: bool,
    last_ping: Option<Instant>,
    last_input: Option<Instant>,
    last_schedule_check: Option<Instant>,
}

impl<T: Transport> Supervisor<T> {
    pub fn new(
        link: SharedLink<T>,
        clock: Arc<dyn Clock>,
        sun: SunTracker<chrono::Local>,
        schedule: WeeklySchedule,
        events: EventBus,
        stop: CancellationToken,
    ) -> (Self, SupervisorHandle) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let led = LedState::default();
        let (status_tx, status_rx) = watch::channel(Status::new(None, led.clone()));

        let supervisor = Self {
            link,
            clock,
            sun,
            schedule,
            inbox: inbox_rx,
            events,
            status: status_tx,
            stop,
            debug_enabled: false,
            state: ConnectionState::Disconnected,
            target: None,
            attempts: 0,
            led,
            report_connect: false,
            last_ping: None,
            last_input: None,
            last_schedule_check: None,
        };
        let handle = SupervisorHandle {
            inbox: inbox_tx,
            status: status_rx,
        };
        (supervisor, handle)
    }

    /// Start out targeting `device` (auto-connect).
    pub fn with_target(mut self, device: Option<DeviceIdentity>) -> Self {
        self.target = device;
        self.publish();
        self
    }

    /// Override the initial belief about the LED.
    pub fn with_led(mut self, led: LedState) -> Self {
        self.led = led;
        self.publish();
        self
    }

    pub fn with_debug(mut self, debug_enabled: bool) -> Self {
        self.debug_enabled = debug_enabled;
        self
    }

    /// Run until the stop token fires, then release the link.
    pub async fn run(mut self) {
        if self.debug_enabled {
            log_debug!("Supervisor started");
        }

        while !self.stop.is_cancelled() {
            self.drain_inbox().await;
            if self.stop.is_cancelled() {
                break;
            }

            let pace = match self.step().await {
                Ok(pace) => pace,
                Err(e) => {
                    log_error!("Supervisor fault: {e:#}");
                    log_indented!("Retrying in {}s", FAULT_BACKOFF.as_secs());
                    self.degrade().await;
                    Pace::Backoff
                }
            };

            match pace.delay() {
                None => break,
                Some(delay) if delay.is_zero() => continue,
                Some(delay) => {
                    if !self.pause(delay).await {
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
    }

    // # Loop body

    async fn step(&mut self) -> anyhow::Result<Pace> {
        if self.state == ConnectionState::Connected {
            return Ok(self.tend_link().await);
        }

        let Some(mut target) = self.target.clone() else {
            return Ok(Pace::Idle);
        };

        if rescan_due(self.attempts) {
            self.attempts = 0;
            match self.rescan(&target).await {
                Some(found) => target = found,
                None if self.stop.is_cancelled() => return Ok(Pace::Stop),
                None => return Ok(Pace::Rescan),
            }
        }

        Ok(self.attempt_connect(target).await)
    }

    /// Look for the target by name. Returns the device with its current
    /// address, or `None` when it was not seen or the scan failed.
    async fn rescan(&mut self, target: &DeviceIdentity) -> Option<DeviceIdentity> {
        if target.name.is_empty() {
            log_warning!(
                "{} unreachable after {MAX_CONNECT_ATTEMPTS} attempts and has no name to rescan for",
                target.address
            );
            return None;
        }

        log_block_start!("Rescanning for {}", target.name);
        let mut link = self.lock_link().await?;
        let result = self.cancellable(link.scan(RESCAN_TIMEOUT)).await?;
        drop(link);

        let devices = match result {
            Ok(devices) => devices,
            Err(e) => {
                log_warning!("Rescan failed: {e}");
                log_indented!("Retrying in {}s", RESCAN_DELAY.as_secs());
                return None;
            }
        };
        let Some(found) = devices.into_iter().find(|d| d.name == target.name) else {
            log_indented!("Not found, retrying in {}s", RESCAN_DELAY.as_secs());
            return None;
        };

        if !found.address.eq_ignore_ascii_case(&target.address) {
            log_indented!("Address changed: {} -> {}", target.address, found.address);
        } else {
            log_indented!("Found at {}", found.address);
        }
        self.target = Some(found.clone());
        Some(found)
    }

    async fn attempt_connect(&mut self, target: DeviceIdentity) -> Pace {
        self.set_state(ConnectionState::Connecting);
        log_block_start!("Connecting to {target}");
        log_indented!("Attempt {} of {MAX_CONNECT_ATTEMPTS}", self.attempts + 1);

        let Some(mut link) = self.lock_link().await else {
            self.set_state(ConnectionState::Disconnected);
            return Pace::Stop;
        };
        let outcome = self
            .cancellable(link.connect(&target.address, CONNECT_TIMEOUT))
            .await;
        drop(link);

        match outcome {
            None => {
                self.set_state(ConnectionState::Disconnected);
                Pace::Stop
            }
            Some(Ok(())) => {
                self.attempts = 0;
                self.last_ping = None;
                self.last_schedule_check = None;
                self.set_state(ConnectionState::Connected);
                log_decorated!("Connected to {target}");
                if std::mem::take(&mut self.report_connect) {
                    self.events.emit(Event::ConnectResult { device: target });
                }
                Pace::Now
            }
            Some(Err(e)) => {
                self.attempts += 1;
                self.set_state(ConnectionState::Disconnected);
                log_warning!("Connect failed: {e}");
                if std::mem::take(&mut self.report_connect) {
                    self.events.emit(Event::ConnectError {
                        message: format!("Could not connect to {target}: {e}"),
                    });
                }
                Pace::Retry
            }
        }
    }

    /// One connected iteration: liveness, schedule, keep-alive.
    async fn tend_link(&mut self) -> Pace {
        let Some(link) = self.lock_link().await else {
            return Pace::Stop;
        };
        let Some(alive) = self.cancellable(link.is_connected()).await else {
            return Pace::Stop;
        };
        drop(link);

        if !alive {
            log_warning!("Link dropped");
            self.degrade().await;
            return Pace::Now;
        }

        let now = Instant::now();
        if schedule_check_due(self.last_schedule_check, now) {
            self.last_schedule_check = Some(now);
            match self.apply_schedule().await {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    log_warning!("Schedule command failed: {e}");
                    self.degrade().await;
                    return Pace::Now;
                }
                None => return Pace::Stop,
            }
        }

        if ping_due(self.last_ping, self.last_input, Instant::now()) {
            if self.debug_enabled {
                log_debug!("Keep-alive ping");
            }
            match self.write(KEEP_ALIVE_COMMAND).await {
                Some(Ok(())) => self.last_ping = Some(Instant::now()),
                Some(Err(e)) => {
                    log_warning!("Keep-alive failed: {e}");
                    self.degrade().await;
                    return Pace::Now;
                }
                None => return Pace::Stop,
            }
        }

        Pace::Tick
    }

    /// Write the schedule's verdict if the LED is believed to differ.
    async fn apply_schedule(&mut self) -> Option<Result<(), TransportError>> {
        let now = self.clock.now();
        let sun = self.sun.for_date(now.date_naive()).cloned();
        let verdict = active_color(
            &self.schedule,
            &now,
            sun.as_ref().map(|s| &s.sunrise),
            sun.as_ref().map(|s| &s.sunset),
        );

        if self.debug_enabled {
            log_debug!(
                "Schedule verdict at {}: {}",
                now.format("%a %H:%M"),
                verdict.unwrap_or("off")
            );
        }

        let (command, led) = match verdict {
            Some(hex) if !self.led.shows(hex) => (hex, LedState::on(hex)),
            None if self.led.is_on => (POWER_OFF_COMMAND, LedState::off(&self.led.last_color_hex)),
            _ => return Some(Ok(())),
        };

        let result = self.write(command).await?;
        if result.is_ok() {
            log_decorated!(
                "Schedule: {}",
                match led.color_name() {
                    Some(name) if led.is_on => format!("on ({name})"),
                    _ if led.is_on => "on".to_string(),
                    _ => "off".to_string(),
                }
            );
            self.led = led;
            self.last_input = Some(Instant::now());
            self.publish();
        }
        Some(result)
    }

    // # Inbox

    async fn drain_inbox(&mut self) {
        while let Ok(message) = self.inbox.try_recv() {
            self.handle(message).await;
        }
    }

    async fn handle(&mut self, message: Inbox) {
        match message {
            Inbox::Connect(device) => {
                log_block_start!("Connect requested: {device}");
                self.report_connect = true;
                self.switch_target(device).await;
            }
            Inbox::Retarget(device) => {
                if self.target.as_ref().is_some_and(|t| *t == device && t.name == device.name) {
                    return;
                }
                log_block_start!("Target changed to {device}");
                self.switch_target(device).await;
            }
            Inbox::Disconnect => {
                log_block_start!("Disconnect requested");
                self.target = None;
                self.report_connect = false;
                self.attempts = 0;
                self.release_link().await;
                self.state = ConnectionState::Disconnected;
                self.publish();
                self.events.emit(Event::ConnectionStateChanged {
                    state: ConnectionState::Disconnected,
                    device: None,
                });
            }
            Inbox::CommandApplied { led, at } => {
                self.led = led;
                self.last_input = Some(at);
                self.publish();
            }
            Inbox::LinkLost => {
                if self.state == ConnectionState::Connected {
                    log_warning!("Command found the link gone");
                    self.degrade().await;
                }
            }
            Inbox::ReplaceSchedule(schedule) => {
                self.schedule = schedule;
                self.last_schedule_check = None;
            }
        }
    }

    async fn switch_target(&mut self, device: DeviceIdentity) {
        let same = self.target.as_ref().is_some_and(|t| *t == device);
        self.target = Some(device.clone());
        self.attempts = 0;

        if self.state != ConnectionState::Connected {
            return;
        }
        if same {
            if std::mem::take(&mut self.report_connect) {
                self.events.emit(Event::ConnectResult { device });
            }
        } else {
            self.degrade().await;
        }
    }

    // # Helpers

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        self.state = state;
        self.publish();
        self.events.emit(Event::ConnectionStateChanged {
            state,
            device: self.target.clone(),
        });
    }

    fn publish(&self) {
        self.status.send_replace(Status {
            state: self.state,
            device: self.target.clone(),
            led: self.led.clone(),
        });
    }

    /// Drop to Disconnected and release the link.
    async fn degrade(&mut self) {
        self.set_state(ConnectionState::Disconnected);
        self.release_link().await;
    }

    async fn release_link(&self) {
        if let Some(mut link) = self.lock_link().await {
            if let Some(Err(e)) = self.cancellable(link.disconnect()).await {
                log_warning!("Disconnect failed: {e}");
            }
        }
    }

    async fn shutdown(&mut self) {
        // The stop token is already cancelled, so the lock is taken without it.
        let release = async {
            let mut link = self.link.clone().lock_owned().await;
            if link.is_connected().await {
                log_block_start!("Disconnecting");
            }
            link.disconnect().await
        };
        match tokio::time::timeout(SHUTDOWN_GRACE, release).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log_warning!("Disconnect on shutdown failed: {e}"),
            Err(_) => log_warning!("Disconnect on shutdown timed out"),
        }
        self.state = ConnectionState::Disconnected;
        self.publish();
        if self.debug_enabled {
            log_debug!("Supervisor stopped");
        }
    }

    async fn write(&self, payload: &str) -> Option<Result<(), TransportError>> {
        let mut link = self.lock_link().await?;
        self.cancellable(link.write_command(payload)).await
    }

    async fn lock_link(&self) -> Option<OwnedMutexGuard<T>> {
        tokio::select! {
            _ = self.stop.cancelled() => None,
            guard = self.link.clone().lock_owned() => Some(guard),
        }
    }

    async fn cancellable<F: std::future::Future>(&self, future: F) -> Option<F::Output> {
        tokio::select! {
            _ = self.stop.cancelled() => None,
            output = future => Some(output),
        }
    }

    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.stop.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
