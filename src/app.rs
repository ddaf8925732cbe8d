//! Daemon lifecycle: resource acquisition, wiring, and shutdown.
//!
//! [`Luxlink`] is the entry point for `luxlink run`. It takes the instance
//! lock, installs signal handling, resolves the location, and then starts the
//! long-lived tasks through [`start_services`]:
//!
//! - the connection supervisor, owning the device link
//! - the user command worker, sharing the link lock with the supervisor
//! - a persistence task that writes the connected device back to the
//!   settings file
//!
//! and finally the control socket. Reload signals re-read both files and hand
//! the result to the supervisor; a stop signal cancels every task.
//!
//! The builder mirrors the different ways the daemon is started:
//! - Normal startup: `Luxlink::new(paths, debug_enabled).run().await`
//! - Tests and nested runs: `Luxlink::new(paths, true).without_lock().with_socket(path)`

use anyhow::{Context, Result};
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigPaths, Settings};
use crate::constants::LOCK_FILE_NAME;
use crate::controller::Controller;
use crate::geo::{Location, SunTracker, resolve_coordinates};
use crate::io::lock::{self, Acquired};
use crate::io::{runtime_file, signals};
use crate::ipc::{self, ControlContext, ControlServer};
use crate::logger::Log;
use crate::schedule::load_schedule;
use crate::supervisor::{ConnectionState, Event, EventBus, Inbox, Supervisor, SupervisorHandle};
use crate::time_source::{Clock, SystemClock};
use crate::transport::{BtleTransport, DeviceIdentity, Transport, share};

/// Builder for running the daemon.
pub struct Luxlink {
    paths: ConfigPaths,
    debug_enabled: bool,
    create_lock: bool,
    lock_path: PathBuf,
    socket_path: PathBuf,
}

impl Luxlink {
    pub fn new(paths: ConfigPaths, debug_enabled: bool) -> Self {
        Self {
            paths,
            debug_enabled,
            create_lock: true,
            lock_path: runtime_file(LOCK_FILE_NAME),
            socket_path: ipc::socket_path(),
        }
    }

    /// Skip the single-instance lock.
    pub fn without_lock(mut self) -> Self {
        self.create_lock = false;
        self
    }

    /// Serve the control socket at `path` instead of the runtime directory.
    pub fn with_socket(mut self, path: PathBuf) -> Self {
        self.socket_path = path;
        self
    }

    /// Run until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<()> {
        log_version!();

        let _lock = if self.create_lock {
            match lock::acquire(&self.lock_path)? {
                Acquired::Locked(lock) => Some(lock),
                Acquired::HeldBy(pid) => {
                    anyhow::bail!("luxlink is already running (PID {pid})");
                }
            }
        } else {
            None
        };

        Log::set_timestamps(true);

        let stop = CancellationToken::new();
        let (reload_tx, mut reload_rx) = mpsc::unbounded_channel();
        let _signals = signals::listen(stop.clone(), reload_tx, self.debug_enabled)?;

        log_block_start!("Resolving location");
        let location = tokio::select! {
            _ = stop.cancelled() => return Ok(()),
            location = resolve_coordinates() => location,
        };
        if location.located {
            log_indented!("{location}");
        } else {
            log_indented!("{location} (fallback)");
        }

        let transport = BtleTransport::new()
            .await
            .context("Bluetooth is not available")?;

        let services = start_services(
            transport,
            Arc::new(SystemClock),
            location,
            self.paths.clone(),
            stop.clone(),
            self.debug_enabled,
        );

        let server = ControlServer::bind(&self.socket_path)?;
        if self.debug_enabled {
            log_debug!("Control socket: {}", server.path().display());
        }
        let server_task = tokio::spawn(server.serve(services.control_context(), stop.clone()));

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                request = reload_rx.recv() => match request {
                    Some(()) => services.reload(),
                    None => break,
                },
            }
        }

        stop.cancel();
        services.join().await;
        let _ = server_task.await;

        Log::set_timestamps(false);
        log_end!();
        Ok(())
    }
}

/// Handles to the long-lived daemon tasks.
pub struct Services {
    pub controller: Controller,
    pub supervisor: SupervisorHandle,
    pub events: EventBus,
    paths: ConfigPaths,
    debug_enabled: bool,
    tasks: Vec<JoinHandle<()>>,
}

/// Load the configuration and start the supervisor, the command worker, and
/// device persistence on `transport`.
///
/// Must be called from within a tokio runtime.
pub fn start_services<T: Transport>(
    transport: T,
    clock: Arc<dyn Clock>,
    location: Location,
    paths: ConfigPaths,
    stop: CancellationToken,
    debug_enabled: bool,
) -> Services {
    let settings = Settings::load(&paths.settings_path());
    let schedule = load_schedule(&paths.schedule_path());
    let target = settings.startup_target();

    match &target {
        Some(device) => log_block_start!("Auto-connecting to {device}"),
        None => log_block_start!("No device to connect to, waiting for a connect request"),
    }

    let events = EventBus::new();
    // Subscribed before the supervisor starts so no transition is missed.
    let persistence_events = events.subscribe();

    let link = share(transport);
    let (supervisor, handle) = Supervisor::new(
        link.clone(),
        clock,
        SunTracker::new(location, Local),
        schedule,
        events.clone(),
        stop.clone(),
    );
    let supervisor = supervisor.with_target(target).with_debug(debug_enabled);

    let mut tasks = vec![tokio::spawn(supervisor.run())];

    let (controller, worker) = Controller::spawn(
        link,
        handle.inbox(),
        handle.watch_status(),
        events.clone(),
        stop.clone(),
    );
    tasks.push(worker);

    tasks.push(tokio::spawn(persist_device(
        paths.clone(),
        persistence_events,
        stop,
    )));

    Services {
        controller,
        supervisor: handle,
        events,
        paths,
        debug_enabled,
        tasks,
    }
}

impl Services {
    pub fn control_context(&self) -> ControlContext {
        ControlContext {
            controller: self.controller.clone(),
            status: self.supervisor.watch_status(),
            events: self.events.clone(),
            debug_enabled: self.debug_enabled,
        }
    }

    /// Re-read settings and the schedule and hand them to the supervisor.
    pub fn reload(&self) {
        log_block_start!("Reloading settings and schedule");
        let settings = Settings::load(&self.paths.settings_path());
        let schedule = load_schedule(&self.paths.schedule_path());

        self.supervisor.send(Inbox::ReplaceSchedule(schedule));
        if let Some(device) = settings.startup_target() {
            self.supervisor.send(Inbox::Retarget(device));
        }
    }

    /// Wait for every task to finish. The stop token must be cancelled.
    pub async fn join(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Write the connected device to the settings file, and forget it when the
/// user disconnects.
async fn persist_device(
    paths: ConfigPaths,
    mut events: broadcast::Receiver<Event>,
    stop: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = stop.cancelled() => return,
            event = events.recv() => event,
        };

        match event {
            Ok(Event::ConnectionStateChanged {
                state: ConnectionState::Connected,
                device: Some(device),
            }) => remember(&paths, &device),
            Ok(Event::ConnectionStateChanged {
                state: ConnectionState::Disconnected,
                device: None,
            }) => forget(&paths),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                log_warning!("Device persistence missed {missed} events");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn remember(paths: &ConfigPaths, device: &DeviceIdentity) {
    let path = paths.settings_path();
    let mut settings = Settings::load(&path);
    let unchanged = settings
        .last_device()
        .is_some_and(|last| last == *device && last.name == device.name);
    if unchanged {
        return;
    }

    settings.remember_device(device);
    match settings.save(&path) {
        Ok(()) => log_indented!("Remembered {device}"),
        Err(e) => log_warning!("Failed to remember device: {e}"),
    }
}

fn forget(paths: &ConfigPaths) {
    let path = paths.settings_path();
    let mut settings = Settings::load(&path);
    if settings.last_device_address.is_none() {
        return;
    }

    settings.forget_device();
    if let Err(e) = settings.save(&path) {
        log_warning!("Failed to forget device: {e}");
    }
}
