//! The user command queue.
//!
//! User requests (scan, connect, color and power commands, disconnect) are
//! queued to one worker task and run strictly in submission order. The worker
//! shares the link lock with the supervisor, so a user write never overlaps a
//! supervisor write. Outcomes are reported twice: as an [`Event`] for every
//! observer, and through the [`Ticket`] returned to the submitter.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::constants::{POWER_OFF_COMMAND, USER_SCAN_TIMEOUT};
use crate::schedule::palette;
use crate::supervisor::{Event, EventBus, Inbox, LedState, Status};
use crate::transport::{DeviceIdentity, SharedLink, Transport, TransportError};

/// A state-changing user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Show a palette color, by name.
    SetColor(String),
    /// Switch on in the last shown color.
    PowerOn,
    PowerOff,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    #[error("command worker is not running")]
    WorkerGone,

    #[error("{0}")]
    Rejected(String),
}

/// The pending outcome of a submitted job.
#[derive(Debug)]
pub struct Ticket<T> {
    receiver: oneshot::Receiver<Result<T, ControllerError>>,
}

impl<T> Ticket<T> {
    pub async fn wait(self) -> Result<T, ControllerError> {
        self.receiver.await.unwrap_or(Err(ControllerError::WorkerGone))
    }
}

type Reply<T> = oneshot::Sender<Result<T, ControllerError>>;

enum Job {
    Scan(Reply<Vec<DeviceIdentity>>),
    Connect(String, Reply<DeviceIdentity>),
    Command(UserCommand, Reply<()>),
    Disconnect(Reply<()>),
}

/// Cloneable submission side of the queue.
#[derive(Debug, Clone)]
pub struct Controller {
    jobs: mpsc::UnboundedSender<Job>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Job::Scan(_) => f.write_str("Scan"),
            Job::Connect(query, _) => write!(f, "Connect({query})"),
            Job::Command(command, _) => write!(f, "Command({command:?})"),
            Job::Disconnect(_) => f.write_str("Disconnect"),
        }
    }
}

impl Controller {
    /// Start the worker.
    pub fn spawn<T: Transport>(
        link: SharedLink<T>,
        supervisor: mpsc::UnboundedSender<Inbox>,
        status: watch::Receiver<Status>,
        events: EventBus,
        stop: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (jobs, queue) = mpsc::unbounded_channel();
        let worker = Worker {
            link,
            supervisor,
            status,
            events,
            stop,
            scan_timeout: USER_SCAN_TIMEOUT,
        };
        let task = tokio::spawn(worker.run(queue));
        (Self { jobs }, task)
    }

    /// Discover nearby named devices.
    pub fn scan(&self) -> Ticket<Vec<DeviceIdentity>> {
        self.submit(Job::Scan)
    }

    /// Resolve `query` (a device name or address) and hand it to the
    /// supervisor. The ticket resolves once the device is found; the link
    /// outcome follows as a connect event.
    pub fn connect(&self, query: impl Into<String>) -> Ticket<DeviceIdentity> {
        let query = query.into();
        self.submit(|reply| Job::Connect(query, reply))
    }

    pub fn command(&self, command: UserCommand) -> Ticket<()> {
        self.submit(|reply| Job::Command(command, reply))
    }

    pub fn disconnect(&self) -> Ticket<()> {
        self.submit(Job::Disconnect)
    }

    fn submit<T>(&self, job: impl FnOnce(Reply<T>) -> Job) -> Ticket<T> {
        let (reply, receiver) = oneshot::channel();
        // A closed queue drops the reply, which resolves the ticket as WorkerGone.
        let _ = self.jobs.send(job(reply));
        Ticket { receiver }
    }
}

struct Worker<T: Transport> {
    link: SharedLink<T>,
    supervisor: mpsc::UnboundedSender<Inbox>,
    status: watch::Receiver<Status>,
    events: EventBus,
    stop: CancellationToken,
    scan_timeout: Duration,
}

impl<T: Transport> Worker<T> {
    async fn run(self, mut queue: mpsc::UnboundedReceiver<Job>) {
        loop {
            let job = tokio::select! {
                _ = self.stop.cancelled() => break,
                job = queue.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            match job {
                Job::Scan(reply) => {
                    let _ = reply.send(self.scan().await);
                }
                Job::Connect(query, reply) => {
                    let _ = reply.send(self.connect(&query).await);
                }
                Job::Command(command, reply) => {
                    let _ = reply.send(self.command(command).await);
                }
                Job::Disconnect(reply) => {
                    let _ = reply.send(self.forward(Inbox::Disconnect));
                }
            }
        }
    }

    async fn scan(&self) -> Result<Vec<DeviceIdentity>, ControllerError> {
        log_block_start!("Scanning for {}s", self.scan_timeout.as_secs());
        match self.discover().await {
            Ok(devices) => {
                for device in &devices {
                    log_indented!("{device}");
                }
                self.events.emit(Event::ScanResults {
                    devices: devices.clone(),
                });
                Ok(devices)
            }
            Err(message) => {
                log_warning!("Scan failed: {message}");
                self.events.emit(Event::ScanError {
                    message: message.clone(),
                });
                Err(ControllerError::Rejected(message))
            }
        }
    }

    async fn connect(&self, query: &str) -> Result<DeviceIdentity, ControllerError> {
        log_block_start!("Looking for '{query}'");
        let found = match self.discover().await {
            Ok(devices) => devices.into_iter().find(|d| d.matches(query)),
            Err(message) => {
                let message = format!("Scan failed: {message}");
                self.events.emit(Event::ConnectError {
                    message: message.clone(),
                });
                return Err(ControllerError::Rejected(message));
            }
        };

        let Some(device) = found else {
            let message = format!("Device '{query}' not found");
            log_warning!("{message}");
            self.events.emit(Event::ConnectError {
                message: message.clone(),
            });
            return Err(ControllerError::Rejected(message));
        };

        self.forward(Inbox::Connect(device.clone()))?;
        Ok(device)
    }

    async fn command(&self, command: UserCommand) -> Result<(), ControllerError> {
        let (payload, led) = match &command {
            UserCommand::SetColor(name) => match palette::find_by_name_loose(name) {
                Some(entry) => (entry.command_hex.to_string(), LedState::on(entry.command_hex)),
                None => {
                    return Err(self.command_failed(format!("Unknown color '{name}'")));
                }
            },
            UserCommand::PowerOn => {
                let last = self.status.borrow().led.last_color_hex.clone();
                (last.clone(), LedState::on(&last))
            }
            UserCommand::PowerOff => {
                let last = self.status.borrow().led.last_color_hex.clone();
                (POWER_OFF_COMMAND.to_string(), LedState::off(&last))
            }
        };

        let written = tokio::select! {
            _ = self.stop.cancelled() => {
                return Err(ControllerError::Rejected("shutting down".to_string()));
            }
            result = async {
                let mut link = self.link.lock().await;
                link.write_command(&payload).await
            } => result,
        };

        match written {
            Ok(()) => {
                self.forward(Inbox::CommandApplied {
                    led,
                    at: Instant::now(),
                })?;
                Ok(())
            }
            Err(TransportError::NotConnected) => {
                let _ = self.supervisor.send(Inbox::LinkLost);
                Err(self.command_failed(TransportError::NotConnected.to_string()))
            }
            Err(e) => Err(self.command_failed(format!("Command failed: {e}"))),
        }
    }

    fn command_failed(&self, message: String) -> ControllerError {
        log_warning!("{message}");
        self.events.emit(Event::CommandError {
            message: message.clone(),
        });
        ControllerError::Rejected(message)
    }

    /// Scan under the link lock. Errors are flattened to their message.
    async fn discover(&self) -> Result<Vec<DeviceIdentity>, String> {
        tokio::select! {
            _ = self.stop.cancelled() => Err("shutting down".to_string()),
            result = async {
                let mut link = self.link.lock().await;
                link.scan(self.scan_timeout).await
            } => result.map_err(|e| e.to_string()),
        }
    }

    fn forward(&self, message: Inbox) -> Result<(), ControllerError> {
        self.supervisor
            .send(message)
            .map_err(|_| ControllerError::WorkerGone)
    }
}
