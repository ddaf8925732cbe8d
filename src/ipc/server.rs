//! Unix socket server for the control protocol.
//!
//! Each client gets its own task. Requests from one client are handled in
//! order; requests from different clients meet in the command queue, which
//! serializes them.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{Request, Response};
use crate::constants::CONNECT_REPORT_TIMEOUT;
use crate::controller::{Controller, UserCommand};
use crate::supervisor::{Event, EventBus, Status};

/// What a client task needs from the running daemon.
#[derive(Debug, Clone)]
pub struct ControlContext {
    pub controller: Controller,
    pub status: watch::Receiver<Status>,
    pub events: EventBus,
    pub debug_enabled: bool,
}

/// A bound control socket. Dropping it removes the socket file.
#[derive(Debug)]
pub struct ControlServer {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlServer {
    /// Bind the socket at `path`, replacing a leftover socket file.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(path: &Path) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove existing socket {}", path.display()))?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory {}", parent.display()))?;
        }

        let listener = UnixListener::bind(path)
            .with_context(|| format!("Failed to bind control socket {}", path.display()))?;

        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept clients until `stop` is cancelled.
    pub async fn serve(self, ctx: ControlContext, stop: CancellationToken) {
        if ctx.debug_enabled {
            log_debug!("Control socket listening on {}", self.path.display());
        }

        loop {
            let accepted = tokio::select! {
                _ = stop.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, _)) => {
                    let ctx = ctx.clone();
                    let stop = stop.clone();
                    tokio::spawn(async move {
                        let debug_enabled = ctx.debug_enabled;
                        if let Err(e) = serve_client(stream, ctx, stop).await
                            && debug_enabled
                        {
                            log_debug!("Control client dropped: {e}");
                        }
                    });
                }
                Err(e) => {
                    log_warning!("Failed to accept control client: {e}");
                }
            }
        }

        if ctx.debug_enabled {
            log_debug!("Control socket closed");
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

struct Session {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    ctx: ControlContext,
    stop: CancellationToken,
}

async fn serve_client(stream: UnixStream, ctx: ControlContext, stop: CancellationToken) -> Result<()> {
    let (reader, writer) = stream.into_split();
    let mut session = Session {
        lines: BufReader::new(reader).lines(),
        writer,
        ctx,
        stop,
    };

    loop {
        let line = tokio::select! {
            _ = session.stop.cancelled() => return Ok(()),
            line = session.lines.next_line() => line?,
        };
        let Some(line) = line else {
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Request>(&line) {
            Ok(Request::Watch) => return session.watch().await,
            Ok(request) => session.handle(request).await?,
            Err(e) => {
                session
                    .send(&Response::failed(format!("Invalid request: {e}")))
                    .await?
            }
        }
    }
}

impl Session {
    async fn send(&mut self, response: &Response) -> Result<()> {
        let mut line = serde_json::to_string(response).context("Failed to encode response")?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn handle(&mut self, request: Request) -> Result<()> {
        if self.ctx.debug_enabled {
            log_debug!("Control request: {request:?}");
        }

        let controller = self.ctx.controller.clone();
        match request {
            Request::Status => {
                let status = self.ctx.status.borrow().clone();
                self.send(&Response::Status { status }).await?;
                self.send(&Response::ok()).await
            }
            Request::Scan => match controller.scan().wait().await {
                Ok(devices) => {
                    self.send(&Response::Event {
                        event: Event::ScanResults { devices },
                    })
                    .await?;
                    self.send(&Response::ok()).await
                }
                Err(e) => self.send(&Response::failed(e.to_string())).await,
            },
            Request::Connect { target } => self.connect(&controller, target).await,
            Request::Disconnect => self.finish(controller.disconnect().wait().await).await,
            Request::SetColor { color } => {
                let outcome = controller.command(UserCommand::SetColor(color)).wait().await;
                self.finish(outcome).await
            }
            Request::PowerOn => {
                self.finish(controller.command(UserCommand::PowerOn).wait().await)
                    .await
            }
            Request::PowerOff => {
                self.finish(controller.command(UserCommand::PowerOff).wait().await)
                    .await
            }
            Request::Watch => self.watch().await,
        }
    }

    async fn finish<T>(
        &mut self,
        outcome: Result<T, crate::controller::ControllerError>,
    ) -> Result<()> {
        match outcome {
            Ok(_) => self.send(&Response::ok()).await,
            Err(e) => self.send(&Response::failed(e.to_string())).await,
        }
    }

    /// Resolve the target, then relay link events until the supervisor
    /// reports the connect outcome.
    async fn connect(&mut self, controller: &Controller, target: String) -> Result<()> {
        // Subscribe first so the outcome cannot slip past.
        let mut events = self.ctx.events.subscribe();

        let device = match controller.connect(target).wait().await {
            Ok(device) => device,
            Err(e) => return self.send(&Response::failed(e.to_string())).await,
        };
        let state = self.ctx.status.borrow().state;
        self.send(&Response::Event {
            event: Event::ConnectionStateChanged {
                state,
                device: Some(device),
            },
        })
        .await?;

        let deadline = Instant::now() + CONNECT_REPORT_TIMEOUT;
        loop {
            let received = tokio::select! {
                _ = self.stop.cancelled() => {
                    return self.send(&Response::failed("Daemon is shutting down")).await;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return self
                        .send(&Response::failed("Timed out waiting for the connection"))
                        .await;
                }
                received = events.recv() => received,
            };

            match received {
                Ok(event @ Event::ConnectionStateChanged { .. }) => {
                    self.send(&Response::Event { event }).await?;
                }
                Ok(Event::ConnectResult { device }) => {
                    self.send(&Response::Event {
                        event: Event::ConnectResult { device },
                    })
                    .await?;
                    return self.send(&Response::ok()).await;
                }
                Ok(Event::ConnectError { message }) => {
                    return self.send(&Response::failed(message)).await;
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    return self.send(&Response::failed("Daemon is shutting down")).await;
                }
            }
        }
    }

    /// Stream the current status and then every event until the client
    /// hangs up.
    async fn watch(&mut self) -> Result<()> {
        let mut events = self.ctx.events.subscribe();
        let status = self.ctx.status.borrow().clone();
        self.send(&Response::Status { status }).await?;

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => return Ok(()),
                line = self.lines.next_line() => {
                    // Watching clients only ever hang up.
                    if !matches!(line, Ok(Some(_))) {
                        return Ok(());
                    }
                }
                received = events.recv() => match received {
                    Ok(event) => self.send(&Response::Event { event }).await?,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        if self.ctx.debug_enabled {
                            log_debug!("Watcher missed {missed} events");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
            }
        }
    }
}
