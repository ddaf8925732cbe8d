//! Client side of the control socket, used by the CLI commands.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

use super::{Request, Response};

pub struct ControlClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl ControlClient {
    /// Connect to the daemon at `path`.
    ///
    /// Returns `Ok(None)` when no daemon is listening there.
    pub async fn connect(path: &Path) -> Result<Option<Self>> {
        let stream = match UnixStream::connect(path).await {
            Ok(stream) => stream,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::ConnectionRefused) => {
                return Ok(None);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to connect to {}", path.display()));
            }
        };

        let (reader, writer) = stream.into_split();
        Ok(Some(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }))
    }

    pub async fn send(&mut self, request: &Request) -> Result<()> {
        let mut line = serde_json::to_string(request).context("Failed to encode request")?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .context("Failed to send request to the daemon")?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next response, or `None` once the daemon closed the connection.
    pub async fn next(&mut self) -> Result<Option<Response>> {
        let Some(line) = self
            .lines
            .next_line()
            .await
            .context("Failed to read from the daemon")?
        else {
            return Ok(None);
        };
        let response = serde_json::from_str(&line)
            .with_context(|| format!("Unexpected response from the daemon: {line}"))?;
        Ok(Some(response))
    }

    /// Send `request` and pass every response to `on_response` up to and
    /// including the final `done`. Returns the `done` outcome.
    pub async fn call(
        &mut self,
        request: &Request,
        mut on_response: impl FnMut(&Response),
    ) -> Result<(bool, Option<String>)> {
        self.send(request).await?;
        while let Some(response) = self.next().await? {
            on_response(&response);
            if let Response::Done { ok, message } = response {
                return Ok((ok, message));
            }
        }
        anyhow::bail!("The daemon closed the connection before answering")
    }
}
