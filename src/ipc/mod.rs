//! Control socket for external callers.
//!
//! The daemon listens on a Unix socket and speaks newline-delimited JSON. A
//! client writes one [`Request`] per line and reads [`Response`] lines back.
//! Every request except `watch` ends with exactly one `done` response; `watch`
//! streams events until either side hangs up.
//!
//! ```text
//! → {"request":"set_color","color":"Kék"}
//! ← {"type":"done","ok":true,"message":null}
//! → {"request":"watch"}
//! ← {"type":"status","status":{...}}
//! ← {"type":"event","event":{"event_type":"connection_state_changed",...}}
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::SOCKET_FILE_NAME;
use crate::supervisor::{Event, Status};

pub mod client;
pub mod server;

pub use client::ControlClient;
pub use server::{ControlContext, ControlServer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum Request {
    Status,
    Scan,
    /// `target` is a device name or address.
    Connect { target: String },
    Disconnect,
    SetColor { color: String },
    PowerOn,
    PowerOff,
    Watch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Event { event: Event },
    Status { status: Status },
    Done { ok: bool, message: Option<String> },
}

impl Response {
    pub fn ok() -> Self {
        Response::Done {
            ok: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Response::Done {
            ok: false,
            message: Some(message.into()),
        }
    }
}

/// Location of the control socket.
pub fn socket_path() -> PathBuf {
    crate::io::runtime_file(SOCKET_FILE_NAME)
}
