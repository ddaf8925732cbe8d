//! # luxlink
//!
//! Keeps a Bluetooth LE color LED connected and switches it on a weekly,
//! optionally sun-relative schedule.
//!
//! This library exists so the daemon's internals can be tested, and to keep
//! CLI dispatch (main.rs) apart from application logic.
//!
//! ## Architecture
//!
//! - **Entry Point**: [`Luxlink`] acquires process resources and wires the
//!   long-lived tasks together
//! - **Link**: `transport` abstracts the radio, `supervisor` owns the link
//!   and its reconnect state machine, `controller` queues user commands
//! - **Schedule**: `schedule` holds the weekly rules, their evaluation,
//!   persistence, and validation; `geo` provides location and sun times
//! - **Configuration**: `config` for the settings file and directories
//! - **Surfaces**: `ipc` for the control socket, `commands` and `args` for
//!   the CLI
//! - **Infrastructure**: `io` for the instance lock and signals, `logger`,
//!   and `time_source`

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod commands;
pub mod config;
pub mod constants;
pub mod controller;
pub mod geo;
pub mod io;
pub mod ipc;
pub mod schedule;
pub mod supervisor;
pub mod time_source;
pub mod transport;

mod app;

pub use app::{Luxlink, Services, start_services};
