//! The `qnode-os` library crate runs a [`qnode`] hub on a machine with an
//! operating system.
//!
//! It provides the host implementations of the collaborators a hub needs:
//!
//! - A monotonic millisecond clock
//! - A network link backed by the host network stack
//! - An `MQTT` transport client
//! - A wall-clock source
//! - A file-backed persistent storage
//!
//! It also loads the node configuration from a `TOML` file and drives the
//! hub scheduler on a `tokio` runtime until it is cancelled.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Monotonic clock.
pub mod clock;
/// Node configuration.
pub mod config;
/// Error management.
pub mod error;
/// Digital pins for hosts without general-purpose I/O.
pub mod gpio;
/// Host network link.
pub mod link;
/// `MQTT` transport.
pub mod mqtt;
/// Scheduler runner.
pub mod runner;
/// File-backed storage.
pub mod storage;
/// System wall-clock source.
pub mod time;

mod mac;

use qnode::platform::Platform;

/// The host [`Platform`].
#[derive(Debug)]
pub struct HostPlatform;

impl Platform for HostPlatform {
    type Clock = clock::StdClock;
    type Link = link::HostLink;
    type Transport = mqtt::MqttTransport;
    type TimeSync = time::SystemTimeSync;
    type Storage = storage::FileStorage;
}
