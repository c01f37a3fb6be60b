use alloc::string::String;
use alloc::vec::Vec;

use core::fmt;

use serde::{Serialize, Serializer};

use crate::error::Result;
use crate::timer::Clock;

/// The network link of a node.
pub trait Link {
    /// Starts joining the network with the given host name.
    ///
    /// The call must not block: the hub polls [`Link::is_up`] afterwards.
    fn begin(&mut self, hostname: &str);

    /// Checks whether the link is up.
    fn is_up(&self) -> bool;

    /// Drops the link.
    fn disconnect(&mut self);

    /// Returns the host name the node uses when nothing else is configured.
    fn default_hostname(&self) -> String;

    /// Returns the network address of the node.
    fn address(&self) -> String;

    /// Returns the hardware address of the node.
    fn mac(&self) -> String;

    /// Returns the link signal strength.
    fn signal(&self) -> i32 {
        0
    }

    /// Lets the network stack run its own work.
    fn yield_now(&mut self) {}
}

/// An inbound transport message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Topic the message was published on.
    pub topic: String,
    /// Raw payload.
    pub payload: Vec<u8>,
}

impl Inbound {
    /// Creates an [`Inbound`] message.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Session state codes reported by [`Transport::state`].
///
/// These follow the convention shared by most embedded publish/subscribe
/// clients.
pub mod state {
    /// The server did not answer in time.
    pub const CONNECTION_TIMEOUT: i32 = -4;
    /// The connection was lost.
    pub const CONNECTION_LOST: i32 = -3;
    /// The connection could not be established.
    pub const CONNECT_FAILED: i32 = -2;
    /// The client disconnected cleanly.
    pub const DISCONNECTED: i32 = -1;
    /// The session is up.
    pub const CONNECTED: i32 = 0;
}

/// A publish/subscribe transport client.
pub trait Transport {
    /// Starts a session identified by `client_id`.
    ///
    /// Returns `true` when the session is up once the call returns.
    /// Clients that connect in the background return `false` and report
    /// the session through [`Transport::is_connected`] later on.
    fn connect(&mut self, client_id: &str) -> bool;

    /// Checks whether the session is up.
    fn is_connected(&self) -> bool;

    /// Ends the session.
    fn disconnect(&mut self);

    /// Returns the last session state code, see [`state`].
    fn state(&self) -> i32;

    /// Publishes a payload.
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> bool;

    /// Subscribes a topic.
    fn subscribe(&mut self, topic: &str) -> bool;

    /// Unsubscribes a topic.
    fn unsubscribe(&mut self, topic: &str);

    /// Returns the next inbound message, if any.
    fn poll(&mut self) -> Option<Inbound>;
}

/// A wall-clock time source.
pub trait TimeSync {
    /// Starts synchronizing.
    fn begin(&mut self);

    /// Returns the current UTC time in seconds since the Unix epoch, once
    /// synchronized.
    fn now_epoch(&mut self) -> Option<i64>;

    /// Stops synchronizing.
    fn end(&mut self) {}
}

/// Keys of the values a node persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// The node host name.
    Hostname,
    /// The last applied provisioning document.
    Provisioning,
}

impl StorageKey {
    /// Returns the key name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hostname => "hostname",
            Self::Provisioning => "provisioning",
        }
    }
}

/// Non-volatile storage.
pub trait Storage {
    /// Loads a value. A missing value is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error when the storage cannot be read.
    fn load(&mut self, key: StorageKey) -> Result<Option<String>>;

    /// Stores a value.
    ///
    /// # Errors
    ///
    /// Returns an error when the storage cannot be written.
    fn store(&mut self, key: StorageKey, value: &str) -> Result<()>;
}

/// A storage that persists nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStorage;

impl Storage for NoStorage {
    fn load(&mut self, _key: StorageKey) -> Result<Option<String>> {
        Ok(None)
    }

    fn store(&mut self, _key: StorageKey, _value: &str) -> Result<()> {
        Ok(())
    }
}

/// The set of collaborators a hub runs on.
pub trait Platform {
    /// Monotonic clock.
    type Clock: Clock + 'static;
    /// Network link.
    type Link: Link + 'static;
    /// Transport client.
    type Transport: Transport + 'static;
    /// Wall-clock source.
    type TimeSync: TimeSync + 'static;
    /// Non-volatile storage.
    type Storage: Storage + 'static;
}

/// Collaborator instances for a [`Platform`].
pub struct Resources<P: Platform> {
    /// Monotonic clock.
    pub clock: P::Clock,
    /// Network link.
    pub link: P::Link,
    /// Transport client.
    pub transport: P::Transport,
    /// Wall-clock source.
    pub time_sync: P::TimeSync,
    /// Non-volatile storage.
    pub storage: P::Storage,
}

/// Why the last session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectReason {
    /// No session has ended yet.
    #[default]
    None,
    /// The server did not answer in time.
    Timeout,
    /// The connection was lost.
    Lost,
    /// The connection could not be established.
    Failed,
    /// The client disconnected cleanly.
    Disconnected,
    /// The server refused the session with the given code.
    Refused(i32),
    /// An unclassified state code.
    Unknown(i32),
}

impl DisconnectReason {
    /// Classifies a transport state code.
    #[must_use]
    pub const fn classify(code: i32) -> Self {
        match code {
            state::CONNECTION_TIMEOUT => Self::Timeout,
            state::CONNECTION_LOST => Self::Lost,
            state::CONNECT_FAILED => Self::Failed,
            state::DISCONNECTED => Self::Disconnected,
            state::CONNECTED => Self::None,
            1..=5 => Self::Refused(code),
            _ => Self::Unknown(code),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str(""),
            Self::Timeout => f.write_str("Connection Timeout"),
            Self::Lost => f.write_str("Connection Lost"),
            Self::Failed => f.write_str("Connection Failed"),
            Self::Disconnected => f.write_str("Disconnected"),
            Self::Refused(code) => write!(f, "Connection Refused ({code})"),
            Self::Unknown(code) => write!(f, "Unknown State ({code})"),
        }
    }
}

impl Serialize for DisconnectReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::{DisconnectReason, state};

    #[test]
    fn classify_state_codes() {
        assert_eq!(
            DisconnectReason::classify(state::CONNECTION_TIMEOUT),
            DisconnectReason::Timeout
        );
        assert_eq!(
            DisconnectReason::classify(state::CONNECTION_LOST).to_string(),
            "Connection Lost"
        );
        assert_eq!(DisconnectReason::classify(4), DisconnectReason::Refused(4));
        assert_eq!(
            DisconnectReason::classify(-9).to_string(),
            "Unknown State (-9)"
        );
    }
}
