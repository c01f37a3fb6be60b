use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use chrono::DateTime;

use log::{debug, info};

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, ErrorKind, Result};
use crate::item::{Item, Topics};
use crate::platform::{DisconnectReason, Inbound, Link, Transport};

/// Topic addressing commands to every item of the node.
pub const LOCAL_BROADCAST_TOPIC: &str = ":LOCAL_BROADCAST:";
/// Topic addressing commands to every item of every node.
pub const GLOBAL_BROADCAST_TOPIC: &str = ":GLOBAL_BROADCAST:";

// Sub-topics of the host topic.
const CONFIG_SUBTOPIC: &str = "config";
const STATE_SUBTOPIC: &str = "state";
const LOG_SUBTOPIC: &str = "log";

// Timestamp layout of log lines and configuration times.
const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Well-known topics of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTopics {
    root: String,
    hostname: String,
}

impl HostTopics {
    /// Creates the [`HostTopics`] of `hostname` below `root`.
    #[must_use]
    pub fn new(root: &str, hostname: &str) -> Self {
        Self {
            root: root.trim_end_matches('/').to_string(),
            hostname: hostname.to_string(),
        }
    }

    /// Returns the host name.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub(crate) fn set_hostname(&mut self, hostname: &str) {
        self.hostname = hostname.to_string();
    }

    /// Returns `<root>/<hostname>`.
    #[must_use]
    pub fn host(&self) -> String {
        format!("{}/{}", self.root, self.hostname)
    }

    /// Returns the base of every configuration topic of the node, which is
    /// also the configuration topic of the hub.
    #[must_use]
    pub fn config(&self) -> String {
        format!("{}/{CONFIG_SUBTOPIC}", self.host())
    }

    /// Returns the configuration topic of the item `id`.
    #[must_use]
    pub fn item_config(&self, id: &str) -> String {
        format!("{}/{id}", self.config())
    }

    /// Returns the telemetry topic.
    #[must_use]
    pub fn state(&self) -> String {
        format!("{}/{STATE_SUBTOPIC}", self.host())
    }

    /// Returns the log topic.
    #[must_use]
    pub fn log(&self) -> String {
        format!("{}/{LOG_SUBTOPIC}", self.host())
    }
}

/// Message and connection counters of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Plain text messages received.
    pub received_text: u32,
    /// Structured messages received.
    pub received_json: u32,
    /// Messages published.
    pub published: u32,
    /// Link re-establishment attempts.
    pub link_reconnects: u32,
    /// Session re-establishment attempts.
    pub session_reconnects: u32,
    /// Why the last session ended.
    pub last_disconnect: DisconnectReason,
}

/// Wall-clock time derived from the last synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WallClock {
    synced: Option<(i64, u32)>,
    boot: Option<i64>,
}

impl WallClock {
    /// Records a synchronization: `epoch` seconds at `now` milliseconds.
    pub fn sync(&mut self, epoch: i64, now: u32) {
        self.synced = Some((epoch, now));
        if self.boot.is_none() {
            self.boot = Some(epoch - i64::from(now / 1000));
        }
    }

    /// Checks whether the clock was synchronized at least once.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        self.synced.is_some()
    }

    /// Returns the epoch seconds at `now`.
    #[must_use]
    pub fn epoch(&self, now: u32) -> Option<i64> {
        self.synced
            .map(|(epoch, at)| epoch + i64::from(now.wrapping_sub(at) / 1000))
    }

    /// Returns the epoch seconds at boot.
    #[must_use]
    pub const fn boot_epoch(&self) -> Option<i64> {
        self.boot
    }

    /// Formats the time at `now`, falling back to the uptime when the
    /// clock was never synchronized.
    #[must_use]
    pub fn timestamp(&self, now: u32) -> String {
        match self.epoch(now) {
            Some(epoch) => format_epoch(epoch),
            None => format!("boot+{now}ms"),
        }
    }
}

/// Formats epoch seconds as `MM/DD/YYYY hh:mm:ss`.
#[must_use]
pub fn format_epoch(epoch: i64) -> String {
    DateTime::from_timestamp(epoch, 0)
        .map(|time| time.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

/// Hub state reachable from items.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) topics: HostTopics,
    pub(crate) subscribed: Topics,
    pub(crate) session_up: bool,
    pub(crate) counters: Counters,
    pub(crate) clock: WallClock,
    pub(crate) outbox: Vec<Inbound>,
    pub(crate) report: bool,
    pub(crate) publish_log: bool,
}

impl Shared {
    pub(crate) fn new(topics: HostTopics, publish_log: bool) -> Self {
        Self {
            topics,
            subscribed: Topics::new(),
            session_up: false,
            counters: Counters::default(),
            clock: WallClock::default(),
            outbox: Vec::new(),
            report: false,
            publish_log,
        }
    }
}

/// Items other than the one currently driven by the hub.
#[derive(Clone, Copy)]
pub(crate) struct Peers<'a> {
    before: &'a [Box<dyn Item>],
    after: &'a [Box<dyn Item>],
    hub: Option<&'a Topics>,
}

impl<'a> Peers<'a> {
    pub(crate) const fn new(
        before: &'a [Box<dyn Item>],
        after: &'a [Box<dyn Item>],
        hub: Option<&'a Topics>,
    ) -> Self {
        Self { before, after, hub }
    }

    // Linear scan: a topic is referenced while any other item lists it.
    fn reference(&self, topic: &str) -> bool {
        self.hub.is_some_and(|topics| topics.contains(topic))
            || self
                .before
                .iter()
                .chain(self.after)
                .any(|item| item.core().topics().contains(topic))
    }
}

/// The hub services an item may use while it is driven.
///
/// A [`Bus`] borrows the hub for the duration of a single item callback:
/// items never hold on to the hub, and the global subscription set can
/// only change through these methods.
pub struct Bus<'a> {
    shared: &'a mut Shared,
    transport: &'a mut dyn Transport,
    link: &'a mut dyn Link,
    peers: Peers<'a>,
    now: u32,
}

impl<'a> Bus<'a> {
    pub(crate) fn new(
        shared: &'a mut Shared,
        transport: &'a mut dyn Transport,
        link: &'a mut dyn Link,
        peers: Peers<'a>,
        now: u32,
    ) -> Self {
        Self {
            shared,
            transport,
            link,
            peers,
            now,
        }
    }

    /// Returns the monotonic time of the current scheduler pass.
    #[must_use]
    pub const fn now(&self) -> u32 {
        self.now
    }

    /// Returns the current wall-clock time, once synchronized.
    #[must_use]
    pub fn epoch(&self) -> Option<i64> {
        self.shared.clock.epoch(self.now)
    }

    /// Returns a human-readable timestamp of the current time.
    #[must_use]
    pub fn timestamp(&self) -> String {
        self.shared.clock.timestamp(self.now)
    }

    /// Returns the node host name.
    #[must_use]
    pub fn hostname(&self) -> &str {
        self.shared.topics.hostname()
    }

    /// Returns the well-known topics of the node.
    #[must_use]
    pub fn host_topics(&self) -> &HostTopics {
        &self.shared.topics
    }

    /// Returns the configuration topic of the item `id`.
    #[must_use]
    pub fn item_config_topic(&self, id: &str) -> String {
        self.shared.topics.item_config(id)
    }

    /// Checks whether the transport session is up.
    #[must_use]
    pub const fn is_session_up(&self) -> bool {
        self.shared.session_up
    }

    /// Checks whether the hub currently holds a subscription to `topic`.
    #[must_use]
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.shared.subscribed.contains(topic)
    }

    /// Publishes a text payload.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::TransportUnavailable`] when the session is
    /// down. The message is dropped.
    pub fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        publish(self.shared, self.transport, topic, payload, retain)
    }

    /// Publishes a structured payload.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::TransportUnavailable`] when the session is
    /// down. The message is dropped.
    pub fn publish_json(&mut self, topic: &str, payload: &Value, retain: bool) -> Result<()> {
        self.publish(topic, &payload.to_string(), retain)
    }

    /// Subscribes `topic` unless the hub already holds a subscription.
    ///
    /// While the session is down nothing is sent: every listed topic is
    /// subscribed again when the session comes up.
    pub fn subscribe(&mut self, topic: &str) -> bool {
        subscribe(self.shared, self.transport, topic)
    }

    /// Unsubscribes `topic` unless another item still lists it.
    ///
    /// `force` drops the subscription regardless.
    pub fn unsubscribe(&mut self, topic: &str, force: bool) {
        if !force && self.peers.reference(topic) {
            debug!("Keeping subscription to `{topic}`: still in use");
            return;
        }
        unsubscribe(self.shared, self.transport, topic);
    }

    /// Queues a command for every item of the node.
    ///
    /// The message is delivered on the local broadcast topic, optionally
    /// suffixed with a tag or id, after the current scheduler pass.
    pub fn local_broadcast(&mut self, payload: &str, suffix: Option<&str>) {
        let topic = match suffix {
            Some(suffix) => format!("{LOCAL_BROADCAST_TOPIC}/{suffix}"),
            None => LOCAL_BROADCAST_TOPIC.to_string(),
        };
        self.shared.outbox.push(Inbound::new(topic, payload.as_bytes()));
    }

    /// Asks the hub to publish its telemetry at the end of the pass.
    pub fn request_report(&mut self) {
        self.shared.report = true;
    }

    /// Logs a message, mirroring it to the log topic when enabled.
    pub fn log(&mut self, message: &str) {
        info!("{message}");
        if self.shared.publish_log && self.shared.session_up {
            let line = format!("[{}] {message}", self.timestamp());
            let topic = self.shared.topics.log();
            let _ = publish(self.shared, self.transport, &topic, &line, false);
        }
    }

    /// Lets the network stack run its own work.
    pub fn yield_now(&mut self) {
        self.link.yield_now();
    }
}

pub(crate) fn publish(
    shared: &mut Shared,
    transport: &mut dyn Transport,
    topic: &str,
    payload: &str,
    retain: bool,
) -> Result<()> {
    if !shared.session_up {
        debug!("Session unavailable, dropping message for `{topic}`");
        return Err(Error::new(
            ErrorKind::TransportUnavailable,
            format!("message for `{topic}` dropped"),
        ));
    }
    if transport.publish(topic, payload.as_bytes(), retain) {
        shared.counters.published = shared.counters.published.wrapping_add(1);
    }
    Ok(())
}

pub(crate) fn subscribe(shared: &mut Shared, transport: &mut dyn Transport, topic: &str) -> bool {
    if !shared.session_up || shared.subscribed.contains(topic) {
        return false;
    }
    if transport.subscribe(topic) {
        debug!("Subscribed to `{topic}`");
        shared.subscribed.insert(topic)
    } else {
        false
    }
}

pub(crate) fn unsubscribe(shared: &mut Shared, transport: &mut dyn Transport, topic: &str) {
    if shared.subscribed.remove(topic) && shared.session_up {
        transport.unsubscribe(topic);
        debug!("Unsubscribed from `{topic}`");
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use crate::testing::TestBench;

    use super::{HostTopics, WallClock, format_epoch};

    #[test]
    fn host_topics() {
        let topics = HostTopics::new("qn/nodes/", "kitchen");
        assert_eq!(topics.host(), "qn/nodes/kitchen");
        assert_eq!(topics.config(), "qn/nodes/kitchen/config");
        assert_eq!(topics.item_config("PIR"), "qn/nodes/kitchen/config/PIR");
        assert_eq!(topics.state(), "qn/nodes/kitchen/state");
        assert_eq!(topics.log(), "qn/nodes/kitchen/log");
    }

    #[test]
    fn wall_clock() {
        let mut clock = WallClock::default();
        assert_eq!(clock.timestamp(1_500), "boot+1500ms");

        // 2024-03-05 06:07:08 UTC.
        clock.sync(1_709_618_828, 10_000);
        assert_eq!(clock.boot_epoch(), Some(1_709_618_818));
        assert_eq!(clock.timestamp(12_000), "03/05/2024 06:07:10");
        assert_eq!(format_epoch(0), "01/01/1970 00:00:00");
    }

    #[test]
    fn local_broadcast_is_queued() {
        let mut bench = TestBench::online();
        bench.with_bus(|bus| {
            bus.local_broadcast(r#"{"relay":"on"}"#, Some("RELAY"));
            bus.local_broadcast("report", None);
        });

        let outbox = bench.take_outbox();
        let topics: Vec<&str> = outbox.iter().map(|inbound| inbound.topic.as_str()).collect();
        assert_eq!(topics, [":LOCAL_BROADCAST:/RELAY", ":LOCAL_BROADCAST:"]);
        assert_eq!(outbox[1].payload, b"report");
        assert!(bench.take_outbox().is_empty());
        assert!(bench.world().payloads(":LOCAL_BROADCAST:").is_empty());
    }
}
