use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::{debug, error, info, warn};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bus::{self, Bus, Counters, HostTopics, Peers, Shared, format_epoch};
use crate::error::{Error, ErrorKind, Result};
use crate::item::{Item, ItemCore, ItemProperties, Topics};
use crate::message::{Message, Object, parse_object, value_to_string};
use crate::platform::{
    DisconnectReason, Inbound, Link, Platform, Resources, Storage, StorageKey, TimeSync, Transport,
};
use crate::registry::TypeRegistry;
use crate::timer::{Clock, IntervalTimer};

/// Tag of the hub in telemetry.
pub const HUB_TAG: &str = "QNODE";

const HUB_NAME: &str = "QNode Hub";

// Provisioning document keys.
const HOSTNAME_KEY: &str = "hostname";
const DESCRIPTION_KEY: &str = "description";
const ITEMS_KEY: &str = "items";
const TAG_KEY: &str = "tag";
const ID_KEY: &str = "id";

// Inbound messages handled per scheduler pass.
const INBOUND_BATCH: usize = 16;

const DEFAULT_ROOT_TOPIC: &str = "qn/nodes";
const DEFAULT_HEARTBEAT_MS: u32 = 60_000;
const DEFAULT_TIME_REFRESH_MS: u32 = 1_800_000;
const DEFAULT_LINK_TIMEOUT_MS: u32 = 30_000;
const DEFAULT_SESSION_RETRY_MS: u32 = 5_000;
const DEFAULT_INIT_WINDOW_MS: u32 = 20_000;

/// Hub configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Topic below which every node topic lives.
    pub root_topic: String,
    /// Host name used when none was persisted.
    ///
    /// Defaults to the link default host name.
    pub hostname: Option<String>,
    /// Node description.
    pub description: String,
    /// Firmware identification reported in telemetry.
    pub firmware: String,
    /// Telemetry period, in milliseconds.
    pub heartbeat_ms: u32,
    /// Wall-clock refresh period, in milliseconds.
    pub time_refresh_ms: u32,
    /// How long to wait for the link to come up, in milliseconds.
    pub link_timeout_ms: u32,
    /// Delay between session attempts, in milliseconds.
    pub session_retry_ms: u32,
    /// How long after boot a persisted provisioning document waits for
    /// the network one, in milliseconds.
    pub init_window_ms: u32,
    /// Offset added to the synchronized UTC time, in seconds.
    pub utc_offset_secs: i64,
    /// Whether log lines are mirrored to the node log topic.
    pub publish_log: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            root_topic: DEFAULT_ROOT_TOPIC.into(),
            hostname: None,
            description: String::new(),
            firmware: String::new(),
            heartbeat_ms: DEFAULT_HEARTBEAT_MS,
            time_refresh_ms: DEFAULT_TIME_REFRESH_MS,
            link_timeout_ms: DEFAULT_LINK_TIMEOUT_MS,
            session_retry_ms: DEFAULT_SESSION_RETRY_MS,
            init_window_ms: DEFAULT_INIT_WINDOW_MS,
            utc_offset_secs: 0,
            publish_log: false,
        }
    }
}

impl HubConfig {
    /// Sets the root topic.
    #[must_use]
    pub fn root_topic(mut self, root_topic: &str) -> Self {
        self.root_topic = root_topic.into();
        self
    }

    /// Sets the default host name.
    #[must_use]
    pub fn hostname(mut self, hostname: &str) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Sets the node description.
    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the firmware identification.
    #[must_use]
    pub fn firmware(mut self, firmware: &str) -> Self {
        self.firmware = firmware.into();
        self
    }

    /// Mirrors log lines to the node log topic.
    #[must_use]
    pub const fn publish_log(mut self) -> Self {
        self.publish_log = true;
        self
    }
}

/// A telemetry snapshot of the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Telemetry {
    /// Host name.
    pub node_id: String,
    /// Node description.
    pub description: String,
    /// Firmware identification.
    pub firmware: String,
    /// Network address.
    pub address: String,
    /// Hardware address.
    pub mac: String,
    /// Link signal strength.
    pub link_signal: i32,
    /// Boot time, once the clock was synchronized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_time: Option<String>,
    /// Current time.
    pub time: String,
    /// Message and connection counters.
    #[serde(flatten)]
    pub counters: Counters,
    /// The hub and every attached item.
    pub items: Vec<ItemProperties>,
}

// Where a provisioning document comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Network,
    Persisted,
}

/// The central node controller.
///
/// A [`Hub`] owns the live item collection, the global subscription set
/// and the connectivity state machine. It is driven by calling
/// [`Hub::tick`] from the main loop of the node.
///
/// Items created by provisioning messages are staged and join the live
/// collection between scheduler passes, never while it is being iterated.
pub struct Hub<P: Platform> {
    config: HubConfig,
    registry: TypeRegistry,
    core: ItemCore,
    items: Vec<Box<dyn Item>>,
    pending: Vec<Box<dyn Item>>,
    shared: Shared,
    pending_hostname: Option<String>,
    persisted: Option<String>,
    provisioned: bool,
    last_config: Option<String>,
    heartbeat: IntervalTimer,
    time_refresh: IntervalTimer,
    session_retry: IntervalTimer,
    init_window: IntervalTimer,
    clock: P::Clock,
    link: P::Link,
    transport: P::Transport,
    time_sync: P::TimeSync,
    storage: P::Storage,
}

impl<P: Platform> Hub<P> {
    /// Creates a [`Hub`].
    ///
    /// A persisted host name takes precedence over the configured one,
    /// which in turn takes precedence over the link default.
    #[must_use]
    pub fn new(config: HubConfig, registry: TypeRegistry, resources: Resources<P>) -> Self {
        let Resources {
            clock,
            link,
            transport,
            time_sync,
            mut storage,
        } = resources;

        let hostname = load(&mut storage, StorageKey::Hostname)
            .or_else(|| config.hostname.clone())
            .unwrap_or_else(|| link.default_hostname());
        let persisted = load(&mut storage, StorageKey::Provisioning);
        info!("Starting node `{hostname}`");

        let now = clock.now_ms();
        let topics = HostTopics::new(&config.root_topic, &hostname);

        let mut core = ItemCore::new(HUB_TAG);
        core.set_id(&hostname);
        core.set_name(HUB_NAME);
        core.set_description(config.description.clone());
        core.actor_mut().set_unthrottled(true);
        core.list_topic(&topics.config());
        let _ = core.start(now);

        let mut heartbeat = IntervalTimer::new(config.heartbeat_ms);
        heartbeat.start(now);
        let mut init_window = IntervalTimer::new(config.init_window_ms);
        init_window.start(now);

        Self {
            shared: Shared::new(topics, config.publish_log),
            time_refresh: IntervalTimer::new(config.time_refresh_ms),
            session_retry: IntervalTimer::new(config.session_retry_ms),
            config,
            registry,
            core,
            items: Vec::new(),
            pending: Vec::new(),
            pending_hostname: None,
            persisted,
            provisioned: false,
            last_config: None,
            heartbeat,
            init_window,
            clock,
            link,
            transport,
            time_sync,
            storage,
        }
    }

    /// Returns the hub configuration.
    #[must_use]
    pub const fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Returns the item type registry.
    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    /// Returns the node host name.
    #[must_use]
    pub fn hostname(&self) -> &str {
        self.shared.topics.hostname()
    }

    /// Returns the well-known topics of the node.
    #[must_use]
    pub const fn host_topics(&self) -> &HostTopics {
        &self.shared.topics
    }

    /// Returns the state the hub keeps about itself as an item.
    #[must_use]
    pub const fn core(&self) -> &ItemCore {
        &self.core
    }

    /// Returns the attached items.
    #[must_use]
    pub fn items(&self) -> &[Box<dyn Item>] {
        &self.items
    }

    /// Returns the number of items waiting to be attached.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns the message and connection counters.
    #[must_use]
    pub const fn counters(&self) -> &Counters {
        &self.shared.counters
    }

    /// Returns the topics currently subscribed.
    #[must_use]
    pub const fn subscribed(&self) -> &Topics {
        &self.shared.subscribed
    }

    /// Checks whether the hub holds a subscription to `topic`.
    #[must_use]
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.shared.subscribed.contains(topic)
    }

    /// Checks whether the link is up.
    #[must_use]
    pub fn is_link_up(&self) -> bool {
        self.link.is_up()
    }

    /// Checks whether the transport session is up.
    #[must_use]
    pub const fn is_session_up(&self) -> bool {
        self.shared.session_up
    }

    /// Checks whether the wall clock was synchronized.
    #[must_use]
    pub const fn is_time_synced(&self) -> bool {
        self.shared.clock.is_synced()
    }

    /// Returns a human-readable timestamp of the current time.
    #[must_use]
    pub fn timestamp(&self) -> String {
        self.shared.clock.timestamp(self.clock.now_ms())
    }

    /// Attaches an item.
    ///
    /// The item configuration topic is added to its topic list and every
    /// listed topic is subscribed. Returns `false`, dropping the item, when
    /// its id is already in use, whatever the tag.
    pub fn attach(&mut self, mut item: Box<dyn Item>) -> bool {
        if self.id_in_use(item.core().id()) {
            warn!(
                "Item {} [{}] conflicts with an attached item",
                item.core().tag(),
                item.core().id()
            );
            return false;
        }
        info!("Attaching item {} [{}]", item.core().tag(), item.core().id());
        let now = self.clock.now_ms();
        let mut bus = Bus::new(
            &mut self.shared,
            &mut self.transport,
            &mut self.link,
            Peers::new(&self.items, &[], Some(self.core.topics())),
            now,
        );
        item.on_attach(&mut bus);
        self.items.push(item);
        true
    }

    /// Detaches the item `id`, returning it.
    ///
    /// Its topics are unsubscribed unless another item still lists them.
    pub fn detach(&mut self, id: &str) -> Option<Box<dyn Item>> {
        let index = self.items.iter().position(|item| item.core().id() == id)?;
        let mut item = self.items.remove(index);
        info!("Detaching item {} [{id}]", item.core().tag());
        let now = self.clock.now_ms();
        let mut bus = Bus::new(
            &mut self.shared,
            &mut self.transport,
            &mut self.link,
            Peers::new(&self.items, &[], Some(self.core.topics())),
            now,
        );
        item.on_detach(&mut bus);
        Some(item)
    }

    /// Runs `f` on the attached item `id` with a [`Bus`].
    ///
    /// Returns `None` when no such item is attached.
    pub fn with_item<R>(
        &mut self,
        id: &str,
        f: impl FnOnce(&mut dyn Item, &mut Bus<'_>) -> R,
    ) -> Option<R> {
        let index = self.items.iter().position(|item| item.core().id() == id)?;
        let now = self.clock.now_ms();
        self.drive(index, now, f)
    }

    /// Runs one scheduler pass.
    ///
    /// The pass keeps connectivity alive and handles inbound messages,
    /// runs the update of every attached item, delivers local broadcasts,
    /// and finally attaches staged items and applies a pending host name
    /// change.
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        if self.core.actor().is_due(now) {
            self.update_connectivity();
            self.core.actor_mut().advance(now);
        }
        self.link.yield_now();

        self.service_items();
        self.deliver_local_broadcasts();
        self.check_init_window();
        self.merge_pending();
        self.apply_hostname_change();

        if core::mem::take(&mut self.shared.report) {
            self.publish_state();
        }
    }

    /// Handles an inbound message.
    ///
    /// Messages below the node configuration topic go to the configuration
    /// hooks of the hub and of every item, all others to their command
    /// hooks.
    pub fn dispatch(&mut self, topic: &str, payload: &[u8]) {
        let message = Message::parse(payload);
        let counters = &mut self.shared.counters;
        if message.is_structured() {
            counters.received_json = counters.received_json.wrapping_add(1);
        } else {
            counters.received_text = counters.received_text.wrapping_add(1);
        }
        debug!("Message on `{topic}`");
        self.route(topic, &message);
    }

    fn route(&mut self, topic: &str, message: &Message) {
        let config_topic = self.shared.topics.config();
        let below_config = topic
            .strip_prefix(config_topic.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if below_config {
            if topic == config_topic {
                match message {
                    Message::Structured(config) => self.apply_config(config, Origin::Network),
                    Message::Text(_) => warn!("Ignoring text node configuration"),
                }
            }
            self.for_each_item(|item, bus| {
                if item.is_config_message(topic, bus) {
                    item.on_config(bus, topic, message);
                }
            });
        } else {
            self.for_each_item(|item, bus| {
                if item.is_command_message(topic) {
                    item.on_command(bus, topic, message);
                }
            });
        }
    }

    /// Applies a node provisioning document.
    ///
    /// The document may carry a `hostname`, a `description` and an
    /// `items` list of `{"tag": ..., "id": ...}` descriptors. Items are
    /// created through the registry, skipping descriptors that match an
    /// existing or staged item, and attached at the end of the current
    /// pass. The document is persisted.
    pub fn configure(&mut self, config: &Object) {
        self.apply_config(config, Origin::Network);
    }

    /// Publishes a payload.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::TransportUnavailable`] when the session is
    /// down.
    pub fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        bus::publish(&mut self.shared, &mut self.transport, topic, payload, retain)
    }

    /// Publishes the telemetry snapshot to the node state topic.
    pub fn publish_state(&mut self) {
        let payload = match serde_json::to_string(&self.telemetry()) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Cannot serialize telemetry: {e}");
                return;
            }
        };
        let topic = self.shared.topics.state();
        if let Err(e) = self.publish(&topic, &payload, true) {
            debug!("{e}");
        }
    }

    /// Returns a telemetry snapshot of the node.
    #[must_use]
    pub fn telemetry(&self) -> Telemetry {
        let now = self.clock.now_ms();
        let mut hub = ItemProperties::from_core(&self.core);
        hub.last_config.clone_from(&self.last_config);

        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.push(hub);
        items.extend(self.items.iter().map(|item| item.properties()));

        Telemetry {
            node_id: self.hostname().to_string(),
            description: self.core.description().to_string(),
            firmware: self.config.firmware.clone(),
            address: self.link.address(),
            mac: self.link.mac(),
            link_signal: self.link.signal(),
            boot_time: self.shared.clock.boot_epoch().map(format_epoch),
            time: self.shared.clock.timestamp(now),
            counters: self.shared.counters,
            items,
        }
    }

    fn update_connectivity(&mut self) {
        if !self.link.is_up() {
            if self.shared.session_up || self.transport.is_connected() {
                self.end_session();
            }
            self.time_sync.end();
            self.shared.counters.link_reconnects =
                self.shared.counters.link_reconnects.wrapping_add(1);
            if !self.establish_link() {
                return;
            }
        }

        if self.transport.is_connected() {
            if !self.shared.session_up {
                self.on_session_up();
            }
        } else {
            if self.shared.session_up {
                self.on_session_lost();
            }
            self.try_session();
        }

        if self.shared.session_up {
            self.drain_inbound();
            self.refresh_time();
            let now = self.clock.now_ms();
            if self.heartbeat.is_due(now) {
                self.heartbeat.step(now);
                self.publish_state();
            }
        }
    }

    // Bounded wait for the link. Items keep running meanwhile.
    fn establish_link(&mut self) -> bool {
        let hostname = self.hostname().to_string();
        info!("Bringing up the link as `{hostname}`");
        self.link.begin(&hostname);

        let mut timeout = IntervalTimer::new(self.config.link_timeout_ms);
        timeout.start(self.clock.now_ms());
        while !self.link.is_up() {
            if timeout.is_due(self.clock.now_ms()) {
                warn!(
                    "Link not up after {} ms, retrying on the next pass",
                    self.config.link_timeout_ms
                );
                return false;
            }
            self.service_items();
            self.link.yield_now();
        }

        info!("Link up, address {}", self.link.address());
        self.time_sync.begin();
        true
    }

    fn try_session(&mut self) {
        let now = self.clock.now_ms();
        if self.session_retry.is_started() && !self.session_retry.is_due(now) {
            return;
        }
        self.session_retry.start(now);
        self.shared.counters.session_reconnects =
            self.shared.counters.session_reconnects.wrapping_add(1);

        let client_id = self.hostname().to_string();
        if self.transport.connect(&client_id) {
            self.on_session_up();
        } else {
            debug!(
                "Session attempt failed: {}",
                DisconnectReason::classify(self.transport.state())
            );
        }
    }

    fn on_session_up(&mut self) {
        self.session_retry.stop();
        self.shared.session_up = true;
        self.shared.subscribed.clear();
        self.log("Session established");
        self.resubscribe_all();
        self.publish_state();
    }

    fn on_session_lost(&mut self) {
        let reason = DisconnectReason::classify(self.transport.state());
        warn!("Session lost: {reason}");
        self.shared.counters.last_disconnect = reason;
        self.shared.session_up = false;
        self.shared.subscribed.clear();
    }

    fn end_session(&mut self) {
        info!("Ending the session");
        self.transport.disconnect();
        self.shared.session_up = false;
        self.shared.subscribed.clear();
    }

    fn resubscribe_all(&mut self) {
        let Self {
            shared,
            transport,
            core,
            items,
            ..
        } = self;
        let topics = core
            .topics()
            .iter()
            .chain(items.iter().flat_map(|item| item.core().topics().iter()));
        for topic in topics {
            let _ = bus::subscribe(shared, transport, topic);
        }
    }

    fn drain_inbound(&mut self) {
        for _ in 0..INBOUND_BATCH {
            let Some(Inbound { topic, payload }) = self.transport.poll() else {
                break;
            };
            self.dispatch(&topic, &payload);
        }
    }

    fn refresh_time(&mut self) {
        let now = self.clock.now_ms();
        if self.shared.clock.is_synced() && !self.time_refresh.is_due(now) {
            return;
        }
        let Some(epoch) = self.time_sync.now_epoch() else {
            return;
        };
        let first = !self.shared.clock.is_synced();
        self.shared
            .clock
            .sync(epoch + self.config.utc_offset_secs, now);
        self.time_refresh.start(now);
        if first {
            info!("Time synchronized: {}", self.shared.clock.timestamp(now));
        }
    }

    fn service_items(&mut self) {
        self.for_each_item(|item, bus| crate::item::actor_update(item, bus));
    }

    fn deliver_local_broadcasts(&mut self) {
        for Inbound { topic, payload } in core::mem::take(&mut self.shared.outbox) {
            self.route(&topic, &Message::parse(&payload));
        }
    }

    fn check_init_window(&mut self) {
        if !self.init_window.is_due(self.clock.now_ms()) {
            return;
        }
        self.init_window.stop();
        let Some(document) = self.persisted.take() else {
            return;
        };
        if self.provisioned {
            debug!("Node provisioned from the network, discarding the stored document");
            return;
        }
        match parse_object(document.as_bytes()) {
            Ok(config) => {
                info!("Applying the stored provisioning document");
                self.apply_config(&config, Origin::Persisted);
            }
            Err(e) => warn!("Stored provisioning document: {e}"),
        }
    }

    fn apply_config(&mut self, config: &Object, origin: Origin) {
        info!("Processing node configuration");
        if let Some(hostname) = config.get(HOSTNAME_KEY).and_then(Value::as_str)
            && !hostname.is_empty()
            && hostname != self.hostname()
        {
            self.pending_hostname = Some(hostname.to_string());
        }
        if let Some(description) = config.get(DESCRIPTION_KEY) {
            self.core.set_description(value_to_string(description));
        }
        if let Some(descriptors) = config.get(ITEMS_KEY).and_then(Value::as_array) {
            for descriptor in descriptors {
                if let Err(e) = self.stage(descriptor) {
                    warn!("{e}");
                }
            }
        }
        self.last_config = Some(self.timestamp());

        if origin == Origin::Network {
            self.provisioned = true;
            match serde_json::to_string(config) {
                Ok(document) => {
                    if let Err(e) = self.storage.store(StorageKey::Provisioning, &document) {
                        warn!("{e}");
                    }
                }
                Err(e) => warn!("Cannot serialize the provisioning document: {e}"),
            }
        }
    }

    fn stage(&mut self, descriptor: &Value) -> Result<()> {
        let tag = descriptor
            .get(TAG_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::new(ErrorKind::Provisioning, "item descriptor without a tag"))?;
        let id = descriptor.get(ID_KEY).and_then(Value::as_str);

        let known = self
            .items
            .iter()
            .chain(&self.pending)
            .any(|item| item.core().tag() == tag && id.is_none_or(|id| item.core().id() == id));
        if known {
            debug!("Item {tag} [{}] already present", id.unwrap_or(tag));
            return Ok(());
        }
        let id = id.unwrap_or(tag);
        if self.id_in_use(id) || self.pending.iter().any(|item| item.core().id() == id) {
            return Err(Error::new(
                ErrorKind::Provisioning,
                alloc::format!("item {tag} [{id}] conflicts with an existing id"),
            ));
        }

        let mut item = self.registry.create(tag).ok_or_else(|| {
            Error::new(
                ErrorKind::Provisioning,
                alloc::format!("unknown item type `{tag}`"),
            )
        })?;
        item.core_mut().set_id(id);
        info!("Created item {tag} [{}]", item.core().id());
        self.pending.push(item);
        Ok(())
    }

    fn merge_pending(&mut self) {
        for item in core::mem::take(&mut self.pending) {
            if self.id_in_use(item.core().id()) {
                debug!(
                    "Discarding duplicate item {} [{}]",
                    item.core().tag(),
                    item.core().id()
                );
                continue;
            }
            let _ = self.attach(item);
        }
    }

    fn apply_hostname_change(&mut self) {
        let Some(hostname) = self.pending_hostname.take() else {
            return;
        };
        info!("Changing the host name to `{hostname}`");

        for topic in self.shared.subscribed.to_vec() {
            bus::unsubscribe(&mut self.shared, &mut self.transport, &topic);
        }

        let old = self.shared.topics.clone();
        self.shared.topics.set_hostname(&hostname);
        let new = &self.shared.topics;
        self.core.rename_topic(&old.config(), &new.config());
        for item in &mut self.items {
            let id = item.core().id().to_string();
            item.core_mut()
                .rename_topic(&old.item_config(&id), &new.item_config(&id));
        }
        self.core.set_id(&hostname);

        self.end_session();
        self.link.disconnect();

        if let Err(e) = self.storage.store(StorageKey::Hostname, &hostname) {
            warn!("{e}");
        }
    }

    fn log(&mut self, message: &str) {
        let now = self.clock.now_ms();
        let mut bus = Bus::new(
            &mut self.shared,
            &mut self.transport,
            &mut self.link,
            Peers::new(&[], &[], None),
            now,
        );
        bus.log(message);
    }

    fn id_in_use(&self, id: &str) -> bool {
        self.core.id() == id || self.items.iter().any(|item| item.core().id() == id)
    }

    fn for_each_item<F>(&mut self, mut visit: F)
    where
        F: FnMut(&mut dyn Item, &mut Bus<'_>),
    {
        let now = self.clock.now_ms();
        for index in 0..self.items.len() {
            let _ = self.drive(index, now, &mut visit);
        }
    }

    // Hands the item at `index` a bus whose peers are all the other items.
    fn drive<R>(
        &mut self,
        index: usize,
        now: u32,
        f: impl FnOnce(&mut dyn Item, &mut Bus<'_>) -> R,
    ) -> Option<R> {
        let (before, rest) = self.items.split_at_mut(index);
        let (item, after) = rest.split_first_mut()?;
        let mut bus = Bus::new(
            &mut self.shared,
            &mut self.transport,
            &mut self.link,
            Peers::new(before, after, Some(self.core.topics())),
            now,
        );
        Some(f(item.as_mut(), &mut bus))
    }
}

fn load<S: Storage>(storage: &mut S, key: StorageKey) -> Option<String> {
    match storage.load(key) {
        Ok(value) => value.filter(|value| !value.is_empty()),
        Err(e) => {
            warn!("Cannot load `{}`: {e}", key.name());
            None
        }
    }
}
