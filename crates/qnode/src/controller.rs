use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::{debug, warn};

use serde_json::{Map, Value};

use crate::actor::DEFAULT_UPDATE_INTERVAL;
use crate::bus::{Bus, GLOBAL_BROADCAST_TOPIC, LOCAL_BROADCAST_TOPIC};
use crate::error::Result;
use crate::item::{
    CommandHandler, Configurable, Item, ItemCore, ItemProperties, ROOT_CONTEXT, Schedulable,
    Subscriber, walk_command_tree,
};
use crate::message::{Message, Object, value_to_string};

// Framework configuration keys.
const DESCRIPTION_KEY: &str = "desc";
const STATE_TOPIC_KEY: &str = "statetopic";
const STATE_FORMAT_KEY: &str = "stateformat";
const EVENT_TOPIC_KEY: &str = "eventtopic";
const COMMAND_TOPIC_KEY: &str = "commandtopic";
const INIT_KEY: &str = "init";
const INIT_LIST_KEY: &str = "init_list";

// Value of `stateformat` selecting text publication.
const RAW_STATE_FORMAT: &str = "raw";

/// Event published for text payloads received on a command topic.
pub const INVALID_COMMAND_EVENT: &str = "Invalid Command Message";

/// How state values are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishFormat {
    /// A `{"<name>": "<value>"}` object on the state topic.
    Json,
    /// The bare value on `<state topic>/<name>`.
    Text,
}

/// State shared by every item controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerCore {
    item: ItemCore,
    state_topic: String,
    event_topic: String,
    command_topics: Vec<String>,
    state_format: PublishFormat,
    detail_format: PublishFormat,
    signature: String,
    last_config: Option<String>,
}

impl ControllerCore {
    /// Creates a [`ControllerCore`] for items tagged `tag`.
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            item: ItemCore::new(tag),
            state_topic: String::new(),
            event_topic: String::new(),
            command_topics: Vec::new(),
            state_format: PublishFormat::Json,
            detail_format: PublishFormat::Text,
            signature: String::new(),
            last_config: None,
        }
    }

    /// Returns the [`ItemCore`].
    #[must_use]
    pub const fn item(&self) -> &ItemCore {
        &self.item
    }

    /// Returns the [`ItemCore`] mutably.
    pub fn item_mut(&mut self) -> &mut ItemCore {
        &mut self.item
    }

    /// Returns the state topic.
    #[must_use]
    pub fn state_topic(&self) -> &str {
        &self.state_topic
    }

    /// Returns the event topic.
    #[must_use]
    pub fn event_topic(&self) -> &str {
        &self.event_topic
    }

    /// Returns the command topics.
    #[must_use]
    pub fn command_topics(&self) -> &[String] {
        &self.command_topics
    }

    /// Returns the state [`PublishFormat`].
    #[must_use]
    pub const fn state_format(&self) -> PublishFormat {
        self.state_format
    }

    /// Returns the signature of the last applied configuration.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Returns when the item was last configured.
    #[must_use]
    pub fn last_config(&self) -> Option<&str> {
        self.last_config.as_deref()
    }

    /// Checks whether `topic` carries commands for this item.
    ///
    /// Command topics and the broadcast topics match, the latter either
    /// bare or suffixed with `/<tag>` or `/<id>`.
    #[must_use]
    pub fn is_command_topic(&self, topic: &str) -> bool {
        self.command_topics.iter().any(|t| t == topic)
            || [LOCAL_BROADCAST_TOPIC, GLOBAL_BROADCAST_TOPIC]
                .iter()
                .any(|broadcast| self.is_broadcast(broadcast, topic))
    }

    fn is_broadcast(&self, broadcast: &str, topic: &str) -> bool {
        match topic.strip_prefix(broadcast) {
            Some("") => true,
            Some(rest) => rest
                .strip_prefix('/')
                .is_some_and(|target| target == self.item.tag() || target == self.item.id()),
            None => false,
        }
    }

    fn replace_command_topics(&mut self, bus: &mut Bus<'_>, topics: Vec<String>) {
        for topic in core::mem::take(&mut self.command_topics) {
            self.item.remove_topic(bus, &topic, false);
        }
        for topic in topics {
            debug!("  Command topic: {topic}");
            self.item.add_topic(bus, &topic);
            self.command_topics.push(topic);
        }
    }
}

/// The view of a controller and of the hub handed to [`Behavior`] hooks.
pub struct Scope<'s, 'b> {
    core: &'s mut ControllerCore,
    bus: &'s mut Bus<'b>,
}

impl<'s, 'b> Scope<'s, 'b> {
    /// Creates a [`Scope`].
    pub fn new(core: &'s mut ControllerCore, bus: &'s mut Bus<'b>) -> Self {
        Self { core, bus }
    }

    /// Returns the monotonic time of the current scheduler pass.
    #[must_use]
    pub fn now(&self) -> u32 {
        self.bus.now()
    }

    /// Returns the [`ControllerCore`].
    #[must_use]
    pub fn core(&self) -> &ControllerCore {
        &*self.core
    }

    /// Returns the [`ItemCore`] mutably.
    pub fn item_mut(&mut self) -> &mut ItemCore {
        &mut self.core.item
    }

    /// Returns the [`Bus`].
    pub fn bus(&mut self) -> &mut Bus<'b> {
        &mut *self.bus
    }

    /// Starts the item, publishing a lifecycle event.
    ///
    /// Returns `false` when the item was already started.
    pub fn start(&mut self) -> bool {
        let started = self.core.item.start(self.bus.now());
        if started {
            let event = format!("{} Started update handler", self.core.item.name());
            self.publish_event(&event, &[]);
        }
        started
    }

    /// Stops the item, publishing a lifecycle event.
    ///
    /// Returns `false` when the item was already stopped.
    pub fn stop(&mut self) -> bool {
        let stopped = self.core.item.stop();
        if stopped {
            let event = format!("{} Stopped update handler", self.core.item.name());
            self.publish_event(&event, &[]);
        }
        stopped
    }

    /// Sets the update interval in milliseconds.
    pub fn set_update_interval(&mut self, interval: u32) {
        self.core.item.actor_mut().set_interval(interval);
    }

    /// Publishes a state value, retained.
    pub fn publish_state(&mut self, name: &str, value: &str) {
        if self.core.state_topic.is_empty() {
            return;
        }
        let result = match self.core.state_format {
            PublishFormat::Json => {
                let mut state = Map::new();
                let _ = state.insert(name.to_string(), Value::String(value.to_string()));
                self.bus
                    .publish_json(&self.core.state_topic, &Value::Object(state), true)
            }
            PublishFormat::Text => {
                let topic = format!("{}/{name}", self.core.state_topic);
                self.bus.publish(&topic, value, true)
            }
        };
        absorb(result);
    }

    /// Publishes a state detail, retained.
    pub fn publish_state_detail(&mut self, name: &str, value: &str) {
        if self.core.state_topic.is_empty() {
            return;
        }
        let topic = format!("{}/{name}", self.core.state_topic);
        let result = match self.core.detail_format {
            PublishFormat::Json => {
                let mut detail = Map::new();
                let _ = detail.insert(name.to_string(), Value::String(value.to_string()));
                self.bus.publish_json(&topic, &Value::Object(detail), true)
            }
            PublishFormat::Text => self.bus.publish(&topic, value, true),
        };
        absorb(result);
    }

    /// Publishes an event with optional attributes, not retained.
    pub fn publish_event(&mut self, name: &str, attributes: &[(&str, Value)]) {
        if self.core.event_topic.is_empty() {
            return;
        }
        let mut event = Map::new();
        let _ = event.insert("event".into(), Value::String(name.to_string()));
        let _ = event.insert("time".into(), Value::String(self.bus.timestamp()));
        for (key, value) in attributes {
            let _ = event.insert((*key).to_string(), value.clone());
        }
        let result = self
            .bus
            .publish_json(&self.core.event_topic, &Value::Object(event), false);
        absorb(result);
    }

    /// Logs a message tagged with the item identity.
    pub fn log(&mut self, message: &str) {
        let line = format!("{} [{}]: {message}", self.core.item.name(), self.core.item.id());
        self.bus.log(&line);
    }
}

fn absorb(result: Result<()>) {
    if let Err(e) = result {
        debug!("{e}");
    }
}

/// The item-specific hooks of a [`Controller`].
pub trait Behavior {
    /// The registered type name of the item.
    const TAG: &'static str;

    /// The display name of the item.
    const NAME: &'static str = Self::TAG;

    /// The initial update interval, in milliseconds.
    const UPDATE_INTERVAL: u32 = DEFAULT_UPDATE_INTERVAL;

    /// Applies the item-specific part of a configuration message.
    ///
    /// Returning `true` starts the item.
    fn configure(&mut self, _scope: &mut Scope<'_, '_>, _config: &Object) -> bool {
        true
    }

    /// Handles a whole command message.
    ///
    /// Walks the message and calls [`Behavior::command_element`] for each
    /// leaf. Items needing several correlated fields at once override this
    /// method.
    fn command(&mut self, scope: &mut Scope<'_, '_>, message: &Object) {
        let mut visit = |context: &str, key: &str, value: &Value| {
            self.command_element(scope, context, key, value);
        };
        walk_command_tree(ROOT_CONTEXT, message, &mut visit);
    }

    /// Handles a single leaf of a command message.
    fn command_element(
        &mut self,
        _scope: &mut Scope<'_, '_>,
        _context: &str,
        _key: &str,
        _value: &Value,
    ) {
    }

    /// Runs the item domain logic.
    fn update(&mut self, _scope: &mut Scope<'_, '_>) {}

    /// Adds item-specific telemetry properties.
    fn properties(&self, _properties: &mut ItemProperties) {}
}

/// An item driven by a [`Behavior`], with the shared configuration
/// lifecycle.
///
/// A configuration message is applied at most once: its canonical
/// serialization is compared with the last applied one and an identical
/// message is skipped. Otherwise the framework fields are applied, then
/// [`Behavior::configure`], and on success the item starts and replays the
/// `init` or `init_list` commands carried by the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controller<B> {
    core: ControllerCore,
    behavior: B,
}

impl<B: Behavior + Default> Default for Controller<B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

impl<B: Behavior> Controller<B> {
    /// Creates a [`Controller`].
    #[must_use]
    pub fn new(behavior: B) -> Self {
        let mut core = ControllerCore::new(B::TAG);
        core.item.set_name(B::NAME);
        core.item.actor_mut().set_interval(B::UPDATE_INTERVAL);
        Self { core, behavior }
    }

    /// Returns the [`ControllerCore`].
    #[must_use]
    pub const fn controller(&self) -> &ControllerCore {
        &self.core
    }

    /// Returns the [`Behavior`].
    #[must_use]
    pub const fn behavior(&self) -> &B {
        &self.behavior
    }

    /// Returns the [`Behavior`] mutably.
    pub fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    /// Applies a configuration message.
    ///
    /// Returns `false` when the message is identical to the last applied
    /// one.
    pub fn configure(&mut self, bus: &mut Bus<'_>, config: &Object) -> bool {
        let signature = match serde_json::to_string(config) {
            Ok(signature) => signature,
            Err(e) => {
                warn!("{}: cannot serialize configuration: {e}", self.core.item.id());
                return false;
            }
        };
        if signature == self.core.signature {
            debug!(
                "{}: configuration has not changed, skipping",
                self.core.item.id()
            );
            return false;
        }
        self.core.signature = signature;

        debug!("{} controller: processing configuration", self.core.item.tag());
        self.apply_framework_fields(bus, config);

        let mut scope = Scope::new(&mut self.core, bus);
        if self.behavior.configure(&mut scope, config) {
            let _ = scope.start();
            if let Some(init) = config.get(INIT_KEY).and_then(Value::as_object) {
                self.behavior.command(&mut scope, init);
            } else if let Some(init_list) = config.get(INIT_LIST_KEY).and_then(Value::as_array) {
                for init in init_list.iter().filter_map(Value::as_object) {
                    self.behavior.command(&mut scope, init);
                }
            }
        }

        self.core.last_config = Some(bus.timestamp());
        true
    }

    /// Configures topics directly and starts the item.
    ///
    /// Empty arguments leave the corresponding topic untouched. The
    /// configuration signature is neither checked nor updated.
    pub fn direct_config(
        &mut self,
        bus: &mut Bus<'_>,
        state_topic: &str,
        event_topic: &str,
        command_topic: &str,
    ) {
        if !state_topic.is_empty() {
            self.core.state_topic = state_topic.to_string();
        }
        if !event_topic.is_empty() {
            self.core.event_topic = event_topic.to_string();
        }
        if !command_topic.is_empty() {
            self.core
                .replace_command_topics(bus, Vec::from([command_topic.to_string()]));
        }
        self.core.last_config = Some(bus.timestamp());
        let _ = Scope::new(&mut self.core, bus).start();
    }

    /// Issues a command to this item.
    ///
    /// The command goes out on the first command topic, so that every
    /// listener sees it, unless `bypass` is set or there is no command
    /// topic: then it is handled locally.
    pub fn command(&mut self, bus: &mut Bus<'_>, command: &str, bypass: bool) {
        if !bypass && let Some(topic) = self.core.command_topics.first() {
            let topic = topic.clone();
            absorb(bus.publish(&topic, command, false));
            return;
        }
        let topic = self
            .core
            .command_topics
            .first()
            .cloned()
            .unwrap_or_else(|| LOCAL_BROADCAST_TOPIC.to_string());
        self.on_command(bus, &topic, &Message::parse(command.as_bytes()));
    }

    fn apply_framework_fields(&mut self, bus: &mut Bus<'_>, config: &Object) {
        if let Some(description) = config.get(DESCRIPTION_KEY) {
            self.core.item.set_description(value_to_string(description));
        }
        if let Some(topic) = config.get(STATE_TOPIC_KEY) {
            self.core.state_topic = value_to_string(topic);
            debug!("  State topic: {}", self.core.state_topic);
            if config
                .get(STATE_FORMAT_KEY)
                .and_then(Value::as_str)
                .is_some_and(|format| format.eq_ignore_ascii_case(RAW_STATE_FORMAT))
            {
                self.core.state_format = PublishFormat::Text;
            }
        }
        if let Some(topic) = config.get(EVENT_TOPIC_KEY) {
            self.core.event_topic = value_to_string(topic);
            debug!("  Event topic: {}", self.core.event_topic);
        }
        if let Some(topics) = config.get(COMMAND_TOPIC_KEY) {
            let topics = match topics {
                Value::Array(topics) => topics.iter().map(value_to_string).collect(),
                topic => Vec::from([value_to_string(topic)]),
            };
            self.core.replace_command_topics(bus, topics);
        }
    }
}

impl<B: Behavior> Schedulable for Controller<B> {
    fn core(&self) -> &ItemCore {
        &self.core.item
    }

    fn core_mut(&mut self) -> &mut ItemCore {
        &mut self.core.item
    }

    fn update(&mut self, bus: &mut Bus<'_>) {
        self.behavior.update(&mut Scope::new(&mut self.core, bus));
    }
}

impl<B: Behavior> Subscriber for Controller<B> {}

impl<B: Behavior> Configurable for Controller<B> {
    fn on_config(&mut self, bus: &mut Bus<'_>, _topic: &str, message: &Message) {
        match message {
            Message::Structured(config) => {
                let _ = self.configure(bus, config);
            }
            Message::Text(_) => debug!(
                "{}: ignoring text configuration message",
                self.core.item.id()
            ),
        }
    }
}

impl<B: Behavior> CommandHandler for Controller<B> {
    fn is_command_message(&self, topic: &str) -> bool {
        self.core.is_command_topic(topic)
    }

    fn on_command(&mut self, bus: &mut Bus<'_>, _topic: &str, message: &Message) {
        let mut scope = Scope::new(&mut self.core, bus);
        match message {
            Message::Structured(command) => self.behavior.command(&mut scope, command),
            Message::Text(text) => scope.publish_event(
                INVALID_COMMAND_EVENT,
                &[("message", Value::String(text.clone()))],
            ),
        }
    }
}

impl<B: Behavior> Item for Controller<B> {
    fn properties(&self) -> ItemProperties {
        let mut properties = ItemProperties::from_core(&self.core.item);
        properties.last_config.clone_from(&self.core.last_config);
        self.behavior.properties(&mut properties);
        properties
    }
}
