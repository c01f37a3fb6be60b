use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::DefaultHashBuilder;

use indexmap::set::{IndexSet, Iter};

use serde::Serialize;
use serde_json::Value;

use crate::actor::Actor;
use crate::bus::Bus;
use crate::message::{Message, Object};

/// Context of the top level of a command message.
pub const ROOT_CONTEXT: &str = ".";

/// An ordered set of topics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Topics(IndexSet<String, DefaultHashBuilder>);

impl Topics {
    /// Creates an empty [`Topics`] set.
    #[must_use]
    pub fn new() -> Self {
        Self(IndexSet::with_hasher(DefaultHashBuilder::default()))
    }

    /// Checks whether a topic is in the set.
    #[must_use]
    pub fn contains(&self, topic: &str) -> bool {
        self.0.contains(topic)
    }

    /// Adds a topic, returning `false` if it was already present.
    pub fn insert(&mut self, topic: &str) -> bool {
        if self.0.contains(topic) {
            return false;
        }
        self.0.insert(topic.to_string())
    }

    /// Removes a topic preserving the order of the others, returning
    /// `false` if it was absent.
    pub fn remove(&mut self, topic: &str) -> bool {
        self.0.shift_remove(topic)
    }

    /// Removes all topics.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Returns the number of topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the topics in insertion order.
    pub fn iter(&self) -> Iter<'_, String> {
        self.0.iter()
    }

    /// Copies the topics into a vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a Topics {
    type Item = &'a String;
    type IntoIter = Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// State shared by every item: identity, scheduling and topic list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCore {
    tag: String,
    id: String,
    name: String,
    description: String,
    ordinal: u32,
    actor: Actor,
    topics: Topics,
}

impl ItemCore {
    /// Creates an [`ItemCore`] whose id and name are its tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self {
            id: tag.clone(),
            name: tag.clone(),
            tag,
            description: String::new(),
            ordinal: 0,
            actor: Actor::default(),
            topics: Topics::new(),
        }
    }

    /// Returns the item tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the item id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sets the item id.
    ///
    /// An empty id falls back to `<tag>-<ordinal>`.
    pub fn set_id(&mut self, id: &str) {
        self.id = if id.is_empty() {
            format!("{}-{}", self.tag, self.ordinal)
        } else {
            id.to_string()
        };
    }

    pub(crate) fn assign_ordinal(&mut self, ordinal: u32) {
        self.ordinal = ordinal;
        self.set_id("");
    }

    /// Returns the item name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the item name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Returns the item description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Sets the item description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Returns the item [`Actor`].
    #[must_use]
    pub const fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Returns the item [`Actor`] mutably.
    pub fn actor_mut(&mut self) -> &mut Actor {
        &mut self.actor
    }

    /// Checks whether the item is started.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.actor.is_active()
    }

    /// Starts scheduling the item.
    ///
    /// Returns `false` when the item was already started.
    pub fn start(&mut self, now: u32) -> bool {
        if self.actor.is_active() {
            return false;
        }
        self.actor.set_active(true, now);
        log::info!("{} [{}]: started update handler", self.name, self.id);
        true
    }

    /// Stops scheduling the item.
    ///
    /// Returns `false` when the item was already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.actor.is_active() {
            return false;
        }
        self.actor.set_active(false, 0);
        log::info!("{} [{}]: stopped update handler", self.name, self.id);
        true
    }

    /// Returns the topics this item listens to.
    #[must_use]
    pub const fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Adds a topic and asks the hub to subscribe it.
    ///
    /// Does nothing if the topic is already listed.
    pub fn add_topic(&mut self, bus: &mut Bus<'_>, topic: &str) {
        if self.topics.insert(topic) {
            let _ = bus.subscribe(topic);
        }
    }

    /// Removes a topic and asks the hub to unsubscribe it.
    ///
    /// The hub keeps the subscription while another attached item still
    /// lists the topic, unless `force` is set.
    pub fn remove_topic(&mut self, bus: &mut Bus<'_>, topic: &str, force: bool) {
        if self.topics.remove(topic) {
            bus.unsubscribe(topic, force);
        }
    }

    /// Asks the hub to subscribe every listed topic.
    pub fn subscribe_all(&self, bus: &mut Bus<'_>) {
        for topic in &self.topics {
            let _ = bus.subscribe(topic);
        }
    }

    /// Asks the hub to unsubscribe every listed topic.
    pub fn unsubscribe_all(&self, bus: &mut Bus<'_>, force: bool) {
        for topic in &self.topics {
            bus.unsubscribe(topic, force);
        }
    }

    /// Lists a topic without touching the hub subscriptions.
    pub(crate) fn list_topic(&mut self, topic: &str) {
        let _ = self.topics.insert(topic);
    }

    /// Swaps a listed topic without touching the hub subscriptions.
    pub(crate) fn rename_topic(&mut self, old: &str, new: &str) {
        if self.topics.remove(old) {
            let _ = self.topics.insert(new);
        }
    }

    /// Checks whether two items share the same tag and id.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.tag == other.tag && self.id == other.id
    }
}

/// Telemetry properties of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemProperties {
    /// Item name.
    pub name: String,
    /// Item id.
    pub id: String,
    /// Completed update cycles.
    pub update_cycles: u64,
    /// Time of the last applied configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_config: Option<String>,
    /// Item description.
    pub desc: String,
    /// Topics the item listens to.
    pub subscribed_topics: Vec<String>,
}

impl ItemProperties {
    /// Creates the [`ItemProperties`] of an [`ItemCore`].
    #[must_use]
    pub fn from_core(core: &ItemCore) -> Self {
        Self {
            name: core.name().to_string(),
            id: core.id().to_string(),
            update_cycles: core.actor().cycle_count(),
            last_config: None,
            desc: core.description().to_string(),
            subscribed_topics: core.topics().to_vec(),
        }
    }
}

/// An item the hub schedules.
pub trait Schedulable {
    /// Returns the shared item state.
    fn core(&self) -> &ItemCore;

    /// Returns the shared item state mutably.
    fn core_mut(&mut self) -> &mut ItemCore;

    /// Runs the item domain logic.
    fn update(&mut self, _bus: &mut Bus<'_>) {}
}

/// An item that listens to topics.
pub trait Subscriber: Schedulable {
    /// Called when the item joins the hub.
    ///
    /// Adds the item configuration topic and subscribes every listed topic.
    fn on_attach(&mut self, bus: &mut Bus<'_>) {
        let config_topic = bus.item_config_topic(self.core().id());
        self.core_mut().add_topic(bus, &config_topic);
        self.core().subscribe_all(bus);
    }

    /// Called when the item leaves the hub.
    fn on_detach(&mut self, bus: &mut Bus<'_>) {
        self.core().unsubscribe_all(bus, false);
    }
}

/// An item that accepts configuration messages.
pub trait Configurable: Schedulable {
    /// Checks whether a topic is the configuration topic of this item.
    fn is_config_message(&self, topic: &str, bus: &Bus<'_>) -> bool {
        topic == bus.item_config_topic(self.core().id())
    }

    /// Applies a configuration message.
    fn on_config(&mut self, _bus: &mut Bus<'_>, _topic: &str, _message: &Message) {}
}

/// An item that accepts command messages.
pub trait CommandHandler: Schedulable {
    /// Checks whether a topic carries commands for this item.
    fn is_command_message(&self, _topic: &str) -> bool {
        false
    }

    /// Handles a command message.
    fn on_command(&mut self, _bus: &mut Bus<'_>, _topic: &str, _message: &Message) {}
}

/// A schedulable, configurable, command-handling unit of device behavior.
pub trait Item: Subscriber + Configurable + CommandHandler {
    /// Returns the telemetry properties of the item.
    fn properties(&self) -> ItemProperties {
        ItemProperties::from_core(self.core())
    }
}

/// Runs one scheduling step of an item.
///
/// The item update runs when the item is started and either its interval
/// elapsed or it is unthrottled. Control always goes back to the network
/// stack afterwards.
pub fn actor_update(item: &mut dyn Item, bus: &mut Bus<'_>) {
    let now = bus.now();
    if item.core().actor().is_due(now) {
        item.update(bus);
        item.core_mut().actor_mut().advance(now);
    }
    bus.yield_now();
}

/// Returns the context of a nested object `key` found in `parent`.
#[must_use]
pub fn child_context(parent: &str, key: &str) -> String {
    if parent == ROOT_CONTEXT {
        format!("{ROOT_CONTEXT}{key}")
    } else {
        format!("{parent}.{key}")
    }
}

/// Walks a command message depth first.
///
/// Nested objects are descended with an extended context. Every other
/// value, arrays included, is handed to `visit` together with its context
/// and key.
pub fn walk_command_tree<F>(context: &str, message: &Object, visit: &mut F)
where
    F: FnMut(&str, &str, &Value),
{
    for (key, value) in message {
        match value {
            Value::Object(nested) => walk_command_tree(&child_context(context, key), nested, visit),
            other => visit(context, key, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::{String, ToString};
    use alloc::vec::Vec;

    use serde_json::{Value, json};

    use super::{ItemCore, ROOT_CONTEXT, Topics, child_context, walk_command_tree};

    fn walk(message: &Value) -> Vec<(String, String, Value)> {
        let mut calls = Vec::new();
        walk_command_tree(
            ROOT_CONTEXT,
            message.as_object().unwrap(),
            &mut |context: &str, key: &str, value: &Value| {
                calls.push((context.to_string(), key.to_string(), value.clone()));
            },
        );
        calls
    }

    #[test]
    fn command_tree_leaves() {
        let message = json!({
            "id": "x",
            "color": { "r": 50, "g": 100, "b": 150 },
            "brightness": 255
        });

        let mut calls = walk(&message);
        calls.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

        let mut expected = Vec::from([
            (".".to_string(), "id".to_string(), json!("x")),
            (".color".to_string(), "r".to_string(), json!(50)),
            (".color".to_string(), "g".to_string(), json!(100)),
            (".color".to_string(), "b".to_string(), json!(150)),
            (".".to_string(), "brightness".to_string(), json!(255)),
        ]);
        expected.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

        assert_eq!(calls, expected);
    }

    #[test]
    fn command_tree_keeps_arrays_whole() {
        let calls = walk(&json!({ "steps": [{ "r": 1 }, { "r": 2 }] }));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, ".");
        assert_eq!(calls[0].2, json!([{ "r": 1 }, { "r": 2 }]));
    }

    #[test]
    fn nested_contexts() {
        assert_eq!(child_context(".", "color"), ".color");
        assert_eq!(child_context(".color", "rgb"), ".color.rgb");

        let calls = walk(&json!({ "a": { "b": { "c": true } } }));
        assert_eq!(calls[0].0, ".a.b");
    }

    #[test]
    fn topic_set_keeps_order() {
        let mut topics = Topics::new();
        assert!(topics.insert("b"));
        assert!(topics.insert("a"));
        assert!(!topics.insert("b"));
        assert!(topics.insert("c"));
        assert!(topics.remove("a"));
        assert!(!topics.remove("a"));
        assert_eq!(topics.to_vec(), ["b", "c"]);
    }

    #[test]
    fn item_identity() {
        let mut core = ItemCore::new("PIR");
        assert_eq!(core.id(), "PIR");

        core.assign_ordinal(3);
        assert_eq!(core.id(), "PIR-3");

        core.set_id("hall");
        assert_eq!(core.id(), "hall");

        let mut other = ItemCore::new("PIR");
        other.set_id("hall");
        assert!(core.same_as(&other));
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut core = ItemCore::new("PIR");
        assert!(core.start(0));
        assert!(!core.start(10));
        assert!(core.is_started());
        assert!(core.stop());
        assert!(!core.stop());
        assert!(!core.is_started());
    }
}
