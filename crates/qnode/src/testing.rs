use alloc::collections::{BTreeMap, VecDeque};
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use core::cell::{RefCell, RefMut};

use serde_json::Value;

use crate::bus::{Bus, HostTopics, Peers, Shared};
use crate::controller::{Behavior, Scope};
use crate::error::Result;
use crate::item::{CommandHandler, Configurable, Item, ItemCore, Schedulable, Subscriber};
use crate::message::{Message, Object, value_to_string};
use crate::platform::{
    Inbound, Link, Platform, Resources, Storage, StorageKey, TimeSync, Transport, state,
};
use crate::timer::Clock;

pub(crate) const ROOT_TOPIC: &str = "qn/nodes";
pub(crate) const HOSTNAME: &str = "kitchen";

pub(crate) fn object(value: Value) -> Object {
    match value {
        Value::Object(object) => object,
        other => panic!("not an object: {other}"),
    }
}

/// The simulated environment of a node.
#[derive(Debug, Default)]
pub(crate) struct Wire {
    pub(crate) now: u32,
    pub(crate) reachable: bool,
    pub(crate) link_up: bool,
    pub(crate) broker_up: bool,
    pub(crate) connected: bool,
    pub(crate) code: i32,
    pub(crate) published: Vec<(String, String, bool)>,
    pub(crate) subscriptions: Vec<String>,
    pub(crate) unsubscribed: Vec<String>,
    pub(crate) inbound: VecDeque<Inbound>,
    pub(crate) journal: Vec<&'static str>,
    pub(crate) epoch: Option<i64>,
    pub(crate) stored: BTreeMap<&'static str, String>,
}

/// A shared handle to a [`Wire`].
#[derive(Debug, Clone, Default)]
pub(crate) struct World(Rc<RefCell<Wire>>);

impl World {
    pub(crate) fn online() -> Self {
        let world = Self::default();
        {
            let mut wire = world.wire();
            wire.reachable = true;
            wire.broker_up = true;
            wire.code = state::DISCONNECTED;
        }
        world
    }

    pub(crate) fn wire(&self) -> RefMut<'_, Wire> {
        self.0.borrow_mut()
    }

    pub(crate) fn advance(&self, ms: u32) {
        let mut wire = self.wire();
        wire.now = wire.now.wrapping_add(ms);
    }

    pub(crate) fn deliver(&self, topic: &str, payload: &str) {
        self.wire()
            .inbound
            .push_back(Inbound::new(topic, payload.as_bytes()));
    }

    pub(crate) fn drop_link(&self) {
        self.wire().link_up = false;
    }

    pub(crate) fn drop_session(&self, code: i32) {
        let mut wire = self.wire();
        wire.connected = false;
        wire.code = code;
    }

    pub(crate) fn is_subscribed(&self, topic: &str) -> bool {
        self.wire().subscriptions.iter().any(|t| t == topic)
    }

    pub(crate) fn payloads(&self, topic: &str) -> Vec<String> {
        self.wire()
            .published
            .iter()
            .filter(|(t, _, _)| t == topic)
            .map(|(_, payload, _)| payload.clone())
            .collect()
    }

    pub(crate) fn last_payload(&self, topic: &str) -> Option<String> {
        self.payloads(topic).pop()
    }

    pub(crate) fn journal(&self) -> Vec<&'static str> {
        self.wire().journal.clone()
    }

    pub(crate) fn stored(&self, key: StorageKey) -> Option<String> {
        self.wire().stored.get(key.name()).cloned()
    }

    pub(crate) fn resources(&self) -> Resources<TestPlatform> {
        Resources {
            clock: FakeClock(self.clone()),
            link: FakeLink(self.clone()),
            transport: FakeTransport(self.clone()),
            time_sync: FakeTimeSync(self.clone()),
            storage: MemoryStorage(self.clone()),
        }
    }
}

#[derive(Debug)]
pub(crate) struct FakeClock(World);

impl Clock for FakeClock {
    fn now_ms(&self) -> u32 {
        self.0.0.borrow().now
    }
}

#[derive(Debug)]
pub(crate) struct FakeLink(World);

impl Link for FakeLink {
    fn begin(&mut self, _hostname: &str) {
        let mut wire = self.0.wire();
        wire.journal.push("link:begin");
        wire.link_up = wire.reachable;
    }

    fn is_up(&self) -> bool {
        self.0.0.borrow().link_up
    }

    fn disconnect(&mut self) {
        let mut wire = self.0.wire();
        wire.journal.push("link:disconnect");
        wire.link_up = false;
    }

    fn default_hostname(&self) -> String {
        "node-a1b2c3".into()
    }

    fn address(&self) -> String {
        "192.168.1.20".into()
    }

    fn mac(&self) -> String {
        "A4:CF:12:A1:B2:C3".into()
    }

    fn signal(&self) -> i32 {
        -61
    }

    fn yield_now(&mut self) {
        self.0.advance(10);
    }
}

#[derive(Debug)]
pub(crate) struct FakeTransport(World);

impl Transport for FakeTransport {
    fn connect(&mut self, _client_id: &str) -> bool {
        let mut wire = self.0.wire();
        wire.journal.push("session:connect");
        if wire.broker_up && wire.link_up {
            wire.connected = true;
            wire.code = state::CONNECTED;
        } else {
            wire.code = state::CONNECT_FAILED;
        }
        wire.connected
    }

    fn is_connected(&self) -> bool {
        self.0.0.borrow().connected
    }

    fn disconnect(&mut self) {
        let mut wire = self.0.wire();
        wire.journal.push("session:end");
        wire.connected = false;
        wire.code = state::DISCONNECTED;
        wire.subscriptions.clear();
    }

    fn state(&self) -> i32 {
        self.0.0.borrow().code
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> bool {
        let mut wire = self.0.wire();
        if !wire.connected {
            return false;
        }
        let payload = String::from_utf8_lossy(payload).into_owned();
        wire.published.push((topic.to_string(), payload, retain));
        true
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        let mut wire = self.0.wire();
        if !wire.connected {
            return false;
        }
        if !wire.subscriptions.iter().any(|t| t == topic) {
            wire.subscriptions.push(topic.to_string());
        }
        true
    }

    fn unsubscribe(&mut self, topic: &str) {
        let mut wire = self.0.wire();
        wire.subscriptions.retain(|t| t != topic);
        wire.unsubscribed.push(topic.to_string());
    }

    fn poll(&mut self) -> Option<Inbound> {
        let mut wire = self.0.wire();
        if wire.connected {
            wire.inbound.pop_front()
        } else {
            None
        }
    }
}

#[derive(Debug)]
pub(crate) struct FakeTimeSync(World);

impl TimeSync for FakeTimeSync {
    fn begin(&mut self) {
        self.0.wire().journal.push("time:begin");
    }

    fn now_epoch(&mut self) -> Option<i64> {
        self.0.0.borrow().epoch
    }
}

#[derive(Debug)]
pub(crate) struct MemoryStorage(World);

impl Storage for MemoryStorage {
    fn load(&mut self, key: StorageKey) -> Result<Option<String>> {
        Ok(self.0.wire().stored.get(key.name()).cloned())
    }

    fn store(&mut self, key: StorageKey, value: &str) -> Result<()> {
        let _ = self.0.wire().stored.insert(key.name(), value.to_string());
        Ok(())
    }
}

pub(crate) struct TestPlatform;

impl Platform for TestPlatform {
    type Clock = FakeClock;
    type Link = FakeLink;
    type Transport = FakeTransport;
    type TimeSync = FakeTimeSync;
    type Storage = MemoryStorage;
}

/// Drives a single item outside of a hub.
pub(crate) struct TestBench {
    world: World,
    shared: Shared,
    transport: FakeTransport,
    link: FakeLink,
}

impl TestBench {
    pub(crate) fn online() -> Self {
        let world = World::online();
        {
            let mut wire = world.wire();
            wire.link_up = true;
            wire.connected = true;
            wire.code = state::CONNECTED;
        }
        let mut shared = Shared::new(HostTopics::new(ROOT_TOPIC, HOSTNAME), false);
        shared.session_up = true;
        Self {
            transport: FakeTransport(world.clone()),
            link: FakeLink(world.clone()),
            world,
            shared,
        }
    }

    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    pub(crate) fn with_bus<R>(&mut self, f: impl FnOnce(&mut Bus<'_>) -> R) -> R {
        let now = self.world.0.borrow().now;
        let mut bus = Bus::new(
            &mut self.shared,
            &mut self.transport,
            &mut self.link,
            Peers::new(&[], &[], None),
            now,
        );
        f(&mut bus)
    }

    pub(crate) fn advance(&self, ms: u32) {
        self.world.advance(ms);
    }

    pub(crate) fn subscribed(&self, topic: &str) -> bool {
        self.shared.subscribed.contains(topic)
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<Inbound> {
        core::mem::take(&mut self.shared.outbox)
    }

    pub(crate) fn report_requested(&self) -> bool {
        self.shared.report
    }

    pub(crate) fn last_payload(&self, topic: &str) -> Option<String> {
        self.world.last_payload(topic)
    }

    pub(crate) fn last_published(&self, topic: &str) -> Option<Value> {
        self.last_payload(topic)
            .and_then(|payload| serde_json::from_str(&payload).ok())
    }
}

/// Messages seen by a [`Probe`], shared with the test.
pub(crate) type Seen = Rc<RefCell<Vec<String>>>;

/// A bare item listening to a fixed set of topics.
#[derive(Debug, Clone)]
pub(crate) struct Probe {
    core: ItemCore,
    listens: Vec<String>,
    seen: Seen,
}

impl Default for Probe {
    fn default() -> Self {
        let mut core = ItemCore::new("PROBE");
        core.actor_mut().set_unthrottled(true);
        Self {
            core,
            listens: Vec::new(),
            seen: Seen::default(),
        }
    }
}

impl Probe {
    pub(crate) fn new(id: &str, listens: &[&str]) -> Self {
        let mut probe = Self::default();
        probe.core.set_id(id);
        probe.listens = listens.iter().map(ToString::to_string).collect();
        let _ = probe.core.start(0);
        probe
    }

    pub(crate) fn seen(&self) -> Seen {
        self.seen.clone()
    }
}

impl Schedulable for Probe {
    fn core(&self) -> &ItemCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ItemCore {
        &mut self.core
    }
}

impl Subscriber for Probe {
    fn on_attach(&mut self, bus: &mut Bus<'_>) {
        let config_topic = bus.item_config_topic(self.core.id());
        self.core.add_topic(bus, &config_topic);
        for topic in &self.listens {
            self.core.add_topic(bus, topic);
        }
        self.core.subscribe_all(bus);
    }
}

impl Configurable for Probe {
    fn on_config(&mut self, _bus: &mut Bus<'_>, topic: &str, _message: &Message) {
        self.seen.borrow_mut().push(format!("config:{topic}"));
    }
}

impl CommandHandler for Probe {
    fn is_command_message(&self, topic: &str) -> bool {
        self.listens.iter().any(|t| t == topic)
    }

    fn on_command(&mut self, _bus: &mut Bus<'_>, topic: &str, _message: &Message) {
        self.seen.borrow_mut().push(format!("command:{topic}"));
    }
}

impl Item for Probe {}

/// A behavior recording what the controller hands it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Counting {
    pub(crate) configured: u32,
    pub(crate) started_by_config: u32,
    pub(crate) level: Option<String>,
    pub(crate) commands: Vec<(String, String, Value)>,
}

impl Behavior for Counting {
    const TAG: &'static str = "COUNTING";

    fn configure(&mut self, scope: &mut Scope<'_, '_>, config: &Object) -> bool {
        if config.get("accept") == Some(&Value::Bool(false)) {
            return false;
        }
        self.configured += 1;
        if !scope.core().item().is_started() {
            self.started_by_config += 1;
        }
        self.level = config.get("level").map(value_to_string);
        true
    }

    fn command_element(
        &mut self,
        _scope: &mut Scope<'_, '_>,
        context: &str,
        key: &str,
        value: &Value,
    ) {
        self.commands
            .push((context.to_string(), key.to_string(), value.clone()));
    }

    fn update(&mut self, scope: &mut Scope<'_, '_>) {
        if let Some(level) = &self.level {
            scope.publish_state("level", level);
        }
    }
}
