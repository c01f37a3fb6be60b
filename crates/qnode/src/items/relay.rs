use embedded_hal::digital::OutputPin;

use log::warn;

use serde_json::Value;

use crate::controller::{Behavior, Scope};
use crate::item::ROOT_CONTEXT;
use crate::message::{Object, value_to_switch, value_to_u32};
use crate::timer::IntervalTimer;

const RELAY_KEY: &str = "relay";
const TIMEOUT_KEY: &str = "timeout";

/// A relay on a digital output.
///
/// Commands:
///
/// - `relay`: `on` or `off`.
/// - `timeout`: toggles the relay once after the given milliseconds.
///
/// The `relay` state is published as `ON` or `OFF` whenever the relay
/// switches.
#[derive(Debug)]
pub struct Relay<P> {
    pin: P,
    energized: bool,
    revert: IntervalTimer,
}

impl<P: OutputPin> Relay<P> {
    /// Creates a de-energized [`Relay`] driving `pin`.
    #[must_use]
    pub const fn new(pin: P) -> Self {
        Self {
            pin,
            energized: false,
            revert: IntervalTimer::new(0),
        }
    }

    /// Checks whether the relay is energized.
    #[must_use]
    pub const fn is_energized(&self) -> bool {
        self.energized
    }

    fn drive(&mut self) {
        let result = if self.energized {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(e) = result {
            warn!("Relay: cannot drive the output pin: {e:?}");
        }
    }

    fn set(&mut self, scope: &mut Scope<'_, '_>, energized: bool) {
        if self.energized == energized {
            return;
        }
        self.energized = energized;
        self.drive();
        scope.publish_state(RELAY_KEY, if energized { "ON" } else { "OFF" });
    }
}

impl<P: OutputPin> Behavior for Relay<P> {
    const TAG: &'static str = "RELAY";
    const NAME: &'static str = "Relay Controller";

    fn configure(&mut self, _scope: &mut Scope<'_, '_>, _config: &Object) -> bool {
        self.drive();
        true
    }

    fn command_element(
        &mut self,
        scope: &mut Scope<'_, '_>,
        context: &str,
        key: &str,
        value: &Value,
    ) {
        if context != ROOT_CONTEXT {
            return;
        }
        match key {
            RELAY_KEY => match value_to_switch(value) {
                Some(energized) => self.set(scope, energized),
                None => warn!("Relay: unknown relay value"),
            },
            TIMEOUT_KEY => {
                if let Some(timeout) = value_to_u32(value) {
                    self.revert.set_interval(timeout);
                    self.revert.start(scope.now());
                }
            }
            _ => {}
        }
    }

    fn update(&mut self, scope: &mut Scope<'_, '_>) {
        if self.revert.is_due(scope.now()) {
            self.revert.stop();
            let energized = !self.energized;
            self.set(scope, energized);
        }
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};

    use serde_json::json;

    use crate::controller::Controller;
    use crate::item::{CommandHandler, Schedulable};
    use crate::message::Message;
    use crate::testing::{TestBench, object};

    use super::Relay;

    fn configured(bench: &mut TestBench, pin: PinMock) -> Controller<Relay<PinMock>> {
        let mut item = Controller::new(Relay::new(pin));
        let _ = bench.with_bus(|bus| {
            item.configure(bus, &object(json!({ "statetopic": "porch/relay" })))
        });
        item
    }

    #[test]
    fn relay_switches_on_change_only() {
        let expectations = [
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
            PinTransaction::set(State::Low),
        ];
        let pin = PinMock::new(&expectations);
        let mut bench = TestBench::online();
        let mut item = configured(&mut bench, pin.clone());

        bench.with_bus(|bus| item.on_command(bus, "cmd", &Message::parse(br#"{"relay":"on"}"#)));
        assert!(item.behavior().is_energized());
        assert_eq!(
            bench.last_published("porch/relay").unwrap(),
            json!({ "relay": "ON" })
        );

        bench.with_bus(|bus| item.on_command(bus, "cmd", &Message::parse(br#"{"relay":"ON"}"#)));
        assert_eq!(bench.world().payloads("porch/relay").len(), 1);

        bench.with_bus(|bus| item.on_command(bus, "cmd", &Message::parse(br#"{"relay":"off"}"#)));
        assert_eq!(
            bench.last_published("porch/relay").unwrap(),
            json!({ "relay": "OFF" })
        );

        let mut pin = pin;
        pin.done();
    }

    #[test]
    fn timeout_toggles_once() {
        let expectations = [
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
            PinTransaction::set(State::Low),
        ];
        let pin = PinMock::new(&expectations);
        let mut bench = TestBench::online();
        let mut item = configured(&mut bench, pin.clone());

        bench.with_bus(|bus| {
            item.on_command(
                bus,
                "cmd",
                &Message::parse(br#"{"relay":"on","timeout":1000}"#),
            );
        });
        assert!(item.behavior().is_energized());

        bench.advance(500);
        bench.with_bus(|bus| item.update(bus));
        assert!(item.behavior().is_energized());

        bench.advance(500);
        bench.with_bus(|bus| item.update(bus));
        assert!(!item.behavior().is_energized());

        bench.advance(1000);
        bench.with_bus(|bus| item.update(bus));
        assert!(!item.behavior().is_energized());

        let mut pin = pin;
        pin.done();
    }
}
