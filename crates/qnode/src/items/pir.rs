use alloc::format;
use alloc::string::ToString;

use embedded_hal::digital::InputPin;

use log::warn;

use serde_json::Value;

use crate::controller::{Behavior, Scope};
use crate::message::{Object, value_to_string, value_to_switch, value_to_u32};
use crate::sensors::{LatchEvent, LatchingSensor, Override};

const TIMEOUT_KEY: &str = "timeout";
const CURRENT_TIMEOUT_KEY: &str = "curr_timeout";
const OVERRIDE_KEY: &str = "overridemotion";
const TRIGGER_KEY: &str = "trigger";
const SUPPRESS_KEY: &str = "temp_disable";

const MOTION_STATE: &str = "motion";
const TIMEOUT_DETAIL: &str = "timeout";
const OVERRIDE_DETAIL: &str = "override";
const SOURCE_DETAIL: &str = "source";

/// A passive infrared motion sensor on a digital input.
///
/// Motion latches the `motion` state on for the configured timeout, which
/// restarts on each new detection. The remaining time is published once per
/// second as the `timeout` detail.
///
/// Configuration:
///
/// - `timeout`: the latch timeout in milliseconds.
///
/// Commands:
///
/// - `overridemotion`: `on`, `off` or `none`.
/// - `trigger`: `on` or `off`, optionally with `temp_disable` in
///   milliseconds to ignore the input afterwards.
/// - `timeout`: the latch timeout in milliseconds.
/// - `curr_timeout`: the timeout of the running latch in milliseconds.
#[derive(Debug)]
pub struct Pir<P> {
    pin: P,
    sensor: LatchingSensor,
}

impl<P: InputPin> Pir<P> {
    /// Creates a [`Pir`] reading `pin`.
    #[must_use]
    pub const fn new(pin: P) -> Self {
        Self {
            pin,
            sensor: LatchingSensor::new(),
        }
    }

    /// Returns the [`LatchingSensor`].
    #[must_use]
    pub const fn sensor(&self) -> &LatchingSensor {
        &self.sensor
    }

    fn publish_events(&mut self, scope: &mut Scope<'_, '_>) {
        for event in self.sensor.take_events() {
            match event {
                LatchEvent::StateChanged(active) => {
                    scope.publish_state(MOTION_STATE, if active { "on" } else { "off" });
                    if !active {
                        scope.publish_state_detail(TIMEOUT_DETAIL, "0");
                    }
                    continue;
                }
                LatchEvent::Countdown(remaining) => {
                    scope.publish_state_detail(TIMEOUT_DETAIL, &(remaining / 1000).to_string());
                    continue;
                }
                LatchEvent::Latch | LatchEvent::Relatch => {
                    scope.publish_state_detail(SOURCE_DETAIL, "sensor");
                }
                LatchEvent::ExternalLatch
                | LatchEvent::ExternalRelatch
                | LatchEvent::ExternalUnlatch => {
                    scope.publish_state_detail(SOURCE_DETAIL, "external");
                }
                LatchEvent::OverrideChanged(override_state) => {
                    let detail = match override_state {
                        Override::None => "none",
                        Override::ForceOn => "on",
                        Override::ForceOff => "off",
                    };
                    scope.publish_state_detail(OVERRIDE_DETAIL, detail);
                    scope.publish_state_detail(SOURCE_DETAIL, "external");
                }
                LatchEvent::TimeoutChanged(timeout) | LatchEvent::ActiveTimeoutChanged(timeout) => {
                    scope.publish_state_detail(TIMEOUT_DETAIL, &(timeout / 1000).to_string());
                }
                LatchEvent::SensorOff | LatchEvent::Unlatch => {}
            }
            scope.publish_event(event.name(), &[]);
        }
    }
}

impl<P: InputPin> Behavior for Pir<P> {
    const TAG: &'static str = "PIR";
    const NAME: &'static str = "PIR Sensor Controller";

    fn configure(&mut self, scope: &mut Scope<'_, '_>, config: &Object) -> bool {
        let now = scope.now();
        if let Some(timeout) = config.get(TIMEOUT_KEY).and_then(value_to_u32) {
            self.sensor.set_timeout(timeout);
        }
        self.sensor.start(now);
        self.sensor.trigger(false, now);
        self.publish_events(scope);
        true
    }

    fn command(&mut self, scope: &mut Scope<'_, '_>, message: &Object) {
        let now = scope.now();

        if let Some(value) = message.get(OVERRIDE_KEY) {
            let value = value_to_string(value);
            if value.eq_ignore_ascii_case("none") {
                self.sensor.set_override(Override::None);
            } else {
                match value_to_switch(&Value::String(value)) {
                    Some(true) => self.sensor.set_override(Override::ForceOn),
                    Some(false) => self.sensor.set_override(Override::ForceOff),
                    None => warn!("PIR: unknown override value"),
                }
            }
        }

        if let Some(active) = message.get(TRIGGER_KEY).and_then(value_to_switch) {
            match message.get(SUPPRESS_KEY).and_then(value_to_u32) {
                Some(suppress) => self.sensor.trigger_with_suppression(active, suppress, now),
                None => self.sensor.trigger(active, now),
            }
        }

        if let Some(timeout) = message.get(TIMEOUT_KEY).and_then(value_to_u32) {
            scope.log(&format!("Timeout command setting to: {timeout}"));
            self.sensor.set_timeout(timeout);
        }

        if let Some(timeout) = message.get(CURRENT_TIMEOUT_KEY).and_then(value_to_u32) {
            self.sensor.set_current_timeout(timeout, now);
        }

        self.publish_events(scope);
    }

    fn update(&mut self, scope: &mut Scope<'_, '_>) {
        let now = scope.now();
        if !self.sensor.is_started() {
            self.sensor.start(now);
        }
        let pin = &mut self.pin;
        self.sensor.update(now, || match pin.is_high() {
            Ok(active) => Some(active),
            Err(e) => {
                warn!("PIR: cannot read the input pin: {e:?}");
                None
            }
        });
        self.publish_events(scope);
    }
}
