use alloc::vec::Vec;

use crate::timer::IntervalTimer;

const DEFAULT_READ_INTERVAL: u32 = 250;
const DEFAULT_LATCH_TIMEOUT: u32 = 10_000;
const COUNTDOWN_INTERVAL: u32 = 1_000;

/// A manual override of a [`LatchingSensor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Override {
    /// The sensor and the latch decide.
    #[default]
    None,
    /// The sensor reads active regardless of anything else.
    ForceOn,
    /// The sensor reads inactive regardless of anything else.
    ForceOff,
}

/// A one-shot external trigger of a [`LatchingSensor`].
///
/// A trigger lasts for a single update cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExternalTrigger {
    /// No trigger.
    #[default]
    None,
    /// Triggered active.
    On,
    /// Triggered inactive.
    Off,
}

/// Something that happened to a [`LatchingSensor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchEvent {
    /// The sensor went active and started the latch.
    Latch,
    /// The sensor went active again while latched.
    Relatch,
    /// The sensor went inactive.
    SensorOff,
    /// An external trigger started the latch.
    ExternalLatch,
    /// An external trigger restarted the latch.
    ExternalRelatch,
    /// An external trigger released the latch.
    ExternalUnlatch,
    /// The latch timed out, or an override released it.
    Unlatch,
    /// The override changed.
    OverrideChanged(Override),
    /// The default latch timeout changed.
    TimeoutChanged(u32),
    /// The timeout of the running latch changed.
    ActiveTimeoutChanged(u32),
    /// The effective state changed.
    StateChanged(bool),
    /// Milliseconds left before the running latch times out.
    Countdown(u32),
}

impl LatchEvent {
    /// Returns a human-readable name of the event.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Latch => "Sensor Latch",
            Self::Relatch => "Sensor Re-latch",
            Self::SensorOff => "Sensor Off",
            Self::ExternalLatch => "External Latch",
            Self::ExternalRelatch => "External Re-latch",
            Self::ExternalUnlatch => "External Unlatch",
            Self::Unlatch => "Latch Timeout",
            Self::OverrideChanged(Override::None) => "Override Neutral",
            Self::OverrideChanged(Override::ForceOn) => "Override On",
            Self::OverrideChanged(Override::ForceOff) => "Override Off",
            Self::TimeoutChanged(_) => "Set Timeout",
            Self::ActiveTimeoutChanged(_) => "Set Active Timeout",
            Self::StateChanged(_) => "State Change",
            Self::Countdown(_) => "Countdown",
        }
    }
}

/// Computes the effective state of a latching sensor.
///
/// [`Override::ForceOff`] wins over everything and [`Override::ForceOn`]
/// over the remaining inputs. Without an override the state is active
/// while the sensor reads active, the latch runs, or an external trigger
/// is on.
#[must_use]
pub const fn effective_state(
    sensor_active: bool,
    latched: bool,
    trigger: ExternalTrigger,
    override_state: Override,
) -> bool {
    match override_state {
        Override::ForceOff => false,
        Override::ForceOn => true,
        Override::None => sensor_active || latched || matches!(trigger, ExternalTrigger::On),
    }
}

/// A binary sensor that stays active for a while after its input goes
/// inactive.
///
/// Each rising edge of the input starts or restarts the latch. The state
/// returns inactive only when the latch times out, an external trigger
/// releases it, or an override takes over. Changes are reported as
/// [`LatchEvent`]s, collected with [`LatchingSensor::take_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatchingSensor {
    read_timer: IntervalTimer,
    latch_timer: IntervalTimer,
    countdown: IntervalTimer,
    sensor: bool,
    default_timeout: u32,
    current_timeout: u32,
    trigger: ExternalTrigger,
    override_state: Override,
    latch_count: u32,
    events: Vec<LatchEvent>,
}

impl Default for LatchingSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl LatchingSensor {
    /// Creates a stopped [`LatchingSensor`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            read_timer: IntervalTimer::new(DEFAULT_READ_INTERVAL),
            latch_timer: IntervalTimer::new(DEFAULT_LATCH_TIMEOUT),
            countdown: IntervalTimer::new(COUNTDOWN_INTERVAL),
            sensor: false,
            default_timeout: DEFAULT_LATCH_TIMEOUT,
            current_timeout: DEFAULT_LATCH_TIMEOUT,
            trigger: ExternalTrigger::None,
            override_state: Override::None,
            latch_count: 0,
            events: Vec::new(),
        }
    }

    /// Starts sampling the input.
    pub fn start(&mut self, now: u32) {
        if !self.read_timer.is_started() {
            self.read_timer.start(now);
        }
    }

    /// Stops sampling the input.
    pub fn stop(&mut self) {
        self.read_timer.stop();
    }

    /// Checks whether the input is sampled.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.read_timer.is_started()
    }

    /// Sets how often the input is sampled, in milliseconds.
    pub fn set_read_interval(&mut self, interval: u32) {
        self.read_timer.set_interval(interval);
    }

    /// Returns the effective state.
    #[must_use]
    pub const fn state(&self) -> bool {
        effective_state(
            self.sensor,
            self.latch_timer.is_started(),
            self.trigger,
            self.override_state,
        )
    }

    /// Returns the last input sample.
    #[must_use]
    pub const fn sensor_state(&self) -> bool {
        self.sensor
    }

    /// Checks whether the latch runs.
    #[must_use]
    pub const fn is_latched(&self) -> bool {
        self.latch_timer.is_started()
    }

    /// Returns how many times the running latch was started or restarted.
    #[must_use]
    pub const fn latch_count(&self) -> u32 {
        self.latch_count
    }

    /// Returns the override.
    #[must_use]
    pub const fn override_state(&self) -> Override {
        self.override_state
    }

    /// Returns the default latch timeout, in milliseconds.
    #[must_use]
    pub const fn timeout(&self) -> u32 {
        self.default_timeout
    }

    /// Returns the timeout of the running latch, in milliseconds.
    #[must_use]
    pub const fn current_timeout(&self) -> u32 {
        self.current_timeout
    }

    /// Returns the milliseconds left before the running latch times out.
    #[must_use]
    pub fn time_remaining(&self, now: u32) -> u32 {
        self.latch_timer.time_remaining(now)
    }

    /// Sets the default latch timeout, in milliseconds.
    ///
    /// A running latch adopts it as well. A zero timeout is raised to one
    /// millisecond.
    pub fn set_timeout(&mut self, timeout: u32) {
        let timeout = timeout.max(1);
        self.default_timeout = timeout;
        self.current_timeout = timeout;
        self.latch_timer.set_interval(timeout);
        self.events.push(LatchEvent::TimeoutChanged(timeout));
    }

    /// Sets the timeout of the running latch, restarting it from `now`.
    ///
    /// The timeout lasts until the latch is released. Does nothing when the
    /// sensor is not latched.
    pub fn set_current_timeout(&mut self, timeout: u32, now: u32) {
        if !self.latch_timer.is_started() {
            return;
        }
        let timeout = timeout.max(1);
        self.current_timeout = timeout;
        self.latch_timer.set_interval(timeout);
        self.latch_timer.reset(now);
        if self.countdown.is_started() {
            self.countdown.reset(now);
        }
        self.events.push(LatchEvent::ActiveTimeoutChanged(timeout));
    }

    /// Sets the override.
    ///
    /// Leaving [`Override::None`] releases a running latch.
    pub fn set_override(&mut self, override_state: Override) {
        if self.override_state == override_state {
            return;
        }
        let previous = self.state();
        self.override_state = override_state;
        self.events.push(LatchEvent::OverrideChanged(override_state));
        if override_state != Override::None && self.latch_timer.is_started() {
            self.unlatch(false);
        }
        self.notify_change(previous);
    }

    /// Triggers the sensor externally, bypassing the input.
    ///
    /// Activating starts or restarts the latch, deactivating releases it.
    /// Ignored while an override is set.
    pub fn trigger(&mut self, active: bool, now: u32) {
        if self.override_state != Override::None {
            return;
        }
        let previous = self.state();
        if active {
            self.trigger = ExternalTrigger::On;
            self.latch(true, now);
        } else {
            self.trigger = ExternalTrigger::Off;
            self.unlatch(true);
        }
        self.notify_change(previous);
    }

    /// Triggers the sensor and ignores its input for `suppress` ms.
    pub fn trigger_with_suppression(&mut self, active: bool, suppress: u32, now: u32) {
        self.trigger(active, now);
        self.read_timer.add_delay(suppress);
    }

    /// Runs one update cycle.
    ///
    /// `sample` reads the input. It is only called when the read interval
    /// elapsed and no suppression is in effect; `None` keeps the previous
    /// sample.
    pub fn update<F>(&mut self, now: u32, sample: F)
    where
        F: FnOnce() -> Option<bool>,
    {
        if !self.read_timer.is_started() {
            return;
        }
        let previous = self.state();
        let previous_sensor = self.sensor;

        if self.read_timer.is_due(now) {
            if let Some(active) = sample() {
                self.sensor = active;
            }
            self.read_timer.step(now);
        }

        if self.sensor && !previous_sensor {
            if self.override_state != Override::ForceOff {
                self.latch(false, now);
            }
        } else if previous_sensor && !self.sensor {
            self.events.push(LatchEvent::SensorOff);
        }

        if self.latch_timer.is_due(now) {
            self.unlatch(false);
        }
        self.notify_change(previous);
        self.trigger = ExternalTrigger::None;

        if self.latch_timer.is_started() && self.countdown.is_due(now) {
            self.events
                .push(LatchEvent::Countdown(self.latch_timer.time_remaining(now)));
            self.countdown.step(now);
        }
    }

    /// Returns and clears the pending events.
    pub fn take_events(&mut self) -> Vec<LatchEvent> {
        core::mem::take(&mut self.events)
    }

    fn latch(&mut self, external: bool, now: u32) {
        self.latch_count = self.latch_count.wrapping_add(1);
        if self.latch_timer.is_started() {
            self.latch_timer.reset(now);
            self.events.push(if external {
                LatchEvent::ExternalRelatch
            } else {
                LatchEvent::Relatch
            });
        } else {
            self.current_timeout = self.default_timeout;
            self.latch_timer.set_interval(self.current_timeout);
            self.latch_timer.start(now);
            self.countdown.start(now);
            self.events.push(if external {
                LatchEvent::ExternalLatch
            } else {
                LatchEvent::Latch
            });
        }
    }

    fn unlatch(&mut self, external: bool) {
        self.latch_timer.stop();
        self.countdown.stop();
        self.latch_count = 0;
        self.events.push(if external {
            LatchEvent::ExternalUnlatch
        } else {
            LatchEvent::Unlatch
        });
    }

    fn notify_change(&mut self, previous: bool) {
        let state = self.state();
        if state != previous {
            self.events.push(LatchEvent::StateChanged(state));
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::{ExternalTrigger, LatchEvent, LatchingSensor, Override, effective_state};

    fn started() -> LatchingSensor {
        let mut sensor = LatchingSensor::new();
        sensor.start(0);
        sensor
    }

    fn state_changes(events: &[LatchEvent]) -> Vec<bool> {
        events
            .iter()
            .filter_map(|event| match event {
                LatchEvent::StateChanged(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn combinational_law() {
        let triggers = [
            ExternalTrigger::None,
            ExternalTrigger::On,
            ExternalTrigger::Off,
        ];
        let overrides = [Override::None, Override::ForceOn, Override::ForceOff];
        for sensor in [false, true] {
            for latched in [false, true] {
                for trigger in triggers {
                    for override_state in overrides {
                        let expected = (((sensor || latched || trigger == ExternalTrigger::On)
                            && override_state == Override::None)
                            || override_state == Override::ForceOn)
                            && override_state != Override::ForceOff;
                        assert_eq!(
                            effective_state(sensor, latched, trigger, override_state),
                            expected,
                            "{sensor} {latched} {trigger:?} {override_state:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn rising_edge_latches_until_timeout() {
        let mut sensor = started();
        sensor.set_timeout(5_000);
        let _ = sensor.take_events();

        sensor.update(250, || Some(true));
        assert!(sensor.state());
        assert!(sensor.is_latched());
        assert_eq!(
            sensor.take_events(),
            [LatchEvent::Latch, LatchEvent::StateChanged(true)]
        );

        sensor.update(500, || Some(false));
        assert!(sensor.state());
        assert_eq!(sensor.take_events(), [LatchEvent::SensorOff]);

        sensor.update(5_250, || Some(false));
        assert!(!sensor.state());
        let events = sensor.take_events();
        assert!(events.contains(&LatchEvent::Unlatch));
        assert_eq!(state_changes(&events), [false]);
        assert_eq!(sensor.latch_count(), 0);
    }

    #[test]
    fn new_edge_relatches() {
        let mut sensor = started();
        sensor.update(250, || Some(true));
        sensor.update(500, || Some(false));
        sensor.update(8_000, || Some(true));
        assert_eq!(sensor.latch_count(), 2);

        // The latch restarted at 8000 ms.
        sensor.update(12_000, || Some(false));
        assert!(sensor.state());
        sensor.update(18_000, || Some(false));
        assert!(!sensor.state());

        let events = sensor.take_events();
        assert!(events.contains(&LatchEvent::Relatch));
    }

    #[test]
    fn override_off_wins_and_releases_the_latch() {
        let mut sensor = started();
        sensor.update(250, || Some(true));
        let _ = sensor.take_events();

        sensor.set_override(Override::ForceOff);
        assert!(!sensor.state());
        assert!(!sensor.is_latched());
        assert_eq!(
            sensor.take_events(),
            [
                LatchEvent::OverrideChanged(Override::ForceOff),
                LatchEvent::Unlatch,
                LatchEvent::StateChanged(false),
            ]
        );

        // A new edge does not latch while forced off.
        sensor.update(500, || Some(false));
        sensor.update(750, || Some(true));
        assert!(!sensor.state());
        assert!(!sensor.is_latched());

        sensor.set_override(Override::None);
        assert!(sensor.state());
    }

    #[test]
    fn override_on() {
        let mut sensor = started();
        sensor.set_override(Override::ForceOn);
        assert!(sensor.state());
        sensor.set_override(Override::ForceOn);
        assert_eq!(
            sensor.take_events(),
            [
                LatchEvent::OverrideChanged(Override::ForceOn),
                LatchEvent::StateChanged(true),
            ]
        );
    }

    #[test]
    fn external_trigger() {
        let mut sensor = started();
        sensor.trigger(true, 100);
        assert!(sensor.state());
        assert_eq!(
            sensor.take_events(),
            [LatchEvent::ExternalLatch, LatchEvent::StateChanged(true)]
        );

        sensor.trigger(true, 200);
        assert_eq!(sensor.take_events(), [LatchEvent::ExternalRelatch]);

        sensor.trigger(false, 300);
        assert!(!sensor.state());
        assert_eq!(
            sensor.take_events(),
            [LatchEvent::ExternalUnlatch, LatchEvent::StateChanged(false)]
        );
    }

    #[test]
    fn trigger_is_ignored_under_override() {
        let mut sensor = started();
        sensor.set_override(Override::ForceOff);
        let _ = sensor.take_events();

        sensor.trigger(true, 100);
        assert!(!sensor.state());
        assert!(sensor.take_events().is_empty());
    }

    #[test]
    fn trigger_lasts_one_cycle() {
        let mut sensor = started();
        sensor.trigger(false, 100);
        let _ = sensor.take_events();

        // The trigger is consumed even when the input is not sampled.
        sensor.update(120, || Some(true));
        assert_eq!(sensor.trigger, ExternalTrigger::None);
        assert!(!sensor.sensor_state());
        assert!(!sensor.state());
    }

    #[test]
    fn suppression_delays_sampling() {
        let mut sensor = started();
        sensor.trigger_with_suppression(false, 1_000, 0);

        let mut sampled = false;
        sensor.update(250, || {
            sampled = true;
            Some(true)
        });
        assert!(!sampled);

        sensor.update(1_250, || Some(true));
        assert!(sensor.sensor_state());
        assert!(sensor.state());
    }

    #[test]
    fn failed_sample_keeps_previous_reading() {
        let mut sensor = started();
        sensor.update(250, || Some(true));
        sensor.update(500, || None);
        assert!(sensor.sensor_state());
    }

    #[test]
    fn countdown_while_latched() {
        let mut sensor = started();
        sensor.update(250, || Some(true));
        let _ = sensor.take_events();

        sensor.update(1_250, || Some(true));
        assert_eq!(sensor.take_events(), [LatchEvent::Countdown(9_000)]);

        sensor.update(1_500, || Some(true));
        assert!(sensor.take_events().is_empty());
    }

    #[test]
    fn current_timeout_applies_to_the_running_latch() {
        let mut sensor = started();
        sensor.set_current_timeout(2_000, 0);
        assert_eq!(sensor.current_timeout(), 10_000);

        sensor.update(250, || Some(true));
        sensor.set_current_timeout(2_000, 500);
        assert_eq!(sensor.current_timeout(), 2_000);
        assert_eq!(sensor.time_remaining(1_500), 1_000);

        sensor.update(2_500, || Some(false));
        assert!(!sensor.state());

        // The next latch goes back to the default timeout.
        sensor.update(2_750, || Some(true));
        assert_eq!(sensor.current_timeout(), 10_000);
    }
}
