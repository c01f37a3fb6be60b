use crate::timer::IntervalTimer;

/// Default update interval of an item, in milliseconds.
pub const DEFAULT_UPDATE_INTERVAL: u32 = 250;

/// Update gating of a single item.
///
/// An actor is either inactive, throttled by its own interval timer, or
/// unthrottled and updated on every scheduler pass. Every completed update
/// increments a 64-bit virtual cycle count built from a 32-bit counter and
/// a rollover counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    timer: IntervalTimer,
    active: bool,
    unthrottled: bool,
    counter: u32,
    rollover: u32,
}

impl Default for Actor {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL)
    }
}

impl Actor {
    /// Creates an inactive [`Actor`] with the given update interval.
    #[must_use]
    pub const fn new(interval: u32) -> Self {
        Self {
            timer: IntervalTimer::new(interval),
            active: false,
            unthrottled: false,
            counter: 0,
            rollover: 0,
        }
    }

    /// Activates or deactivates the actor.
    pub fn set_active(&mut self, active: bool, now: u32) {
        self.active = active;
        if active {
            self.timer.start(now);
        } else {
            self.timer.stop();
        }
    }

    /// Checks whether the actor is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Runs the update on every scheduler pass when `unthrottled` is set.
    pub fn set_unthrottled(&mut self, unthrottled: bool) {
        self.unthrottled = unthrottled;
    }

    /// Checks whether the actor is unthrottled.
    #[must_use]
    pub const fn is_unthrottled(&self) -> bool {
        self.unthrottled
    }

    /// Sets the update interval in milliseconds.
    pub fn set_interval(&mut self, interval: u32) {
        self.timer.set_interval(interval);
    }

    /// Returns the update interval in milliseconds.
    #[must_use]
    pub const fn interval(&self) -> u32 {
        self.timer.interval()
    }

    /// Checks whether an update must run at `now`.
    #[must_use]
    pub fn is_due(&self, now: u32) -> bool {
        self.active && (self.unthrottled || self.timer.is_due(now))
    }

    /// Records a completed update and re-arms the timer.
    pub fn advance(&mut self, now: u32) {
        if self.counter == u32::MAX {
            self.rollover = self.rollover.wrapping_add(1);
            self.counter = 0;
        } else {
            self.counter += 1;
        }
        if self.timer.is_started() {
            self.timer.step(now);
        }
    }

    /// Returns the number of completed updates.
    #[must_use]
    pub const fn cycle_count(&self) -> u64 {
        ((self.rollover as u64) << 32) | self.counter as u64
    }

    #[cfg(test)]
    pub(crate) const fn with_counter(mut self, counter: u32) -> Self {
        self.counter = counter;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::Actor;

    #[test]
    fn inactive_actor_never_runs() {
        let mut actor = Actor::new(10);
        actor.set_unthrottled(true);
        assert!(!actor.is_due(1_000));
    }

    #[test]
    fn throttled_actor_follows_interval() {
        let mut actor = Actor::new(10);
        actor.set_active(true, 0);
        assert!(!actor.is_due(5));
        assert!(actor.is_due(10));
        actor.advance(10);
        assert!(!actor.is_due(15));
        assert!(actor.is_due(20));
        assert_eq!(actor.cycle_count(), 1);
    }

    #[test]
    fn unthrottled_actor_runs_every_pass() {
        let mut actor = Actor::new(1_000);
        actor.set_active(true, 0);
        actor.set_unthrottled(true);
        for now in 0..5 {
            assert!(actor.is_due(now));
            actor.advance(now);
        }
        assert_eq!(actor.cycle_count(), 5);
    }

    #[test]
    fn cycle_count_crosses_counter_wrap() {
        let start = u64::from(u32::MAX - 2);
        let mut actor = Actor::new(1).with_counter(u32::MAX - 2);
        actor.set_active(true, 0);

        for now in 1..=5 {
            assert!(actor.is_due(now));
            actor.advance(now);
        }

        assert_eq!(actor.cycle_count(), start + 5);
        assert!(actor.cycle_count() > u64::from(u32::MAX));
    }
}
