/// A monotonic millisecond clock.
///
/// The counter is 32 bits wide and wraps roughly every 49 days. Nothing in
/// this crate assumes it does not wrap.
pub trait Clock {
    /// Returns the current time in milliseconds.
    fn now_ms(&self) -> u32;
}

/// A non-blocking interval timer.
///
/// The timer never reads a clock on its own: every query receives the
/// current time, so the same timer works on any [`Clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimer {
    interval: u32,
    last: u32,
    delay: u32,
    started: bool,
}

impl IntervalTimer {
    /// Creates a stopped [`IntervalTimer`].
    #[must_use]
    pub const fn new(interval: u32) -> Self {
        Self {
            interval,
            last: 0,
            delay: 0,
            started: false,
        }
    }

    /// Starts the timer, counting from `now`.
    pub fn start(&mut self, now: u32) {
        self.started = true;
        self.reset(now);
    }

    /// Stops the timer.
    pub fn stop(&mut self) {
        self.started = false;
        self.delay = 0;
    }

    /// Restarts the current interval from `now` without stopping the timer.
    pub fn reset(&mut self, now: u32) {
        self.last = now;
        self.delay = 0;
    }

    /// Checks whether the timer is running.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Checks whether the interval has elapsed since the last step.
    #[must_use]
    pub fn is_due(&self, now: u32) -> bool {
        self.started && self.elapsed(now) >= self.span()
    }

    /// Re-arms the timer for the next interval.
    ///
    /// The next deadline is computed from the previous one, so short
    /// delays in calling this method do not accumulate. If the timer fell
    /// behind by more than a whole interval it restarts from `now`.
    /// Calling it before the timer is due does nothing.
    pub fn step(&mut self, now: u32) {
        if !self.is_due(now) {
            return;
        }
        self.last = self.last.wrapping_add(self.span());
        self.delay = 0;
        if self.elapsed(now) >= self.interval {
            self.last = now;
        }
    }

    /// Sets the interval in milliseconds.
    pub fn set_interval(&mut self, interval: u32) {
        self.interval = interval;
    }

    /// Returns the interval in milliseconds.
    #[must_use]
    pub const fn interval(&self) -> u32 {
        self.interval
    }

    /// Postpones the next deadline by `delay` milliseconds.
    pub fn add_delay(&mut self, delay: u32) {
        self.delay = self.delay.saturating_add(delay);
    }

    /// Returns the milliseconds elapsed since the timer last fired.
    #[must_use]
    pub fn time_since_triggered(&self, now: u32) -> u32 {
        if self.started { self.elapsed(now) } else { 0 }
    }

    /// Returns the milliseconds left before the timer is due.
    #[must_use]
    pub fn time_remaining(&self, now: u32) -> u32 {
        if self.started {
            self.span().saturating_sub(self.elapsed(now))
        } else {
            0
        }
    }

    #[inline]
    fn elapsed(&self, now: u32) -> u32 {
        now.wrapping_sub(self.last)
    }

    #[inline]
    const fn span(&self) -> u32 {
        self.interval.saturating_add(self.delay)
    }
}
