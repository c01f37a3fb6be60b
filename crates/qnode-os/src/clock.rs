use std::time::Instant;

use qnode::timer::Clock;

/// A monotonic [`Clock`] counting milliseconds since its creation.
///
/// The counter wraps around every 49.7 days, as a microcontroller tick
/// counter does.
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl StdClock {
    /// Creates a [`StdClock`] starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for StdClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> u32 {
        // Truncation is the wrap-around.
        self.origin.elapsed().as_millis() as u32
    }
}
