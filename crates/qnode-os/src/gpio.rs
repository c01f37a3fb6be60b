use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

/// An in-memory digital pin.
///
/// Clones share the same level, so one clone can be handed to an item
/// while another one drives or observes it, for instance from a command
/// line or a simulation.
#[derive(Debug, Clone, Default)]
pub struct VirtualPin {
    level: Arc<AtomicBool>,
}

impl VirtualPin {
    /// Creates a low [`VirtualPin`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level.
    pub fn set(&self, high: bool) {
        self.level.store(high, Ordering::Release);
    }

    /// Returns the level.
    #[must_use]
    pub fn level(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }
}

impl ErrorType for VirtualPin {
    type Error = Infallible;
}

impl InputPin for VirtualPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level())
    }
}

impl OutputPin for VirtualPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal::digital::{InputPin, OutputPin};

    use super::VirtualPin;

    #[test]
    fn clones_share_the_level() {
        let observer = VirtualPin::new();
        let mut pin = observer.clone();

        pin.set_high().unwrap();
        assert!(observer.level());

        observer.set(false);
        assert_eq!(pin.is_low(), Ok(true));
    }
}
