mod host;
mod pir;
mod relay;

pub use host::Host;
pub use pir::Pir;
pub use relay::Relay;

use alloc::boxed::Box;

use embedded_hal::digital::{InputPin, OutputPin};

use crate::controller::{Behavior, Controller};
use crate::registry::TypeRegistry;

/// Registers the [`Host`] item.
///
/// Returns `false` if the name is already taken.
pub fn register_host(registry: &mut TypeRegistry) -> bool {
    registry.register::<Controller<Host>>(Host::TAG)
}

/// Registers the [`Pir`] item, reading the pin built by `pin`.
///
/// Returns `false` if the name is already taken.
pub fn register_pir<P, F>(registry: &mut TypeRegistry, pin: F) -> bool
where
    P: InputPin + 'static,
    F: Fn() -> P + 'static,
{
    registry.register_with(Pir::<P>::TAG, move || {
        Box::new(Controller::new(Pir::new(pin())))
    })
}

/// Registers the [`Relay`] item, driving the pin built by `pin`.
///
/// Returns `false` if the name is already taken.
pub fn register_relay<P, F>(registry: &mut TypeRegistry, pin: F) -> bool
where
    P: OutputPin + 'static,
    F: Fn() -> P + 'static,
{
    registry.register_with(Relay::<P>::TAG, move || {
        Box::new(Controller::new(Relay::new(pin())))
    })
}
