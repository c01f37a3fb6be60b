use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;

use log::warn;

use crate::item::Item;

/// A zero-argument item constructor.
pub type Constructor = Box<dyn Fn() -> Box<dyn Item>>;

/// A closed map from item type names to constructors.
///
/// Every item type a node can be provisioned with is registered once at
/// boot. Names are unique and registration is append-only.
#[derive(Default)]
pub struct TypeRegistry {
    constructors: HashMap<String, Constructor>,
    constructed: u32,
}

impl core::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("names", &self.names())
            .field("constructed", &self.constructed)
            .finish()
    }
}

impl TypeRegistry {
    /// Creates an empty [`TypeRegistry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` under `name` using its [`Default`] implementation.
    ///
    /// Returns `false` if `name` is already taken.
    pub fn register<T>(&mut self, name: &str) -> bool
    where
        T: Item + Default + 'static,
    {
        self.register_with(name, || Box::new(T::default()))
    }

    /// Registers a constructor under `name`.
    ///
    /// Returns `false` if `name` is already taken.
    pub fn register_with<F>(&mut self, name: &str, constructor: F) -> bool
    where
        F: Fn() -> Box<dyn Item> + 'static,
    {
        if self.constructors.contains_key(name) {
            warn!("Item type `{name}` is already registered");
            return false;
        }
        let _ = self
            .constructors
            .insert(name.to_string(), Box::new(constructor));
        true
    }

    /// Checks whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Creates an item of the type registered under `name`.
    ///
    /// The new item id is `<tag>-<ordinal>`, where the ordinal counts the
    /// items this registry has constructed. Returns `None` for unknown
    /// names.
    pub fn create(&mut self, name: &str) -> Option<Box<dyn Item>> {
        let constructor = self.constructors.get(name)?;
        let mut item = constructor();
        self.constructed = self.constructed.wrapping_add(1);
        item.core_mut().assign_ordinal(self.constructed);
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::Probe;

    use super::TypeRegistry;

    #[test]
    fn create_by_name() {
        let mut registry = TypeRegistry::new();
        assert!(registry.register::<Probe>("PROBE"));
        assert!(registry.contains("PROBE"));

        let first = registry.create("PROBE").unwrap();
        let second = registry.create("PROBE").unwrap();
        assert_eq!(first.core().tag(), "PROBE");
        assert_eq!(first.core().id(), "PROBE-1");
        assert_eq!(second.core().id(), "PROBE-2");
    }

    #[test]
    fn unknown_name_is_none() {
        let mut registry = TypeRegistry::new();
        assert!(registry.create("MISSING").is_none());
    }

    #[test]
    fn names_are_unique() {
        let mut registry = TypeRegistry::new();
        assert!(registry.register::<Probe>("PROBE"));
        assert!(!registry.register::<Probe>("PROBE"));
        assert_eq!(registry.names(), ["PROBE"]);
    }
}
