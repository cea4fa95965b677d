use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, info};

use crate::RegistryError;

/// Maps published service names to handles.
///
/// Shared between the task that publishes services and the connection
/// tasks that resolve them, so all methods take `&self`.
pub struct Registry<H> {
    bindings: RwLock<HashMap<String, H>>,
}

impl<H: Clone> Registry<H> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Binds `handle` under `name`.
    ///
    /// Fails with [`RegistryError::AlreadyBound`] if the name is taken.
    pub fn publish(&self, name: impl Into<String>, handle: H) -> Result<(), RegistryError> {
        let name = name.into();
        let mut bindings = self
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if bindings.contains_key(&name) {
            return Err(RegistryError::AlreadyBound(name));
        }
        info!(service = %name, "service published");
        bindings.insert(name, handle);
        Ok(())
    }

    /// Binds `handle` under `name`, replacing any previous binding.
    pub fn rebind(&self, name: impl Into<String>, handle: H) {
        let name = name.into();
        debug!(service = %name, "service rebound");
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, handle);
    }

    /// Returns the handle bound under `name`.
    pub fn lookup(&self, name: &str) -> Result<H, RegistryError> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotBound(name.to_string()))
    }

    /// Removes the binding for `name`.
    pub fn unpublish(&self, name: &str) -> Result<(), RegistryError> {
        let removed = self
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        match removed {
            Some(_) => {
                info!(service = %name, "service unpublished");
                Ok(())
            }
            None => Err(RegistryError::NotBound(name.to_string())),
        }
    }

    /// Returns all bound names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl<H: Clone> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_and_lookup() {
        let registry = Registry::new();
        registry.publish("courier.ftp", 7u32).unwrap();

        assert_eq!(registry.lookup("courier.ftp").unwrap(), 7);
        assert!(matches!(
            registry.lookup("missing"),
            Err(RegistryError::NotBound(name)) if name == "missing"
        ));
    }

    #[test]
    fn publish_twice_fails() {
        let registry = Registry::new();
        registry.publish("svc", 1u32).unwrap();

        let result = registry.publish("svc", 2u32);
        assert!(matches!(result, Err(RegistryError::AlreadyBound(_))));
        assert_eq!(registry.lookup("svc").unwrap(), 1);
    }

    #[test]
    fn rebind_replaces() {
        let registry = Registry::new();
        registry.publish("svc", 1u32).unwrap();
        registry.rebind("svc", 2u32);
        assert_eq!(registry.lookup("svc").unwrap(), 2);
    }

    #[test]
    fn unpublish_removes() {
        let registry = Registry::new();
        registry.publish("svc", 1u32).unwrap();
        registry.unpublish("svc").unwrap();

        assert!(registry.lookup("svc").is_err());
        assert!(registry.unpublish("svc").is_err());
    }

    #[test]
    fn names_are_sorted() {
        let registry = Registry::new();
        registry.publish("zeta", 1u32).unwrap();
        registry.publish("alpha", 2u32).unwrap();
        registry.publish("mid", 3u32).unwrap();

        assert_eq!(registry.names(), vec!["alpha", "mid", "zeta"]);
    }
}
