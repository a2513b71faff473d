//! Name-keyed registry for pluggable scoring objects
//!
//! Weighting schemes, posting sources and similar user-extensible objects are
//! looked up by name when queries are deserialized. Each database handle owns
//! its own registry value; there is no process-wide registry state.

use std::collections::HashMap;

use crate::error::{ApiaryError, Result};

/// Implemented by objects that can be registered and later looked up by name
pub trait Registered {
    /// The name the object is registered under; must be non-empty
    fn name(&self) -> &str;
}

impl<T: Registered + ?Sized> Registered for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A registry mapping names to owned objects
///
/// Registering an object under a name that is already taken replaces the
/// previous registration.
pub struct Registry<T: Registered> {
    entries: HashMap<String, T>,
}

impl<T: Registered> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register an object under its own name
    ///
    /// Fails with `InvalidArgument` if the object's name is empty.
    pub fn register(&mut self, object: T) -> Result<()> {
        let name = object.name();
        if name.is_empty() {
            return Err(ApiaryError::InvalidArgument(
                "cannot register an object whose name() is empty".to_string(),
            ));
        }
        self.entries.insert(name.to_string(), object);
        Ok(())
    }

    /// Look up a registered object by name
    pub fn lookup(&self, name: &str) -> Option<&T> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Registered> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeScheme {
        name: &'static str,
        factor: f64,
    }

    impl Registered for FakeScheme {
        fn name(&self) -> &str {
            self.name
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        registry
            .register(FakeScheme {
                name: "bm25",
                factor: 1.0,
            })
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("bm25").is_some());
        assert!(registry.lookup("tfidf").is_none());
    }

    #[test]
    fn test_collision_replaces() {
        let mut registry = Registry::new();
        registry
            .register(FakeScheme {
                name: "bm25",
                factor: 1.0,
            })
            .unwrap();
        registry
            .register(FakeScheme {
                name: "bm25",
                factor: 2.0,
            })
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("bm25").unwrap().factor, 2.0);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = Registry::new();
        let err = registry
            .register(FakeScheme {
                name: "",
                factor: 1.0,
            })
            .unwrap_err();
        assert!(matches!(err, ApiaryError::InvalidArgument(_)));
    }

    #[test]
    fn test_boxed_objects() {
        let mut registry: Registry<Box<dyn Registered>> = Registry::new();
        registry
            .register(Box::new(FakeScheme {
                name: "bm25",
                factor: 1.0,
            }))
            .unwrap();
        assert_eq!(registry.lookup("bm25").unwrap().name(), "bm25");
    }
}
