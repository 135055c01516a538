use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::Driver;
use crate::core::{DbError, Result};

// Process-wide driver names. Populated by `register`, never cleared.
lazy_static! {
    static ref GLOBAL_REGISTRY: Registry = Registry::new();
}

/// Maps driver names to driver implementations.
pub struct Registry {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
}

impl Registry {
    /// Get the process-wide registry used by [`crate::Database::open`].
    pub fn global() -> &'static Registry {
        &GLOBAL_REGISTRY
    }

    pub fn new() -> Self {
        Self {
            drivers: RwLock::new(HashMap::new()),
        }
    }

    /// Makes `driver` available under `name`.
    ///
    /// Names are registered at most once; a second registration fails with
    /// [`DbError::DuplicateDriver`] and leaves the first in place.
    pub fn register(&self, name: &str, driver: Arc<dyn Driver>) -> Result<()> {
        let mut drivers = self.drivers.write()?;
        if drivers.contains_key(name) {
            return Err(DbError::DuplicateDriver(name.to_string()));
        }
        drivers.insert(name.to_string(), driver);
        Ok(())
    }

    pub fn driver(&self, name: &str) -> Result<Arc<dyn Driver>> {
        let drivers = self.drivers.read()?;
        drivers
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::UnknownDriver(name.to_string()))
    }

    /// Sorted list of registered names.
    pub fn drivers(&self) -> Result<Vec<String>> {
        let drivers = self.drivers.read()?;
        let mut names: Vec<String> = drivers.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
