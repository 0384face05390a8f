//! Connection parameter resolution and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{BulkError, Result};
use std::collections::HashMap;
use std::path::Path;

/// File consulted when a connection name is not found in the environment.
/// Maps connection names to raw connection strings.
const CONNECTIONS_FILE: &str = "connections.yaml";

impl ConnectionParams {
    /// Validate the parameters, naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Resolve a named connection string and parse it.
    ///
    /// Lookup order: environment variable named `name`, then the
    /// `connections.yaml` map in the working directory. The resolved
    /// parameters are not yet validated; validation happens when a
    /// connection manager is built from them.
    pub fn resolve(name: &str, timeout: u32) -> Result<Self> {
        if let Ok(raw) = std::env::var(name) {
            return Ok(Self::from_connection_string(&raw, timeout));
        }

        let path = Path::new(CONNECTIONS_FILE);
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let map: HashMap<String, String> = serde_yaml::from_str(&content)?;
            if let Some(raw) = map.get(name) {
                return Ok(Self::from_connection_string(raw, timeout));
            }
        }

        Err(BulkError::Config(format!(
            "connection string '{}' not found in environment or {}",
            name, CONNECTIONS_FILE
        )))
    }
}
