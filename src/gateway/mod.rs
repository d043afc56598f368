//! Array Gateway - Port to the storage array's management API
//!
//! The gateway executes named array commands (queries and mutations) and
//! returns structured records. Adapters implement [`ArrayGateway`] to
//! provide concrete transports; the reconciliation core only sees this
//! trait.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod rest;

#[cfg(test)]
pub mod fake;

pub use rest::{RestGateway, RestGatewayConfig};

// =============================================================================
// Records
// =============================================================================

/// A single structured record returned by an array query.
///
/// Array records are flat field maps; numeric attributes arrive as
/// strings (`"capacity": "1024.00MB"`), so accessors are string-first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record(pub serde_json::Map<String, serde_json::Value>);

impl Record {
    /// Build a record from field/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), serde_json::Value::String(v.into())))
                .collect(),
        )
    }

    /// Get a string field, if present and non-null
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|v| v.as_str())
    }

    /// Get a required string field, failing with a malformed-record error
    pub fn require_str(&self, command: &str, field: &str) -> Result<&str> {
        self.get_str(field).ok_or_else(|| Error::MalformedRecord {
            command: command.to_string(),
            field: field.to_string(),
        })
    }
}

// =============================================================================
// Command Options
// =============================================================================

/// Named options for a mutating array command.
///
/// Keeps keys sorted so serialized commands (and test assertions on them)
/// are deterministic. Switch-style options carry a boolean true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandOptions(BTreeMap<String, serde_json::Value>);

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a valued option
    pub fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0
            .insert(key.to_string(), serde_json::Value::String(value.into()));
        self
    }

    /// Set a switch-style option
    pub fn flag(mut self, key: &str) -> Self {
        self.0.insert(key.to_string(), serde_json::Value::Bool(true));
        self
    }

    /// Get a valued option as a string
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    /// Check whether a switch-style option is set
    pub fn has_flag(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(serde_json::Value::Bool(true)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as the JSON body of a REST command
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.clone().into_iter().collect())
    }
}

// =============================================================================
// Command Outcome
// =============================================================================

/// Result of a mutating array command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Object id assigned by the array, when the command reports one
    pub id: Option<String>,
    /// Array-side status message, verbatim
    pub message: String,
}

// =============================================================================
// Array Gateway Port
// =============================================================================

/// Port for executing commands against the array's management API
#[async_trait]
pub trait ArrayGateway: Send + Sync {
    /// Run a read-only query, optionally scoped to one named object.
    ///
    /// Fails with [`Error::ObjectNotFound`] when the named object does not
    /// exist; use [`ArrayGateway::query_object`] to get an `Option` instead.
    async fn query(&self, command: &str, object: Option<&str>) -> Result<Vec<Record>>;

    /// Run a mutating command with named options and positional arguments
    async fn execute(
        &self,
        command: &str,
        options: &CommandOptions,
        args: &[&str],
    ) -> Result<CommandOutcome>;

    /// Query a single named object, mapping "not found" to `None`
    async fn query_object(&self, command: &str, object: &str) -> Result<Option<Record>> {
        match self.query(command, Some(object)).await {
            Ok(mut records) => {
                if records.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(records.remove(0)))
                }
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Type alias for an Arc'd gateway
pub type ArrayGatewayRef = Arc<dyn ArrayGateway>;
