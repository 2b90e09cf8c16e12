//! Property paths, values and the per-path cache records.
//!
//! A property path names a single simulation value in the host's property
//! tree (for example `/engines/engine/rpm`). Values arrive from the transport
//! either as numbers or as text and are coerced to `f64` for dispatch.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};
use crate::transport::SubscriptionId;

/// An absolute property path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyPath(String);

impl PropertyPath {
    /// Create a path, prefixing `/` when the input is relative.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPropertyPath`] if the path is empty.
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            return Err(Error::invalid_path(raw, "path is empty"));
        }
        if raw.starts_with('/') {
            Ok(Self(raw.to_string()))
        } else {
            Ok(Self(format!("/{raw}")))
        }
    }

    /// The path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PropertyPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A raw value delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// A boolean node.
    Bool(bool),
    /// A numeric node.
    Number(f64),
    /// A string node, possibly holding a number.
    Text(String),
}

impl PropertyValue {
    /// Coerce to a number. Anything that is not numeric becomes `0.0`.
    #[must_use]
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) if n.is_nan() => 0.0,
            Self::Number(n) => *n,
            Self::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return 0.0;
                }
                match s.parse::<f64>() {
                    Ok(n) if !n.is_nan() => n,
                    _ => {
                        trace!(value = s, "non-numeric property value coerced to zero");
                        0.0
                    }
                }
            }
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Cached state for one aliased path of an instrument.
#[derive(Debug, Clone)]
pub struct PropertyRecord {
    /// Alias the instrument declared for this path.
    pub alias: String,
    /// Absolute path.
    pub path: PropertyPath,
    /// Last raw value, if any has arrived.
    pub value: Option<PropertyValue>,
    /// Last value coerced to a number.
    pub num: f64,
    /// Transport subscription, once attached.
    pub subscription: Option<SubscriptionId>,
}

impl PropertyRecord {
    /// Create a record with no value and no subscription.
    #[must_use]
    pub fn new(alias: impl Into<String>, path: PropertyPath) -> Self {
        Self {
            alias: alias.into(),
            path,
            value: None,
            num: 0.0,
            subscription: None,
        }
    }

    /// Store a new raw value and its numeric coercion.
    pub fn update(&mut self, value: PropertyValue) {
        self.num = value.as_number();
        self.value = Some(value);
    }

    /// Whether the record is attached to the transport.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}
