//! Messages exchanged between the adapter and its host.

use crate::description::PhysicalAssetDescription;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A notification sent by the adapter to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhysicalAssetNotification {
    /// The adapter is connected and describes the asset
    Bound {
        /// Description of the bound asset
        description: PhysicalAssetDescription,
    },
    /// A property changed on the physical asset
    PropertyVariation {
        /// Property key
        key: String,
        /// New value
        value: Value,
        /// When the adapter observed the change
        timestamp: DateTime<Utc>,
    },
    /// The physical asset emitted an event
    EventNotification {
        /// Event key
        key: String,
        /// Event body
        body: Value,
        /// When the adapter observed the event
        timestamp: DateTime<Utc>,
    },
    /// The adapter stopped or gave up on the broker
    Unbound {
        /// Why the adapter is no longer bound
        reason: String,
    },
}

impl PhysicalAssetNotification {
    /// A property variation observed now.
    #[must_use]
    pub fn property(key: impl Into<String>, value: Value) -> Self {
        Self::PropertyVariation {
            key: key.into(),
            value,
            timestamp: Utc::now(),
        }
    }

    /// An event notification observed now.
    #[must_use]
    pub fn event(key: impl Into<String>, body: Value) -> Self {
        Self::EventNotification {
            key: key.into(),
            body,
            timestamp: Utc::now(),
        }
    }

    /// Property or event key, if the notification carries one.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::PropertyVariation { key, .. } | Self::EventNotification { key, .. } => {
                Some(key.as_str())
            }
            Self::Bound { .. } | Self::Unbound { .. } => None,
        }
    }
}

/// A request from the host to perform an action on the physical asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalActionRequest {
    /// Action key
    pub key: String,
    /// Action body
    pub body: Value,
    /// When the host issued the request
    pub timestamp: DateTime<Utc>,
}

impl PhysicalActionRequest {
    /// Create a request issued now.
    #[must_use]
    pub fn new(key: impl Into<String>, body: Value) -> Self {
        Self {
            key: key.into(),
            body,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_keys() {
        let property = PhysicalAssetNotification::property("intensity", serde_json::json!(3));
        let event = PhysicalAssetNotification::event("overheating", serde_json::json!("hot"));
        let unbound = PhysicalAssetNotification::Unbound {
            reason: "stopped".to_string(),
        };

        assert_eq!(property.key(), Some("intensity"));
        assert_eq!(event.key(), Some("overheating"));
        assert_eq!(unbound.key(), None);
    }

    #[test]
    fn tagged_serialization() {
        let json = serde_json::to_value(PhysicalAssetNotification::property(
            "intensity",
            serde_json::json!(3),
        ))
        .unwrap();

        assert_eq!(json["kind"], "property_variation");
        assert_eq!(json["key"], "intensity");
        assert_eq!(json["value"], 3);
    }
}
