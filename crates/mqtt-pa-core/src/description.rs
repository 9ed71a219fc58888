//! Physical asset description.
//!
//! The description is what the adapter announces to the host when it binds:
//! which properties it can observe, which actions it can perform and which
//! events it can report.

use serde::{Deserialize, Serialize};

/// A property observed on the physical asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalAssetProperty {
    /// Property key (e.g., "intensity")
    pub key: String,
    /// Value held before the first variation arrives
    pub initial_value: serde_json::Value,
}

impl PhysicalAssetProperty {
    /// Create a new property.
    #[must_use]
    pub fn new(key: impl Into<String>, initial_value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            initial_value,
        }
    }
}

/// An action the physical asset accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalAssetAction {
    /// Action key (e.g., "switch-off")
    pub key: String,
    /// Action type (e.g., "sensor.actuation")
    #[serde(rename = "type")]
    pub action_type: String,
    /// Content type of the action body (e.g., "text/plain")
    pub content_type: String,
}

impl PhysicalAssetAction {
    /// Create a new action.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        action_type: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            action_type: action_type.into(),
            content_type: content_type.into(),
        }
    }
}

/// An event the physical asset can emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalAssetEvent {
    /// Event key (e.g., "overheating")
    pub key: String,
    /// Event type (e.g., "text/plain")
    #[serde(rename = "type")]
    pub event_type: String,
}

impl PhysicalAssetEvent {
    /// Create a new event.
    #[must_use]
    pub fn new(key: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            event_type: event_type.into(),
        }
    }
}

/// Everything the adapter exposes about the physical asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalAssetDescription {
    /// Actions, in registration order
    pub actions: Vec<PhysicalAssetAction>,
    /// Properties, in registration order
    pub properties: Vec<PhysicalAssetProperty>,
    /// Events, in registration order
    pub events: Vec<PhysicalAssetEvent>,
}

impl PhysicalAssetDescription {
    /// Create a description from its parts.
    #[must_use]
    pub fn new(
        actions: Vec<PhysicalAssetAction>,
        properties: Vec<PhysicalAssetProperty>,
        events: Vec<PhysicalAssetEvent>,
    ) -> Self {
        Self {
            actions,
            properties,
            events,
        }
    }

    /// Look up a property by key.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&PhysicalAssetProperty> {
        self.properties.iter().find(|p| p.key == key)
    }

    /// Look up an action by key.
    #[must_use]
    pub fn action(&self, key: &str) -> Option<&PhysicalAssetAction> {
        self.actions.iter().find(|a| a.key == key)
    }

    /// Look up an event by key.
    #[must_use]
    pub fn event(&self, key: &str) -> Option<&PhysicalAssetEvent> {
        self.events.iter().find(|e| e.key == key)
    }

    /// True if nothing is described.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.properties.is_empty() && self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PhysicalAssetDescription {
        PhysicalAssetDescription::new(
            vec![PhysicalAssetAction::new(
                "switch-off",
                "sensor.actuation",
                "text/plain",
            )],
            vec![PhysicalAssetProperty::new("intensity", serde_json::json!(0))],
            vec![PhysicalAssetEvent::new("overheating", "text/plain")],
        )
    }

    #[test]
    fn lookup_by_key() {
        let description = sample();

        assert_eq!(
            description.property("intensity").unwrap().initial_value,
            serde_json::json!(0)
        );
        assert_eq!(
            description.action("switch-off").unwrap().action_type,
            "sensor.actuation"
        );
        assert!(description.event("overheating").is_some());
        assert!(description.event("missing").is_none());
        assert!(!description.is_empty());
        assert!(PhysicalAssetDescription::default().is_empty());
    }

    #[test]
    fn serializes_type_fields() {
        let json = serde_json::to_value(sample()).unwrap();

        assert_eq!(json["actions"][0]["type"], "sensor.actuation");
        assert_eq!(json["actions"][0]["content_type"], "text/plain");
        assert_eq!(json["events"][0]["type"], "text/plain");
    }
}
