//! Host-side shadow of the physical asset.

use crate::description::PhysicalAssetDescription;
use crate::notification::PhysicalAssetNotification;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Latest known state of a physical asset, folded from notifications.
#[derive(Debug, Clone, Default)]
pub struct ShadowState {
    description: PhysicalAssetDescription,
    properties: BTreeMap<String, Value>,
    last_events: BTreeMap<String, Value>,
    bound: bool,
}

impl ShadowState {
    /// Create a shadow with every property at its initial value.
    #[must_use]
    pub fn new(description: PhysicalAssetDescription) -> Self {
        let properties = description
            .properties
            .iter()
            .map(|p| (p.key.clone(), p.initial_value.clone()))
            .collect();
        Self {
            description,
            properties,
            last_events: BTreeMap::new(),
            bound: false,
        }
    }

    /// Fold a notification into the shadow.
    ///
    /// Returns `false` when the notification names a key the description
    /// does not know; such notifications leave the shadow unchanged.
    pub fn apply(&mut self, notification: &PhysicalAssetNotification) -> bool {
        match notification {
            PhysicalAssetNotification::Bound { description } => {
                *self = Self::new(description.clone());
                self.bound = true;
                true
            }
            PhysicalAssetNotification::Unbound { .. } => {
                self.bound = false;
                true
            }
            PhysicalAssetNotification::PropertyVariation { key, value, .. } => {
                let Some(slot) = self.properties.get_mut(key) else {
                    tracing::debug!(key = %key, "Ignoring variation of unknown property");
                    return false;
                };
                *slot = value.clone();
                true
            }
            PhysicalAssetNotification::EventNotification { key, body, .. } => {
                if self.description.event(key).is_none() {
                    tracing::debug!(key = %key, "Ignoring unknown event");
                    return false;
                }
                self.last_events.insert(key.clone(), body.clone());
                true
            }
        }
    }

    /// Current value of a property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Body of the last occurrence of an event.
    #[must_use]
    pub fn last_event(&self, key: &str) -> Option<&Value> {
        self.last_events.get(key)
    }

    /// True between `Bound` and `Unbound`.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Description the shadow was built from.
    #[must_use]
    pub fn description(&self) -> &PhysicalAssetDescription {
        &self.description
    }

    /// All property values as a JSON object.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        Value::Object(
            self.properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<_, _>>(),
        )
    }
}
