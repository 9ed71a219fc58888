//! Topics the adapter subscribes to.

use crate::topic::{MqttTopic, QosLevel};
use mqtt_pa_core::{PayloadError, PhysicalAssetNotification, ValueType};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Turns a received payload into notifications for the host.
pub type SubscribeFunction =
    Arc<dyn Fn(&str) -> Result<Vec<PhysicalAssetNotification>, PayloadError> + Send + Sync>;

type NotificationResult = Result<Vec<PhysicalAssetNotification>, PayloadError>;

/// A subscription whose payloads feed the digital twin.
#[derive(Clone)]
pub struct DigitalTwinIncomingTopic {
    topic: MqttTopic,
    function: SubscribeFunction,
}

impl DigitalTwinIncomingTopic {
    /// Create a topic with an arbitrary subscribe function.
    ///
    /// One payload may produce any number of notifications, e.g. a JSON
    /// document carrying several properties at once.
    #[must_use]
    pub fn custom(topic: impl Into<String>, function: SubscribeFunction) -> Self {
        Self {
            topic: MqttTopic::new(topic),
            function,
        }
    }

    /// A topic carrying a single property, converted with `value_type`.
    #[must_use]
    pub fn property(
        topic: impl Into<String>,
        property_key: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        Self::property_with(topic, property_key, move |payload| {
            value_type.parse_payload(payload)
        })
    }

    /// A topic carrying a single property, converted by `convert`.
    #[must_use]
    pub fn property_with<F>(
        topic: impl Into<String>,
        property_key: impl Into<String>,
        convert: F,
    ) -> Self
    where
        F: Fn(&str) -> Result<Value, PayloadError> + Send + Sync + 'static,
    {
        let key = property_key.into();
        Self::custom(
            topic,
            Arc::new(move |payload: &str| -> NotificationResult {
                Ok(vec![PhysicalAssetNotification::property(
                    key.clone(),
                    convert(payload)?,
                )])
            }),
        )
    }

    /// A topic carrying an event whose body is the raw payload.
    #[must_use]
    pub fn event(topic: impl Into<String>, event_key: impl Into<String>) -> Self {
        Self::event_with(topic, event_key, |payload| {
            Ok(Value::String(payload.to_string()))
        })
    }

    /// A topic carrying an event whose body is built by `convert`.
    #[must_use]
    pub fn event_with<F>(topic: impl Into<String>, event_key: impl Into<String>, convert: F) -> Self
    where
        F: Fn(&str) -> Result<Value, PayloadError> + Send + Sync + 'static,
    {
        let key = event_key.into();
        Self::custom(
            topic,
            Arc::new(move |payload: &str| -> NotificationResult {
                Ok(vec![PhysicalAssetNotification::event(
                    key.clone(),
                    convert(payload)?,
                )])
            }),
        )
    }

    /// Replace the subscription QoS.
    #[must_use]
    pub fn with_qos(mut self, qos: QosLevel) -> Self {
        self.topic.qos = qos;
        self
    }

    /// Topic filter and QoS.
    #[must_use]
    pub fn mqtt_topic(&self) -> &MqttTopic {
        &self.topic
    }

    /// Topic filter string.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic.topic
    }

    /// Subscription QoS.
    #[must_use]
    pub fn qos(&self) -> QosLevel {
        self.topic.qos
    }

    /// Run the subscribe function on a payload.
    ///
    /// # Errors
    ///
    /// Returns whatever the subscribe function reports.
    pub fn apply(&self, payload: &str) -> NotificationResult {
        (self.function)(payload)
    }
}

impl fmt::Debug for DigitalTwinIncomingTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalTwinIncomingTopic")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}
