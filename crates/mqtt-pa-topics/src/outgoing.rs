//! Topics the adapter publishes action requests to.

use crate::topic::{MqttTopic, QosLevel};
use mqtt_pa_core::value::text_of;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Renders an action body into the payload to publish.
pub type PublishFunction = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// A publication triggered by a twin action.
#[derive(Clone)]
pub struct DigitalTwinOutgoingTopic {
    topic: MqttTopic,
    retain: bool,
    function: PublishFunction,
}

impl DigitalTwinOutgoingTopic {
    /// Create a topic with an arbitrary publish function.
    #[must_use]
    pub fn action<F>(topic: impl Into<String>, function: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        Self {
            topic: MqttTopic::new(topic),
            retain: false,
            function: Arc::new(function),
        }
    }

    /// A topic publishing `word` followed by the body text.
    ///
    /// A string body contributes its content, any other body its JSON text:
    /// `prefixed("t", "switch")` renders `"-off"` as `switch-off`.
    #[must_use]
    pub fn prefixed(topic: impl Into<String>, word: impl Into<String>) -> Self {
        let word = word.into();
        Self::action(topic, move |body| format!("{word}{}", text_of(body)))
    }

    /// Replace the publication QoS.
    #[must_use]
    pub fn with_qos(mut self, qos: QosLevel) -> Self {
        self.topic.qos = qos;
        self
    }

    /// Set the retain flag on publications.
    #[must_use]
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    /// Topic name and QoS.
    #[must_use]
    pub fn mqtt_topic(&self) -> &MqttTopic {
        &self.topic
    }

    /// Topic name.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic.topic
    }

    /// Publication QoS.
    #[must_use]
    pub fn qos(&self) -> QosLevel {
        self.topic.qos
    }

    /// Retain flag.
    #[must_use]
    pub fn retain(&self) -> bool {
        self.retain
    }

    /// Render the payload for an action body.
    #[must_use]
    pub fn apply(&self, body: &Value) -> String {
        (self.function)(body)
    }
}

impl fmt::Debug for DigitalTwinOutgoingTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalTwinOutgoingTopic")
            .field("topic", &self.topic)
            .field("retain", &self.retain)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefixed_payloads() {
        let topic = DigitalTwinOutgoingTopic::prefixed("sensor/actions/switch", "switch");

        assert_eq!(topic.apply(&json!("-off")), "switch-off");
        assert_eq!(topic.apply(&json!(1)), "switch1");
        assert_eq!(topic.apply(&json!({"on": false})), r#"switch{"on":false}"#);
    }

    #[test]
    fn custom_publish_function() {
        let topic = DigitalTwinOutgoingTopic::action("lamp/set", |body| {
            json!({ "brightness": body }).to_string()
        })
        .with_qos(QosLevel::AtLeastOnce)
        .with_retain(true);

        assert_eq!(topic.apply(&json!(80)), r#"{"brightness":80}"#);
        assert_eq!(topic.qos(), QosLevel::AtLeastOnce);
        assert!(topic.retain());
        assert_eq!(topic.topic(), "lamp/set");
    }
}
