//! Dispatch of received MQTT messages to incoming topics.

use crate::configuration::MqttPhysicalAdapterConfiguration;
use mqtt_pa_core::{PayloadError, PhysicalAssetNotification};
use mqtt_pa_topics::{topic_matches, DigitalTwinIncomingTopic};
use rumqttc::SubscribeFilter;

/// Routes received messages to the incoming topics whose filters match.
#[derive(Debug, Clone)]
pub struct TopicRouter {
    topics: Vec<DigitalTwinIncomingTopic>,
}

impl TopicRouter {
    /// Create a router over the given topics.
    #[must_use]
    pub fn new(topics: Vec<DigitalTwinIncomingTopic>) -> Self {
        Self { topics }
    }

    /// Create a router over a configuration's incoming topics.
    #[must_use]
    pub fn from_configuration(configuration: &MqttPhysicalAdapterConfiguration) -> Self {
        Self::new(configuration.incoming_topics().to_vec())
    }

    /// Subscription requests covering every incoming topic.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<SubscribeFilter> {
        self.topics
            .iter()
            .map(|t| SubscribeFilter::new(t.topic().to_string(), t.qos().into()))
            .collect()
    }

    /// Number of incoming topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// True if no topic is routed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Convert a received message into notifications.
    ///
    /// Every matching topic is applied in registration order and the results
    /// are concatenated.
    ///
    /// # Errors
    ///
    /// Returns error if the payload is not UTF-8, no topic matches, or a
    /// subscribe function rejects the payload.
    pub fn route(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<Vec<PhysicalAssetNotification>, RouteError> {
        let text = std::str::from_utf8(payload).map_err(|_| RouteError::Payload {
            topic: topic.to_string(),
            filter: None,
            source: PayloadError::NotUtf8,
        })?;

        let mut matched = false;
        let mut notifications = Vec::new();
        for incoming in self
            .topics
            .iter()
            .filter(|incoming| topic_matches(incoming.topic(), topic))
        {
            matched = true;
            let produced = incoming.apply(text).map_err(|source| RouteError::Payload {
                topic: topic.to_string(),
                filter: Some(incoming.topic().to_string()),
                source,
            })?;
            notifications.extend(produced);
        }

        if !matched {
            return Err(RouteError::Unrouted(topic.to_string()));
        }
        Ok(notifications)
    }
}

/// Errors routing a received message.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouteError {
    /// No incoming topic matches
    #[error("no incoming topic matches '{0}'")]
    Unrouted(String),
    /// Payload rejected
    #[error("payload on '{topic}' rejected: {source}")]
    Payload {
        /// Topic the message arrived on
        topic: String,
        /// Filter whose function failed, if one was reached
        filter: Option<String>,
        /// Underlying failure
        #[source]
        source: PayloadError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqtt_pa_core::ValueType;
    use mqtt_pa_topics::QosLevel;
    use serde_json::json;

    fn router() -> TopicRouter {
        TopicRouter::new(vec![
            DigitalTwinIncomingTopic::property("sensor/intensity", "intensity", ValueType::Int),
            DigitalTwinIncomingTopic::event("sensor/+/alarm", "alarm")
                .with_qos(QosLevel::AtLeastOnce),
            DigitalTwinIncomingTopic::event("sensor/#", "audit"),
        ])
    }

    #[test]
    fn routes_to_every_matching_topic() {
        let notifications = router().route("sensor/intensity", b"5").unwrap();

        assert_eq!(notifications.len(), 2);
        assert!(matches!(
            &notifications[0],
            PhysicalAssetNotification::PropertyVariation { key, value, .. }
                if key == "intensity" && *value == json!(5)
        ));
        assert_eq!(notifications[1].key(), Some("audit"));
    }

    #[test]
    fn routes_wildcard_subscriptions() {
        let notifications = router().route("sensor/boiler/alarm", b"too hot").unwrap();
        let keys: Vec<_> = notifications.iter().filter_map(|n| n.key()).collect();

        assert_eq!(keys, vec!["alarm", "audit"]);
    }

    #[test]
    fn reports_unrouted_topics() {
        assert!(matches!(
            router().route("pump/speed", b"1"),
            Err(RouteError::Unrouted(topic)) if topic == "pump/speed"
        ));
    }

    #[test]
    fn reports_rejected_payloads() {
        let err = router().route("sensor/intensity", b"bright").unwrap_err();
        assert!(matches!(
            err,
            RouteError::Payload { filter: Some(filter), .. } if filter == "sensor/intensity"
        ));

        let err = router().route("sensor/intensity", &[0xff, 0xfe]).unwrap_err();
        assert!(matches!(
            err,
            RouteError::Payload {
                source: PayloadError::NotUtf8,
                ..
            }
        ));
    }

    #[test]
    fn subscriptions_carry_qos() {
        let subscriptions = router().subscriptions();

        assert_eq!(subscriptions.len(), 3);
        assert_eq!(subscriptions[1].path, "sensor/+/alarm");
        assert_eq!(subscriptions[1].qos, rumqttc::QoS::AtLeastOnce);
    }
}
