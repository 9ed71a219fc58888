//! Validating builder for [`MqttPhysicalAdapterConfiguration`].

use crate::broker::parse_mqtt_url;
use crate::configuration::{ConfigurationError, MqttPhysicalAdapterConfiguration};
use mqtt_pa_core::{
    PayloadError, PhysicalAssetAction, PhysicalAssetDescription, PhysicalAssetEvent,
    PhysicalAssetProperty, ValueType,
};
use mqtt_pa_topics::{
    validate_topic_filter, validate_topic_name, DigitalTwinIncomingTopic, DigitalTwinOutgoingTopic,
};
use serde_json::Value;
use std::time::Duration;

/// Smallest keep-alive interval accepted by the MQTT client.
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Builder collecting topics and the physical asset description.
///
/// Every `add_*` method validates its topic and returns the builder, so
/// calls chain with `?`:
///
/// ```
/// use mqtt_pa_adapter::MqttPhysicalAdapterConfiguration;
/// use mqtt_pa_core::ValueType;
///
/// # fn main() -> Result<(), mqtt_pa_adapter::ConfigurationError> {
/// let config = MqttPhysicalAdapterConfiguration::builder("127.0.0.1", 1883)?
///     .add_property_and_topic("intensity", 0.into(), "sensor/intensity", ValueType::Int)?
///     .add_event_and_topic("overheating", "text/plain", "sensor/overheating")?
///     .build()?;
/// assert_eq!(config.incoming_topics().len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MqttPhysicalAdapterConfigurationBuilder {
    configuration: MqttPhysicalAdapterConfiguration,
    properties: Vec<PhysicalAssetProperty>,
    actions: Vec<PhysicalAssetAction>,
    events: Vec<PhysicalAssetEvent>,
}

impl MqttPhysicalAdapterConfigurationBuilder {
    /// Start a builder with a generated client id.
    ///
    /// # Errors
    ///
    /// Returns error if the address is empty or the port is zero.
    pub fn new(broker_address: impl Into<String>, broker_port: u16) -> Result<Self, ConfigurationError> {
        Self::with_client_id(
            broker_address,
            broker_port,
            MqttPhysicalAdapterConfiguration::generate_client_id(),
        )
    }

    /// Start a builder with an explicit client id.
    ///
    /// # Errors
    ///
    /// Returns error if the address or client id is empty or the port is zero.
    pub fn with_client_id(
        broker_address: impl Into<String>,
        broker_port: u16,
        client_id: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let broker_address = broker_address.into();
        let client_id = client_id.into();
        if broker_address.trim().is_empty() || broker_port == 0 || client_id.is_empty() {
            return Err(ConfigurationError::InvalidBroker);
        }

        Ok(Self {
            configuration: MqttPhysicalAdapterConfiguration::new(
                broker_address,
                broker_port,
                client_id,
            ),
            properties: Vec::new(),
            actions: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Start a builder from a broker URL such as `tcp://broker:1883`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL cannot be parsed.
    pub fn from_broker_url(url: &str) -> Result<Self, ConfigurationError> {
        let (host, port) = parse_mqtt_url(url)?;
        Self::new(host, port)
    }

    /// Register a property fed by `topic`, converting payloads with `value_type`.
    ///
    /// # Errors
    ///
    /// Returns error if the topic is invalid or already subscribed.
    pub fn add_property_and_topic(
        self,
        property_key: impl Into<String>,
        initial_value: Value,
        topic: impl Into<String>,
        value_type: ValueType,
    ) -> Result<Self, ConfigurationError> {
        let key = property_key.into();
        let incoming = DigitalTwinIncomingTopic::property(topic, key.clone(), value_type);
        self.add_incoming_topic(
            incoming,
            vec![PhysicalAssetProperty::new(key, initial_value)],
            Vec::new(),
        )
    }

    /// Register a property fed by `topic`, converting payloads with `convert`.
    ///
    /// # Errors
    ///
    /// Returns error if the topic is invalid or already subscribed.
    pub fn add_property_with<F>(
        self,
        property_key: impl Into<String>,
        initial_value: Value,
        topic: impl Into<String>,
        convert: F,
    ) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Result<Value, PayloadError> + Send + Sync + 'static,
    {
        let key = property_key.into();
        let incoming = DigitalTwinIncomingTopic::property_with(topic, key.clone(), convert);
        self.add_incoming_topic(
            incoming,
            vec![PhysicalAssetProperty::new(key, initial_value)],
            Vec::new(),
        )
    }

    /// Register an action published on `topic`, rendering bodies with `render`.
    ///
    /// # Errors
    ///
    /// Returns error if the key is empty or taken, or the topic is invalid or
    /// already used by another action.
    pub fn add_action_and_topic<F>(
        self,
        action_key: impl Into<String>,
        action_type: impl Into<String>,
        content_type: impl Into<String>,
        topic: impl Into<String>,
        render: F,
    ) -> Result<Self, ConfigurationError>
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.add_outgoing_topic(
            action_key,
            action_type,
            content_type,
            DigitalTwinOutgoingTopic::action(topic, render),
        )
    }

    /// Register an event fed by `topic`; the body is the raw payload.
    ///
    /// # Errors
    ///
    /// Returns error if the topic is invalid or already subscribed.
    pub fn add_event_and_topic(
        self,
        event_key: impl Into<String>,
        event_type: impl Into<String>,
        topic: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let key = event_key.into();
        let incoming = DigitalTwinIncomingTopic::event(topic, key.clone());
        self.add_incoming_topic(
            incoming,
            Vec::new(),
            vec![PhysicalAssetEvent::new(key, event_type)],
        )
    }

    /// Register an arbitrary incoming topic with the properties and events it
    /// feeds.
    ///
    /// # Errors
    ///
    /// Returns error if both lists are empty, or the topic filter is invalid or
    /// already subscribed.
    pub fn add_incoming_topic(
        mut self,
        topic: DigitalTwinIncomingTopic,
        properties: Vec<PhysicalAssetProperty>,
        events: Vec<PhysicalAssetEvent>,
    ) -> Result<Self, ConfigurationError> {
        if properties.is_empty() && events.is_empty() {
            return Err(ConfigurationError::UnboundIncomingTopic(
                topic.topic().to_string(),
            ));
        }
        validate_topic_filter(topic.topic())?;
        if self
            .configuration
            .incoming_topics
            .iter()
            .any(|existing| existing.topic() == topic.topic())
        {
            return Err(ConfigurationError::DuplicateTopic(topic.topic().to_string()));
        }

        tracing::debug!(topic = %topic.mqtt_topic(), "Registered incoming topic");
        self.properties.extend(properties);
        self.events.extend(events);
        self.configuration.incoming_topics.push(topic);
        Ok(self)
    }

    /// Register an arbitrary outgoing topic for an action.
    ///
    /// # Errors
    ///
    /// Returns error if the key is empty or taken, or the topic name is invalid
    /// or already used by another action.
    pub fn add_outgoing_topic(
        mut self,
        action_key: impl Into<String>,
        action_type: impl Into<String>,
        content_type: impl Into<String>,
        topic: DigitalTwinOutgoingTopic,
    ) -> Result<Self, ConfigurationError> {
        let action_key = action_key.into();
        if action_key.is_empty() {
            return Err(ConfigurationError::EmptyActionKey);
        }
        validate_topic_name(topic.topic())?;
        if self
            .configuration
            .outgoing_topics
            .values()
            .any(|existing| existing.topic() == topic.topic())
        {
            return Err(ConfigurationError::DuplicateTopic(topic.topic().to_string()));
        }
        if self.configuration.outgoing_topics.contains_key(&action_key) {
            return Err(ConfigurationError::DuplicateAction(action_key));
        }

        tracing::debug!(action_key = %action_key, topic = %topic.mqtt_topic(), "Registered outgoing topic");
        self.actions.push(PhysicalAssetAction::new(
            action_key.clone(),
            action_type,
            content_type,
        ));
        self.configuration.outgoing_topics.insert(action_key, topic);
        Ok(self)
    }

    /// Override the generated client id.
    ///
    /// # Errors
    ///
    /// Returns error if the id is empty.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Result<Self, ConfigurationError> {
        let client_id = client_id.into();
        if client_id.is_empty() {
            return Err(ConfigurationError::InvalidBroker);
        }
        self.configuration.client_id = client_id;
        Ok(self)
    }

    /// Set username and password. They are only sent when both are non-empty.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.configuration.username = Some(username.into());
        self.configuration.password = Some(password.into());
        self
    }

    /// Set the connection timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the timeout is zero.
    pub fn connection_timeout(mut self, timeout: Duration) -> Result<Self, ConfigurationError> {
        if timeout.is_zero() {
            return Err(ConfigurationError::InvalidSetting {
                name: "connection timeout",
                reason: "must be positive",
            });
        }
        self.configuration.connection_timeout = timeout;
        Ok(self)
    }

    /// Set the clean session flag.
    #[must_use]
    pub fn clean_session(mut self, clean_session: bool) -> Self {
        self.configuration.clean_session = clean_session;
        self
    }

    /// Enable or disable reconnection after failures.
    #[must_use]
    pub fn automatic_reconnect(mut self, automatic_reconnect: bool) -> Self {
        self.configuration.automatic_reconnect = automatic_reconnect;
        self
    }

    /// Set the pause between reconnection attempts.
    ///
    /// # Errors
    ///
    /// Returns error if the delay is zero.
    pub fn reconnect_delay(mut self, delay: Duration) -> Result<Self, ConfigurationError> {
        if delay.is_zero() {
            return Err(ConfigurationError::InvalidSetting {
                name: "reconnect delay",
                reason: "must be positive",
            });
        }
        self.configuration.reconnect_delay = delay;
        Ok(self)
    }

    /// Set the keep-alive interval.
    ///
    /// # Errors
    ///
    /// Returns error if the interval is shorter than five seconds.
    pub fn keep_alive(mut self, keep_alive: Duration) -> Result<Self, ConfigurationError> {
        if keep_alive < MIN_KEEP_ALIVE {
            return Err(ConfigurationError::InvalidSetting {
                name: "keep alive",
                reason: "must be at least 5 seconds",
            });
        }
        self.configuration.keep_alive = keep_alive;
        Ok(self)
    }

    /// Set the capacity of the client request and notification channels.
    ///
    /// # Errors
    ///
    /// Returns error if the capacity is zero.
    pub fn request_capacity(mut self, capacity: usize) -> Result<Self, ConfigurationError> {
        if capacity == 0 {
            return Err(ConfigurationError::InvalidSetting {
                name: "request capacity",
                reason: "must be positive",
            });
        }
        self.configuration.request_capacity = capacity;
        Ok(self)
    }

    /// Freeze the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if nothing is described or no topic is registered.
    pub fn build(self) -> Result<MqttPhysicalAdapterConfiguration, ConfigurationError> {
        if self.properties.is_empty() && self.actions.is_empty() && self.events.is_empty() {
            return Err(ConfigurationError::EmptyDescription);
        }
        let mut configuration = self.configuration;
        if configuration.incoming_topics.is_empty() && configuration.outgoing_topics.is_empty() {
            return Err(ConfigurationError::NoTopics);
        }

        configuration.description =
            PhysicalAssetDescription::new(self.actions, self.properties, self.events);
        tracing::debug!(
            client_id = %configuration.client_id,
            broker = %configuration.broker_connection_string(),
            incoming = configuration.incoming_topics.len(),
            outgoing = configuration.outgoing_topics.len(),
            "Built MQTT physical adapter configuration"
        );
        Ok(configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn builder() -> MqttPhysicalAdapterConfigurationBuilder {
        MqttPhysicalAdapterConfigurationBuilder::with_client_id("127.0.0.1", 1883, "pa-test")
            .unwrap()
    }

    #[test]
    fn rejects_unusable_broker() {
        assert_err!(MqttPhysicalAdapterConfigurationBuilder::new("", 1883));
        assert_err!(MqttPhysicalAdapterConfigurationBuilder::new("localhost", 0));
        assert_err!(MqttPhysicalAdapterConfigurationBuilder::with_client_id(
            "localhost",
            1883,
            ""
        ));
        assert_ok!(MqttPhysicalAdapterConfigurationBuilder::from_broker_url(
            "tcp://localhost:1884"
        ));
    }

    #[test]
    fn builds_sensor_configuration() {
        let config = builder()
            .add_action_and_topic(
                "switch-off",
                "sensor.actuation",
                "text/plain",
                "sensor/actions/switch",
                |body| format!("switch{}", body),
            )
            .unwrap()
            .add_property_and_topic("intensity", json!(0), "sensor/intensity", ValueType::Int)
            .unwrap()
            .add_event_and_topic("overheating", "text/plain", "sensor/overheating")
            .unwrap()
            .build()
            .unwrap();

        let description = config.physical_asset_description();
        assert_eq!(description.actions.len(), 1);
        assert_eq!(description.properties[0].key, "intensity");
        assert_eq!(description.events[0].key, "overheating");
        assert_eq!(config.incoming_topics().len(), 2);

        let outgoing = config.outgoing_topic_for_action("switch-off").unwrap();
        assert_eq!(outgoing.topic(), "sensor/actions/switch");
        assert_eq!(outgoing.apply(&json!(1)), "switch1");
    }

    #[test]
    fn rejects_duplicate_topics_per_direction() {
        let builder = builder()
            .add_property_and_topic("a", json!(0), "sensor/a", ValueType::Int)
            .unwrap();

        let err = builder
            .add_event_and_topic("alarm", "text/plain", "sensor/a")
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateTopic(topic) if topic == "sensor/a"));

        // The same string may be used once in each direction.
        let both = self::builder()
            .add_property_and_topic("a", json!(0), "sensor/a", ValueType::Int)
            .unwrap()
            .add_action_and_topic("set-a", "set", "text/plain", "sensor/a", |b| b.to_string());
        assert_ok!(both);
    }

    #[test]
    fn rejects_duplicate_action_keys() {
        let err = builder()
            .add_action_and_topic("toggle", "t", "text/plain", "lamp/1", |b| b.to_string())
            .unwrap()
            .add_action_and_topic("toggle", "t", "text/plain", "lamp/2", |b| b.to_string())
            .unwrap_err();

        assert!(matches!(err, ConfigurationError::DuplicateAction(key) if key == "toggle"));
    }

    #[test]
    fn validates_topic_shapes() {
        assert!(matches!(
            builder().add_event_and_topic("e", "t", ""),
            Err(ConfigurationError::Topic(_))
        ));
        assert_ok!(builder().add_event_and_topic("e", "t", "sensors/+/alarm"));
        assert!(matches!(
            builder().add_action_and_topic("a", "t", "text/plain", "lamp/+", |b| b.to_string()),
            Err(ConfigurationError::Topic(_))
        ));
        assert!(matches!(
            builder().add_action_and_topic("", "t", "text/plain", "lamp/1", |b| b.to_string()),
            Err(ConfigurationError::EmptyActionKey)
        ));
    }

    #[test]
    fn incoming_topic_needs_description_entries() {
        let err = builder()
            .add_incoming_topic(
                DigitalTwinIncomingTopic::event("sensor/raw", "raw"),
                Vec::new(),
                Vec::new(),
            )
            .unwrap_err();

        assert!(matches!(err, ConfigurationError::UnboundIncomingTopic(_)));
    }

    #[test]
    fn build_requires_description_and_topics() {
        assert!(matches!(
            builder().build(),
            Err(ConfigurationError::EmptyDescription)
        ));
    }

    #[test]
    fn connection_settings() {
        let config = builder()
            .credentials("user", "secret")
            .clean_session(false)
            .automatic_reconnect(false)
            .connection_timeout(Duration::from_secs(3))
            .unwrap()
            .reconnect_delay(Duration::from_millis(250))
            .unwrap()
            .keep_alive(Duration::from_secs(60))
            .unwrap()
            .add_event_and_topic("e", "t", "sensor/e")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.credentials(), Some(("user", "secret")));
        assert!(!config.clean_session());
        assert!(!config.automatic_reconnect());
        assert_eq!(config.connection_timeout(), Duration::from_secs(3));
        assert_eq!(config.reconnect_delay(), Duration::from_millis(250));

        assert_err!(builder().connection_timeout(Duration::ZERO));
        assert_err!(builder().keep_alive(Duration::from_secs(1)));
        assert_err!(builder().request_capacity(0));
    }
}
