//! Adapter configuration.

use crate::builder::MqttPhysicalAdapterConfigurationBuilder;
use crate::file::ConfigFile;
use mqtt_pa_core::{PayloadError, PhysicalAssetDescription};
use mqtt_pa_topics::{DigitalTwinIncomingTopic, DigitalTwinOutgoingTopic, TopicError};
use rumqttc::{MqttOptions, NetworkOptions};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default connection timeout.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause between reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default keep-alive interval.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Default capacity of the client request and notification channels.
pub const DEFAULT_REQUEST_CAPACITY: usize = 100;

/// Prefix of generated client identifiers.
pub const CLIENT_ID_PREFIX: &str = "wldt.mqtt.client.";

/// Complete configuration of an MQTT physical adapter.
///
/// Built with [`MqttPhysicalAdapterConfigurationBuilder`]; immutable afterwards.
#[derive(Debug, Clone)]
pub struct MqttPhysicalAdapterConfiguration {
    pub(crate) broker_address: String,
    pub(crate) broker_port: u16,
    pub(crate) client_id: String,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) clean_session: bool,
    pub(crate) connection_timeout: Duration,
    pub(crate) automatic_reconnect: bool,
    pub(crate) reconnect_delay: Duration,
    pub(crate) keep_alive: Duration,
    pub(crate) request_capacity: usize,
    /// Topics to subscribe to, in registration order
    pub(crate) incoming_topics: Vec<DigitalTwinIncomingTopic>,
    /// Topics to publish to, by action key
    pub(crate) outgoing_topics: HashMap<String, DigitalTwinOutgoingTopic>,
    pub(crate) description: PhysicalAssetDescription,
}

impl MqttPhysicalAdapterConfiguration {
    pub(crate) fn new(broker_address: String, broker_port: u16, client_id: String) -> Self {
        Self {
            broker_address,
            broker_port,
            client_id,
            username: None,
            password: None,
            clean_session: true,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            automatic_reconnect: true,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            keep_alive: DEFAULT_KEEP_ALIVE,
            request_capacity: DEFAULT_REQUEST_CAPACITY,
            incoming_topics: Vec::new(),
            outgoing_topics: HashMap::new(),
            description: PhysicalAssetDescription::default(),
        }
    }

    /// Start a builder with a generated client id.
    ///
    /// # Errors
    ///
    /// Returns error if the address is empty or the port is zero.
    pub fn builder(
        broker_address: impl Into<String>,
        broker_port: u16,
    ) -> Result<MqttPhysicalAdapterConfigurationBuilder, ConfigurationError> {
        MqttPhysicalAdapterConfigurationBuilder::new(broker_address, broker_port)
    }

    /// Start a builder with an explicit client id.
    ///
    /// # Errors
    ///
    /// Returns error if the address or client id is empty or the port is zero.
    pub fn builder_with_client_id(
        broker_address: impl Into<String>,
        broker_port: u16,
        client_id: impl Into<String>,
    ) -> Result<MqttPhysicalAdapterConfigurationBuilder, ConfigurationError> {
        MqttPhysicalAdapterConfigurationBuilder::with_client_id(
            broker_address,
            broker_port,
            client_id,
        )
    }

    /// Start a builder populated from a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or describes an invalid adapter.
    pub fn builder_from_file(
        path: impl AsRef<Path>,
    ) -> Result<MqttPhysicalAdapterConfigurationBuilder, ConfigurationError> {
        ConfigFile::load(path.as_ref())?.into_builder()
    }

    /// Generate a client identifier.
    #[must_use]
    pub fn generate_client_id() -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{CLIENT_ID_PREFIX}{}", &suffix[..12])
    }

    /// Broker host.
    #[must_use]
    pub fn broker_address(&self) -> &str {
        &self.broker_address
    }

    /// Broker port.
    #[must_use]
    pub fn broker_port(&self) -> u16 {
        self.broker_port
    }

    /// Broker as a `tcp://host:port` string.
    #[must_use]
    pub fn broker_connection_string(&self) -> String {
        format!("tcp://{}:{}", self.broker_address, self.broker_port)
    }

    /// MQTT client identifier.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Username, if configured.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Credentials to present, only when both parts are non-empty.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    /// Whether the broker should discard session state on connect.
    #[must_use]
    pub fn clean_session(&self) -> bool {
        self.clean_session
    }

    /// Upper bound for establishing a connection.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// Whether the adapter keeps retrying after connection failures.
    #[must_use]
    pub fn automatic_reconnect(&self) -> bool {
        self.automatic_reconnect
    }

    /// Pause between reconnection attempts.
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Keep-alive interval.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Capacity of the client request and notification channels.
    #[must_use]
    pub fn request_capacity(&self) -> usize {
        self.request_capacity
    }

    /// Topics to subscribe to.
    #[must_use]
    pub fn incoming_topics(&self) -> &[DigitalTwinIncomingTopic] {
        &self.incoming_topics
    }

    /// Topics to publish to, by action key.
    #[must_use]
    pub fn outgoing_topics(&self) -> &HashMap<String, DigitalTwinOutgoingTopic> {
        &self.outgoing_topics
    }

    /// Outgoing topic bound to an action.
    #[must_use]
    pub fn outgoing_topic_for_action(&self, action_key: &str) -> Option<&DigitalTwinOutgoingTopic> {
        self.outgoing_topics.get(action_key)
    }

    /// Description announced to the host.
    #[must_use]
    pub fn physical_asset_description(&self) -> &PhysicalAssetDescription {
        &self.description
    }

    /// Client options for `rumqttc`.
    #[must_use]
    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options =
            MqttOptions::new(&self.client_id, &self.broker_address, self.broker_port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(self.clean_session);
        options.set_request_channel_capacity(self.request_capacity);
        if let Some((user, pass)) = self.credentials() {
            options.set_credentials(user, pass);
        }
        options
    }

    /// Network options for the `rumqttc` event loop.
    ///
    /// The client bounds the TCP connect and CONNACK wait by this timeout,
    /// in whole seconds, so it is rounded up.
    #[must_use]
    pub fn network_options(&self) -> NetworkOptions {
        let timeout = self.connection_timeout;
        let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        let mut options = NetworkOptions::new();
        options.set_connection_timeout(secs.max(1));
        options
    }
}

/// Errors raised while assembling a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// Broker address, port or client id is unusable
    #[error("broker address and client id cannot be empty and broker port must be positive")]
    InvalidBroker,
    /// Broker URL could not be parsed
    #[error("invalid MQTT broker URL: {0}")]
    InvalidBrokerUrl(String),
    /// A topic string is malformed
    #[error(transparent)]
    Topic(#[from] TopicError),
    /// A topic string is registered twice in the same direction
    #[error("topic already defined: {0}")]
    DuplicateTopic(String),
    /// An action key is registered twice
    #[error("action already defined: {0}")]
    DuplicateAction(String),
    /// An action key is empty
    #[error("action key cannot be empty")]
    EmptyActionKey,
    /// An incoming topic feeds neither properties nor events
    #[error("incoming topic '{0}' must declare at least one property or event")]
    UnboundIncomingTopic(String),
    /// A duration or capacity setting is out of range
    #[error("invalid {name}: {reason}")]
    InvalidSetting {
        /// Setting name
        name: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
    /// Nothing is described
    #[error("physical adapter must have at least one property, event or action")]
    EmptyDescription,
    /// No topic is registered
    #[error("MQTT physical adapter must define at least one incoming or outgoing topic")]
    NoTopics,
    /// A configured value does not fit its type
    #[error("property '{key}': {source}")]
    Property {
        /// Property key
        key: String,
        /// Conversion failure
        #[source]
        source: PayloadError,
    },
    /// Configuration file does not exist
    #[error("configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    /// Configuration file could not be parsed
    #[error("failed to load configuration: {0}")]
    FileLoad(Box<figment::Error>),
}

impl From<figment::Error> for ConfigurationError {
    fn from(err: figment::Error) -> Self {
        Self::FileLoad(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configuration() -> MqttPhysicalAdapterConfiguration {
        MqttPhysicalAdapterConfiguration::new("127.0.0.1".to_string(), 1883, "pa-1".to_string())
    }

    #[test]
    fn defaults() {
        let config = configuration();

        assert_eq!(config.broker_connection_string(), "tcp://127.0.0.1:1883");
        assert!(config.clean_session());
        assert!(config.automatic_reconnect());
        assert_eq!(config.connection_timeout(), Duration::from_secs(10));
        assert!(config.outgoing_topic_for_action("switch-off").is_none());
    }

    #[test]
    fn credentials_require_both_parts() {
        let mut config = configuration();
        config.username = Some("user".to_string());
        assert_eq!(config.credentials(), None);

        config.password = Some(String::new());
        assert_eq!(config.credentials(), None);

        config.password = Some("secret".to_string());
        assert_eq!(config.credentials(), Some(("user", "secret")));
    }

    #[test]
    fn mqtt_options_follow_configuration() {
        let mut config = configuration();
        config.clean_session = false;
        config.keep_alive = Duration::from_secs(15);

        let options = config.mqtt_options();

        assert_eq!(options.client_id(), "pa-1");
        assert_eq!(options.broker_address(), ("127.0.0.1".to_string(), 1883));
        assert!(!options.clean_session());
        assert_eq!(options.keep_alive(), Duration::from_secs(15));
    }

    #[test]
    fn network_options_carry_connection_timeout() {
        let mut config = configuration();
        assert_eq!(config.network_options().connection_timeout(), 10);

        config.connection_timeout = Duration::from_millis(2500);
        assert_eq!(config.network_options().connection_timeout(), 3);

        config.connection_timeout = Duration::from_millis(200);
        assert_eq!(config.network_options().connection_timeout(), 1);
    }

    #[test]
    fn generated_client_ids_are_unique() {
        let a = MqttPhysicalAdapterConfiguration::generate_client_id();
        let b = MqttPhysicalAdapterConfiguration::generate_client_id();

        assert!(a.starts_with(CLIENT_ID_PREFIX));
        assert_ne!(a, b);
    }
}
