//! MQTT topic names, filters and QoS.
//!
//! Matching follows MQTT 3.1.1 section 4.7:
//! - `+` matches exactly one level
//! - `#` matches the parent level and any number of child levels
//! - topics beginning with `$` are not matched by a leading wildcard

use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest topic the protocol can carry (UTF-8 encoded).
const MAX_TOPIC_LEN: usize = 65_535;

/// Quality of service of a subscription or publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QosLevel {
    /// QoS 0: fire and forget
    #[default]
    AtMostOnce,
    /// QoS 1: acknowledged delivery
    AtLeastOnce,
    /// QoS 2: assured single delivery
    ExactlyOnce,
}

impl From<QosLevel> for u8 {
    fn from(qos: QosLevel) -> Self {
        match qos {
            QosLevel::AtMostOnce => 0,
            QosLevel::AtLeastOnce => 1,
            QosLevel::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for QosLevel {
    type Error = TopicError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => Err(TopicError::InvalidQos(other)),
        }
    }
}

impl From<QosLevel> for rumqttc::QoS {
    fn from(qos: QosLevel) -> Self {
        match qos {
            QosLevel::AtMostOnce => Self::AtMostOnce,
            QosLevel::AtLeastOnce => Self::AtLeastOnce,
            QosLevel::ExactlyOnce => Self::ExactlyOnce,
        }
    }
}

impl fmt::Display for QosLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "qos{}", u8::from(*self))
    }
}

/// A topic string together with the QoS used for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MqttTopic {
    /// Topic name or filter
    pub topic: String,
    /// Quality of service
    #[serde(default)]
    pub qos: QosLevel,
}

impl MqttTopic {
    /// Create a topic with the default QoS.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            qos: QosLevel::default(),
        }
    }

    /// Replace the QoS.
    #[must_use]
    pub fn with_qos(mut self, qos: QosLevel) -> Self {
        self.qos = qos;
        self
    }

    /// True if the topic string contains wildcards.
    #[must_use]
    pub fn is_filter(&self) -> bool {
        self.topic.contains(['+', '#'])
    }
}

impl fmt::Display for MqttTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.topic, self.qos)
    }
}

/// Check that `topic` can be published to.
///
/// # Errors
///
/// Returns error if the topic is empty, too long, or contains wildcards or NUL.
pub fn validate_topic_name(topic: &str) -> Result<(), TopicError> {
    check_common(topic)?;
    if topic.contains(['+', '#']) {
        return Err(TopicError::InvalidName {
            topic: topic.to_string(),
            reason: "wildcards are not allowed in topic names",
        });
    }
    Ok(())
}

/// Check that `filter` can be subscribed to.
///
/// # Errors
///
/// Returns error if a wildcard does not occupy a whole level, or `#` is not
/// the last level.
pub fn validate_topic_filter(filter: &str) -> Result<(), TopicError> {
    check_common(filter)?;
    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;
    for (index, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || index != last) {
            return Err(TopicError::InvalidFilter {
                topic: filter.to_string(),
                reason: "'#' must be the whole last level",
            });
        }
        if level.contains('+') && *level != "+" {
            return Err(TopicError::InvalidFilter {
                topic: filter.to_string(),
                reason: "'+' must be a whole level",
            });
        }
    }
    Ok(())
}

fn check_common(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(TopicError::TooLong(topic.len()));
    }
    if topic.contains('\0') {
        return Err(TopicError::InvalidName {
            topic: topic.escape_default().to_string(),
            reason: "NUL is not allowed",
        });
    }
    Ok(())
}

/// Test whether a concrete `topic` matches a subscription `filter`.
#[must_use]
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && filter.starts_with(['+', '#']) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) | (None, None) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            _ => return false,
        }
    }
}

/// Errors for topic validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    /// Topic is the empty string
    #[error("topic cannot be empty")]
    Empty,
    /// Topic exceeds the protocol limit
    #[error("topic is {0} bytes long, limit is 65535")]
    TooLong(usize),
    /// Topic name is not publishable
    #[error("invalid topic name '{topic}': {reason}")]
    InvalidName {
        /// Offending topic
        topic: String,
        /// What is wrong with it
        reason: &'static str,
    },
    /// Topic filter is malformed
    #[error("invalid topic filter '{topic}': {reason}")]
    InvalidFilter {
        /// Offending filter
        topic: String,
        /// What is wrong with it
        reason: &'static str,
    },
    /// QoS outside 0..=2
    #[error("invalid QoS level {0}")]
    InvalidQos(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_single_level_matches() {
        assert!(topic_matches("sensor/intensity", "sensor/intensity"));
        assert!(!topic_matches("sensor/intensity", "sensor/intensity/raw"));
        assert!(topic_matches("sensor/+/value", "sensor/a/value"));
        assert!(topic_matches("sensor/+", "sensor/"));
        assert!(!topic_matches("sensor/+", "sensor"));
        assert!(!topic_matches("sensor/+/value", "sensor/a/b/value"));
    }

    #[test]
    fn multi_level_matches_parent() {
        assert!(topic_matches("sport/#", "sport"));
        assert!(topic_matches("sport/#", "sport/tennis/player1"));
        assert!(topic_matches("#", "anything/at/all"));
        assert!(!topic_matches("sport/#", "sports"));
    }

    #[test]
    fn system_topics_skip_leading_wildcards() {
        assert!(!topic_matches("#", "$SYS/broker/uptime"));
        assert!(!topic_matches("+/broker/uptime", "$SYS/broker/uptime"));
        assert!(topic_matches("$SYS/#", "$SYS/broker/uptime"));
    }

    #[test]
    fn filter_validation() {
        assert!(validate_topic_filter("a/+/b/#").is_ok());
        assert!(validate_topic_filter("#").is_ok());
        assert_eq!(validate_topic_filter(""), Err(TopicError::Empty));
        assert!(matches!(
            validate_topic_filter("a/#/b"),
            Err(TopicError::InvalidFilter { .. })
        ));
        assert!(matches!(
            validate_topic_filter("a/b+"),
            Err(TopicError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn name_validation() {
        assert!(validate_topic_name("sensor/actions/switch").is_ok());
        assert!(matches!(
            validate_topic_name("sensor/+"),
            Err(TopicError::InvalidName { .. })
        ));
        assert!(matches!(
            validate_topic_name("bad\0topic"),
            Err(TopicError::InvalidName { .. })
        ));
    }

    #[test]
    fn qos_conversions() {
        assert_eq!(QosLevel::try_from(1).unwrap(), QosLevel::AtLeastOnce);
        assert_eq!(QosLevel::try_from(3), Err(TopicError::InvalidQos(3)));
        assert_eq!(rumqttc::QoS::from(QosLevel::ExactlyOnce), rumqttc::QoS::ExactlyOnce);

        let topic: MqttTopic = serde_json::from_str(r#"{"topic": "a/b", "qos": 2}"#).unwrap();
        assert_eq!(topic.qos, QosLevel::ExactlyOnce);
        assert_eq!(topic.to_string(), "a/b (qos2)");
    }
}
