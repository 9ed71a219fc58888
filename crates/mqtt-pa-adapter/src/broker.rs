//! Broker address parsing.

use crate::configuration::ConfigurationError;
use url::{Host, Url};

/// Port used when a broker URL does not name one.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Schemes naming a plain TCP MQTT broker.
const BROKER_SCHEMES: [&str; 2] = ["tcp", "mqtt"];

/// Parse a broker URL into host and port.
///
/// Accepts `tcp://host:port`, `mqtt://host[:port]` and bare `host[:port]`;
/// IPv6 hosts are written in brackets and returned without them.
///
/// # Errors
///
/// Returns error if the scheme is not `tcp`/`mqtt`, the host is missing, the
/// port is not a number, or the URL carries a path.
pub fn parse_mqtt_url(input: &str) -> Result<(String, u16), ConfigurationError> {
    let invalid = |reason: &str| ConfigurationError::InvalidBrokerUrl(format!("{input}: {reason}"));

    let input = input.trim();
    let url = if input.contains("://") {
        Url::parse(input)
    } else {
        Url::parse(&format!("tcp://{input}"))
    }
    .map_err(|e| invalid(&e.to_string()))?;

    if !BROKER_SCHEMES.contains(&url.scheme()) {
        return Err(invalid(&format!("unsupported scheme '{}'", url.scheme())));
    }
    if !matches!(url.path(), "" | "/") || url.query().is_some() {
        return Err(invalid("unexpected path"));
    }

    let host = match url.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        _ => return Err(invalid("missing host")),
    };

    Ok((host, url.port().unwrap_or(DEFAULT_MQTT_PORT)))
}
