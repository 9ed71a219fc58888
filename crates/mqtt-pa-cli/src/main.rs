//! # MQTT Physical Adapter CLI
//!
//! Offline utilities for checking adapter configurations, topic filters and payloads.

use anyhow::{Context, Result};
use mqtt_pa_adapter::MqttPhysicalAdapterConfiguration;
use mqtt_pa_core::ValueType;
use mqtt_pa_topics::{topic_matches, validate_topic_filter, validate_topic_name};
use std::env;
use std::path::Path;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "validate" => {
            if args.len() < 3 {
                eprintln!("Usage: mqtt-pa validate <file>");
                std::process::exit(1);
            }
            let configuration = load(&args[2])?;
            print_summary(&configuration);
        }
        "describe" => {
            if args.len() < 3 {
                eprintln!("Usage: mqtt-pa describe <file>");
                std::process::exit(1);
            }
            let configuration = load(&args[2])?;
            let json = serde_json::to_string_pretty(configuration.physical_asset_description())
                .context("Failed to serialize description")?;
            println!("{json}");
        }
        "match" => {
            if args.len() < 4 {
                eprintln!("Usage: mqtt-pa match <filter> <topic>");
                std::process::exit(1);
            }
            let (filter, topic) = (&args[2], &args[3]);
            validate_topic_filter(filter).context("Invalid filter")?;
            validate_topic_name(topic).context("Invalid topic")?;
            if topic_matches(filter, topic) {
                println!("match");
            } else {
                println!("no match");
                std::process::exit(2);
            }
        }
        "parse" => {
            if args.len() < 4 {
                eprintln!("Usage: mqtt-pa parse <type> <payload> [field-type]");
                std::process::exit(1);
            }
            let value_type = ValueType::from_name(&args[2], args.get(4).map(String::as_str))
                .context("Unknown value type")?;
            let value = value_type
                .parse_payload(&args[3])
                .with_context(|| format!("Payload is not a valid {value_type}"))?;
            println!("{value}");
        }
        "help" | "--help" | "-h" => {
            print_help();
        }
        cmd => {
            eprintln!("Unknown command: {cmd}");
            print_help();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn load(path: &str) -> Result<MqttPhysicalAdapterConfiguration> {
    MqttPhysicalAdapterConfiguration::builder_from_file(Path::new(path))
        .and_then(mqtt_pa_adapter::MqttPhysicalAdapterConfigurationBuilder::build)
        .with_context(|| format!("Invalid adapter configuration {path}"))
}

fn print_summary(configuration: &MqttPhysicalAdapterConfiguration) {
    let description = configuration.physical_asset_description();
    println!("broker:     {}", configuration.broker_connection_string());
    println!("client id:  {}", configuration.client_id());
    println!(
        "assets:     {} properties, {} actions, {} events",
        description.properties.len(),
        description.actions.len(),
        description.events.len()
    );

    for incoming in configuration.incoming_topics() {
        println!("  <- {} ({})", incoming.topic(), incoming.qos());
    }

    let mut outgoing: Vec<_> = configuration.outgoing_topics().iter().collect();
    outgoing.sort_by(|a, b| a.0.cmp(b.0));
    for (action_key, topic) in outgoing {
        println!("  -> {} ({}) for {action_key}", topic.topic(), topic.qos());
    }
}

fn print_help() {
    println!(
        r#"MQTT Physical Adapter CLI

USAGE:
    mqtt-pa <COMMAND> [OPTIONS]

COMMANDS:
    validate <file>                        Check a YAML adapter configuration
    describe <file>                        Print the physical asset description as JSON
    match <filter> <topic>                 Test whether a topic filter matches a topic
    parse <type> <payload> [field-type]    Convert a payload as the adapter would
    help                                   Show this help message

EXAMPLES:
    mqtt-pa validate ./mqtt-pa.yaml
    mqtt-pa match "sensors/+/temperature" "sensors/kitchen/temperature"
    mqtt-pa parse json-array "[1, \"2\"]" int
"#
    );
}
