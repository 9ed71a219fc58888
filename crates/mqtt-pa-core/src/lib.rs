//! # MQTT Physical Adapter Core
//!
//! Host-facing model shared by the adapter runtime and any digital-twin host.
//!
//! This crate provides:
//! - The physical asset description (properties, actions, events)
//! - Typed payload values and their conversion from MQTT payloads
//! - Notifications flowing from the adapter to the host, and action requests
//!   flowing back
//! - A shadow state the host can fold notifications into

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod description;
pub mod notification;
pub mod state;
pub mod value;

pub use description::{
    PhysicalAssetAction, PhysicalAssetDescription, PhysicalAssetEvent, PhysicalAssetProperty,
};
pub use notification::{PhysicalActionRequest, PhysicalAssetNotification};
pub use state::ShadowState;
pub use value::{PayloadError, ValueType};
