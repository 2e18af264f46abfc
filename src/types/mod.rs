//! Core data types: configuration, service records, and pairing credentials.

mod config;
mod credentials;
mod device;

pub use config::{AirPlayConfig, AirPlayConfigBuilder};
pub use credentials::{Credentials, LoginId};
pub use device::{DeviceConfig, ProtocolKind, ServiceRecord};
