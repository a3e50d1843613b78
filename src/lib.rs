//! Symantec/GeoTrust certificate authority plugin.
//!
//! [`plugin::SymantecPlugin`] drives an order through issue, reissue, cancel
//! and status checks against any [`ca::CertificateAuthority`]; the bundled
//! [`ca::SoapClient`] talks to the vendor's SOAP API.

pub mod ca;
pub mod certificate;
pub mod config;
pub mod plugin;
pub mod storage;

pub use ca::{CaError, CertificateAuthority, SoapClient};
pub use config::{ConfigError, PluginConfig};
pub use plugin::{CertificatePlugin, CertificateStatus, ResultDto, SymantecPlugin};
