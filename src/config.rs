//! Share configuration.
//!
//! Everything the protocol material references but never fixes
//! numerically lives here: the advertised share name, protocol
//! versions, the login-required flag, and the session/update timeouts.
//! Configuration loads from JSON, the same control-plane format the
//! rest of the stack speaks.
//!
//! # Example
//!
//! ```
//! use dmap_share::config::ShareConfig;
//!
//! let config = ShareConfig::from_json(
//!     r#"{ "share-name": "Kitchen Music", "login-required": true }"#,
//! ).unwrap();
//! assert_eq!(config.share_name, "Kitchen Music");
//! assert!(config.login_required);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::registry::Protocol;

/// A packed protocol version as carried in version-typed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
}

impl ProtocolVersion {
    /// Construct from parts.
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Wire form: major in the high 16 bits, minor in the low.
    pub fn as_u32(&self) -> u32 {
        (u32::from(self.major) << 16) | u32::from(self.minor)
    }

    /// Decode the wire form.
    pub fn from_u32(v: u32) -> Self {
        Self {
            major: (v >> 16) as u16,
            minor: (v & 0xFFFF) as u16,
        }
    }

    /// The version as the fractional number the hash scheme selector
    /// expects (e.g. 3.2).
    pub fn as_f32(&self) -> f32 {
        f32::from(self.major) + f32::from(self.minor) / 10.0
    }
}

/// Configuration for one published share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ShareConfig {
    /// Display name advertised to clients.
    pub share_name: String,
    /// Which protocol variant this share speaks.
    pub protocol: Protocol,
    /// Base protocol version (the `dmap.protocolversion` field).
    pub dmap_version: ProtocolVersion,
    /// Variant protocol version; also selects the hash scheme.
    pub variant_version: ProtocolVersion,
    /// Whether clients must log in before browsing.
    pub login_required: bool,
    /// Idle seconds before housekeeping expires a session.
    pub session_timeout_secs: u64,
    /// Maximum seconds an update request is held open.
    pub update_timeout_secs: u64,
    /// Number of databases the share exposes.
    pub database_count: u32,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            share_name: "Media Share".to_string(),
            protocol: Protocol::Music,
            dmap_version: ProtocolVersion::new(2, 0),
            variant_version: ProtocolVersion::new(3, 2),
            login_required: false,
            session_timeout_secs: 1800,
            update_timeout_secs: 60,
            database_count: 1,
        }
    }
}

impl ShareConfig {
    /// Load from a JSON document. Missing keys take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Session idle timeout as a [`Duration`].
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// Long-poll cap as a [`Duration`].
    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.update_timeout_secs)
    }
}
