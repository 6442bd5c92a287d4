//! # dmap-share
//!
//! Protocol core for the legacy DMAP home-media-sharing family (music,
//! photo, and remote-control variants).
//!
//! The crate covers everything between the HTTP surface and the media
//! catalog: the tagged binary container codec, the per-variant field
//! registries, the request-validation hashing, meta-field negotiation,
//! the catalog filter grammar, session and revision tracking with
//! long-poll update waits, response assembly, and a client-role request
//! driver. Transport (HTTP/TLS), service discovery, and media decoding
//! live outside this crate.
//!
//! ## Architecture
//!
//! - **Server role**: parse the query arguments ([`meta`], [`filter`]),
//!   validate the token ([`auth`]), then hand catalog + session state to
//!   the [`assembler`], which returns the response tree to encode.
//! - **Client role**: the [`driver`] walks the ordered request sequence
//!   over an [`driver::Exchange`] transport and decodes replies into
//!   typed records.
//!
//! ## Example
//!
//! ```
//! use dmap_share::assembler;
//! use dmap_share::codec::{decode, encode};
//! use dmap_share::config::ShareConfig;
//! use dmap_share::registry::{FieldRegistry, Protocol};
//!
//! let config = ShareConfig::default();
//! let registry = FieldRegistry::for_protocol(Protocol::Music);
//!
//! let reply = assembler::server_info(&config);
//! let bytes = encode(&reply);
//! assert_eq!(decode(&bytes, registry).unwrap(), reply);
//! ```

pub mod assembler;
pub mod auth;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod filter;
pub mod meta;
pub mod registry;
pub mod session;

pub use error::{DmapError, Result};
pub use registry::{FieldRegistry, Protocol};
pub use session::SessionManager;
