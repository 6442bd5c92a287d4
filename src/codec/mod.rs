//! Container codec - the tagged binary format shared by all protocol variants.
//!
//! This module provides the self-describing nested container format the
//! protocol family carries over HTTP bodies:
//!
//! - [`Node`] / [`Value`] / [`ContentCode`] - the owned wire tree
//! - [`encode`] / [`decode`] - big-endian tag/length/value framing
//!
//! # Design
//!
//! Encoding is pure and infallible; lengths are computed from the tree,
//! so a node's declared length always equals its encoded size. Decoding
//! is driven by a [`FieldRegistry`](crate::registry::FieldRegistry):
//! registered types decide leaf widths, and unknown content codes are
//! preserved as opaque leaves rather than failing the parse.
//!
//! # Example
//!
//! ```
//! use dmap_share::codec::{decode, encode, Node};
//! use dmap_share::registry::{codes, FieldRegistry, Protocol};
//!
//! let node = Node::container(
//!     codes::MLOG,
//!     vec![Node::u32(codes::MSTT, 200), Node::u32(codes::MLID, 7)],
//! );
//!
//! let registry = FieldRegistry::for_protocol(Protocol::Music);
//! let bytes = encode(&node);
//! assert_eq!(decode(&bytes, registry).unwrap(), node);
//! ```

mod node;
mod wire;

pub use node::{ContentCode, Node, Value};
pub use wire::{decode, encode, encode_into, NODE_HEADER_SIZE};
