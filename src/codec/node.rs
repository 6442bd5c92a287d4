//! The wire tree: content codes, leaf values, and nodes.
//!
//! Every value exchanged on the wire is a [`Node`]: a 4-character
//! [`ContentCode`] paired with a [`Value`]. A value is either a leaf
//! (big-endian integer, IEEE double, UTF-8 string, or opaque blob) or a
//! container holding an ordered child sequence. The format is strictly
//! tree-shaped, so an owned recursive enum is all that is needed.
//!
//! # Example
//!
//! ```
//! use dmap_share::codec::{ContentCode, Node, Value};
//!
//! let login = Node::container(
//!     ContentCode(*b"mlog"),
//!     vec![
//!         Node::u32(ContentCode(*b"mstt"), 200),
//!         Node::u32(ContentCode(*b"mlid"), 0xDEADBEEF),
//!     ],
//! );
//!
//! assert_eq!(login.child(ContentCode(*b"mlid")).unwrap().value.as_u32(), Some(0xDEADBEEF));
//! ```

use std::fmt;

/// A 4-character ASCII tag identifying a node's semantic field.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentCode(pub [u8; 4]);

impl ContentCode {
    /// Construct from a 4-byte literal.
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// The code as a big-endian u32 (the representation used by the
    /// content-codes listing).
    #[inline]
    pub fn as_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// The raw 4 bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for ContentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ContentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentCode({})", self)
    }
}

/// A node's payload: a typed leaf or an ordered child sequence.
///
/// Unknown content codes decode to `Blob`, preserving the raw
/// length-framed bytes so one unrecognized sibling never corrupts its
/// neighbors.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    Blob(Vec<u8>),
    Container(Vec<Node>),
}

impl Value {
    /// Exact encoded size of this value in bytes (excluding the 8-byte
    /// code + length header of the node that carries it).
    pub fn encoded_len(&self) -> usize {
        match self {
            Value::I8(_) | Value::U8(_) => 1,
            Value::I16(_) | Value::U16(_) => 2,
            Value::I32(_) | Value::U32(_) => 4,
            Value::I64(_) | Value::U64(_) | Value::F64(_) => 8,
            Value::Str(s) => s.len(),
            Value::Blob(b) => b.len(),
            Value::Container(children) => children.iter().map(Node::encoded_len).sum(),
        }
    }

    /// Get as u32 if this is an unsigned leaf that fits.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U8(v) => Some(u32::from(*v)),
            Value::U16(v) => Some(u32::from(*v)),
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as u64 if this is an unsigned leaf.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(v) => Some(u64::from(*v)),
            Value::U16(v) => Some(u64::from(*v)),
            Value::U32(v) => Some(u64::from(*v)),
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string slice if this is a string leaf.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the child sequence if this is a container.
    pub fn as_container(&self) -> Option<&[Node]> {
        match self {
            Value::Container(children) => Some(children),
            _ => None,
        }
    }
}

/// A complete wire tree node: content code plus value.
///
/// Invariant: the length written on the wire always equals
/// [`Value::encoded_len`]; encoding computes it, decoding checks it.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Semantic tag for this node.
    pub code: ContentCode,
    /// Leaf value or child sequence.
    pub value: Value,
}

impl Node {
    /// Create a node from parts.
    pub fn new(code: ContentCode, value: Value) -> Self {
        Self { code, value }
    }

    /// Unsigned 8-bit leaf.
    pub fn u8(code: ContentCode, v: u8) -> Self {
        Self::new(code, Value::U8(v))
    }

    /// Unsigned 16-bit leaf.
    pub fn u16(code: ContentCode, v: u16) -> Self {
        Self::new(code, Value::U16(v))
    }

    /// Unsigned 32-bit leaf.
    pub fn u32(code: ContentCode, v: u32) -> Self {
        Self::new(code, Value::U32(v))
    }

    /// Unsigned 64-bit leaf.
    pub fn u64(code: ContentCode, v: u64) -> Self {
        Self::new(code, Value::U64(v))
    }

    /// IEEE double leaf.
    pub fn f64(code: ContentCode, v: f64) -> Self {
        Self::new(code, Value::F64(v))
    }

    /// UTF-8 string leaf.
    pub fn string(code: ContentCode, s: impl Into<String>) -> Self {
        Self::new(code, Value::Str(s.into()))
    }

    /// Opaque blob leaf.
    pub fn blob(code: ContentCode, bytes: Vec<u8>) -> Self {
        Self::new(code, Value::Blob(bytes))
    }

    /// Internal node with an ordered child sequence.
    pub fn container(code: ContentCode, children: Vec<Node>) -> Self {
        Self::new(code, Value::Container(children))
    }

    /// Total encoded size of this node including its 8-byte header.
    pub fn encoded_len(&self) -> usize {
        8 + self.value.encoded_len()
    }

    /// Find the first direct child with the given code.
    pub fn child(&self, code: ContentCode) -> Option<&Node> {
        self.value
            .as_container()
            .and_then(|children| children.iter().find(|c| c.code == code))
    }

    /// All direct children with the given code, in order.
    pub fn children(&self, code: ContentCode) -> Vec<&Node> {
        self.value
            .as_container()
            .map(|children| children.iter().filter(|c| c.code == code).collect())
            .unwrap_or_default()
    }
}
