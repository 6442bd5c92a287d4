//! Wire format encoding and decoding.
//!
//! Every node is framed the same way:
//! ```text
//! ┌──────────────┬────────────┬──────────────────────┐
//! │ Content code │ Length     │ Value                │
//! │ 4 bytes ASCII│ 4 bytes BE │ `length` bytes       │
//! └──────────────┴────────────┴──────────────────────┘
//! ```
//! Numbers are big-endian, strings are raw UTF-8, and containers are the
//! concatenation of their encoded children. Decoding is a recursive
//! single-container read driven by the [`FieldRegistry`]: the registry's
//! declared type decides a leaf's width and shape, never the wire length.
//!
//! An unrecognized content code does not abort the parse. Its value is
//! kept as an opaque blob spanning exactly the declared length, so one
//! unknown sibling never corrupts the fields around it. This is the
//! forward-compatibility rule the whole protocol family relies on.

use crate::error::{DmapError, Result};
use crate::registry::{FieldKind, FieldRegistry};

use super::node::{ContentCode, Node, Value};

/// Size of the code + length header preceding every node.
pub const NODE_HEADER_SIZE: usize = 8;

/// Encode a node tree into a fresh byte vector.
pub fn encode(node: &Node) -> Vec<u8> {
    let mut out = Vec::with_capacity(node.encoded_len());
    encode_into(node, &mut out);
    out
}

/// Encode a node tree, appending to an existing buffer.
pub fn encode_into(node: &Node, out: &mut Vec<u8>) {
    out.extend_from_slice(&node.code.0);
    out.extend_from_slice(&(node.value.encoded_len() as u32).to_be_bytes());
    encode_value(&node.value, out);
}

fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::I8(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::U8(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::I16(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::U16(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::I32(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::U32(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::I64(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::U64(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::F64(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::Str(s) => out.extend_from_slice(s.as_bytes()),
        Value::Blob(b) => out.extend_from_slice(b),
        Value::Container(children) => {
            for child in children {
                encode_into(child, out);
            }
        }
    }
}

/// Decode a single node tree from a buffer.
///
/// The buffer must contain exactly one top-level node; trailing garbage
/// is a protocol error.
///
/// # Errors
///
/// - [`DmapError::EmptyInput`] for a zero-length buffer
/// - [`DmapError::TruncatedInput`] when a declared length exceeds the
///   remaining bytes
/// - [`DmapError::MalformedLength`] when a fixed-width numeric field's
///   wire length disagrees with its registered width
pub fn decode(buf: &[u8], registry: &FieldRegistry) -> Result<Node> {
    if buf.is_empty() {
        return Err(DmapError::EmptyInput);
    }

    let mut cursor = buf;
    let node = decode_one(&mut cursor, registry)?;

    if !cursor.is_empty() {
        return Err(DmapError::Protocol(format!(
            "{} trailing bytes after top-level node",
            cursor.len()
        )));
    }

    Ok(node)
}

/// Read one node from the front of `cursor`, advancing it.
fn decode_one(cursor: &mut &[u8], registry: &FieldRegistry) -> Result<Node> {
    if cursor.len() < NODE_HEADER_SIZE {
        return Err(DmapError::TruncatedInput {
            declared: NODE_HEADER_SIZE,
            remaining: cursor.len(),
        });
    }

    let code = ContentCode([cursor[0], cursor[1], cursor[2], cursor[3]]);
    let declared = u32::from_be_bytes([cursor[4], cursor[5], cursor[6], cursor[7]]) as usize;
    let rest = &cursor[NODE_HEADER_SIZE..];

    if declared > rest.len() {
        return Err(DmapError::TruncatedInput {
            declared,
            remaining: rest.len(),
        });
    }

    let raw = &rest[..declared];
    *cursor = &rest[declared..];

    let value = match registry.lookup_code(code) {
        Some(def) => decode_value(code, def.kind, raw, registry)?,
        // Unknown code: keep the raw bytes, never abort the parse.
        None => {
            tracing::debug!(code = %code, len = declared, "unknown content code, keeping opaque");
            Value::Blob(raw.to_vec())
        }
    };

    Ok(Node::new(code, value))
}

fn decode_value(
    code: ContentCode,
    kind: FieldKind,
    raw: &[u8],
    registry: &FieldRegistry,
) -> Result<Value> {
    // Fixed-width leaves check the wire length against the registered
    // width; variable-length shapes never do.
    if let Some(expected) = kind.width() {
        if raw.len() != expected {
            return Err(DmapError::MalformedLength {
                code,
                expected,
                actual: raw.len(),
            });
        }
    }

    Ok(match kind {
        FieldKind::I8 => Value::I8(raw[0] as i8),
        FieldKind::U8 => Value::U8(raw[0]),
        FieldKind::I16 => Value::I16(i16::from_be_bytes([raw[0], raw[1]])),
        FieldKind::U16 => Value::U16(u16::from_be_bytes([raw[0], raw[1]])),
        FieldKind::I32 => Value::I32(i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]])),
        FieldKind::U32 | FieldKind::Date | FieldKind::Version => {
            Value::U32(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
        }
        FieldKind::I64 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(raw);
            Value::I64(i64::from_be_bytes(b))
        }
        FieldKind::U64 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(raw);
            Value::U64(u64::from_be_bytes(b))
        }
        FieldKind::F64 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(raw);
            Value::F64(f64::from_be_bytes(b))
        }
        // Real peers occasionally emit mis-encoded tags; display is
        // best-effort, so string decoding is lossy rather than fatal.
        FieldKind::Str => Value::Str(String::from_utf8_lossy(raw).into_owned()),
        FieldKind::Blob => Value::Blob(raw.to_vec()),
        FieldKind::Container => {
            let mut children = Vec::new();
            let mut cursor = raw;
            while !cursor.is_empty() {
                children.push(decode_one(&mut cursor, registry)?);
            }
            Value::Container(children)
        }
    })
}
