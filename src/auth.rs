//! Request validation hashing.
//!
//! Every request after the initial server-info exchange carries a
//! `Client-DMAP-Validation` header: a 32-hex-character token derived
//! from the protocol major version, the request path, and a
//! per-connection request counter. Two schemes exist, selected by
//! `floor(version)`:
//!
//! - version < 3: `md5(seed_v2 ++ path ++ counter)`
//! - version >= 3: `md5(seed_v3 ++ path ++ counter ++ appendix[counter % 4])`
//!
//! Both lowercase-hex the digest. The schemes are pinned independently
//! by fixture; they share no derivation beyond the shape above.
//!
//! This is byte-for-byte compatibility obfuscation, not a cryptographic
//! secret scheme - the exact message layout matters, the algorithmic
//! strength does not.
//!
//! # Example
//!
//! ```
//! use dmap_share::auth::{compute, verify};
//!
//! let token = compute(2.0, "/databases/1/items", 3);
//! assert_eq!(token.len(), 32);
//! assert!(verify(2.0, "/databases/1/items", 3, &token).is_ok());
//! ```

use md5::{Digest, Md5};

use crate::error::{DmapError, Result};

/// Seed string for the legacy (< 3.0) scheme.
const SEED_V2: &str = "dmap-validation-seed-v2";

/// Seed string for the >= 3.0 scheme.
const SEED_V3: &str = "dmap-validation-seed-v3";

/// Appendix table for the >= 3.0 scheme, indexed by `counter % 4`.
const APPENDIX: [&str; 4] = ["f8b70bd3", "4d81a3c2", "90c6ba1e", "2ed7055a"];

/// First counter value used on a connection. The initial server-info
/// exchange is request 1 and carries no token at all.
pub const REQUEST_COUNTER_START: u32 = 2;

/// Compute the validation token for a request.
///
/// # Arguments
///
/// * `version` - protocol version; `floor(version)` selects the scheme
/// * `path` - request path, normalized before hashing (see [`normalize_path`])
/// * `request_counter` - per-connection counter, decimal in the message
pub fn compute(version: f32, path: &str, request_counter: u32) -> String {
    let path = normalize_path(path);
    let mut hasher = Md5::new();

    if version.floor() < 3.0 {
        hasher.update(SEED_V2.as_bytes());
        hasher.update(path.as_bytes());
        hasher.update(request_counter.to_string().as_bytes());
    } else {
        hasher.update(SEED_V3.as_bytes());
        hasher.update(path.as_bytes());
        hasher.update(request_counter.to_string().as_bytes());
        hasher.update(APPENDIX[(request_counter % 4) as usize].as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

/// Recompute the token server-side and compare.
///
/// # Errors
///
/// [`DmapError::AuthenticationFailed`] on mismatch. Comparison ignores
/// ASCII case since some clients send uppercase hex.
pub fn verify(version: f32, path: &str, request_counter: u32, token: &str) -> Result<()> {
    let expected = compute(version, path, request_counter);
    if expected.eq_ignore_ascii_case(token) {
        Ok(())
    } else {
        tracing::warn!(path, request_counter, "validation token mismatch");
        Err(DmapError::AuthenticationFailed)
    }
}

/// Normalize a request path before hashing.
///
/// Clients sometimes hash the full request URI. When the path carries a
/// URI scheme prefix, everything through the literal `"/data"` substring
/// is stripped; a plain path passes through unchanged.
pub fn normalize_path(path: &str) -> &str {
    if path.contains("://") {
        if let Some(idx) = path.find("/data") {
            return &path[idx + "/data".len()..];
        }
    }
    path
}

/// Per-connection request counter.
///
/// Starts at [`REQUEST_COUNTER_START`] and increments by one per
/// subsequent request. The first (server-info) request is counted but
/// never tokenized, so the counter begins past it.
#[derive(Debug, Clone)]
pub struct RequestCounter(u32);

impl RequestCounter {
    /// Create a counter positioned at the first tokenized request.
    pub fn new() -> Self {
        Self(REQUEST_COUNTER_START)
    }

    /// Current value without advancing.
    #[inline]
    pub fn peek(&self) -> u32 {
        self.0
    }

    /// Take the current value and advance by one.
    pub fn next(&mut self) -> u32 {
        let v = self.0;
        self.0 += 1;
        v
    }
}

impl Default for RequestCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Pinned fixtures. These lock the byte layout of both schemes;
    // any change to seeds, appendix table, or concatenation order
    // breaks wire compatibility and must fail here first.

    #[test]
    fn test_v2_pinned_fixture() {
        assert_eq!(
            compute(2.0, "/databases/1/items", 3),
            "171367ac3d9bb19304cf3a57461d64ef"
        );
        assert_eq!(compute(2.0, "/update", 2), "6f5b1bd364d15927792780da9c3e2054");
        assert_eq!(
            compute(2.0, "/server-info", 2),
            "4d60057d9f2717e1633662687dae50e8"
        );
    }

    #[test]
    fn test_v3_pinned_fixture() {
        assert_eq!(
            compute(3.0, "/databases/1/items", 3),
            "73586bad85fe971185fc68ad22a9c757"
        );
        // counter 7 selects appendix slot 3
        assert_eq!(
            compute(3.0, "/databases/1/items", 7),
            "54ace0c08e6abc82f813ad68201e2c8d"
        );
        assert_eq!(compute(3.2, "/login", 2), "9c04f66aa5d227e3922a5d8c8a6fbc95");
    }

    #[test]
    fn test_schemes_differ() {
        assert_ne!(
            compute(2.0, "/databases/1/items", 3),
            compute(3.0, "/databases/1/items", 3)
        );
    }

    #[test]
    fn test_compute_is_pure() {
        let a = compute(2.0, "/databases/1/items", 3);
        let b = compute(2.0, "/databases/1/items", 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_counter_changes_token() {
        assert_ne!(compute(2.0, "/update", 2), compute(2.0, "/update", 3));
    }

    #[test]
    fn test_fractional_version_uses_floor() {
        assert_eq!(
            compute(2.0, "/databases/1/items", 3),
            compute(2.6, "/databases/1/items", 3)
        );
        assert_eq!(
            compute(3.0, "/databases/1/items", 3),
            compute(3.2, "/databases/1/items", 3)
        );
    }

    #[test]
    fn test_normalize_full_uri() {
        assert_eq!(
            normalize_path("daap://192.168.1.20:3689/data/databases/1/items"),
            "/databases/1/items"
        );
        // Full URI hashes to the same token as the bare path.
        assert_eq!(
            compute(2.0, "daap://192.168.1.20:3689/data/databases/1/items", 3),
            compute(2.0, "/databases/1/items", 3)
        );
    }

    #[test]
    fn test_normalize_plain_path_untouched() {
        assert_eq!(normalize_path("/databases/1/items"), "/databases/1/items");
        assert_eq!(normalize_path("/update"), "/update");
    }

    #[test]
    fn test_normalize_uri_without_data_marker() {
        let uri = "http://host/other/path";
        assert_eq!(normalize_path(uri), uri);
    }

    #[test]
    fn test_verify_accepts_and_rejects() {
        let token = compute(3.0, "/login", 5);
        assert!(verify(3.0, "/login", 5, &token).is_ok());
        assert!(verify(3.0, "/login", 5, &token.to_uppercase()).is_ok());

        assert!(matches!(
            verify(3.0, "/login", 6, &token),
            Err(DmapError::AuthenticationFailed)
        ));
        assert!(matches!(
            verify(2.0, "/login", 5, &token),
            Err(DmapError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_request_counter_sequence() {
        let mut counter = RequestCounter::new();
        assert_eq!(counter.peek(), REQUEST_COUNTER_START);
        assert_eq!(counter.next(), 2);
        assert_eq!(counter.next(), 3);
        assert_eq!(counter.next(), 4);
        assert_eq!(counter.peek(), 5);
    }
}
