//! Meta negotiation - the requested-field bitmask.
//!
//! Clients pass a `meta` query argument listing the fully-qualified
//! fields they want in a listing response, for example
//! `meta=dmap.itemid,dmap.itemname,daap.songalbum`. The negotiator
//! resolves each name through the [`FieldRegistry`] and sets the bit of
//! the matching field id. The literal `"all"` sets every registered
//! bit. Unknown names are silently ignored - no bit, no error - so a
//! newer client asking for fields this server has never heard of still
//! gets everything it can be given.
//!
//! The mask is built once per request and read-only afterwards.
//!
//! # Example
//!
//! ```
//! use dmap_share::meta::MetaMask;
//! use dmap_share::registry::{FieldRegistry, Protocol};
//!
//! let reg = FieldRegistry::for_protocol(Protocol::Music);
//! let mask = MetaMask::parse("dmap.itemid,daap.songalbum", reg);
//!
//! let itemid = reg.lookup_name("dmap.itemid").unwrap().id;
//! assert!(mask.is_requested(itemid));
//! assert_eq!(mask.count(), 2);
//! ```

use crate::registry::FieldRegistry;

/// Field names included when a client sends no `meta` argument at all.
/// Legacy behavior: enough to render a bare listing.
const DEFAULT_META: [&str; 3] = ["dmap.itemid", "dmap.itemname", "dmap.itemkind"];

/// Read-only field-selection mask; bit *i* requests field id *i*.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaMask(u64);

impl MetaMask {
    /// Parse a `meta` query argument against a registry.
    ///
    /// Never fails: unknown names are skipped, `"all"` selects every
    /// registered field, and whitespace around names is tolerated.
    pub fn parse(meta_param: &str, registry: &FieldRegistry) -> Self {
        let trimmed = meta_param.trim();

        if trimmed == "all" {
            return Self::all(registry);
        }

        let mut bits = 0u64;
        for name in trimmed.split(',') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            match registry.lookup_name(name) {
                Some(def) => bits |= 1 << def.id,
                None => tracing::debug!(name, "ignoring unknown meta field"),
            }
        }
        Self(bits)
    }

    /// The mask for a request that carried no `meta` argument.
    pub fn default_set(registry: &FieldRegistry) -> Self {
        let mut bits = 0u64;
        for name in DEFAULT_META {
            if let Some(def) = registry.lookup_name(name) {
                bits |= 1 << def.id;
            }
        }
        Self(bits)
    }

    /// A mask with every registered field set.
    pub fn all(registry: &FieldRegistry) -> Self {
        let len = registry.len();
        if len >= 64 {
            Self(u64::MAX)
        } else {
            Self((1u64 << len) - 1)
        }
    }

    /// Whether the given field id was requested.
    #[inline]
    pub fn is_requested(&self, field_id: u16) -> bool {
        field_id < 64 && self.0 & (1 << field_id) != 0
    }

    /// Number of requested fields.
    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Whether no field was requested.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Protocol;

    fn music() -> &'static FieldRegistry {
        FieldRegistry::for_protocol(Protocol::Music)
    }

    fn id_of(name: &str) -> u16 {
        music().lookup_name(name).unwrap().id
    }

    #[test]
    fn test_parse_sets_exactly_named_bits() {
        let mask = MetaMask::parse("dmap.itemid,daap.songalbum", music());

        assert!(mask.is_requested(id_of("dmap.itemid")));
        assert!(mask.is_requested(id_of("daap.songalbum")));
        assert!(!mask.is_requested(id_of("dmap.itemname")));
        assert_eq!(mask.count(), 2);
    }

    #[test]
    fn test_parse_all_sets_every_bit() {
        let mask = MetaMask::parse("all", music());
        assert_eq!(mask.count() as usize, music().len());
        for def in music().defs() {
            assert!(mask.is_requested(def.id));
        }
    }

    #[test]
    fn test_unknown_names_silently_ignored() {
        let mask = MetaMask::parse("dmap.bogus", music());
        assert!(mask.is_empty());

        let mask = MetaMask::parse("dmap.bogus,dmap.itemid", music());
        assert_eq!(mask.count(), 1);
        assert!(mask.is_requested(id_of("dmap.itemid")));
    }

    #[test]
    fn test_parse_tolerates_whitespace_and_empties() {
        let mask = MetaMask::parse(" dmap.itemid , ,daap.songalbum,", music());
        assert_eq!(mask.count(), 2);
    }

    #[test]
    fn test_default_set() {
        let mask = MetaMask::default_set(music());
        assert!(mask.is_requested(id_of("dmap.itemid")));
        assert!(mask.is_requested(id_of("dmap.itemname")));
        assert!(mask.is_requested(id_of("dmap.itemkind")));
        assert_eq!(mask.count(), 3);
    }

    #[test]
    fn test_out_of_range_id_never_requested() {
        let mask = MetaMask::parse("all", music());
        assert!(!mask.is_requested(64));
        assert!(!mask.is_requested(u16::MAX));
    }

    #[test]
    fn test_masks_are_per_variant() {
        let photo = FieldRegistry::for_protocol(Protocol::Photo);
        let mask = MetaMask::parse("dpap.imagefilename", photo);
        assert_eq!(mask.count(), 1);

        // Same string against the music table resolves nothing.
        let mask = MetaMask::parse("dpap.imagefilename", music());
        assert!(mask.is_empty());
    }
}
