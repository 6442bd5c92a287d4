//! Catalog filter - query predicate parsing and evaluation.
//!
//! The `filter=` query argument carries an AND of OR-groups:
//!
//! ```text
//! filter    := group ('+' group)*
//! group     := term (',' term)*
//! term      := "'" content "'"        (\' unescapes to ' inside)
//! content   := name ':' literal | digits
//! ```
//!
//! A record is accepted iff every group has at least one satisfied
//! term. A bare all-digit term with no field prefix means "record id
//! equals" and short-circuits to a point lookup when it stands alone.
//!
//! Malformed filter strings degrade to "no filter" (match everything)
//! rather than failing the request - legacy clients expect best-effort
//! browsing, never a filter syntax error.
//!
//! # Example
//!
//! ```
//! use dmap_share::catalog::{MediaKind, MemoryCatalog, Record};
//! use dmap_share::codec::Value;
//! use dmap_share::filter::Predicate;
//! use dmap_share::registry::{FieldRegistry, Protocol};
//!
//! let reg = FieldRegistry::for_protocol(Protocol::Music);
//! let album = reg.lookup_name("daap.songalbum").unwrap().id;
//!
//! let catalog = MemoryCatalog::new();
//! catalog.insert(Record::new(1, MediaKind::Music).with_field(album, Value::Str("a".into())));
//!
//! let predicate = Predicate::parse("'daap.songalbum:a'", reg);
//! assert_eq!(predicate.evaluate(&catalog), vec![1]);
//! ```

use crate::catalog::{Catalog, MediaKind, Record};
use crate::codec::Value;
use crate::registry::FieldRegistry;

/// One equality test inside a group.
#[derive(Debug, Clone, PartialEq)]
enum Term {
    /// `name:literal` equality. A name unknown to the registry keeps
    /// the term around but it can never match.
    Field { field_id: Option<u16>, literal: String },
    /// Bare all-digit term: direct record-id equality.
    Id(u64),
    /// Implicit media-kind restriction from the `type=` argument.
    Kind(MediaKind),
}

impl Term {
    fn matches(&self, record: &Record) -> bool {
        match self {
            Term::Id(id) => record.id == *id,
            Term::Kind(kind) => record.kind == *kind,
            Term::Field {
                field_id: Some(id),
                literal,
            } => record
                .field(*id)
                .map(|v| value_matches(v, literal))
                .unwrap_or(false),
            Term::Field { field_id: None, .. } => false,
        }
    }
}

fn value_matches(value: &Value, literal: &str) -> bool {
    match value {
        Value::Str(s) => s == literal,
        Value::I8(v) => literal.parse().map_or(false, |l: i8| l == *v),
        Value::U8(v) => literal.parse().map_or(false, |l: u8| l == *v),
        Value::I16(v) => literal.parse().map_or(false, |l: i16| l == *v),
        Value::U16(v) => literal.parse().map_or(false, |l: u16| l == *v),
        Value::I32(v) => literal.parse().map_or(false, |l: i32| l == *v),
        Value::U32(v) => literal.parse().map_or(false, |l: u32| l == *v),
        Value::I64(v) => literal.parse().map_or(false, |l: i64| l == *v),
        Value::U64(v) => literal.parse().map_or(false, |l: u64| l == *v),
        Value::F64(v) => literal.parse().map_or(false, |l: f64| l == *v),
        Value::Blob(_) | Value::Container(_) => false,
    }
}

/// Parsed filter: AND of OR-groups. Empty means "match everything".
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    groups: Vec<Vec<Term>>,
}

impl Predicate {
    /// The always-true predicate (absent or malformed filter).
    pub fn all() -> Self {
        Self { groups: Vec::new() }
    }

    /// Parse a filter string against a registry.
    ///
    /// Never fails: syntax errors degrade to [`Predicate::all`].
    pub fn parse(filter: &str, registry: &FieldRegistry) -> Self {
        let trimmed = filter.trim();
        if trimmed.is_empty() {
            return Self::all();
        }

        match parse_groups(trimmed, registry) {
            Some(groups) => Self { groups },
            None => {
                tracing::warn!(filter = trimmed, "malformed filter, browsing unfiltered");
                Self::all()
            }
        }
    }

    /// Add the implicit media-kind group from a `type=` argument.
    pub fn with_kind(mut self, kind: MediaKind) -> Self {
        self.groups.push(vec![Term::Kind(kind)]);
        self
    }

    /// Whether this predicate matches everything.
    pub fn matches_all(&self) -> bool {
        self.groups.is_empty()
    }

    /// Whether a single record satisfies the predicate.
    pub fn matches(&self, record: &Record) -> bool {
        self.groups
            .iter()
            .all(|group| group.iter().any(|term| term.matches(record)))
    }

    /// Evaluate against a catalog, returning accepted record ids.
    pub fn evaluate(&self, catalog: &dyn Catalog) -> Vec<u64> {
        if self.groups.is_empty() {
            return catalog.ids();
        }

        // A lone direct-id term is a point lookup, not a scan.
        if let [group] = self.groups.as_slice() {
            if let [Term::Id(id)] = group.as_slice() {
                return catalog.lookup(*id).map(|r| vec![r.id]).unwrap_or_default();
            }
        }

        catalog
            .ids()
            .into_iter()
            .filter_map(|id| catalog.lookup(id))
            .filter(|record| self.matches(record))
            .map(|record| record.id)
            .collect()
    }
}

/// Split into groups and terms, honoring quoting. `None` on any syntax
/// violation - the caller degrades to match-all.
fn parse_groups(filter: &str, registry: &FieldRegistry) -> Option<Vec<Vec<Term>>> {
    let mut groups = Vec::new();
    for group_src in split_outside_quotes(filter, '+')? {
        let mut terms = Vec::new();
        for term_src in split_outside_quotes(&group_src, ',')? {
            terms.push(parse_term(term_src.trim(), registry)?);
        }
        if terms.is_empty() {
            return None;
        }
        groups.push(terms);
    }
    Some(groups)
}

/// Split on `sep` wherever it appears outside single quotes. `None` on
/// an unterminated quote.
fn split_outside_quotes(s: &str, sep: char) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quote => {
                current.push(c);
                current.push(chars.next()?);
            }
            '\'' => {
                in_quote = !in_quote;
                current.push(c);
            }
            c if c == sep && !in_quote => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }

    if in_quote {
        return None;
    }
    parts.push(current);
    Some(parts)
}

/// Parse one quoted term. `None` when the quoting or shape is wrong.
fn parse_term(src: &str, registry: &FieldRegistry) -> Option<Term> {
    let inner = src.strip_prefix('\'')?.strip_suffix('\'')?;

    // Unescape \' -> ' before any comparison.
    let mut content = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            content.push(chars.next()?);
        } else {
            content.push(c);
        }
    }

    if content.is_empty() {
        return None;
    }

    if content.bytes().all(|b| b.is_ascii_digit()) {
        return content.parse().ok().map(Term::Id);
    }

    let (name, literal) = content.split_once(':')?;
    Some(Term::Field {
        field_id: registry.lookup_name(name).map(|def| def.id),
        literal: literal.to_string(),
    })
}
