//! Field registry - per-variant tables mapping content codes to fields.
//!
//! Each protocol variant (music, photo, remote control) carries its own
//! static ordered table of [`FieldDef`] entries. A table maps a
//! 4-character [`ContentCode`] to a stable internal field id, a
//! fully-qualified field name (the form clients send in the `meta`
//! query argument), and the declared wire type. Tables are immutable
//! after construction and are never merged across variants.
//!
//! The registry is what makes the codec self-describing in practice:
//! decode consults it for leaf widths, the meta negotiator resolves
//! names through it, and the `/content-codes` response dumps it so
//! unfamiliar clients can parse unknown fields generically.
//!
//! # Example
//!
//! ```
//! use dmap_share::registry::{codes, FieldRegistry, Protocol};
//!
//! let reg = FieldRegistry::for_protocol(Protocol::Music);
//! let def = reg.lookup_name("daap.songalbum").unwrap();
//! assert_eq!(def.code, codes::ASAL);
//! assert_eq!(reg.lookup_id(def.id).unwrap().name, "daap.songalbum");
//! ```

use crate::codec::ContentCode;

/// Protocol variant selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Music sharing (DAAP).
    Music,
    /// Photo sharing (DPAP).
    Photo,
    /// Remote control (DACP).
    Remote,
}

/// Declared wire type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F64,
    Str,
    /// Seconds since the epoch, 4 bytes unsigned on the wire.
    Date,
    /// Packed protocol version, 4 bytes unsigned on the wire.
    Version,
    Blob,
    Container,
}

impl FieldKind {
    /// Fixed wire width for numeric kinds; `None` for variable-length
    /// shapes (strings, blobs, containers), which accept any length.
    pub fn width(&self) -> Option<usize> {
        match self {
            FieldKind::I8 | FieldKind::U8 => Some(1),
            FieldKind::I16 | FieldKind::U16 => Some(2),
            FieldKind::I32 | FieldKind::U32 | FieldKind::Date | FieldKind::Version => Some(4),
            FieldKind::I64 | FieldKind::U64 | FieldKind::F64 => Some(8),
            FieldKind::Str | FieldKind::Blob | FieldKind::Container => None,
        }
    }

    /// Numeric type code reported by the content-codes listing.
    pub fn type_code(&self) -> u16 {
        match self {
            FieldKind::I8 => 1,
            FieldKind::U8 => 2,
            FieldKind::I16 => 3,
            FieldKind::U16 => 4,
            FieldKind::I32 => 5,
            FieldKind::U32 => 6,
            FieldKind::I64 => 7,
            FieldKind::U64 => 8,
            FieldKind::Str => 9,
            FieldKind::Date => 10,
            FieldKind::Version => 11,
            FieldKind::Container => 12,
            FieldKind::F64 => 13,
            FieldKind::Blob => 14,
        }
    }
}

/// One registered field: content code, qualified name, stable id, type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// 4-character wire tag.
    pub code: ContentCode,
    /// Fully-qualified name as used in `meta` arguments and filters.
    pub name: &'static str,
    /// Stable per-variant field identifier (bit position in a meta mask).
    pub id: u16,
    /// Declared wire type.
    pub kind: FieldKind,
}

const fn def(code: [u8; 4], name: &'static str, id: u16, kind: FieldKind) -> FieldDef {
    FieldDef {
        code: ContentCode(code),
        name,
        id,
        kind,
    }
}

/// Immutable field table for one protocol variant.
#[derive(Debug)]
pub struct FieldRegistry {
    protocol: Protocol,
    defs: &'static [FieldDef],
}

impl FieldRegistry {
    /// The static registry for a protocol variant.
    pub fn for_protocol(protocol: Protocol) -> &'static FieldRegistry {
        match protocol {
            Protocol::Music => &MUSIC,
            Protocol::Photo => &PHOTO,
            Protocol::Remote => &REMOTE,
        }
    }

    /// Which variant this table belongs to.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Look up a field by its wire tag.
    pub fn lookup_code(&self, code: ContentCode) -> Option<&FieldDef> {
        self.defs.iter().find(|d| d.code == code)
    }

    /// Look up a field by its internal id.
    pub fn lookup_id(&self, id: u16) -> Option<&FieldDef> {
        self.defs.iter().find(|d| d.id == id)
    }

    /// Look up a field by its fully-qualified name.
    pub fn lookup_name(&self, name: &str) -> Option<&FieldDef> {
        self.defs.iter().find(|d| d.name == name)
    }

    /// All field definitions in table order.
    pub fn defs(&self) -> &[FieldDef] {
        self.defs
    }

    /// Number of registered fields.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether the table is empty (never true for the built-in tables).
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Content code constants for fields the crate itself builds or reads.
pub mod codes {
    use crate::codec::ContentCode;

    pub const MSTT: ContentCode = ContentCode(*b"mstt");
    pub const MIID: ContentCode = ContentCode(*b"miid");
    pub const MINM: ContentCode = ContentCode(*b"minm");
    pub const MIKD: ContentCode = ContentCode(*b"mikd");
    pub const MPER: ContentCode = ContentCode(*b"mper");
    pub const MLCL: ContentCode = ContentCode(*b"mlcl");
    pub const MLIT: ContentCode = ContentCode(*b"mlit");
    pub const MRCO: ContentCode = ContentCode(*b"mrco");
    pub const MTCO: ContentCode = ContentCode(*b"mtco");
    pub const MUSR: ContentCode = ContentCode(*b"musr");
    pub const MUTY: ContentCode = ContentCode(*b"muty");
    pub const MUPD: ContentCode = ContentCode(*b"mupd");
    pub const MLOG: ContentCode = ContentCode(*b"mlog");
    pub const MLID: ContentCode = ContentCode(*b"mlid");
    pub const MSRV: ContentCode = ContentCode(*b"msrv");
    pub const MPRO: ContentCode = ContentCode(*b"mpro");
    pub const MSTM: ContentCode = ContentCode(*b"mstm");
    pub const MSLR: ContentCode = ContentCode(*b"mslr");
    pub const MSUP: ContentCode = ContentCode(*b"msup");
    pub const MSDC: ContentCode = ContentCode(*b"msdc");
    pub const MIMC: ContentCode = ContentCode(*b"mimc");
    pub const MCTC: ContentCode = ContentCode(*b"mctc");
    pub const MCCR: ContentCode = ContentCode(*b"mccr");
    pub const MDCL: ContentCode = ContentCode(*b"mdcl");
    pub const MCNM: ContentCode = ContentCode(*b"mcnm");
    pub const MCNA: ContentCode = ContentCode(*b"mcna");
    pub const MCTY: ContentCode = ContentCode(*b"mcty");
    pub const AVDB: ContentCode = ContentCode(*b"avdb");
    pub const ADBS: ContentCode = ContentCode(*b"adbs");
    pub const APRO: ContentCode = ContentCode(*b"apro");
    pub const PPRO: ContentCode = ContentCode(*b"ppro");
    pub const APLY: ContentCode = ContentCode(*b"aply");
    pub const APSO: ContentCode = ContentCode(*b"apso");
    pub const ABPL: ContentCode = ContentCode(*b"abpl");
    pub const ASAL: ContentCode = ContentCode(*b"asal");
    pub const ASAR: ContentCode = ContentCode(*b"asar");
    pub const ASGN: ContentCode = ContentCode(*b"asgn");
    pub const ASFM: ContentCode = ContentCode(*b"asfm");
    pub const ASTM: ContentCode = ContentCode(*b"astm");
    pub const ASSZ: ContentCode = ContentCode(*b"assz");
    pub const ASTN: ContentCode = ContentCode(*b"astn");
    pub const ASYR: ContentCode = ContentCode(*b"asyr");
}

static MUSIC_FIELDS: &[FieldDef] = &[
    def(*b"mstt", "dmap.status", 0, FieldKind::U32),
    def(*b"miid", "dmap.itemid", 1, FieldKind::U32),
    def(*b"minm", "dmap.itemname", 2, FieldKind::Str),
    def(*b"mikd", "dmap.itemkind", 3, FieldKind::U8),
    def(*b"mper", "dmap.persistentid", 4, FieldKind::U64),
    def(*b"mlcl", "dmap.listing", 5, FieldKind::Container),
    def(*b"mlit", "dmap.listingitem", 6, FieldKind::Container),
    def(*b"mrco", "dmap.returnedcount", 7, FieldKind::U32),
    def(*b"mtco", "dmap.specifiedtotalcount", 8, FieldKind::U32),
    def(*b"musr", "dmap.serverrevision", 9, FieldKind::U32),
    def(*b"muty", "dmap.updatetype", 10, FieldKind::U8),
    def(*b"mupd", "dmap.updateresponse", 11, FieldKind::Container),
    def(*b"mlog", "dmap.loginresponse", 12, FieldKind::Container),
    def(*b"mlid", "dmap.sessionid", 13, FieldKind::U32),
    def(*b"msrv", "dmap.serverinforesponse", 14, FieldKind::Container),
    def(*b"mpro", "dmap.protocolversion", 15, FieldKind::Version),
    def(*b"mstm", "dmap.timeoutinterval", 16, FieldKind::U32),
    def(*b"mslr", "dmap.loginrequired", 17, FieldKind::U8),
    def(*b"msup", "dmap.supportsupdate", 18, FieldKind::U8),
    def(*b"msdc", "dmap.databasescount", 19, FieldKind::U32),
    def(*b"mimc", "dmap.itemcount", 20, FieldKind::U32),
    def(*b"mctc", "dmap.containercount", 21, FieldKind::U32),
    def(*b"mccr", "dmap.contentcodesresponse", 22, FieldKind::Container),
    def(*b"mdcl", "dmap.dictionary", 23, FieldKind::Container),
    def(*b"mcnm", "dmap.contentcodesnumber", 24, FieldKind::U32),
    def(*b"mcna", "dmap.contentcodesname", 25, FieldKind::Str),
    def(*b"mcty", "dmap.contentcodestype", 26, FieldKind::U16),
    def(*b"avdb", "daap.serverdatabases", 27, FieldKind::Container),
    def(*b"adbs", "daap.databasesongs", 28, FieldKind::Container),
    def(*b"apro", "daap.protocolversion", 29, FieldKind::Version),
    def(*b"aply", "daap.databaseplaylists", 30, FieldKind::Container),
    def(*b"apso", "daap.playlistsongs", 31, FieldKind::Container),
    def(*b"abpl", "daap.baseplaylist", 32, FieldKind::U8),
    def(*b"asal", "daap.songalbum", 33, FieldKind::Str),
    def(*b"asar", "daap.songartist", 34, FieldKind::Str),
    def(*b"asgn", "daap.songgenre", 35, FieldKind::Str),
    def(*b"asfm", "daap.songformat", 36, FieldKind::Str),
    def(*b"astm", "daap.songtime", 37, FieldKind::U32),
    def(*b"assz", "daap.songsize", 38, FieldKind::U32),
    def(*b"astn", "daap.songtracknumber", 39, FieldKind::U16),
    def(*b"asyr", "daap.songyear", 40, FieldKind::U16),
    def(*b"asdk", "daap.songdatakind", 41, FieldKind::U8),
    def(*b"asdm", "daap.songdatemodified", 42, FieldKind::Date),
    def(*b"asbr", "daap.songbitrate", 43, FieldKind::U16),
    def(*b"ascm", "daap.songcomment", 44, FieldKind::Str),
];

static PHOTO_FIELDS: &[FieldDef] = &[
    def(*b"mstt", "dmap.status", 0, FieldKind::U32),
    def(*b"miid", "dmap.itemid", 1, FieldKind::U32),
    def(*b"minm", "dmap.itemname", 2, FieldKind::Str),
    def(*b"mikd", "dmap.itemkind", 3, FieldKind::U8),
    def(*b"mper", "dmap.persistentid", 4, FieldKind::U64),
    def(*b"mlcl", "dmap.listing", 5, FieldKind::Container),
    def(*b"mlit", "dmap.listingitem", 6, FieldKind::Container),
    def(*b"mrco", "dmap.returnedcount", 7, FieldKind::U32),
    def(*b"mtco", "dmap.specifiedtotalcount", 8, FieldKind::U32),
    def(*b"musr", "dmap.serverrevision", 9, FieldKind::U32),
    def(*b"muty", "dmap.updatetype", 10, FieldKind::U8),
    def(*b"mupd", "dmap.updateresponse", 11, FieldKind::Container),
    def(*b"mlog", "dmap.loginresponse", 12, FieldKind::Container),
    def(*b"mlid", "dmap.sessionid", 13, FieldKind::U32),
    def(*b"msrv", "dmap.serverinforesponse", 14, FieldKind::Container),
    def(*b"mpro", "dmap.protocolversion", 15, FieldKind::Version),
    def(*b"mstm", "dmap.timeoutinterval", 16, FieldKind::U32),
    def(*b"mslr", "dmap.loginrequired", 17, FieldKind::U8),
    def(*b"msup", "dmap.supportsupdate", 18, FieldKind::U8),
    def(*b"msdc", "dmap.databasescount", 19, FieldKind::U32),
    def(*b"mimc", "dmap.itemcount", 20, FieldKind::U32),
    def(*b"mctc", "dmap.containercount", 21, FieldKind::U32),
    def(*b"mccr", "dmap.contentcodesresponse", 22, FieldKind::Container),
    def(*b"mdcl", "dmap.dictionary", 23, FieldKind::Container),
    def(*b"mcnm", "dmap.contentcodesnumber", 24, FieldKind::U32),
    def(*b"mcna", "dmap.contentcodesname", 25, FieldKind::Str),
    def(*b"mcty", "dmap.contentcodestype", 26, FieldKind::U16),
    def(*b"avdb", "daap.serverdatabases", 27, FieldKind::Container),
    def(*b"adbs", "daap.databasesongs", 28, FieldKind::Container),
    def(*b"ppro", "dpap.protocolversion", 29, FieldKind::Version),
    def(*b"aply", "daap.databaseplaylists", 30, FieldKind::Container),
    def(*b"apso", "daap.playlistsongs", 31, FieldKind::Container),
    def(*b"abpl", "daap.baseplaylist", 32, FieldKind::U8),
    def(*b"pimf", "dpap.imagefilename", 33, FieldKind::Str),
    def(*b"pfmt", "dpap.imageformat", 34, FieldKind::Str),
    def(*b"pifs", "dpap.imagefilesize", 35, FieldKind::U32),
    def(*b"piwd", "dpap.imagepixelwidth", 36, FieldKind::U32),
    def(*b"phgt", "dpap.imagepixelheight", 37, FieldKind::U32),
    def(*b"pasp", "dpap.aspectratio", 38, FieldKind::F64),
    def(*b"picd", "dpap.creationdate", 39, FieldKind::Date),
    def(*b"pfdt", "dpap.picturedata", 40, FieldKind::Blob),
    def(*b"prat", "dpap.imagerating", 41, FieldKind::U32),
];

static REMOTE_FIELDS: &[FieldDef] = &[
    def(*b"mstt", "dmap.status", 0, FieldKind::U32),
    def(*b"miid", "dmap.itemid", 1, FieldKind::U32),
    def(*b"minm", "dmap.itemname", 2, FieldKind::Str),
    def(*b"mikd", "dmap.itemkind", 3, FieldKind::U8),
    def(*b"mper", "dmap.persistentid", 4, FieldKind::U64),
    def(*b"mlcl", "dmap.listing", 5, FieldKind::Container),
    def(*b"mlit", "dmap.listingitem", 6, FieldKind::Container),
    def(*b"mrco", "dmap.returnedcount", 7, FieldKind::U32),
    def(*b"mtco", "dmap.specifiedtotalcount", 8, FieldKind::U32),
    def(*b"musr", "dmap.serverrevision", 9, FieldKind::U32),
    def(*b"muty", "dmap.updatetype", 10, FieldKind::U8),
    def(*b"mupd", "dmap.updateresponse", 11, FieldKind::Container),
    def(*b"mlog", "dmap.loginresponse", 12, FieldKind::Container),
    def(*b"mlid", "dmap.sessionid", 13, FieldKind::U32),
    def(*b"msrv", "dmap.serverinforesponse", 14, FieldKind::Container),
    def(*b"mpro", "dmap.protocolversion", 15, FieldKind::Version),
    def(*b"mstm", "dmap.timeoutinterval", 16, FieldKind::U32),
    def(*b"mslr", "dmap.loginrequired", 17, FieldKind::U8),
    def(*b"msup", "dmap.supportsupdate", 18, FieldKind::U8),
    def(*b"msdc", "dmap.databasescount", 19, FieldKind::U32),
    def(*b"mimc", "dmap.itemcount", 20, FieldKind::U32),
    def(*b"mctc", "dmap.containercount", 21, FieldKind::U32),
    def(*b"mccr", "dmap.contentcodesresponse", 22, FieldKind::Container),
    def(*b"mdcl", "dmap.dictionary", 23, FieldKind::Container),
    def(*b"mcnm", "dmap.contentcodesnumber", 24, FieldKind::U32),
    def(*b"mcna", "dmap.contentcodesname", 25, FieldKind::Str),
    def(*b"mcty", "dmap.contentcodestype", 26, FieldKind::U16),
    def(*b"avdb", "daap.serverdatabases", 27, FieldKind::Container),
    def(*b"adbs", "daap.databasesongs", 28, FieldKind::Container),
    def(*b"apro", "daap.protocolversion", 29, FieldKind::Version),
    def(*b"aply", "daap.databaseplaylists", 30, FieldKind::Container),
    def(*b"apso", "daap.playlistsongs", 31, FieldKind::Container),
    def(*b"cmst", "dmcp.playstatus", 32, FieldKind::Container),
    def(*b"caps", "dacp.playerstate", 33, FieldKind::U8),
    def(*b"cash", "dacp.shufflestate", 34, FieldKind::U8),
    def(*b"carp", "dacp.repeatstate", 35, FieldKind::U8),
    def(*b"cmvo", "dmcp.volume", 36, FieldKind::U32),
    def(*b"cmsr", "dmcp.serverrevision", 37, FieldKind::U32),
    def(*b"cant", "dacp.remainingtime", 38, FieldKind::U32),
    def(*b"cast", "dacp.songtime", 39, FieldKind::U32),
    def(*b"cann", "dacp.nowplayingname", 40, FieldKind::Str),
    def(*b"cana", "dacp.nowplayingartist", 41, FieldKind::Str),
    def(*b"canl", "dacp.nowplayingalbum", 42, FieldKind::Str),
    def(*b"cang", "dacp.nowplayinggenre", 43, FieldKind::Str),
    def(*b"canp", "dacp.nowplayingids", 44, FieldKind::Blob),
];

static MUSIC: FieldRegistry = FieldRegistry {
    protocol: Protocol::Music,
    defs: MUSIC_FIELDS,
};

static PHOTO: FieldRegistry = FieldRegistry {
    protocol: Protocol::Photo,
    defs: PHOTO_FIELDS,
};

static REMOTE: FieldRegistry = FieldRegistry {
    protocol: Protocol::Remote,
    defs: REMOTE_FIELDS,
};
