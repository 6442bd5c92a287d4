//! Response assembly - building outbound container trees per request kind.
//!
//! Each function takes the negotiated inputs (meta mask, filter
//! predicate, catalog view, session context) and returns the root
//! [`Node`] for one request kind. Listing responses are populated
//! field-by-field, gated by [`MetaMask::is_requested`]; fixed-layout
//! responses (server-info, login, update) ignore the mask entirely.
//!
//! Everything here is pure tree building except [`login`] (allocates a
//! session) and [`update`] (delegates to the long-poll wait).

use std::time::Duration;

use crate::catalog::Catalog;
use crate::codec::Node;
use crate::config::ShareConfig;
use crate::error::Result;
use crate::filter::Predicate;
use crate::meta::MetaMask;
use crate::registry::{codes, FieldRegistry, Protocol};
use crate::session::SessionManager;

/// Protocol status code for a successful response.
pub const STATUS_OK: u32 = 200;

/// The single database id this share exposes.
pub const DATABASE_ID: u32 = 1;

/// Build the `/server-info` response. Fixed field set; any meta mask
/// is ignored.
pub fn server_info(config: &ShareConfig) -> Node {
    let variant_code = match config.protocol {
        Protocol::Music | Protocol::Remote => codes::APRO,
        Protocol::Photo => codes::PPRO,
    };

    Node::container(
        codes::MSRV,
        vec![
            Node::u32(codes::MSTT, STATUS_OK),
            Node::u32(codes::MPRO, config.dmap_version.as_u32()),
            Node::u32(variant_code, config.variant_version.as_u32()),
            Node::string(codes::MINM, config.share_name.clone()),
            Node::u8(codes::MSLR, u8::from(config.login_required)),
            Node::u32(codes::MSTM, config.session_timeout_secs as u32),
            Node::u8(codes::MSUP, 1),
            Node::u32(codes::MSDC, config.database_count),
        ],
    )
}

/// Build the `/login` response, allocating a fresh session.
pub fn login(sessions: &SessionManager) -> Node {
    let session_id = sessions.create_session();
    Node::container(
        codes::MLOG,
        vec![
            Node::u32(codes::MSTT, STATUS_OK),
            Node::u32(codes::MLID, session_id),
        ],
    )
}

/// Build the `/update` response. Long-polls through the session
/// manager: answers immediately when the client is behind, otherwise
/// holds until a mutation or the deadline.
pub async fn update(
    sessions: &SessionManager,
    session_id: u32,
    client_rev: u64,
    deadline: Duration,
) -> Result<Node> {
    let revision = sessions
        .await_revision_for(session_id, client_rev, deadline)
        .await?;

    Ok(Node::container(
        codes::MUPD,
        vec![
            Node::u32(codes::MSTT, STATUS_OK),
            Node::u32(codes::MUSR, revision as u32),
        ],
    ))
}

/// Build the `/databases` response: the share's database listing.
pub fn databases(
    config: &ShareConfig,
    catalog: &dyn Catalog,
    registry: &FieldRegistry,
    mask: &MetaMask,
) -> Node {
    let mut entry = Vec::new();
    push_gated(&mut entry, registry, mask, "dmap.itemid", || {
        Node::u32(codes::MIID, DATABASE_ID)
    });
    push_gated(&mut entry, registry, mask, "dmap.itemname", || {
        Node::string(codes::MINM, config.share_name.clone())
    });
    push_gated(&mut entry, registry, mask, "dmap.itemcount", || {
        Node::u32(codes::MIMC, catalog.count() as u32)
    });
    push_gated(&mut entry, registry, mask, "dmap.containercount", || {
        Node::u32(codes::MCTC, catalog.playlists().len() as u32)
    });

    Node::container(
        codes::AVDB,
        vec![
            Node::u32(codes::MSTT, STATUS_OK),
            Node::u8(codes::MUTY, 0),
            Node::u32(codes::MTCO, 1),
            Node::u32(codes::MRCO, 1),
            Node::container(codes::MLCL, vec![Node::container(codes::MLIT, entry)]),
        ],
    )
}

/// Build the items listing: one child per record surviving the filter,
/// populated field-by-field under the meta mask.
pub fn items(
    catalog: &dyn Catalog,
    registry: &FieldRegistry,
    mask: &MetaMask,
    predicate: &Predicate,
) -> Node {
    let accepted = predicate.evaluate(catalog);
    let total = catalog.count() as u32;
    let returned = accepted.len() as u32;
    let itemid_id = registry.lookup_name("dmap.itemid").map(|d| d.id);

    let mut listing = Vec::with_capacity(accepted.len());
    for id in accepted {
        let Some(record) = catalog.lookup(id) else {
            continue;
        };

        let mut fields = Vec::new();
        // The item id comes from the record identity, not its field
        // map, so it is always available to gate on.
        if let Some(itemid_id) = itemid_id {
            if mask.is_requested(itemid_id) {
                fields.push(Node::u32(codes::MIID, record.id as u32));
            }
        }
        for (field_id, value) in record.fields() {
            if Some(field_id) == itemid_id || !mask.is_requested(field_id) {
                continue;
            }
            if let Some(def) = registry.lookup_id(field_id) {
                fields.push(Node::new(def.code, value.clone()));
            }
        }
        listing.push(Node::container(codes::MLIT, fields));
    }

    Node::container(
        codes::ADBS,
        vec![
            Node::u32(codes::MSTT, STATUS_OK),
            Node::u8(codes::MUTY, 0),
            Node::u32(codes::MTCO, total),
            Node::u32(codes::MRCO, returned),
            Node::container(codes::MLCL, listing),
        ],
    )
}

/// Build the containers listing: one child per grouping record plus a
/// nested member-id listing.
pub fn containers(catalog: &dyn Catalog) -> Node {
    let playlists = catalog.playlists();
    let count = playlists.len() as u32;

    let mut listing = Vec::with_capacity(playlists.len());
    for playlist in playlists {
        let members = playlist
            .member_ids
            .iter()
            .map(|&id| Node::container(codes::MLIT, vec![Node::u32(codes::MIID, id as u32)]))
            .collect();

        let mut entry = vec![
            Node::u32(codes::MIID, playlist.id as u32),
            Node::string(codes::MINM, playlist.name),
            Node::u32(codes::MIMC, playlist.member_ids.len() as u32),
        ];
        if playlist.base {
            entry.push(Node::u8(codes::ABPL, 1));
        }
        entry.push(Node::container(
            codes::APSO,
            vec![Node::container(codes::MLCL, members)],
        ));

        listing.push(Node::container(codes::MLIT, entry));
    }

    Node::container(
        codes::APLY,
        vec![
            Node::u32(codes::MSTT, STATUS_OK),
            Node::u8(codes::MUTY, 0),
            Node::u32(codes::MTCO, count),
            Node::u32(codes::MRCO, count),
            Node::container(codes::MLCL, listing),
        ],
    )
}

/// Build the `/content-codes` response: the full registry dump so
/// unfamiliar clients can parse unknown fields generically.
pub fn content_codes(registry: &FieldRegistry) -> Node {
    let mut children = vec![Node::u32(codes::MSTT, STATUS_OK)];
    for def in registry.defs() {
        children.push(Node::container(
            codes::MDCL,
            vec![
                Node::u32(codes::MCNM, def.code.as_u32()),
                Node::string(codes::MCNA, def.name),
                Node::u16(codes::MCTY, def.kind.type_code()),
            ],
        ));
    }
    Node::container(codes::MCCR, children)
}

fn push_gated(
    out: &mut Vec<Node>,
    registry: &FieldRegistry,
    mask: &MetaMask,
    name: &str,
    build: impl FnOnce() -> Node,
) {
    if let Some(def) = registry.lookup_name(name) {
        if mask.is_requested(def.id) {
            out.push(build());
        }
    }
}
