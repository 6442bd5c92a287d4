//! Client-role request driver.
//!
//! Drives the ordered request sequence against a remote share:
//! server-info, login, database discovery, the items sync, then the
//! update long-poll loop. The transport is abstracted behind
//! [`Exchange`] so HTTP and TLS stay outside the crate; the driver owns
//! the validation-token bookkeeping and decodes every reply into typed
//! records.
//!
//! Exactly one request is outstanding per state. A reply whose
//! top-level content code does not match the expected one is a
//! protocol error and closes the driver; there is no silent retry.
//!
//! # Example
//!
//! ```no_run
//! use dmap_share::driver::{Driver, Exchange};
//! use dmap_share::registry::{FieldRegistry, Protocol};
//! # async fn run<E: Exchange>(transport: E) -> dmap_share::Result<()> {
//! let registry = FieldRegistry::for_protocol(Protocol::Music);
//! let mut driver = Driver::new(transport, registry, 3.2);
//!
//! let info = driver.server_info().await?;
//! tracing::info!(name = %info.name, "connected");
//! driver.login().await?;
//! let database = driver.databases().await?;
//! let tracks = driver.items("dmap.itemid,dmap.itemname", None).await?;
//! # let _ = (database, tracks);
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;

use crate::auth::{compute, RequestCounter};
use crate::codec::{decode, ContentCode, Node};
use crate::error::{DmapError, Result};
use crate::registry::{codes, FieldRegistry};

/// Transport abstraction: one request out, one reply body back.
///
/// `token` is the validation token for the `Client-DMAP-Validation`
/// header; `None` on the initial server-info request, which is never
/// tokenized.
pub trait Exchange: Send + Sync {
    /// Issue a GET for `path` and return the raw reply body.
    fn roundtrip(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Bytes>> + Send;
}

/// Driver lifecycle position. Each state admits exactly one request
/// kind; anything else is a caller bug surfaced as `Protocol(..)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Start,
    AwaitingServerInfo,
    AwaitingLogin,
    AwaitingSessionId,
    AwaitingDatabaseId,
    Syncing,
    AwaitingUpdate,
    ApplyingDelta,
    Closed,
}

/// Decoded `/server-info` reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub name: String,
    pub protocol_version: u32,
    pub variant_version: u32,
    pub login_required: bool,
    pub timeout_secs: u32,
    pub database_count: u32,
}

/// One database entry from the `/databases` listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseRecord {
    pub id: u32,
    pub name: String,
    pub item_count: u32,
    pub container_count: u32,
}

/// One item from an items listing, built by walking the entry's
/// children once. Fields the server did not send stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackRecord {
    pub id: u32,
    pub name: Option<String>,
    pub album: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub format: Option<String>,
    pub time_ms: Option<u32>,
    pub size_bytes: Option<u32>,
    pub track_number: Option<u16>,
    pub year: Option<u16>,
}

impl TrackRecord {
    /// Build from one listing entry. Unrecognized child codes are
    /// skipped, never fatal, matching the decoder's tolerance rule.
    pub fn from_node(entry: &Node) -> Self {
        let mut track = TrackRecord::default();
        let Some(children) = entry.value.as_container() else {
            return track;
        };

        for child in children {
            match child.code {
                codes::MIID => track.id = child.value.as_u32().unwrap_or(0),
                codes::MINM => track.name = child.value.as_str().map(String::from),
                codes::ASAL => track.album = child.value.as_str().map(String::from),
                codes::ASAR => track.artist = child.value.as_str().map(String::from),
                codes::ASGN => track.genre = child.value.as_str().map(String::from),
                codes::ASFM => track.format = child.value.as_str().map(String::from),
                codes::ASTM => track.time_ms = child.value.as_u32(),
                codes::ASSZ => track.size_bytes = child.value.as_u32(),
                codes::ASTN => {
                    track.track_number = child.value.as_u32().map(|v| v as u16);
                }
                codes::ASYR => track.year = child.value.as_u32().map(|v| v as u16),
                _ => {}
            }
        }
        track
    }
}

/// Client-role protocol driver over an [`Exchange`] transport.
#[derive(Debug)]
pub struct Driver<E> {
    exchange: E,
    registry: &'static FieldRegistry,
    version: f32,
    state: DriverState,
    counter: RequestCounter,
    session_id: Option<u32>,
    database_id: Option<u32>,
    revision: u64,
}

impl<E: Exchange> Driver<E> {
    /// Create a driver positioned before the first request. `version`
    /// selects the validation-token scheme and should match the
    /// variant version the server advertises.
    pub fn new(exchange: E, registry: &'static FieldRegistry, version: f32) -> Self {
        Self {
            exchange,
            registry,
            version,
            state: DriverState::Start,
            counter: RequestCounter::new(),
            session_id: None,
            database_id: None,
            revision: 1,
        }
    }

    /// Current lifecycle position.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Session id once logged in.
    pub fn session_id(&self) -> Option<u32> {
        self.session_id
    }

    /// Last revision acknowledged by the server.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Fetch `/server-info`. The first request on a connection; carries
    /// no validation token.
    pub async fn server_info(&mut self) -> Result<ServerInfo> {
        self.expect_state(DriverState::Start)?;
        self.state = DriverState::AwaitingServerInfo;

        let root = self.exchange_untokenized("/server-info", codes::MSRV).await?;

        let info = ServerInfo {
            name: root
                .child(codes::MINM)
                .and_then(|n| n.value.as_str())
                .unwrap_or_default()
                .to_string(),
            protocol_version: child_u32(&root, codes::MPRO),
            variant_version: root
                .child(codes::APRO)
                .or_else(|| root.child(codes::PPRO))
                .and_then(|n| n.value.as_u32())
                .unwrap_or(0),
            login_required: child_u32(&root, codes::MSLR) != 0,
            timeout_secs: child_u32(&root, codes::MSTM),
            database_count: child_u32(&root, codes::MSDC),
        };

        self.state = DriverState::AwaitingLogin;
        Ok(info)
    }

    /// Log in and capture the session id.
    pub async fn login(&mut self) -> Result<u32> {
        self.expect_state(DriverState::AwaitingLogin)?;
        self.state = DriverState::AwaitingSessionId;

        let root = self.exchange_tokenized("/login", codes::MLOG).await?;
        let session_id = root
            .child(codes::MLID)
            .and_then(|n| n.value.as_u32())
            .ok_or_else(|| self.close(DmapError::Protocol("login reply without session id".into())))?;

        tracing::debug!(session_id, "logged in");
        self.session_id = Some(session_id);
        self.state = DriverState::AwaitingDatabaseId;
        Ok(session_id)
    }

    /// Fetch the database listing and latch the first database id.
    pub async fn databases(&mut self) -> Result<DatabaseRecord> {
        self.expect_state(DriverState::AwaitingDatabaseId)?;
        let session_id = self.require_session()?;

        let path = format!(
            "/databases?session-id={}&revision-number={}",
            session_id, self.revision
        );
        let root = self.exchange_tokenized(&path, codes::AVDB).await?;

        let entry = root
            .child(codes::MLCL)
            .and_then(|l| l.value.as_container())
            .and_then(|entries| entries.first())
            .ok_or_else(|| self.close(DmapError::Protocol("empty database listing".into())))?;

        let database = DatabaseRecord {
            id: child_u32(entry, codes::MIID),
            name: entry
                .child(codes::MINM)
                .and_then(|n| n.value.as_str())
                .unwrap_or_default()
                .to_string(),
            item_count: child_u32(entry, codes::MIMC),
            container_count: child_u32(entry, codes::MCTC),
        };

        self.database_id = Some(database.id);
        self.state = DriverState::Syncing;
        Ok(database)
    }

    /// Fetch the items listing for the latched database.
    pub async fn items(&mut self, meta: &str, filter: Option<&str>) -> Result<Vec<TrackRecord>> {
        if self.state != DriverState::Syncing && self.state != DriverState::ApplyingDelta {
            return Err(self.close(DmapError::Protocol(format!(
                "items request in state {:?}",
                self.state
            ))));
        }
        let session_id = self.require_session()?;
        let database_id = self
            .database_id
            .ok_or_else(|| DmapError::Protocol("no database latched".into()))?;

        let mut path = format!(
            "/databases/{}/items?meta={}&session-id={}&revision-number={}",
            database_id, meta, session_id, self.revision
        );
        if let Some(filter) = filter {
            path.push_str("&filter=");
            path.push_str(filter);
        }

        let root = self.exchange_tokenized(&path, codes::ADBS).await?;
        let tracks = root
            .child(codes::MLCL)
            .and_then(|l| l.value.as_container())
            .map(|entries| entries.iter().map(TrackRecord::from_node).collect())
            .unwrap_or_default();

        self.state = DriverState::Syncing;
        Ok(tracks)
    }

    /// Long-poll `/update`. Returns once the server reports a revision
    /// past the one we last acknowledged (or its deadline lapses and it
    /// answers with the current one). The driver then expects an items
    /// re-fetch before the next update.
    pub async fn update(&mut self) -> Result<u64> {
        self.expect_state(DriverState::Syncing)?;
        let session_id = self.require_session()?;
        self.state = DriverState::AwaitingUpdate;

        let path = format!(
            "/update?session-id={}&revision-number={}",
            session_id, self.revision
        );
        let root = self.exchange_tokenized(&path, codes::MUPD).await?;
        let revision = u64::from(child_u32(&root, codes::MUSR));

        tracing::debug!(revision, "server revision advanced");
        self.revision = revision;
        self.state = DriverState::ApplyingDelta;
        Ok(revision)
    }

    /// Log out and close the driver.
    pub async fn logout(&mut self) -> Result<()> {
        let session_id = self.require_session()?;
        let path = format!("/logout?session-id={}", session_id);

        let token = compute(self.version, &path, self.counter.next());
        // Logout replies carry no body; only transport failure matters.
        self.exchange.roundtrip(&path, Some(&token)).await?;

        self.session_id = None;
        self.state = DriverState::Closed;
        Ok(())
    }

    async fn exchange_untokenized(&mut self, path: &str, expected: ContentCode) -> Result<Node> {
        let body = match self.exchange.roundtrip(path, None).await {
            Ok(body) => body,
            Err(err) => return Err(self.close(err)),
        };
        self.decode_reply(&body, expected)
    }

    async fn exchange_tokenized(&mut self, path: &str, expected: ContentCode) -> Result<Node> {
        let token = compute(self.version, path, self.counter.next());
        let body = match self.exchange.roundtrip(path, Some(&token)).await {
            Ok(body) => body,
            Err(err) => return Err(self.close(err)),
        };
        self.decode_reply(&body, expected)
    }

    fn decode_reply(&mut self, body: &[u8], expected: ContentCode) -> Result<Node> {
        let root = match decode(body, self.registry) {
            Ok(root) => root,
            Err(err) => return Err(self.close(err)),
        };
        if root.code != expected {
            return Err(self.close(DmapError::Protocol(format!(
                "expected {} reply, got {}",
                expected, root.code
            ))));
        }
        let status = root.child(codes::MSTT).and_then(|n| n.value.as_u32());
        if let Some(status) = status {
            if status != 200 {
                return Err(self.close(DmapError::Protocol(format!(
                    "server status {} in {} reply",
                    status, root.code
                ))));
            }
        }
        Ok(root)
    }

    fn expect_state(&mut self, expected: DriverState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.close(DmapError::Protocol(format!(
                "request out of order: state {:?}, expected {:?}",
                self.state, expected
            ))))
        }
    }

    fn require_session(&self) -> Result<u32> {
        self.session_id
            .ok_or_else(|| DmapError::Protocol("not logged in".into()))
    }

    fn close(&mut self, err: DmapError) -> DmapError {
        tracing::warn!(error = %err, "closing driver");
        self.state = DriverState::Closed;
        err
    }
}

fn child_u32(node: &Node, code: ContentCode) -> u32 {
    node.child(code)
        .and_then(|n| n.value.as_u32())
        .unwrap_or(0)
}
