//! Typed failure modes for the wire codec and socket backend.
//!
//! Higher-level plumbing (opening the worker runtime, enumerating
//! interfaces at startup) keeps using `anyhow::Result`; only the closed,
//! testable failure kinds from the wire parser and socket backend get
//! their own enums here.

use thiserror::Error;

/// Failure modes produced while decoding a single mDNS frame.
///
/// A parse failure is never partially recovered, so any variant here
/// invalidates the whole frame it occurred in.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    #[error("packet too short to contain a DNS header")]
    TruncatedHeader,
    #[error("name compression pointer truncated")]
    TruncatedPointer,
    #[error("name compression pointer offset out of bounds")]
    BadPointerOffset,
    #[error("label length overruns packet buffer")]
    LabelOverrun,
    #[error("name not terminated before end of buffer")]
    UnterminatedName,
    #[error("name compression pointer loop (>10 jumps)")]
    PointerLoop,
    #[error("question truncated before type/class")]
    TruncatedQuestion,
    #[error("resource record truncated before RDATA")]
    TruncatedRRHeader,
    #[error("resource record RDATA overruns packet buffer")]
    RDataOverrun,
}

/// Failure modes from the platform socket backend.
///
/// Per-socket failures here are always soft: the caller logs and moves
/// on to the next interface/socket, never aborting the whole scan.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("interface enumeration failed: {0}")]
    Enumeration(#[source] std::io::Error),
    #[error("no sockets could be opened on any interface")]
    NoSocketsOpened,
}
