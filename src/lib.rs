//! mDNS / DNS-SD local-network discovery engine core: interface
//! enumeration and multicast sockets, a periodic query/receive/dispatch
//! control loop, a DNS wire codec with name-compression support and
//! typed RDATA, and a response aggregator that merges records into a
//! de-duplicated service catalogue.
//!
//! Out of scope: acting as an mDNS responder, conflict resolution,
//! authoritative answering, DNSSEC, and the full RFC 6762 retransmission
//! schedule (a fixed-interval poll is used instead). The graphical
//! dashboard, ping tool, and persisted UI settings that consume this
//! crate live elsewhere.

pub mod aggregator;
pub mod discovery;
pub mod error;
pub mod socket;
pub mod wire;

pub use aggregator::{Aggregator, QuestionCardEntry, ScanCardEntry};
pub use discovery::{DiscoveryConfig, DiscoveryController, DiscoveryHandle};
pub use error::{SocketError, WireError};
pub use wire::{decode_frame, Frame, Question, RData, ResourceRecord};
