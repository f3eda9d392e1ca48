//! DNS/mDNS wire codec: names, header, questions/resource records,
//! outbound queries, and whole-frame assembly.

pub mod header;
pub mod message;
pub mod name;
pub mod query;
pub mod rr;

pub use header::Header;
pub use message::{decode_frame, Frame};
pub use name::{decode_name, encode_name};
pub use query::{build_query, generic_services_query};
pub use rr::{Question, RData, ResourceRecord};
