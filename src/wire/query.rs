//! Outbound query packet encoding.

use super::name::encode_name;
use super::rr::{CLASS_IN, CLASS_UNICAST_RESPONSE, TYPE_PTR};

/// The canonical `_services._dns-sd._udp.local.` PTR query, sent with
/// the unicast-response (QU) bit set, used whenever the follow-up query
/// set is empty.
pub fn generic_services_query() -> Vec<u8> {
    build_query_with_class(
        &["_services._dns-sd._udp.local".to_string()],
        CLASS_IN | CLASS_UNICAST_RESPONSE,
    )
}

/// Build a query packet asking about each name in `names`, one question
/// per name, all PTR/IN with no QU bit.
pub fn build_query(names: &[String]) -> Vec<u8> {
    if names.is_empty() {
        return generic_services_query();
    }
    build_query_with_class(names, CLASS_IN)
}

fn build_query_with_class(names: &[String], qclass: u16) -> Vec<u8> {
    let mut pkt = Vec::new();

    pkt.extend_from_slice(&0u16.to_be_bytes()); // id
    pkt.extend_from_slice(&0u16.to_be_bytes()); // flags
    pkt.extend_from_slice(&(names.len() as u16).to_be_bytes()); // qdcount
    pkt.extend_from_slice(&[0u8; 6]); // an, ns, ar

    for name in names {
        encode_name(name, &mut pkt);
        pkt.extend_from_slice(&TYPE_PTR.to_be_bytes());
        pkt.extend_from_slice(&qclass.to_be_bytes());
    }

    pkt
}
