//! Full-frame assembly: header + questions + three RR sections, plus
//! the metadata the aggregator needs (source address, advertised IP,
//! arrival time).

use std::net::SocketAddr;
use std::time::Instant;

use crate::error::WireError;

use super::header::Header;
use super::rr::{decode_question, decode_rr, Question, ResourceRecord};

/// A fully decoded mDNS datagram.
///
/// `advertised_ip` is set to the address carried by the *last* A/AAAA
/// record seen across any section; the aggregator prefers this over
/// the packet's own source address.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
    pub source: SocketAddr,
    pub advertised_ip: Option<String>,
    pub received_at: Instant,
}

impl Frame {
    /// All resource records across answer, authority, and additional
    /// sections, in wire order.
    pub fn all_records(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.answers
            .iter()
            .chain(self.authorities.iter())
            .chain(self.additionals.iter())
    }
}

/// Decode a single mDNS datagram received from `source` at `received_at`.
///
/// A failure decoding the header or any question invalidates the whole
/// frame. A failure decoding an individual resource record (owner name,
/// fixed RR header, or RDATA bounds) also invalidates the frame, since
/// the cursor cannot be trusted to resync past a record we failed to
/// measure the length of — the one documented exception is a too-short
/// SRV RDATA, which the RR decoder itself absorbs by falling back to a
/// raw `Unknown` payload rather than erroring.
pub fn decode_frame(
    packet: &[u8],
    source: SocketAddr,
    received_at: Instant,
) -> Result<Frame, WireError> {
    let header = Header::decode(packet)?;
    let mut pos = Header::SIZE;

    let mut questions = Vec::with_capacity(header.qdcount as usize);
    for _ in 0..header.qdcount {
        let (q, next) = decode_question(packet, pos)?;
        questions.push(q);
        pos = next;
    }

    let answers = decode_rr_section(packet, &mut pos, header.ancount)?;
    let authorities = decode_rr_section(packet, &mut pos, header.nscount)?;
    let additionals = decode_rr_section(packet, &mut pos, header.arcount)?;

    let advertised_ip = answers
        .iter()
        .chain(authorities.iter())
        .chain(additionals.iter())
        .filter_map(|rr| rr.advertised_ip())
        .last()
        .map(str::to_string);

    Ok(Frame {
        header,
        questions,
        answers,
        authorities,
        additionals,
        source,
        advertised_ip,
        received_at,
    })
}

fn decode_rr_section(
    packet: &[u8],
    pos: &mut usize,
    count: u16,
) -> Result<Vec<ResourceRecord>, WireError> {
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (rr, next) = decode_rr(packet, *pos)?;
        records.push(rr);
        *pos = next;
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::name::encode_name;
    use crate::wire::rr::{CLASS_IN, TYPE_A, TYPE_PTR};
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 5353)
    }

    fn push_rr(buf: &mut Vec<u8>, name: &str, rtype: u16, rdata: &[u8]) {
        encode_name(name, buf);
        buf.extend_from_slice(&rtype.to_be_bytes());
        buf.extend_from_slice(&CLASS_IN.to_be_bytes());
        buf.extend_from_slice(&120u32.to_be_bytes());
        buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        buf.extend_from_slice(rdata);
    }

    #[test]
    fn header_only_frame_has_empty_sections() {
        let buf = [0u8; 12];
        let frame = decode_frame(&buf, addr(), Instant::now()).unwrap();
        assert!(frame.questions.is_empty());
        assert!(frame.answers.is_empty());
        assert!(frame.advertised_ip.is_none());
    }

    #[test]
    fn single_ptr_answer_with_compression() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u16.to_be_bytes()); // id
        buf.extend_from_slice(&0u16.to_be_bytes()); // flags
        buf.extend_from_slice(&0u16.to_be_bytes()); // qdcount
        buf.extend_from_slice(&1u16.to_be_bytes()); // ancount
        buf.extend_from_slice(&[0u8; 4]); // ns, ar

        let name_offset = buf.len();
        encode_name("_http._tcp.local", &mut buf);
        let name_len = buf.len() - name_offset;
        let _ = name_len;

        let mut rdata = Vec::new();
        rdata.push(0xC0);
        rdata.push(name_offset as u8);
        push_rr(&mut buf, "_services._dns-sd._udp.local", TYPE_PTR, &rdata);

        let frame = decode_frame(&buf, addr(), Instant::now()).unwrap();
        assert_eq!(frame.answers.len(), 1);
        match &frame.answers[0].rdata {
            crate::wire::rr::RData::Ptr { target } => {
                assert_eq!(target, "_http._tcp.local")
            }
            other => panic!("expected Ptr, got {other:?}"),
        }
    }

    #[test]
    fn advertised_ip_taken_from_a_record() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        push_rr(&mut buf, "host.local", TYPE_A, &[10, 0, 0, 5]);

        let frame = decode_frame(&buf, addr(), Instant::now()).unwrap();
        assert_eq!(frame.advertised_ip.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn truncated_header_invalidates_frame() {
        let buf = [0u8; 4];
        assert_eq!(
            decode_frame(&buf, addr(), Instant::now()).unwrap_err(),
            WireError::TruncatedHeader
        );
    }

    #[test]
    fn rr_section_lengths_never_exceed_wire_counts_on_partial_packet() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&2u16.to_be_bytes()); // claims 2 answers
        buf.extend_from_slice(&[0u8; 4]);
        push_rr(&mut buf, "host.local", TYPE_A, &[10, 0, 0, 5]);
        // second answer missing entirely -> decode must fail, not panic
        assert!(decode_frame(&buf, addr(), Instant::now()).is_err());
    }
}
