//! Question and resource-record decoding, typed RDATA.

use std::net::{Ipv4Addr, Ipv6Addr};

use byteorder::{BigEndian, ByteOrder};

use super::name::decode_name;
use crate::error::WireError;

pub const TYPE_A: u16 = 1;
pub const TYPE_PTR: u16 = 12;
pub const TYPE_TXT: u16 = 16;
pub const TYPE_AAAA: u16 = 28;
pub const TYPE_SRV: u16 = 33;
pub const TYPE_NSEC: u16 = 47;

pub const CLASS_IN: u16 = 1;
pub const CLASS_UNICAST_RESPONSE: u16 = 0x8000;
pub const CLASS_CACHE_FLUSH: u16 = 0x8000;

/// Typed RDATA, one arm per record type this crate understands, plus a
/// verbatim fallback for anything else. Equality is structural: two
/// RRs with the same type compare equal iff their decoded RDATA does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    Ptr { target: String },
    Txt { entries: Vec<String> },
    Srv { priority: u16, weight: u16, port: u16, target: String },
    A { addr: String },
    Aaaa { addr: String },
    Nsec { next_domain: String, types: Vec<u16> },
    Unknown { bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: String,
    pub rtype: u16,
    pub rclass: u16,
    pub ttl: u32,
    pub rdata: RData,
}

impl ResourceRecord {
    /// The port carried by this RR if it is a successfully-decoded SRV,
    /// `None` otherwise (including a too-short SRV whose RDATA was too
    /// short to parse and fell back to raw `Unknown` bytes instead).
    pub fn srv_port(&self) -> Option<u16> {
        match &self.rdata {
            RData::Srv { port, .. } => Some(*port),
            _ => None,
        }
    }

    /// The advertised IP address this RR carries, if it is an A or
    /// AAAA record.
    pub fn advertised_ip(&self) -> Option<&str> {
        match &self.rdata {
            RData::A { addr } => Some(addr),
            RData::Aaaa { addr } => Some(addr),
            _ => None,
        }
    }
}

pub fn decode_question(packet: &[u8], pos: usize) -> Result<(Question, usize), WireError> {
    let (name, after_name) = decode_name(packet, pos)?;
    if after_name + 4 > packet.len() {
        return Err(WireError::TruncatedQuestion);
    }
    let qtype = BigEndian::read_u16(&packet[after_name..after_name + 2]);
    let qclass = BigEndian::read_u16(&packet[after_name + 2..after_name + 4]);
    Ok((
        Question {
            name,
            qtype,
            qclass,
        },
        after_name + 4,
    ))
}

pub fn decode_rr(packet: &[u8], pos: usize) -> Result<(ResourceRecord, usize), WireError> {
    let (name, after_name) = decode_name(packet, pos)?;

    if after_name + 10 > packet.len() {
        return Err(WireError::TruncatedRRHeader);
    }

    let rtype = BigEndian::read_u16(&packet[after_name..after_name + 2]);
    let rclass = BigEndian::read_u16(&packet[after_name + 2..after_name + 4]);
    let ttl = BigEndian::read_u32(&packet[after_name + 4..after_name + 8]);
    let rdlen = BigEndian::read_u16(&packet[after_name + 8..after_name + 10]) as usize;

    let rdata_start = after_name + 10;
    let rdata_end = rdata_start + rdlen;
    if rdata_end > packet.len() {
        return Err(WireError::RDataOverrun);
    }

    let rdata = decode_rdata(packet, rtype, rdata_start, rdata_end)?;

    Ok((
        ResourceRecord {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        },
        rdata_end,
    ))
}

fn decode_rdata(
    packet: &[u8],
    rtype: u16,
    rdata_start: usize,
    rdata_end: usize,
) -> Result<RData, WireError> {
    let raw = &packet[rdata_start..rdata_end];

    match rtype {
        TYPE_PTR => {
            let (target, _) = decode_name(packet, rdata_start)?;
            Ok(RData::Ptr { target })
        }
        TYPE_TXT => Ok(RData::Txt {
            entries: decode_txt_entries(raw),
        }),
        TYPE_SRV => {
            if raw.len() < 6 {
                return Ok(RData::Unknown {
                    bytes: raw.to_vec(),
                });
            }
            let priority = BigEndian::read_u16(&raw[0..2]);
            let weight = BigEndian::read_u16(&raw[2..4]);
            let port = BigEndian::read_u16(&raw[4..6]);
            let (target, _) = decode_name(packet, rdata_start + 6)?;
            Ok(RData::Srv {
                priority,
                weight,
                port,
                target,
            })
        }
        TYPE_A => {
            if raw.len() != 4 {
                return Err(WireError::RDataOverrun);
            }
            let addr = Ipv4Addr::new(raw[0], raw[1], raw[2], raw[3]);
            Ok(RData::A {
                addr: addr.to_string(),
            })
        }
        TYPE_AAAA => {
            if raw.len() != 16 {
                return Err(WireError::RDataOverrun);
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(raw);
            Ok(RData::Aaaa {
                addr: Ipv6Addr::from(octets).to_string(),
            })
        }
        TYPE_NSEC => {
            let (next_domain, next_pos) = decode_name(packet, rdata_start)?;
            let bitmap_start = next_pos;
            let types = decode_nsec_bitmap(&packet[bitmap_start..rdata_end]);
            Ok(RData::Nsec { next_domain, types })
        }
        _ => Ok(RData::Unknown {
            bytes: raw.to_vec(),
        }),
    }
}

fn decode_txt_entries(raw: &[u8]) -> Vec<String> {
    let mut entries = Vec::new();
    let mut pos = 0usize;
    while pos < raw.len() {
        let len = raw[pos] as usize;
        pos += 1;
        if pos + len > raw.len() {
            break;
        }
        entries.push(String::from_utf8_lossy(&raw[pos..pos + len]).into_owned());
        pos += len;
    }
    entries
}

fn decode_nsec_bitmap(raw: &[u8]) -> Vec<u16> {
    let mut types = Vec::new();
    let mut pos = 0usize;
    while pos + 2 <= raw.len() {
        let window = raw[pos] as u16;
        let len = raw[pos + 1] as usize;
        pos += 2;
        if pos + len > raw.len() {
            break;
        }
        for (i, byte) in raw[pos..pos + len].iter().enumerate() {
            for bit in 0..8u16 {
                if byte & (1 << (7 - bit)) != 0 {
                    types.push(window * 256 + i as u16 * 8 + bit);
                }
            }
        }
        pos += len;
    }
    types
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::name::encode_name;

    fn rr_header(owner_end: &mut Vec<u8>, rtype: u16, rclass: u16, ttl: u32, rdata: &[u8]) {
        owner_end.extend_from_slice(&rtype.to_be_bytes());
        owner_end.extend_from_slice(&rclass.to_be_bytes());
        owner_end.extend_from_slice(&ttl.to_be_bytes());
        owner_end.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        owner_end.extend_from_slice(rdata);
    }

    #[test]
    fn decode_txt_with_empty_rdata_is_empty_list() {
        let entries = decode_txt_entries(&[]);
        assert!(entries.is_empty());
    }

    #[test]
    fn decode_txt_entries_multiple() {
        let mut raw = Vec::new();
        raw.push(5);
        raw.extend_from_slice(b"a=123");
        raw.push(3);
        raw.extend_from_slice(b"b=4");
        let entries = decode_txt_entries(&raw);
        assert_eq!(entries, vec!["a=123".to_string(), "b=4".to_string()]);
    }

    #[test]
    fn decode_a_record_formats_dotted_quad() {
        let mut buf = Vec::new();
        encode_name("host.local", &mut buf);
        rr_header(&mut buf, TYPE_A, CLASS_IN, 120, &[192, 0, 2, 10]);
        let (rr, end) = decode_rr(&buf, 0).unwrap();
        assert_eq!(end, buf.len());
        assert_eq!(
            rr.rdata,
            RData::A {
                addr: "192.0.2.10".to_string()
            }
        );
    }

    #[test]
    fn decode_a_record_wrong_size_is_error() {
        let mut buf = Vec::new();
        encode_name("host.local", &mut buf);
        rr_header(&mut buf, TYPE_A, CLASS_IN, 120, &[192, 0, 2]);
        assert_eq!(decode_rr(&buf, 0).unwrap_err(), WireError::RDataOverrun);
    }

    #[test]
    fn decode_srv_too_short_preserves_raw_and_advances_cursor() {
        let mut buf = Vec::new();
        encode_name("_http._tcp.local", &mut buf);
        rr_header(&mut buf, TYPE_SRV, CLASS_IN, 120, &[0, 0, 1]);
        let (rr, end) = decode_rr(&buf, 0).unwrap();
        assert_eq!(end, buf.len());
        assert_eq!(
            rr.rdata,
            RData::Unknown {
                bytes: vec![0, 0, 1]
            }
        );
        assert_eq!(rr.srv_port(), None);
    }

    #[test]
    fn decode_srv_extracts_port_and_target() {
        let mut buf = Vec::new();
        encode_name("_http._tcp.local", &mut buf);
        let mut rdata = Vec::new();
        rdata.extend_from_slice(&0u16.to_be_bytes()); // priority
        rdata.extend_from_slice(&0u16.to_be_bytes()); // weight
        rdata.extend_from_slice(&9100u16.to_be_bytes()); // port
        encode_name("printer.local", &mut rdata);
        rr_header(&mut buf, TYPE_SRV, CLASS_IN, 120, &rdata);
        let (rr, _) = decode_rr(&buf, 0).unwrap();
        assert_eq!(rr.srv_port(), Some(9100));
        assert_eq!(
            rr.rdata,
            RData::Srv {
                priority: 0,
                weight: 0,
                port: 9100,
                target: "printer.local".to_string()
            }
        );
    }

    #[test]
    fn decode_ptr_target_via_pointer() {
        let mut buf = Vec::new();
        encode_name("_http._tcp.local", &mut buf);
        let owner_end = buf.len();
        rr_header(&mut buf, TYPE_PTR, CLASS_IN, 120, &[0xC0, 0x00]);
        let (rr, end) = decode_rr(&buf, 0).unwrap();
        assert_eq!(end, buf.len());
        assert!(owner_end < end);
        assert_eq!(
            rr.rdata,
            RData::Ptr {
                target: "_http._tcp.local".to_string()
            }
        );
    }

    #[test]
    fn decode_unknown_type_keeps_raw_bytes() {
        let mut buf = Vec::new();
        encode_name("x.local", &mut buf);
        rr_header(&mut buf, 999, CLASS_IN, 60, &[1, 2, 3]);
        let (rr, _) = decode_rr(&buf, 0).unwrap();
        assert_eq!(
            rr.rdata,
            RData::Unknown {
                bytes: vec![1, 2, 3]
            }
        );
    }

    #[test]
    fn decode_nsec_bitmap_lists_present_types() {
        let mut buf = Vec::new();
        encode_name("x.local", &mut buf);
        let mut rdata = Vec::new();
        encode_name("y.local", &mut rdata);
        // window 0, length 1, bitmap with bit for type 1 (A) and type 28 (AAAA, bit 4 of byte 3)
        rdata.push(0);
        rdata.push(4);
        rdata.extend_from_slice(&[0x40, 0x00, 0x00, 0x08]);
        rr_header(&mut buf, TYPE_NSEC, CLASS_IN, 60, &rdata);
        let (rr, _) = decode_rr(&buf, 0).unwrap();
        match rr.rdata {
            RData::Nsec { types, .. } => {
                assert!(types.contains(&1));
                assert!(types.contains(&28));
            }
            _ => panic!("expected Nsec"),
        }
    }

    #[test]
    fn question_decode_reads_type_and_class() {
        let mut buf = Vec::new();
        encode_name("_services._dns-sd._udp.local", &mut buf);
        buf.extend_from_slice(&TYPE_PTR.to_be_bytes());
        buf.extend_from_slice(&CLASS_IN.to_be_bytes());
        let (q, end) = decode_question(&buf, 0).unwrap();
        assert_eq!(end, buf.len());
        assert_eq!(q.qtype, TYPE_PTR);
        assert_eq!(q.qclass, CLASS_IN);
    }
}
