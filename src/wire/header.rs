//! 12-byte DNS message header.

use byteorder::{BigEndian, ByteOrder};

use crate::error::WireError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl Header {
    pub const SIZE: usize = 12;

    pub fn decode(packet: &[u8]) -> Result<Self, WireError> {
        if packet.len() < Self::SIZE {
            return Err(WireError::TruncatedHeader);
        }
        Ok(Header {
            id: BigEndian::read_u16(&packet[0..2]),
            flags: BigEndian::read_u16(&packet[2..4]),
            qdcount: BigEndian::read_u16(&packet[4..6]),
            ancount: BigEndian::read_u16(&packet[6..8]),
            nscount: BigEndian::read_u16(&packet[8..10]),
            arcount: BigEndian::read_u16(&packet[10..12]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_all_zero_header() {
        let buf = [0u8; 12];
        let h = Header::decode(&buf).unwrap();
        assert_eq!(h, Header::default());
    }

    #[test]
    fn decode_rejects_truncated_header() {
        let buf = [0u8; 11];
        assert_eq!(Header::decode(&buf).unwrap_err(), WireError::TruncatedHeader);
    }

    #[test]
    fn decode_reads_big_endian_counts() {
        let mut buf = [0u8; 12];
        buf[4] = 0x00;
        buf[5] = 0x01; // qdcount = 1
        buf[6] = 0x00;
        buf[7] = 0x02; // ancount = 2
        let h = Header::decode(&buf).unwrap();
        assert_eq!(h.qdcount, 1);
        assert_eq!(h.ancount, 2);
    }
}
