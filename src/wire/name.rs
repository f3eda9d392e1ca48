//! DNS name decoding and encoding, including compression-pointer support.
//!
//! Decoding takes the *whole enclosing packet* as input rather than
//! assuming any thread-local or cursor-local context, so that RDATA
//! (e.g. a PTR target) can dereference a pointer into an earlier part
//! of the same packet. The only loop guard is a hard cap on the number
//! of pointer jumps.

use crate::error::WireError;

const MAX_JUMPS: u32 = 10;

/// Decode a DNS name starting at `pos` within `packet`.
///
/// Returns the decoded, dot-joined name (no trailing dot) and the
/// offset immediately following the name *as it appears at `pos`* —
/// i.e. after the first pointer if one was followed, or after the
/// zero terminator otherwise.
pub fn decode_name(packet: &[u8], pos: usize) -> Result<(String, usize), WireError> {
    let mut labels: Vec<u8> = Vec::new();
    let mut cur = pos;
    let mut return_to: Option<usize> = None;
    let mut jumps = 0u32;

    loop {
        let len = *packet.get(cur).ok_or(WireError::UnterminatedName)?;

        if len & 0xC0 == 0xC0 {
            let hi = (len & 0x3F) as usize;
            let lo = *packet.get(cur + 1).ok_or(WireError::TruncatedPointer)? as usize;
            let offset = (hi << 8) | lo;

            if return_to.is_none() {
                return_to = Some(cur + 2);
            }

            jumps += 1;
            if jumps > MAX_JUMPS {
                return Err(WireError::PointerLoop);
            }

            if offset >= packet.len() {
                return Err(WireError::BadPointerOffset);
            }
            cur = offset;
            continue;
        }

        if len == 0 {
            cur += 1;
            break;
        }

        let label_start = cur + 1;
        let label_end = label_start + len as usize;
        if label_end > packet.len() {
            return Err(WireError::LabelOverrun);
        }

        if !labels.is_empty() {
            labels.push(b'.');
        }
        labels.extend_from_slice(&packet[label_start..label_end]);
        cur = label_end;
    }

    let name = String::from_utf8_lossy(&labels).into_owned();
    Ok((name, return_to.unwrap_or(cur)))
}

/// Encode a dotted name (trailing dot optional) as length-prefixed
/// labels terminated by a zero byte. No compression is ever emitted —
/// outbound queries are small and simple.
pub fn encode_name(name: &str, out: &mut Vec<u8>) {
    let trimmed = name.trim_end_matches('.');
    if !trimmed.is_empty() {
        for label in trimmed.split('.') {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
    }
    out.push(0);
}
