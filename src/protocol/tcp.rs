//! TCP protocol - RFC 793
//!
//! TCP header parsing and checksum calculation for destination rewrites.

use super::ParseError;
use std::net::Ipv4Addr;

/// Minimum TCP header size (without options)
pub const MIN_HEADER_SIZE: usize = 20;

/// TCP protocol number for pseudo-header
pub const PROTOCOL_NUMBER: u8 = 6;

/// Mutable view over a TCP segment, borrowed from the packet buffer.
///
/// The buffer must already be bounded to the transport segment (what
/// `Ipv4Header::parse` hands back), so checksum coverage is exactly
/// header plus payload.
#[derive(Debug)]
pub struct TcpHeader<'a> {
    buffer: &'a mut [u8],
    header_len: usize,
}

impl<'a> TcpHeader<'a> {
    /// Parse TCP header from a transport segment
    pub fn parse(buffer: &'a mut [u8]) -> Result<Self, ParseError> {
        if buffer.len() < MIN_HEADER_SIZE {
            return Err(ParseError::TooShort);
        }

        let data_offset = (buffer[12] >> 4) as usize;
        let header_len = data_offset * 4;

        if header_len < MIN_HEADER_SIZE {
            return Err(ParseError::BadHeaderLength);
        }

        if buffer.len() < header_len {
            return Err(ParseError::TooShort);
        }

        Ok(Self { buffer, header_len })
    }

    /// Source port (offset 0-1)
    pub fn src_port(&self) -> u16 {
        u16::from_be_bytes([self.buffer[0], self.buffer[1]])
    }

    /// Destination port (offset 2-3)
    pub fn dst_port(&self) -> u16 {
        u16::from_be_bytes([self.buffer[2], self.buffer[3]])
    }

    /// Data offset (header length in 32-bit words)
    pub fn data_offset(&self) -> u8 {
        self.buffer[12] >> 4
    }

    /// Checksum (offset 16-17)
    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes([self.buffer[16], self.buffer[17]])
    }

    /// Header length in bytes
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Payload (TCP data after header)
    pub fn payload(&self) -> &[u8] {
        &self.buffer[self.header_len..]
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer
    }

    /// Set destination port (checksum must be updated separately)
    pub fn set_dst_port(&mut self, port: u16) {
        self.buffer[2..4].copy_from_slice(&port.to_be_bytes());
    }

    /// Recompute the checksum over pseudo-header and segment
    pub fn update_checksum(&mut self, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) {
        // Zero out checksum field first
        self.buffer[16] = 0;
        self.buffer[17] = 0;

        let sum = tcp_checksum(src_ip, dst_ip, self.buffer);
        self.buffer[16..18].copy_from_slice(&sum.to_be_bytes());
    }

    /// Validate checksum with pseudo-header
    pub fn validate_checksum(&self, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> bool {
        tcp_checksum(src_ip, dst_ip, self.buffer) == 0
    }
}

/// Calculate TCP checksum with pseudo-header (RFC 793)
///
/// Pseudo-header:
/// ```text
/// +--------+--------+--------+--------+
/// |          Source Address           |
/// +--------+--------+--------+--------+
/// |        Destination Address        |
/// +--------+--------+--------+--------+
/// |  Zero  |Protocol|   TCP Length    |
/// +--------+--------+--------+--------+
/// ```
pub fn tcp_checksum(src_ip: Ipv4Addr, dst_ip: Ipv4Addr, tcp_segment: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    // Pseudo-header
    let src = src_ip.octets();
    let dst = dst_ip.octets();

    sum += u16::from_be_bytes([src[0], src[1]]) as u32;
    sum += u16::from_be_bytes([src[2], src[3]]) as u32;
    sum += u16::from_be_bytes([dst[0], dst[1]]) as u32;
    sum += u16::from_be_bytes([dst[2], dst[3]]) as u32;
    sum += PROTOCOL_NUMBER as u32;
    sum += tcp_segment.len() as u32;

    // TCP segment
    for i in (0..tcp_segment.len()).step_by(2) {
        let word = if i + 1 < tcp_segment.len() {
            u16::from_be_bytes([tcp_segment[i], tcp_segment[i + 1]])
        } else {
            // Pad with zero if odd length
            u16::from_be_bytes([tcp_segment[i], 0])
        };
        sum = sum.wrapping_add(word as u32);
    }

    // Fold 32-bit sum to 16 bits
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}
