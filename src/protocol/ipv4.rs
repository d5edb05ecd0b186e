//! IPv4 protocol - RFC 791

use super::ParseError;
use std::net::Ipv4Addr;

/// Minimum IPv4 header size (without options)
pub const MIN_HEADER_SIZE: usize = 20;

/// Transport protocols the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Protocol {
    Tcp = 6,
    Udp = 17,
}

impl Protocol {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            6 => Some(Protocol::Tcp),
            17 => Some(Protocol::Udp),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// Mutable view over an IPv4 header, borrowed from the packet buffer.
///
/// `parse` splits the buffer at the header boundary and returns the
/// header view together with the transport segment. The segment is
/// bounded by the total-length field, so trailing bytes (Ethernet
/// padding) never leak into transport parsing or checksums. Holding
/// two disjoint slices lets the caller mutate header and segment at
/// the same time.
#[derive(Debug)]
pub struct Ipv4Header<'a> {
    buffer: &'a mut [u8],
}

impl<'a> Ipv4Header<'a> {
    pub fn parse(buffer: &'a mut [u8]) -> Result<(Self, &'a mut [u8]), ParseError> {
        if buffer.len() < MIN_HEADER_SIZE {
            return Err(ParseError::TooShort);
        }

        let version = buffer[0] >> 4;
        if version != 4 {
            return Err(ParseError::NotIpv4);
        }

        let ihl = (buffer[0] & 0x0F) as usize;
        let header_len = ihl * 4;
        if header_len < MIN_HEADER_SIZE {
            return Err(ParseError::BadHeaderLength);
        }

        let total_length = u16::from_be_bytes([buffer[2], buffer[3]]) as usize;
        if total_length < header_len {
            return Err(ParseError::BadHeaderLength);
        }
        if total_length > buffer.len() {
            return Err(ParseError::TooShort);
        }

        let (header, rest) = buffer.split_at_mut(header_len);
        let segment = &mut rest[..total_length - header_len];

        Ok((Self { buffer: header }, segment))
    }

    pub fn version(&self) -> u8 {
        self.buffer[0] >> 4
    }

    pub fn ihl(&self) -> u8 {
        self.buffer[0] & 0x0F
    }

    pub fn total_length(&self) -> u16 {
        u16::from_be_bytes([self.buffer[2], self.buffer[3]])
    }

    pub fn identification(&self) -> u16 {
        u16::from_be_bytes([self.buffer[4], self.buffer[5]])
    }

    pub fn flags(&self) -> u8 {
        self.buffer[6] >> 5
    }

    pub fn fragment_offset(&self) -> u16 {
        u16::from_be_bytes([self.buffer[6] & 0x1F, self.buffer[7]])
    }

    pub fn ttl(&self) -> u8 {
        self.buffer[8]
    }

    pub fn protocol(&self) -> u8 {
        self.buffer[9]
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes([self.buffer[10], self.buffer[11]])
    }

    pub fn src_addr(&self) -> Ipv4Addr {
        Ipv4Addr::new(
            self.buffer[12],
            self.buffer[13],
            self.buffer[14],
            self.buffer[15],
        )
    }

    pub fn dst_addr(&self) -> Ipv4Addr {
        Ipv4Addr::new(
            self.buffer[16],
            self.buffer[17],
            self.buffer[18],
            self.buffer[19],
        )
    }

    pub fn header_len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if More Fragments flag is set
    pub fn more_fragments(&self) -> bool {
        (self.flags() & flags::MF) != 0
    }

    /// Check if this is a fragment (MF set or offset > 0)
    pub fn is_fragment(&self) -> bool {
        self.more_fragments() || self.fragment_offset() > 0
    }

    /// Validate header checksum
    pub fn validate_checksum(&self) -> bool {
        checksum(self.buffer) == 0
    }

    /// Get raw header bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer
    }

    /// Rewrite the destination address. The header checksum is stale
    /// until `update_checksum` runs.
    pub fn set_dst_addr(&mut self, addr: Ipv4Addr) {
        self.buffer[16..20].copy_from_slice(&addr.octets());
    }

    /// Recalculate and update header checksum
    pub fn update_checksum(&mut self) {
        // Zero out checksum field first
        self.buffer[10] = 0;
        self.buffer[11] = 0;

        let sum = checksum(self.buffer);
        self.buffer[10..12].copy_from_slice(&sum.to_be_bytes());
    }
}

/// Fragment flags
pub mod flags {
    /// Don't Fragment
    pub const DF: u8 = 0b010;
    /// More Fragments
    pub const MF: u8 = 0b001;
}

/// Calculate IPv4 header checksum (RFC 1071 one's complement sum)
pub fn checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    for i in (0..header.len()).step_by(2) {
        let word = if i + 1 < header.len() {
            u16::from_be_bytes([header[i], header[i + 1]])
        } else {
            u16::from_be_bytes([header[i], 0])
        };
        sum = sum.wrapping_add(word as u32);
    }

    // Fold 32-bit sum to 16 bits
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// Builder for constructing IPv4 packets
#[derive(Debug, Clone)]
pub struct Ipv4Builder {
    identification: u16,
    more_fragments: bool,
    fragment_offset: u16,
    ttl: u8,
    protocol: u8,
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
    payload: Vec<u8>,
}

impl Ipv4Builder {
    pub fn new() -> Self {
        Self {
            identification: 0,
            more_fragments: false,
            fragment_offset: 0,
            ttl: 64,
            protocol: 0,
            src_addr: Ipv4Addr::UNSPECIFIED,
            dst_addr: Ipv4Addr::UNSPECIFIED,
            payload: Vec::new(),
        }
    }

    pub fn identification(mut self, id: u16) -> Self {
        self.identification = id;
        self
    }

    pub fn more_fragments(mut self, mf: bool) -> Self {
        self.more_fragments = mf;
        self
    }

    pub fn fragment_offset(mut self, offset: u16) -> Self {
        self.fragment_offset = offset & 0x1FFF;
        self
    }

    pub fn ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn src_addr(mut self, addr: Ipv4Addr) -> Self {
        self.src_addr = addr;
        self
    }

    pub fn dst_addr(mut self, addr: Ipv4Addr) -> Self {
        self.dst_addr = addr;
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let total_length = (MIN_HEADER_SIZE + self.payload.len()) as u16;
        let mut buffer = vec![0u8; MIN_HEADER_SIZE + self.payload.len()];

        // Version (4) + IHL (5 = 20 bytes, no options)
        buffer[0] = 0x45;

        // Total length
        buffer[2..4].copy_from_slice(&total_length.to_be_bytes());

        // Identification
        buffer[4..6].copy_from_slice(&self.identification.to_be_bytes());

        // Flags + Fragment offset
        let mut flags_frag = self.fragment_offset;
        if self.more_fragments {
            flags_frag |= 0x2000;
        }
        buffer[6..8].copy_from_slice(&flags_frag.to_be_bytes());

        // TTL
        buffer[8] = self.ttl;

        // Protocol
        buffer[9] = self.protocol;

        // Source address
        buffer[12..16].copy_from_slice(&self.src_addr.octets());

        // Destination address
        buffer[16..20].copy_from_slice(&self.dst_addr.octets());

        // Payload
        buffer[MIN_HEADER_SIZE..].copy_from_slice(&self.payload);

        // Calculate checksum
        let sum = checksum(&buffer[..MIN_HEADER_SIZE]);
        buffer[10..12].copy_from_slice(&sum.to_be_bytes());

        buffer
    }
}

impl Default for Ipv4Builder {
    fn default() -> Self {
        Self::new()
    }
}
