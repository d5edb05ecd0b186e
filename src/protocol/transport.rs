//! Transport-layer dispatch for the rewrite path.

use super::ipv4::Protocol;
use super::tcp::TcpHeader;
use super::udp::UdpHeader;
use super::ParseError;
use std::net::Ipv4Addr;

/// A parsed TCP or UDP view over a transport segment.
///
/// The engine classifies and rewrites through this enum so the two
/// transports share one code path; everything protocol-specific
/// (header layout, checksum coverage, the UDP zero rule) stays in the
/// per-protocol views.
#[derive(Debug)]
pub enum Transport<'a> {
    Tcp(TcpHeader<'a>),
    Udp(UdpHeader<'a>),
}

impl<'a> Transport<'a> {
    /// Parse the segment according to the IPv4 protocol field.
    pub fn parse(protocol: u8, segment: &'a mut [u8]) -> Result<Self, ParseError> {
        match Protocol::from_u8(protocol) {
            Some(Protocol::Tcp) => Ok(Transport::Tcp(TcpHeader::parse(segment)?)),
            Some(Protocol::Udp) => Ok(Transport::Udp(UdpHeader::parse(segment)?)),
            None => Err(ParseError::UnsupportedProtocol(protocol)),
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Transport::Tcp(_) => Protocol::Tcp,
            Transport::Udp(_) => Protocol::Udp,
        }
    }

    pub fn src_port(&self) -> u16 {
        match self {
            Transport::Tcp(hdr) => hdr.src_port(),
            Transport::Udp(hdr) => hdr.src_port(),
        }
    }

    pub fn dst_port(&self) -> u16 {
        match self {
            Transport::Tcp(hdr) => hdr.dst_port(),
            Transport::Udp(hdr) => hdr.dst_port(),
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Transport::Tcp(hdr) => hdr.payload(),
            Transport::Udp(hdr) => hdr.payload(),
        }
    }

    /// Set destination port (checksum must be updated separately)
    pub fn set_dst_port(&mut self, port: u16) {
        match self {
            Transport::Tcp(hdr) => hdr.set_dst_port(port),
            Transport::Udp(hdr) => hdr.set_dst_port(port),
        }
    }

    /// Recompute the transport checksum with the given address pair
    pub fn update_checksum(&mut self, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) {
        match self {
            Transport::Tcp(hdr) => hdr.update_checksum(src_ip, dst_ip),
            Transport::Udp(hdr) => hdr.update_checksum(src_ip, dst_ip),
        }
    }

    pub fn validate_checksum(&self, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> bool {
        match self {
            Transport::Tcp(hdr) => hdr.validate_checksum(src_ip, dst_ip),
            Transport::Udp(hdr) => hdr.validate_checksum(src_ip, dst_ip),
        }
    }
}
