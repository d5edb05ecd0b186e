//! Ethernet frame parsing

use super::ParseError;

/// Ethernet header size (without FCS or VLAN tags)
pub const HEADER_SIZE: usize = 14;

/// EtherType for IPv4 payloads
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// Mutable view over an Ethernet frame.
///
/// Only untagged frames are taken apart. A VLAN-tagged frame reports
/// its TPID (0x8100) as the ethertype, so the IPv4 gate upstream
/// skips it without special handling.
#[derive(Debug)]
pub struct Frame<'a> {
    buffer: &'a mut [u8],
}

impl<'a> Frame<'a> {
    /// Parse an Ethernet frame from a buffer
    pub fn parse(buffer: &'a mut [u8]) -> Result<Self, ParseError> {
        if buffer.len() < HEADER_SIZE {
            return Err(ParseError::TooShort);
        }

        Ok(Self { buffer })
    }

    pub fn ethertype(&self) -> u16 {
        u16::from_be_bytes([self.buffer[12], self.buffer[13]])
    }

    pub fn is_ipv4(&self) -> bool {
        self.ethertype() == ETHERTYPE_IPV4
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer[HEADER_SIZE..]
    }

    /// Consume the view and return the mutable L3 payload
    pub fn into_payload(self) -> &'a mut [u8] {
        &mut self.buffer[HEADER_SIZE..]
    }
}

/// Builder for constructing Ethernet frames
pub struct FrameBuilder {
    buffer: Vec<u8>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn dst_mac(mut self, mac: [u8; 6]) -> Self {
        self.buffer.extend_from_slice(&mac);
        self
    }

    pub fn src_mac(mut self, mac: [u8; 6]) -> Self {
        self.buffer.extend_from_slice(&mac);
        self
    }

    pub fn ethertype(mut self, ethertype: u16) -> Self {
        self.buffer.extend_from_slice(&ethertype.to_be_bytes());
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.buffer.extend_from_slice(payload);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_frame(ethertype: u16) -> Vec<u8> {
        FrameBuilder::new()
            .dst_mac([0x02, 0x00, 0x00, 0x00, 0x00, 0x01])
            .src_mac([0x02, 0x00, 0x00, 0x00, 0x00, 0x02])
            .ethertype(ethertype)
            .payload(&[0xAA; 10])
            .build()
    }

    #[test]
    fn test_parse_frame() {
        let mut data = make_frame(ETHERTYPE_IPV4);
        let frame = Frame::parse(&mut data).unwrap();

        assert_eq!(frame.ethertype(), ETHERTYPE_IPV4);
        assert!(frame.is_ipv4());
        assert_eq!(frame.payload().len(), 10);
    }

    #[test]
    fn test_parse_too_short() {
        let mut data = vec![0u8; 13];
        assert_eq!(Frame::parse(&mut data).unwrap_err(), ParseError::TooShort);
    }

    #[test]
    fn test_non_ipv4_ethertype() {
        let mut data = make_frame(0x0806); // ARP
        let frame = Frame::parse(&mut data).unwrap();
        assert!(!frame.is_ipv4());
    }

    #[test]
    fn test_vlan_tagged_frame_reports_tpid() {
        let mut data = make_frame(0x8100);
        let frame = Frame::parse(&mut data).unwrap();
        assert_eq!(frame.ethertype(), 0x8100);
        assert!(!frame.is_ipv4());
    }

    #[test]
    fn test_into_payload_is_mutable() {
        let mut data = make_frame(ETHERTYPE_IPV4);
        {
            let frame = Frame::parse(&mut data).unwrap();
            let payload = frame.into_payload();
            payload[0] = 0x45;
        }
        assert_eq!(data[HEADER_SIZE], 0x45);
    }
}
