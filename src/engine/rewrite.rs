//! The rewrite engine: one buffer in, one disposition out.
//!
//! The engine never drops traffic. Any buffer it cannot fully account
//! for (short, not IPv4, fragmented, unknown transport, inconsistent
//! length fields) is left byte-identical and reported as `Unchanged`,
//! so the caller can forward it as-is.

use std::net::SocketAddrV4;
use std::sync::Arc;

use tracing::{debug, info, trace};

use super::{classify, observe, Disposition};
use crate::config::{MatchField, Mode, RuleStore};
use crate::protocol::ipv4::Ipv4Header;
use crate::protocol::{ParseError, Transport};
use crate::telemetry::EngineMetrics;

/// Applies the active rewrite rule to raw IPv4 packet buffers in place.
pub struct RewriteEngine {
    store: Arc<RuleStore>,
    metrics: Arc<EngineMetrics>,
    match_field: MatchField,
    mode: Mode,
    dump_payload: bool,
}

impl RewriteEngine {
    pub fn new(store: Arc<RuleStore>, metrics: Arc<EngineMetrics>) -> Self {
        Self {
            store,
            metrics,
            match_field: MatchField::default(),
            mode: Mode::default(),
            dump_payload: false,
        }
    }

    pub fn with_match_field(mut self, field: MatchField) -> Self {
        self.match_field = field;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_dump_payload(mut self, dump: bool) -> Self {
        self.dump_payload = dump;
        self
    }

    /// Classify one IPv4 packet and rewrite it in place if it matches.
    ///
    /// `buffer` starts at the IPv4 header. Trailing link-layer padding
    /// past the total-length field is ignored and preserved.
    pub fn process(&self, buffer: &mut [u8]) -> Disposition {
        self.metrics.packets_processed.inc();

        // One snapshot per packet; a concurrent reload cannot change
        // the rule mid-rewrite.
        let rule = self.store.current();

        let (mut ip, segment) = match Ipv4Header::parse(buffer) {
            Ok(parsed) => parsed,
            Err(e) => return self.pass_unparsed(e),
        };

        if ip.is_fragment() {
            self.metrics.fragments.inc();
            trace!(
                offset = ip.fragment_offset(),
                more = ip.more_fragments(),
                "fragment passed through"
            );
            return Disposition::Unchanged;
        }

        let mut transport = match Transport::parse(ip.protocol(), segment) {
            Ok(t) => t,
            Err(e) => return self.pass_unparsed(e),
        };

        if !classify::matches(&transport, self.match_field, &rule) {
            return Disposition::Unchanged;
        }
        self.metrics.matched.inc();

        let src = SocketAddrV4::new(ip.src_addr(), transport.src_port());
        let dst = SocketAddrV4::new(ip.dst_addr(), transport.dst_port());

        match self.mode {
            Mode::Observe => {
                info!(
                    protocol = transport.protocol().name(),
                    %src,
                    %dst,
                    "matched packet observed"
                );
                if self.dump_payload && !transport.payload().is_empty() {
                    debug!(
                        len = transport.payload().len(),
                        "payload:\n{}",
                        observe::hex_dump(transport.payload())
                    );
                }
                self.metrics.observed.inc();
                Disposition::Observed
            }
            Mode::Redirect => {
                ip.set_dst_addr(rule.target_addr);
                transport.set_dst_port(rule.target_port);
                // Transport checksum first: its pseudo-header needs the
                // rewritten destination address, while the IPv4 checksum
                // covers only the IPv4 header bytes.
                transport.update_checksum(ip.src_addr(), ip.dst_addr());
                ip.update_checksum();
                self.metrics.rewritten.inc();
                debug!(
                    protocol = transport.protocol().name(),
                    %src,
                    %dst,
                    target = %SocketAddrV4::new(rule.target_addr, rule.target_port),
                    "destination rewritten"
                );
                Disposition::Rewritten
            }
        }
    }

    fn pass_unparsed(&self, err: ParseError) -> Disposition {
        match err {
            ParseError::UnsupportedProtocol(_) => self.metrics.non_tcp_udp.inc(),
            _ => self.metrics.parse_failures.inc(),
        }
        trace!(error = %err, "passed through unparsed");
        Disposition::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewriteRule;
    use crate::protocol::ipv4::{Ipv4Builder, Protocol};
    use crate::protocol::tcp::{tcp_checksum, TcpHeader};
    use crate::protocol::udp::{UdpBuilder, UdpHeader};
    use std::net::Ipv4Addr;

    fn make_tcp_packet(
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut seg = vec![
            0x00, 0x00, // source port, filled below
            0x00, 0x00, // destination port, filled below
            0x00, 0x00, 0x00, 0x01, // sequence number
            0x00, 0x00, 0x00, 0x00, // acknowledgment number
            0x50, 0x18, // data offset 5, PSH+ACK
            0x72, 0x10, // window
            0x00, 0x00, // checksum, filled below
            0x00, 0x00, // urgent pointer
        ];
        seg[0..2].copy_from_slice(&src_port.to_be_bytes());
        seg[2..4].copy_from_slice(&dst_port.to_be_bytes());
        seg.extend_from_slice(payload);
        let sum = tcp_checksum(src_ip, dst_ip, &seg);
        seg[16..18].copy_from_slice(&sum.to_be_bytes());

        Ipv4Builder::new()
            .src_addr(src_ip)
            .dst_addr(dst_ip)
            .protocol(Protocol::Tcp as u8)
            .payload(&seg)
            .build()
    }

    fn make_udp_packet(
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
        payload: &[u8],
    ) -> Vec<u8> {
        let seg = UdpBuilder::new()
            .src_port(src_port)
            .dst_port(dst_port)
            .payload(payload)
            .build(src_ip, dst_ip);

        Ipv4Builder::new()
            .src_addr(src_ip)
            .dst_addr(dst_ip)
            .protocol(Protocol::Udp as u8)
            .payload(&seg)
            .build()
    }

    fn engine_with_rule(rule: RewriteRule) -> (RewriteEngine, Arc<RuleStore>, Arc<EngineMetrics>) {
        let store = Arc::new(RuleStore::new(rule));
        let metrics = Arc::new(EngineMetrics::new());
        let engine = RewriteEngine::new(Arc::clone(&store), Arc::clone(&metrics));
        (engine, store, metrics)
    }

    fn test_rule() -> RewriteRule {
        RewriteRule {
            match_port: 8080,
            target_addr: Ipv4Addr::new(10, 0, 0, 5),
            target_port: 9090,
        }
    }

    #[test]
    fn test_redirect_rewrites_matching_tcp() {
        let (engine, _, metrics) = engine_with_rule(test_rule());

        let src_ip = Ipv4Addr::new(192, 168, 0, 10);
        let mut packet = make_tcp_packet(
            src_ip,
            Ipv4Addr::new(203, 0, 113, 1),
            4000,
            8080,
            &[0xDE, 0xAD, 0xBE, 0xEF],
        );

        assert_eq!(engine.process(&mut packet), Disposition::Rewritten);
        assert_eq!(metrics.matched.get(), 1);
        assert_eq!(metrics.rewritten.get(), 1);

        let (ip, segment) = Ipv4Header::parse(&mut packet).unwrap();
        assert_eq!(ip.src_addr(), src_ip);
        assert_eq!(ip.dst_addr(), Ipv4Addr::new(10, 0, 0, 5));
        assert!(ip.validate_checksum());

        let tcp = TcpHeader::parse(segment).unwrap();
        assert_eq!(tcp.src_port(), 4000);
        assert_eq!(tcp.dst_port(), 9090);
        assert_eq!(tcp.payload(), &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(tcp.validate_checksum(src_ip, Ipv4Addr::new(10, 0, 0, 5)));
    }

    #[test]
    fn test_redirect_rewrites_matching_udp() {
        let (engine, _, _) = engine_with_rule(test_rule());

        let src_ip = Ipv4Addr::new(192, 168, 0, 10);
        let mut packet = make_udp_packet(
            src_ip,
            Ipv4Addr::new(203, 0, 113, 1),
            5353,
            8080,
            b"query",
        );

        assert_eq!(engine.process(&mut packet), Disposition::Rewritten);

        let (ip, segment) = Ipv4Header::parse(&mut packet).unwrap();
        assert_eq!(ip.dst_addr(), Ipv4Addr::new(10, 0, 0, 5));
        assert!(ip.validate_checksum());

        let udp = UdpHeader::parse(segment).unwrap();
        assert_eq!(udp.src_port(), 5353);
        assert_eq!(udp.dst_port(), 9090);
        assert_eq!(udp.payload(), b"query");
        assert!(udp.validate_checksum(src_ip, Ipv4Addr::new(10, 0, 0, 5)));
    }

    #[test]
    fn test_non_matching_packet_is_byte_identical() {
        let (engine, _, metrics) = engine_with_rule(test_rule());

        let mut packet = make_tcp_packet(
            Ipv4Addr::new(192, 168, 0, 10),
            Ipv4Addr::new(203, 0, 113, 1),
            4000,
            9999,
            &[0xDE, 0xAD],
        );
        let before = packet.clone();

        assert_eq!(engine.process(&mut packet), Disposition::Unchanged);
        assert_eq!(packet, before);
        assert_eq!(metrics.matched.get(), 0);
        assert_eq!(metrics.packets_processed.get(), 1);
    }

    #[test]
    fn test_only_destination_fields_change() {
        let (engine, _, _) = engine_with_rule(test_rule());

        let mut packet = make_tcp_packet(
            Ipv4Addr::new(192, 168, 0, 10),
            Ipv4Addr::new(203, 0, 113, 1),
            4000,
            8080,
            &[0x01, 0x02, 0x03],
        );
        let before = packet.clone();

        assert_eq!(engine.process(&mut packet), Disposition::Rewritten);

        // IPv4 checksum (10-11), destination address (16-19), TCP
        // destination port (22-23), TCP checksum (36-37).
        let allowed = [10usize, 11, 16, 17, 18, 19, 22, 23, 36, 37];
        let changed: Vec<usize> = before
            .iter()
            .zip(packet.iter())
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
            .collect();
        assert!(
            changed.iter().all(|i| allowed.contains(i)),
            "unexpected byte changes at {changed:?}"
        );
    }

    #[test]
    fn test_source_field_matching() {
        let (engine, _, _) = engine_with_rule(test_rule());
        let engine = engine.with_match_field(MatchField::Source);

        let mut packet = make_tcp_packet(
            Ipv4Addr::new(192, 168, 0, 10),
            Ipv4Addr::new(203, 0, 113, 1),
            8080,
            443,
            &[],
        );
        assert_eq!(engine.process(&mut packet), Disposition::Rewritten);

        let (ip, segment) = Ipv4Header::parse(&mut packet).unwrap();
        assert_eq!(ip.dst_addr(), Ipv4Addr::new(10, 0, 0, 5));
        let tcp = TcpHeader::parse(segment).unwrap();
        assert_eq!(tcp.src_port(), 8080);
        assert_eq!(tcp.dst_port(), 9090);
    }

    #[test]
    fn test_observe_mode_never_mutates() {
        let (engine, _, metrics) = engine_with_rule(test_rule());
        let engine = engine.with_mode(Mode::Observe).with_dump_payload(true);

        let mut packet = make_tcp_packet(
            Ipv4Addr::new(192, 168, 0, 10),
            Ipv4Addr::new(203, 0, 113, 1),
            4000,
            8080,
            &[0xDE, 0xAD, 0xBE, 0xEF],
        );
        let before = packet.clone();

        assert_eq!(engine.process(&mut packet), Disposition::Observed);
        assert_eq!(packet, before);
        assert_eq!(metrics.matched.get(), 1);
        assert_eq!(metrics.observed.get(), 1);
        assert_eq!(metrics.rewritten.get(), 0);
    }

    #[test]
    fn test_fragment_passed_through() {
        let (engine, _, metrics) = engine_with_rule(test_rule());

        let seg = make_tcp_packet(
            Ipv4Addr::new(192, 168, 0, 10),
            Ipv4Addr::new(203, 0, 113, 1),
            4000,
            8080,
            &[],
        )[20..]
            .to_vec();
        let mut packet = Ipv4Builder::new()
            .src_addr(Ipv4Addr::new(192, 168, 0, 10))
            .dst_addr(Ipv4Addr::new(203, 0, 113, 1))
            .protocol(Protocol::Tcp as u8)
            .more_fragments(true)
            .payload(&seg)
            .build();
        let before = packet.clone();

        assert_eq!(engine.process(&mut packet), Disposition::Unchanged);
        assert_eq!(packet, before);
        assert_eq!(metrics.fragments.get(), 1);
    }

    #[test]
    fn test_non_tcp_udp_passed_through() {
        let (engine, _, metrics) = engine_with_rule(test_rule());

        // ICMP echo request, protocol 1
        let mut packet = Ipv4Builder::new()
            .src_addr(Ipv4Addr::new(192, 168, 0, 10))
            .dst_addr(Ipv4Addr::new(203, 0, 113, 1))
            .protocol(1)
            .payload(&[0x08, 0x00, 0xf7, 0xff, 0x00, 0x00, 0x00, 0x00])
            .build();
        let before = packet.clone();

        assert_eq!(engine.process(&mut packet), Disposition::Unchanged);
        assert_eq!(packet, before);
        assert_eq!(metrics.non_tcp_udp.get(), 1);
        assert_eq!(metrics.parse_failures.get(), 0);
    }

    #[test]
    fn test_truncated_packet_passed_through() {
        let (engine, _, metrics) = engine_with_rule(test_rule());

        let mut packet = vec![0x45, 0x00, 0x00, 0x28, 0x00, 0x00];
        assert_eq!(engine.process(&mut packet), Disposition::Unchanged);
        assert_eq!(metrics.parse_failures.get(), 1);
    }

    #[test]
    fn test_rewrite_is_not_reapplied() {
        let (engine, _, metrics) = engine_with_rule(test_rule());

        let mut packet = make_tcp_packet(
            Ipv4Addr::new(192, 168, 0, 10),
            Ipv4Addr::new(203, 0, 113, 1),
            4000,
            8080,
            &[],
        );

        assert_eq!(engine.process(&mut packet), Disposition::Rewritten);
        let after_first = packet.clone();

        // Destination port is now 9090, so the rule no longer matches.
        assert_eq!(engine.process(&mut packet), Disposition::Unchanged);
        assert_eq!(packet, after_first);
        assert_eq!(metrics.rewritten.get(), 1);
    }

    #[test]
    fn test_reload_changes_matching() {
        let (engine, store, _) = engine_with_rule(test_rule());

        let mut packet = make_tcp_packet(
            Ipv4Addr::new(192, 168, 0, 10),
            Ipv4Addr::new(203, 0, 113, 1),
            4000,
            9999,
            &[],
        );
        assert_eq!(engine.process(&mut packet), Disposition::Unchanged);

        store.reload("9999 172.16.0.1 8443").unwrap();
        assert_eq!(engine.process(&mut packet), Disposition::Rewritten);

        let (ip, segment) = Ipv4Header::parse(&mut packet).unwrap();
        assert_eq!(ip.dst_addr(), Ipv4Addr::new(172, 16, 0, 1));
        let tcp = TcpHeader::parse(segment).unwrap();
        assert_eq!(tcp.dst_port(), 8443);
    }

    #[test]
    fn test_trailing_padding_preserved() {
        let (engine, _, _) = engine_with_rule(test_rule());

        let src_ip = Ipv4Addr::new(192, 168, 0, 10);
        let mut packet = make_tcp_packet(src_ip, Ipv4Addr::new(203, 0, 113, 1), 4000, 8080, &[]);
        // Short frames arrive padded to the Ethernet minimum; the pad
        // bytes sit past total_length and are not checksummed.
        packet.extend_from_slice(&[0xAA; 6]);

        assert_eq!(engine.process(&mut packet), Disposition::Rewritten);
        assert_eq!(&packet[packet.len() - 6..], &[0xAA; 6]);

        let (ip, segment) = Ipv4Header::parse(&mut packet).unwrap();
        assert!(ip.validate_checksum());
        let tcp = TcpHeader::parse(segment).unwrap();
        assert!(tcp.validate_checksum(src_ip, Ipv4Addr::new(10, 0, 0, 5)));
    }
}
