//! Packet capture I/O.
//!
//! AF_PACKET raw sockets bound to a single interface. Sockets are
//! opened for the IPv4 ethertype only, so the kernel filters non-IP
//! frames before they reach the engine.

mod af_packet;

pub use af_packet::AfPacketSocket;

use crate::Result;
use std::future::Future;

/// Raw frame I/O on one interface.
pub trait Capture: Send + Sync {
    /// Receive one frame into `buf`, returning its length.
    fn recv(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize>> + Send;

    /// Send one frame.
    fn send(&mut self, buf: &[u8]) -> impl Future<Output = Result<usize>> + Send;
}
