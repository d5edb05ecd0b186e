//! Network protocol implementations
//!
//! Zero-copy header views over caller-owned packet buffers. The
//! rewrite path mutates destination fields in place and recomputes
//! checksums through these views.

pub mod ethernet;
pub mod ipv4;
pub mod tcp;
pub mod transport;
pub mod udp;

pub use transport::Transport;

/// Why a packet could not be parsed.
///
/// The engine absorbs every variant as a pass-through; parse failures
/// never drop traffic and never reach the operator path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("buffer too short for header")]
    TooShort,

    #[error("not an IPv4 packet")]
    NotIpv4,

    #[error("inconsistent header length fields")]
    BadHeaderLength,

    #[error("unsupported transport protocol {0}")]
    UnsupportedProtocol(u8),
}
