//! Packet classification and destination rewriting.

mod classify;
mod observe;
mod rewrite;

pub use classify::matches;
pub use observe::hex_dump;
pub use rewrite::RewriteEngine;

/// What the engine did with one packet buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// No match, or the buffer could not be parsed; byte-identical
    Unchanged,
    /// Matched in observe mode; logged, buffer untouched
    Observed,
    /// Matched in redirect mode; destination fields and checksums rewritten
    Rewritten,
}
