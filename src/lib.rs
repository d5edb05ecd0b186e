//! Pktredir - IPv4 destination rewrite engine
//!
//! Classifies IPv4 TCP/UDP packets against a single hot-reloadable rule
//! and rewrites the destination address and port in place, keeping the
//! header and transport checksums valid.

pub mod capture;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod telemetry;

pub use error::{Error, Result};
