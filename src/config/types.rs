//! Configuration types

use super::rule::{RewriteRule, DEFAULT_MATCH_PORT, DEFAULT_TARGET_ADDR, DEFAULT_TARGET_PORT};
use crate::telemetry::LogConfig;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Default control socket path, shared by the daemon and the `set` client
pub const DEFAULT_CONTROL_SOCKET: &str = "/run/pktredir.sock";

/// User-defined configuration (pktredir.toml)
///
/// Every section and every field has a default; an absent file is the
/// same as an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rule: RuleConfig,
    pub engine: EngineConfig,
    pub capture: CaptureConfig,
    pub control: ControlConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub match_port: u16,
    pub target_ip: Ipv4Addr,
    pub target_port: u16,
    pub match_field: MatchField,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            match_port: DEFAULT_MATCH_PORT,
            target_ip: DEFAULT_TARGET_ADDR,
            target_port: DEFAULT_TARGET_PORT,
            match_field: MatchField::default(),
        }
    }
}

impl RuleConfig {
    pub fn to_rule(&self) -> RewriteRule {
        RewriteRule {
            match_port: self.match_port,
            target_addr: self.target_ip,
            target_port: self.target_port,
        }
    }
}

/// Which transport port the classifier compares against the rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchField {
    Source,
    #[default]
    Destination,
}

/// What happens to a matching packet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Rewrite destination address and port, recompute checksums
    #[default]
    Redirect,
    /// Log the match, leave the packet untouched
    Observe,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: Mode,
    /// Hex-dump transport payloads of matching packets in observe mode
    pub dump_payload: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Interface to attach to; `run` refuses to start without one
    pub interface: Option<String>,
    pub promiscuous: bool,
    /// Send rewritten frames back out through the capture socket
    pub reinject: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub enabled: bool,
    pub socket: PathBuf,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket: PathBuf::from(DEFAULT_CONTROL_SOCKET),
        }
    }
}
