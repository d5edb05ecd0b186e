//! The rewrite rule and its update grammars.

use std::fmt;
use std::net::Ipv4Addr;

/// Compiled-in defaults, used when nothing overrides them
pub const DEFAULT_MATCH_PORT: u16 = 8080;
pub const DEFAULT_TARGET_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 100);
pub const DEFAULT_TARGET_PORT: u16 = 80;

/// A single destination-rewrite rule.
///
/// The rule is `Copy`: readers snapshot it by value under the store's
/// read lock, so a concurrent reload is never observed half-applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteRule {
    /// Port compared against the configured match field
    pub match_port: u16,
    /// New destination address for matching packets
    pub target_addr: Ipv4Addr,
    /// New destination port for matching packets
    pub target_port: u16,
}

impl Default for RewriteRule {
    fn default() -> Self {
        Self {
            match_port: DEFAULT_MATCH_PORT,
            target_addr: DEFAULT_TARGET_ADDR,
            target_port: DEFAULT_TARGET_PORT,
        }
    }
}

impl fmt::Display for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}:{}",
            self.match_port, self.target_addr, self.target_port
        )
    }
}

/// Why a rule update was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("invalid update format: {0}")]
    InvalidFormat(String),

    #[error("invalid IPv4 address `{0}`")]
    InvalidAddress(String),

    #[error("invalid port `{0}`")]
    InvalidPort(String),
}

/// Parse a rule update in either grammar.
///
/// Updates containing `=` use the key=value grammar and overlay
/// `current`; anything else must be the whitespace triple
/// `<match_port> <target_ip> <target_port>`.
pub fn parse_update(text: &str, current: &RewriteRule) -> Result<RewriteRule, RuleError> {
    if text.trim().is_empty() {
        return Err(RuleError::InvalidFormat("empty update".into()));
    }

    if text.contains('=') {
        parse_assignments(text, current)
    } else {
        parse_triple(text)
    }
}

fn parse_triple(text: &str) -> Result<RewriteRule, RuleError> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(RuleError::InvalidFormat(format!(
            "expected `<match_port> <target_ip> <target_port>`, got {} fields",
            fields.len()
        )));
    }

    Ok(RewriteRule {
        match_port: parse_port(fields[0])?,
        target_addr: parse_addr(fields[1])?,
        target_port: parse_port(fields[2])?,
    })
}

/// One `key=value` per line. Keys not mentioned keep their current
/// value; a repeated key takes its last occurrence.
fn parse_assignments(text: &str, current: &RewriteRule) -> Result<RewriteRule, RuleError> {
    let mut rule = *current;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| RuleError::InvalidFormat(format!("missing `=` in `{line}`")))?;

        match key.trim() {
            "src_port" => rule.match_port = parse_port(value.trim())?,
            "target_ip" => rule.target_addr = parse_addr(value.trim())?,
            "target_port" => rule.target_port = parse_port(value.trim())?,
            other => {
                return Err(RuleError::InvalidFormat(format!("unknown key `{other}`")));
            }
        }
    }

    Ok(rule)
}

fn parse_port(s: &str) -> Result<u16, RuleError> {
    s.parse::<u16>()
        .map_err(|_| RuleError::InvalidPort(s.to_string()))
}

fn parse_addr(s: &str) -> Result<Ipv4Addr, RuleError> {
    s.parse::<Ipv4Addr>()
        .map_err(|_| RuleError::InvalidAddress(s.to_string()))
}
