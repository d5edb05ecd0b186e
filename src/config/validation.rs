//! Configuration validation

use super::{Config, MatchField, Mode};

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_rule(config, &mut result);
    validate_capture(config, &mut result);
    validate_control(config, &mut result);
    validate_log(config, &mut result);

    result
}

fn validate_rule(config: &Config, result: &mut ValidationResult) {
    let rule = &config.rule;

    if rule.match_port == 0 {
        result.warn("rule.match_port: port 0 is reserved and matches almost no traffic");
    }

    if rule.target_port == 0 {
        result.warn("rule.target_port: rewriting to port 0 produces unroutable packets");
    }

    if rule.target_ip.is_unspecified() {
        result.warn("rule.target_ip: 0.0.0.0 is not a usable destination");
    }

    if rule.target_ip.is_broadcast() {
        result.warn("rule.target_ip: rewriting destinations to the broadcast address");
    }

    // A rewritten packet that re-enters the hook would match again
    if config.engine.mode == Mode::Redirect
        && rule.match_field == MatchField::Destination
        && rule.match_port == rule.target_port
    {
        result.warn(format!(
            "rule: target_port equals match_port ({}); re-captured rewrites will match again",
            rule.target_port
        ));
    }
}

fn validate_capture(config: &Config, result: &mut ValidationResult) {
    if let Some(ref interface) = config.capture.interface {
        if interface.is_empty() {
            result.error("capture.interface: interface name is empty");
        }
    }

    if config.capture.reinject && config.capture.interface.is_none() {
        result.warn("capture.reinject: set without capture.interface, nothing to reinject on");
    }
}

fn validate_control(config: &Config, result: &mut ValidationResult) {
    if config.control.enabled && config.control.socket.as_os_str().is_empty() {
        result.error("control.socket: socket path is empty");
    }
}

fn validate_log(config: &Config, result: &mut ValidationResult) {
    let level = config.log.level.to_lowercase();
    if !matches!(
        level.as_str(),
        "error" | "warn" | "info" | "debug" | "trace"
    ) {
        result.warn(format!(
            "log.level: unknown level '{}', falling back to info",
            config.log.level
        ));
    }

    if !matches!(config.log.format.as_str(), "pretty" | "compact" | "json") {
        result.warn(format!(
            "log.format: unknown format '{}', falling back to pretty",
            config.log.format
        ));
    }
}
