//! Configuration management
//!
//! Startup configuration comes from pktredir.toml. The active rewrite
//! rule lives in a [`RuleStore`] and can be replaced at runtime
//! through the control channel without touching the file.

mod rule;
mod store;
mod types;
pub mod validation;

pub use rule::{
    parse_update, RewriteRule, RuleError, DEFAULT_MATCH_PORT, DEFAULT_TARGET_ADDR,
    DEFAULT_TARGET_PORT,
};
pub use store::RuleStore;
pub use types::*;
pub use validation::{validate, ValidationResult};

use crate::{Error, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    let config: Config = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
    Ok(config)
}
