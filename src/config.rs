//! Engine configuration
//!
//! Defaults can be overridden from `MENUVM_*` environment variables, and
//! the CLI overrides those again.

use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },

    #[error("Root node must not be empty")]
    EmptyRoot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Node a new session starts in
    pub root: String,
    /// Session scope for persisted state; empty for an unscoped session
    pub session_id: String,
    /// Program flags beyond the reserved ones
    pub flag_count: u32,
    /// Maximum rendered output in bytes, 0 for unlimited
    pub output_size: usize,
    /// Maximum bytes held by the symbol table, 0 for unlimited
    pub cache_size: usize,
    pub language: Option<String>,
    /// Node entered when input matches no choice, if it exists
    pub catch_node: String,
    /// Node code loads allowed within one turn
    pub max_reloads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: "root".to_string(),
            session_id: String::new(),
            flag_count: 0,
            output_size: 0,
            cache_size: 0,
            language: None,
            catch_node: "_catch".to_string(),
            max_reloads: 16,
        }
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            value,
        })
}

impl Config {
    /// Defaults overlaid with any `MENUVM_*` variables that are set
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        if let Ok(root) = env::var("MENUVM_ROOT") {
            config.root = root;
        }
        if let Ok(session) = env::var("MENUVM_SESSION") {
            config.session_id = session;
        }
        if let Ok(v) = env::var("MENUVM_FLAG_COUNT") {
            config.flag_count = parse_var("MENUVM_FLAG_COUNT", v)?;
        }
        if let Ok(v) = env::var("MENUVM_OUTPUT_SIZE") {
            config.output_size = parse_var("MENUVM_OUTPUT_SIZE", v)?;
        }
        if let Ok(v) = env::var("MENUVM_CACHE_SIZE") {
            config.cache_size = parse_var("MENUVM_CACHE_SIZE", v)?;
        }
        if let Ok(language) = env::var("MENUVM_LANGUAGE") {
            config.language = Some(language).filter(|l| !l.is_empty());
        }
        if let Ok(node) = env::var("MENUVM_CATCH_NODE") {
            config.catch_node = node;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.is_empty() {
            return Err(ConfigError::EmptyRoot);
        }
        Ok(())
    }
}
