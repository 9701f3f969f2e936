//! Process-level settings read from the environment.

use std::env;

/// Enables model validation and verbose update logging when set to a truthy value.
pub const DEBUG_MODE_VAR: &str = "IDOM_DEBUG_MODE";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Validate every serialized model and log each update at debug level.
    pub debug_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let debug_mode = env::var(DEBUG_MODE_VAR)
            .map(|value| parse_flag(&value))
            .unwrap_or(false);
        if debug_mode {
            log::info!("{DEBUG_MODE_VAR} is set; layouts will validate their models");
        }
        Self { debug_mode }
    }

    pub fn with_debug_mode(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
