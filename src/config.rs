//! Config & errors (C0, ambient): the explicit configuration record and its loader.
//!
//! Config flags (deduplicate on/off, which issue kinds to report) enter the core via this
//! explicit record, never through ambient/global state (§9) — every report-engine entry point
//! takes a `&Config` directly.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// The explicit configuration record (§3 "Configuration record").
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collapse same-location reports to the highest-weight one (§4.7 "Deduplication at sink").
    /// When `false`, every report is emitted, even duplicates at the same source location.
    pub deduplicate: bool,
    /// Master switch for §4.7 step 5 (cross-procedure deadlock detection).
    pub report_deadlocks: bool,
    /// Master switch for §4.7 steps 3-4 (UI-thread starvation and Strict-Mode reporting).
    pub report_starvation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            deduplicate: true,
            report_deadlocks: true,
            report_starvation: true,
        }
    }
}

/// Attempts to load config from the `lockcheck.toml` config file.
///
/// This will search all parent directories that contain a `Cargo.toml` file, and try to load the
/// `lockcheck.toml` from the same directory. Mirrors how the rest of the lockcheck family locates
/// its own per-crate configuration.
pub fn load_config() -> Result<Config> {
    let current_dir = std::env::current_dir()?;

    for dir in current_dir.ancestors() {
        if dir.join("Cargo.toml").exists() {
            let lockcheck_config_path = dir.join("lockcheck.toml");
            if !lockcheck_config_path.exists() {
                continue;
            }

            let config_data = std::fs::read_to_string(lockcheck_config_path)?;
            let config: Config =
                toml::from_str(&config_data).with_context(|| "invalid format of lockcheck config file")?;

            return Ok(config);
        }
    }

    Err(anyhow!("Could not find `lockcheck.toml` config file"))
}
