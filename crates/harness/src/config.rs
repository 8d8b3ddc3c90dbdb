//! Harness configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};
use crate::trace::{self, TraceFormatter};

/// Environment variable forcing the debug flag on or off
pub const DEBUG_ENV: &str = "REGRESS_DEBUG";

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Render full call stacks instead of suite-only frames
    pub debug: bool,

    /// Root of the suite's own source; frames under it are kept in traces
    pub suite_root: PathBuf,

    /// Directory receiving `test-results.json`
    pub output_dir: PathBuf,

    /// Run only tests carrying one of these tags
    pub tags: Vec<String>,

    /// Run only tests with one of these names
    pub names: Vec<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            debug: false,
            suite_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            output_dir: PathBuf::from("test-results"),
            tags: Vec::new(),
            names: Vec::new(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Self>(&content)?
        } else {
            debug!("No config at {}, using defaults", path.display());
            Self::default()
        };

        if let Ok(value) = std::env::var(DEBUG_ENV) {
            config.debug = parse_flag(&value)?;
        }

        Ok(config)
    }

    /// Install the process-wide debug flag
    pub fn apply(&self) {
        trace::set_debug(self.debug);
    }

    pub fn formatter(&self) -> TraceFormatter {
        TraceFormatter::new(&self.suite_root)
    }
}

fn parse_flag(value: &str) -> HarnessResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(HarnessError::InvalidConfig(format!(
            "{} must be a boolean, got '{}'",
            DEBUG_ENV, other
        ))),
    }
}
