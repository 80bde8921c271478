/// Configuration schema and defaults for vcdash.
///
/// Defines the TOML-serializable configuration structure with the sections
/// `[general]`, `[backend]`, `[traces]`, `[logging]` and `[web]`.
///
/// Every field has a built-in default. Users only need to set the values
/// they want to override.
use serde::{Deserialize, Serialize};

use crate::locale::Locale;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level vcdash configuration.
///
/// Maps directly to the `~/.vcdash/config.toml` and `.vcdash.toml` file
/// schemas. All sections and fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcdashConfig {
    pub general: GeneralConfig,
    pub backend: BackendConfig,
    pub traces: TracesConfig,
    pub logging: LoggingConfig,
    pub web: WebConfig,
}

// ---------------------------------------------------------------------------
// [general]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Language of the fixed messages the client emits: `zh` or `en`.
    pub locale: Locale,
}

// ---------------------------------------------------------------------------
// [backend]
// ---------------------------------------------------------------------------

/// Where the command backend lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend HTTP service.
    pub url: String,
    /// Per-request timeout in milliseconds. Chat turns run a multi-agent
    /// workflow, so this is generous.
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            timeout_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// [traces]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracesConfig {
    /// Number of log rows fetched per trace reload.
    pub limit: usize,
}

impl Default for TracesConfig {
    fn default() -> Self {
        Self { limit: 50 }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether the JSONL event log is written.
    pub enabled: bool,
    /// Path to the event log file. `~` is expanded to the home directory.
    pub path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.vcdash/events.jsonl".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [web]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address of the local dashboard API.
    pub addr: String,
    /// Open the dashboard in the default browser on start.
    pub open_browser: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:9747".to_string(),
            open_browser: false,
        }
    }
}

impl VcdashConfig {
    /// The annotated default config written by `vcdash config init`.
    pub fn default_toml() -> String {
        r#"# vcdash configuration
# Dashboard client for the vehicle-command assistant backend
#
# Configuration hierarchy (highest precedence wins):
#   1. Environment variables (VCDASH_*)
#   2. Project config (.vcdash.toml in current directory)
#   3. User global config (~/.vcdash/config.toml)
#   4. Built-in defaults

[general]
locale = "zh"                         # zh | en

[backend]
url = "http://localhost:8000"
timeout_ms = 30000

[traces]
limit = 50                            # rows per GET /logs

[logging]
enabled = true
path = "~/.vcdash/events.jsonl"

[web]
addr = "127.0.0.1:9747"
open_browser = false
"#
        .to_string()
    }
}
