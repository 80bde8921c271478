//! Dashboard configuration.
//!
//! Resolution order, later wins:
//!
//! 1. built-in defaults ([`VcdashConfig::default`])
//! 2. `~/.vcdash/config.toml`
//! 3. `.vcdash.toml` in the working directory
//! 4. `VCDASH_*` environment variables
//!
//! A file that is missing or fails to parse is skipped, so the dashboard
//! always comes up, falling back to defaults if need be.
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::locale::Locale;

pub use schema::VcdashConfig;

const GLOBAL_DIR: &str = ".vcdash";
const GLOBAL_FILE: &str = "config.toml";
const PROJECT_FILE: &str = ".vcdash.toml";

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve the effective configuration.
pub fn load() -> VcdashConfig {
    // Each file replaces the previous layer wholesale; keys it omits fall
    // back to defaults through `serde(default)`.
    let mut config = [global_config_file(), project_config_file()]
        .into_iter()
        .flatten()
        .filter_map(|path| read_layer(&path))
        .last()
        .unwrap_or_default();

    for (var, apply) in ENV_OVERRIDES {
        if let Ok(raw) = std::env::var(var) {
            apply(&mut config, raw.trim());
        }
    }
    config
}

fn read_layer(path: &Path) -> Option<VcdashConfig> {
    let text = fs::read_to_string(path).ok()?;
    match toml::from_str(&text) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("[vcdash] ignoring {}: {e}", path.display());
            None
        }
    }
}

/// `~/.vcdash/config.toml`, if a home directory is known.
pub fn global_config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_DIR).join(GLOBAL_FILE))
}

/// `.vcdash.toml` in the working directory.
pub fn project_config_file() -> Option<PathBuf> {
    std::env::current_dir().ok().map(|cwd| cwd.join(PROJECT_FILE))
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

type Override = fn(&mut VcdashConfig, &str);

/// Variables that take precedence over every file. Unparseable values are
/// ignored.
const ENV_OVERRIDES: [(&str, Override); 6] = [
    ("VCDASH_LOCALE", |c, v| {
        if let Some(locale) = Locale::parse(v) {
            c.general.locale = locale;
        }
    }),
    ("VCDASH_BACKEND_URL", |c, v| {
        if !v.is_empty() {
            c.backend.url = v.to_string();
        }
    }),
    ("VCDASH_TIMEOUT_MS", |c, v| {
        if let Ok(ms) = v.parse() {
            c.backend.timeout_ms = ms;
        }
    }),
    ("VCDASH_TRACE_LIMIT", |c, v| {
        if let Ok(limit) = v.parse() {
            c.traces.limit = limit;
        }
    }),
    ("VCDASH_LOG", |c, v| {
        if let Some(on) = parse_flag(v) {
            c.logging.enabled = on;
        }
    }),
    ("VCDASH_WEB_ADDR", |c, v| {
        if !v.is_empty() {
            c.web.addr = v.to_string();
        }
    }),
];

/// `on`/`off` style switch. `None` when the word is not recognized.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Editing the global file
// ---------------------------------------------------------------------------

fn global_path_or_err() -> Result<PathBuf> {
    global_config_file().context("no home directory; cannot locate ~/.vcdash/config.toml")
}

fn write_global(path: &Path, text: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

/// Write the annotated defaults to the global file. Refuses to clobber an
/// existing file unless `force`.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_path_or_err()?;
    if !force && path.exists() {
        anyhow::bail!("{} already exists (pass --force to replace it)", path.display());
    }
    write_global(&path, &VcdashConfig::default_toml())?;
    Ok(path)
}

/// Overwrite the global file with defaults.
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Update one dotted key (`backend.url`, `traces.limit`, ...) in the global
/// file, creating it from defaults if absent. The new value takes the type
/// of the value it replaces, and the result must still load as a
/// [`VcdashConfig`] before anything is written.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_path_or_err()?;
    let current = if path.exists() {
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?
    } else {
        toml::to_string_pretty(&VcdashConfig::default())?
    };

    let mut doc: toml::Value = toml::from_str(&current)
        .with_context(|| format!("{} is not valid TOML", path.display()))?;
    assign(&mut doc, key, value)?;

    let updated = toml::to_string_pretty(&doc)?;
    toml::from_str::<VcdashConfig>(&updated)
        .with_context(|| format!("'{value}' is not a valid value for {key}"))?;
    write_global(&path, &updated)
}

/// Replace the value at a dotted path, converting `raw` to the existing
/// value's type. Unknown keys are an error; the schema has no free-form maps.
fn assign(doc: &mut toml::Value, key: &str, raw: &str) -> Result<()> {
    let (section_path, leaf) = match key.rsplit_once('.') {
        Some((sections, leaf)) => (Some(sections), leaf),
        None => (None, key),
    };
    if leaf.is_empty() {
        anyhow::bail!("empty config key");
    }

    let mut node = doc;
    for section in section_path.into_iter().flat_map(|s| s.split('.')) {
        node = node
            .get_mut(section)
            .with_context(|| format!("unknown config section '{section}' in {key}"))?;
    }
    let table = node
        .as_table_mut()
        .with_context(|| format!("{key}: parent is not a section"))?;

    let slot = table
        .get_mut(leaf)
        .with_context(|| format!("unknown config key {key}"))?;
    *slot = match &*slot {
        toml::Value::Boolean(_) => toml::Value::Boolean(
            parse_flag(raw).with_context(|| format!("{key} expects on/off, got '{raw}'"))?,
        ),
        toml::Value::Integer(_) => toml::Value::Integer(
            raw.parse()
                .with_context(|| format!("{key} expects a whole number, got '{raw}'"))?,
        ),
        _ => toml::Value::String(raw.to_string()),
    };
    Ok(())
}

/// The resolved configuration rendered back to TOML.
pub fn show_effective_config() -> Result<String> {
    Ok(toml::to_string_pretty(&load())?)
}
