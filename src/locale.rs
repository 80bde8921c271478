//! Fixed localized strings used by the core.
//!
//! Only the handful of messages the components themselves emit live here;
//! full UI string tables belong to the presentation layer.

use serde::{Deserialize, Serialize};

/// Display language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Zh,
    En,
}

impl Locale {
    /// Parse a locale tag such as `"zh"`, `"zh-CN"` or `"en_US"`.
    pub fn parse(val: &str) -> Option<Self> {
        let lower = val.to_ascii_lowercase();
        let lang = lower.split(['-', '_']).next().unwrap_or("");
        match lang {
            "zh" => Some(Self::Zh),
            "en" => Some(Self::En),
            _ => None,
        }
    }

    /// Agent message appended when a chat request cannot be delivered.
    pub fn connect_error(self) -> &'static str {
        match self {
            Self::Zh => "连接服务器失败",
            Self::En => "Failed to connect server",
        }
    }

    /// Fallback when a failed request carries no backend detail.
    pub fn request_failed(self) -> &'static str {
        match self {
            Self::Zh => "请求失败",
            Self::En => "Request failed",
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zh => write!(f, "zh"),
            Self::En => write!(f, "en"),
        }
    }
}
