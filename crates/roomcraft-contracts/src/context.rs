use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
    System,
}

impl ThemeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
            ThemeMode::System => "system",
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            "system" => Ok(ThemeMode::System),
            other => Err(format!("unknown theme '{other}'")),
        }
    }
}

pub trait UiContext: Send + Sync {
    fn current_theme(&self) -> ThemeMode;

    fn current_language(&self) -> &str;

    /// Look up a translated message. `None` means the caller's English
    /// fallback is used.
    fn translate(&self, _key: &str) -> Option<String> {
        None
    }

    fn message(&self, key: &str, fallback: &str) -> String {
        self.translate(key)
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct StaticUiContext {
    theme: ThemeMode,
    language: String,
    messages: BTreeMap<String, String>,
}

impl Default for StaticUiContext {
    fn default() -> Self {
        Self::new(ThemeMode::default(), "en")
    }
}

impl StaticUiContext {
    pub fn new(theme: ThemeMode, language: impl Into<String>) -> Self {
        Self {
            theme,
            language: language.into(),
            messages: BTreeMap::new(),
        }
    }

    pub fn with_message(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.messages.insert(key.into(), text.into());
        self
    }
}

impl UiContext for StaticUiContext {
    fn current_theme(&self) -> ThemeMode {
        self.theme
    }

    fn current_language(&self) -> &str {
        &self.language
    }

    fn translate(&self, key: &str) -> Option<String> {
        self.messages.get(key).cloned()
    }
}
