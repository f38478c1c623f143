use std::{fs, path::Path, str::FromStr};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_SETTINGS_FILE: &str = "chat.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    FullHistory,
    #[default]
    ChatProxy,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "full_history" => Ok(BackendKind::FullHistory),
            "chat_proxy" => Ok(BackendKind::ChatProxy),
            other => Err(anyhow!(
                "unknown chat backend '{other}' (expected full_history or chat_proxy)"
            )),
        }
    }
}

/// Deployment configuration. Values are handed to the backends untouched.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendKind,
    pub completion_url: String,
    pub completion_api_key: String,
    pub completion_model: String,
    pub proxy_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            completion_url: String::new(),
            completion_api_key: String::new(),
            completion_model: String::new(),
            proxy_base_url: "http://127.0.0.1:5000".into(),
        }
    }
}

/// Defaults, then the settings file, then the process environment.
///
/// An explicit `path` must exist; without one, `chat.toml` in the working
/// directory is read when present.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

pub fn load_settings_with(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = match path {
        Some(path) => read_settings_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_SETTINGS_FILE);
            if default_path.exists() {
                read_settings_file(default_path)?
            } else {
                Settings::default()
            }
        }
    };
    apply_env_overrides(&mut settings, lookup);
    Ok(settings)
}

fn read_settings_file(path: &Path) -> anyhow::Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    parse_settings(&raw)
        .with_context(|| format!("failed to parse settings file '{}'", path.display()))
}

pub fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    Ok(toml::from_str(raw)?)
}

/// `APP__*` keys win over the plain names.
pub fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let pick = |keys: &[&str]| keys.iter().rev().find_map(|key| lookup(*key));

    if let Some(v) = pick(&["CHAT_BACKEND", "APP__CHAT_BACKEND"]) {
        match v.parse::<BackendKind>() {
            Ok(kind) => settings.backend = kind,
            Err(error) => warn!(%error, "ignoring chat backend override"),
        }
    }
    if let Some(v) = pick(&["AZURE_API_URL", "APP__COMPLETION_URL"]) {
        settings.completion_url = v;
    }
    if let Some(v) = pick(&["AZURE_API_KEY", "APP__COMPLETION_API_KEY"]) {
        settings.completion_api_key = v;
    }
    if let Some(v) = pick(&["AZURE_MODEL_NAME", "APP__COMPLETION_MODEL"]) {
        settings.completion_model = v;
    }
    if let Some(v) = pick(&["BACKEND_URL", "APP__PROXY_BASE_URL"]) {
        settings.proxy_base_url = v;
    }
}
