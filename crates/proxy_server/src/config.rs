use std::{collections::HashMap, fs, path::Path};

pub const DEFAULT_SETTINGS_FILE: &str = "proxy.toml";

#[derive(Debug)]
pub struct Settings {
    pub server_bind: String,
    pub completion_url: String,
    pub completion_api_key: String,
    pub completion_model: String,
    pub api_version: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "0.0.0.0:5000".into(),
            completion_url: String::new(),
            completion_api_key: String::new(),
            completion_model: String::new(),
            api_version: Some("2024-12-01-preview".into()),
        }
    }
}

pub fn load_settings(path: &Path) -> Settings {
    load_settings_with(path, |key| std::env::var(key).ok())
}

pub fn load_settings_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file_values(&mut settings, &file_cfg);
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("AZURE_API_URL") {
        settings.completion_url = v;
    }
    if let Some(v) = env("APP__COMPLETION_URL") {
        settings.completion_url = v;
    }

    if let Some(v) = env("AZURE_API_KEY") {
        settings.completion_api_key = v;
    }
    if let Some(v) = env("APP__COMPLETION_API_KEY") {
        settings.completion_api_key = v;
    }

    if let Some(v) = env("AZURE_MODEL_NAME") {
        settings.completion_model = v;
    }
    if let Some(v) = env("APP__COMPLETION_MODEL") {
        settings.completion_model = v;
    }

    if let Some(v) = env("AZURE_API_VERSION") {
        settings.api_version = non_empty(v);
    }

    settings
}

fn apply_file_values(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("completion_url") {
        settings.completion_url = v.clone();
    }
    if let Some(v) = file_cfg.get("completion_api_key") {
        settings.completion_api_key = v.clone();
    }
    if let Some(v) = file_cfg.get("completion_model") {
        settings.completion_model = v.clone();
    }
    if let Some(v) = file_cfg.get("api_version") {
        settings.api_version = non_empty(v.clone());
    }
}

/// An empty api version disables the query parameter.
fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
