use super::{load_settings_with, Settings};

use std::{
    collections::HashMap,
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn missing_file_keeps_defaults() {
    let settings = load_settings_with(
        &env::temp_dir().join("proxy_server_definitely_missing.toml"),
        no_env,
    );
    let defaults = Settings::default();
    assert_eq!(settings.server_bind, defaults.server_bind);
    assert_eq!(settings.api_version.as_deref(), Some("2024-12-01-preview"));
}

#[test]
fn file_values_then_environment_apply_in_order() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("proxy_server_config_test_{suffix}.toml"));
    fs::write(
        &path,
        "bind_addr = \"127.0.0.1:7000\"\ncompletion_model = \"from-file\"\napi_version = \"\"\n",
    )
    .expect("write");

    let vars: HashMap<&str, &str> = [
        ("AZURE_MODEL_NAME", "from-env"),
        ("APP__COMPLETION_MODEL", "from-prefixed-env"),
        ("AZURE_API_KEY", "secret"),
    ]
    .into_iter()
    .collect();
    let settings = load_settings_with(&path, |key| vars.get(key).map(|v| v.to_string()));

    assert_eq!(settings.server_bind, "127.0.0.1:7000");
    assert_eq!(settings.completion_model, "from-prefixed-env");
    assert_eq!(settings.completion_api_key, "secret");
    assert_eq!(settings.api_version, None);

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn malformed_file_is_ignored() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("proxy_server_bad_config_{suffix}.toml"));
    fs::write(&path, "this is = = not toml").expect("write");

    let settings = load_settings_with(&path, no_env);
    assert_eq!(settings.server_bind, "0.0.0.0:5000");

    fs::remove_file(path).expect("cleanup");
}
