use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<HashMap<_, _>>();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_point_at_local_services() {
    let settings = load_settings_from(None, env_from(&[]));
    assert_eq!(settings, Settings::default());
    assert_eq!(
        settings.moderation_url.as_deref(),
        Some("http://127.0.0.1:8000")
    );

    let config = settings.client_config();
    assert_eq!(config.moderation_timeout, Duration::from_secs(5));
    assert_eq!(config.author_name, DEFAULT_AUTHOR_NAME);
}

#[test]
fn file_values_override_defaults() {
    let raw = r#"
        store_url = "https://abc.supabase.co"
        store_anon_key = "anon"
        moderation_timeout_ms = 1500
        author_name = "Bạn"
    "#;
    let settings = load_settings_from(Some(raw), env_from(&[]));

    assert_eq!(settings.store_url, "https://abc.supabase.co");
    assert_eq!(settings.store_anon_key, "anon");
    assert_eq!(settings.moderation_timeout_ms, 1500);
    assert_eq!(settings.author_name, "Bạn");
}

#[test]
fn env_overrides_file_and_app_prefix_wins() {
    let raw = r#"store_url = "https://file.example""#;
    let settings = load_settings_from(
        Some(raw),
        env_from(&[
            ("NEXT_PUBLIC_SUPABASE_URL", "https://next.example"),
            ("APP__STORE_URL", "https://app.example"),
            ("NEXT_PUBLIC_SUPABASE_ANON_KEY", "next-key"),
        ]),
    );

    assert_eq!(settings.store_url, "https://app.example");
    assert_eq!(settings.store_anon_key, "next-key");
}

#[test]
fn moderation_can_be_switched_off() {
    for value in ["", "off", "NONE"] {
        let settings = load_settings_from(None, env_from(&[("FEED_MODERATION_URL", value)]));
        assert_eq!(settings.moderation_url, None, "value {value:?}");
        assert_eq!(settings.client_config().moderation_url, None);
    }
}

#[test]
fn invalid_values_keep_previous_setting() {
    let raw = r#"
        moderation_timeout_ms = "soon"
        store_timeout_ms = 0
        author_name = "   "
        nested = { a = 1 }
    "#;
    let settings = load_settings_from(Some(raw), env_from(&[]));

    assert_eq!(settings.moderation_timeout_ms, 5_000);
    assert_eq!(settings.store_timeout_ms, 10_000);
    assert_eq!(settings.author_name, DEFAULT_AUTHOR_NAME);
}

#[test]
fn unreadable_file_falls_back_to_defaults() {
    let settings = load_settings_from(Some("this is = = not toml"), env_from(&[]));
    assert_eq!(settings, Settings::default());
}

#[test]
fn load_settings_reads_file_from_disk() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("feed_cli_config_test_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let path = temp_root.join(DEFAULT_CONFIG_FILE);
    fs::write(&path, "moderation_model_label = \"custom-model\"\n").expect("write config");

    let settings = load_settings(&path);
    assert_eq!(settings.moderation_model_label, "custom-model");

    fs::remove_dir_all(temp_root).expect("cleanup");
}
