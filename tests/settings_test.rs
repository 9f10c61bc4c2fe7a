use voiceval_server::settings::{load_settings, save_settings, PersistentSettings};

#[test]
fn test_load_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let settings = load_settings(&dir.path().join("settings.json"));
    assert!(settings.judge_url.is_none());
    assert!(settings.judge_key.is_none());
    assert!(settings.use_model_grading.is_none());
}

#[test]
fn test_save_and_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    let settings = PersistentSettings {
        judge_url: Some("https://judge.example/v1/chat/completions".to_string()),
        judge_key: Some("sk-test".to_string()),
        judge_model: Some("judge-model-1".to_string()),
        use_model_grading: Some(true),
    };
    save_settings(&path, &settings);

    let loaded = load_settings(&path);
    assert_eq!(loaded.judge_url.as_deref(), Some("https://judge.example/v1/chat/completions"));
    assert_eq!(loaded.judge_key.as_deref(), Some("sk-test"));
    assert_eq!(loaded.judge_model.as_deref(), Some("judge-model-1"));
    assert_eq!(loaded.use_model_grading, Some(true));
}

#[test]
fn test_corrupt_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "not json at all {").unwrap();

    let settings = load_settings(&path);
    assert!(settings.judge_url.is_none());
}

#[test]
fn test_model_grading_requires_flag() {
    // Flag off: disabled regardless of the key
    let settings = PersistentSettings {
        judge_key: Some("sk-test".to_string()),
        use_model_grading: Some(false),
        ..Default::default()
    };
    assert!(!settings.model_grading_enabled());

    let settings = PersistentSettings::default();
    assert!(!settings.model_grading_enabled());
}
