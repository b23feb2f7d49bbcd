use std::{env, fs};

use octofhir_server::AppConfig;
use octofhir_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("octofhir.toml");

    let toml_content = r#"
[terminology]
enabled = true
base_url = "http://terminology.local:9000/valuesets"
timeout_ms = 1500

[validation]
extra_code_systems = ["http://example.org/codes"]
allow_unknown_fields = false

[logging]
level = "debug"

[profiles]
structure_definitions = ["profiles/clinic-organization.xml"]

[storage]
backend = "memory"

[storage.options]
preallocate_items = 128
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.terminology.base_url, "http://terminology.local:9000/valuesets");
    assert_eq!(cfg.terminology.timeout_ms, 1500);
    assert_eq!(cfg.validation.extra_code_systems, ["http://example.org/codes"]);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(
        cfg.profiles.structure_definitions,
        [std::path::PathBuf::from("profiles/clinic-organization.xml")]
    );
    assert_eq!(cfg.storage.options.preallocate_items, Some(128));

    // 2) Env override should win over file
    unsafe {
        env::set_var("OCTOFHIR__TERMINOLOGY__TIMEOUT_MS", "2500");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.terminology.timeout_ms, 2500);
    unsafe {
        env::remove_var("OCTOFHIR__TERMINOLOGY__TIMEOUT_MS");
    }

    // 3) Invalid config should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[terminology]
base_url = "ftp://terminology.local/valuesets"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("must use http or https"));

    // 4) A serialized config loads back unchanged
    let mut original = AppConfig::default();
    original.terminology.enabled = false;
    original.logging.level = "warn".into();
    let roundtrip_path = dir.path().join("roundtrip.toml");
    fs::write(&roundtrip_path, toml::to_string(&original).expect("serialize config"))
        .expect("write roundtrip toml");
    let loaded = load_config(roundtrip_path.to_str()).expect("roundtrip parses");
    assert!(!loaded.terminology.enabled);
    assert_eq!(loaded.logging.level, "warn");
    assert_eq!(loaded.terminology.timeout_ms, original.terminology.timeout_ms);
}
