use std::fs;

use super::*;

#[test]
fn test_parse_full_config() {
    let config = Config::parse(
        r#"
[resolver]
base_dir = "game"
suffixes = ["mod", "toml"]
initializer = "setup"
auto_fetch = false
entry = ["app.Main"]

[paths]
"demo" = "lib/demo"
"physics" = "vendor/p2.toml"
"#,
        "/proj",
    )
    .unwrap();

    assert_eq!(config.resolver.base_dir, PathBuf::from("game"));
    assert_eq!(config.resolver.initializer, "setup");
    assert!(!config.resolver.auto_fetch);
    assert_eq!(config.resolver.entry, vec!["app.Main"]);
    assert_eq!(config.base_dir(), PathBuf::from("/proj/game"));

    let policy = config.path_policy();
    assert_eq!(policy.suffixes(), ["mod".to_string(), "toml".to_string()]);
    assert_eq!(
        policy.resolve("demo.Stage"),
        Some(PathBuf::from("/proj/game/lib/demo/Stage.mod"))
    );
    assert_eq!(
        policy.resolve("physics"),
        Some(PathBuf::from("/proj/game/vendor/p2.toml"))
    );

    let options = config.manager_options();
    assert_eq!(options.initializer, "setup");
    assert!(!options.auto_fetch);
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = Config::parse("", "/proj").unwrap();
    assert_eq!(config, Config::with_root("/proj"));
    assert_eq!(config.resolver.suffixes, vec!["toml"]);
    assert_eq!(config.resolver.initializer, "init");
    assert!(config.resolver.auto_fetch);
    assert!(config.paths.is_empty());
}

#[test]
fn test_unknown_key_reports_span() {
    let source = "[resolver]\nbase_dri = \"x\"\n";
    let err = Config::parse(source, "/proj").unwrap_err();
    assert!(err.message.contains("base_dri"), "{}", err.message);
    assert!(!err.span.is_dummy());
    assert!(err.help.is_some());
}

#[test]
fn test_rejects_empty_suffixes() {
    let err = Config::parse("[resolver]\nsuffixes = []\n", "/proj").unwrap_err();
    assert!(err.message.contains("suffixes"));
}

#[test]
fn test_rejects_malformed_prefix() {
    let err = Config::parse("[paths]\n\"a..b\" = \"x\"\n", "/proj").unwrap_err();
    assert!(err.message.contains("a..b"));
    assert!(err.help.as_deref().unwrap().contains("\"demo.shapes\""));
}

#[test]
fn test_load_and_find() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("src").join("deep");
    fs::create_dir_all(&nested).unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE),
        "[paths]\n\"\" = \"modules\"\n",
    )
    .unwrap();

    let found = Config::find(&nested).unwrap();
    assert_eq!(found, dir.path().join(CONFIG_FILE));

    let config = Config::load(&found).unwrap();
    assert_eq!(config.root_dir, dir.path());
    assert_eq!(
        config.path_policy().resolve("app.Main"),
        Some(dir.path().join("./modules/app/Main.toml"))
    );
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(&dir.path().join(CONFIG_FILE)).unwrap_err();
    assert!(err.message.contains("cannot read"));
}
