use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use ci_stages::cli::StageArgs;
use ci_stages::load_config::{load_config, resolve_config, CONFIG_ENV};
use ci_stages_core::config::{StagesConfig, ToolCommand};
use ci_stages_core::stages::Stage;

/// A partial config overrides only what it names.
#[test]
fn test_load_config_partial_overrides() {
    let config_yaml = r#"
layout:
  publish_context: docker/release
  dockerfile: Containerfile
tools:
  container_build:
    program: podman
    args: [build, --pull]
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.layout.publish_context, PathBuf::from("docker/release"));
    assert_eq!(config.layout.dockerfile, "Containerfile");
    assert_eq!(config.layout.descriptor_file, "app-info.yml");
    assert_eq!(
        config.tools.container_build,
        ToolCommand::new("podman").with_args(["build", "--pull"])
    );
    assert_eq!(
        config.tools.increment_build_number,
        StagesConfig::default().tools.increment_build_number
    );
}

/// Tool entries without `args` get an empty prefix.
#[test]
fn test_load_config_tool_without_args() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(
        config_file.path(),
        "tools:\n  stop_compose_service:\n    program: /opt/ci/stop.sh\n",
    )
    .unwrap();

    let config = load_config(config_file.path()).expect("Config should load");
    assert_eq!(config.tools.stop_compose_service.program, "/opt/ci/stop.sh");
    assert!(config.tools.stop_compose_service.args.is_empty());
}

#[test]
fn test_load_config_empty_file_uses_defaults() {
    let config_file = NamedTempFile::new().expect("temp file");
    let config = load_config(config_file.path()).expect("Empty config should load");
    assert_eq!(config, StagesConfig::default());
}

#[test]
fn test_load_config_errors_for_invalid_file() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), b"layout: [:::").unwrap();

    let err = load_config(config_file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
fn test_load_config_errors_for_missing_file() {
    let err = load_config("/definitely/not/here/stages.yml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_resolve_config_without_path_is_default() {
    let config = resolve_config(None).expect("defaults always resolve");
    assert_eq!(config, StagesConfig::default());
    assert_eq!(config.tools.container_build.program, "docker");
}

/// `--config` falls back to the environment variable.
#[test]
#[serial]
fn test_config_flag_reads_environment() {
    env::set_var(CONFIG_ENV, "/etc/ci-stages/stages.yml");
    let matches = StageArgs::command_for(Stage::Test)
        .try_get_matches_from(["ci-test", "--repo-dir", "/work/acme-api"])
        .expect("arguments should parse");
    env::remove_var(CONFIG_ENV);

    let args = <StageArgs as clap::FromArgMatches>::from_arg_matches(&matches).unwrap();
    assert_eq!(args.config, Some(PathBuf::from("/etc/ci-stages/stages.yml")));
    assert_eq!(args.repo_dir.as_deref(), Some("/work/acme-api"));
    assert_eq!(args.ci_metadata_dir, None);
}

#[test]
#[serial]
fn test_config_flag_wins_over_environment() {
    env::set_var(CONFIG_ENV, "/etc/ci-stages/stages.yml");
    let matches = StageArgs::command_for(Stage::Publish)
        .try_get_matches_from(["ci-publish", "--config", "./local.yml"])
        .expect("arguments should parse");
    env::remove_var(CONFIG_ENV);

    let args = <StageArgs as clap::FromArgMatches>::from_arg_matches(&matches).unwrap();
    assert_eq!(args.config, Some(PathBuf::from("./local.yml")));
}
