//! Configuration path resolution tests
//!
//! Tests that touch `BPC_CONFIG` are marked `#[serial]` so environment
//! mutations never race each other.

use bpc_common::config::{resolve_config_path, CONFIG_ENV_VAR};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[test]
#[serial]
fn test_cli_argument_wins_over_environment() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/bpc-env-config.toml");

    let resolved = resolve_config_path(Some(Path::new("/tmp/bpc-cli.toml")), CONFIG_ENV_VAR, "bpc-test");
    assert_eq!(resolved, Some(PathBuf::from("/tmp/bpc-cli.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_variable_used_without_cli() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/bpc-env-config.toml");

    let resolved = resolve_config_path(None, CONFIG_ENV_VAR, "bpc-test");
    assert_eq!(resolved, Some(PathBuf::from("/tmp/bpc-env-config.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_empty_environment_variable_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "");

    // Falls through to the platform directory, which does not hold a file for this app name
    let resolved = resolve_config_path(None, CONFIG_ENV_VAR, "bpc-test-nonexistent-app");
    assert_eq!(resolved, None);

    env::remove_var(CONFIG_ENV_VAR);
}
