//! Configuration specs
//!
//! Verify loading, overriding and validating the node configuration.

use crate::prelude::*;

#[test]
fn check_config_prints_defaults() {
    let temp = Workspace::empty();

    temp.dimutexd()
        .args(&["--check-config"])
        .passes()
        .stdout_has("[node]")
        .stdout_has("listen = \"0.0.0.0:7400\"")
        .stdout_has("acquire_timeout = \"30s\"")
        .stdout_has("hold = \"7s\"");
}

#[test]
fn check_config_generates_an_identity() {
    let temp = Workspace::empty();

    temp.dimutexd()
        .args(&["--check-config"])
        .passes()
        .stdout_has("name = \"node-");
}

#[test]
fn check_config_reads_file() {
    let temp = Workspace::empty();
    let config = temp.config("[node]\nname = \"alpha\"\nid = 1\n\n[mutex]\nrpc_timeout = \"15s\"\n");

    temp.dimutexd()
        .args(&["--check-config", "--config", config.to_str().unwrap()])
        .passes()
        .stdout_has("name = \"alpha\"")
        .stdout_has("rpc_timeout = \"15s\"");
}

#[test]
fn environment_overrides_file() {
    let temp = Workspace::empty();
    let config = temp.config("[node]\nname = \"alpha\"\nid = 1\n");

    temp.dimutexd()
        .args(&["--check-config", "--config", config.to_str().unwrap()])
        .env("DIMUTEX_NAME", "beta")
        .env("DIMUTEX_SEEDS", "10.0.0.2:7401,10.0.0.3:7401")
        .passes()
        .stdout_has("name = \"beta\"")
        .stdout_has("10.0.0.3:7401");
}

#[test]
fn zero_timeout_is_rejected() {
    let temp = Workspace::empty();
    let config = temp.config("[mutex]\nacquire_timeout = \"0s\"\n");

    temp.dimutexd()
        .args(&["--check-config", "--config", config.to_str().unwrap()])
        .fails()
        .stderr_has("acquire_timeout");
}

#[test]
fn malformed_file_is_rejected() {
    let temp = Workspace::empty();
    let config = temp.config("[node\nname = ");

    temp.dimutexd()
        .args(&["--config", config.to_str().unwrap()])
        .fails()
        .stderr_has("TOML parse error");
}

#[test]
fn missing_file_is_rejected() {
    let temp = Workspace::empty();

    temp.dimutexd()
        .args(&["--config", "/nonexistent/node.toml"])
        .fails()
        .stderr_has("cannot read");
}
