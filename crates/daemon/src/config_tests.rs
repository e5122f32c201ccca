// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn empty_file_gives_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.node.listen.port(), 7400);
    assert_eq!(config.mutex.acquire_timeout, Duration::from_secs(30));
    assert_eq!(config.mutex.request_interval, Duration::from_secs(2));
    assert_eq!(config.critical_section.hold, Duration::from_secs(7));
    config.validate().unwrap();
}

#[test]
fn full_file_parses() {
    let config = Config::parse(
        r#"
[node]
name = "alpha"
id = 1
listen = "127.0.0.1:7500"
advertise = "10.0.0.1:7500"

[gossip]
bind = "127.0.0.1:7501"
seeds = ["10.0.0.2:7401", "10.0.0.3:7401"]
interval = "250ms"
suspect_timeout = "3s"
dead_timeout = "6s"

[mutex]
acquire_timeout = "10s"
request_interval = "1s"
rpc_timeout = "20s"

[critical_section]
hold = "500ms"
command = "echo hi"

[log]
path = "/tmp/alpha.log"
"#,
    )
    .unwrap();

    assert_eq!(config.identity(), NodeIdentity::new(1, "alpha"));
    assert_eq!(config.node.advertise, Some("10.0.0.1:7500".parse().unwrap()));
    assert_eq!(config.gossip.seeds.len(), 2);
    assert_eq!(config.gossip.interval, Duration::from_millis(250));
    assert_eq!(config.mutex.rpc_timeout, Duration::from_secs(20));
    assert_eq!(config.critical_section.command.as_deref(), Some("echo hi"));
    assert_eq!(config.log_path().unwrap(), PathBuf::from("/tmp/alpha.log"));

    let coordinator = config.coordinator();
    assert_eq!(coordinator.acquire_timeout, Duration::from_secs(10));
    assert_eq!(coordinator.request_interval, Duration::from_secs(1));
}

#[test]
fn unknown_field_is_rejected() {
    let err = Config::parse("[mutex]\nacquire_timout = \"1s\"\n").unwrap_err();
    assert!(err.to_string().contains("acquire_timout"), "{err}");
}

#[test]
fn bad_duration_is_rejected() {
    assert!(Config::parse("[mutex]\nacquire_timeout = \"soon\"\n").is_err());
}

#[test]
fn env_overrides_file() {
    let mut config = Config::parse("[node]\nname = \"alpha\"\nid = 1\n").unwrap();
    config
        .apply_env(env(&[
            ("DIMUTEX_NAME", "beta"),
            ("DIMUTEX_ID", "9"),
            ("DIMUTEX_LISTEN", "127.0.0.1:9000"),
            ("DIMUTEX_ADVERTISE", "192.168.1.9:9000"),
            ("DIMUTEX_GOSSIP_BIND", "127.0.0.1:9001"),
            ("DIMUTEX_SEEDS", "10.0.0.1:7401, 10.0.0.2:7401,"),
        ]))
        .unwrap();

    assert_eq!(config.identity(), NodeIdentity::new(9, "beta"));
    assert_eq!(config.node.listen.port(), 9000);
    assert_eq!(config.node.advertise.unwrap().port(), 9000);
    assert_eq!(config.gossip.bind.port(), 9001);
    assert_eq!(config.gossip.seeds.len(), 2);
}

#[test]
fn malformed_env_value_is_rejected() {
    let mut config = Config::default();
    let err = config.apply_env(env(&[("DIMUTEX_ID", "seven")])).unwrap_err();
    assert!(err.to_string().contains("DIMUTEX_ID"), "{err}");
}

#[test]
fn identity_is_resolved_from_partial_settings() {
    let mut config = Config::default();
    config.node.id = Some(4);
    config.resolve_identity();
    assert_eq!(config.identity(), NodeIdentity::new(4, "node-4"));

    let mut config = Config::default();
    config.node.name = Some("gamma".to_string());
    config.resolve_identity();
    assert_eq!(config.identity().name, "gamma");
    assert!(config.node.id.is_some());

    let mut config = Config::default();
    config.resolve_identity();
    assert!(config.identity().name.starts_with("node-"));
}

#[yare::parameterized(
    acquire = { "[mutex]\nacquire_timeout = \"0s\"\n" },
    interval = { "[mutex]\nrequest_interval = \"0s\"\n" },
    rpc = { "[mutex]\nrpc_timeout = \"0s\"\n" },
    gossip = { "[gossip]\ninterval = \"0s\"\n" },
    tombstone = { "[gossip]\ntombstone_timeout = \"0s\"\n" },
    dead_before_suspect = { "[gossip]\nsuspect_timeout = \"5s\"\ndead_timeout = \"5s\"\n" },
    empty_command = { "[critical_section]\ncommand = \" \"\n" },
    empty_name = { "[node]\nname = \"\"\n" },
)]
fn invalid_settings_fail_validation(text: &str) {
    let config = Config::parse(text).unwrap();
    assert!(matches!(config.validate(), Err(LifecycleError::Config(_))));
}

#[test]
fn resolved_config_prints_back_as_toml() {
    let mut config = Config::parse("[node]\nname = \"alpha\"\nid = 1\n").unwrap();
    config.resolve_identity();

    let text = config.to_toml().unwrap();
    assert!(text.contains("name = \"alpha\""), "{text}");
    assert!(text.contains("acquire_timeout = \"30s\""), "{text}");
    assert_eq!(Config::parse(&text).unwrap(), config);
}

#[test]
fn load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("node.toml");
    std::fs::write(&path, "[node]\nname = \"delta\"\nid = 3\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.identity().id, 3);
}

#[test]
fn load_reports_missing_file() {
    let err = Config::load(Some(Path::new("/nonexistent/dimutex.toml"))).unwrap_err();
    assert!(err.to_string().contains("cannot read"), "{err}");
}
