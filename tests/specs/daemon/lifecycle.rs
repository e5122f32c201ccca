//! Daemon lifecycle specs
//!
//! Verify startup, critical section activity and graceful shutdown.

use crate::prelude::*;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::Duration;

#[test]
fn daemon_writes_startup_marker() {
    let temp = Workspace::empty();
    let config = temp.loopback_config("alpha", 1);

    let _daemon = temp.spawn(&config);
    assert!(
        temp.log().contains("--- dimutexd: starting (pid: "),
        "log:\n{}",
        temp.log()
    );
}

#[test]
fn lone_daemon_enters_critical_section() {
    let temp = Workspace::empty();
    let config = temp.loopback_config("alpha", 1);

    let _daemon = temp.spawn(&config);
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while !temp.log().contains("alpha has released the critical section") {
        assert!(std::time::Instant::now() < deadline, "log:\n{}", temp.log());
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(temp.log().contains("alpha has gotten access to the critical section"));
}

#[test]
fn sigterm_shuts_down_gracefully() {
    let temp = Workspace::empty();
    let config = temp.loopback_config("alpha", 1);

    let daemon = temp.spawn(&config);
    kill(Pid::from_raw(daemon.pid()), Signal::SIGTERM).unwrap();
    let status = daemon.wait(Duration::from_secs(10));

    assert!(status.success(), "exit status: {status}");
    let log = temp.log();
    assert!(log.contains("Received SIGTERM"), "log:\n{log}");
    assert!(log.contains("dimutexd stopped"), "log:\n{log}");
}

#[test]
fn occupied_port_fails_startup() {
    let temp = Workspace::empty();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let config = temp.config(&format!(
        "[node]\nname = \"alpha\"\nid = 1\nlisten = \"127.0.0.1:{port}\"\n\n[gossip]\nbind = \"127.0.0.1:0\"\n\n[log]\npath = \"{}\"\n",
        temp.log_path().display()
    ));

    temp.dimutexd()
        .args(&["--config", config.to_str().unwrap()])
        .fails()
        .stderr_has("AddrInUse");
    assert!(temp.log().contains("ERROR Failed to start node"), "log:\n{}", temp.log());
}
