//! Shared helpers for the behavioral specs

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command as StdCommand, Output, Stdio};
use std::time::{Duration, Instant};

pub use tempfile::TempDir;

/// Scratch directory holding a node's config and log
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn log_path(&self) -> PathBuf {
        self.path().join("node.log")
    }

    /// Write `node.toml` and return its path
    pub fn config(&self, contents: &str) -> PathBuf {
        let path = self.path().join("node.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// A config for a node listening on loopback with ephemeral ports
    pub fn loopback_config(&self, name: &str, id: u64) -> PathBuf {
        self.config(&format!(
            r#"
[node]
name = "{name}"
id = {id}
listen = "127.0.0.1:0"

[gossip]
bind = "127.0.0.1:0"

[mutex]
request_interval = "50ms"

[critical_section]
hold = "10ms"

[log]
path = "{}"
"#,
            self.log_path().display()
        ))
    }

    pub fn log(&self) -> String {
        std::fs::read_to_string(self.log_path()).unwrap_or_default()
    }

    pub fn dimutexd(&self) -> Dimutexd {
        let mut cmd = assert_cmd::Command::cargo_bin("dimutexd").unwrap();
        cmd.current_dir(self.path())
            .env("XDG_STATE_HOME", self.path())
            .env_remove("DIMUTEX_NAME")
            .env_remove("DIMUTEX_ID")
            .env_remove("DIMUTEX_LISTEN")
            .env_remove("DIMUTEX_ADVERTISE")
            .env_remove("DIMUTEX_GOSSIP_BIND")
            .env_remove("DIMUTEX_SEEDS");
        Dimutexd { cmd }
    }

    /// Start the daemon in the background and wait for it to print READY
    pub fn spawn(&self, config: &Path) -> Running {
        let bin = assert_cmd::cargo::cargo_bin("dimutexd");
        let mut child = StdCommand::new(bin)
            .arg("--config")
            .arg(config)
            .current_dir(self.path())
            .env("RUST_LOG", "info")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        let stdout = child.stdout.take().unwrap();
        let mut lines = BufReader::new(stdout).lines();
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            assert!(Instant::now() < deadline, "daemon never became ready");
            match lines.next() {
                Some(Ok(line)) if line.trim() == "READY" => break,
                Some(Ok(_)) => continue,
                _ => panic!("daemon exited before becoming ready"),
            }
        }
        // Keep draining so the daemon never blocks on a full pipe
        std::thread::spawn(move || for _ in lines {});

        Running { child }
    }
}

pub struct Running {
    child: Child,
}

impl Running {
    pub fn pid(&self) -> i32 {
        self.child.id() as i32
    }

    /// Wait for exit, killing the process if it takes longer than `timeout`
    pub fn wait(mut self, timeout: Duration) -> std::process::ExitStatus {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait().unwrap() {
                return status;
            }
            if Instant::now() > deadline {
                let _ = self.child.kill();
                panic!("daemon did not exit within {timeout:?}");
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

pub struct Dimutexd {
    cmd: assert_cmd::Command,
}

impl Dimutexd {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.cmd.env(key, value);
        self
    }

    pub fn passes(mut self) -> Finished {
        let output = self.cmd.output().unwrap();
        assert!(output.status.success(), "expected success:\n{}", describe(&output));
        Finished { output }
    }

    pub fn fails(mut self) -> Finished {
        let output = self.cmd.output().unwrap();
        assert!(!output.status.success(), "expected failure:\n{}", describe(&output));
        Finished { output }
    }
}

pub struct Finished {
    output: Output,
}

impl Finished {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).to_string()
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        let stdout = self.stdout();
        assert!(stdout.contains(needle), "stdout lacks {needle:?}:\n{stdout}");
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        let stderr = String::from_utf8_lossy(&self.output.stderr).to_string();
        assert!(stderr.contains(needle), "stderr lacks {needle:?}:\n{stderr}");
        self
    }
}

fn describe(output: &Output) -> String {
    format!(
        "status: {}\nstdout:\n{}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}
