//! Command-line surface specs

use crate::prelude::*;

#[test]
fn help_lists_flags() {
    let temp = Workspace::empty();

    temp.dimutexd()
        .args(&["--help"])
        .passes()
        .stdout_has("--config")
        .stdout_has("--check-config");
}

#[test]
fn version_is_printed() {
    let temp = Workspace::empty();

    temp.dimutexd()
        .args(&["--version"])
        .passes()
        .stdout_has(env!("CARGO_PKG_VERSION"));
}

#[test]
fn unknown_flag_fails() {
    let temp = Workspace::empty();

    temp.dimutexd()
        .args(&["--frobnicate"])
        .fails()
        .stderr_has("--frobnicate");
}
