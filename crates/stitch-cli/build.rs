//! Build script stamping the binary version with the git commit.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    let package = env!("CARGO_PKG_VERSION");
    let version = match short_commit() {
        Some(commit) => format!("{} ({})", package, commit),
        None => package.to_string(),
    };

    println!("cargo:rustc-env=STITCH_VERSION={}", version);
}

fn short_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let commit = String::from_utf8(output.stdout).ok()?;
    let commit = commit.trim();
    (!commit.is_empty()).then(|| commit.to_string())
}
