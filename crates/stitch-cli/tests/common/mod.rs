use std::path::Path;
use std::process::{Command, Output};

/// Run the CLI binary with arguments and no app configured.
pub fn run_cli(args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stitch"));
    cmd.args(args);
    cmd.env_remove("STITCH_APP_ID");
    cmd.env_remove("STITCH_BASE_URL");
    cmd.env_remove("STITCH_DATA_DIR");
    cmd.output().expect("Failed to execute CLI")
}

/// Run the CLI against `base_url` with sessions kept under `home`.
pub fn run_cli_with_env(args: &[&str], home: &Path, base_url: &str) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stitch"));
    cmd.args(args);
    cmd.env("HOME", home);
    cmd.env("XDG_DATA_HOME", home.join("data"));
    cmd.env("STITCH_APP_ID", "app-1");
    cmd.env("STITCH_BASE_URL", base_url);
    cmd.env("STITCH_DATA_DIR", home.join("sessions"));
    cmd.output().expect("Failed to execute CLI")
}

/// Run the CLI with an isolated environment and expect success.
pub fn run_cli_with_env_success(args: &[&str], home: &Path, base_url: &str) -> String {
    let output = run_cli_with_env(args, home, base_url);
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}
