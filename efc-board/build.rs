//! Stamps the binary with `EFC_BUILD_ID`, e.g. `a1b2c3d4-dirty release 2026-10-16`
//!
//! Reported in the startup log line and by `/health`.

use std::process::Command;

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let revision = String::from_utf8(output.stdout).ok()?;
    Some(revision.trim().to_string()).filter(|r| !r.is_empty())
}

fn main() {
    let revision = git_revision().unwrap_or_else(|| "nogit".to_string());
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let date = chrono::Utc::now().format("%Y-%m-%d");

    println!("cargo:rustc-env=EFC_BUILD_ID={} {} {}", revision, profile, date);
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
