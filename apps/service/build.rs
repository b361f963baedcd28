use std::{env::var, process::Command};

use dotenvy::dotenv;

const COMMIT_HASH_VAR: &str = "VICINITY_COMMIT_HASH";

fn git_commit_hash() -> Option<String> {
    let output = Command::new("git").args(["rev-parse", "--short", "HEAD"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}

fn main() {
    dotenv().ok();

    let hash = var(COMMIT_HASH_VAR)
        .ok()
        .filter(|hash| !hash.trim().is_empty())
        .or_else(git_commit_hash)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rerun-if-env-changed={COMMIT_HASH_VAR}");
    println!("cargo:rustc-env={COMMIT_HASH_VAR}={hash}");
}
