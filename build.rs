use std::env;
use std::process::Command;

fn git_short_sha() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

fn main() {
    let version = env::var("FITSYNC_VERSION_STRING")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| {
            let pkg = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
            match git_short_sha() {
                Some(sha) => format!("{pkg}-dev.{sha}"),
                None => format!("{pkg}-dev"),
            }
        });
    println!("cargo:rustc-env=FITSYNC_VERSION_STRING={version}");
    println!("cargo:rerun-if-env-changed=FITSYNC_VERSION_STRING");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
