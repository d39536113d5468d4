use std::process::Command;

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let hash = String::from_utf8(output.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}

fn build_version() -> String {
    if let Ok(version) = std::env::var("DESKTOP_TODO_VERSION") {
        let version = version.trim().trim_start_matches('v');
        if !version.is_empty() {
            return version.to_string();
        }
    }

    let base = env!("CARGO_PKG_VERSION");
    match git_short_hash() {
        Some(hash) => format!("{base}+{hash}"),
        None => base.to_string(),
    }
}

fn main() {
    println!("cargo:rerun-if-env-changed=DESKTOP_TODO_VERSION");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let version = build_version();
    println!("cargo:rustc-env=DESKTOP_TODO_BUILD_VERSION={version}");
}
