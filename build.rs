//! Collects every `LEDGER_*` name mentioned under `src/` so `status` can
//! point out environment variables nothing reads.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "LEDGER_";

fn source_files(root: &Path) -> Vec<PathBuf> {
    let mut pending = vec![root.to_path_buf()];
    let mut files = Vec::new();
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for path in entries.flatten().map(|entry| entry.path()) {
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

/// Identifier-shaped runs of `[A-Z0-9_]` that start with the prefix and
/// carry a name after it.
fn env_names(source: &str) -> impl Iterator<Item = &str> {
    source
        .split(|c: char| !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'))
        .filter(|token| token.len() > ENV_PREFIX.len() && token.starts_with(ENV_PREFIX))
        .filter(|token| !token.ends_with('_'))
}

fn render_allowlist(names: &BTreeSet<String>) -> String {
    let mut out = String::from("pub const GENERATED_LEDGER_ENV_ALLOWLIST: &[&str] = &[\n");
    for name in names {
        out.push_str(&format!("    {name:?},\n"));
    }
    out.push_str("];\n");
    out
}

fn main() {
    let files = source_files(Path::new("src"));
    let mut names = BTreeSet::new();
    for file in &files {
        println!("cargo:rerun-if-changed={}", file.display());
        if let Ok(source) = fs::read_to_string(file) {
            names.extend(env_names(&source).map(str::to_owned));
        }
    }
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");

    let out_dir = env::var_os("OUT_DIR").expect("cargo sets OUT_DIR for build scripts");
    let target = Path::new(&out_dir).join("ledger_env_allowlist.rs");
    fs::write(&target, render_allowlist(&names))
        .unwrap_or_else(|err| panic!("failed to write {}: {err}", target.display()));
}
