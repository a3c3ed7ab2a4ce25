use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct LedgerPaths {
    pub ledger_home: PathBuf,
    pub store_file: PathBuf,
    pub report_file: PathBuf,
    pub blobs_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl LedgerPaths {
    /// Lay out every artifact under a single root; used by tests and by
    /// callers that do not want environment overrides.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let ledger_home = root.into();
        Self {
            store_file: ledger_home.join("captured_records.json"),
            report_file: ledger_home.join("captured_records.txt"),
            blobs_dir: ledger_home.join("blobs"),
            logs_dir: ledger_home.join("logs"),
            ledger_home,
        }
    }

    pub fn lock_file(&self) -> PathBuf {
        self.ledger_home.join("ledger.lock")
    }
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<LedgerPaths> {
    let ledger_home = match env::var("LEDGER_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join(".client-ledger"),
    };
    let defaults = LedgerPaths::under(&ledger_home);

    Ok(LedgerPaths {
        store_file: env_or_default_path("LEDGER_STORE_FILE", defaults.store_file),
        report_file: env_or_default_path("LEDGER_REPORT_FILE", defaults.report_file),
        blobs_dir: env_or_default_path("LEDGER_BLOBS_DIR", defaults.blobs_dir),
        logs_dir: env_or_default_path("LEDGER_LOGS_DIR", defaults.logs_dir),
        ledger_home,
    })
}
