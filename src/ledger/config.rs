use crate::error::LedgerError;
use crate::ledger::report::ReportStyle;
use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

include!(concat!(env!("OUT_DIR"), "/ledger_env_allowlist.rs"));

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LedgerStoreConfig {
    /// Skip the store write (and report regeneration) when a merge only
    /// moves the timestamp forward.
    #[serde(default)]
    pub skip_timestamp_only_writes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerReportConfig {
    pub timezone: String,
    pub banner: String,
}

impl Default for LedgerReportConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            banner: "Record".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerBlobsConfig {
    pub max_bytes: u64,
}

impl Default for LedgerBlobsConfig {
    fn default() -> Self {
        Self {
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerGeoConfig {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for LedgerGeoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://ipinfo.io".to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LedgerConfig {
    pub store: LedgerStoreConfig,
    pub report: LedgerReportConfig,
    pub blobs: LedgerBlobsConfig,
    pub geo: LedgerGeoConfig,
}

impl LedgerConfig {
    pub fn report_style(&self) -> Result<ReportStyle> {
        Ok(ReportStyle {
            banner: self.report.banner.clone(),
            timezone: parse_timezone(&self.report.timezone)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLedgerConfig {
    store: Option<LedgerStoreConfig>,
    report: Option<LedgerReportConfig>,
    blobs: Option<LedgerBlobsConfig>,
    geo: Option<LedgerGeoConfig>,
}

fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|err| anyhow!("invalid report timezone `{name}`: {err}"))
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    LedgerError::InvalidConfig(message.into()).into()
}

pub fn validate(cfg: &LedgerConfig) -> Result<()> {
    parse_timezone(&cfg.report.timezone).map_err(|err| invalid(err.to_string()))?;
    if cfg.report.banner.trim().is_empty() {
        return Err(invalid("report banner cannot be empty"));
    }
    if cfg.report.banner.contains('\n') {
        return Err(invalid("report banner must be a single line"));
    }
    if cfg.blobs.max_bytes == 0 {
        return Err(invalid("blob max bytes must be >= 1"));
    }
    if cfg.geo.enabled {
        if cfg.geo.timeout_secs == 0 {
            return Err(invalid("geo timeout must be >= 1 second"));
        }
        let url = cfg.geo.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid("geo base url must start with http:// or https://"));
        }
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("LEDGER_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".client-ledger").join("ledger.toml"))
}

fn merge_toml(base: &mut LedgerConfig, raw: &str) -> Result<()> {
    let parsed: PartialLedgerConfig =
        toml::from_str(raw).map_err(|err| invalid(format!("failed to parse config: {err}")))?;
    if let Some(store) = parsed.store {
        base.store = store;
    }
    if let Some(report) = parsed.report {
        base.report = report;
    }
    if let Some(blobs) = parsed.blobs {
        base.blobs = blobs;
    }
    if let Some(geo) = parsed.geo {
        base.geo = geo;
    }
    Ok(())
}

fn merge_file_config(base: &mut LedgerConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)
        .map_err(|err| invalid(format!("failed to read {}: {err}", path.display())))?;
    merge_toml(base, &raw).map_err(|err| anyhow!("{}: {err}", path.display()))
}

/// `LEDGER_*` variables in the environment that nothing reads, usually typos.
pub fn unknown_env_vars() -> Vec<String> {
    let mut unknown: Vec<String> = env::vars_os()
        .filter_map(|(k, _)| k.into_string().ok())
        .filter(|k| k.starts_with("LEDGER_"))
        .filter(|k| !GENERATED_LEDGER_ENV_ALLOWLIST.contains(&k.as_str()))
        .collect();
    unknown.sort();
    unknown
}

pub fn load_config() -> Result<LedgerConfig> {
    let mut cfg = LedgerConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.store.skip_timestamp_only_writes = env_or_bool(
        "LEDGER_SKIP_TIMESTAMP_ONLY_WRITES",
        cfg.store.skip_timestamp_only_writes,
    );
    cfg.report.timezone = env_or_string("LEDGER_REPORT_TIMEZONE", &cfg.report.timezone);
    cfg.report.banner = env_or_string("LEDGER_REPORT_BANNER", &cfg.report.banner);
    cfg.blobs.max_bytes = env_or_u64("LEDGER_BLOB_MAX_BYTES", cfg.blobs.max_bytes);
    cfg.geo.enabled = env_or_bool("LEDGER_GEO_ENABLED", cfg.geo.enabled);
    cfg.geo.base_url = env_or_string("LEDGER_GEO_BASE_URL", &cfg.geo.base_url);
    cfg.geo.timeout_secs = env_or_u64("LEDGER_GEO_TIMEOUT_SECS", cfg.geo.timeout_secs);

    validate(&cfg)?;
    Ok(cfg)
}
