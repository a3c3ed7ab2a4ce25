use crate::ledger::record::AttributeMap;
use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::net::IpAddr;
use std::time::Duration;

const KEPT_FIELDS: &[&str] = &[
    "hostname", "city", "region", "country", "loc", "org", "postal", "timezone",
];

/// Result of an address lookup; stored verbatim as `ip_details`.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoAttributes {
    Found(AttributeMap),
    Failed { ip: String, error: String },
}

impl GeoAttributes {
    pub fn into_attributes(self) -> AttributeMap {
        match self {
            Self::Found(map) => map,
            Self::Failed { ip, error } => {
                let mut map = AttributeMap::new();
                map.insert("ip".to_string(), json!(ip));
                map.insert("error".to_string(), json!(error));
                map
            }
        }
    }
}

pub trait GeoLookup: Send + Sync {
    fn lookup(&self, address: &str) -> GeoAttributes;
}

/// Used when lookups are switched off; never touches the network.
#[derive(Debug, Clone, Default)]
pub struct DisabledGeoLookup;

impl GeoLookup for DisabledGeoLookup {
    fn lookup(&self, address: &str) -> GeoAttributes {
        GeoAttributes::Failed {
            ip: address.to_string(),
            error: "geo lookup disabled".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpGeoLookup {
    base_url: String,
    timeout: Duration,
}

impl HttpGeoLookup {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// `<base>/<ip>/json`. Only literal IP addresses are accepted, and the
    /// address is pushed as one encoded path segment.
    fn endpoint(&self, address: &str) -> Result<Url> {
        let ip: IpAddr = address
            .parse()
            .with_context(|| format!("not an IP address: {address:?}"))?;
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid geo base url {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("geo base url cannot take a path: {}", self.base_url))?
            .pop_if_empty()
            .push(&ip.to_string())
            .push("json");
        Ok(url)
    }

    fn fetch(&self, address: &str) -> Result<Value> {
        let url = self.endpoint(address)?;
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .context("failed to build geo lookup client")?;
        let response = client
            .get(url)
            .send()
            .with_context(|| format!("geo lookup request failed for {address}"))?
            .error_for_status()
            .with_context(|| format!("geo lookup rejected {address}"))?;
        response
            .json::<Value>()
            .with_context(|| format!("geo lookup returned invalid JSON for {address}"))
    }
}

impl GeoLookup for HttpGeoLookup {
    fn lookup(&self, address: &str) -> GeoAttributes {
        let address = address.trim();
        if address.is_empty() {
            return GeoAttributes::Failed {
                ip: String::new(),
                error: "empty network address".to_string(),
            };
        }
        match self.fetch(address) {
            Ok(body) => GeoAttributes::Found(project_fields(address, &body)),
            Err(err) => {
                tracing::warn!(address, error = %format!("{err:#}"), "geo lookup failed");
                GeoAttributes::Failed {
                    ip: address.to_string(),
                    error: format!("{err:#}"),
                }
            }
        }
    }
}

fn project_fields(address: &str, body: &Value) -> AttributeMap {
    let mut map = AttributeMap::new();
    map.insert("ip".to_string(), json!(address));
    for field in KEPT_FIELDS {
        let value = body.get(*field).cloned().unwrap_or(Value::Null);
        map.insert((*field).to_string(), value);
    }
    map
}
