use configs::{GatewayConfig, UpstreamConfig};
use serde::Serialize;

/// One proxy prefix and the backend base URL it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub prefix: String,
    pub target: String,
}

impl Upstream {
    pub fn new(prefix: impl Into<String>, target: impl Into<String>) -> Self {
        let target: String = target.into();
        Self { prefix: prefix.into(), target: target.trim_end_matches('/').to_string() }
    }

    /// Backend URL for an incoming `path?query`: the prefix is stripped and the
    /// rest appended to the target. `/api1` and `/api1/` both map to `/`.
    pub fn target_url(&self, path_and_query: &str) -> String {
        let (path, query) = match path_and_query.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path_and_query, None),
        };
        let rest = path.strip_prefix(self.prefix.as_str()).unwrap_or(path);
        let rest = if rest.is_empty() { "/" } else { rest };
        match query {
            Some(q) => format!("{}{}?{}", self.target, rest, q),
            None => format!("{}{}", self.target, rest),
        }
    }
}

impl From<&UpstreamConfig> for Upstream {
    fn from(c: &UpstreamConfig) -> Self {
        Upstream::new(c.prefix.clone(), c.target.clone())
    }
}

/// The fixed route table: API-1 and API-2.
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub api1: Upstream,
    pub api2: Upstream,
}

impl RouteTable {
    pub fn from_config(cfg: &GatewayConfig) -> Self {
        Self { api1: Upstream::from(&cfg.api1), api2: Upstream::from(&cfg.api2) }
    }

    pub fn upstreams(&self) -> [&Upstream; 2] {
        [&self.api1, &self.api2]
    }

    /// Body of `GET /api/config`.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig { api1_url: self.api1.prefix.clone(), api2_url: self.api2.prefix.clone() }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub api1_url: String,
    pub api2_url: String,
}
