use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Configuration for all three processes. Each binary reads the whole file and
/// uses its own section; the struct is built once at startup and passed down.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub relational: RelationalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
    pub index_file: String,
    pub api1: UpstreamConfig,
    pub api2: UpstreamConfig,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
    pub admin_addr: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            static_dir: "frontend".into(),
            index_file: "index.html".into(),
            api1: UpstreamConfig { prefix: "/api1".into(), target: "http://localhost:3001".into() },
            api2: UpstreamConfig { prefix: "/api2".into(), target: "http://localhost:3002".into() },
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            body_limit_bytes: 10 * 1024 * 1024,
            admin_addr: None,
        }
    }
}

/// One route table entry: requests under `prefix` go to `target` with the prefix removed.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub prefix: String,
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelationalConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".into(), port: 3001, database: DatabaseConfig::default() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 15 }
fn default_idle_timeout() -> u64 { 600 }
fn default_max_lifetime() -> u64 { 3600 }
fn default_acquire_timeout() -> u64 { 15 }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            max_lifetime_secs: default_max_lifetime(),
            acquire_timeout_secs: default_acquire_timeout(),
            sqlx_logging: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Azure,
    Local,
    Memory,
}

impl std::str::FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "local" => Ok(Self::Local),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown storage kind '{other}', expected azure|local|memory")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub host: String,
    pub port: u16,
    pub kind: StorageKind,
    pub connection_string: String,
    pub container: String,
    pub local_root: String,
    pub public_base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub upload_limit_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3002,
            kind: StorageKind::Azure,
            connection_string: "UseDevelopmentStorage=true".into(),
            container: "demo-container".into(),
            local_root: "data/blobs".into(),
            public_base_url: None,
            request_timeout_secs: 30,
            upload_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if !Path::new(&path).exists() {
        return Ok(AppConfig::default());
    }
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

/// Which process is loading the configuration. Only its section is validated,
/// so e.g. the gateway starts without `DATABASE_URL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Gateway,
    Relational,
    Storage,
}

impl AppConfig {
    /// File (or defaults) → environment overrides → validation of `section` only.
    pub fn load_for(section: Section) -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.apply_env_with(|key| std::env::var(key).ok());
        cfg.normalize_section(section)?;
        Ok(cfg)
    }

    /// Override file values with variables from `lookup` (normally the process environment).
    pub fn apply_env_with<L>(&mut self, lookup: L) -> &mut Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let port = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u16>().ok());

        if let Some(p) = port("GATEWAY_PORT") { self.gateway.port = p; }
        if let Some(v) = lookup("API1_URL") { self.gateway.api1.target = v; }
        if let Some(v) = lookup("API2_URL") { self.gateway.api2.target = v; }
        if let Some(v) = lookup("STATIC_DIR") { self.gateway.static_dir = v; }

        if let Some(p) = port("RELATIONAL_PORT") { self.relational.port = p; }
        if let Some(v) = lookup("DATABASE_URL") { self.relational.database.url = v; }

        if let Some(p) = port("STORAGE_PORT") { self.storage.port = p; }
        if let Some(v) = lookup("AZURE_STORAGE_CONNECTION_STRING") { self.storage.connection_string = v; }
        if let Some(v) = lookup("AZURE_CONTAINER_NAME") { self.storage.container = v; }
        if let Some(kind) = lookup("STORAGE_KIND").and_then(|v| v.parse().ok()) { self.storage.kind = kind; }
        if let Some(v) = lookup("STORAGE_LOCAL_ROOT") { self.storage.local_root = v; }
        self
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.normalize_section(Section::Gateway)?;
        self.normalize_section(Section::Relational)?;
        self.normalize_section(Section::Storage)
    }

    pub fn normalize_section(&mut self, section: Section) -> Result<()> {
        match section {
            Section::Gateway => self.gateway.normalize(),
            Section::Relational => {
                self.relational.normalize()?;
                self.relational.database.validate()
            }
            Section::Storage => self.storage.normalize(),
        }
    }
}

fn normalize_host(host: &mut String) {
    if host.trim().is_empty() {
        *host = "0.0.0.0".to_string();
    }
}

fn check_port(section: &str, port: u16) -> Result<()> {
    if port == 0 {
        return Err(anyhow!("{section}.port must be in 1..=65535"));
    }
    Ok(())
}

impl GatewayConfig {
    fn normalize(&mut self) -> Result<()> {
        normalize_host(&mut self.host);
        check_port("gateway", self.port)?;
        self.api1.normalize("gateway.api1")?;
        self.api2.normalize("gateway.api2")?;
        if self.api1.prefix == self.api2.prefix {
            return Err(anyhow!("gateway.api1 and gateway.api2 must use different prefixes"));
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(anyhow!("gateway timeouts must be positive seconds"));
        }
        if self.index_file.trim().is_empty() {
            self.index_file = "index.html".into();
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl UpstreamConfig {
    fn normalize(&mut self, section: &str) -> Result<()> {
        // 前缀统一为 "/xxx" 形式，去掉末尾的 "/"
        let trimmed = self.prefix.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(anyhow!("{section}.prefix must not be empty or '/'"));
        }
        self.prefix = if trimmed.starts_with('/') { trimmed.to_string() } else { format!("/{trimmed}") };

        self.target = self.target.trim().trim_end_matches('/').to_string();
        let lower = self.target.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(anyhow!("{section}.target must start with http:// or https://"));
        }
        Ok(())
    }
}

impl RelationalConfig {
    fn normalize(&mut self) -> Result<()> {
        normalize_host(&mut self.host);
        check_port("relational", self.port)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("relational.database.url is empty; set it in config.toml or DATABASE_URL"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://") || lower.starts_with("sqlite:")) {
            return Err(anyhow!("relational.database.url must start with postgres://, postgresql:// or sqlite:"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("relational.database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("relational.database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("relational.database timeouts must be positive seconds"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration { Duration::from_secs(self.connect_timeout_secs) }
    pub fn acquire_timeout(&self) -> Duration { Duration::from_secs(self.acquire_timeout_secs) }
    pub fn idle_timeout(&self) -> Duration { Duration::from_secs(self.idle_timeout_secs) }
    pub fn max_lifetime(&self) -> Duration { Duration::from_secs(self.max_lifetime_secs) }
}

impl StorageConfig {
    fn normalize(&mut self) -> Result<()> {
        normalize_host(&mut self.host);
        check_port("storage", self.port)?;
        self.container = self.container.trim().to_string();
        if self.container.is_empty() {
            return Err(anyhow!("storage.container must not be empty"));
        }
        if self.kind == StorageKind::Azure && self.connection_string.trim().is_empty() {
            return Err(anyhow!("storage.connection_string is required for the azure container kind"));
        }
        if self.kind == StorageKind::Local && self.local_root.trim().is_empty() {
            return Err(anyhow!("storage.local_root is required for the local container kind"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("storage.request_timeout_secs must be positive"));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
