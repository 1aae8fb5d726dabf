use crate::{ProxyError, Result};

const KILOBYTE: usize = 1024;

pub const DEFAULT_MAX_LENGTH: u64 = 100_000;
pub const DEFAULT_CHUNK_SIZE: usize = 8 * KILOBYTE;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;

/// Settings shared by every proxied request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Largest upstream file we agree to relay, in bytes.
    pub max_length: u64,
    /// How many bytes one pull from the upstream body asks for.
    pub chunk_size: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: concat!("dataproxy/", env!("CARGO_PKG_VERSION"))
                .to_string(),
        }
    }
}

impl ProxyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            return Err(ProxyError::InvalidArgument(
                "max_length must be positive".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ProxyError::InvalidArgument(
                "chunk_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub proxy: ProxyConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            proxy: ProxyConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
