use crate::{Error, ErrorContext, Result};
use keyring::Entry;
use std::env;
use std::time::Duration;
use url::Url;

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 32;
const DEFAULT_MAX_TOKENS: u32 = 4000;

const KEYRING_SERVICE: &str = "walle";
const KEYRING_USER: &str = "api-key";

/// Local client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub api_key: Option<String>,
    /// Connect timeout, whole-request timeout for plain JSON calls, and the
    /// longest gap allowed between chunks of a streamed reply.
    pub timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub proxy_url: Option<String>,
    /// Fallback `max_tokens` when the selected model declares none.
    pub max_tokens: u32,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Read configuration from `WALLE_*` environment variables.
    ///
    /// - `WALLE_BASE_URL` (default `http://localhost:5000`)
    /// - `WALLE_API_KEY`, falling back to the OS keyring entry `walle/api-key`
    /// - `WALLE_HTTP_TIMEOUT_SECS` (default 120)
    /// - `WALLE_HTTP_POOL_MAX_IDLE_PER_HOST` (default 32)
    /// - `WALLE_PROXY_URL`
    /// - `WALLE_MAX_TOKENS` (default 4000)
    pub fn from_env() -> Result<Self> {
        let mut builder = ClientConfigBuilder::new();

        if let Ok(base) = env::var("WALLE_BASE_URL") {
            builder = builder.base_url(base);
        }
        if let Some(key) = env::var("WALLE_API_KEY").ok().or_else(keyring_api_key) {
            builder = builder.api_key(key);
        }
        if let Some(secs) = env_parse::<u64>("WALLE_HTTP_TIMEOUT_SECS") {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(n) = env_parse::<usize>("WALLE_HTTP_POOL_MAX_IDLE_PER_HOST") {
            builder = builder.pool_max_idle_per_host(n);
        }
        if let Ok(proxy) = env::var("WALLE_PROXY_URL") {
            builder = builder.proxy_url(proxy);
        }
        if let Some(n) = env_parse::<u32>("WALLE_MAX_TOKENS") {
            builder = builder.max_tokens(n);
        }

        builder.build()
    }

    /// Join an API path (e.g. `/api/chats`) onto the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path.trim_start_matches('/')).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot build endpoint url: {e}"),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(path.to_string()),
            )
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

fn keyring_api_key() -> Option<String> {
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER).ok()?;
    entry.get_password().ok()
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    pool_max_idle_per_host: usize,
    proxy_url: Option<String>,
    max_tokens: u32,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            proxy_url: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn pool_max_idle_per_host(mut self, n: usize) -> Self {
        self.pool_max_idle_per_host = n;
        self
    }

    pub fn proxy_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = n.max(1);
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        // A trailing slash makes `Url::join` append instead of replacing the last segment.
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base url: {e}"),
                ErrorContext::new()
                    .with_field_path("WALLE_BASE_URL")
                    .with_details(self.base_url.clone())
                    .with_source("client_config"),
            )
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                format!("unsupported scheme '{}'", base_url.scheme()),
                ErrorContext::new()
                    .with_field_path("WALLE_BASE_URL")
                    .with_source("client_config"),
            ));
        }

        Ok(ClientConfig {
            base_url,
            api_key: self.api_key.filter(|k| !k.trim().is_empty()),
            timeout: self.timeout,
            pool_max_idle_per_host: self.pool_max_idle_per_host,
            proxy_url: self.proxy_url,
            max_tokens: self.max_tokens,
        })
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
