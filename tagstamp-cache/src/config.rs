//! Cache configuration types.

use crate::error::{CacheError, CacheResult};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable selecting the driver (`redis` or `memcached`).
pub const CACHE_DRIVER_ENV: &str = "CACHE_DRIVER";
/// Environment variable enabling persistent connections.
pub const CACHE_PCONNECT_ENV: &str = "CACHE_PCONNECT";
/// Environment variable holding the host name or unix socket path.
pub const CACHE_HOST_OR_SOCKET_ENV: &str = "CACHE_HOST_OR_SOCKET";
/// Environment variable holding the port.
pub const CACHE_PORT_ENV: &str = "CACHE_PORT";
/// Environment variable holding the connect timeout in seconds.
pub const CACHE_TIMEOUT_ENV: &str = "CACHE_TIMEOUT";
/// Environment variable holding the default entry TTL in seconds.
pub const CACHE_TTL_ENV: &str = "CACHE_TTL";
/// Environment variable holding the initial namespace postfix.
pub const CACHE_DATABASE_ENV: &str = "CACHE_DATABASE";

/// Cache backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// Redis backend
    Redis,
    /// Memcached backend
    Memcached,
}

impl FromStr for CacheBackend {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memcached" | "memcache" => Ok(Self::Memcached),
            other => Err(CacheError::DriverNotSupported(other.to_string())),
        }
    }
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redis => write!(f, "Redis"),
            Self::Memcached => write!(f, "Memcached"),
        }
    }
}

/// Where the backing store listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP host and port
    Tcp {
        /// Host name or address
        host: String,
        /// Port number
        port: u16,
    },
    /// Unix domain socket path
    Socket(String),
}

/// Cache configuration.
///
/// Resolved once, before the adapter first connects. Nothing here is read
/// from the process environment unless [`CacheConfig::from_env`] is used.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache backend type
    pub backend: CacheBackend,

    /// Host name, or a unix socket path when it starts with `/`
    pub host_or_socket: Option<String>,

    /// Port, required for TCP hosts
    pub port: Option<u16>,

    /// Connection timeout
    pub timeout: Option<Duration>,

    /// Keep a long-lived, self-healing connection instead of a plain one
    pub persistent: bool,

    /// Default TTL for cache entries
    pub default_ttl: Option<Duration>,

    /// Initial namespace postfix appended to every key
    pub namespace: Option<String>,
}

impl CacheConfig {
    /// Create an empty configuration for the given backend.
    ///
    /// Connecting fails until a host or socket is set.
    pub fn new(backend: CacheBackend) -> Self {
        Self {
            backend,
            host_or_socket: None,
            port: None,
            timeout: None,
            persistent: false,
            default_ttl: None,
            namespace: None,
        }
    }

    /// Create a new Redis cache configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagstamp_cache::CacheConfig;
    ///
    /// let config = CacheConfig::redis("localhost", 6379);
    /// assert_eq!(config.connection_url().unwrap(), "redis://localhost:6379/");
    /// ```
    pub fn redis(host_or_socket: impl Into<String>, port: u16) -> Self {
        Self::new(CacheBackend::Redis)
            .with_host(host_or_socket)
            .with_port(port)
    }

    /// Create a new Memcached cache configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagstamp_cache::CacheConfig;
    ///
    /// let config = CacheConfig::memcached("localhost", 11211);
    /// assert_eq!(config.connection_url().unwrap(), "memcache://localhost:11211");
    /// ```
    pub fn memcached(host_or_socket: impl Into<String>, port: u16) -> Self {
        Self::new(CacheBackend::Memcached)
            .with_host(host_or_socket)
            .with_port(port)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> CacheResult<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// Unparsable numeric values are ignored, the same as absent ones.
    pub fn from_vars<F>(lookup: F) -> CacheResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup(CACHE_DRIVER_ENV) {
            Some(driver) => driver.parse()?,
            None => CacheBackend::Redis,
        };

        let mut config = Self::new(backend);

        if let Some(flag) = lookup(CACHE_PCONNECT_ENV) {
            config.persistent = flag == "1" || flag.eq_ignore_ascii_case("true");
        }

        if let Some(host) = lookup(CACHE_HOST_OR_SOCKET_ENV)
            && !host.is_empty()
        {
            config.host_or_socket = Some(host);
        }

        if let Some(port) = lookup(CACHE_PORT_ENV).and_then(|v| v.parse().ok()) {
            config.port = Some(port);
        }

        if let Some(secs) = lookup(CACHE_TIMEOUT_ENV).and_then(|v| v.parse::<u64>().ok())
            && secs > 0
        {
            config.timeout = Some(Duration::from_secs(secs));
        }

        if let Some(secs) = lookup(CACHE_TTL_ENV).and_then(|v| v.parse::<u64>().ok())
            && secs > 0
        {
            config.default_ttl = Some(Duration::from_secs(secs));
        }

        config.namespace = lookup(CACHE_DATABASE_ENV);

        Ok(config)
    }

    /// Set the host name or unix socket path.
    pub fn with_host(mut self, host_or_socket: impl Into<String>) -> Self {
        self.host_or_socket = Some(host_or_socket.into());
        self
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the connection timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Select persistent or transient connection mode.
    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Set the initial namespace postfix.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Resolve the store endpoint.
    ///
    /// Fails with [`CacheError::Connection`] when the host is missing, or when
    /// a TCP host has no port.
    pub fn endpoint(&self) -> CacheResult<Endpoint> {
        let host = self
            .host_or_socket
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                CacheError::Connection(format!(
                    "Not enough data to connect to {}: host or socket is not set",
                    self.backend
                ))
            })?;

        if host.starts_with('/') {
            return Ok(Endpoint::Socket(host.to_string()));
        }

        match self.port {
            Some(port) if port > 0 => Ok(Endpoint::Tcp {
                host: host.to_string(),
                port,
            }),
            _ => Err(CacheError::Connection(format!(
                "Not enough data to connect to {}: port is not set for host {}",
                self.backend, host
            ))),
        }
    }

    /// Render the client connection URL for the configured backend.
    pub fn connection_url(&self) -> CacheResult<String> {
        let endpoint = self.endpoint()?;

        let url = match (self.backend, endpoint) {
            (CacheBackend::Redis, Endpoint::Tcp { host, port }) => {
                format!("redis://{}:{}/", host, port)
            }
            (CacheBackend::Redis, Endpoint::Socket(path)) => format!("redis+unix://{}", path),
            (CacheBackend::Memcached, Endpoint::Tcp { host, port }) => match self.timeout {
                Some(timeout) => format!(
                    "memcache://{}:{}?timeout={}",
                    host,
                    port,
                    timeout.as_secs_f64()
                ),
                None => format!("memcache://{}:{}", host, port),
            },
            (CacheBackend::Memcached, Endpoint::Socket(path)) => format!("memcache://{}", path),
        };

        Ok(url)
    }

    /// TTL to apply to a write: the explicit one, else the default.
    ///
    /// `None` means the entry never expires; a zero duration also means that.
    pub fn effective_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        ttl.or(self.default_ttl).filter(|ttl| !ttl.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_redis_config() {
        let config = CacheConfig::redis("localhost", 6379);
        assert_eq!(config.backend, CacheBackend::Redis);
        assert_eq!(config.connection_url().unwrap(), "redis://localhost:6379/");
    }

    #[test]
    fn test_memcached_config() {
        let config = CacheConfig::memcached("localhost", 11211);
        assert_eq!(config.backend, CacheBackend::Memcached);
        assert_eq!(
            config.connection_url().unwrap(),
            "memcache://localhost:11211"
        );
    }

    #[test]
    fn test_memcached_timeout_in_url() {
        let config =
            CacheConfig::memcached("cache.local", 11211).with_timeout(Duration::from_secs(2));
        assert_eq!(
            config.connection_url().unwrap(),
            "memcache://cache.local:11211?timeout=2"
        );
    }

    #[test]
    fn test_socket_urls() {
        let redis = CacheConfig::new(CacheBackend::Redis).with_host("/var/run/redis.sock");
        assert_eq!(
            redis.endpoint().unwrap(),
            Endpoint::Socket("/var/run/redis.sock".to_string())
        );
        assert_eq!(
            redis.connection_url().unwrap(),
            "redis+unix:///var/run/redis.sock"
        );

        let memcached =
            CacheConfig::new(CacheBackend::Memcached).with_host("/tmp/memcached.sock");
        assert_eq!(
            memcached.connection_url().unwrap(),
            "memcache:///tmp/memcached.sock"
        );
    }

    #[test]
    fn test_missing_host_is_connection_error() {
        let config = CacheConfig::new(CacheBackend::Redis).with_port(6379);
        assert!(config.endpoint().unwrap_err().is_connection_error());

        let config = CacheConfig::new(CacheBackend::Redis).with_host("");
        assert!(config.endpoint().unwrap_err().is_connection_error());
    }

    #[test]
    fn test_missing_port_is_connection_error() {
        let config = CacheConfig::new(CacheBackend::Memcached).with_host("localhost");
        assert!(config.connection_url().unwrap_err().is_connection_error());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::redis("localhost", 6379)
            .with_namespace("staging")
            .with_default_ttl(Duration::from_secs(300))
            .with_timeout(Duration::from_secs(1))
            .with_persistent(true);

        assert_eq!(config.namespace.as_deref(), Some("staging"));
        assert_eq!(config.default_ttl, Some(Duration::from_secs(300)));
        assert_eq!(config.timeout, Some(Duration::from_secs(1)));
        assert!(config.persistent);
    }

    #[test]
    fn test_effective_ttl() {
        let config = CacheConfig::redis("localhost", 6379);
        assert_eq!(config.effective_ttl(None), None);
        assert_eq!(
            config.effective_ttl(Some(Duration::from_secs(5))),
            Some(Duration::from_secs(5))
        );

        let config = config.with_default_ttl(Duration::from_secs(60));
        assert_eq!(config.effective_ttl(None), Some(Duration::from_secs(60)));
        assert_eq!(config.effective_ttl(Some(Duration::ZERO)), None);
    }

    #[test]
    fn test_from_vars() {
        let config = CacheConfig::from_vars(vars(&[
            (CACHE_DRIVER_ENV, "memcached"),
            (CACHE_PCONNECT_ENV, "1"),
            (CACHE_HOST_OR_SOCKET_ENV, "10.0.0.5"),
            (CACHE_PORT_ENV, "11211"),
            (CACHE_TIMEOUT_ENV, "3"),
            (CACHE_TTL_ENV, "600"),
            (CACHE_DATABASE_ENV, "tenant42"),
        ]))
        .unwrap();

        assert_eq!(config.backend, CacheBackend::Memcached);
        assert!(config.persistent);
        assert_eq!(config.host_or_socket.as_deref(), Some("10.0.0.5"));
        assert_eq!(config.port, Some(11211));
        assert_eq!(config.timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.default_ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.namespace.as_deref(), Some("tenant42"));
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = CacheConfig::from_vars(vars(&[(CACHE_PORT_ENV, "not-a-port")])).unwrap();
        assert_eq!(config.backend, CacheBackend::Redis);
        assert!(!config.persistent);
        assert_eq!(config.port, None);
        assert_eq!(config.host_or_socket, None);
    }

    #[test]
    fn test_unknown_driver() {
        let err = CacheConfig::from_vars(vars(&[(CACHE_DRIVER_ENV, "couchbase")])).unwrap_err();
        assert!(matches!(err, CacheError::DriverNotSupported(name) if name == "couchbase"));
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(CacheBackend::Redis.to_string(), "Redis");
        assert_eq!(CacheBackend::Memcached.to_string(), "Memcached");
        assert_eq!("Memcache".parse::<CacheBackend>().unwrap(), CacheBackend::Memcached);
    }
}
