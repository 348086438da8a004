//! Server configuration.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Where to listen and how long to wait for in-flight exchanges on shutdown.
///
/// ```rust
/// use std::time::Duration;
/// use ferrule::ServerConfig;
///
/// let config: ServerConfig = "0.0.0.0:3000".parse().unwrap();
/// let config = config.with_shutdown_timeout(Duration::from_secs(5));
/// assert_eq!(config.port(), 3000);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    host: String,
    port: u16,
    shutdown_timeout: Duration,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT }
    }

    /// How long a graceful shutdown waits for open connections before
    /// aborting them.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// `0` asks the OS for an ephemeral port; see
    /// [`RunningServer::local_addr`](crate::RunningServer::local_addr).
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Resolves `host:port` to the first address it names.
    pub async fn socket_addr(&self) -> Result<SocketAddr, Error> {
        let target = (self.host.as_str(), self.port);
        let mut addrs = tokio::net::lookup_host(target)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{self}: {e}")))?;
        addrs.next().ok_or_else(|| Error::InvalidAddress(format!("{self}: no addresses")))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses `host:port`. IPv6 hosts may be bracketed: `[::1]:8080`.
impl FromStr for ServerConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidAddress(format!("{s}: expected host:port")))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(Error::InvalidAddress(format!("{s}: empty host")));
        }
        let port = port
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("{s}: invalid port `{port}`")))?;
        Ok(Self::new(host, port))
    }
}
