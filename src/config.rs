//! Server configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_AOF_PATH: &str = "database.aof";
pub const DEFAULT_FSYNC_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the listener binds to.
    pub host: String,

    pub port: u16,

    /// Append-only file, created if missing and replayed on startup.
    pub aof_path: PathBuf,

    /// How often the append-only file is synced to disk when it has new writes. A crash loses at
    /// most this much of acknowledged writes.
    pub fsync_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            aof_path: PathBuf::from(DEFAULT_AOF_PATH),
            fsync_interval: DEFAULT_FSYNC_INTERVAL,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn aof_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.aof_path = path.into();
        self
    }

    pub fn fsync_interval(mut self, interval: Duration) -> Self {
        self.config.fsync_interval = interval;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
