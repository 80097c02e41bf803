//! Configuration handle and the server section it resolves
//!
//! Settings are layered from (lowest to highest priority):
//! 1. `config/base.{toml,yaml,json}`
//! 2. `config/<system_id>.{toml,yaml,json}`
//! 3. The file named by `APP_CONFIG_FILE`
//! 4. `APP__`-prefixed environment variables, `__` separating path segments
//!    (e.g. `APP__BASE__APP__SVC1__ADDR=0.0.0.0:9000`)
//!
//! # Example
//!
//! ```no_run
//! use app_engine::{Configuration, ServerConfig};
//!
//! # fn main() -> app_engine::Result<()> {
//! let conf = Configuration::load("svc1")?;
//! let server: Option<ServerConfig> = conf.get_optional(&["base", "app", "svc1"])?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use config::{ConfigError, Environment, File};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable naming an extra configuration file
pub const CONFIG_FILE_ENV: &str = "APP_CONFIG_FILE";

const ENV_PREFIX: &str = "APP";
const ENV_SEPARATOR: &str = "__";

/// Read-only hierarchical configuration store
#[derive(Debug, Clone)]
pub struct Configuration {
    inner: config::Config,
}

impl Configuration {
    /// Load configuration for a service from files and the environment
    pub fn load(system_id: &str) -> Result<Self> {
        if dotenvy::dotenv().is_ok() {
            debug!("Loaded .env file");
        }

        let mut builder = config::Config::builder()
            .add_source(File::with_name("config/base").required(false))
            .add_source(File::with_name(&format!("config/{system_id}")).required(false));

        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(File::with_name(&path));
        }

        let inner = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        Ok(Self { inner })
    }

    /// Wrap an already built store
    pub fn from_config(inner: config::Config) -> Self {
        Self { inner }
    }

    /// Deserialize the value at `path`
    pub fn get<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T> {
        Ok(self.inner.get::<T>(&key(path))?)
    }

    /// Deserialize the value at `path`, or `None` if nothing is stored there
    pub fn get_optional<T: DeserializeOwned>(&self, path: &[&str]) -> Result<Option<T>> {
        match self.inner.get::<T>(&key(path)) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn key(path: &[&str]) -> String {
    path.join(".")
}

/// Server section resolved at `base/app/<system_id>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address; a bare port or `:port` binds every interface
    pub addr: String,

    /// Tracing tag; tracing is initialized only when non-empty
    pub tag: String,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Maximum concurrent requests per connection
    pub concurrency_limit: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:9000".to_string(),
            tag: String::new(),
            timeout_secs: None,
            concurrency_limit: None,
        }
    }
}
