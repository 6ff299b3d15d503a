use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default config file, looked up without extension
pub const DEFAULT_CONFIG_PATH: &str = "classify";

/// Runtime settings shared by all hosts.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// TensorFlow SavedModel export directory
    pub model_dir: PathBuf,

    /// Labels file, one label per line in class-index order
    pub labels_path: PathBuf,

    pub input_op: String,
    pub output_op: String,

    /// Side of the square image the model expects
    pub image_size: u32,

    pub fetch_timeout_secs: u64,

    /// Extra attempts after the first one failed at transport level
    pub fetch_retries: u32,

    pub retry_backoff_ms: u64,

    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Defaults, then the optional file at `config_path`, then `CLASSIFY_*` env vars
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .set_default("model_dir", "model")?
            .set_default("labels_path", "model/labels.txt")?
            .set_default("input_op", "serving_default_input_1")?
            .set_default("output_op", "StatefulPartitionedCall")?
            .set_default("image_size", 224)?
            .set_default("fetch_timeout_secs", 10)?
            .set_default("fetch_retries", 2)?
            .set_default("retry_backoff_ms", 200)?
            .set_default("host", "127.0.0.1")?
            .set_default("port", 3000)?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("CLASSIFY").try_parsing(true))
            .build()?;

        settings.try_deserialize()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
