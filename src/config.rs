//! Configuration System
//!
//! Hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - environment variables (`CASCADE_` prefix)
//!
//! ```toml
//! # config.toml
//! [runtime]
//! num_threads = 0
//! open_loop_target = 512
//!
//! [remote]
//! listen_addr = "0.0.0.0:9900"
//! ```
//!
//! ```bash
//! CASCADE_RUNTIME__OPEN_LOOP_TARGET=1024
//! ```

use std::path::PathBuf;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// 0 = use all available CPU cores.
    #[serde(default)]
    pub num_threads: usize,
    #[serde(default = "default_open_loop_target")]
    pub open_loop_target: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            num_threads: 0,
            open_loop_target: default_open_loop_target(),
        }
    }
}

fn default_open_loop_target() -> u64 {
    512
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub slave_mode: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            listen_addr: default_listen_addr(),
            slave_mode: false,
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:9900".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Shell command run on a cache miss; `{input}`/`{output}` are
    /// substituted with the source file and target bitstream path.
    #[serde(default)]
    pub command: Option<String>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        SynthesisConfig {
            cache_dir: default_cache_dir(),
            command: None,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cascade-cache")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            runtime: RuntimeConfig::default(),
            remote: RemoteConfig::default(),
            synthesis: SynthesisConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Merges `config.toml`, `config.local.toml`, then `CASCADE_*` env
    /// vars (`__`-separated for nested keys), falling back to defaults
    /// for anything none of those set.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("CASCADE_").split("__"))
            .extract()
    }

    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CASCADE_").split("__"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = Config::default();
        assert_eq!(config.runtime.open_loop_target, 512);
        assert_eq!(config.remote.listen_addr, "127.0.0.1:9900");
        assert!(!config.remote.slave_mode);
    }

    #[test]
    fn serializes_round_trip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[runtime]"));
        assert!(toml_str.contains("[remote]"));
    }
}
