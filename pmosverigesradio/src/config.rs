//! Configuration for the Sveriges Radio source
//!
//! Values come from three layers, later ones winning:
//!
//! 1. Built-in defaults ([`SverigesRadioConfig::default`])
//! 2. An optional YAML file (keys are case-insensitive)
//! 3. Environment variables: `PMOMUSIC_SVERIGESRADIO__<KEY>` for any key,
//!    plus `FFMPEG_PATH` / `FFPROBE_PATH` for the external tools
//!
//! # Example
//!
//! ```no_run
//! use pmosverigesradio::SverigesRadioConfig;
//!
//! # fn main() -> pmosverigesradio::Result<()> {
//! let config = SverigesRadioConfig::load(None)?;
//! println!("transcoder: {}", config.ffmpeg_path.display());
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};
use tracing::{debug, info};

/// Prefix of per-key environment overrides
pub const ENV_PREFIX: &str = "PMOMUSIC_SVERIGESRADIO__";

/// Environment variable naming the transcoder binary
pub const ENV_FFMPEG_PATH: &str = "FFMPEG_PATH";

/// Environment variable naming the probe binary
pub const ENV_FFPROBE_PATH: &str = "FFPROBE_PATH";

/// Weekly chart page
pub const DEFAULT_DIGILISTAN_URL: &str = "https://sverigesradio.se/sida/topplista.aspx?programid=2697";

/// CDN endpoint resolving a clip id to its audio URL
pub const DEFAULT_CDN_URL: &str = "https://sverigesradio.se/playerajax/getaudiourl";

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Remote probes take longer than local ones
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5000;

/// The transcoder must produce output within this window
pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 3000;

/// Bound on waiting for a killed transcoder to go away
pub const DEFAULT_KILL_TIMEOUT_MS: u64 = 2000;

/// The CDN answers with at most a couple of hops
pub const DEFAULT_MAX_REDIRECTS: usize = 2;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "PMOMusic/0.3.10 (pmosverigesradio)";

/// Settings of the Sveriges Radio source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SverigesRadioConfig {
    pub digilistan_url: String,
    pub cdn_url: String,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub request_timeout_secs: u64,
    pub probe_timeout_ms: u64,
    pub startup_timeout_ms: u64,
    pub kill_timeout_ms: u64,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for SverigesRadioConfig {
    fn default() -> Self {
        Self {
            digilistan_url: DEFAULT_DIGILISTAN_URL.to_string(),
            cdn_url: DEFAULT_CDN_URL.to_string(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
            kill_timeout_ms: DEFAULT_KILL_TIMEOUT_MS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl SverigesRadioConfig {
    /// Load defaults, merge the optional YAML file, then apply the process environment
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let external = match path {
            Some(path) if path.exists() => {
                info!(config_file=%path.display(), "Loading Sveriges Radio config");
                Some(fs::read_to_string(path)?)
            }
            Some(path) => {
                info!(config_file=%path.display(), "Config file not found, using defaults");
                None
            }
            None => None,
        };

        Self::build(external.as_deref(), env::vars())
    }

    /// Defaults with the process environment applied (no file)
    pub fn from_env() -> Result<Self> {
        Self::build(None, env::vars())
    }

    /// Parse a YAML document on top of the defaults (no environment)
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::build(Some(yaml), std::iter::empty())
    }

    fn build(
        yaml: Option<&str>,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let mut value = serde_yaml::to_value(Self::default())?;

        if let Some(yaml) = yaml {
            let external: Value = serde_yaml::from_str(yaml)?;
            merge_yaml(&mut value, &lower_keys(external));
        }

        apply_env_overrides(&mut value, vars);

        Ok(serde_yaml::from_value(value)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }
}

fn apply_env_overrides(config: &mut Value, vars: impl IntoIterator<Item = (String, String)>) {
    let Value::Mapping(map) = config else {
        return;
    };

    for (key, value) in vars {
        let field = if key == ENV_FFMPEG_PATH {
            "ffmpeg_path".to_string()
        } else if key == ENV_FFPROBE_PATH {
            "ffprobe_path".to_string()
        } else if let Some(field) = key.strip_prefix(ENV_PREFIX) {
            field.to_lowercase()
        } else {
            continue;
        };

        debug!(env_var=%key, field=%field, "Applying config override");
        map.insert(Value::String(field), convert_env_value(&value));
    }
}

fn convert_env_value(value: &str) -> Value {
    match serde_yaml::from_str::<Value>(value) {
        Ok(Value::Null) | Err(_) => Value::String(value.to_string()),
        Ok(parsed) => parsed,
    }
}

fn lower_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut lowered = Mapping::new();
            for (k, v) in map {
                let k = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                lowered.insert(k, lower_keys(v));
            }
            Value::Mapping(lowered)
        }
        other => other,
    }
}

/// Mappings merge key by key; anything else is replaced
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = SverigesRadioConfig::default();
        assert_eq!(config.startup_timeout(), Duration::from_secs(3));
        assert_eq!(config.kill_timeout(), Duration::from_secs(2));
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_redirects, 2);
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let config = SverigesRadioConfig::from_yaml_str(
            "Startup_Timeout_Ms: 500\ncdn_url: http://localhost:9999/cdn\n",
        )
        .unwrap();
        assert_eq!(config.startup_timeout_ms, 500);
        assert_eq!(config.cdn_url, "http://localhost:9999/cdn");
        assert_eq!(config.digilistan_url, DEFAULT_DIGILISTAN_URL);
    }

    #[test]
    fn test_env_overrides_win() {
        let config = SverigesRadioConfig::build(
            Some("ffmpeg_path: /opt/yaml/ffmpeg\nkill_timeout_ms: 100\n"),
            vars(&[
                ("FFMPEG_PATH", "/opt/ffmpeg_ssl/bin/ffmpeg"),
                ("PMOMUSIC_SVERIGESRADIO__KILL_TIMEOUT_MS", "750"),
                ("PMOMUSIC_SVERIGESRADIO__USER_AGENT", "test-agent"),
                ("UNRELATED", "ignored"),
            ]),
        )
        .unwrap();

        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg_ssl/bin/ffmpeg"));
        assert_eq!(config.kill_timeout_ms, 750);
        assert_eq!(config.user_agent, "test-agent");
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        assert!(SverigesRadioConfig::from_yaml_str("startup_timeout_ms: [nope").is_err());
        assert!(SverigesRadioConfig::from_yaml_str("startup_timeout_ms: soon").is_err());
    }
}
