//! Stream probing with `ffprobe`
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format -show_streams`
//! against the remote stream URL and maps the JSON output into a
//! [`ProbeInfo`]. The [`Prober`] trait lets callers substitute another
//! implementation.

use crate::config::DEFAULT_PROBE_TIMEOUT_MS;
use crate::error::{Error, Result};
use crate::models::{AudioFormat, CdnTrack, ProbeInfo, StationDetails};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Debug;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Something that can inspect a stream without downloading it
#[async_trait]
pub trait Prober: Debug + Send + Sync {
    async fn probe(&self, url: &str) -> Result<ProbeInfo>;
}

/// Descriptors that carry a stream URL and can absorb probe results
pub trait Probeable {
    fn probe_url(&self) -> Option<&str>;
    fn apply_probe(&mut self, info: ProbeInfo);
}

impl Probeable for StationDetails {
    fn probe_url(&self) -> Option<&str> {
        Some(&self.contents)
    }

    fn apply_probe(&mut self, info: ProbeInfo) {
        self.duration = info.duration.or(self.duration);
        self.format = info.format;
    }
}

impl Probeable for CdnTrack {
    fn probe_url(&self) -> Option<&str> {
        self.contents.as_deref()
    }

    fn apply_probe(&mut self, info: ProbeInfo) {
        self.duration = info.duration.or(self.duration);
        self.format = info.format;
    }
}

/// Probe a descriptor's stream and merge the results into it
///
/// A probe failure is returned as is; the descriptor is not degraded to its
/// unprobed form.
pub async fn add_probe_info<T: Probeable>(prober: &dyn Prober, mut descriptor: T) -> Result<T> {
    let url = descriptor
        .probe_url()
        .ok_or_else(|| Error::type_error("descriptor with a contents url", "none"))?
        .to_string();

    let info = prober.probe(&url).await?;
    descriptor.apply_probe(info);
    Ok(descriptor)
}

/// A prober backed by the `ffprobe` CLI
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
        }
    }

    /// Set the maximum probe time
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn probe(&self, url: &str) -> Result<ProbeInfo> {
        debug!(%url, ffprobe = %self.ffprobe_path.display(), "Probing stream");

        let mut cmd = Command::new(&self.ffprobe_path);
        cmd.args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Error::Probe {
                    url: url.to_string(),
                    message: format!("failed to run ffprobe: {e}"),
                })
            }
            Err(_elapsed) => {
                return Err(Error::Probe {
                    url: url.to_string(),
                    message: format!("timed out after {:?}", self.timeout),
                })
            }
        };

        if !output.status.success() {
            return Err(Error::Probe {
                url: url.to_string(),
                message: format!(
                    "exited with status {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        parse_ffprobe_output(&output.stdout).map_err(|e| Error::Probe {
            url: url.to_string(),
            message: format!("ffprobe JSON parse error: {e}"),
        })
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

/// Map ffprobe's JSON into a [`ProbeInfo`], using the first audio stream
pub fn parse_ffprobe_output(json: &[u8]) -> serde_json::Result<ProbeInfo> {
    let ff: FfprobeOutput = serde_json::from_slice(json)?;
    let audio = ff
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(ProbeInfo {
        duration: ff.format.duration.and_then(|d| d.parse().ok()),
        format: AudioFormat {
            format_name: ff.format.format_name,
            codec: audio.and_then(|a| a.codec_name.clone()),
            bit_rate: ff.format.bit_rate.and_then(|b| b.parse().ok()),
            sample_rate: audio
                .and_then(|a| a.sample_rate.as_deref())
                .and_then(|r| r.parse().ok()),
            channels: audio.and_then(|a| a.channels),
        },
    })
}
