//! Sveriges Radio source for PMOMusic
//!
//! Resolves `sverigesradio:` uris into playable audio: the four live
//! stations (P1 to P4), the weekly Digilistan chart and individual clips
//! from the SR CDN.
//!
//! # Features
//!
//! - **Live stations**: static table of HLS streams, probed on demand
//! - **Digilistan**: scraped chart with a broadcast-aware expiry
//! - **Clip cache**: partial entries from the chart completed by CDN lookups
//! - **Streaming**: ffmpeg transcodes to WAV on stdout, with bounded startup
//!   and SIGKILL teardown
//!
//! # Uris
//!
//! | Uri | Resolves to |
//! |-----|-------------|
//! | `sverigesradio:/` | root folder |
//! | `sverigesradio:p1` .. `p4` | live station |
//! | `sverigesradio:digilistan` | chart playlist |
//! | `sverigesradio:<id>` | CDN clip |
//!
//! Chart rows without a play id are emitted as `_search:<query>` references
//! for another source to resolve.
//!
//! # Example
//!
//! ```no_run
//! use pmosverigesradio::{SverigesRadioSource, UriDetails, UriProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = SverigesRadioSource::new().await?;
//!
//!     let chart = source.get_digilistan().await?;
//!     for uri in &chart.contents {
//!         if source.can_play_uri(uri).await? {
//!             if let UriDetails::Track(track) = source.get_uri_details(uri).await? {
//!                 println!("{:?} - {:?}", track.artist, track.title);
//!             }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # External tools
//!
//! `ffmpeg` and `ffprobe` are looked up on `PATH` unless `FFMPEG_PATH` /
//! `FFPROBE_PATH` (or the config file) say otherwise. See [`config`].

pub mod cdn;
pub mod client;
pub mod config;
pub mod digilistan;
pub mod error;
pub mod host;
pub mod models;
pub mod probe;
pub mod provider;
pub mod source;
pub mod stations;
pub mod stream;

// Re-exports
pub use cdn::CdnTrackCache;
pub use client::{ClientBuilder, SverigesRadioClient};
pub use config::SverigesRadioConfig;
pub use digilistan::{DigilistanScrape, DigilistanScraper, SkippedRow};
pub use error::{Error, ErrorCode, Result};
pub use host::HostAdapter;
pub use models::{
    AudioFormat, CdnTrack, Playlist, ProbeInfo, RootFolder, StationDetails, TrackId, UriDetails,
};
pub use probe::{FfprobeProber, Prober};
pub use provider::UriProvider;
pub use source::SverigesRadioSource;
pub use stations::StationEntry;
pub use stream::{StreamHandle, StreamLauncher, Termination};
