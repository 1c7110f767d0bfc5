//! Data models for the Sveriges Radio source
//!
//! Descriptors returned to the host are tagged with a `type` field
//! (`folder`, `playlist`, `radio` or `track`) and serialized in camelCase.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scheme prefix of every uri owned by this source
pub const URI_SCHEME: &str = "sverigesradio:";

/// Uri of the virtual root folder
pub const ROOT_URI: &str = "sverigesradio:/";

/// Uri of the Digilistan chart playlist
pub const DIGILISTAN_URI: &str = "sverigesradio:digilistan";

/// Prefix of the search hand-off references produced for unresolvable chart rows
pub const SEARCH_SCHEME: &str = "_search:";

// ============================================================================
// Track ids
// ============================================================================

/// Numeric id of a clip on the SR CDN (never zero)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(u64);

impl TrackId {
    /// Wrap a raw id, rejecting zero
    pub fn new(id: u64) -> Option<Self> {
        (id != 0).then_some(Self(id))
    }

    /// The raw numeric id
    pub fn get(self) -> u64 {
        self.0
    }

    /// `sverigesradio:<id>`
    pub fn uri(self) -> String {
        format!("{}{}", URI_SCHEME, self.0)
    }

    /// Extract the id from a `sverigesradio:<id>` uri
    pub fn from_uri(uri: &str) -> Option<Self> {
        uri.strip_prefix(URI_SCHEME)?.parse().ok()
    }
}

impl FromStr for TrackId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| Error::type_error("number id", format!("{:?}", s)))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Probe results
// ============================================================================

/// Technical stream properties filled in by the prober
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFormat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
}

/// Everything a probe reports about a stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeInfo {
    /// Duration in seconds (absent for live streams)
    pub duration: Option<f64>,
    pub format: AudioFormat,
}

// ============================================================================
// Descriptors
// ============================================================================

/// The virtual root folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootFolder {
    pub uri: String,
    pub title: String,
    pub contents: Vec<String>,
}

/// A live station, as returned to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationDetails {
    pub uri: String,
    pub title: String,
    /// Live manifest URL
    pub contents: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub format: AudioFormat,
}

/// A clip on the SR CDN
///
/// A track is *partial* while `contents` is unknown (only the display
/// metadata scraped from a chart) and *complete* once the CDN lookup has
/// provided the audio URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdnTrack {
    pub id: u64,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Audio URL on the CDN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    #[serde(flatten)]
    pub format: AudioFormat,
}

impl CdnTrack {
    /// A track with nothing but its identity
    pub fn new(id: TrackId) -> Self {
        Self {
            id: id.get(),
            uri: id.uri(),
            ..Default::default()
        }
    }

    /// Whether the audio URL is known
    pub fn is_complete(&self) -> bool {
        self.contents.is_some()
    }
}

/// The Digilistan chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub uri: String,
    pub title: String,
    /// Unix timestamp after which the host should ask again
    pub valid_to: i64,
    /// Ordered track uris or `_search:` references
    pub contents: Vec<String>,
}

/// Anything `get_uri_details` can answer with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UriDetails {
    Folder(RootFolder),
    Playlist(Playlist),
    Radio(StationDetails),
    Track(CdnTrack),
}

impl UriDetails {
    pub fn uri(&self) -> &str {
        match self {
            UriDetails::Folder(f) => &f.uri,
            UriDetails::Playlist(p) => &p.uri,
            UriDetails::Radio(s) => &s.uri,
            UriDetails::Track(t) => &t.uri,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            UriDetails::Folder(f) => Some(&f.title),
            UriDetails::Playlist(p) => Some(&p.title),
            UriDetails::Radio(s) => Some(&s.title),
            UriDetails::Track(t) => t.title.as_deref(),
        }
    }

    /// Stream URL for playable descriptors
    pub fn contents_url(&self) -> Option<&str> {
        match self {
            UriDetails::Radio(s) => Some(&s.contents),
            UriDetails::Track(t) => t.contents.as_deref(),
            UriDetails::Folder(_) | UriDetails::Playlist(_) => None,
        }
    }
}

/// Body of the CDN `getaudiourl` endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioUrlResponse {
    pub audio_url: String,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_track_id_parsing() {
        assert_eq!("7273377".parse::<TrackId>().unwrap().get(), 7273377);
        assert_eq!(" 12 ".parse::<TrackId>().unwrap().get(), 12);
        assert!("0".parse::<TrackId>().unwrap_err().is_type_error());
        assert!("p1".parse::<TrackId>().unwrap_err().is_type_error());
        assert!("".parse::<TrackId>().is_err());

        assert_eq!(
            TrackId::from_uri("sverigesradio:42").map(TrackId::get),
            Some(42)
        );
        assert_eq!(TrackId::from_uri("sverigesradio:digilistan"), None);
        assert_eq!(TrackId::from_uri("spotify:42"), None);
        assert_eq!(TrackId::new(9).unwrap().uri(), "sverigesradio:9");
    }

    #[test]
    fn test_track_serializes_with_type_tag() {
        let mut track = CdnTrack::new(TrackId::new(5).unwrap());
        track.title = Some("Move".into());
        track.contents = Some("https://lyssna-cdn.sr.se/a.m4a".into());
        track.format.codec = Some("aac".into());

        let value = serde_json::to_value(UriDetails::Track(track.clone())).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "track",
                "id": 5,
                "uri": "sverigesradio:5",
                "title": "Move",
                "contents": "https://lyssna-cdn.sr.se/a.m4a",
                "codec": "aac"
            })
        );

        let back: UriDetails = serde_json::from_value(value).unwrap();
        assert_eq!(back, UriDetails::Track(track));
    }

    #[test]
    fn test_playlist_uses_valid_to_key() {
        let playlist = Playlist {
            uri: DIGILISTAN_URI.into(),
            title: "Digilistan".into(),
            valid_to: 1_700_000_000,
            contents: vec![],
        };
        let value = serde_json::to_value(UriDetails::Playlist(playlist)).unwrap();
        assert_eq!(value["type"], "playlist");
        assert_eq!(value["validTo"], 1_700_000_000);
    }

    #[test]
    fn test_contents_url() {
        let folder = UriDetails::Folder(RootFolder {
            uri: ROOT_URI.into(),
            title: "Sveriges Radio".into(),
            contents: vec![],
        });
        assert_eq!(folder.contents_url(), None);

        let partial = UriDetails::Track(CdnTrack::new(TrackId::new(3).unwrap()));
        assert_eq!(partial.contents_url(), None);
    }
}
