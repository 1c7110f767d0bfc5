//! Cache of clips served by the SR CDN
//!
//! Entries are created either by the Digilistan scraper (partial: title and
//! artist only) or by a CDN lookup (complete: audio URL and duration). A
//! lookup never overwrites what scraping already knew; it only fills the
//! missing slots.
//!
//! Two concurrent lookups of the same uncached id both go to the network and
//! the last one to finish wins the cache slot.

use crate::client::SverigesRadioClient;
use crate::error::{Error, Result};
use crate::models::{AudioUrlResponse, CdnTrack, TrackId};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory store of CDN tracks, keyed by clip id
#[derive(Debug, Clone)]
pub struct CdnTrackCache {
    tracks: Arc<RwLock<HashMap<TrackId, CdnTrack>>>,
    client: SverigesRadioClient,
}

impl CdnTrackCache {
    pub fn new(client: SverigesRadioClient) -> Self {
        Self {
            tracks: Arc::new(RwLock::new(HashMap::new())),
            client,
        }
    }

    pub async fn get(&self, id: TrackId) -> Option<CdnTrack> {
        self.tracks.read().await.get(&id).cloned()
    }

    pub async fn contains(&self, id: TrackId) -> bool {
        self.tracks.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.tracks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tracks.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.tracks.write().await.clear();
    }

    /// Store a track as is, replacing any previous entry
    ///
    /// Tracks with id 0 are not stored.
    pub async fn put(&self, mut track: CdnTrack) -> Option<CdnTrack> {
        let id = TrackId::new(track.id)?;
        track.uri = id.uri();
        self.tracks.write().await.insert(id, track)
    }

    /// Record what a chart row says about a clip
    ///
    /// Scraped title/artist replace older scraped values; the audio URL and
    /// duration of a complete entry are kept.
    pub async fn merge_scraped(
        &self,
        id: TrackId,
        title: Option<String>,
        artist: Option<String>,
    ) -> CdnTrack {
        let mut tracks = self.tracks.write().await;
        let entry = tracks.entry(id).or_insert_with(|| CdnTrack::new(id));
        if title.is_some() {
            entry.title = title;
        }
        if artist.is_some() {
            entry.artist = artist;
        }
        entry.clone()
    }

    /// Same as [`get_track_info`](Self::get_track_info) for an id in text form
    ///
    /// A non-numeric id fails with a type error before any request is made.
    pub async fn lookup(&self, raw_id: &str) -> Result<CdnTrack> {
        let id: TrackId = raw_id.parse()?;
        self.get_track_info(id).await
    }

    /// Resolve a clip to a complete track
    ///
    /// Returns the cached entry untouched when it is already complete.
    /// Otherwise asks the CDN and merges the answer into the cache.
    pub async fn get_track_info(&self, id: TrackId) -> Result<CdnTrack> {
        if let Some(track) = self.get(id).await.filter(CdnTrack::is_complete) {
            debug!(%id, "CDN cache hit");
            return Ok(track);
        }

        let fetched = self
            .client
            .fetch_audio_url(id)
            .await
            .map_err(|e| Error::Cdn {
                id: id.get(),
                source: Box::new(e),
            })?;

        let mut tracks = self.tracks.write().await;
        let track = merge_fetched(tracks.remove(&id), id, fetched);
        tracks.insert(id, track.clone());

        debug!(%id, title = ?track.title, "CDN track resolved");
        Ok(track)
    }
}

/// Combine a CDN answer with what was already known about a clip
///
/// Known fields win; the CDN only fills what is absent. When no title is
/// known afterwards, one is guessed from the audio URL.
pub fn merge_fetched(existing: Option<CdnTrack>, id: TrackId, fetched: AudioUrlResponse) -> CdnTrack {
    let mut track = existing.unwrap_or_else(|| CdnTrack::new(id));

    track.id = id.get();
    track.uri = id.uri();
    track.duration = track.duration.or(fetched.duration);
    if track.contents.is_none() {
        track.contents = Some(fetched.audio_url);
    }

    if track.title.is_none() {
        if let Some((title, artist)) = track.contents.as_deref().and_then(guess_title_artist) {
            track.title = Some(title);
            track.artist = track.artist.or(Some(artist));
        }
    }

    track
}

/// Guess `(title, artist)` from a CDN file name
///
/// Files are named `<digits>_<title>_-_<artist>_<7 hex digits>...`, e.g.
/// `.../47_move_-_the_mamas_359267a_a192.m4a`.
pub fn guess_title_artist(contents: &str) -> Option<(String, String)> {
    let re = Regex::new(r"/\d+_(.+)_-_(.+)_[a-f0-9]{7}").ok()?;
    let caps = re.captures(contents)?;
    Some((caps[1].replace('_', " "), caps[2].replace('_', " ")))
}
