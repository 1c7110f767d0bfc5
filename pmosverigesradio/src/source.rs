//! Uri resolution for the Sveriges Radio source
//!
//! `sverigesradio:/` is the root folder, `sverigesradio:p1`..`p4` the live
//! stations, `sverigesradio:digilistan` the weekly chart, and
//! `sverigesradio:<id>` any clip known to the CDN.

use crate::cdn::CdnTrackCache;
use crate::client::SverigesRadioClient;
use crate::config::SverigesRadioConfig;
use crate::digilistan::DigilistanScraper;
use crate::error::{Error, Result};
use crate::models::{Playlist, TrackId, UriDetails, DIGILISTAN_URI, ROOT_URI, URI_SCHEME};
use crate::probe::{add_probe_info, FfprobeProber, Prober};
use crate::provider::UriProvider;
use crate::stations::{find_station, is_static_uri, root_folder};
use crate::stream::{StreamHandle, StreamLauncher};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The Sveriges Radio implementation of [`UriProvider`]
///
/// Owns the clip cache; clones of the source share it.
#[derive(Debug, Clone)]
pub struct SverigesRadioSource {
    cache: Arc<CdnTrackCache>,
    digilistan: DigilistanScraper,
    prober: Arc<dyn Prober>,
    launcher: StreamLauncher,
}

impl SverigesRadioSource {
    /// Create a source from the built-in defaults and the process environment
    ///
    /// Use [`from_config`](Self::from_config) with
    /// [`SverigesRadioConfig::load`] to read a config file as well.
    pub async fn new() -> Result<Self> {
        let config = SverigesRadioConfig::from_env()?;
        Self::from_config(&config).await
    }

    pub async fn from_config(config: &SverigesRadioConfig) -> Result<Self> {
        let client = SverigesRadioClient::builder().config(config).build().await?;

        info!(
            ffmpeg = %config.ffmpeg_path.display(),
            ffprobe = %config.ffprobe_path.display(),
            "Sveriges Radio source ready"
        );

        Ok(Self::with_tools(client, config))
    }

    /// Use an existing client
    ///
    /// Probing and streaming tools still follow the defaults and the
    /// environment (`FFMPEG_PATH`, `FFPROBE_PATH`, `PMOMUSIC_SVERIGESRADIO__*`).
    pub fn from_client(client: SverigesRadioClient) -> Result<Self> {
        let config = SverigesRadioConfig::from_env()?;
        Ok(Self::with_tools(client, &config))
    }

    fn with_tools(client: SverigesRadioClient, config: &SverigesRadioConfig) -> Self {
        let prober = FfprobeProber::new(config.ffprobe_path.clone())
            .with_timeout(config.probe_timeout());
        Self::from_parts(client, Arc::new(prober), StreamLauncher::from_config(config))
    }

    pub fn from_parts(
        client: SverigesRadioClient,
        prober: Arc<dyn Prober>,
        launcher: StreamLauncher,
    ) -> Self {
        let cache = Arc::new(CdnTrackCache::new(client.clone()));
        Self {
            digilistan: DigilistanScraper::new(client, Arc::clone(&cache)),
            cache,
            prober,
            launcher,
        }
    }

    /// Replace the stream prober
    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    /// Replace the transcoder launcher
    pub fn with_launcher(mut self, launcher: StreamLauncher) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn cache(&self) -> &CdnTrackCache {
        &self.cache
    }

    pub fn digilistan(&self) -> &DigilistanScraper {
        &self.digilistan
    }

    /// Scrape the current chart
    pub async fn get_digilistan(&self) -> Result<Playlist> {
        Ok(self.digilistan.scrape().await?.playlist)
    }

    async fn resolve(&self, uri: &str) -> Result<UriDetails> {
        if uri == ROOT_URI {
            return Ok(UriDetails::Folder(root_folder()));
        }

        if uri == DIGILISTAN_URI {
            return Ok(UriDetails::Playlist(self.get_digilistan().await?));
        }

        if let Some(station) = find_station(uri) {
            let details = add_probe_info(self.prober.as_ref(), station.details()).await?;
            return Ok(UriDetails::Radio(details));
        }

        let raw_id = uri.strip_prefix(URI_SCHEME).unwrap_or(uri);
        let track = self.cache.lookup(raw_id).await?;
        let track = add_probe_info(self.prober.as_ref(), track).await?;
        Ok(UriDetails::Track(track))
    }
}

#[async_trait]
impl UriProvider for SverigesRadioSource {
    async fn can_play_uri(&self, uri: &str) -> Result<bool> {
        if is_static_uri(uri) {
            return Ok(true);
        }

        let Some(id) = TrackId::from_uri(uri) else {
            return Ok(false);
        };

        if self.cache.contains(id).await {
            return Ok(true);
        }

        match self.cache.get_track_info(id).await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!(%uri, error = %e, "Sveriges Radio uri does not resolve");
                Err(Error::NotFound {
                    uri: uri.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }

    async fn get_uri_details(&self, uri: &str) -> Result<UriDetails> {
        debug!(%uri, "Resolving uri details");

        self.resolve(uri).await.map_err(|e| {
            if e.is_type_error() {
                e
            } else {
                warn!(%uri, error = %e, "Failed to resolve uri details");
                Error::Sequence {
                    uri: uri.to_string(),
                    source: Box::new(e),
                }
            }
        })
    }

    async fn get_stream(&self, details: &UriDetails) -> Result<StreamHandle> {
        let contents = match details {
            UriDetails::Radio(_) | UriDetails::Track(_) => details.contents_url(),
            UriDetails::Folder(_) | UriDetails::Playlist(_) => None,
        }
        .ok_or_else(|| Error::type_error("track object", details.uri()))?;

        let uri = details.uri();

        // Re-validation is reported, never waited for
        let source = self.clone();
        let checked = uri.to_string();
        tokio::spawn(async move {
            match source.can_play_uri(&checked).await {
                Ok(true) => debug!(uri = %checked, "Stream uri re-validated"),
                Ok(false) => warn!(uri = %checked, "Streaming a uri this source does not recognise"),
                Err(e) => warn!(uri = %checked, error = %e, "Stream uri failed re-validation"),
            }
        });

        self.launcher.launch(uri, contents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CdnTrack;

    async fn source() -> SverigesRadioSource {
        let client = SverigesRadioClient::builder()
            .cdn_url("http://127.0.0.1:9/playerajax/getaudiourl")
            .digilistan_url("http://127.0.0.1:9/sida/topplista.aspx")
            .build()
            .await
            .unwrap();
        SverigesRadioSource::from_client(client).unwrap()
    }

    #[tokio::test]
    async fn test_static_uris_are_playable() {
        let source = source().await;
        for uri in [
            "sverigesradio:/",
            "sverigesradio:p1",
            "sverigesradio:p4",
            "sverigesradio:digilistan",
        ] {
            assert!(source.can_play_uri(uri).await.unwrap(), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_foreign_uris_are_declined() {
        let source = source().await;
        for uri in [
            "spotify:track:1",
            "sverigesradio:p5",
            "sverigesradio:",
            "sverigesradio:0",
            "sverigesradio:12abc",
            "",
        ] {
            assert!(!source.can_play_uri(uri).await.unwrap(), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_cached_id_is_playable_without_lookup() {
        let source = source().await;
        source.cache().put(CdnTrack::new(TrackId::new(55).unwrap())).await;
        assert!(source.can_play_uri("sverigesradio:55").await.unwrap());
    }

    #[tokio::test]
    async fn test_root_details() {
        let source = source().await;
        let details = source.get_uri_details("sverigesradio:/").await.unwrap();
        let UriDetails::Folder(folder) = details else {
            panic!("expected a folder");
        };
        assert_eq!(folder.contents.len(), 5);
    }

    #[tokio::test]
    async fn test_text_id_is_a_type_error() {
        let source = source().await;
        let err = source.get_uri_details("sverigesradio:nope").await.unwrap_err();
        assert!(err.is_type_error());
    }

    #[tokio::test]
    async fn test_folder_cannot_be_streamed() {
        let source = source().await;
        let err = source
            .get_stream(&UriDetails::Folder(root_folder()))
            .await
            .unwrap_err();
        assert!(err.is_type_error());
    }
}
