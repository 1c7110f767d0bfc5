//! The capability contract the media host talks to

use crate::error::Result;
use crate::models::UriDetails;
use crate::stream::StreamHandle;
use std::fmt::Debug;

/// A source of playable uris
///
/// The host calls these in order: [`can_play_uri`](Self::can_play_uri) to
/// find out which source owns a uri, [`get_uri_details`](Self::get_uri_details)
/// to describe it, then [`get_stream`](Self::get_stream) with the descriptor
/// it got back.
///
/// # Examples
///
/// ```rust,no_run
/// use pmosverigesradio::{SverigesRadioSource, UriProvider};
///
/// # async fn run() -> pmosverigesradio::Result<()> {
/// let source = SverigesRadioSource::new().await?;
///
/// if source.can_play_uri("sverigesradio:p3").await? {
///     let details = source.get_uri_details("sverigesradio:p3").await?;
///     let mut stream = source.get_stream(&details).await?;
///     // ... read WAV bytes from `stream` ...
///     stream.stop().await;
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait::async_trait]
pub trait UriProvider: Debug + Send + Sync {
    /// Whether this source owns `uri` and can resolve it
    ///
    /// Uris of other sources yield `Ok(false)`; an error means the uri looks
    /// like ours but does not resolve.
    async fn can_play_uri(&self, uri: &str) -> Result<bool>;

    /// Describe a uri previously accepted by [`can_play_uri`](Self::can_play_uri)
    async fn get_uri_details(&self, uri: &str) -> Result<UriDetails>;

    /// Start streaming a playable descriptor (station or track)
    async fn get_stream(&self, details: &UriDetails) -> Result<StreamHandle>;
}
