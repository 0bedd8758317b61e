//! Manifest retrieval: fetch + parse + URL resolution.

use hlsmon_net::Net;
use tracing::debug;
use url::Url;

use crate::{
    parsing::{
        parse_media_playlist, parse_root_playlist, MediaPlaylist, RootPlaylist, VariantId,
    },
    HlsResult, ManifestError,
};

/// Fetches and parses playlists through a [`Net`] stack.
///
/// Stateless: callers own the parsed playlists and decide when to re-fetch.
/// Timeout and retry behavior come from the decorators composed into `N`
/// (bounded timeout, exponential backoff on transient failures).
pub struct ManifestFetcher<N> {
    net: N,
}

impl<N: Net> ManifestFetcher<N> {
    pub fn new(net: N) -> Self {
        Self { net }
    }

    /// Fetch the stream URL and classify the document (master or media).
    pub async fn load_root(&self, url: &Url) -> HlsResult<RootPlaylist> {
        let fetched = self.net.get_bytes(url.clone()).await?;
        debug!(url = %url, bytes = fetched.len(), "fetched root playlist");
        parse_root_playlist(&fetched.bytes)
    }

    /// Fetch and parse a media playlist for a known variant.
    pub async fn load_media(&self, url: &Url, variant: VariantId) -> HlsResult<MediaPlaylist> {
        let fetched = self.net.get_bytes(url.clone()).await?;
        debug!(url = %url, bytes = fetched.len(), variant = variant.0, "fetched media playlist");
        parse_media_playlist(&fetched.bytes, variant)
    }

    /// Re-fetch a live media playlist.
    ///
    /// A 404 or 410 here means the server tore the stream down:
    /// surfaced as [`ManifestError::Ended`] rather than a retrieval failure.
    pub async fn refresh_media(&self, url: &Url, variant: VariantId) -> HlsResult<MediaPlaylist> {
        match self.net.get_bytes(url.clone()).await {
            Ok(fetched) => parse_media_playlist(&fetched.bytes, variant),
            Err(err) => match err.status_code() {
                Some(404) | Some(410) => Err(ManifestError::Ended),
                _ => Err(err.into()),
            },
        }
    }

    /// Resolve a playlist-relative URI against its base URL.
    pub fn resolve(&self, base: &Url, target: &str) -> HlsResult<Url> {
        base.join(target)
            .map_err(|e| ManifestError::Malformed(format!("failed to resolve URL: {e}")))
    }
}
