//! HLS playlist parsing and data types.

use std::{fmt::Write as _, time::Duration};

use hls_m3u8::{
    tags::VariantStream as HlsVariantStreamTag, MasterPlaylist as HlsMasterPlaylist,
    MediaPlaylist as HlsMediaPlaylist,
};

use crate::{HlsResult, ManifestError};

/// Identifies a variant within a parsed master playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantId(pub usize);

/// Parsed master playlist.
///
/// Immutable once parsed; only media playlists are re-fetched.
#[derive(Debug, Clone)]
pub struct MasterPlaylist {
    /// Available variants (renditions), in playlist order.
    pub variants: Vec<VariantStream>,
}

impl MasterPlaylist {
    /// The variant with the lowest advertised bandwidth.
    ///
    /// Variants without a bandwidth attribute sort last.
    pub fn lowest_bandwidth_variant(&self) -> Option<&VariantStream> {
        self.variants
            .iter()
            .min_by_key(|v| v.bandwidth.unwrap_or(u64::MAX))
    }

    pub fn variant(&self, id: VariantId) -> Option<&VariantStream> {
        self.variants.get(id.0)
    }
}

/// One variant stream entry from a master playlist. Identity is the URI.
#[derive(Debug, Clone)]
pub struct VariantStream {
    /// Variant identifier (stable for this parsed master playlist).
    pub id: VariantId,
    /// Absolute or relative URL of the media playlist for this variant.
    pub uri: String,
    /// Advertised bandwidth in bits per second.
    pub bandwidth: Option<u64>,
    /// Advertised resolution (width, height).
    pub resolution: Option<(u32, u32)>,
    /// The raw `CODECS="..."` string from the playlist.
    pub codecs: Option<String>,
}

/// Byte range of a segment within a larger resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub length: u64,
    pub start: Option<u64>,
}

/// Parsed media playlist.
#[derive(Debug, Clone)]
pub struct MediaPlaylist {
    /// Segments in the order they appear.
    pub segments: Vec<MediaSegment>,
    /// Advertised target segment duration.
    pub target_duration: Duration,
    /// Media sequence number of the first segment.
    pub media_sequence: u64,
    /// Whether the playlist is finished (`#EXT-X-ENDLIST` present).
    pub end_list: bool,
}

impl MediaPlaylist {
    /// A playlist without `#EXT-X-ENDLIST` is live and will be re-fetched.
    pub fn is_live(&self) -> bool {
        !self.end_list
    }

    /// Sum of all listed segment durations.
    pub fn total_duration(&self) -> Duration {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Render the segment list back to `#EXTINF` form.
    ///
    /// Diagnostic helper: the output round-trips through
    /// [`parse_media_playlist`] preserving sequences and durations.
    pub fn render_segments(&self) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            let _ = writeln!(out, "#EXTINF:{:.3},", seg.duration.as_secs_f64());
            let _ = writeln!(out, "{}", seg.uri);
        }
        out
    }
}

/// One media segment entry. Immutable once listed.
#[derive(Debug, Clone)]
pub struct MediaSegment {
    /// Sequence number (media-sequence + index in playlist).
    pub sequence: u64,
    /// The variant this segment belongs to.
    pub variant_id: VariantId,
    /// URL of the segment (absolute or relative to the playlist URI).
    pub uri: String,
    pub duration: Duration,
    pub byte_range: Option<ByteRange>,
}

/// A playlist document, classified.
///
/// Servers may answer the stream URL with either a master playlist or, for
/// single-rendition streams, directly with a media playlist.
#[derive(Debug, Clone)]
pub enum RootPlaylist {
    Master(MasterPlaylist),
    Media(MediaPlaylist),
}

/// Parses the document at the stream URL, auto-detecting its kind.
///
/// A document with no `#EXT-X-STREAM-INF` lines is treated as a media
/// playlist for a single-rendition stream.
pub fn parse_root_playlist(data: &[u8]) -> HlsResult<RootPlaylist> {
    let input =
        std::str::from_utf8(data).map_err(|e| ManifestError::Malformed(e.to_string()))?;

    if input.contains("#EXT-X-STREAM-INF") {
        Ok(RootPlaylist::Master(parse_master_playlist(data)?))
    } else {
        Ok(RootPlaylist::Media(parse_media_playlist(
            data,
            VariantId(0),
        )?))
    }
}

/// Parses a master playlist (M3U8) into [`MasterPlaylist`].
pub fn parse_master_playlist(data: &[u8]) -> HlsResult<MasterPlaylist> {
    let input =
        std::str::from_utf8(data).map_err(|e| ManifestError::Malformed(e.to_string()))?;
    let hls_master = HlsMasterPlaylist::try_from(input)
        .map_err(|e| ManifestError::Malformed(e.to_string()))?
        .into_owned();

    let variants: Vec<VariantStream> = hls_master
        .variant_streams
        .iter()
        .filter_map(|vs| match vs {
            HlsVariantStreamTag::ExtXStreamInf {
                uri, stream_data, ..
            } => {
                let bandwidth = Some(stream_data.bandwidth());
                let resolution = stream_data
                    .resolution()
                    .map(|r| (r.width() as u32, r.height() as u32));
                let codecs = stream_data.codecs().map(|c| c.to_string());
                Some((uri.to_string(), bandwidth, resolution, codecs))
            }
            // I-frame-only renditions are not playable streams.
            HlsVariantStreamTag::ExtXIFrame { .. } => None,
        })
        .enumerate()
        .map(|(index, (uri, bandwidth, resolution, codecs))| VariantStream {
            id: VariantId(index),
            uri,
            bandwidth,
            resolution,
            codecs,
        })
        .collect();

    if variants.is_empty() {
        return Err(ManifestError::Malformed(
            "master playlist has no playable variants".to_string(),
        ));
    }

    Ok(MasterPlaylist { variants })
}

/// Parses a media playlist (M3U8) into [`MediaPlaylist`].
pub fn parse_media_playlist(data: &[u8], variant_id: VariantId) -> HlsResult<MediaPlaylist> {
    let input =
        std::str::from_utf8(data).map_err(|e| ManifestError::Malformed(e.to_string()))?;
    let hls_media = HlsMediaPlaylist::try_from(input)
        .map_err(|e| ManifestError::Malformed(e.to_string()))?
        .into_owned();

    // `#EXT-X-ENDLIST` is the only reliable end-of-stream marker; some
    // servers set Playlist-Type=VOD without a terminal ENDLIST.
    let end_list = input.contains("#EXT-X-ENDLIST");
    let target_duration = hls_media.target_duration;
    let media_sequence = hls_media.media_sequence as u64;

    let segments: Vec<MediaSegment> = hls_media
        .segments
        .iter()
        .enumerate()
        .map(|(index, (_idx, seg))| MediaSegment {
            sequence: media_sequence + index as u64,
            variant_id,
            uri: seg.uri().to_string(),
            duration: seg.duration.duration(),
            byte_range: seg.byte_range.as_ref().map(|br| ByteRange {
                length: br.len() as u64,
                start: br.start().map(|s| s as u64),
            }),
        })
        .collect();

    Ok(MediaPlaylist {
        segments,
        target_duration,
        media_sequence,
        end_list,
    })
}
