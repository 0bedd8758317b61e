//! Shared session state: the single synchronization boundary between the
//! refresher, the downloader and the reporting tick.

use std::collections::VecDeque;

use hlsmon_hls::{MediaPlaylist, MediaSegment, VariantId};
use tokio::time::Instant;
use url::Url;

use crate::{buffer::BufferState, metrics::SessionPhase, records::DownloadLog};

/// The variant currently being downloaded.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ActiveVariant {
    pub index: usize,
    pub bandwidth_bps: Option<u64>,
    pub resolution: Option<(u32, u32)>,
}

impl ActiveVariant {
    pub fn single_rendition() -> Self {
        Self {
            index: 0,
            bandwidth_bps: None,
            resolution: None,
        }
    }
}

/// Working set of the active media playlist.
///
/// Live refreshes append newly listed segments; entries that slid out of
/// the server window disappear once consumed. Variant switches swap the
/// queue, keeping the download cursor aligned by media sequence number.
#[derive(Debug)]
pub(crate) struct PlaylistTracker {
    pub media_url: Url,
    pub variant: VariantId,
    pub target_duration: std::time::Duration,
    /// Segments not yet handed to the downloader, in sequence order.
    pending: VecDeque<MediaSegment>,
    /// Sequence number the downloader needs next.
    next_sequence: u64,
    /// `#EXT-X-ENDLIST` seen, or the server tore the stream down.
    pub ended: bool,
}

impl PlaylistTracker {
    pub fn new(media_url: Url, playlist: &MediaPlaylist) -> Self {
        Self {
            media_url,
            variant: playlist
                .segments
                .first()
                .map(|s| s.variant_id)
                .unwrap_or(VariantId(0)),
            target_duration: playlist.target_duration,
            pending: playlist.segments.iter().cloned().collect(),
            next_sequence: playlist.media_sequence,
            ended: playlist.end_list,
        }
    }

    /// Hand out the next segment in playlist order.
    pub fn pop_next(&mut self) -> Option<MediaSegment> {
        let segment = self.pending.pop_front()?;
        self.next_sequence = segment.sequence + 1;
        Some(segment)
    }

    /// Merge a live refresh: append segments newer than anything queued.
    ///
    /// Returns how many segments were appended.
    pub fn merge_refresh(&mut self, playlist: &MediaPlaylist) -> usize {
        let tail = self
            .pending
            .back()
            .map(|s| s.sequence + 1)
            .unwrap_or(self.next_sequence);

        let mut appended = 0;
        for segment in &playlist.segments {
            if segment.sequence >= tail {
                self.pending.push_back(segment.clone());
                appended += 1;
            }
        }

        self.target_duration = playlist.target_duration;
        if playlist.end_list {
            self.ended = true;
        }
        appended
    }

    /// Replace the queue with another variant's playlist, resuming at the
    /// sequence number the downloader needs next.
    pub fn switch_variant(&mut self, media_url: Url, variant: VariantId, playlist: &MediaPlaylist) {
        self.media_url = media_url;
        self.variant = variant;
        self.target_duration = playlist.target_duration;
        self.ended = playlist.end_list;
        self.pending = playlist
            .segments
            .iter()
            .filter(|s| s.sequence >= self.next_sequence)
            .cloned()
            .collect();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Everything the three tasks share, behind one mutex.
#[derive(Debug)]
pub(crate) struct SharedState {
    pub phase: SessionPhase,
    pub buffer: BufferState,
    pub log: DownloadLog,
    pub playlist: PlaylistTracker,
    pub active: ActiveVariant,
    /// Total duration for VOD streams; `None` for live.
    pub stream_duration_secs: Option<f64>,
    /// Segments whose download exceeded their media duration.
    pub missed_deadlines: u64,
    /// Playback-clock anchor for the reporting tick.
    pub last_tick: Option<Instant>,
    /// All known segments downloaded and the playlist is final.
    pub download_complete: bool,
}

impl SharedState {
    pub fn new(playlist: PlaylistTracker, active: ActiveVariant, log_cap: usize) -> Self {
        Self {
            phase: SessionPhase::Connecting,
            buffer: BufferState::new(),
            log: DownloadLog::new(log_cap),
            playlist,
            active,
            stream_duration_secs: None,
            missed_deadlines: 0,
            last_tick: None,
            download_complete: false,
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        let playlist = PlaylistTracker {
            media_url: Url::parse("http://test.invalid/media.m3u8").unwrap(),
            variant: VariantId(0),
            target_duration: std::time::Duration::from_secs(10),
            pending: VecDeque::new(),
            next_sequence: 0,
            ended: false,
        };
        Self::new(playlist, ActiveVariant::single_rendition(), 64)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hlsmon_hls::parse_media_playlist;

    use super::*;

    const LIVE_FIRST: &str = "#EXTM3U\n\
        #EXT-X-TARGETDURATION:4\n\
        #EXT-X-MEDIA-SEQUENCE:10\n\
        #EXTINF:4.000,\n\
        seg_10.ts\n\
        #EXTINF:4.000,\n\
        seg_11.ts\n";

    const LIVE_SECOND: &str = "#EXTM3U\n\
        #EXT-X-TARGETDURATION:4\n\
        #EXT-X-MEDIA-SEQUENCE:11\n\
        #EXTINF:4.000,\n\
        seg_11.ts\n\
        #EXTINF:4.000,\n\
        seg_12.ts\n\
        #EXTINF:4.000,\n\
        seg_13.ts\n";

    fn tracker(body: &str) -> PlaylistTracker {
        let playlist = parse_media_playlist(body.as_bytes(), VariantId(0)).unwrap();
        let url = Url::parse("http://test.invalid/live.m3u8").unwrap();
        PlaylistTracker::new(url, &playlist)
    }

    #[test]
    fn pop_advances_the_cursor_in_order() {
        let mut tracker = tracker(LIVE_FIRST);
        assert_eq!(tracker.pop_next().unwrap().sequence, 10);
        assert_eq!(tracker.pop_next().unwrap().sequence, 11);
        assert!(tracker.pop_next().is_none());
    }

    #[test]
    fn refresh_appends_only_new_segments() {
        let mut tracker = tracker(LIVE_FIRST);
        let refresh = parse_media_playlist(LIVE_SECOND.as_bytes(), VariantId(0)).unwrap();

        let appended = tracker.merge_refresh(&refresh);
        assert_eq!(appended, 2); // 12 and 13; 11 was already queued

        let sequences: Vec<u64> = std::iter::from_fn(|| tracker.pop_next())
            .map(|s| s.sequence)
            .collect();
        assert_eq!(sequences, vec![10, 11, 12, 13]);
    }

    #[test]
    fn refresh_after_drain_respects_cursor() {
        let mut tracker = tracker(LIVE_FIRST);
        while tracker.pop_next().is_some() {}

        let refresh = parse_media_playlist(LIVE_SECOND.as_bytes(), VariantId(0)).unwrap();
        let appended = tracker.merge_refresh(&refresh);
        // Only 12 and 13: segment 11 was already downloaded.
        assert_eq!(appended, 2);
        assert_eq!(tracker.pop_next().unwrap().sequence, 12);
    }

    #[test]
    fn variant_switch_resumes_at_cursor() {
        let mut tracker = tracker(LIVE_FIRST);
        assert_eq!(tracker.pop_next().unwrap().sequence, 10);

        let other = parse_media_playlist(LIVE_SECOND.as_bytes(), VariantId(1)).unwrap();
        let url = Url::parse("http://test.invalid/hi/live.m3u8").unwrap();
        tracker.switch_variant(url, VariantId(1), &other);

        assert_eq!(tracker.variant, VariantId(1));
        let next = tracker.pop_next().unwrap();
        assert_eq!(next.sequence, 11);
        assert_eq!(next.variant_id, VariantId(1));
        assert_eq!(tracker.pending_len(), 2);
        assert_eq!(tracker.target_duration, Duration::from_secs(4));
    }
}
