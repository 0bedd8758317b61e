//! Sequential segment download task.
//!
//! One in-flight request at a time, strictly in playlist order, matching
//! sequential playback consumption. Completed transfers feed the download
//! log, the buffer model and the throughput estimator; abandoned segments
//! count as stalls and the downloader moves on.

use std::{sync::Arc, time::Duration};

use hlsmon_abr::{
    AbrOptions, RenditionSelector, SwitchDecision, ThroughputEstimator, ThroughputSample,
};
use hlsmon_hls::{ManifestFetcher, MasterPlaylist, MediaSegment};
use hlsmon_net::Net;
use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::SegmentError,
    events::EventEmitter,
    metrics::SessionPhase,
    records::DownloadRecord,
    state::{ActiveVariant, SharedState},
};

/// Sleep while waiting for buffer headroom or a live refresh.
const IDLE_POLL: Duration = Duration::from_millis(200);

pub(crate) struct DownloaderContext<S, M> {
    pub net: S,
    pub fetcher: Arc<ManifestFetcher<M>>,
    /// The stream URL; master-playlist variant URIs resolve against it.
    pub root_url: Url,
    pub master: Option<MasterPlaylist>,
    pub selector: Option<RenditionSelector>,
    pub abr: AbrOptions,
    pub max_buffer_secs: f64,
    pub shared: Arc<Mutex<SharedState>>,
    pub events: EventEmitter,
    pub cancel: CancellationToken,
}

pub(crate) async fn run<S: Net, M: Net>(mut ctx: DownloaderContext<S, M>) {
    let mut estimator = ThroughputEstimator::new(&ctx.abr);
    // Media-timeline offset where the next downloaded (or skipped) segment
    // starts.
    let mut timeline_cursor = 0.0f64;
    let mut handled_stalls = 0u64;

    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }

        // Playback starvation invalidates the current rendition choice.
        let stall_count = ctx.shared.lock().buffer.stall_count();
        if stall_count > handled_stalls {
            handled_stalls = stall_count;
            stall_downswitch(&mut ctx, &estimator).await;
        }

        // Hold off while enough content is buffered ahead.
        let occupancy = ctx.shared.lock().buffer.occupancy_secs();
        if occupancy >= ctx.max_buffer_secs {
            if idle(&ctx.cancel).await {
                break;
            }
            continue;
        }

        let (segment, media_url, ended) = {
            let mut s = ctx.shared.lock();
            let segment = s.playlist.pop_next();
            (segment, s.playlist.media_url.clone(), s.playlist.ended)
        };

        let Some(segment) = segment else {
            if ended {
                ctx.shared.lock().download_complete = true;
                debug!("all listed segments downloaded");
                break;
            }
            // Live stream: wait for the refresher to list more segments.
            if idle(&ctx.cancel).await {
                break;
            }
            continue;
        };

        if !download_one(
            &mut ctx,
            &mut estimator,
            &media_url,
            &segment,
            &mut timeline_cursor,
        )
        .await
        {
            break;
        }
    }
}

/// Fetch one segment. Returns `false` on cancellation.
async fn download_one<S: Net, M: Net>(
    ctx: &mut DownloaderContext<S, M>,
    estimator: &mut ThroughputEstimator,
    media_url: &Url,
    segment: &MediaSegment,
    timeline_cursor: &mut f64,
) -> bool {
    let seg_url = match ctx.fetcher.resolve(media_url, &segment.uri) {
        Ok(url) => url,
        Err(e) => {
            let err = SegmentError::InvalidUri {
                sequence: segment.sequence,
                message: e.to_string(),
            };
            record_failure(ctx, segment, timeline_cursor, &err);
            return true;
        }
    };

    let started = Instant::now();
    let result = tokio::select! {
        _ = ctx.cancel.cancelled() => return false, // drops the in-flight request
        r = ctx.net.get_bytes(seg_url) => r,
    };
    let finished = Instant::now();

    let fetched = match result {
        Ok(fetched) if fetched.is_empty() => {
            let err = SegmentError::Empty {
                sequence: segment.sequence,
            };
            record_failure(ctx, segment, timeline_cursor, &err);
            return true;
        }
        Ok(fetched) => fetched,
        Err(e) => {
            let err = SegmentError::Fetch {
                sequence: segment.sequence,
                source: e,
            };
            record_failure(ctx, segment, timeline_cursor, &err);
            return true;
        }
    };

    let media_secs = segment.duration.as_secs_f64();
    let elapsed = finished.duration_since(started);
    let mut became_ready = false;
    let ready_index;
    let ready_resolution;
    {
        let mut s = ctx.shared.lock();
        let active_index = s.active.index;
        s.log.push(DownloadRecord {
            sequence: segment.sequence,
            variant_index: active_index,
            bytes: fetched.len(),
            started_at: started,
            finished_at: finished,
            http_status: fetched.status,
        });
        s.buffer.push_range(*timeline_cursor, media_secs);
        if elapsed.as_secs_f64() > media_secs {
            s.missed_deadlines += 1;
        }
        if s.phase == SessionPhase::Connecting {
            s.phase = SessionPhase::Monitoring;
            s.last_tick = Some(finished);
            became_ready = true;
        }
        ready_index = s.active.index;
        ready_resolution = s.active.resolution;
    }
    *timeline_cursor += media_secs;

    if became_ready {
        ctx.events.emit_ready(ready_index, ready_resolution);
    }
    ctx.events
        .emit_segment_completed(segment.sequence, fetched.len(), elapsed);
    debug!(
        sequence = segment.sequence,
        bytes = fetched.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "segment downloaded"
    );

    estimator.push_sample(ThroughputSample {
        bytes: fetched.len(),
        duration: elapsed,
    });
    adapt_rendition(ctx, estimator).await;
    true
}

/// Give the selector its post-segment look at the throughput estimate.
async fn adapt_rendition<S: Net, M: Net>(
    ctx: &mut DownloaderContext<S, M>,
    estimator: &ThroughputEstimator,
) {
    let decision = {
        let Some(selector) = ctx.selector.as_mut() else {
            return;
        };
        selector.on_segment_complete();
        selector.decide(estimator.estimate_bps())
    };
    if decision.changed {
        apply_switch(ctx, decision).await;
    }
}

/// Step down immediately after a stall episode began.
async fn stall_downswitch<S: Net, M: Net>(
    ctx: &mut DownloaderContext<S, M>,
    estimator: &ThroughputEstimator,
) {
    let decision = {
        let Some(selector) = ctx.selector.as_ref() else {
            return;
        };
        selector.on_stall(estimator.estimate_bps())
    };
    if decision.changed {
        apply_switch(ctx, decision).await;
    }
}

/// Load the target variant's playlist, then commit the switch.
///
/// A fetch failure keeps the current variant; the selector state is only
/// touched once the new playlist is in hand.
async fn apply_switch<S: Net, M: Net>(ctx: &mut DownloaderContext<S, M>, decision: SwitchDecision) {
    let Some(master) = ctx.master.as_ref() else {
        return;
    };
    let Some(target) = master.variants.get(decision.target) else {
        return;
    };

    let target_url = match ctx.fetcher.resolve(&ctx.root_url, &target.uri) {
        Ok(url) => url,
        Err(e) => {
            warn!(target = decision.target, error = %e, "unresolvable variant URI");
            return;
        }
    };

    let playlist = tokio::select! {
        _ = ctx.cancel.cancelled() => return,
        r = ctx.fetcher.load_media(&target_url, target.id) => r,
    };

    match playlist {
        Ok(playlist) => {
            {
                let mut s = ctx.shared.lock();
                s.playlist.switch_variant(target_url, target.id, &playlist);
                s.active = ActiveVariant {
                    index: decision.target,
                    bandwidth_bps: target.bandwidth,
                    resolution: target.resolution,
                };
            }
            if let Some(selector) = ctx.selector.as_mut() {
                let from = selector.current_index();
                selector.apply(&decision);
                ctx.events
                    .emit_variant_switched(from, decision.target, decision.reason);
            }
        }
        Err(e) => {
            warn!(
                target = decision.target,
                error = %e,
                "target variant playlist failed to load; keeping current variant"
            );
        }
    }
}

/// Retry exhaustion on one segment: non-fatal, counted as a stall.
fn record_failure<S, M>(
    ctx: &DownloaderContext<S, M>,
    segment: &MediaSegment,
    timeline_cursor: &mut f64,
    error: &SegmentError,
) {
    warn!(sequence = segment.sequence, error = %error, "segment abandoned");
    ctx.events
        .emit_segment_failed(segment.sequence, &error.to_string());
    ctx.shared.lock().buffer.record_stall();
    // The gap stays; playback jumps it once later content arrives.
    *timeline_cursor += segment.duration.as_secs_f64();
}

/// Returns `true` when cancelled.
async fn idle(cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = sleep(IDLE_POLL) => false,
    }
}
