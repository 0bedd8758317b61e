//! Live playlist refresh task.
//!
//! Idle most of the time: wakes at the playlist's target-duration cadence
//! (never faster, to respect server load), merges newly listed segments,
//! and recognizes stream teardown.

use std::{sync::Arc, time::Duration};

use hlsmon_hls::{ManifestError, ManifestFetcher};
use hlsmon_net::Net;
use parking_lot::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{events::EventEmitter, metrics::SessionPhase, state::SharedState};

pub(crate) struct RefresherContext<M> {
    pub fetcher: Arc<ManifestFetcher<M>>,
    pub shared: Arc<Mutex<SharedState>>,
    pub events: EventEmitter,
    pub cancel: CancellationToken,
}

pub(crate) async fn run<M: Net>(ctx: RefresherContext<M>) {
    loop {
        let (ended, interval) = {
            let s = ctx.shared.lock();
            (s.playlist.ended, s.playlist.target_duration)
        };
        if ended {
            break;
        }

        let interval = interval.max(Duration::from_secs(1));
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = sleep(interval) => {}
        }

        // The downloader may have switched variants while we slept.
        let (media_url, variant, ended) = {
            let s = ctx.shared.lock();
            (s.playlist.media_url.clone(), s.playlist.variant, s.playlist.ended)
        };
        if ended {
            break;
        }

        let result = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            r = ctx.fetcher.refresh_media(&media_url, variant) => r,
        };

        match result {
            Ok(playlist) => {
                let mut s = ctx.shared.lock();
                let appended = s.playlist.merge_refresh(&playlist);
                trace!(appended, url = %media_url, "live playlist refreshed");
                if s.playlist.ended {
                    debug!("playlist declared ENDLIST");
                    break;
                }
            }
            Err(ManifestError::Ended) => {
                debug!(url = %media_url, "live playlist gone; stream ended");
                ctx.shared.lock().playlist.ended = true;
                break;
            }
            Err(e) => {
                // Retries already happened inside the net stack; this is
                // exhaustion, and exhaustion on the manifest is fatal.
                warn!(url = %media_url, error = %e, "manifest refresh failed");
                ctx.events.emit_fatal(format!("manifest refresh failed: {e}"));
                ctx.shared.lock().phase = SessionPhase::Stopped;
                ctx.cancel.cancel();
                break;
            }
        }
    }
}
