//! Session orchestration: wiring the refresher, the downloader and the
//! reporting tick together over one shared state.

use std::{sync::Arc, time::Duration};

use hlsmon_abr::{RenditionSelector, Variant};
use hlsmon_hls::{ManifestError, ManifestFetcher, RootPlaylist};
use hlsmon_net::{Net, NetExt};
use parking_lot::Mutex;
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    buffer::StallEdge,
    config::MonitorOptions,
    downloader::{self, DownloaderContext},
    error::SessionResult,
    events::{EventEmitter, SessionEvent},
    metrics::{self, SessionPhase},
    refresh::{self, RefresherContext},
    state::{ActiveVariant, PlaylistTracker, SharedState},
};

/// One monitoring session over one stream URL.
///
/// Construction performs the initial manifest loads; failures there are
/// fatal by definition (retries already happened in the net stack).
/// Afterwards the session runs as background tasks until the stream ends,
/// an unrecoverable error occurs, or [`shutdown`](Self::shutdown) is called.
pub struct MonitorSession {
    shared: Arc<Mutex<SharedState>>,
    events: EventEmitter,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl MonitorSession {
    pub async fn start<N>(net: N, options: MonitorOptions) -> SessionResult<Self>
    where
        N: Net + Clone + 'static,
    {
        let cancel = options.cancel.clone().unwrap_or_default();

        let manifest_net = net
            .clone()
            .with_timeout(options.net.request_timeout)
            .with_retry(options.net.retry_policy.clone());
        let segment_net = net
            .with_timeout(options.segment_timeout)
            .with_retry(options.segment_retry.clone());
        let fetcher = Arc::new(ManifestFetcher::new(manifest_net));

        let root = fetcher.load_root(&options.url).await?;
        let (master, selector, active, media_url, media) = match root {
            RootPlaylist::Master(master) => {
                let lowest = master.lowest_bandwidth_variant().ok_or_else(|| {
                    ManifestError::Malformed("master playlist has no variants".to_string())
                })?;
                let media_url = fetcher.resolve(&options.url, &lowest.uri)?;
                let media = fetcher.load_media(&media_url, lowest.id).await?;

                let ladder: Vec<Variant> = master
                    .variants
                    .iter()
                    .filter_map(|v| {
                        v.bandwidth.map(|bandwidth_bps| Variant {
                            index: v.id.0,
                            bandwidth_bps,
                        })
                    })
                    .collect();
                let selector = (ladder.len() > 1)
                    .then(|| RenditionSelector::new(ladder, options.abr.clone()));

                let active = ActiveVariant {
                    index: lowest.id.0,
                    bandwidth_bps: lowest.bandwidth,
                    resolution: lowest.resolution,
                };
                info!(
                    variants = master.variants.len(),
                    initial = active.index,
                    "master playlist loaded"
                );
                (Some(master), selector, active, media_url, media)
            }
            RootPlaylist::Media(media) => {
                info!("stream URL answered with a media playlist (single rendition)");
                (
                    None,
                    None,
                    ActiveVariant::single_rendition(),
                    options.url.clone(),
                    media,
                )
            }
        };

        let is_live = media.is_live();
        let tracker = PlaylistTracker::new(media_url, &media);
        let mut state = SharedState::new(tracker, active, options.download_log_cap);
        if !is_live {
            state.stream_duration_secs = Some(media.total_duration().as_secs_f64());
        }

        let shared = Arc::new(Mutex::new(state));
        let events = EventEmitter::new(options.events_channel_capacity);

        let mut tasks = Vec::with_capacity(3);
        tasks.push(tokio::spawn(downloader::run(DownloaderContext {
            net: segment_net,
            fetcher: fetcher.clone(),
            root_url: options.url.clone(),
            master,
            selector,
            abr: options.abr.clone(),
            max_buffer_secs: options.max_buffer_secs,
            shared: shared.clone(),
            events: events.clone(),
            cancel: cancel.clone(),
        })));
        if is_live {
            tasks.push(tokio::spawn(refresh::run(RefresherContext {
                fetcher,
                shared: shared.clone(),
                events: events.clone(),
                cancel: cancel.clone(),
            })));
        }
        tasks.push(tokio::spawn(run_ticker(
            shared.clone(),
            events.clone(),
            cancel.clone(),
            options.report_interval,
            options.keep_up_buffer_secs,
        )));

        Ok(Self {
            shared,
            events,
            cancel,
            tasks,
        })
    }

    /// Subscribe to the session's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Request cooperative shutdown: tasks observe the flag at their next
    /// safe point and drop any in-flight request.
    pub fn shutdown(&self) {
        self.shared.lock().phase = SessionPhase::Stopped;
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for all session tasks to finish.
    pub async fn wait(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Fixed-interval reporting tick.
///
/// Fires every interval regardless of in-flight downloads, taking the
/// snapshot under the state lock so counters and timestamps are read
/// together.
async fn run_ticker(
    shared: Arc<Mutex<SharedState>>,
    events: EventEmitter,
    cancel: CancellationToken,
    interval: Duration,
    keep_up_buffer_secs: f64,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = {
            let mut s = shared.lock();
            metrics::sample(&mut s, Instant::now(), keep_up_buffer_secs)
        };

        if let Some(snapshot) = outcome.snapshot {
            match outcome.stall_edge {
                Some(StallEdge::Started) => events.emit_stall_started(snapshot.stall_count),
                Some(StallEdge::Ended) => events.emit_stall_ended(),
                None => {}
            }
            events.emit_snapshot(snapshot);
        }

        if outcome.finished {
            events.emit_stream_ended();
            break;
        }
    }
}
