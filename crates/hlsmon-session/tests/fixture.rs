//! Loopback HLS origin for integration tests.
//!
//! Serves a three-rung master playlist plus generated media playlists and
//! segments, with per-path request counting and failure/delay injection.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use url::Url;

pub const BANDWIDTHS: [u64; 3] = [1_280_000, 2_560_000, 5_120_000];
pub const RESOLUTIONS: [(u32, u32); 3] = [(854, 480), (1280, 720), (1920, 1080)];

#[derive(Clone)]
pub struct FixtureOptions {
    /// Total segments the stream will ever list.
    pub segment_count: usize,
    pub segment_duration_secs: f64,
    pub segment_bytes: usize,
    /// Serving delay per segment request (throughput shaping).
    pub segment_delay: Duration,
    /// First N requests to each segment path answer 503.
    pub fail_per_segment: usize,
    /// Live stream: no ENDLIST; each media-playlist fetch reveals one more
    /// segment beyond `live_initial_segments`.
    pub live: bool,
    pub live_initial_segments: usize,
    /// Media-playlist requests beyond this count answer 404 (teardown).
    pub playlist_404_after: Option<usize>,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            segment_count: 3,
            segment_duration_secs: 10.0,
            segment_bytes: 160_000,
            segment_delay: Duration::ZERO,
            fail_per_segment: 0,
            live: false,
            live_initial_segments: 2,
            playlist_404_after: None,
        }
    }
}

struct FixtureState {
    opts: FixtureOptions,
    hits: Mutex<HashMap<String, usize>>,
}

impl FixtureState {
    /// Count a request; returns the 1-based hit number for the path.
    fn count(&self, path: &str) -> usize {
        let mut hits = self.hits.lock().unwrap();
        let entry = hits.entry(path.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    fn media_hits(&self) -> usize {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path.ends_with("playlist.m3u8"))
            .map(|(_, count)| *count)
            .sum()
    }
}

pub struct TestServer {
    base_url: String,
    state: Arc<FixtureState>,
}

impl TestServer {
    pub async fn start(opts: FixtureOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(FixtureState {
            opts,
            hits: Mutex::new(HashMap::new()),
        });

        let app = Router::new()
            .route("/master.m3u8", get(master_endpoint))
            .route("/video/:variant/playlist.m3u8", get(media_endpoint))
            .route("/video/:variant/:segment", get(segment_endpoint))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", addr.port()),
            state,
        }
    }

    pub fn url(&self, path: &str) -> Url {
        format!("{}{}", self.base_url, path).parse().unwrap()
    }

    pub fn master_url(&self) -> Url {
        self.url("/master.m3u8")
    }

    pub fn hit_count(&self, path: &str) -> usize {
        self.state
            .hits
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

async fn master_endpoint(State(state): State<Arc<FixtureState>>) -> String {
    state.count("/master.m3u8");

    let mut body = String::from("#EXTM3U\n#EXT-X-VERSION:6\n");
    let names = ["480p", "720p", "1080p"];
    for i in 0..3 {
        body.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},CODECS=\"avc1.42c01e,mp4a.40.2\",RESOLUTION={}x{}\n\
             video/{}/playlist.m3u8\n",
            BANDWIDTHS[i], RESOLUTIONS[i].0, RESOLUTIONS[i].1, names[i],
        ));
    }
    body
}

async fn media_endpoint(
    State(state): State<Arc<FixtureState>>,
    Path(variant): Path<String>,
) -> Result<String, StatusCode> {
    state.count(&format!("/video/{variant}/playlist.m3u8"));

    let opts = &state.opts;
    if let Some(limit) = opts.playlist_404_after {
        if state.media_hits() > limit {
            return Err(StatusCode::NOT_FOUND);
        }
    }

    let listed = if opts.live {
        // Each refresh reveals one more segment.
        (opts.live_initial_segments + state.media_hits().saturating_sub(1))
            .min(opts.segment_count)
    } else {
        opts.segment_count
    };

    let mut body = format!(
        "#EXTM3U\n#EXT-X-VERSION:6\n#EXT-X-TARGETDURATION:{}\n#EXT-X-MEDIA-SEQUENCE:0\n",
        opts.segment_duration_secs.ceil() as u64,
    );
    for i in 0..listed {
        body.push_str(&format!(
            "#EXTINF:{:.3},\nseg_{i}.ts\n",
            opts.segment_duration_secs,
        ));
    }
    if !opts.live {
        body.push_str("#EXT-X-ENDLIST\n");
    }
    Ok(body)
}

async fn segment_endpoint(
    State(state): State<Arc<FixtureState>>,
    Path((variant, segment)): Path<(String, String)>,
) -> Result<Vec<u8>, StatusCode> {
    let hit = state.count(&format!("/video/{variant}/{segment}"));

    let opts = &state.opts;
    if hit <= opts.fail_per_segment {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    if !opts.segment_delay.is_zero() {
        tokio::time::sleep(opts.segment_delay).await;
    }
    Ok(vec![0u8; opts.segment_bytes])
}
