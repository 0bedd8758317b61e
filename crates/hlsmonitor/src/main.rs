//! `hlsmonitor` — attach to an HLS URL and print playback-health metrics.

mod report;

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use hlsmon_net::HttpClient;
use hlsmon_session::{MonitorOptions, MonitorSession, SessionEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::report::{style, ConsoleReporter};

#[derive(Debug, Parser)]
#[command(
    name = "hlsmonitor",
    about = "Monitor HLS streams and display real-time metrics",
    version
)]
struct Cli {
    /// The URL of the HLS stream to monitor.
    stream_url: Url,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Diagnostics go to stderr so the metrics blocks stay clean on stdout.
    // Override with RUST_LOG (e.g. `RUST_LOG=hlsmon_session=debug`).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    run(cli.stream_url).await
}

async fn run(url: Url) -> ExitCode {
    let options = MonitorOptions::new(url);
    let net = HttpClient::new(&options.net);

    let session = match MonitorSession::start(net, options).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("{}Error: {e}{}", style::RED, style::RESET);
            return ExitCode::FAILURE;
        }
    };

    let mut events = session.subscribe();
    let mut reporter = ConsoleReporter::new();

    let exit_code = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    eprintln!("{}Error: failed to listen for SIGINT: {e}{}", style::RED, style::RESET);
                }
                println!("\n{}Gracefully shutting down...{}", style::YELLOW, style::RESET);
                session.shutdown();
                break ExitCode::SUCCESS;
            }
            event = events.recv() => match event {
                Ok(SessionEvent::FatalError { message }) => {
                    reporter.handle(&SessionEvent::FatalError { message });
                    session.shutdown();
                    break ExitCode::FAILURE;
                }
                Ok(SessionEvent::StreamEnded) => {
                    reporter.handle(&SessionEvent::StreamEnded);
                    session.shutdown();
                    break ExitCode::SUCCESS;
                }
                Ok(event) => reporter.handle(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "reporter fell behind the event stream");
                }
                Err(RecvError::Closed) => break ExitCode::SUCCESS,
            }
        }
    };

    // Cancellation is cooperative; give the tasks their bounded window to
    // drop any in-flight request and wind down.
    if tokio::time::timeout(Duration::from_secs(1), session.wait())
        .await
        .is_err()
    {
        warn!("session tasks did not stop within the shutdown window");
    }

    exit_code
}
