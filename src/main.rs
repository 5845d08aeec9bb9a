use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use freshview::console::{parse_line, ConsoleInput, HELP};
use freshview::outputs::text;
use freshview::services::api::BackendClient;
use freshview::stream::LineTransport;
use freshview::{FreshnessView, ViewConfig, ViewHandle};

/// Minimum gap between two rendered frames.
const FRAME_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let config = ViewConfig::from_env().context("invalid configuration")?;
    let feed = config
        .feed_path
        .clone()
        .context("FRESHVIEW_FEED must name an NDJSON sensor feed")?;

    tracing::info!(api = %config.api_base, feed = %feed.display(), "starting freshview");

    let backend = BackendClient::new(&config.api_base, config.request_timeout);
    let (view, handle) = FreshnessView::mount(LineTransport::new(feed), backend, &config).await;
    let driver = tokio::spawn(view.run());
    let renderer = tokio::spawn(render_loop(handle.clone()));

    println!("{HELP}");
    command_loop(&handle).await;

    handle.unmount();
    let reactor = driver.await.context("view driver panicked")?;
    renderer.abort();

    let stats = reactor.telemetry.totals();
    tracing::info!(
        accepted = stats.accepted,
        filtered = stats.filtered,
        resets = stats.resets,
        "session finished"
    );
    Ok(())
}

async fn command_loop(handle: &ViewHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("stdin read failed: {}", e);
                break;
            }
        };
        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleInput::Quit)) => break,
            Ok(Some(ConsoleInput::Help)) => println!("{HELP}"),
            Ok(Some(ConsoleInput::Command(cmd))) => {
                tracing::debug!(?cmd, "console command");
                if !handle.send(cmd) {
                    break;
                }
            }
            Err(e) => println!("{e}"),
        }
    }
}

/// Redraw whenever a new snapshot lands, at most once per frame interval.
async fn render_loop(handle: ViewHandle) {
    let mut snapshots = handle.snapshots();
    print!("{}", text::render(&snapshots.borrow_and_update()));
    while snapshots.changed().await.is_ok() {
        tokio::time::sleep(FRAME_INTERVAL).await;
        let frame = text::render(&snapshots.borrow_and_update());
        print!("{frame}");
    }
}
