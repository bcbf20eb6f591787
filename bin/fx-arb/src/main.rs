use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use config::{AppConfig, SourceConfig};
use detector::{ArbitrageReport, ArbitrageSink, Clock, DetectorService};
use quote_feed::{FeedProcessor, FileSource, QuoteSource, UdpSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command line arguments for fx-arb.
#[derive(Parser, Debug)]
struct Args {
    /// Path to the configuration YAML
    #[arg(long, default_value = "config/default.yml")]
    config: String,
    /// Replay a recording of quote records instead of subscribing to the publisher
    #[arg(long)]
    replay: Option<String>,
}

/// Prints every reported cycle to stdout.
struct ConsoleSink;

#[async_trait]
impl ArbitrageSink for ConsoleSink {
    async fn on_arbitrage(&self, report: &ArbitrageReport) -> Result<()> {
        print!("{}", report);
        Ok(())
    }
}

async fn open_source(cfg: &AppConfig) -> Result<(Box<dyn QuoteSource>, Clock)> {
    match &cfg.feed.source {
        SourceConfig::Udp { publisher, listen } => {
            let source =
                UdpSource::subscribe(*listen, *publisher, cfg.feed.max_datagram_bytes).await?;
            Ok((Box::new(source), Clock::System))
        }
        SourceConfig::File {
            path,
            records_per_datagram,
            interval_ms,
        } => {
            let mut source = FileSource::open(path, *records_per_datagram)?;
            if let Some(ms) = interval_ms {
                source = source.with_interval(Duration::from_millis(*ms));
            }
            info!(path = %path, "Replaying recorded quotes");
            Ok((Box::new(source), Clock::LatestQuote))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut cfg = AppConfig::load(&args.config)?;
    if let Some(path) = args.replay {
        cfg.feed.source = SourceConfig::replay(path);
    }
    cfg.validate()?;

    let (source, clock) = open_source(&cfg).await?;

    // Channel between the feed and the detector
    let (update_tx, update_rx) = mpsc::channel(100);
    let quote_stream = Box::pin(ReceiverStream::new(update_rx));

    let (detector_shutdown_tx, detector_shutdown_rx) = mpsc::channel(1);
    let detector = DetectorService::new(
        cfg.engine_config(),
        quote_stream,
        Arc::new(ConsoleSink),
        detector_shutdown_rx,
    )
    .with_clock(clock);
    let detector_handle = detector.spawn();

    let (feed_shutdown_tx, feed_shutdown_rx) = mpsc::channel(1);
    let mut feed = FeedProcessor::new(source, cfg.session_limit());
    feed.set_update_sender(update_tx);
    feed.set_shutdown_receiver(feed_shutdown_rx);
    let mut feed_handle = tokio::spawn(async move { feed.run_processor().await });

    // Run until the feed ends on its own or Ctrl-C arrives.
    let feed_result = tokio::select! {
        res = &mut feed_handle => res,
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Interrupted, shutting down");
            feed_shutdown_tx.send(()).await.ok();
            detector_shutdown_tx.send(()).await.ok();
            feed_handle.await
        }
    };

    match feed_result {
        Ok(Ok(stats)) => info!(?stats, "Feed finished"),
        Ok(Err(e)) => error!(error = %e, "Feed exited with error"),
        Err(e) => error!(error = %e, "Feed task panicked"),
    }
    // With the feed gone the batch stream ends and the detector stops.
    match detector_handle.await {
        Ok(Ok(engine)) => info!(
            pairs = engine.graph().pair_count(),
            currencies = engine.graph().vertex_count(),
            "Detector finished"
        ),
        Ok(Err(e)) => error!(error = %e, "Detector exited with error"),
        Err(e) => error!(error = %e, "Detector task panicked"),
    }

    Ok(())
}
