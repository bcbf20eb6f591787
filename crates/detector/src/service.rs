use crate::engine::{ArbitrageEngine, EngineConfig};
use crate::traits::ArbitrageSink;
use anyhow::Result;
use chrono::Utc;
use common::types::Quote;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;

/// A stream of quote batches, one per received datagram.
pub type QuoteStream = Pin<Box<dyn Stream<Item = Vec<Quote>> + Send>>;

/// Where the service takes the "now" used to expire stale pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clock {
    /// Wall-clock time when the batch is processed.
    #[default]
    System,
    /// The newest quote timestamp seen so far. Used when replaying recorded
    /// quotes, whose timestamps are far behind the wall clock.
    LatestQuote,
}

/// Drives an [`ArbitrageEngine`] from a stream of quote batches.
///
/// Batches are processed strictly one after another; the service owns the
/// engine exclusively and hands it back when it stops.
pub struct DetectorService {
    /// The engine holding the live graph.
    engine: ArbitrageEngine,
    /// A stream of quote batches.
    quote_stream: QuoteStream,
    /// Where reported cycles go.
    sink: Arc<dyn ArbitrageSink>,
    /// Receiver for shutdown signals.
    shutdown_rx: Receiver<()>,
    clock: Clock,
}

impl DetectorService {
    /// Creates a new `DetectorService`.
    pub fn new(
        config: EngineConfig,
        quote_stream: QuoteStream,
        sink: Arc<dyn ArbitrageSink>,
        shutdown_rx: Receiver<()>,
    ) -> Self {
        Self {
            engine: ArbitrageEngine::new(config),
            quote_stream,
            sink,
            shutdown_rx,
            clock: Clock::default(),
        }
    }

    /// Sets the clock used for expiry.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Starts the main detection loop.
    ///
    /// Returns the engine once the stream ends or a shutdown signal arrives.
    pub async fn run(mut self) -> Result<ArbitrageEngine> {
        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    log::info!("DetectorService shutting down.");
                    break;
                }
                maybe_batch = self.quote_stream.next() => {
                    match maybe_batch {
                        Some(batch) => self.handle_batch(&batch).await?,
                        None => {
                            log::info!("Quote stream ended.");
                            break;
                        }
                    }
                }
            }
        }
        Ok(self.engine)
    }

    /// Spawns the service on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<Result<ArbitrageEngine>> {
        tokio::spawn(self.run())
    }

    async fn handle_batch(&mut self, batch: &[Quote]) -> Result<()> {
        // One capture of "now" for the whole batch.
        let now = match self.clock {
            Clock::System => Utc::now(),
            Clock::LatestQuote => batch
                .iter()
                .filter(|quote| quote.validate().is_ok())
                .map(|quote| quote.timestamp)
                .chain(self.engine.latest_timestamp())
                .max()
                .unwrap_or_else(Utc::now),
        };
        match self.engine.process_batch(batch, now) {
            Ok(Some(report)) => self.sink.on_arbitrage(&report).await?,
            Ok(None) => {}
            Err(e) => {
                // Only evaluating a detected cycle can fail here.
                log::error!("Failed to evaluate detected cycle: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ArbitrageReport;
    use crate::test_utils::cur;
    use async_trait::async_trait;
    use futures::stream;
    use tokio::sync::{mpsc, Mutex};

    #[derive(Default)]
    struct CollectingSink {
        reports: Mutex<Vec<ArbitrageReport>>,
    }

    #[async_trait]
    impl ArbitrageSink for CollectingSink {
        async fn on_arbitrage(&self, report: &ArbitrageReport) -> Result<()> {
            self.reports.lock().await.push(report.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ArbitrageSink for FailingSink {
        async fn on_arbitrage(&self, _report: &ArbitrageReport) -> Result<()> {
            Err(anyhow::anyhow!("sink closed"))
        }
    }

    fn fresh_quote(from: &str, to: &str, rate: f64) -> Quote {
        Quote {
            timestamp: Utc::now(),
            from: cur(from),
            to: cur(to),
            rate,
        }
    }

    fn triangle() -> Vec<Quote> {
        vec![
            fresh_quote("USD", "EUR", 0.9),
            fresh_quote("EUR", "GBP", 0.8),
            fresh_quote("GBP", "USD", 1.5),
        ]
    }

    #[tokio::test]
    async fn test_service_stops_when_stream_ends() {
        let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let sink = Arc::new(CollectingSink::default());
        let service = DetectorService::new(
            EngineConfig::default(),
            Box::pin(stream::empty()),
            sink.clone(),
            shutdown_rx,
        );

        let engine = service.run().await.unwrap();
        assert!(engine.graph().is_empty());
        assert!(sink.reports.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_service_reports_arbitrage() {
        let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let sink = Arc::new(CollectingSink::default());
        let service = DetectorService::new(
            EngineConfig::default(),
            Box::pin(stream::iter(vec![triangle()])),
            sink.clone(),
            shutdown_rx,
        );

        let engine = service.spawn().await.unwrap().unwrap();
        assert_eq!(engine.graph().pair_count(), 3);

        let reports = sink.reports.lock().await;
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_profitable());
    }

    #[tokio::test]
    async fn test_service_shuts_down_on_signal() {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (_batch_tx, batch_rx) = mpsc::channel::<Vec<Quote>>(1);
        let stream = Box::pin(tokio_stream::wrappers::ReceiverStream::new(batch_rx));
        let service = DetectorService::new(
            EngineConfig::default(),
            stream,
            Arc::new(CollectingSink::default()),
            shutdown_rx,
        );

        let handle = service.spawn();
        shutdown_tx.send(()).await.unwrap();

        let result = tokio::time::timeout(tokio::time::Duration::from_millis(200), handle).await;
        assert!(result.is_ok(), "service should stop on shutdown signal");
        assert!(result.unwrap().unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_latest_quote_clock_keeps_recorded_quotes_fresh() {
        let recorded = Utc::now() - chrono::Duration::days(365);
        let batch: Vec<Quote> = triangle()
            .into_iter()
            .map(|quote| Quote {
                timestamp: recorded,
                ..quote
            })
            .collect();

        let run = |clock: Clock| {
            let batch = batch.clone();
            async move {
                let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);
                let sink = Arc::new(CollectingSink::default());
                let engine = DetectorService::new(
                    EngineConfig::default(),
                    Box::pin(stream::iter(vec![batch])),
                    sink.clone(),
                    shutdown_rx,
                )
                .with_clock(clock)
                .run()
                .await
                .unwrap();
                let reported = sink.reports.lock().await.len();
                (engine.graph().pair_count(), reported)
            }
        };

        // Against the wall clock a year-old triangle expires before detection.
        assert_eq!(run(Clock::System).await, (0, 0));
        assert_eq!(run(Clock::LatestQuote).await, (3, 1));
    }

    #[tokio::test]
    async fn test_sink_failure_stops_service() {
        let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let service = DetectorService::new(
            EngineConfig::default(),
            Box::pin(stream::iter(vec![triangle()])),
            Arc::new(FailingSink),
            shutdown_rx,
        );

        let err = service.run().await.err().unwrap();
        assert_eq!(err.to_string(), "sink closed");
    }
}
