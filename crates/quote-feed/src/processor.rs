use crate::{data_source::QuoteSource, push::DetectorPushStep, wire::decode_datagram};
use anyhow::Result;
use common::types::Quote;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, info};

/// Counters for one feed session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub datagrams: usize,
    pub quotes: usize,
    pub malformed: usize,
}

/// Pulls datagrams from a [`QuoteSource`], decodes them and pushes one batch
/// per datagram to the detector.
pub struct FeedProcessor {
    source: Box<dyn QuoteSource>,
    session_limit: Option<Duration>,
    update_sender: Option<mpsc::Sender<Vec<Quote>>>,
    shutdown_rx: Option<mpsc::Receiver<()>>,
}

impl FeedProcessor {
    /// Creates a processor; with a `session_limit` the feed stops after that long.
    pub fn new(source: Box<dyn QuoteSource>, session_limit: Option<Duration>) -> Self {
        Self {
            source,
            session_limit,
            update_sender: None,
            shutdown_rx: None,
        }
    }

    /// Set the channel sender for pushing batches to the detector
    pub fn set_update_sender(&mut self, sender: mpsc::Sender<Vec<Quote>>) {
        self.update_sender = Some(sender);
    }

    pub fn set_shutdown_receiver(&mut self, shutdown_rx: mpsc::Receiver<()>) {
        self.shutdown_rx = Some(shutdown_rx);
    }

    /// Runs until the source is exhausted, the session limit passes or a
    /// shutdown signal arrives.
    pub async fn run_processor(&mut self) -> Result<FeedStats> {
        info!("Starting quote feed processor");

        // Ensure we have a channel to push batches
        let update_sender = self
            .update_sender
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Update sender not set"))?
            .clone();
        let detector_push = DetectorPushStep::new(update_sender);

        let deadline = self.session_limit.map(|limit| Instant::now() + limit);
        if let Some(limit) = self.session_limit {
            info!(session_secs = limit.as_secs_f64(), "Feed session limited");
        }
        let mut shutdown_rx = self.shutdown_rx.take();
        let mut stats = FeedStats::default();

        loop {
            tokio::select! {
                _ = shutdown_signal(&mut shutdown_rx) => {
                    info!("Quote feed shutting down");
                    break;
                }
                _ = session_end(deadline) => {
                    info!("Feed session limit reached");
                    break;
                }
                next = self.source.next_datagram() => {
                    match next {
                        Ok(Some(payload)) => {
                            let decoded = decode_datagram(&payload);
                            stats.datagrams += 1;
                            stats.quotes += decoded.quotes.len();
                            stats.malformed += decoded.malformed;

                            for quote in &decoded.quotes {
                                info!("{}", quote);
                            }
                            detector_push.push_batch(decoded.quotes).await?;
                        }
                        Ok(None) => {
                            info!("Quote source exhausted");
                            break;
                        }
                        Err(e) => {
                            error!(error = %e, "Error receiving datagram");
                            return Err(e);
                        }
                    }
                }
            }
        }

        info!(
            datagrams = stats.datagrams,
            quotes = stats.quotes,
            malformed = stats.malformed,
            "Quote feed stopped"
        );
        Ok(stats)
    }
}

async fn shutdown_signal(shutdown_rx: &mut Option<mpsc::Receiver<()>>) {
    match shutdown_rx {
        Some(rx) => {
            rx.recv().await;
        }
        None => std::future::pending().await,
    }
}

async fn session_end(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::{FileSource, MockQuoteSource};
    use crate::wire::{encode_record, RECORD_SIZE};
    use bytes::{Bytes, BytesMut};
    use chrono::Utc;

    fn datagram(quotes: &[(&str, &str, f64)]) -> Bytes {
        let mut buf = BytesMut::new();
        for &(from, to, rate) in quotes {
            let quote = Quote::new(Utc::now(), from.parse().unwrap(), to.parse().unwrap(), rate)
                .unwrap();
            buf.extend_from_slice(&encode_record(&quote).unwrap());
        }
        buf.freeze()
    }

    fn mock_source(datagrams: Vec<Bytes>) -> MockQuoteSource {
        let mut remaining = datagrams.into_iter();
        let mut source = MockQuoteSource::new();
        source
            .expect_next_datagram()
            .returning(move || Ok(remaining.next()));
        source
    }

    #[tokio::test]
    async fn test_processor_pushes_one_batch_per_datagram() {
        let mut corrupt = datagram(&[("USD", "EUR", 0.9)]).to_vec();
        corrupt.extend_from_slice(&[0u8; RECORD_SIZE]);
        let source = mock_source(vec![
            datagram(&[("USD", "EUR", 0.9), ("EUR", "GBP", 0.8)]),
            Bytes::from(corrupt),
        ]);

        let (tx, mut rx) = mpsc::channel(10);
        let mut processor = FeedProcessor::new(Box::new(source), None);
        processor.set_update_sender(tx);

        let stats = processor.run_processor().await.unwrap();
        assert_eq!(
            stats,
            FeedStats {
                datagrams: 2,
                quotes: 3,
                malformed: 1
            }
        );
        assert_eq!(rx.recv().await.unwrap().len(), 2);
        assert_eq!(rx.recv().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_processor_requires_sender() {
        let mut processor = FeedProcessor::new(Box::new(MockQuoteSource::new()), None);
        assert!(processor.run_processor().await.is_err());
    }

    #[tokio::test]
    async fn test_processor_propagates_source_errors() {
        let mut source = MockQuoteSource::new();
        source
            .expect_next_datagram()
            .times(1)
            .returning(|| Err(anyhow::anyhow!("socket closed")));

        let (tx, _rx) = mpsc::channel(10);
        let mut processor = FeedProcessor::new(Box::new(source), None);
        processor.set_update_sender(tx);

        let err = processor.run_processor().await.unwrap_err();
        assert_eq!(err.to_string(), "socket closed");
    }

    #[tokio::test]
    async fn test_session_limit_stops_feed() {
        let recording = datagram(&[("USD", "EUR", 0.9), ("EUR", "GBP", 0.8)]);
        let source = FileSource::from_bytes(recording, 1)
            .unwrap()
            .with_interval(Duration::from_secs(30));

        let (tx, _rx) = mpsc::channel(10);
        let mut processor = FeedProcessor::new(Box::new(source), Some(Duration::from_millis(50)));
        processor.set_update_sender(tx);

        let stats = tokio::time::timeout(Duration::from_secs(5), processor.run_processor())
            .await
            .expect("session limit should end the feed")
            .unwrap();
        assert_eq!(stats.datagrams, 1);
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_feed() {
        let recording = datagram(&[("USD", "EUR", 0.9), ("EUR", "GBP", 0.8)]);
        let source = FileSource::from_bytes(recording, 1)
            .unwrap()
            .with_interval(Duration::from_secs(30));

        let (tx, _rx) = mpsc::channel(10);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let mut processor = FeedProcessor::new(Box::new(source), None);
        processor.set_update_sender(tx);
        processor.set_shutdown_receiver(shutdown_rx);

        let handle = tokio::spawn(async move { processor.run_processor().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown_tx.send(()).await.unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("shutdown should end the feed")
            .unwrap()
            .unwrap();
        assert_eq!(stats.datagrams, 1);
    }
}
