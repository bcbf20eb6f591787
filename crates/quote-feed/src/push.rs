use anyhow::Result;
use common::types::Quote;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Step that pushes decoded quote batches to the detector via a channel
pub struct DetectorPushStep {
    sender: mpsc::Sender<Vec<Quote>>,
}

impl DetectorPushStep {
    pub fn new(sender: mpsc::Sender<Vec<Quote>>) -> Self {
        Self { sender }
    }

    /// Sends one datagram's quotes as a single batch.
    pub async fn push_batch(&self, batch: Vec<Quote>) -> Result<()> {
        debug!(quotes = batch.len(), "Pushing quote batch to detector");

        if let Err(e) = self.sender.send(batch).await {
            error!(error = %e, "Failed to send batch to detector");
            return Err(anyhow::anyhow!("Channel send failed: {}", e));
        }

        Ok(())
    }
}
