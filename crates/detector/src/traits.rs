use crate::report::ArbitrageReport;
use anyhow::Result;
use async_trait::async_trait;

/// A consumer of arbitrage reports produced by the detector service.
#[async_trait]
pub trait ArbitrageSink: Send + Sync {
    /// Called once for every reported cycle, in detection order.
    async fn on_arbitrage(&self, report: &ArbitrageReport) -> Result<()>;
}
