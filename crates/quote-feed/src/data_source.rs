use crate::wire::{serialize_address, RECORD_SIZE};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::info;

/// Abstracts the source of quote datagrams, allowing for live or prerecorded feeds.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send {
    /// Fetch the next datagram payload, or `None` once the source is exhausted.
    async fn next_datagram(&mut self) -> Result<Option<Bytes>>;
}

/// Live source: subscribes to a publisher and receives its datagrams.
pub struct UdpSource {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpSource {
    /// Binds `listen` and sends the bound address to `publisher` as a subscription.
    ///
    /// The publisher only understands IPv4 subscriptions.
    pub async fn subscribe(
        listen: SocketAddr,
        publisher: SocketAddr,
        max_datagram_bytes: usize,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(listen)
            .await
            .with_context(|| format!("failed to bind {}", listen))?;
        let local = match socket.local_addr()? {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(addr) => bail!("cannot subscribe from IPv6 address {}", addr),
        };

        let subscription = serialize_address(local);
        socket
            .send_to(&subscription, publisher)
            .await
            .with_context(|| format!("failed to subscribe to {}", publisher))?;
        info!(%local, %publisher, "Subscribed to quote publisher");

        Ok(Self {
            socket,
            buf: vec![0u8; max_datagram_bytes],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl QuoteSource for UdpSource {
    async fn next_datagram(&mut self) -> Result<Option<Bytes>> {
        let (len, _peer) = self.socket.recv_from(&mut self.buf).await?;
        Ok(Some(Bytes::copy_from_slice(&self.buf[..len])))
    }
}

/// File-based source for replaying a recording of concatenated quote records.
///
/// The recording is cut into datagrams of `records_per_datagram` records each.
pub struct FileSource {
    buf: Bytes,
    datagram_len: usize,
    interval: Option<Duration>,
    served: usize,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P, records_per_datagram: usize) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read recording {}", path.display()))?;
        Self::from_bytes(Bytes::from(data), records_per_datagram)
    }

    pub fn from_bytes(buf: Bytes, records_per_datagram: usize) -> Result<Self> {
        if records_per_datagram == 0 {
            return Err(anyhow!("records_per_datagram must be greater than 0"));
        }
        Ok(Self {
            buf,
            datagram_len: records_per_datagram * RECORD_SIZE,
            interval: None,
            served: 0,
        })
    }

    /// Waits `interval` before every datagram after the first.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

#[async_trait]
impl QuoteSource for FileSource {
    async fn next_datagram(&mut self) -> Result<Option<Bytes>> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        if let Some(interval) = self.interval {
            if self.served > 0 {
                tokio::time::sleep(interval).await;
            }
        }
        let len = self.datagram_len.min(self.buf.len());
        self.served += 1;
        Ok(Some(self.buf.split_to(len)))
    }
}
