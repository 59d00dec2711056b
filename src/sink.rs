//! Metric sinks.
//!
//! A [`MetricSink`] receives every [`ProbeResult`] produced by a run. The
//! crate ships two sinks:
//!
//! - [`JsonLinesSink`]: one JSON object per result on any [`std::io::Write`]
//! - [`ChannelSink`]: forwards results into a tokio MPSC channel

use std::io::Write;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

use crate::probe::ProbeResult;

/// Errors that can occur while emitting a result.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing to the underlying output failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Result could not be serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Receiving side of the channel is gone.
    #[error("result channel closed")]
    ChannelClosed,
}

/// Destination for probe results.
#[async_trait::async_trait]
pub trait MetricSink: Send + Sync {
    /// Emit one result.
    async fn emit(&self, result: &ProbeResult) -> Result<(), SinkError>;
}

/// Writes each result as a single JSON line.
///
/// Line shape: `{"name":..,"timestamp":..,"tags":{..},"fields":{..}}`.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait::async_trait]
impl<W: Write + Send> MetricSink for JsonLinesSink<W> {
    async fn emit(&self, result: &ProbeResult) -> Result<(), SinkError> {
        let line = serde_json::to_string(&result.to_record())?;
        let mut writer = self.writer.lock().await;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}

/// Forwards results into an MPSC channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ProbeResult>,
}

impl ChannelSink {
    /// Create a sink and the receiver draining it.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ProbeResult>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl MetricSink for ChannelSink {
    async fn emit(&self, result: &ProbeResult) -> Result<(), SinkError> {
        self.tx
            .send(result.clone())
            .await
            .map_err(|_| SinkError::ChannelClosed)
    }
}
