use super::provider::{CaptureStream, MediaCaptureProvider, MediaChunk, StreamRequest};
use crate::error::MediaError;
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Generates placeholder media chunks on a timer.
///
/// Used by the CLI when no camera backend is compiled in, and for demos
/// against the mock processing service.
pub struct SyntheticCaptureProvider {
    chunk_interval: Duration,
    chunk_bytes: usize,
}

impl SyntheticCaptureProvider {
    pub fn new(chunk_interval: Duration, chunk_bytes: usize) -> Self {
        Self {
            chunk_interval,
            chunk_bytes,
        }
    }

    fn chunk_payload(&self, sequence: u64) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.chunk_bytes.max(16));
        if sequence == 0 {
            // ISO BMFF file-type box so the concatenated artifact sniffs as mp4
            buf.put_u32(24);
            buf.put_slice(b"ftypisom");
            buf.put_u32(0x200);
            buf.put_slice(b"isommp41");
        }
        while buf.len() < self.chunk_bytes {
            buf.put_u8((sequence as u8).wrapping_add(buf.len() as u8));
        }
        buf.freeze()
    }
}

impl Default for SyntheticCaptureProvider {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), 32 * 1024)
    }
}

#[async_trait]
impl MediaCaptureProvider for SyntheticCaptureProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn acquire(&self, request: StreamRequest) -> Result<CaptureStream, MediaError> {
        let (tx, rx) = mpsc::channel(64);
        let tracks = CancellationToken::new();
        let stream = CaptureStream::new(request.facing, rx, tracks.clone());

        info!(
            "Synthetic {} stream {} producing a chunk every {:?}",
            request.facing,
            stream.id(),
            self.chunk_interval
        );

        let payloads: Vec<Bytes> = (0..2).map(|seq| self.chunk_payload(seq)).collect();
        let interval = self.chunk_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            let mut sequence = 0u64;

            loop {
                tokio::select! {
                    _ = tracks.cancelled() => {
                        debug!("Synthetic stream stopped after {} chunks", sequence);
                        break;
                    }
                    _ = ticker.tick() => {
                        let data = if sequence == 0 {
                            payloads[0].clone()
                        } else {
                            payloads[1].clone()
                        };
                        if tx.send(MediaChunk::new(sequence, data)).await.is_err() {
                            break;
                        }
                        sequence += 1;
                    }
                }
            }
        });

        Ok(stream)
    }
}
