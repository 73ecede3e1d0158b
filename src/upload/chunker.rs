//! Chunked Transmitter
//!
//! Streams a file as binary data frames: one frame per chunk, sequence
//! numbers from 0 with no gaps. Sends are strictly sequential and no
//! acknowledgment is awaited between chunks; backpressure is left to the
//! transport.

use std::path::Path;

use async_trait::async_trait;
use futures::{Sink, SinkExt};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::error::{Result, UploadError};
use crate::protocol::encode_chunk_frame;

// ============================================================================
// Frame Sink
// ============================================================================

/// Destination for binary frames
#[async_trait]
pub trait FrameSink: Send {
    /// Send one frame; returns once the transport accepted it
    async fn send_frame(&mut self, frame: Vec<u8>) -> Result<()>;
}

/// Adapts a WebSocket sink into a [`FrameSink`]
pub struct WsFrameSink<'a, S> {
    inner: &'a mut S,
}

impl<'a, S> WsFrameSink<'a, S> {
    pub fn new(inner: &'a mut S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<'a, S> FrameSink for WsFrameSink<'a, S>
where
    S: Sink<Message, Error = WsError> + Unpin + Send,
{
    async fn send_frame(&mut self, frame: Vec<u8>) -> Result<()> {
        self.inner.send(Message::Binary(frame)).await?;
        Ok(())
    }
}

// ============================================================================
// Transmission
// ============================================================================

/// What a finished transmission sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitReport {
    pub chunks: u32,
    pub bytes: u64,
}

/// Stream the file at `path` through `sink`
pub async fn transmit_file<F: FrameSink + ?Sized>(
    sink: &mut F,
    session_id: &str,
    chunk_size: usize,
    path: &Path,
) -> Result<TransmitReport> {
    let file = tokio::fs::File::open(path).await?;
    transmit(sink, session_id, chunk_size, file).await
}

/// Stream everything `reader` yields through `sink`
pub async fn transmit<F, R>(sink: &mut F, session_id: &str, chunk_size: usize, mut reader: R) -> Result<TransmitReport>
where
    F: FrameSink + ?Sized,
    R: AsyncRead + Unpin,
{
    if chunk_size == 0 {
        return Err(UploadError::Protocol("chunk size must be positive".to_string()));
    }

    // Grows with what is actually read, not with the negotiated size
    let mut buf = Vec::new();
    let mut report = TransmitReport { chunks: 0, bytes: 0 };

    loop {
        buf.clear();
        let n = (&mut reader).take(chunk_size as u64).read_to_end(&mut buf).await?;
        if n == 0 {
            break;
        }

        let frame = encode_chunk_frame(session_id, report.chunks, &buf);
        sink.send_frame(frame).await?;

        tracing::trace!(session_id = %session_id, index = report.chunks, size = n, "Sent chunk");

        report.bytes += n as u64;
        report.chunks = report
            .chunks
            .checked_add(1)
            .ok_or_else(|| UploadError::Protocol("chunk sequence overflow".to_string()))?;

        if n < chunk_size {
            break;
        }
    }

    tracing::debug!(
        session_id = %session_id,
        chunks = report.chunks,
        bytes = report.bytes,
        "Transmission complete"
    );

    Ok(report)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::split_chunk_frame;
    use std::io::Write;

    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<Vec<u8>>,
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        async fn send_frame(&mut self, frame: Vec<u8>) -> Result<()> {
            self.frames.push(frame);
            Ok(())
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl FrameSink for BrokenSink {
        async fn send_frame(&mut self, _frame: Vec<u8>) -> Result<()> {
            Err(UploadError::Network("broken pipe".to_string()))
        }
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 256) as u8).collect()
    }

    fn temp_file(data: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        file
    }

    /// Decode frames, checking sequence numbers, and concatenate payloads
    fn reassemble(frames: &[Vec<u8>], session_id: &str) -> (Vec<u32>, Vec<usize>, Vec<u8>) {
        let mut indices = Vec::new();
        let mut sizes = Vec::new();
        let mut data = Vec::new();
        for frame in frames {
            let (index, payload) = split_chunk_frame(frame, session_id).unwrap();
            indices.push(index);
            sizes.push(payload.len());
            data.extend_from_slice(payload);
        }
        (indices, sizes, data)
    }

    #[tokio::test]
    async fn test_empty_file_yields_no_chunks() {
        let file = temp_file(b"");
        let mut sink = RecordingSink::default();

        let report = transmit_file(&mut sink, "s", 1024, file.path()).await.unwrap();

        assert_eq!(report, TransmitReport { chunks: 0, bytes: 0 });
        assert!(sink.frames.is_empty());
    }

    #[tokio::test]
    async fn test_exactly_one_chunk() {
        let data = sample(1024);
        let file = temp_file(&data);
        let mut sink = RecordingSink::default();

        let report = transmit_file(&mut sink, "sess", 1024, file.path()).await.unwrap();
        assert_eq!(report.chunks, 1);

        let (indices, sizes, rebuilt) = reassemble(&sink.frames, "sess");
        assert_eq!(indices, vec![0]);
        assert_eq!(sizes, vec![1024]);
        assert_eq!(rebuilt, data);
    }

    #[tokio::test]
    async fn test_several_chunks_with_short_tail() {
        let data = sample(10_000);
        let file = temp_file(&data);
        let mut sink = RecordingSink::default();

        let report = transmit_file(&mut sink, "abc", 3000, file.path()).await.unwrap();
        assert_eq!(report, TransmitReport { chunks: 4, bytes: 10_000 });

        let (indices, sizes, rebuilt) = reassemble(&sink.frames, "abc");
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(sizes, vec![3000, 3000, 3000, 1000]);
        assert_eq!(rebuilt, data);
    }

    #[tokio::test]
    async fn test_negotiated_chunk_size_scenario() {
        let data = sample(1_500_000);
        let file = temp_file(&data);
        let mut sink = RecordingSink::default();

        let report = transmit_file(&mut sink, "upload-42", 524288, file.path()).await.unwrap();
        assert_eq!(report.chunks, 3);

        let (indices, sizes, rebuilt) = reassemble(&sink.frames, "upload-42");
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(sizes, vec![524288, 524288, 451424]);
        assert_eq!(rebuilt, data);
    }

    #[tokio::test]
    async fn test_short_reads_still_fill_chunks() {
        // A reader that trickles two bytes at a time
        let data = sample(25);
        let (client, mut server) = tokio::io::duplex(2);
        let writer = {
            let data = data.clone();
            tokio::spawn(async move {
                use tokio::io::AsyncWriteExt;
                server.write_all(&data).await.unwrap();
            })
        };

        let mut sink = RecordingSink::default();
        let report = transmit(&mut sink, "s", 10, client).await.unwrap();
        writer.await.unwrap();

        let (_, sizes, rebuilt) = reassemble(&sink.frames, "s");
        assert_eq!(report.chunks, 3);
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(rebuilt, data);
    }

    #[tokio::test]
    async fn test_huge_chunk_size_bounded_by_input() {
        let data = sample(10);
        let mut sink = RecordingSink::default();

        let report = transmit(&mut sink, "s", usize::MAX, &data[..]).await.unwrap();

        assert_eq!(report, TransmitReport { chunks: 1, bytes: 10 });
        let (indices, sizes, rebuilt) = reassemble(&sink.frames, "s");
        assert_eq!(indices, vec![0]);
        assert_eq!(sizes, vec![10]);
        assert_eq!(rebuilt, data);
    }

    #[tokio::test]
    async fn test_send_failure_propagates() {
        let file = temp_file(&sample(100));
        let result = transmit_file(&mut BrokenSink, "s", 10, file.path()).await;
        assert!(matches!(result, Err(UploadError::Network(_))));
    }

    #[tokio::test]
    async fn test_zero_chunk_size_rejected() {
        let mut sink = RecordingSink::default();
        let result = transmit(&mut sink, "s", 0, tokio::io::empty()).await;
        assert!(matches!(result, Err(UploadError::Protocol(_))));
    }
}
