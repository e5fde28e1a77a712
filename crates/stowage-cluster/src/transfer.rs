//! Bounded-memory copying between readers, writers and byte buffers

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Default intermediate buffer size (4 MiB)
pub const DEFAULT_BUFFER_SIZE: usize = 4 << 20;

/// Copies through one fixed-size buffer, so peak memory per transfer does not
/// depend on the object size.
///
/// Sources are taken by value and dropped when the copy ends, whether it
/// finished or failed.
#[derive(Clone, Copy, Debug)]
pub struct TransferBuffer {
    size: usize,
}

impl Default for TransferBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl TransferBuffer {
    /// Create a transfer buffer of `size` bytes (at least one byte)
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Copy `source` into `sink` until end-of-stream and flush the sink.
    ///
    /// Returns the number of bytes copied. On error the sink may have
    /// received part of the data.
    pub async fn copy<R, W>(&self, mut source: R, sink: &mut W) -> std::io::Result<u64>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut buf = vec![0u8; self.size];
        let mut total = 0u64;
        loop {
            let n = source.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n]).await?;
            total += n as u64;
        }
        sink.flush().await?;
        trace!(bytes = total, "transfer complete");
        Ok(total)
    }

    /// Drain `source` into a single buffer, reading at most one chunk at a time
    pub async fn read_to_bytes<R>(&self, mut source: R) -> std::io::Result<Bytes>
    where
        R: AsyncRead + Unpin,
    {
        let mut out = BytesMut::new();
        let mut buf = vec![0u8; self.size];
        loop {
            let n = source.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        Ok(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Reader that records whether it was dropped
    struct TrackedReader {
        inner: Cursor<Vec<u8>>,
        dropped: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }

    impl AsyncRead for TrackedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl Drop for TrackedReader {
        fn drop(&mut self) {
            self.dropped.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    /// Writer that fails after accepting `limit` bytes
    struct BrokenSink {
        written: usize,
        limit: usize,
    }

    impl AsyncWrite for BrokenSink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            if self.written >= self.limit {
                return Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()));
            }
            let n = buf.len().min(self.limit - self.written);
            self.written += n;
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_copy_with_small_buffer() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let transfer = TransferBuffer::new(7);
        let mut sink = Vec::new();

        let copied = transfer.copy(Cursor::new(data.clone()), &mut sink).await.unwrap();

        assert_eq!(copied, data.len() as u64);
        assert_eq!(sink, data);
    }

    #[tokio::test]
    async fn test_read_to_bytes() {
        let transfer = TransferBuffer::new(3);
        let bytes = transfer
            .read_to_bytes(Cursor::new(b"hello transfer".to_vec()))
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), b"hello transfer");
    }

    #[tokio::test]
    async fn test_source_dropped_when_sink_fails() {
        let dropped = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let source = TrackedReader {
            inner: Cursor::new(vec![1u8; 4096]),
            dropped: dropped.clone(),
        };
        let mut sink = BrokenSink { written: 0, limit: 100 };

        let result = TransferBuffer::new(64).copy(source, &mut sink).await;

        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::BrokenPipe);
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_zero_size_is_clamped() {
        assert_eq!(TransferBuffer::new(0).size(), 1);
        assert_eq!(TransferBuffer::default().size(), 4 * 1024 * 1024);
    }
}
