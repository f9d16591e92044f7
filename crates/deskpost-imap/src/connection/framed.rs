//! CRLF line framing for the IMAP wire.
//!
//! The server writes CRLF-terminated lines, but a single `read` may deliver
//! any slice of them: half a line, several lines, or a line split at any byte
//! offset. `LineStream` buffers incoming bytes and only ever yields complete
//! lines, carrying the unterminated remainder forward to the next read.

#![allow(clippy::missing_errors_doc)]

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Line-framed connection for the IMAP protocol.
pub struct LineStream<S> {
    stream: S,
    /// Bytes received but not yet consumed; may end mid-line.
    buffer: BytesMut,
}

impl<S> LineStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new line stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Reads the next complete line, without its trailing CRLF.
    ///
    /// Lines already buffered from an earlier read are drained, in order,
    /// before the socket is read again.
    pub async fn read_line(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = find_crlf(&self.buffer) {
                let line = self.buffer.split_to(pos + 2);
                let text = String::from_utf8_lossy(&line[..pos]).into_owned();
                return Ok(text);
            }

            if self.buffer.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }

            let n = self.stream.read_buf(&mut self.buffer).await?;
            if n == 0 {
                return Err(Error::Closed);
            }
        }
    }

    /// Writes a single CRLF-terminated line and flushes it.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let framed = format!("{line}\r\n");
        self.stream.write_all(framed.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Shuts down the underlying stream. Errors are ignored: the peer may
    /// already have dropped the connection.
    pub async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_find_crlf() {
        assert_eq!(find_crlf(b"hello\r\n"), Some(5));
        assert_eq!(find_crlf(b"\r\n"), Some(0));
        assert_eq!(find_crlf(b"no newline"), None);
        assert_eq!(find_crlf(b"just\n"), None);
        assert_eq!(find_crlf(b"just\r"), None);
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut lines = LineStream::new(mock);

        assert_eq!(lines.read_line().await.unwrap(), "* OK ready");
    }

    #[tokio::test]
    async fn test_line_split_across_reads() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"* SEA")
            .read(b"RCH 1 2")
            .read(b" 3\r")
            .read(b"\n")
            .build();
        let mut lines = LineStream::new(mock);

        assert_eq!(lines.read_line().await.unwrap(), "* SEARCH 1 2 3");
    }

    #[tokio::test]
    async fn test_multiple_lines_in_one_read() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"* 1 EXISTS\r\n* 0 RECENT\r\nA1 OK done\r\n")
            .build();
        let mut lines = LineStream::new(mock);

        assert_eq!(lines.read_line().await.unwrap(), "* 1 EXISTS");
        assert_eq!(lines.read_line().await.unwrap(), "* 0 RECENT");
        assert_eq!(lines.read_line().await.unwrap(), "A1 OK done");
    }

    #[tokio::test]
    async fn test_remainder_carried_forward() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"* 1 EXISTS\r\n* 0 REC")
            .read(b"ENT\r\n")
            .build();
        let mut lines = LineStream::new(mock);

        assert_eq!(lines.read_line().await.unwrap(), "* 1 EXISTS");
        assert_eq!(lines.read_line().await.unwrap(), "* 0 RECENT");
    }

    #[tokio::test]
    async fn test_bare_lf_is_not_a_terminator() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"half\nline\r\n").build();
        let mut lines = LineStream::new(mock);

        assert_eq!(lines.read_line().await.unwrap(), "half\nline");
    }

    #[tokio::test]
    async fn test_eof_mid_line() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"no terminator").build();
        let mut lines = LineStream::new(mock);

        assert!(matches!(lines.read_line().await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn test_write_line_appends_crlf() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .write(b"A1 LOGIN \"user\" \"pass\"\r\n")
            .build();
        let mut lines = LineStream::new(mock);

        lines.write_line("A1 LOGIN \"user\" \"pass\"").await.unwrap();
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// Reassembles fixed lines from arbitrary chunk boundaries.
        async fn collect_lines(chunks: Vec<Vec<u8>>, expected: usize) -> Vec<String> {
            let mut builder = tokio_test::io::Builder::new();
            for chunk in &chunks {
                if !chunk.is_empty() {
                    builder.read(chunk);
                }
            }
            let mut lines = LineStream::new(builder.build());
            let mut out = Vec::new();
            for _ in 0..expected {
                out.push(lines.read_line().await.unwrap());
            }
            out
        }

        proptest! {
            /// However the byte stream is sliced, every line comes out
            /// exactly once and in order.
            #[test]
            fn chunking_never_drops_or_reorders_lines(
                cuts in proptest::collection::vec(0usize..64, 0..8),
            ) {
                let wire = b"* OK greeting\r\n* SEARCH 4  8\r\n* 2 EXISTS\r\nA1 OK fin\r\n";
                let mut offsets: Vec<usize> =
                    cuts.into_iter().map(|c| c % wire.len()).collect();
                offsets.sort_unstable();
                offsets.dedup();

                let mut chunks = Vec::new();
                let mut start = 0;
                for off in offsets {
                    if off > start {
                        chunks.push(wire[start..off].to_vec());
                        start = off;
                    }
                }
                chunks.push(wire[start..].to_vec());

                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                let lines = rt.block_on(collect_lines(chunks, 4));

                prop_assert_eq!(
                    lines,
                    vec![
                        "* OK greeting".to_string(),
                        "* SEARCH 4  8".to_string(),
                        "* 2 EXISTS".to_string(),
                        "A1 OK fin".to_string(),
                    ]
                );
            }
        }
    }
}
