//! Line-delimited link between the actuator board and the bridge board
//!
//! The physical link is a byte stream. A message is one line terminated by
//! `\n`; bytes after the last newline are held back until the rest of the
//! line arrives. Delivery is best-effort: no acks, no retries.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

/// A line longer than this without a newline is treated as line noise.
pub const MAX_LINE_BYTES: usize = 1024;

/// Bound on one `send` when the link was built without an explicit one.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("link closed by peer")]
    Closed,
    #[error("send did not complete within {0:?}")]
    Timeout(Duration),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Duplex, line-framed channel.
pub trait LinkTransport {
    /// Sends one message; a line terminator is appended. Gives up with
    /// `LinkError::Timeout` when the peer stops draining the stream.
    fn send(&mut self, text: &str) -> impl Future<Output = Result<(), LinkError>>;

    /// Returns the next complete line, or `None` when no full line arrived
    /// within the receive timeout.
    fn try_receive(&mut self) -> impl Future<Output = Result<Option<String>, LinkError>>;
}

/// Accumulates raw bytes and hands out complete lines only.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > MAX_LINE_BYTES && !self.buffer.contains(&b'\n') {
            warn!("link: dropping {} bytes without line terminator", self.buffer.len());
            self.buffer.clear();
        }
    }

    /// Pops the next complete, non-blank line (without `\r\n`).
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let end = self.buffer.iter().position(|b| *b == b'\n')?;
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw[..end]);
            let line = line.trim_end_matches('\r');
            if !line.trim().is_empty() {
                return Some(line.to_string());
            }
        }
    }

    /// Bytes of an incomplete line still waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// `LinkTransport` over any async byte stream (serial port, TCP, pipe).
pub struct StreamLink<R, W> {
    reader: R,
    writer: W,
    framer: LineFramer,
    receive_timeout: Duration,
    send_timeout: Duration,
}

impl<R, W> StreamLink<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, receive_timeout: Duration) -> Self {
        Self {
            reader,
            writer,
            framer: LineFramer::new(),
            receive_timeout,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn pending_bytes(&self) -> usize {
        self.framer.pending()
    }
}

impl<R, W> LinkTransport for StreamLink<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn send(&mut self, text: &str) -> Result<(), LinkError> {
        let mut frame = String::with_capacity(text.len() + 1);
        frame.push_str(text.trim_end_matches(['\r', '\n']));
        frame.push('\n');

        let writer = &mut self.writer;
        let write = async move {
            writer.write_all(frame.as_bytes()).await?;
            writer.flush().await
        };
        match tokio::time::timeout(self.send_timeout, write).await {
            Ok(result) => Ok(result?),
            // A partial line may be left on the wire; the peer drops it as noise.
            Err(_) => Err(LinkError::Timeout(self.send_timeout)),
        }
    }

    async fn try_receive(&mut self) -> Result<Option<String>, LinkError> {
        if let Some(line) = self.framer.next_line() {
            return Ok(Some(line));
        }

        let mut chunk = [0u8; 256];
        match tokio::time::timeout(self.receive_timeout, self.reader.read(&mut chunk)).await {
            // No full line this round; not an error.
            Err(_) => Ok(None),
            Ok(Ok(0)) => Err(LinkError::Closed),
            Ok(Ok(n)) => {
                self.framer.push(&chunk[..n]);
                Ok(self.framer.next_line())
            }
            Ok(Err(e)) => Err(LinkError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, split};

    #[test]
    fn test_framer_holds_partial_line() {
        let mut framer = LineFramer::new();
        framer.push(b"CMD:WPUMP,");
        assert_eq!(framer.next_line(), None);
        assert_eq!(framer.pending(), 10);

        framer.push(b"ON;\r\nCMD:BUZ");
        assert_eq!(framer.next_line().as_deref(), Some("CMD:WPUMP,ON;"));
        assert_eq!(framer.next_line(), None);
        assert_eq!(framer.pending(), 7);
    }

    #[test]
    fn test_framer_skips_blank_lines_and_drops_noise() {
        let mut framer = LineFramer::new();
        framer.push(b"\n\r\nhello\n");
        assert_eq!(framer.next_line().as_deref(), Some("hello"));

        framer.push(&[b'x'; MAX_LINE_BYTES + 1]);
        assert_eq!(framer.pending(), 0);
    }

    #[tokio::test]
    async fn test_stream_link_round_trip() {
        let (a, b) = duplex(1024);
        let (ar, aw) = split(a);
        let (br, bw) = split(b);
        let mut left = StreamLink::new(ar, aw, Duration::from_millis(50));
        let mut right = StreamLink::new(br, bw, Duration::from_millis(50));

        left.send("CMD:BUZZER,3;").await.unwrap();
        left.send("CMD:LED,red,ON;\n").await.unwrap();

        assert_eq!(right.try_receive().await.unwrap().as_deref(), Some("CMD:BUZZER,3;"));
        assert_eq!(right.try_receive().await.unwrap().as_deref(), Some("CMD:LED,red,ON;"));
        assert_eq!(right.try_receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_partial_line_is_not_delivered() {
        let (mut raw, b) = duplex(1024);
        let (br, bw) = split(b);
        let mut link = StreamLink::new(br, bw, Duration::from_millis(20));

        raw.write_all(b"CMD:FPUMP,O").await.unwrap();
        assert_eq!(link.try_receive().await.unwrap(), None);
        assert_eq!(link.pending_bytes(), 11);

        raw.write_all(b"N;\n").await.unwrap();
        assert_eq!(link.try_receive().await.unwrap().as_deref(), Some("CMD:FPUMP,ON;"));
    }

    #[tokio::test]
    async fn test_send_gives_up_when_peer_stops_reading() {
        let (peer, b) = duplex(64);
        let (br, bw) = split(b);
        let mut link = StreamLink::new(br, bw, Duration::from_millis(50)).with_send_timeout(Duration::from_millis(50));

        let report = format!("{{\"moisture\":12.5,\"temperature\":21.0,\"note\":\"{}\"}}", "x".repeat(40));
        assert!(report.len() > 64);

        let sent = tokio::time::timeout(Duration::from_secs(2), link.send(&report)).await;
        assert!(matches!(sent, Ok(Err(LinkError::Timeout(_)))));
        drop(peer);
    }

    #[tokio::test]
    async fn test_closed_peer_is_reported() {
        let (raw, b) = duplex(64);
        let (br, bw) = split(b);
        let mut link = StreamLink::new(br, bw, Duration::from_millis(20));
        drop(raw);
        assert!(matches!(link.try_receive().await, Err(LinkError::Closed)));
    }
}
