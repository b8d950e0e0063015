/*!
Link stubs for development without a serial cable

- `link_pair`: two real `StreamLink`s joined by an in-memory duplex pipe
- `raw_link`: one `StreamLink` plus the raw pipe end, to dribble bytes in
- `RecordingLink`: records every sent line and replays scripted inbound lines
*/

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{duplex, split, DuplexStream, ReadHalf, WriteHalf};
use verdant_protocol::{LinkError, LinkTransport, StreamLink};

const PIPE_CAPACITY: usize = 4096;

pub type MemoryLink = StreamLink<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

/// Two connected link ends, like the two boards on one cable.
pub fn link_pair(receive_timeout: Duration) -> (MemoryLink, MemoryLink) {
    let (a, b) = duplex(PIPE_CAPACITY);
    let (ar, aw) = split(a);
    let (br, bw) = split(b);
    (
        StreamLink::new(ar, aw, receive_timeout),
        StreamLink::new(br, bw, receive_timeout),
    )
}

/// A link end plus the raw byte stream of its peer.
pub fn raw_link(receive_timeout: Duration) -> (MemoryLink, DuplexStream) {
    let (raw, end) = duplex(PIPE_CAPACITY);
    let (r, w) = split(end);
    (StreamLink::new(r, w, receive_timeout), raw)
}

/// Link that never touches a stream: sends are recorded, receives are
/// served from a scripted queue.
#[derive(Clone, Default)]
pub struct RecordingLink {
    sent: Arc<Mutex<Vec<String>>>,
    inbound: Arc<Mutex<VecDeque<String>>>,
    closed: Arc<Mutex<bool>>,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a line as if the peer had sent it.
    pub fn push_inbound<S: Into<String>>(&self, line: S) {
        let line = line.into();
        log::info!("📨 [STUB] inbound line queued: {}", line);
        self.inbound.lock().push_back(line);
    }

    /// Makes the next receive report a closed peer.
    pub fn close(&self) {
        *self.closed.lock() = true;
    }

    pub fn sent_lines(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn last_sent(&self) -> Option<String> {
        self.sent.lock().last().cloned()
    }

    /// Sent lines starting with `prefix` (e.g. `"CMD:"` or `"{"`).
    pub fn sent_matching(&self, prefix: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
        self.inbound.lock().clear();
    }
}

impl LinkTransport for RecordingLink {
    async fn send(&mut self, text: &str) -> Result<(), LinkError> {
        let line = text.trim_end_matches(['\r', '\n']).to_string();
        log::info!("📤 [STUB] sent {} bytes", line.len());
        self.sent.lock().push(line);
        Ok(())
    }

    async fn try_receive(&mut self) -> Result<Option<String>, LinkError> {
        if let Some(line) = self.inbound.lock().pop_front() {
            return Ok(Some(line));
        }
        if *self.closed.lock() {
            return Err(LinkError::Closed);
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_link_pair_carries_lines_both_ways() {
        let (mut controller, mut bridge) = link_pair(Duration::from_millis(50));

        controller.send("{\"moisture\":12.0}").await.unwrap();
        bridge.send("CMD:WPUMP,ON;").await.unwrap();

        assert_eq!(bridge.try_receive().await.unwrap().as_deref(), Some("{\"moisture\":12.0}"));
        assert_eq!(controller.try_receive().await.unwrap().as_deref(), Some("CMD:WPUMP,ON;"));
    }

    #[tokio::test]
    async fn test_raw_link_holds_partial_bytes() {
        let (mut link, mut raw) = raw_link(Duration::from_millis(20));
        raw.write_all(b"CMD:LED,").await.unwrap();
        assert_eq!(link.try_receive().await.unwrap(), None);
        raw.write_all(b"blue,BLINK;\n").await.unwrap();
        assert_eq!(link.try_receive().await.unwrap().as_deref(), Some("CMD:LED,blue,BLINK;"));
    }

    #[tokio::test]
    async fn test_recording_link_records_and_replays() {
        let mut link = RecordingLink::new();
        let handle = link.clone();

        link.send("CMD:BUZZER,3;\n").await.unwrap();
        link.send("{\"ph\":6.5}").await.unwrap();
        assert_eq!(handle.sent_matching("CMD:"), vec!["CMD:BUZZER,3;"]);
        assert_eq!(handle.last_sent().as_deref(), Some("{\"ph\":6.5}"));

        handle.push_inbound("CMD:FPUMP,OFF;");
        assert_eq!(link.try_receive().await.unwrap().as_deref(), Some("CMD:FPUMP,OFF;"));
        assert_eq!(link.try_receive().await.unwrap(), None);

        handle.close();
        assert!(matches!(link.try_receive().await, Err(LinkError::Closed)));
    }
}
