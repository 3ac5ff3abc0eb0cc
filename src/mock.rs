//! Scripted transport for exercising the protocol without hardware.
//!
//! Each queued reply is consumed by the next `write`; the following `read`
//! calls hand it out chunk by chunk, then report silence.

use std::collections::VecDeque;

use crate::frame;
use crate::transport::RfidTransport;

#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    replies: VecDeque<Vec<Vec<u8>>>,
    pending: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    clears: usize,
    fail_write: bool,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a well-formed frame carrying `payload`
    pub(crate) fn reply_payload(&mut self, payload: &[u8]) {
        let reply = frame::encode(payload).expect("payload fits a frame");
        self.replies.push_back(vec![reply]);
    }

    /// Queue raw bytes, delivered in a single read
    pub(crate) fn reply_raw(&mut self, bytes: &[u8]) {
        self.replies.push_back(vec![bytes.to_vec()]);
    }

    /// Queue raw bytes, delivered `size` bytes per read
    pub(crate) fn reply_chunked(&mut self, bytes: &[u8], size: usize) {
        self.replies
            .push_back(bytes.chunks(size).map(|c| c.to_vec()).collect());
    }

    /// The next command goes unanswered
    pub(crate) fn reply_none(&mut self) {
        self.replies.push_back(Vec::new());
    }

    pub(crate) fn fail_next_write(&mut self) {
        self.fail_write = true;
    }

    /// Every frame written so far
    pub(crate) fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Payload of the most recent frame written
    pub(crate) fn last_payload(&self) -> Vec<u8> {
        let last = self.sent.last().expect("a frame was sent");
        frame::decode(last).expect("sent frame is valid").to_vec()
    }

    pub(crate) fn clear_count(&self) -> usize {
        self.clears
    }
}

impl RfidTransport for MockTransport {
    type Error = std::io::Error;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_write {
            self.fail_write = false;
            return Err(std::io::Error::other("port unplugged"));
        }
        self.sent.push(data.to_vec());
        self.pending = self.replies.pop_front().unwrap_or_default().into();
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, Self::Error> {
        let Some(mut chunk) = self.pending.pop_front() else {
            return Ok(0);
        };
        let len = chunk.len().min(buf.len());
        buf[..len].copy_from_slice(&chunk[..len]);
        if len < chunk.len() {
            self.pending.push_front(chunk.split_off(len));
        }
        Ok(len)
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        self.clears += 1;
        self.pending.clear();
        Ok(())
    }
}
