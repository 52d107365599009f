//! Newline framing for the line-based text protocol
//!
//! A TCP read can end anywhere: in the middle of a frame, between two frames,
//! or after several. [`LineFramer`] keeps the unterminated tail between reads
//! and hands out each complete frame exactly once, in arrival order.

use log::warn;

/// Largest unterminated fragment kept between reads.
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

#[derive(Debug)]
pub struct LineFramer {
    pending: Vec<u8>,
    max_pending: usize,
    /// Set after an oversized fragment was dropped; bytes are skipped until the next newline.
    discarding: bool,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_limit(MAX_PENDING_BYTES)
    }

    pub fn with_limit(max_pending: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_pending,
            discarding: false,
        }
    }

    /// Appends `bytes` and returns every frame completed by them.
    ///
    /// Frames are returned without their terminator (a `\r` before the
    /// newline is stripped too). Empty frames are skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut frames = Vec::new();
        let mut rest = bytes;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.discarding {
                self.discarding = false;
                continue;
            }

            self.pending.extend_from_slice(head);
            let mut line = std::mem::take(&mut self.pending);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.is_empty() {
                frames.push(String::from_utf8_lossy(&line).into_owned());
            }
        }

        if !self.discarding {
            self.pending.extend_from_slice(rest);
            if self.pending.len() > self.max_pending {
                warn!(
                    "Dropping unterminated fragment of {} bytes (limit {})",
                    self.pending.len(),
                    self.max_pending
                );
                self.pending.clear();
                self.discarding = true;
            }
        }

        frames
    }

    /// Bytes received but not yet terminated by a newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_frames() {
        let mut framer = LineFramer::new();
        let frames = framer.push(b"alice\n{\"a\":1}\n");

        assert_eq!(frames, vec!["alice".to_string(), "{\"a\":1}".to_string()]);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn test_partial_frame_is_retained() {
        let mut framer = LineFramer::new();

        assert!(framer.push(b"{\"moving\":").is_empty());
        assert_eq!(framer.pending_len(), 10);

        let frames = framer.push(b"\"up\"}\nnext");
        assert_eq!(frames, vec!["{\"moving\":\"up\"}".to_string()]);
        assert_eq!(framer.pending_len(), 4);

        let frames = framer.push(b"\n");
        assert_eq!(frames, vec!["next".to_string()]);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut framer = LineFramer::new();
        let mut frames = Vec::new();

        for byte in b"one\ntwo\n" {
            frames.extend(framer.push(&[*byte]));
        }

        assert_eq!(frames, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_empty_frames_skipped() {
        let mut framer = LineFramer::new();
        let frames = framer.push(b"\n\r\n\nname\r\n\n");

        assert_eq!(frames, vec!["name".to_string()]);
    }

    #[test]
    fn test_oversized_fragment_resyncs() {
        let mut framer = LineFramer::with_limit(8);

        assert!(framer.push(b"0123456789").is_empty());
        assert_eq!(framer.pending_len(), 0);

        // The rest of the oversized line is skipped, the following frame survives.
        let frames = framer.push(b"abc\nok\n");
        assert_eq!(frames, vec!["ok".to_string()]);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut framer = LineFramer::new();
        let frames = framer.push(b"na\xffme\n");

        assert_eq!(frames.len(), 1);
        assert!(frames[0].starts_with("na"));
    }
}
