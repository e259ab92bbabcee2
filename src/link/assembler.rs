//! Trailer-delimited frame assembler.
//!
//! Software counterpart of the UART driver's pattern detection: bytes are
//! accumulated until [`TRAILER`] has been seen, and the bytes before it are
//! yielded as one frame body.  Partial reads are handled: a single feed may
//! carry part of a frame, exactly one frame, or several frames back to back.
//!
//! ```text
//!  bytes ──▶ [ body … | A5 A5 A5 A5 ] ──▶ on_frame(Ok(body))
//!  256 B without trailer            ──▶ on_frame(Err(Overflow)), buffer flushed
//! ```

use heapless::Vec;

use super::packet::{FrameError, RX_BUFFER_LEN, TRAILER};

const PATTERN_BYTE: u8 = TRAILER[0];

/// Streaming frame assembler with a fixed-size capture buffer.
pub struct FrameAssembler {
    buf: Vec<u8, RX_BUFFER_LEN>,
    /// Consecutive trailer bytes at the end of `buf`.
    run: usize,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            run: 0,
        }
    }

    /// Feed bytes into the assembler.
    ///
    /// `on_frame` is called once per completed frame body (trailer
    /// stripped) and once per overflow.  Empty bodies (back-to-back
    /// trailers, line idle noise) are skipped.
    pub fn feed(&mut self, data: &[u8], mut on_frame: impl FnMut(Result<&[u8], FrameError>)) {
        for &byte in data {
            if self.buf.push(byte).is_err() {
                on_frame(Err(FrameError::Overflow(self.buf.len() + 1)));
                self.reset();
                continue;
            }

            self.run = if byte == PATTERN_BYTE { self.run + 1 } else { 0 };
            if self.run == TRAILER.len() {
                let body_len = self.buf.len() - TRAILER.len();
                if body_len > 0 {
                    on_frame(Ok(&self.buf[..body_len]));
                }
                self.reset();
            }
        }
    }

    /// Drop any partial capture (input flush).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.run = 0;
    }

    /// Bytes captured since the last frame boundary.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
