//! Fuzz target: `FrameAssembler::feed` + `LinkInbox::on_frame`
//!
//! Drives arbitrary byte sequences through the receive path and asserts
//! that it never panics, never yields an empty or oversized body, and that
//! every accepted frame is counted exactly once.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use bellctl::link::packet::{RX_BUFFER_LEN, TRAILER};
use bellctl::link::{FrameAssembler, FrameError, LinkInbox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let inbox = LinkInbox::new();
    let mut asm = FrameAssembler::new();
    let mut accepted = 0u32;

    // Split at the first byte's value to exercise partial reads.
    let cut = data.first().map_or(0, |&b| b as usize).min(data.len());
    let (a, b) = data.split_at(cut);
    for part in [a, b] {
        asm.feed(part, |frame| match frame {
            Ok(body) => {
                assert!(!body.is_empty(), "assembler yielded an empty body");
                assert!(body.len() + TRAILER.len() <= RX_BUFFER_LEN);
                if inbox.on_frame(body).is_ok() {
                    accepted += 1;
                }
            }
            Err(FrameError::Overflow(len)) => inbox.on_overflow(len),
            Err(e) => panic!("assembler reported {e}"),
        });
    }

    assert_eq!(inbox.counters().accepted, accepted);
    asm.reset();
    assert_eq!(asm.pending(), 0);
});
