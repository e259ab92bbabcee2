//! Sensor-bus link layer.
//!
//! - [`packet`] — wire format and validation
//! - [`assembler`] — trailer-based frame delimiting of the raw byte stream
//! - [`inbox`] — single-slot response rendezvous with link statistics
//! - [`poller`] — one request, one bounded wait
//! - [`transport`] — byte-oriented bus abstraction

pub mod assembler;
pub mod inbox;
pub mod packet;
pub mod poller;
pub mod transport;

pub use assembler::FrameAssembler;
pub use inbox::{LinkCounters, LinkInbox};
pub use packet::{DataRecord, FrameError, PacketType};
pub use poller::Poller;
pub use transport::{NullTransport, Transport};
