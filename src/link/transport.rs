//! Transport abstraction for the sensor bus.
//!
//! Concrete implementations:
//! - UART1 in RS485 half-duplex mode (see `adapters::uart`)
//! - In-process device simulators in tests
//!
//! The [`Poller`](super::Poller) is generic over `Transport`; inbound bytes
//! never pass through it.  They reach the [`LinkInbox`](super::LinkInbox)
//! from the receive task instead, so the transport only has to send.

/// Outbound half of a byte-oriented bus.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Write `data` to the bus.
    /// Returns the number of bytes actually queued.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Block until queued bytes have left the transmitter.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// A null transport that discards all writes.
/// No device ever answers, so every request through it times out.
pub struct NullTransport;

impl Transport for NullTransport {
    type Error = ();

    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }
}
