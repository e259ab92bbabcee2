//! Request side of the bus: send one request, wait for one response.

use core::time::Duration;
use std::sync::Arc;

use log::{trace, warn};

use super::inbox::LinkInbox;
use super::packet::{DataRecord, PacketType, TRAILER, encode_request};
use super::transport::Transport;
use crate::config::REQUEST_TIMEOUT_MS;
use crate::error::LinkError;

/// Owns the bus transmitter.  Exactly one request is outstanding at a time,
/// which `&mut self` enforces.
pub struct Poller<T: Transport> {
    transport: T,
    inbox: Arc<LinkInbox>,
    timeout: Duration,
}

impl<T: Transport> Poller<T> {
    pub fn new(transport: T, inbox: Arc<LinkInbox>) -> Self {
        Self::with_timeout(transport, inbox, Duration::from_millis(REQUEST_TIMEOUT_MS))
    }

    pub fn with_timeout(transport: T, inbox: Arc<LinkInbox>, timeout: Duration) -> Self {
        Self {
            transport,
            inbox,
            timeout,
        }
    }

    /// Send a request to `destination` and block for its response.
    ///
    /// A response left over from an earlier, timed-out request is discarded
    /// before sending.  Returns [`LinkError::Timeout`] when nothing valid
    /// arrives within the timeout.
    pub fn send_request(
        &mut self,
        destination: u8,
        kind: PacketType,
    ) -> Result<DataRecord, LinkError> {
        self.inbox.clear();

        let body = encode_request(destination, kind);
        self.write_all(&body)?;
        self.write_all(&TRAILER)?;
        self.transport.flush().map_err(|e| {
            warn!("link: flush to {:02X} failed: {:?}", destination, e);
            LinkError::Transport
        })?;

        match self.inbox.wait(self.timeout) {
            Some(record) => Ok(record),
            None => {
                trace!("link: no response from {:02X}", destination);
                Err(LinkError::Timeout)
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError> {
        match self.transport.write(data) {
            Ok(n) if n == data.len() => Ok(()),
            Ok(n) => {
                warn!("link: short write ({} of {} bytes)", n, data.len());
                Err(LinkError::Transport)
            }
            Err(e) => {
                warn!("link: write failed: {:?}", e);
                Err(LinkError::Transport)
            }
        }
    }

    pub fn inbox(&self) -> &Arc<LinkInbox> {
        &self.inbox
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
