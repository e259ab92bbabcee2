//! Sensor-bus packet format.
//!
//! Wire format (packed, little-endian):
//! ```text
//! ┌────────────┬──────┬──────┬────────────────────┬─────────────┐
//! │ Header (4B)│ Dest │ Type │ Payload            │ A5 A5 A5 A5 │
//! │ LE u32     │ (1B) │ (1B) │ request: kind (1B) │  trailer    │
//! │            │      │      │ data: see below    │             │
//! └────────────┴──────┴──────┴────────────────────┴─────────────┘
//!
//! data payload: status (1B) │ target_status[64] (64B) │ distance[64] (LE i16, 128B)
//! ```
//!
//! There is no length prefix: the receiver finds frame ends by spotting the
//! trailer, then checks that the body has exactly the expected length.
//! Functions here operate on the frame *body* (everything before the
//! trailer).

use core::fmt;

/// Frame magic, `b"BEEL"` read as a little-endian `u32`.
pub const HEADER: u32 = 0x4C45_4542;
/// Frame terminator located by the receive-side pattern detector.
pub const TRAILER: [u8; 4] = [0xA5; 4];
/// Address of sensor device 0; device `n` answers to `BASE_ADDRESS + n`.
pub const BASE_ADDRESS: u8 = 10;
/// Address every device uses when replying to the poller.
pub const RETURN_ADDRESS: u8 = 0xFF;

/// Measurement cells per device report.
pub const CELL_COUNT: usize = 64;

/// Header + destination + type.
pub const COMMON_LEN: usize = 6;
/// Body length of a request frame.
pub const REQUEST_LEN: usize = COMMON_LEN + 1;
/// Body length of a data frame.
pub const DATA_LEN: usize = COMMON_LEN + 1 + CELL_COUNT + 2 * CELL_COUNT;
/// Receive buffer; a longer capture means the input overflowed.
pub const RX_BUFFER_LEN: usize = 256;

// ---------------------------------------------------------------------------
// Packet type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// Poller → device.
    Request = 0,
    /// Device → poller.
    Data = 1,
}

impl PacketType {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Request),
            1 => Some(Self::Data),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Frame rejection reasons
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Capture longer than the receive buffer.
    Overflow(usize),
    /// Magic did not match [`HEADER`].
    BadHeader(u32),
    /// Frame was not addressed to [`RETURN_ADDRESS`].
    BadDestination(u8),
    /// Not a data frame.
    BadType(u8),
    /// Body length differs from [`DATA_LEN`].
    BadLength(usize),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow(len) => write!(f, "rx overflow ({} bytes)", len),
            Self::BadHeader(h) => {
                write!(f, "expected header of {:08x} but got {:08x} instead", HEADER, h)
            }
            Self::BadDestination(d) => write!(
                f,
                "expected destination of {:02X} but got {:02X} instead",
                RETURN_ADDRESS, d
            ),
            Self::BadType(t) => write!(f, "unexpected packet type {}", t),
            Self::BadLength(len) => write!(f, "expected {} bytes but got {}", DATA_LEN, len),
        }
    }
}

// ---------------------------------------------------------------------------
// Data record
// ---------------------------------------------------------------------------

/// Payload of a data frame: one device report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRecord {
    pub status: u8,
    pub target_status: [u8; CELL_COUNT],
    pub distance: [i16; CELL_COUNT],
}

impl DataRecord {
    /// Parse and validate a received frame body.
    ///
    /// Checks run in order: overflow, header, destination, type, length.
    pub fn decode(body: &[u8]) -> Result<Self, FrameError> {
        if body.len() > RX_BUFFER_LEN {
            return Err(FrameError::Overflow(body.len()));
        }
        if body.len() < COMMON_LEN {
            return Err(FrameError::BadLength(body.len()));
        }

        let header = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
        if header != HEADER {
            return Err(FrameError::BadHeader(header));
        }
        if body[4] != RETURN_ADDRESS {
            return Err(FrameError::BadDestination(body[4]));
        }
        if PacketType::from_u8(body[5]) != Some(PacketType::Data) {
            return Err(FrameError::BadType(body[5]));
        }
        if body.len() != DATA_LEN {
            return Err(FrameError::BadLength(body.len()));
        }

        let payload = &body[COMMON_LEN..];
        let mut record = Self {
            status: payload[0],
            target_status: [0; CELL_COUNT],
            distance: [0; CELL_COUNT],
        };
        record
            .target_status
            .copy_from_slice(&payload[1..=CELL_COUNT]);
        let distances = &payload[1 + CELL_COUNT..];
        for (d, raw) in record.distance.iter_mut().zip(distances.chunks_exact(2)) {
            *d = i16::from_le_bytes([raw[0], raw[1]]);
        }
        Ok(record)
    }

    /// Encode as a data frame body addressed to `destination`.
    ///
    /// Devices reply to [`RETURN_ADDRESS`]; simulators and tests use this to
    /// stand in for them.
    pub fn encode(&self, destination: u8) -> [u8; DATA_LEN] {
        let mut out = [0u8; DATA_LEN];
        write_common(&mut out, destination, PacketType::Data);
        out[COMMON_LEN] = self.status;
        out[COMMON_LEN + 1..=COMMON_LEN + CELL_COUNT].copy_from_slice(&self.target_status);
        let distances = &mut out[COMMON_LEN + 1 + CELL_COUNT..];
        for (raw, d) in distances.chunks_exact_mut(2).zip(self.distance.iter()) {
            raw.copy_from_slice(&d.to_le_bytes());
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Build a request frame body asking `destination` for `kind`.
pub fn encode_request(destination: u8, kind: PacketType) -> [u8; REQUEST_LEN] {
    let mut out = [0u8; REQUEST_LEN];
    write_common(&mut out, destination, PacketType::Request);
    out[COMMON_LEN] = kind as u8;
    out
}

/// Parse a request frame body into `(destination, requested kind)`.
///
/// This is the device side of the exchange; the poller never receives
/// requests.
pub fn decode_request(body: &[u8]) -> Option<(u8, PacketType)> {
    if body.len() != REQUEST_LEN {
        return None;
    }
    let header = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
    if header != HEADER || PacketType::from_u8(body[5]) != Some(PacketType::Request) {
        return None;
    }
    Some((body[4], PacketType::from_u8(body[COMMON_LEN])?))
}

fn write_common(out: &mut [u8], destination: u8, ty: PacketType) {
    out[..4].copy_from_slice(&HEADER.to_le_bytes());
    out[4] = destination;
    out[5] = ty as u8;
}
