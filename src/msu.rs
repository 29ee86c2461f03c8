//! Message Signal Unit buffer

use crate::types::Label;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Service indicator values (low nibble of the SIO)
pub mod sif {
    /// Signalling Network Management
    pub const SNM: u8 = 0x00;
    /// Maintenance
    pub const MTN: u8 = 0x01;
    /// Maintenance special
    pub const MTNS: u8 = 0x02;
    /// Signalling Connection Control Part
    pub const SCCP: u8 = 0x03;
    /// Telephone User Part
    pub const TUP: u8 = 0x04;
    /// ISDN User Part
    pub const ISUP: u8 = 0x05;
}

/// Build a service information octet from its fields.
///
/// `ni` may be given pre-shifted (0x00/0x40/0x80/0xC0) or as the raw
/// two-bit indicator.
pub fn build_sio(ni: u8, prio: u8, sif: u8) -> u8 {
    let ni = if ni & 0xc0 == 0 { ni << 6 } else { ni };
    (ni & 0xc0) | ((prio & 0x03) << 4) | (sif & 0x0f)
}

/// An MTP3 message frame: `[SIO][label][payload]`.
///
/// The buffer is opaque to the router beyond the SIO and label; user
/// parts consume the payload.
#[derive(Clone, PartialEq, Eq)]
pub struct Msu {
    data: Bytes,
}

impl Msu {
    /// Assemble an MSU from its parts
    pub fn new(sio: u8, label: &Label, payload: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(1 + label.length() + payload.len());
        buf.put_u8(sio);
        label.store(&mut buf);
        buf.put_slice(payload);
        Self { data: buf.freeze() }
    }

    /// Wrap a raw received frame
    pub fn from_bytes(data: Bytes) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Service information octet
    pub fn sio(&self) -> u8 {
        self.data.first().copied().unwrap_or(0)
    }

    /// Service indicator (low nibble of the SIO)
    pub fn sif(&self) -> u8 {
        self.sio() & 0x0f
    }

    /// Sub-service field (high nibble of the SIO)
    pub fn ssf(&self) -> u8 {
        self.sio() & 0xf0
    }

    /// Full frame bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Payload following the given label
    pub fn payload(&self, label: &Label) -> &[u8] {
        let skip = 1 + label.length();
        if skip <= self.data.len() {
            &self.data[skip..]
        } else {
            &[]
        }
    }
}

impl fmt::Debug for Msu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Msu[{} bytes, sif={:#04x}]", self.data.len(), self.sif())
    }
}
