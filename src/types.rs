//! Common types: point codes, routing labels, MSU dispositions

use crate::errors::LabelError;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of supported point code families
pub const KIND_COUNT: usize = 3;

/// Point code family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointCodeKind {
    /// ITU-T Q.704, 14-bit (3-8-3)
    Itu,
    /// ANSI T1.111, 24-bit (8-8-8)
    Ansi,
    /// China national, 24-bit (ANSI layout)
    China,
}

impl PointCodeKind {
    /// All supported families, in advertisement order
    pub const ALL: [PointCodeKind; KIND_COUNT] =
        [PointCodeKind::Itu, PointCodeKind::Ansi, PointCodeKind::China];

    /// Index into per-family arrays
    pub fn index(self) -> usize {
        match self {
            Self::Itu => 0,
            Self::Ansi => 1,
            Self::China => 2,
        }
    }

    /// Packed width in bits
    pub fn bits(self) -> u32 {
        match self {
            Self::Itu => 14,
            Self::Ansi | Self::China => 24,
        }
    }

    /// Bytes used to carry a point code in SNM payloads
    pub fn length(self) -> usize {
        match self {
            Self::Itu => 2,
            Self::Ansi | Self::China => 3,
        }
    }

    /// Bytes used by a full routing label of this family
    pub fn label_length(self) -> usize {
        match self {
            Self::Itu => 4,
            Self::Ansi | Self::China => 7,
        }
    }

    /// SLS width in bits
    pub fn sls_bits(self) -> u32 {
        match self {
            Self::Itu => 4,
            Self::Ansi | Self::China => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Itu => "ITU",
            Self::Ansi => "ANSI",
            Self::China => "China",
        }
    }
}

impl fmt::Display for PointCodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PointCodeKind {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ITU" | "itu" => Ok(Self::Itu),
            "ANSI" | "ansi" => Ok(Self::Ansi),
            "China" | "CHINA" | "china" => Ok(Self::China),
            other => Err(LabelError::UnknownType(other.to_string())),
        }
    }
}

/// Signalling point code, stored as its three structured fields.
///
/// Field widths depend on the family at pack time; zero packed value is
/// reserved and means "no point code".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PointCode {
    pub network: u8,
    pub cluster: u8,
    pub member: u8,
}

impl PointCode {
    pub fn new(network: u8, cluster: u8, member: u8) -> Self {
        Self { network, cluster, member }
    }

    /// Pack into the family-specific integer form
    pub fn pack(&self, kind: PointCodeKind) -> u32 {
        match kind {
            PointCodeKind::Itu => {
                ((self.network as u32 & 0x07) << 11)
                    | ((self.cluster as u32) << 3)
                    | (self.member as u32 & 0x07)
            }
            PointCodeKind::Ansi | PointCodeKind::China => {
                ((self.network as u32) << 16) | ((self.cluster as u32) << 8) | (self.member as u32)
            }
        }
    }

    /// Rebuild the structured form from a packed value
    pub fn from_packed(kind: PointCodeKind, packed: u32) -> Self {
        match kind {
            PointCodeKind::Itu => Self {
                network: ((packed >> 11) & 0x07) as u8,
                cluster: ((packed >> 3) & 0xff) as u8,
                member: (packed & 0x07) as u8,
            },
            PointCodeKind::Ansi | PointCodeKind::China => Self {
                network: ((packed >> 16) & 0xff) as u8,
                cluster: ((packed >> 8) & 0xff) as u8,
                member: (packed & 0xff) as u8,
            },
        }
    }

    /// Store in SNM payload form (little-endian, ITU carries 2 spare bits)
    pub fn store(&self, kind: PointCodeKind, buf: &mut BytesMut, spare: u8) {
        let packed = self.pack(kind);
        match kind {
            PointCodeKind::Itu => {
                buf.put_u8((packed & 0xff) as u8);
                buf.put_u8((((packed >> 8) & 0x3f) as u8) | (spare << 6));
            }
            PointCodeKind::Ansi | PointCodeKind::China => {
                buf.put_u8((packed & 0xff) as u8);
                buf.put_u8(((packed >> 8) & 0xff) as u8);
                buf.put_u8(((packed >> 16) & 0xff) as u8);
            }
        }
    }

    /// Read back from SNM payload form; returns the code and spare bits
    pub fn from_wire(kind: PointCodeKind, buf: &[u8]) -> Option<(Self, u8)> {
        if buf.len() < kind.length() {
            return None;
        }
        match kind {
            PointCodeKind::Itu => {
                let packed = (buf[0] as u32) | (((buf[1] & 0x3f) as u32) << 8);
                Some((Self::from_packed(kind, packed), buf[1] >> 6))
            }
            PointCodeKind::Ansi | PointCodeKind::China => {
                let packed =
                    (buf[0] as u32) | ((buf[1] as u32) << 8) | ((buf[2] as u32) << 16);
                Some((Self::from_packed(kind, packed), 0))
            }
        }
    }

    /// Parse the "network-cluster-member" display form
    pub fn parse(s: &str) -> Result<Self, LabelError> {
        let mut it = s.trim().split('-');
        let mut next = || -> Result<u8, LabelError> {
            it.next()
                .and_then(|p| p.trim().parse::<u8>().ok())
                .ok_or_else(|| LabelError::InvalidPointCode(s.to_string()))
        };
        let network = next()?;
        let cluster = next()?;
        let member = next()?;
        Ok(Self { network, cluster, member })
    }
}

impl fmt::Display for PointCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.network, self.cluster, self.member)
    }
}

/// MTP3 routing label: family, origin, destination, link selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    pub kind: PointCodeKind,
    pub dpc: PointCode,
    pub opc: PointCode,
    pub sls: u8,
    pub spare: u8,
}

impl Label {
    pub fn new(kind: PointCodeKind, dpc: PointCode, opc: PointCode, sls: u8, spare: u8) -> Self {
        Self { kind, dpc, opc, sls, spare }
    }

    /// Wire length of this label
    pub fn length(&self) -> usize {
        self.kind.label_length()
    }

    /// Label for answering: origin and destination swapped
    pub fn reply(&self, sls: u8, spare: u8) -> Self {
        Self { kind: self.kind, dpc: self.opc, opc: self.dpc, sls, spare }
    }

    /// Append the wire form to a buffer
    pub fn store(&self, buf: &mut BytesMut) {
        match self.kind {
            PointCodeKind::Itu => {
                let v = self.dpc.pack(self.kind)
                    | (self.opc.pack(self.kind) << 14)
                    | ((self.sls as u32 & 0x0f) << 28);
                buf.put_u32_le(v);
            }
            PointCodeKind::Ansi | PointCodeKind::China => {
                let dpc = self.dpc.pack(self.kind);
                let opc = self.opc.pack(self.kind);
                buf.put_u8((dpc & 0xff) as u8);
                buf.put_u8(((dpc >> 8) & 0xff) as u8);
                buf.put_u8(((dpc >> 16) & 0xff) as u8);
                buf.put_u8((opc & 0xff) as u8);
                buf.put_u8(((opc >> 8) & 0xff) as u8);
                buf.put_u8(((opc >> 16) & 0xff) as u8);
                buf.put_u8((self.sls & 0x1f) | (self.spare << 5));
            }
        }
    }

    /// Decode a label from the head of `buf`
    pub fn decode(kind: PointCodeKind, buf: &[u8]) -> Result<Self, LabelError> {
        if buf.len() < kind.label_length() {
            return Err(LabelError::BufferTooShort);
        }
        match kind {
            PointCodeKind::Itu => {
                let v = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
                Ok(Self {
                    kind,
                    dpc: PointCode::from_packed(kind, v & 0x3fff),
                    opc: PointCode::from_packed(kind, (v >> 14) & 0x3fff),
                    sls: ((v >> 28) & 0x0f) as u8,
                    spare: 0,
                })
            }
            PointCodeKind::Ansi | PointCodeKind::China => {
                let dpc = (buf[0] as u32) | ((buf[1] as u32) << 8) | ((buf[2] as u32) << 16);
                let opc = (buf[3] as u32) | ((buf[4] as u32) << 8) | ((buf[5] as u32) << 16);
                Ok(Self {
                    kind,
                    dpc: PointCode::from_packed(kind, dpc),
                    opc: PointCode::from_packed(kind, opc),
                    sls: buf[6] & 0x1f,
                    spare: buf[6] >> 5,
                })
            }
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.opc, self.dpc, self.sls)
    }
}

/// Disposition of a received MSU, reported by a user part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandledMsu {
    /// Fully processed, stop delivery
    Accepted,
    /// Not mine, keep looking
    #[default]
    Rejected,
    /// Matching part exists but is not equipped
    Unequipped,
    /// Destination inaccessible from this part
    Inaccessible,
    /// No route toward the destination
    NoAddress,
    /// Processing error, stop delivery
    Failure,
}

/// Link inhibition status bits
pub mod inhibit {
    /// Not yet tested by maintenance
    pub const UNCHECKED: u8 = 0x01;
    /// Taken out of traffic by changeover
    pub const INACTIVE: u8 = 0x02;
    /// Locally inhibited by management
    pub const LOCAL: u8 = 0x04;
    /// Inhibited on request of the remote end
    pub const REMOTE: u8 = 0x08;
}
