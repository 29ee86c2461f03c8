//! Q.704 network-management message vocabulary
//!
//! The heading-code byte carries the group in its low nibble and the
//! message within the group in its high nibble; both nibbles together
//! are the wire value of [`SnmType`].

use crate::types::{PointCode, PointCodeKind};
use bytes::{BufMut, BytesMut};

/// SNM message group (heading code H0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnmGroup {
    /// Changeover/changeback
    Chm,
    /// Emergency changeover
    Ecm,
    /// Flow control
    Fcm,
    /// Transfer prohibited/restricted/allowed
    Tfm,
    /// Route set test
    Rsm,
    /// Management inhibit
    Mim,
    /// Traffic restart
    Trm,
    /// Data link management
    Dlm,
    /// User part flow control
    Ufc,
    /// Anything else
    Spare(u8),
}

impl SnmGroup {
    pub fn from_nibble(n: u8) -> Self {
        match n & 0x0f {
            0x1 => Self::Chm,
            0x2 => Self::Ecm,
            0x3 => Self::Fcm,
            0x4 => Self::Tfm,
            0x5 => Self::Rsm,
            0x6 => Self::Mim,
            0x7 => Self::Trm,
            0x8 => Self::Dlm,
            0xa => Self::Ufc,
            other => Self::Spare(other),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Chm => "CHM",
            Self::Ecm => "ECM",
            Self::Fcm => "FCM",
            Self::Tfm => "TFM",
            Self::Rsm => "RSM",
            Self::Mim => "MIM",
            Self::Trm => "TRM",
            Self::Dlm => "DLM",
            Self::Ufc => "UFC",
            Self::Spare(_) => "Spare",
        }
    }
}

/// SNM message type; discriminants are the wire heading-code bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SnmType {
    /// Changeover order
    Coo = 0x11,
    /// Emergency changeover order
    Eco = 0x12,
    /// Route set congestion test
    Rct = 0x13,
    /// Transfer prohibited
    Tfp = 0x14,
    /// Route set test for prohibited
    Rst = 0x15,
    /// Link inhibit
    Lin = 0x16,
    /// Traffic restart allowed
    Tra = 0x17,
    /// Data link connection order
    Dlc = 0x18,
    /// User part unavailable
    Upu = 0x1a,
    /// Changeover acknowledgment
    Coa = 0x21,
    /// Emergency changeover acknowledgment
    Eca = 0x22,
    /// Transfer controlled
    Tfc = 0x23,
    /// Transfer cluster prohibited
    Tcp = 0x24,
    /// Route set test for restricted
    Rsr = 0x25,
    /// Link uninhibit
    Lun = 0x26,
    /// Traffic restart waiting
    Trw = 0x27,
    /// Connection successful
    Css = 0x28,
    /// Extended changeover order
    Xco = 0x31,
    /// Transfer restricted
    Tfr = 0x34,
    /// Cluster test for prohibited
    Rcp = 0x35,
    /// Link inhibit acknowledgment
    Lia = 0x36,
    /// Connection not successful
    Cns = 0x38,
    /// Extended changeover acknowledgment
    Xca = 0x41,
    /// Transfer cluster restricted
    Tcr = 0x44,
    /// Cluster test for restricted
    Rcr = 0x45,
    /// Link uninhibit acknowledgment
    Lua = 0x46,
    /// Connection not possible
    Cnp = 0x48,
    /// Changeback declaration
    Cbd = 0x51,
    /// Transfer allowed
    Tfa = 0x54,
    /// Link inhibit denied
    Lid = 0x56,
    /// Changeback acknowledgment
    Cba = 0x61,
    /// Transfer cluster allowed
    Tca = 0x64,
    /// Link forced uninhibit
    Lfu = 0x66,
    /// Link local inhibit test
    Llt = 0x76,
    /// Link remote inhibit test
    Lrt = 0x86,
}

impl SnmType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        use SnmType::*;
        let ty = match byte {
            0x11 => Coo,
            0x12 => Eco,
            0x13 => Rct,
            0x14 => Tfp,
            0x15 => Rst,
            0x16 => Lin,
            0x17 => Tra,
            0x18 => Dlc,
            0x1a => Upu,
            0x21 => Coa,
            0x22 => Eca,
            0x23 => Tfc,
            0x24 => Tcp,
            0x25 => Rsr,
            0x26 => Lun,
            0x27 => Trw,
            0x28 => Css,
            0x31 => Xco,
            0x34 => Tfr,
            0x35 => Rcp,
            0x36 => Lia,
            0x38 => Cns,
            0x41 => Xca,
            0x44 => Tcr,
            0x45 => Rcr,
            0x46 => Lua,
            0x48 => Cnp,
            0x51 => Cbd,
            0x54 => Tfa,
            0x56 => Lid,
            0x61 => Cba,
            0x64 => Tca,
            0x66 => Lfu,
            0x76 => Llt,
            0x86 => Lrt,
            _ => return None,
        };
        Some(ty)
    }

    pub fn group(self) -> SnmGroup {
        SnmGroup::from_nibble(self as u8)
    }

    pub fn name(self) -> &'static str {
        use SnmType::*;
        match self {
            Coo => "COO",
            Eco => "ECO",
            Rct => "RCT",
            Tfp => "TFP",
            Rst => "RST",
            Lin => "LIN",
            Tra => "TRA",
            Dlc => "DLC",
            Upu => "UPU",
            Coa => "COA",
            Eca => "ECA",
            Tfc => "TFC",
            Tcp => "TCP",
            Rsr => "RSR",
            Lun => "LUN",
            Trw => "TRW",
            Css => "CSS",
            Xco => "XCO",
            Tfr => "TFR",
            Rcp => "RCP",
            Lia => "LIA",
            Cns => "CNS",
            Xca => "XCA",
            Tcr => "TCR",
            Rcr => "RCR",
            Lua => "LUA",
            Cnp => "CNP",
            Cbd => "CBD",
            Tfa => "TFA",
            Lid => "LID",
            Cba => "CBA",
            Tca => "TCA",
            Lfu => "LFU",
            Llt => "LLT",
            Lrt => "LRT",
        }
    }

    /// Resolve a control operation or message name
    pub fn from_name(name: &str) -> Option<Self> {
        use SnmType::*;
        let ty = match name {
            "prohibit" | "TFP" => Tfp,
            "restrict" | "TFR" => Tfr,
            "congest" | "TFC" => Tfc,
            "allow" | "TFA" => Tfa,
            "restart" | "TRA" => Tra,
            "changeover" | "COO" => Coo,
            "changeback" | "CBD" => Cbd,
            "link-inhibit" | "LIN" => Lin,
            "link-uninhibit" | "LUN" => Lun,
            "link-force-uninhibit" | "LFU" => Lfu,
            "test-congestion" | "RCT" => Rct,
            "test-prohibited" | "RST" => Rst,
            "test-restricted" | "RSR" => Rsr,
            "COA" => Coa,
            "CBA" => Cba,
            "ECO" => Eco,
            "ECA" => Eca,
            "XCO" => Xco,
            "XCA" => Xca,
            "LIA" => Lia,
            "LUA" => Lua,
            "LID" => Lid,
            "LLT" => Llt,
            "LRT" => Lrt,
            "CSS" => Css,
            "CNS" => Cns,
            "CNP" => Cnp,
            "UPU" => Upu,
            _ => return None,
        };
        Some(ty)
    }
}

/// A parsed network-management message.
///
/// Only the fields the message family carries are filled in; everything
/// else stays `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmMessage {
    pub kind: PointCodeKind,
    pub snm_type: SnmType,
    /// Affected destination (TFx, UPU) with its spare bits
    pub destination: Option<(PointCode, u8)>,
    /// Changeover sequence number
    pub sequence: Option<u32>,
    /// Changeback code
    pub code: Option<u32>,
    /// Signalling link code (ANSI changeover/changeback)
    pub slc: Option<u8>,
    /// Unavailable user part (UPU)
    pub part: Option<u8>,
    /// Unavailability cause (UPU)
    pub cause: Option<u8>,
}

impl SnmMessage {
    fn new(kind: PointCodeKind, snm_type: SnmType) -> Self {
        Self {
            kind,
            snm_type,
            destination: None,
            sequence: None,
            code: None,
            slc: None,
            part: None,
            cause: None,
        }
    }

    /// Parse the payload following the heading-code byte
    pub fn parse(snm_type: SnmType, kind: PointCodeKind, payload: &[u8]) -> SnmMessage {
        use SnmType::*;
        let mut msg = SnmMessage::new(kind, snm_type);
        match snm_type {
            Tfp | Tfr | Tfa => {
                msg.destination = PointCode::from_wire(kind, payload);
            }
            Coo | Coa => {
                let (seq, slc) = parse_slc_value(kind, payload);
                msg.sequence = seq;
                msg.slc = slc;
            }
            Cbd | Cba => {
                let (code, slc) = parse_slc_value(kind, payload);
                msg.code = code;
                msg.slc = slc;
            }
            Upu => {
                msg.destination = PointCode::from_wire(kind, payload);
                if msg.destination.is_some() {
                    if let Some(byte) = payload.get(kind.length()) {
                        msg.part = Some(byte & 0x0f);
                        msg.cause = Some(byte >> 4);
                    }
                }
            }
            _ => {}
        }
        msg
    }

    pub fn name(&self) -> &'static str {
        self.snm_type.name()
    }
}

/// ITU carries the value in one byte; ANSI packs the SLC in the low
/// nibble and spreads the 12-bit value over the rest
fn parse_slc_value(kind: PointCodeKind, payload: &[u8]) -> (Option<u32>, Option<u8>) {
    match kind {
        PointCodeKind::Itu => match payload.first() {
            Some(b) => (Some(*b as u32), None),
            None => (None, None),
        },
        PointCodeKind::Ansi | PointCodeKind::China => {
            if payload.len() >= 2 {
                let slc = payload[0] & 0x0f;
                let value = ((payload[0] >> 4) as u32) | ((payload[1] as u32) << 4);
                (Some(value), Some(slc))
            } else {
                (None, None)
            }
        }
    }
}

/// Build `[code][destination][spare]` for the TFx/RSx family
pub fn build_dest(snm_type: SnmType, kind: PointCodeKind, dest: PointCode, spare: u8) -> BytesMut {
    let mut buf = BytesMut::with_capacity(1 + kind.length());
    buf.put_u8(snm_type as u8);
    dest.store(kind, &mut buf, spare);
    buf
}

/// Build a bare heading-code message
pub fn build_plain(snm_type: SnmType) -> BytesMut {
    let mut buf = BytesMut::with_capacity(1);
    buf.put_u8(snm_type as u8);
    buf
}

/// Build a changeover/changeback message carrying a sequence or code
pub fn build_slc_value(snm_type: SnmType, kind: PointCodeKind, value: u32, slc: u8) -> BytesMut {
    let mut buf = BytesMut::with_capacity(3);
    buf.put_u8(snm_type as u8);
    match kind {
        PointCodeKind::Itu => {
            buf.put_u8(value as u8);
        }
        PointCodeKind::Ansi | PointCodeKind::China => {
            buf.put_u8((slc & 0x0f) | ((value as u8) << 4));
            buf.put_u8((value >> 4) as u8);
        }
    }
    buf
}

/// Build the 24-bit extended changeover payload
pub fn build_extended(snm_type: SnmType, sequence: u32) -> BytesMut {
    let mut buf = BytesMut::with_capacity(4);
    buf.put_u8(snm_type as u8);
    buf.put_u8((sequence & 0xff) as u8);
    buf.put_u8(((sequence >> 8) & 0xff) as u8);
    buf.put_u8(((sequence >> 16) & 0xff) as u8);
    buf
}
