//! ASN.1 BER codec
//!
//! Tag/length/value encoding for the closed set of universal tags used
//! by the MIB and configuration interfaces. Definite length forms only.
//!
//! Decoders take a [`Bytes`] cursor and, on success, consume exactly
//! the tag (when checked), the length bytes and the contents; on error
//! the cursor is left untouched.

pub mod mib;

use crate::errors::AsnError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, NaiveDate};
use std::fmt;

pub const BOOLEAN: u8 = 0x01;
pub const INTEGER: u8 = 0x02;
pub const BIT_STRING: u8 = 0x03;
pub const OCTET_STRING: u8 = 0x04;
pub const NULL_TAG: u8 = 0x05;
pub const OBJECT_ID: u8 = 0x06;
pub const REAL: u8 = 0x09;
pub const UTF8_STR: u8 = 0x0c;
pub const NUMERIC_STR: u8 = 0x12;
pub const PRINTABLE_STR: u8 = 0x13;
pub const IA5_STR: u8 = 0x16;
pub const UTC_TIME: u8 = 0x17;
pub const GENERALIZED_TIME: u8 = 0x18;
pub const VISIBLE_STR: u8 = 0x1a;
pub const SEQUENCE: u8 = 0x30;
pub const SET: u8 = 0x31;

const LONG_LENGTH: u8 = 0x80;

type AsnResult<T> = Result<T, AsnError>;

/// Decode a definite length; consumes from `work`
fn decode_length(work: &mut Bytes) -> AsnResult<usize> {
    if work.is_empty() {
        return Err(AsnError::InvalidLengthOrTag);
    }
    let first = work[0];
    if first & LONG_LENGTH == 0 {
        work.advance(1);
        return Ok(first as usize);
    }
    let count = (first & !LONG_LENGTH) as usize;
    if count == 0 || count > std::mem::size_of::<u32>() || work.len() < 1 + count {
        return Err(AsnError::InvalidLengthOrTag);
    }
    let mut length = 0usize;
    for i in 0..count {
        length = (length << 8) | work[1 + i] as usize;
    }
    work.advance(1 + count);
    Ok(length)
}

/// Encode a length in definite form
pub fn build_length(len: usize) -> BytesMut {
    let mut out = BytesMut::new();
    if len < LONG_LENGTH as usize {
        out.put_u8(len as u8);
        return out;
    }
    let mut tmp = Vec::new();
    let mut v = len;
    while v > 0 {
        tmp.push((v & 0xff) as u8);
        v >>= 8;
    }
    out.put_u8(LONG_LENGTH | tmp.len() as u8);
    for b in tmp.iter().rev() {
        out.put_u8(*b);
    }
    out
}

fn encode_tagged(tag: u8, contents: &[u8], tag_check: bool) -> BytesMut {
    let mut out = BytesMut::new();
    if tag_check {
        out.put_u8(tag);
        out.extend_from_slice(&build_length(contents.len()));
    }
    out.extend_from_slice(contents);
    out
}

/// Common prologue: optional tag check, then length, bounded by the
/// remaining buffer
fn open_tlv(work: &mut Bytes, tag: u8, tag_check: bool) -> AsnResult<usize> {
    if work.len() < 2 {
        return Err(AsnError::InvalidLengthOrTag);
    }
    if tag_check {
        if work[0] != tag {
            return Err(AsnError::InvalidLengthOrTag);
        }
        work.advance(1);
    }
    let length = decode_length(work)?;
    if length > work.len() {
        return Err(AsnError::InvalidLengthOrTag);
    }
    Ok(length)
}

pub fn decode_boolean(data: &mut Bytes, tag_check: bool) -> AsnResult<bool> {
    let mut work = data.clone();
    let length = open_tlv(&mut work, BOOLEAN, tag_check)?;
    if length != 1 {
        return Err(AsnError::InvalidLengthOrTag);
    }
    let val = work[0] != 0;
    work.advance(1);
    *data = work;
    Ok(val)
}

/// Decode an INTEGER, sign-extending from the top bit of the first
/// content byte
pub fn decode_integer(data: &mut Bytes, tag_check: bool) -> AsnResult<i64> {
    let mut work = data.clone();
    let length = open_tlv(&mut work, INTEGER, tag_check)?;
    if length == 0 {
        return Err(AsnError::InvalidLengthOrTag);
    }
    let mut value: i64 = if work[0] & 0x80 != 0 { -1 } else { 0 };
    for i in 0..length {
        value = (value << 8) | work[i] as i64;
    }
    work.advance(length);
    *data = work;
    Ok(value)
}

/// Decode a BIT STRING into its '0'/'1' character form
pub fn decode_bit_string(data: &mut Bytes, tag_check: bool) -> AsnResult<String> {
    let mut work = data.clone();
    let length = open_tlv(&mut work, BIT_STRING, tag_check)?;
    if length == 0 || work[0] > 7 {
        return Err(AsnError::InvalidLengthOrTag);
    }
    let unused = work[0] as usize;
    // unused bits cannot exceed the bits actually present
    if unused > (length - 1) * 8 {
        return Err(AsnError::InvalidLengthOrTag);
    }
    let mut bits = String::with_capacity((length - 1) * 8);
    for i in 1..length {
        let byte = work[i];
        for shift in (0..8).rev() {
            bits.push(if byte >> shift & 1 == 1 { '1' } else { '0' });
        }
    }
    bits.truncate((length - 1) * 8 - unused);
    work.advance(length);
    *data = work;
    Ok(bits)
}

pub fn decode_octet_string(data: &mut Bytes, tag_check: bool) -> AsnResult<Vec<u8>> {
    let mut work = data.clone();
    let length = open_tlv(&mut work, OCTET_STRING, tag_check)?;
    let val = work[..length].to_vec();
    work.advance(length);
    *data = work;
    Ok(val)
}

pub fn decode_null(data: &mut Bytes, tag_check: bool) -> AsnResult<()> {
    let mut work = data.clone();
    let length = open_tlv(&mut work, NULL_TAG, tag_check)?;
    if length != 0 {
        return Err(AsnError::InvalidLengthOrTag);
    }
    *data = work;
    Ok(())
}

/// Decode an OBJECT IDENTIFIER.
///
/// The single byte 0x2B at the start stands for the `1.3` pair;
/// everything else is base-128 subidentifiers.
pub fn decode_oid(data: &mut Bytes, tag_check: bool) -> AsnResult<ObjectId> {
    let mut work = data.clone();
    let length = open_tlv(&mut work, OBJECT_ID, tag_check)?;
    let mut oid = String::new();
    let mut acc: u64 = 0;
    for j in 0..length {
        let byte = work[j];
        if j == 0 && byte == 0x2b {
            oid.push_str("1.3.");
            continue;
        }
        acc += (byte & 0x7f) as u64;
        if byte & 0x80 != 0 {
            acc <<= 7;
        } else {
            oid.push_str(&acc.to_string());
            acc = 0;
            if j != length - 1 {
                oid.push('.');
            }
        }
    }
    if oid.ends_with('.') {
        oid.pop();
    }
    work.advance(length);
    *data = work;
    Ok(ObjectId::new(oid))
}

/// REAL decode is not supported; the encoding is skipped over
pub fn decode_real(data: &mut Bytes, tag_check: bool) -> AsnResult<()> {
    let mut work = data.clone();
    let length = open_tlv(&mut work, REAL, tag_check)?;
    work.advance(length);
    *data = work;
    Ok(())
}

fn is_string_tag(tag: u8) -> bool {
    matches!(tag, NUMERIC_STR | PRINTABLE_STR | IA5_STR | VISIBLE_STR)
}

/// Decode a restricted character string (numeric, printable, IA5 or
/// visible). Content bytes are masked to 7 bits. Returns the string and
/// the tag seen (0 when the tag was not checked).
pub fn decode_string(data: &mut Bytes, tag_check: bool) -> AsnResult<(String, u8)> {
    let mut work = data.clone();
    if work.len() < 2 {
        return Err(AsnError::InvalidLengthOrTag);
    }
    let mut tag = 0;
    if tag_check {
        if !is_string_tag(work[0]) {
            return Err(AsnError::InvalidLengthOrTag);
        }
        tag = work[0];
        work.advance(1);
    }
    let length = decode_length(&mut work)?;
    if length > work.len() {
        return Err(AsnError::InvalidLengthOrTag);
    }
    let val: String = work[..length].iter().map(|b| (b & 0x7f) as char).collect();
    work.advance(length);
    *data = work;
    Ok((val, tag))
}

/// Decode a UTF8String, validating the byte sequence
pub fn decode_utf8(data: &mut Bytes, tag_check: bool) -> AsnResult<String> {
    let mut work = data.clone();
    let length = open_tlv(&mut work, UTF8_STR, tag_check)?;
    let val = std::str::from_utf8(&work[..length])
        .map_err(|_| AsnError::Parse)?
        .to_string();
    work.advance(length);
    *data = work;
    Ok(val)
}

/// Zone suffix handling shared by both time decoders.
/// Returns the remaining date digits, the UTC offset to add and
/// whether a zone designator was present.
fn split_zone(date: &str) -> AsnResult<(String, i64, bool)> {
    if let Some(stripped) = date.strip_suffix('Z') {
        return Ok((stripped.to_string(), 0, true));
    }
    let pos = date.find('-').or_else(|| date.find('+'));
    match pos {
        Some(pos) => {
            if pos != date.len() - 5 {
                return Err(AsnError::InvalidContents);
            }
            let sign = date.as_bytes()[pos] as char;
            let hours: i64 = date[pos + 1..pos + 3]
                .parse()
                .map_err(|_| AsnError::InvalidContents)?;
            let minutes: i64 = date[pos + 3..]
                .parse()
                .map_err(|_| AsnError::InvalidContents)?;
            if hours > 11 || minutes > 59 {
                return Err(AsnError::InvalidContents);
            }
            let diff = hours * 3600 + minutes * 60;
            let offset = if sign == '-' { diff } else { -diff };
            Ok((date[..pos].to_string(), offset, true))
        }
        None => Ok((date.to_string(), 0, false)),
    }
}

fn field(s: &str, at: usize, len: usize) -> AsnResult<u32> {
    s.get(at..at + len)
        .and_then(|f| f.parse().ok())
        .ok_or(AsnError::InvalidContents)
}

fn to_epoch(year: i32, month: u32, day: u32, h: u32, m: u32, s: u32) -> AsnResult<i64> {
    if year < 1970 || month > 12 || day > 31 || h > 23 || m > 59 || s > 59 {
        return Err(AsnError::InvalidContents);
    }
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(h, m, s))
        .map(|dt| dt.and_utc().timestamp())
        .ok_or(AsnError::InvalidContents)
}

/// Decode a GeneralizedTime into epoch seconds, fraction digits and a
/// "had a zone designator" flag
pub fn decode_gen_time(data: &mut Bytes, tag_check: bool) -> AsnResult<(u64, u32, bool)> {
    let mut work = data.clone();
    let length = open_tlv(&mut work, GENERALIZED_TIME, tag_check)?;
    if length < 14 {
        return Err(AsnError::InvalidLengthOrTag);
    }
    let text: String = work[..length].iter().map(|b| *b as char).collect();
    let (rest, offset, utc) = split_zone(&text)?;
    let mut parts = rest.splitn(2, '.');
    let stamp = parts.next().unwrap_or("");
    let fractions: u32 = parts.next().and_then(|f| f.parse().ok()).unwrap_or(0);
    let epoch = to_epoch(
        field(stamp, 0, 4)? as i32,
        field(stamp, 4, 2)?,
        field(stamp, 6, 2)?,
        field(stamp, 8, 2)?,
        field(stamp, 10, 2)?,
        field(stamp, 12, 2)?,
    )?;
    work.advance(length);
    *data = work;
    Ok(((epoch + offset) as u64, fractions, utc))
}

/// Decode a UTCTime into epoch seconds. Years up to 50 land in the
/// 2000s, later ones in the 1900s. A zone designator is mandatory.
pub fn decode_utc_time(data: &mut Bytes, tag_check: bool) -> AsnResult<u64> {
    let mut work = data.clone();
    let length = open_tlv(&mut work, UTC_TIME, tag_check)?;
    if length < 11 {
        return Err(AsnError::InvalidLengthOrTag);
    }
    let text: String = work[..length].iter().map(|b| *b as char).collect();
    let (stamp, offset, zoned) = split_zone(&text)?;
    if !zoned {
        return Err(AsnError::InvalidContents);
    }
    let yy = field(&stamp, 0, 2)?;
    let year = if yy > 50 { 1900 + yy } else { 2000 + yy } as i32;
    let seconds = if stamp.len() > 10 { field(&stamp, 10, 2)? } else { 0 };
    let epoch = to_epoch(
        year,
        field(&stamp, 2, 2)?,
        field(&stamp, 4, 2)?,
        field(&stamp, 6, 2)?,
        field(&stamp, 8, 2)?,
        seconds,
    )?;
    work.advance(length);
    *data = work;
    Ok((epoch + offset) as u64)
}

/// Enter a SEQUENCE: consumes the header, returns the content length
pub fn decode_sequence(data: &mut Bytes, tag_check: bool) -> AsnResult<usize> {
    let mut work = data.clone();
    let length = open_tlv(&mut work, SEQUENCE, tag_check)?;
    *data = work;
    Ok(length)
}

/// Enter a SET: consumes the header, returns the content length
pub fn decode_set(data: &mut Bytes, tag_check: bool) -> AsnResult<usize> {
    let mut work = data.clone();
    let length = open_tlv(&mut work, SET, tag_check)?;
    *data = work;
    Ok(length)
}

pub fn encode_boolean(val: bool, tag_check: bool) -> BytesMut {
    encode_tagged(BOOLEAN, &[val as u8], tag_check)
}

/// Encode an INTEGER in minimal two's-complement form: no run of nine
/// identical bits at the front
pub fn encode_integer(val: i64, tag_check: bool) -> BytesMut {
    let bytes = val.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let nine = ((bytes[start] as u16) << 1) | (bytes[start + 1] >> 7) as u16;
        if nine == 0 || nine == 0x1ff {
            start += 1;
        } else {
            break;
        }
    }
    encode_tagged(INTEGER, &bytes[start..], tag_check)
}

/// Encode a BIT STRING from its '0'/'1' character form
pub fn encode_bit_string(bits: &str, tag_check: bool) -> BytesMut {
    let trail = (8 - bits.len() % 8) % 8;
    let mut padded = bits.to_string();
    for _ in 0..trail {
        padded.push('0');
    }
    let mut contents = Vec::with_capacity(1 + padded.len() / 8);
    contents.push(trail as u8);
    for chunk in padded.as_bytes().chunks(8) {
        let mut byte = 0u8;
        for c in chunk {
            byte = (byte << 1) | (*c == b'1') as u8;
        }
        contents.push(byte);
    }
    encode_tagged(BIT_STRING, &contents, tag_check)
}

pub fn encode_octet_string(val: &[u8], tag_check: bool) -> BytesMut {
    encode_tagged(OCTET_STRING, val, tag_check)
}

pub fn encode_null(tag_check: bool) -> BytesMut {
    encode_tagged(NULL_TAG, &[], tag_check)
}

/// Encode an OBJECT IDENTIFIER; a leading `1.3` pair becomes the
/// single byte 0x2B
pub fn encode_oid(oid: &ObjectId, tag_check: bool) -> BytesMut {
    let mut ids = oid.to_bytes();
    if ids.is_empty() {
        return BytesMut::new();
    }
    if ids.len() >= 2 && ids[0] == 1 && ids[1] == 3 {
        ids.advance(2);
        let mut short = BytesMut::with_capacity(1 + ids.len());
        short.put_u8(0x2b);
        short.extend_from_slice(&ids);
        ids = short;
    }
    encode_tagged(OBJECT_ID, &ids, tag_check)
}

/// REAL encoding is not implemented
pub fn encode_real(_val: f64, _tag_check: bool) -> BytesMut {
    BytesMut::new()
}

/// Encode a restricted character string under the given tag; other
/// tags produce an empty buffer
pub fn encode_string(val: &str, tag: u8, tag_check: bool) -> BytesMut {
    if !is_string_tag(tag) || val.is_empty() {
        return BytesMut::new();
    }
    encode_tagged(tag, val.as_bytes(), tag_check)
}

pub fn encode_utf8(val: &str, tag_check: bool) -> BytesMut {
    encode_tagged(UTF8_STR, val.as_bytes(), tag_check)
}

pub fn encode_gen_time(epoch: u64, fractions: u32, tag_check: bool) -> BytesMut {
    let Some(dt) = DateTime::from_timestamp(epoch as i64, 0) else {
        return BytesMut::new();
    };
    let mut text = dt.format("%Y%m%d%H%M%S").to_string();
    if fractions != 0 {
        text.push('.');
        text.push_str(&fractions.to_string());
    }
    text.push('Z');
    encode_tagged(GENERALIZED_TIME, text.as_bytes(), tag_check)
}

pub fn encode_utc_time(epoch: u64, tag_check: bool) -> BytesMut {
    let Some(dt) = DateTime::from_timestamp(epoch as i64, 0) else {
        return BytesMut::new();
    };
    let text = format!("{}Z", dt.format("%y%m%d%H%M%S"));
    encode_tagged(UTC_TIME, text.as_bytes(), tag_check)
}

/// Wrap already-encoded contents in a SEQUENCE header
pub fn encode_sequence(contents: &[u8], tag_check: bool) -> BytesMut {
    encode_tagged(SEQUENCE, contents, tag_check)
}

/// Wrap already-encoded contents in a SET header
pub fn encode_set(contents: &[u8], tag_check: bool) -> BytesMut {
    encode_tagged(SET, contents, tag_check)
}

/// A dotted object identifier string, e.g. `1.3.6.1.2.1`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct ObjectId {
    value: String,
}

impl ObjectId {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Raw subidentifier bytes, base-128 with continuation bits; no
    /// pairwise folding beyond the caller's 0x2B shortcut
    pub fn to_bytes(&self) -> BytesMut {
        let mut out = BytesMut::new();
        for part in self.value.split('.').filter(|p| !p.is_empty()) {
            let Ok(mut val) = part.parse::<u32>() else {
                continue;
            };
            if val < 128 {
                out.put_u8(val as u8);
                continue;
            }
            let mut tmp = vec![(val & 0x7f) as u8];
            val >>= 7;
            while val != 0 {
                tmp.push((val & 0x7f) as u8 | 0x80);
                val >>= 7;
            }
            for b in tmp.iter().rev() {
                out.put_u8(*b);
            }
        }
        out
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
