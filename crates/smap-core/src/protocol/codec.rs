//! Binary codec for sMAP requests and records.
//!
//! Wire format:
//! ```text
//! [version:1][kind:1][reserved:2][payload_len:4][payload:N]
//!
//! payload (Void)      = credential:string
//! payload (WriteData) = credential:string record_count:u32 (record_len:u32 record)*
//!
//! record = path:string uuid:[16] contents:list<string>
//!          readings:list<time:i64 data:f64>
//!          properties:list<key:string value:string>
//!          metadata:list<key:string value:string>
//! ```
//! Header size: 8 bytes.  Strings are `len:u32` + UTF-8 bytes, lists are
//! `count:u32` + items.  All multi-byte integers are big-endian.

use thiserror::Error;
use uuid::Uuid;

use crate::protocol::messages::{
    BatchRequest, Pair, Request, RequestKind, WireReading, WireRecord, HEADER_SIZE,
    PROTOCOL_VERSION,
};

/// Errors that can occur during request encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The request kind byte in the header is not a recognized value.
    #[error("unknown request kind: 0x{0:02X}")]
    UnknownRequestKind(u8),

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The payload could not be parsed (truncated field, UTF-8 error, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The encoded payload length field does not match the actual data available.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },

    /// A string, list or record is too large for its 32-bit length header.
    #[error("{field} is too large to encode: {len} exceeds u32")]
    FieldTooLarge { field: &'static str, len: usize },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a `WriteData` request carrying `batch`.
///
/// # Errors
///
/// Returns [`ProtocolError::FieldTooLarge`] if any length does not fit its
/// 32-bit header.
///
/// # Examples
///
/// ```rust
/// use smap_core::protocol::{decode_request, encode_batch, BatchRequest, Request};
///
/// let batch = BatchRequest { credential: "key".into(), records: vec![] };
/// let bytes = encode_batch(&batch).unwrap();
/// let (decoded, consumed) = decode_request(&bytes).unwrap();
/// assert_eq!(decoded, Request::WriteData(batch));
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_batch(batch: &BatchRequest) -> Result<Vec<u8>, ProtocolError> {
    let mut payload = Vec::new();
    write_string(&mut payload, &batch.credential, "credential")?;
    write_count(&mut payload, batch.records.len(), "record list")?;
    for record in &batch.records {
        let bytes = encode_record(record)?;
        write_count(&mut payload, bytes.len(), "record")?;
        payload.extend_from_slice(&bytes);
    }
    frame(RequestKind::WriteData, payload)
}

/// Encodes a `Void` request: a credential with no body.
///
/// # Errors
///
/// Returns [`ProtocolError::FieldTooLarge`] for an oversized credential.
pub fn encode_void(credential: &str) -> Result<Vec<u8>, ProtocolError> {
    let mut payload = Vec::new();
    write_string(&mut payload, credential, "credential")?;
    frame(RequestKind::Void, payload)
}

/// Encodes any [`Request`].
///
/// # Errors
///
/// See [`encode_batch`] and [`encode_void`].
pub fn encode_request(request: &Request) -> Result<Vec<u8>, ProtocolError> {
    match request {
        Request::Void { credential } => encode_void(credential),
        Request::WriteData(batch) => encode_batch(batch),
    }
}

/// Decodes one [`Request`] from the beginning of `bytes`.
///
/// Returns the request and the total number of bytes consumed (header +
/// payload), so stream callers can advance their read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are malformed.
pub fn decode_request(bytes: &[u8]) -> Result<(Request, usize), ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let kind_byte = bytes[1];
    let kind = RequestKind::try_from(kind_byte)
        .map_err(|_| ProtocolError::UnknownRequestKind(kind_byte))?;

    // bytes[2..4] are reserved – ignored on decode

    let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;

    let total_needed = HEADER_SIZE + payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared: payload_len,
            available: bytes.len() - HEADER_SIZE,
        });
    }

    let payload = &bytes[HEADER_SIZE..total_needed];
    let request = decode_payload(kind, payload)?;
    Ok((request, total_needed))
}

/// Encodes a single record without any request framing.
///
/// # Errors
///
/// Returns [`ProtocolError::FieldTooLarge`] if a length does not fit u32.
pub fn encode_record(record: &WireRecord) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    write_string(&mut buf, &record.path, "path")?;
    buf.extend_from_slice(record.uuid.as_bytes());

    write_count(&mut buf, record.contents.len(), "contents")?;
    for item in &record.contents {
        write_string(&mut buf, item, "contents item")?;
    }

    write_count(&mut buf, record.readings.len(), "readings")?;
    for reading in &record.readings {
        buf.extend_from_slice(&reading.time.to_be_bytes());
        buf.extend_from_slice(&reading.data.to_be_bytes());
    }

    write_pairs(&mut buf, &record.properties, "properties")?;
    write_pairs(&mut buf, &record.metadata, "metadata")?;
    Ok(buf)
}

/// Decodes a single record that occupies all of `p`.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] for truncated fields, invalid
/// UTF-8, or trailing bytes.
pub fn decode_record(p: &[u8]) -> Result<WireRecord, ProtocolError> {
    let (path, off) = read_string(p, 0)?;
    let uuid = read_uuid(p, off)?;
    let mut off = off + 16;

    let (count, next) = read_count(p, off)?;
    off = next;
    let mut contents = Vec::with_capacity(count.min(p.len()));
    for _ in 0..count {
        let (item, next) = read_string(p, off)?;
        contents.push(item);
        off = next;
    }

    let (count, next) = read_count(p, off)?;
    off = next;
    // Each reading: 8 (time) + 8 (data) = 16
    const READING_SIZE: usize = 16;
    let readings_end = count
        .checked_mul(READING_SIZE)
        .and_then(|n| n.checked_add(off))
        .ok_or_else(|| ProtocolError::MalformedPayload(format!("reading count {count} overflows")))?;
    require_len(p, readings_end, "Record.readings")?;
    let mut readings = Vec::with_capacity(count);
    for _ in 0..count {
        let time = read_u64(p, off)? as i64;
        let data = f64::from_bits(read_u64(p, off + 8)?);
        readings.push(WireReading { time, data });
        off += READING_SIZE;
    }

    let (properties, off) = read_pairs(p, off)?;
    let (metadata, off) = read_pairs(p, off)?;

    if off != p.len() {
        return Err(ProtocolError::MalformedPayload(format!(
            "record has {} trailing bytes",
            p.len() - off
        )));
    }

    Ok(WireRecord {
        path,
        uuid,
        contents,
        readings,
        properties,
        metadata,
    })
}

// ── Framing ───────────────────────────────────────────────────────────────────

fn frame(kind: RequestKind, payload: Vec<u8>) -> Result<Vec<u8>, ProtocolError> {
    let payload_len = u32::try_from(payload.len()).map_err(|_| ProtocolError::FieldTooLarge {
        field: "payload",
        len: payload.len(),
    })?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());

    // Header: version (1) + kind (1) + reserved (2) + payload_len (4) = 8 bytes
    buf.push(PROTOCOL_VERSION);
    buf.push(kind as u8);
    buf.push(0x00); // reserved
    buf.push(0x00); // reserved
    buf.extend_from_slice(&payload_len.to_be_bytes());

    buf.extend_from_slice(&payload);
    Ok(buf)
}

fn decode_payload(kind: RequestKind, p: &[u8]) -> Result<Request, ProtocolError> {
    let (credential, mut off) = read_string(p, 0)?;
    match kind {
        RequestKind::Void => {
            if off != p.len() {
                return Err(ProtocolError::MalformedPayload(
                    "Void request carries a body".to_string(),
                ));
            }
            Ok(Request::Void { credential })
        }
        RequestKind::WriteData => {
            let (count, next) = read_count(p, off)?;
            off = next;
            let mut records = Vec::with_capacity(count.min(p.len()));
            for index in 0..count {
                let (len, start) = read_count(p, off)?;
                require_len(p, start + len, "WriteData.record")?;
                let record = decode_record(&p[start..start + len]).map_err(|e| {
                    ProtocolError::MalformedPayload(format!("record {index}: {e}"))
                })?;
                records.push(record);
                off = start + len;
            }
            if off != p.len() {
                return Err(ProtocolError::MalformedPayload(format!(
                    "WriteData has {} trailing bytes",
                    p.len() - off
                )));
            }
            Ok(Request::WriteData(BatchRequest {
                credential,
                records,
            }))
        }
    }
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

fn read_u64(buf: &[u8], offset: usize) -> Result<u64, ProtocolError> {
    if buf.len() < offset + 8 {
        return Err(ProtocolError::InsufficientData {
            needed: offset + 8,
            available: buf.len(),
        });
    }
    Ok(u64::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
        buf[offset + 4],
        buf[offset + 5],
        buf[offset + 6],
        buf[offset + 7],
    ]))
}

fn read_uuid(buf: &[u8], offset: usize) -> Result<Uuid, ProtocolError> {
    if buf.len() < offset + 16 {
        return Err(ProtocolError::MalformedPayload(format!(
            "need 16 bytes for UUID at offset {offset}, got {}",
            buf.len().saturating_sub(offset)
        )));
    }
    let mut raw = [0u8; 16];
    raw.copy_from_slice(&buf[offset..offset + 16]);
    Ok(Uuid::from_bytes(raw))
}

/// Writes a 4-byte count or length header.
fn write_count(buf: &mut Vec<u8>, len: usize, field: &'static str) -> Result<(), ProtocolError> {
    let len = u32::try_from(len).map_err(|_| ProtocolError::FieldTooLarge { field, len })?;
    buf.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

/// Reads a 4-byte count or length header.
/// Returns the value and the offset of the byte after it.
fn read_count(buf: &[u8], offset: usize) -> Result<(usize, usize), ProtocolError> {
    if buf.len() < offset + 4 {
        return Err(ProtocolError::MalformedPayload(format!(
            "need 4 bytes for length at offset {offset}"
        )));
    }
    let len = u32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]]);
    Ok((len as usize, offset + 4))
}

/// Writes a 4-byte length prefix followed by the UTF-8 string bytes.
fn write_string(buf: &mut Vec<u8>, s: &str, field: &'static str) -> Result<(), ProtocolError> {
    write_count(buf, s.len(), field)?;
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Reads a 4-byte length prefix and then that many UTF-8 bytes.
/// Returns the string and the offset of the byte after the string.
fn read_string(buf: &[u8], offset: usize) -> Result<(String, usize), ProtocolError> {
    let (len, start) = read_count(buf, offset)?;
    if buf.len() < start + len {
        return Err(ProtocolError::MalformedPayload(format!(
            "string of length {len} at offset {start} exceeds buffer"
        )));
    }
    let s = std::str::from_utf8(&buf[start..start + len])
        .map_err(|e| ProtocolError::MalformedPayload(format!("invalid UTF-8: {e}")))?
        .to_string();
    Ok((s, start + len))
}

fn write_pairs(buf: &mut Vec<u8>, pairs: &[Pair], field: &'static str) -> Result<(), ProtocolError> {
    write_count(buf, pairs.len(), field)?;
    for pair in pairs {
        write_string(buf, &pair.key, field)?;
        write_string(buf, &pair.value, field)?;
    }
    Ok(())
}

fn read_pairs(buf: &[u8], offset: usize) -> Result<(Vec<Pair>, usize), ProtocolError> {
    let (count, mut off) = read_count(buf, offset)?;
    let mut pairs = Vec::with_capacity(count.min(buf.len()));
    for _ in 0..count {
        let (key, next) = read_string(buf, off)?;
        let (value, next) = read_string(buf, next)?;
        pairs.push(Pair { key, value });
        off = next;
    }
    Ok((pairs, off))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
