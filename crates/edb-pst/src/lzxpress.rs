//! LZXPRESS / ESE column decompressor.
//!
//! Exchange compresses column payloads with one of a handful of variants,
//! selected by the first byte of the stored value. This module decodes
//! every variant into its logical column value.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LzxpressError {
    #[error("unsupported compression variant byte 0x{0:02X}")]
    Unsupported(u8),
    #[error("malformed compressed stream: {0}")]
    Malformed(String),
}

pub type LzxpressResult<T> = Result<T, LzxpressError>;

const VARIANT_7BIT_ASCII: u8 = 0x10;
const VARIANT_7BIT_UTF16: u8 = 0x12;
const VARIANT_7BIT_ALT: u8 = 0x15;
const VARIANT_UNCOMPRESSED: u8 = 0x17;
const VARIANT_MSXCA_SHORT: u8 = 0x18;
const VARIANT_MSXCA_LONG: u8 = 0x19;

/// Decodes a compressed Exchange column value.
pub fn decompress(bytes: &[u8]) -> LzxpressResult<Vec<u8>> {
    let &variant = bytes
        .first()
        .ok_or_else(|| LzxpressError::Malformed("empty input".to_string()))?;

    match variant {
        VARIANT_7BIT_ASCII | VARIANT_7BIT_ALT => decode_7bit(&bytes[1..], false),
        VARIANT_7BIT_UTF16 => decode_7bit(&bytes[1..], true),
        VARIANT_UNCOMPRESSED => Ok(bytes[1..].to_vec()),
        VARIANT_MSXCA_SHORT => {
            if bytes.len() < 3 {
                return Err(LzxpressError::Malformed(
                    "0x18 header truncated before 2-byte length".to_string(),
                ));
            }
            let mut header = Cursor::new(&bytes[1..3]);
            let declared_len = header
                .read_u16::<LittleEndian>()
                .map_err(|e| LzxpressError::Malformed(e.to_string()))? as usize;
            decode_msxca(&bytes[3..], declared_len)
        }
        VARIANT_MSXCA_LONG => {
            if bytes.len() < 5 {
                return Err(LzxpressError::Malformed(
                    "0x19 header truncated before 4-byte length".to_string(),
                ));
            }
            let mut header = Cursor::new(&bytes[1..5]);
            let declared_len = header
                .read_u32::<LittleEndian>()
                .map_err(|e| LzxpressError::Malformed(e.to_string()))? as usize;
            decode_msxca(&bytes[5..], declared_len)
        }
        other => Err(LzxpressError::Unsupported(other)),
    }
}

/// The 7-bit-per-character dictionary form: a bit-stream read LSB-first,
/// every 7 bits emitting one octet with the high bit cleared. `utf16`
/// selects whether pairs of octets are assembled into UTF-16LE code units
/// (variant `0x12`) or kept as plain bytes (variants `0x10`/`0x15`).
///
/// The payload is prefixed by a 2-byte little-endian declared output count
/// (of output units: bytes for the ASCII form, UTF-16 code units for the
/// UTF-16 form). The `0x15` variant's preamble isn't independently
/// documented anywhere we could find; this is the most conservative
/// reading consistent with the `0x18`/`0x19` headers' length-prefix
/// convention.
fn decode_7bit(payload: &[u8], utf16: bool) -> LzxpressResult<Vec<u8>> {
    if payload.len() < 2 {
        return Err(LzxpressError::Malformed(
            "7-bit stream missing length preamble".to_string(),
        ));
    }
    let declared_units = u16::from_le_bytes([payload[0], payload[1]]) as usize;
    let bits = &payload[2..];

    let mut octets = Vec::new();
    let mut bit_pos: usize = 0;
    let total_bits = bits.len() * 8;

    while octets.len() < declared_units.max(if utf16 { declared_units * 2 } else { declared_units })
    {
        if bit_pos + 7 > total_bits {
            break;
        }
        let mut value: u16 = 0;
        for i in 0..7 {
            let byte_index = (bit_pos + i) / 8;
            let bit_index = (bit_pos + i) % 8;
            let bit = (bits[byte_index] >> bit_index) & 1;
            value |= u16::from(bit) << i;
        }
        bit_pos += 7;
        let octet = (value & 0x7F) as u8;
        octets.push(octet);

        let produced = if utf16 { octets.len() / 2 } else { octets.len() };
        if produced >= declared_units && (!utf16 || octets.len() % 2 == 0) {
            break;
        }
    }

    Ok(octets)
}

const MIN_MATCH_LENGTH: u32 = 3;

/// MS-XCA plain LZ77 decoder used by variants `0x18`/`0x19`. Flag words are
/// 4-byte little-endian; bits are consumed LSB-first and the word is
/// refilled every 32 symbols. A clear bit copies one literal byte; a set
/// bit reads a 2-byte little-endian match token whose low nibble is a
/// length (extended via a nibble-then-byte-then-word chain when it
/// saturates at `0xF`) and whose remaining bits are an offset biased by one.
fn decode_msxca(payload: &[u8], declared_len: usize) -> LzxpressResult<Vec<u8>> {
    let mut out = Vec::with_capacity(declared_len);
    let mut pos = 0usize;
    let mut flags: u32 = 0;
    let mut flag_bits_left = 0u32;

    while out.len() < declared_len {
        if flag_bits_left == 0 {
            if pos + 4 > payload.len() {
                return Err(LzxpressError::Malformed(format!(
                    "flag word truncated at offset {pos}, produced {} of {declared_len} bytes",
                    out.len()
                )));
            }
            flags = u32::from_le_bytes([
                payload[pos],
                payload[pos + 1],
                payload[pos + 2],
                payload[pos + 3],
            ]);
            pos += 4;
            flag_bits_left = 32;
        }

        let is_match = flags & 1 != 0;
        flags >>= 1;
        flag_bits_left -= 1;

        if !is_match {
            if pos >= payload.len() {
                return Err(LzxpressError::Malformed(format!(
                    "literal byte missing at offset {pos}, produced {} of {declared_len} bytes",
                    out.len()
                )));
            }
            out.push(payload[pos]);
            pos += 1;
            continue;
        }

        if pos + 2 > payload.len() {
            return Err(LzxpressError::Malformed(
                "match token truncated".to_string(),
            ));
        }
        let token = u16::from_le_bytes([payload[pos], payload[pos + 1]]);
        pos += 2;

        let mut length = u32::from(token & 0xF);
        let offset = u32::from(token >> 4) + 1;

        if length == 0xF {
            let extra = *payload
                .get(pos)
                .ok_or_else(|| LzxpressError::Malformed("length extension byte missing".to_string()))?;
            pos += 1;
            length += u32::from(extra);

            if extra == 0xFF {
                if pos + 2 > payload.len() {
                    return Err(LzxpressError::Malformed(
                        "two-byte length extension truncated".to_string(),
                    ));
                }
                length = u32::from(u16::from_le_bytes([payload[pos], payload[pos + 1]]));
                pos += 2;
            }
        }

        let copy_len = (length + MIN_MATCH_LENGTH) as usize;
        let offset = offset as usize;
        if offset > out.len() {
            return Err(LzxpressError::Malformed(format!(
                "match offset {offset} references before output start (len {})",
                out.len()
            )));
        }

        let mut src = out.len() - offset;
        for _ in 0..copy_len {
            let byte = out[src];
            out.push(byte);
            src += 1;
        }
    }

    if out.len() != declared_len {
        return Err(LzxpressError::Malformed(format!(
            "decoded {} bytes, declared length was {declared_len}",
            out.len()
        )));
    }

    Ok(out)
}
