//! Stream filter codecs.
//!
//! Decoding applies filters in the order listed in `/Filter`; encoding runs
//! the same chain in reverse. Each codec receives its `/DecodeParms` entry as
//! a [`DecodeParams`]. A codec that rejects malformed data reports
//! [`PdfError::InvalidFilterData`] carrying whatever output it produced
//! before the failure, so callers can keep partial plaintext from corrupted
//! files.

use crate::error::{PdfError, Result};

#[cfg(feature = "compression")]
use flate2::read::ZlibDecoder;
#[cfg(feature = "compression")]
use flate2::write::ZlibEncoder;
#[cfg(feature = "compression")]
use flate2::Compression;
#[cfg(feature = "compression")]
use std::io::{Read, Write};

/// Implemented stream filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    FlateDecode,
    LZWDecode,
    ASCIIHexDecode,
    ASCII85Decode,
    RunLengthDecode,
}

impl Filter {
    /// Parse a filter from its canonical or abbreviated name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            "LZWDecode" | "LZW" => Some(Filter::LZWDecode),
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            "RunLengthDecode" | "RL" => Some(Filter::RunLengthDecode),
            _ => None,
        }
    }

    pub fn pdf_name(&self) -> &'static str {
        match self {
            Filter::FlateDecode => "FlateDecode",
            Filter::LZWDecode => "LZWDecode",
            Filter::ASCIIHexDecode => "ASCIIHexDecode",
            Filter::ASCII85Decode => "ASCII85Decode",
            Filter::RunLengthDecode => "RunLengthDecode",
        }
    }
}

/// Decode parameters shared by the predictor-capable filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeParams {
    pub predictor: i64,
    pub colors: i64,
    pub bits_per_component: i64,
    pub columns: i64,
    pub early_change: i64,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
            early_change: 1,
        }
    }
}

/// Decode `data` with `filter`.
pub fn decode(filter: Filter, data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let decoded = match filter {
        Filter::FlateDecode => decode_flate(data)?,
        Filter::LZWDecode => decode_lzw(data, params)?,
        Filter::ASCIIHexDecode => decode_ascii_hex(data)?,
        Filter::ASCII85Decode => decode_ascii85(data)?,
        Filter::RunLengthDecode => decode_run_length(data)?,
    };

    match filter {
        Filter::FlateDecode | Filter::LZWDecode if params.predictor > 1 => {
            unapply_predictor(&decoded, params)
        }
        _ => Ok(decoded),
    }
}

/// Encode `data` with `filter`.
pub fn encode(filter: Filter, data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let data = match filter {
        Filter::FlateDecode | Filter::LZWDecode if params.predictor > 1 => {
            apply_predictor(data, params)?
        }
        _ => data.to_vec(),
    };

    match filter {
        Filter::FlateDecode => encode_flate(&data),
        Filter::LZWDecode => encode_lzw(&data, params),
        Filter::ASCIIHexDecode => Ok(encode_ascii_hex(&data)),
        Filter::ASCII85Decode => Ok(encode_ascii85(&data)),
        Filter::RunLengthDecode => Ok(encode_run_length(&data)),
    }
}

#[cfg(feature = "compression")]
fn decode_flate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut result = Vec::new();
    match decoder.read_to_end(&mut result) {
        Ok(_) => Ok(result),
        // read_to_end leaves the bytes inflated before the failure in the
        // buffer; hand them back with the error.
        Err(e) => Err(PdfError::InvalidFilterData {
            message: format!("flate decode failed: {e}"),
            partial: result,
        }),
    }
}

#[cfg(not(feature = "compression"))]
fn decode_flate(_data: &[u8]) -> Result<Vec<u8>> {
    Err(PdfError::InvalidStreamObject(
        "FlateDecode requires the 'compression' feature".to_string(),
    ))
}

#[cfg(feature = "compression")]
fn encode_flate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| PdfError::InvalidStreamObject(format!("flate encode failed: {e}")))
}

#[cfg(not(feature = "compression"))]
fn encode_flate(_data: &[u8]) -> Result<Vec<u8>> {
    Err(PdfError::InvalidStreamObject(
        "FlateDecode requires the 'compression' feature".to_string(),
    ))
}

fn decode_lzw(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let mut decoder = if params.early_change != 0 {
        weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
    } else {
        weezl::decode::Decoder::new(weezl::BitOrder::Msb, 8)
    };
    decoder
        .decode(data)
        .map_err(|e| PdfError::InvalidFilterData {
            message: format!("lzw decode failed: {e}"),
            partial: Vec::new(),
        })
}

fn encode_lzw(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let mut encoder = if params.early_change != 0 {
        weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
    } else {
        weezl::encode::Encoder::new(weezl::BitOrder::Msb, 8)
    };
    encoder
        .encode(data)
        .map_err(|e| PdfError::InvalidStreamObject(format!("lzw encode failed: {e}")))
}

fn hex_digit_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

fn is_pdf_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\x0C' | b'\t' | b'\r' | b'\n' | b'\0')
}

fn decode_ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut high: Option<u8> = None;

    for &byte in data {
        if is_pdf_whitespace(byte) {
            continue;
        }
        if byte == b'>' {
            // Odd digit count: final digit is padded with zero.
            if let Some(h) = high {
                result.push(h << 4);
            }
            return Ok(result);
        }
        let value = hex_digit_value(byte).ok_or_else(|| PdfError::InvalidFilterData {
            message: format!("invalid hex digit: {:#04x}", byte),
            partial: result.clone(),
        })?;
        match high.take() {
            Some(h) => result.push((h << 4) | value),
            None => high = Some(value),
        }
    }

    if let Some(h) = high {
        result.push(h << 4);
    }
    Ok(result)
}

fn encode_ascii_hex(data: &[u8]) -> Vec<u8> {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut result = Vec::with_capacity(data.len() * 2 + 1);
    for &byte in data {
        result.push(HEX[(byte >> 4) as usize]);
        result.push(HEX[(byte & 0x0F) as usize]);
    }
    result.push(b'>');
    result
}

fn decode_ascii85(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut group = [0u8; 5];
    let mut count = 0usize;

    let mut bytes = data.iter().copied().peekable();
    // Optional <~ prefix.
    if data.starts_with(b"<~") {
        bytes.next();
        bytes.next();
    }

    while let Some(byte) = bytes.next() {
        if is_pdf_whitespace(byte) {
            continue;
        }
        if byte == b'~' {
            break;
        }
        if byte == b'z' {
            if count != 0 {
                return Err(PdfError::InvalidFilterData {
                    message: "'z' inside an ascii85 group".to_string(),
                    partial: result,
                });
            }
            result.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        if !(b'!'..=b'u').contains(&byte) {
            return Err(PdfError::InvalidFilterData {
                message: format!("invalid ascii85 character: {:#04x}", byte),
                partial: result,
            });
        }
        group[count] = byte - b'!';
        count += 1;
        if count == 5 {
            let mut value = 0u32;
            for digit in group {
                value = value.wrapping_mul(85).wrapping_add(digit as u32);
            }
            result.extend_from_slice(&value.to_be_bytes());
            count = 0;
        }
    }

    if count == 1 {
        return Err(PdfError::InvalidFilterData {
            message: "truncated ascii85 group".to_string(),
            partial: result,
        });
    }
    if count > 1 {
        // Pad the partial group with 'u' and keep count-1 output bytes.
        for slot in group.iter_mut().skip(count) {
            *slot = 84;
        }
        let mut value = 0u32;
        for digit in group {
            value = value.wrapping_mul(85).wrapping_add(digit as u32);
        }
        result.extend_from_slice(&value.to_be_bytes()[..count - 1]);
    }
    Ok(result)
}

fn encode_ascii85(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::new();
    for chunk in data.chunks(4) {
        let mut bytes = [0u8; 4];
        bytes[..chunk.len()].copy_from_slice(chunk);
        let mut value = u32::from_be_bytes(bytes);

        let mut digits = [0u8; 5];
        for slot in digits.iter_mut().rev() {
            *slot = (value % 85) as u8 + b'!';
            value /= 85;
        }
        result.extend_from_slice(&digits[..chunk.len() + 1]);
    }
    result.extend_from_slice(b"~>");
    result
}

fn decode_run_length(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        let length = data[pos];
        pos += 1;
        match length {
            128 => return Ok(result),
            0..=127 => {
                let count = length as usize + 1;
                if pos + count > data.len() {
                    return Err(PdfError::InvalidFilterData {
                        message: "truncated run-length literal".to_string(),
                        partial: result,
                    });
                }
                result.extend_from_slice(&data[pos..pos + count]);
                pos += count;
            }
            129..=255 => {
                let count = 257 - length as usize;
                let Some(&byte) = data.get(pos) else {
                    return Err(PdfError::InvalidFilterData {
                        message: "truncated run-length run".to_string(),
                        partial: result,
                    });
                };
                result.extend(std::iter::repeat(byte).take(count));
                pos += 1;
            }
        }
    }
    Ok(result)
}

fn encode_run_length(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        let byte = data[pos];
        let mut run = 1usize;
        while run < 128 && pos + run < data.len() && data[pos + run] == byte {
            run += 1;
        }
        if run >= 2 {
            result.push((257 - run) as u8);
            result.push(byte);
            pos += run;
        } else {
            let mut literal = 1usize;
            while literal < 128
                && pos + literal < data.len()
                && (pos + literal + 1 >= data.len() || data[pos + literal] != data[pos + literal + 1])
            {
                literal += 1;
            }
            result.push((literal - 1) as u8);
            result.extend_from_slice(&data[pos..pos + literal]);
            pos += literal;
        }
    }
    result.push(128);
    result
}

fn row_geometry(params: &DecodeParams) -> Result<(usize, usize)> {
    let colors = params.colors.max(1) as usize;
    let bpc = params.bits_per_component.max(1) as usize;
    let columns = params.columns.max(1) as usize;
    let bytes_per_pixel = (colors * bpc).div_ceil(8).max(1);
    let row_len = (columns * colors * bpc).div_ceil(8);
    if row_len == 0 {
        return Err(PdfError::InvalidFilterData {
            message: "empty predictor row".to_string(),
            partial: Vec::new(),
        });
    }
    Ok((row_len, bytes_per_pixel))
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i32 + b as i32 - c as i32;
    let pa = (p - a as i32).abs();
    let pb = (p - b as i32).abs();
    let pc = (p - c as i32).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Undo the predictor transform after decompression.
fn unapply_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let (row_len, bpp) = row_geometry(params)?;

    if params.predictor == 2 {
        // TIFF horizontal differencing.
        if params.bits_per_component != 8 {
            return Err(PdfError::InvalidStreamObject(format!(
                "TIFF predictor with {} bits per component not supported",
                params.bits_per_component
            )));
        }
        let mut result = data.to_vec();
        for row in result.chunks_mut(row_len) {
            for i in bpp..row.len() {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
        return Ok(result);
    }

    // PNG predictors: every row is prefixed with its filter type.
    let mut result = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_len];
    let mut pos = 0usize;

    while pos < data.len() {
        let filter_type = data[pos];
        pos += 1;
        let available = (data.len() - pos).min(row_len);
        if available == 0 {
            break;
        }
        let mut row = data[pos..pos + available].to_vec();
        pos += available;

        for i in 0..row.len() {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };
            row[i] = match filter_type {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(PdfError::InvalidFilterData {
                        message: format!("invalid PNG predictor row type: {other}"),
                        partial: result,
                    })
                }
            };
        }

        result.extend_from_slice(&row);
        previous[..row.len()].copy_from_slice(&row);
    }
    Ok(result)
}

/// Apply the predictor transform ahead of compression.
fn apply_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let (row_len, bpp) = row_geometry(params)?;

    if params.predictor == 2 {
        if params.bits_per_component != 8 {
            return Err(PdfError::InvalidStreamObject(format!(
                "TIFF predictor with {} bits per component not supported",
                params.bits_per_component
            )));
        }
        let mut result = data.to_vec();
        for row in result.chunks_mut(row_len) {
            for i in (bpp..row.len()).rev() {
                row[i] = row[i].wrapping_sub(row[i - bpp]);
            }
        }
        return Ok(result);
    }

    let filter_type: u8 = match params.predictor {
        10 => 0,
        11 => 1,
        12 => 2,
        13 => 3,
        14 | 15 => 4,
        other => {
            return Err(PdfError::InvalidStreamObject(format!(
                "unsupported predictor: {other}"
            )))
        }
    };

    let mut result = Vec::with_capacity(data.len() + data.len() / row_len + 1);
    let mut previous = vec![0u8; row_len];

    for row in data.chunks(row_len) {
        result.push(filter_type);
        for i in 0..row.len() {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };
            let encoded = match filter_type {
                0 => row[i],
                1 => row[i].wrapping_sub(left),
                2 => row[i].wrapping_sub(up),
                3 => row[i].wrapping_sub(((left as u16 + up as u16) / 2) as u8),
                _ => row[i].wrapping_sub(paeth(left, up, up_left)),
            };
            result.push(encoded);
        }
        previous[..row.len()].copy_from_slice(row);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_names() {
        assert_eq!(Filter::from_name("FlateDecode"), Some(Filter::FlateDecode));
        assert_eq!(Filter::from_name("Fl"), Some(Filter::FlateDecode));
        assert_eq!(Filter::from_name("AHx"), Some(Filter::ASCIIHexDecode));
        assert_eq!(Filter::from_name("A85"), Some(Filter::ASCII85Decode));
        assert_eq!(Filter::from_name("RL"), Some(Filter::RunLengthDecode));
        assert_eq!(Filter::from_name("LZW"), Some(Filter::LZWDecode));
        assert_eq!(Filter::from_name("DCTDecode"), None);
        assert_eq!(Filter::LZWDecode.pdf_name(), "LZWDecode");
    }

    #[test]
    fn test_ascii_hex_decode() {
        let params = DecodeParams::default();
        assert_eq!(
            decode(Filter::ASCIIHexDecode, b"48 65 6C6C 6F>", &params).unwrap(),
            b"Hello"
        );
        // Odd digit count pads with zero.
        assert_eq!(
            decode(Filter::ASCIIHexDecode, b"7>", &params).unwrap(),
            vec![0x70]
        );
    }

    #[test]
    fn test_ascii_hex_round_trip() {
        let params = DecodeParams::default();
        let data = b"binary \x00\xff data".to_vec();
        let encoded = encode(Filter::ASCIIHexDecode, &data, &params).unwrap();
        assert_eq!(*encoded.last().unwrap(), b'>');
        assert_eq!(decode(Filter::ASCIIHexDecode, &encoded, &params).unwrap(), data);
    }

    #[test]
    fn test_ascii_hex_partial_output_on_error() {
        let params = DecodeParams::default();
        let err = decode(Filter::ASCIIHexDecode, b"4865XY", &params).unwrap_err();
        match err {
            PdfError::InvalidFilterData { partial, .. } => assert_eq!(partial, b"He"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ascii85_round_trip() {
        let params = DecodeParams::default();
        for data in [
            b"Man is distinguished".to_vec(),
            b"x".to_vec(),
            b"ab".to_vec(),
            vec![0, 0, 0, 0, 1],
        ] {
            let encoded = encode(Filter::ASCII85Decode, &data, &params).unwrap();
            assert!(encoded.ends_with(b"~>"));
            assert_eq!(decode(Filter::ASCII85Decode, &encoded, &params).unwrap(), data);
        }
    }

    #[test]
    fn test_ascii85_z_shortcut() {
        let params = DecodeParams::default();
        assert_eq!(
            decode(Filter::ASCII85Decode, b"z~>", &params).unwrap(),
            vec![0, 0, 0, 0]
        );
    }

    #[test]
    fn test_run_length_round_trip() {
        let params = DecodeParams::default();
        let data = b"aaaaaaaabcdefffffffffffg".to_vec();
        let encoded = encode(Filter::RunLengthDecode, &data, &params).unwrap();
        assert_eq!(*encoded.last().unwrap(), 128);
        assert!(encoded.len() < data.len() + 2);
        assert_eq!(
            decode(Filter::RunLengthDecode, &encoded, &params).unwrap(),
            data
        );
    }

    #[test]
    fn test_run_length_truncated_keeps_partial() {
        let params = DecodeParams::default();
        // Literal of 4 bytes announced, only 2 present after a good run.
        let err = decode(Filter::RunLengthDecode, &[255, b'x', 3, b'a', b'b'], &params).unwrap_err();
        match err {
            PdfError::InvalidFilterData { partial, .. } => assert_eq!(partial, b"xxx"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_flate_round_trip() {
        let params = DecodeParams::default();
        let data = b"stream content stream content stream content".to_vec();
        let encoded = encode(Filter::FlateDecode, &data, &params).unwrap();
        assert_ne!(encoded, data);
        assert_eq!(decode(Filter::FlateDecode, &encoded, &params).unwrap(), data);
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_flate_deterministic_reencode() {
        let params = DecodeParams::default();
        let data = b"determinism check".repeat(16);
        let once = encode(Filter::FlateDecode, &data, &params).unwrap();
        let decoded = decode(Filter::FlateDecode, &once, &params).unwrap();
        let twice = encode(Filter::FlateDecode, &decoded, &params).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_lzw_round_trip() {
        let params = DecodeParams::default();
        let data = b"TOBEORNOTTOBEORTOBEORNOT".to_vec();
        let encoded = encode(Filter::LZWDecode, &data, &params).unwrap();
        assert_eq!(decode(Filter::LZWDecode, &encoded, &params).unwrap(), data);
    }

    #[test]
    fn test_png_up_predictor_round_trip() {
        let params = DecodeParams {
            predictor: 12,
            colors: 1,
            bits_per_component: 8,
            columns: 4,
            ..DecodeParams::default()
        };
        let data: Vec<u8> = (0u8..16).collect();
        let packed = encode(Filter::LZWDecode, &data, &params).unwrap();
        assert_eq!(decode(Filter::LZWDecode, &packed, &params).unwrap(), data);
    }

    #[test]
    fn test_tiff_predictor_round_trip() {
        let params = DecodeParams {
            predictor: 2,
            colors: 3,
            bits_per_component: 8,
            columns: 2,
            ..DecodeParams::default()
        };
        let data: Vec<u8> = vec![10, 20, 30, 13, 24, 35, 1, 2, 3, 4, 5, 6];
        let packed = encode(Filter::LZWDecode, &data, &params).unwrap();
        assert_eq!(decode(Filter::LZWDecode, &packed, &params).unwrap(), data);
    }
}
