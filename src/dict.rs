//! Length-prefixed UTF-16BE key/value tables used for project, scene, clip
//! and thumbnail metadata.

use crate::{binreader::ByteReader, error::FormatError};
use indexmap::IndexMap;

/// An ordered `key -> value` table, order-preserving like the source
/// stream (an [`IndexMap`] rather than a [`std::collections::HashMap`] so
/// metadata round-trips in declaration order, e.g. for display).
pub type Dict = IndexMap<String, String>;

/// Parses a dictionary blob: a u32 BE `field_count`, followed by
/// `field_count * 2` length-prefixed UTF-16BE strings forming interleaved
/// `(key, value)` pairs.
///
/// Values whose key starts with `History` are rot13-obfuscated in the
/// source stream and are decoded before being stored.
pub(crate) fn parse(data: &[u8]) -> Result<Dict, FormatError> {
    let mut reader = ByteReader::new(data);
    let field_count = reader.read_u32()? as usize;

    let mut dict = Dict::with_capacity(field_count);
    for _ in 0..field_count {
        let key = read_utf16_string(&mut reader)?;
        let mut value = read_utf16_string(&mut reader)?;
        if key.starts_with("History") {
            value = rot13(&value);
        }
        dict.insert(key, value);
    }

    Ok(dict)
}

fn read_utf16_string(reader: &mut ByteReader<'_>) -> Result<String, FormatError> {
    let length_in_code_units = reader.read_u16()? as usize;
    let bytes = reader.read_bytes(length_in_code_units * 2)?;

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    String::from_utf16(&units).map_err(|_| FormatError::InvalidUtf16)
}

fn rot13(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a' + 13) % 26) + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A' + 13) % 26) + b'A') as char,
            other => other,
        })
        .collect()
}
