//! Inflates a `ZCHK` blob into a plain image payload plus its inner tag.

use crate::{binreader::ByteReader, error::FormatError};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// The inner chunk this `ZCHK` wrapped, and its decompressed payload (with
/// the 8-byte inner tag+size header already stripped).
pub(crate) struct Inflated {
    pub(crate) tag: [u8; 4],
    pub(crate) payload: Vec<u8>,
}

/// Decompresses a `ZCHK` blob: a 20-byte outer header (`num_blocks` as a u32
/// BE at offset 16) followed by `num_blocks` zlib streams, each with its own
/// 12-byte block header (4 reserved bytes, `uncompressed_size`,
/// `compressed_size`).
pub(crate) fn inflate(data: &[u8]) -> Result<Inflated, FormatError> {
    let mut reader = ByteReader::new(data);
    reader.skip(16)?;
    let num_blocks = reader.read_u32()?;

    let mut output = Vec::new();
    for _ in 0..num_blocks {
        reader.skip(4)?;
        let uncompressed_size = reader.read_u32()? as usize;
        let compressed_size = reader.read_u32()? as usize;
        let compressed = reader.read_bytes(compressed_size)?;

        let before = output.len();
        ZlibDecoder::new(compressed)
            .read_to_end(&mut output)
            .map_err(|err| FormatError::Inflate(err.to_string()))?;

        if output.len() - before != uncompressed_size {
            return Err(FormatError::Inflate(format!(
                "block declared {uncompressed_size} bytes, inflated to {}",
                output.len() - before
            )));
        }
    }

    if output.len() < 8 {
        return Err(FormatError::TruncatedChunk {
            needed: 8,
            available: output.len(),
        });
    }

    let mut tag = [0u8; 4];
    tag.copy_from_slice(&output[0..4]);
    // bytes [4..8] are the inner chunk's declared size; the payload that
    // follows is self-delimiting (DBOD/SRAW consume exactly what they need),
    // so it is not re-validated here.
    let payload = output.split_off(8);

    Ok(Inflated { tag, payload })
}
