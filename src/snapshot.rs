//! Snapshot encoding for collection persistence.
//!
//! A snapshot file is laid out as
//!
//! ```text
//! [version: u8][crc32(payload): u32 LE][payload]
//! ```
//!
//! where `payload` is the zlib-compressed bincode encoding of the collection's
//! documents in insertion order. Any failure while unwrapping one of these
//! layers is reported as [`TesseraError::CorruptSnapshot`].

use std::io::{Read, Write};

use bincode::Options;
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::document::Document;
use crate::error::{Result, TesseraError};

/// Current snapshot format version.
pub const SNAPSHOT_FORMAT_VERSION: u8 = 1;

/// Size of the frame header (version byte + checksum).
pub const SNAPSHOT_HEADER_LEN: usize = 5;

/// Default zlib compression level.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Encoder/decoder for collection snapshots.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotCodec {
    compression: Compression,
}

impl Default for SnapshotCodec {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl SnapshotCodec {
    /// Create a codec compressing at `level` (0-9, clamped).
    pub fn new(level: u32) -> Self {
        SnapshotCodec {
            compression: Compression::new(level.min(9)),
        }
    }

    /// Serialize documents in the given order.
    pub fn encode(documents: &[Document]) -> Result<Vec<u8>> {
        bincode::options()
            .serialize(documents)
            .map_err(|e| TesseraError::other(format!("Failed to encode snapshot: {e}")))
    }

    /// Deserialize documents produced by [`SnapshotCodec::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Vec<Document>> {
        bincode::options()
            .reject_trailing_bytes()
            .deserialize(bytes)
            .map_err(|e| TesseraError::corrupt_snapshot(format!("Failed to decode documents: {e}")))
    }

    /// Compress a byte stream with zlib.
    pub fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(bytes.len() / 2), self.compression);
        encoder.write_all(bytes)?;
        Ok(encoder.finish()?)
    }

    /// Decompress a zlib byte stream.
    pub fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(bytes);
        let mut buffer = Vec::new();
        decoder
            .read_to_end(&mut buffer)
            .map_err(|e| TesseraError::corrupt_snapshot(format!("Failed to decompress: {e}")))?;
        Ok(buffer)
    }

    /// Encode, compress and frame documents into the on-disk representation.
    pub fn to_bytes(&self, documents: &[Document]) -> Result<Vec<u8>> {
        let encoded = Self::encode(documents)?;
        let compressed = self.compress(&encoded)?;
        write_frame(&compressed)
    }

    /// Inverse of [`SnapshotCodec::to_bytes`].
    pub fn from_bytes(&self, bytes: &[u8]) -> Result<Vec<Document>> {
        let payload = read_frame(bytes)?;
        let encoded = self.decompress(payload)?;
        Self::decode(&encoded)
    }
}

/// Prefix `payload` with the format version and its checksum.
pub fn write_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let mut framed = Vec::with_capacity(SNAPSHOT_HEADER_LEN + payload.len());
    framed.write_u8(SNAPSHOT_FORMAT_VERSION)?;
    framed.write_u32::<LittleEndian>(crc32fast::hash(payload))?;
    framed.extend_from_slice(payload);
    Ok(framed)
}

/// Validate the frame header and return the payload.
pub fn read_frame(bytes: &[u8]) -> Result<&[u8]> {
    if bytes.len() < SNAPSHOT_HEADER_LEN {
        return Err(TesseraError::corrupt_snapshot(format!(
            "snapshot is {} bytes, shorter than its header",
            bytes.len()
        )));
    }

    let version = bytes[0];
    if version != SNAPSHOT_FORMAT_VERSION {
        return Err(TesseraError::corrupt_snapshot(format!(
            "unsupported snapshot version {version} (expected {SNAPSHOT_FORMAT_VERSION})"
        )));
    }

    let expected = LittleEndian::read_u32(&bytes[1..SNAPSHOT_HEADER_LEN]);
    let payload = &bytes[SNAPSHOT_HEADER_LEN..];
    let actual = crc32fast::hash(payload);
    if expected != actual {
        return Err(TesseraError::corrupt_snapshot(format!(
            "checksum mismatch: expected {expected:08x}, found {actual:08x}"
        )));
    }

    Ok(payload)
}
