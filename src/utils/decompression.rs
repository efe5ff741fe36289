//! Gzip detection and decompression for XMLTV documents
//!
//! XMLTV feeds are frequently served gzipped without a content-encoding
//! header, so detection goes by the magic bytes as well.

use std::io::Read;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;

/// Gzip magic bytes `1F 8B`.
pub fn looks_gzipped(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

/// Decompress `data` when it is gzipped, pass it through otherwise.
pub fn maybe_gunzip(data: Vec<u8>) -> Result<Vec<u8>> {
    if !looks_gzipped(&data) {
        return Ok(data);
    }
    let mut decoder = GzDecoder::new(data.as_slice());
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .context("Failed to decompress gzip data")?;
    Ok(decompressed)
}
