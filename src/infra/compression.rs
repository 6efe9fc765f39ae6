//! Zlib helpers for loose object storage.

use miniz_oxide::inflate::TINFLStatus;

use crate::error::{Error, Result};

/// Default zlib level used by git for loose objects.
const LEVEL: u8 = 6;

/// Compresses a loose object payload with zlib framing.
pub fn compress(data: &[u8]) -> Vec<u8> {
    miniz_oxide::deflate::compress_to_vec_zlib(data, LEVEL)
}

/// Inflates a complete zlib stream.
///
/// # Errors
///
/// Returns `Error::DecompressionFailed` when the stream is empty, carries a
/// bad zlib header, or is corrupted or truncated.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    check_header(data)?;
    miniz_oxide::inflate::decompress_to_vec_zlib(data).map_err(|_| Error::DecompressionFailed)
}

/// Inflates at most `limit` bytes of a zlib stream.
///
/// A stream longer than `limit` is not an error: the first `limit` bytes
/// come back. This is how object headers are peeked without loading blob
/// bodies.
pub fn inflate_prefix(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    check_header(data)?;
    match miniz_oxide::inflate::decompress_to_vec_zlib_with_limit(data, limit) {
        Ok(out) => Ok(out),
        Err(err) if err.status == TINFLStatus::HasMoreOutput => Ok(err.output),
        Err(_) => Err(Error::DecompressionFailed),
    }
}

fn check_header(data: &[u8]) -> Result<()> {
    match data {
        [cmf, flg, ..] if is_valid_zlib_header(*cmf, *flg) => Ok(()),
        _ => Err(Error::DecompressionFailed),
    }
}

/// CM must be 8 (deflate), CINFO at most 7, and `CMF*256 + FLG` a multiple of 31.
fn is_valid_zlib_header(cmf: u8, flg: u8) -> bool {
    let method = cmf & 0x0F;
    let window = cmf >> 4;
    method == 8 && window <= 7 && (u16::from(cmf) * 256 + u16::from(flg)) % 31 == 0
}
