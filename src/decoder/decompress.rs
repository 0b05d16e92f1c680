use miniz_oxide::inflate::{decompress_to_vec_zlib_with_limit, TINFLStatus};
use thiserror::Error;

/// Limit the output size after decompression to 5 MB.
///
/// Upper bound for legitimate certificates: QR codes hold < 4500 alphanumeric
/// chars, base45 encodes 2 bytes into 3 chars, and zlib compresses at most
/// ~1000:1. Anything past the limit is a decompression bomb, so the inflater
/// checks the ceiling while producing output rather than after the fact.
pub const MAX_DECOMPRESSED_SIZE: usize = 5 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("deflate stream is malformed")]
    Malformed,
    #[error("decompressed output exceeds {MAX_DECOMPRESSED_SIZE} bytes")]
    TooLarge,
}

pub fn decode(input: &[u8]) -> Result<Vec<u8>, Error> {
    decompress_to_vec_zlib_with_limit(input, MAX_DECOMPRESSED_SIZE).map_err(|e| match e.status {
        TINFLStatus::HasMoreOutput => Error::TooLarge,
        _ => Error::Malformed,
    })
}
