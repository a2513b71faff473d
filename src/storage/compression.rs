//! Streaming zlib decompression for table values.

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{ApiaryError, Result};

/// Minimum spare output capacity to offer the decompressor per call.
const OUT_CHUNK: usize = 4096;

/// A reusable streaming decompressor.
///
/// One stream is owned per cursor and reset with [`decompress_start`]
/// before each compressed value, so no allocation happens per value beyond
/// growing the caller's output buffer.
///
/// [`decompress_start`]: CompressionStream::decompress_start
pub struct CompressionStream {
    inflate: Decompress,
}

impl CompressionStream {
    pub fn new() -> Self {
        Self {
            inflate: Decompress::new(true),
        }
    }

    /// Reset state ready for a new compressed stream.
    pub fn decompress_start(&mut self) {
        self.inflate.reset(true);
    }

    /// Feed `input`, appending decompressed bytes to `out`.
    ///
    /// Returns `true` once the compressed stream is complete. A `false`
    /// return after the final chunk of input means the stream was truncated;
    /// callers treat that as data corruption.
    pub fn decompress_chunk(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<bool> {
        let start_in = self.inflate.total_in();
        loop {
            if out.capacity() - out.len() < OUT_CHUNK {
                out.reserve(OUT_CHUNK);
            }
            let consumed = (self.inflate.total_in() - start_in) as usize;
            let before_out = self.inflate.total_out();
            let status = self
                .inflate
                .decompress_vec(&input[consumed..], out, FlushDecompress::None)
                .map_err(|e| ApiaryError::corrupt(format!("zlib decompression failed: {e}")))?;
            match status {
                Status::StreamEnd => return Ok(true),
                Status::BufError => return Ok(false),
                Status::Ok => {
                    let all_consumed =
                        (self.inflate.total_in() - start_in) as usize == input.len();
                    if all_consumed && self.inflate.total_out() == before_out {
                        return Ok(false);
                    }
                }
            }
        }
    }
}

impl Default for CompressionStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_single_chunk() {
        let plain = vec![b'x'; 10_000];
        let packed = compress(&plain);
        assert!(packed.len() < plain.len());

        let mut stream = CompressionStream::new();
        stream.decompress_start();
        let mut out = Vec::new();
        assert!(stream.decompress_chunk(&packed, &mut out).unwrap());
        assert_eq!(out, plain);
    }

    #[test]
    fn test_split_chunks() {
        let plain: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        let packed = compress(&plain);
        let mid = packed.len() / 2;

        let mut stream = CompressionStream::new();
        stream.decompress_start();
        let mut out = Vec::new();
        assert!(!stream.decompress_chunk(&packed[..mid], &mut out).unwrap());
        assert!(stream.decompress_chunk(&packed[mid..], &mut out).unwrap());
        assert_eq!(out, plain);
    }

    #[test]
    fn test_truncated_stream_does_not_complete() {
        let plain = vec![b'y'; 20_000];
        let packed = compress(&plain);

        let mut stream = CompressionStream::new();
        stream.decompress_start();
        let mut out = Vec::new();
        let done = stream
            .decompress_chunk(&packed[..packed.len() - 4], &mut out)
            .unwrap();
        assert!(!done);
    }

    #[test]
    fn test_stream_reuse_after_reset() {
        let a = compress(b"first value");
        let b = compress(b"second value");

        let mut stream = CompressionStream::new();
        stream.decompress_start();
        let mut out = Vec::new();
        assert!(stream.decompress_chunk(&a, &mut out).unwrap());
        assert_eq!(out, b"first value");

        stream.decompress_start();
        let mut out = Vec::new();
        assert!(stream.decompress_chunk(&b, &mut out).unwrap());
        assert_eq!(out, b"second value");
    }

    #[test]
    fn test_garbage_input_is_an_error() {
        let mut stream = CompressionStream::new();
        stream.decompress_start();
        let mut out = Vec::new();
        let result = stream.decompress_chunk(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00], &mut out);
        assert!(result.is_err());
    }
}
