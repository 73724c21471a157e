//! FlateDecode (zlib/deflate).
//!
//! Encoding uses flate2's zlib encoder. Decoding tries flate2 first and falls back
//! through increasingly forgiving decoders, because damaged zlib headers and
//! truncated streams are common in real files.

use super::predictor::{self, PredictorParams};
use super::StreamFilter;
use crate::error::{Error, Result};
use crate::object::Dictionary;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use inflate::inflate_bytes_zlib;
use libflate::zlib::Decoder as LibflateDecoder;
use std::io::{Read, Write};

/// FlateDecode filter implementation.
pub struct FlateFilter;

impl StreamFilter for FlateFilter {
    fn name(&self) -> &'static str {
        "FlateDecode"
    }

    fn decode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let inflated = inflate(input)?;
        predictor::decode(inflated, &PredictorParams::from_params(params))
    }

    fn encode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let predicted = predictor::encode(input, &PredictorParams::from_params(params))?;
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(predicted.len() / 2), Compression::default());
        encoder.write_all(&predicted)?;
        Ok(encoder.finish()?)
    }
}

/// Read a decoder to the end; keep whatever came out before an error.
fn drain<R: Read>(mut reader: R) -> (Vec<u8>, Option<std::io::Error>) {
    let mut output = Vec::new();
    match reader.read_to_end(&mut output) {
        Ok(_) => (output, None),
        Err(e) => (output, Some(e)),
    }
}

fn inflate(input: &[u8]) -> Result<Vec<u8>> {
    // Strategy 1: standard zlib
    let (output, zlib_err) = drain(ZlibDecoder::new(input));
    let zlib_err = match zlib_err {
        None => return Ok(output),
        Some(e) if !output.is_empty() => {
            log::warn!("FlateDecode partial recovery: {} bytes before corruption: {}", output.len(), e);
            return Ok(output);
        },
        Some(e) => e,
    };

    // Strategy 2: raw deflate (no zlib wrapper), then deflate after a corrupt 2-byte header
    log::info!("Zlib decode failed ({}), trying raw deflate", zlib_err);
    for skip in [0usize, 2] {
        if input.len() <= skip {
            break;
        }
        let (output, err) = drain(DeflateDecoder::new(&input[skip..]));
        if !output.is_empty() {
            match err {
                None => log::info!("Raw deflate recovery (skip {}) succeeded: {} bytes", skip, output.len()),
                Some(_) => log::warn!("Raw deflate partial recovery (skip {}): {} bytes", skip, output.len()),
            }
            return Ok(output);
        }
    }

    // Strategy 3: the inflate crate
    match inflate_bytes_zlib(input) {
        Ok(data) => {
            log::info!("Inflate crate recovery succeeded: {} bytes", data.len());
            return Ok(data);
        },
        Err(e) => log::info!("Inflate crate failed: {}", e),
    }

    // Strategy 4: libflate
    if let Ok(decoder) = LibflateDecoder::new(input) {
        let (output, _) = drain(decoder);
        if !output.is_empty() {
            log::warn!("Libflate recovery: {} bytes", output.len());
            return Ok(output);
        }
    }

    log::error!("All FlateDecode recovery strategies failed ({} input bytes)", input.len());
    Err(Error::decode(
        "FlateDecode",
        format!("cannot decompress {} bytes: {}", input.len(), zlib_err),
    ))
}
