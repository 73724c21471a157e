//! LZWDecode.
//!
//! PDF's LZW uses MSB-first codes starting at 9 bits, clear code 256 and EOD
//! code 257. With `/EarlyChange 1` (the default) the code width grows one code
//! early, which is what TIFF does, so weezl's TIFF size switch matches it.

use super::predictor::{self, PredictorParams};
use super::{param_int, StreamFilter};
use crate::error::{Error, Result};
use crate::object::Dictionary;
use weezl::{decode::Decoder, encode::Encoder, BitOrder};

/// LZWDecode filter implementation.
pub struct LzwFilter;

impl StreamFilter for LzwFilter {
    fn name(&self) -> &'static str {
        "LZWDecode"
    }

    fn decode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let early_change = param_int(params, "EarlyChange", 1) != 0;
        let mut decoder = if early_change {
            Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
        } else {
            Decoder::new(BitOrder::Msb, 8)
        };

        let decoded = match decoder.decode(input) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Weezl LZW decode failed: {:?}, falling back to table decoder", e);
                decode_with_table(input, early_change)?
            },
        };

        predictor::decode(decoded, &PredictorParams::from_params(params))
    }

    fn encode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let predicted = predictor::encode(input, &PredictorParams::from_params(params))?;
        let mut encoder = if param_int(params, "EarlyChange", 1) != 0 {
            Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
        } else {
            Encoder::new(BitOrder::Msb, 8)
        };
        encoder
            .encode(&predicted)
            .map_err(|e| Error::decode("LZWDecode", format!("encoder error: {:?}", e)))
    }
}

const CLEAR_CODE: usize = 256;
const EOD_CODE: usize = 257;
const MAX_CODE_BITS: u32 = 12;

/// Straightforward table decoder. Tolerates streams weezl rejects, such as ones
/// without a leading clear code or with garbage after the last full code.
fn decode_with_table(input: &[u8], early_change: bool) -> Result<Vec<u8>> {
    let early = usize::from(early_change);
    let mut table: Vec<Vec<u8>> = fresh_table();
    let mut reader = BitReader::new(input);
    let mut code_bits = 9;
    let mut prev: Option<usize> = None;
    let mut output = Vec::new();

    while let Some(code) = reader.read(code_bits) {
        if code == CLEAR_CODE {
            table = fresh_table();
            code_bits = 9;
            prev = None;
            continue;
        }
        if code == EOD_CODE {
            break;
        }

        let entry = match (table.get(code), prev) {
            (Some(entry), _) => entry.clone(),
            (None, Some(p)) if code == table.len() => {
                let mut entry = table[p].clone();
                entry.push(table[p][0]);
                entry
            },
            _ => {
                return Err(Error::decode(
                    "LZWDecode",
                    format!("invalid code {} (table size {}, {} bits)", code, table.len(), code_bits),
                ))
            },
        };

        output.extend_from_slice(&entry);

        if let Some(p) = prev {
            if table.len() < 1 << MAX_CODE_BITS {
                let mut new_entry = table[p].clone();
                new_entry.push(entry[0]);
                table.push(new_entry);
            }
        }
        prev = Some(code);

        if code_bits < MAX_CODE_BITS && table.len() + early >= 1 << code_bits {
            code_bits += 1;
        }
    }

    Ok(output)
}

/// Single-byte strings plus placeholders for the clear and EOD codes.
fn fresh_table() -> Vec<Vec<u8>> {
    let mut table: Vec<Vec<u8>> = (0..=255u8).map(|b| vec![b]).collect();
    table.push(Vec::new());
    table.push(Vec::new());
    table
}

/// MSB-first bit reader.
struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    fn read(&mut self, n: u32) -> Option<usize> {
        let n = n as usize;
        if self.bit_pos + n > self.data.len() * 8 {
            return None;
        }
        let mut value = 0usize;
        for _ in 0..n {
            let byte = self.data[self.bit_pos / 8];
            let bit = (byte >> (7 - self.bit_pos % 8)) & 1;
            value = value << 1 | usize::from(bit);
            self.bit_pos += 1;
        }
        Some(value)
    }
}
