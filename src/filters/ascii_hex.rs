//! ASCIIHexDecode.
//!
//! Pairs of hex digits, whitespace ignored, `>` ends the data. An odd final
//! digit is completed with an implicit `0`.

use super::StreamFilter;
use crate::error::{Error, Result};
use crate::object::Dictionary;

/// ASCIIHexDecode filter implementation.
pub struct AsciiHexFilter;

impl StreamFilter for AsciiHexFilter {
    fn name(&self) -> &'static str {
        "ASCIIHexDecode"
    }

    fn decode(&self, input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 2);
        let mut high: Option<u8> = None;

        for &c in input {
            if c == b'>' {
                break;
            }
            if c.is_ascii_whitespace() || c == 0 {
                continue;
            }
            let nibble = hex_digit_to_value(c).ok_or_else(|| {
                Error::decode("ASCIIHexDecode", format!("invalid hex digit '{}'", c as char))
            })?;
            match high.take() {
                Some(h) => output.push(h << 4 | nibble),
                None => high = Some(nibble),
            }
        }

        if let Some(h) = high {
            output.push(h << 4);
        }

        Ok(output)
    }

    fn encode(&self, input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        let mut output = Vec::with_capacity(input.len() * 2 + input.len() / 32 + 1);
        for (i, &byte) in input.iter().enumerate() {
            if i > 0 && i % 32 == 0 {
                output.push(b'\n');
            }
            output.push(HEX[usize::from(byte >> 4)]);
            output.push(HEX[usize::from(byte & 0x0F)]);
        }
        output.push(b'>');
        Ok(output)
    }
}

fn hex_digit_to_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}
