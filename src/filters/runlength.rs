//! RunLengthDecode.
//!
//! - Length byte 0-127: copy the next N+1 bytes literally
//! - Length byte 128: end of data
//! - Length byte 129-255: repeat the next byte 257-N times

use super::StreamFilter;
use crate::error::{Error, Result};
use crate::object::Dictionary;

/// RunLengthDecode filter implementation.
pub struct RunLengthFilter;

impl StreamFilter for RunLengthFilter {
    fn name(&self) -> &'static str {
        "RunLengthDecode"
    }

    fn decode(&self, input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut i = 0;

        while i < input.len() {
            let length = input[i];
            i += 1;

            match length {
                0..=127 => {
                    let count = usize::from(length) + 1;
                    let literal = input.get(i..i + count).ok_or_else(|| {
                        Error::decode(
                            "RunLengthDecode",
                            format!("literal run needs {} bytes, {} left", count, input.len() - i),
                        )
                    })?;
                    output.extend_from_slice(literal);
                    i += count;
                },
                128 => break,
                129..=255 => {
                    let byte = *input
                        .get(i)
                        .ok_or_else(|| Error::decode("RunLengthDecode", "missing byte for run"))?;
                    i += 1;
                    output.resize(output.len() + 257 - usize::from(length), byte);
                },
            }
        }

        Ok(output)
    }

    fn encode(&self, input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() + input.len() / 128 + 2);
        let mut literal_start = 0;
        let mut i = 0;

        while i < input.len() {
            let run = input[i..].iter().take(128).take_while(|&&b| b == input[i]).count();
            if run >= 2 {
                flush_literal(&mut output, &input[literal_start..i]);
                output.push((257 - run) as u8);
                output.push(input[i]);
                i += run;
                literal_start = i;
            } else {
                i += 1;
            }
        }
        flush_literal(&mut output, &input[literal_start..]);

        output.push(128);
        Ok(output)
    }
}

fn flush_literal(output: &mut Vec<u8>, literal: &[u8]) {
    for chunk in literal.chunks(128) {
        output.push((chunk.len() - 1) as u8);
        output.extend_from_slice(chunk);
    }
}
