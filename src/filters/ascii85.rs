//! ASCII85Decode (Base85).
//!
//! Four bytes become five characters in `!`..=`u`; `z` abbreviates four zero
//! bytes and `~>` ends the data.

use super::StreamFilter;
use crate::error::{Error, Result};
use crate::object::Dictionary;

/// ASCII85Decode filter implementation.
pub struct Ascii85Filter;

impl StreamFilter for Ascii85Filter {
    fn name(&self) -> &'static str {
        "ASCII85Decode"
    }

    fn decode(&self, input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        // Some producers keep the Adobe "<~" prefix
        let input = input.strip_prefix(b"<~").unwrap_or(input);
        let mut output = Vec::with_capacity(input.len() * 4 / 5);
        let mut acc: u64 = 0;
        let mut count = 0;

        for &byte in input {
            match byte {
                b'~' => break,
                b'z' if count == 0 => output.extend_from_slice(&[0, 0, 0, 0]),
                b'z' => {
                    return Err(Error::decode("ASCII85Decode", "'z' inside a group"));
                },
                b'!'..=b'u' => {
                    acc = acc * 85 + u64::from(byte - b'!');
                    count += 1;
                    if count == 5 {
                        output.extend_from_slice(&group_bytes(acc)?);
                        acc = 0;
                        count = 0;
                    }
                },
                _ if byte.is_ascii_whitespace() || byte == 0 => {},
                _ => {
                    return Err(Error::decode(
                        "ASCII85Decode",
                        format!("invalid character 0x{:02X}", byte),
                    ));
                },
            }
        }

        match count {
            0 => {},
            1 => return Err(Error::decode("ASCII85Decode", "final group has a single character")),
            _ => {
                // Pad with 'u' and keep count - 1 bytes
                for _ in count..5 {
                    acc = acc * 85 + 84;
                }
                output.extend_from_slice(&group_bytes(acc)?[..count - 1]);
            },
        }

        Ok(output)
    }

    fn encode(&self, input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() * 5 / 4 + 4);

        for chunk in input.chunks(4) {
            let mut group = [0u8; 4];
            group[..chunk.len()].copy_from_slice(chunk);
            let mut value = u32::from_be_bytes(group);

            if chunk.len() == 4 && value == 0 {
                output.push(b'z');
                continue;
            }

            let mut digits = [0u8; 5];
            for digit in digits.iter_mut().rev() {
                *digit = (value % 85) as u8 + b'!';
                value /= 85;
            }
            output.extend_from_slice(&digits[..chunk.len() + 1]);
        }

        output.extend_from_slice(b"~>");
        Ok(output)
    }
}

fn group_bytes(acc: u64) -> Result<[u8; 4]> {
    u32::try_from(acc)
        .map(u32::to_be_bytes)
        .map_err(|_| Error::decode("ASCII85Decode", "group value exceeds 2^32"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii85_decode_known_value() {
        assert_eq!(Ascii85Filter.decode(b"87cURD]i,\"Ebo80~>", None).unwrap(), b"Hello World!");
    }

    #[test]
    fn test_ascii85_z_shortcut() {
        assert_eq!(Ascii85Filter.decode(b"z~>", None).unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(Ascii85Filter.encode(&[0, 0, 0, 0], None).unwrap(), b"z~>");
    }

    #[test]
    fn test_ascii85_whitespace_and_prefix() {
        assert_eq!(Ascii85Filter.decode(b"<~87cUR\nD]i,\"Ebo80~>", None).unwrap(), b"Hello World!");
    }

    #[test]
    fn test_ascii85_partial_group_roundtrip() {
        for len in 0..9 {
            let data: Vec<u8> = (0..len as u8).map(|b| b.wrapping_mul(97)).collect();
            let encoded = Ascii85Filter.encode(&data, None).unwrap();
            assert_eq!(Ascii85Filter.decode(&encoded, None).unwrap(), data, "length {}", len);
        }
    }

    #[test]
    fn test_ascii85_errors() {
        assert!(Ascii85Filter.decode(b"ab{cd~>", None).is_err());
        assert!(Ascii85Filter.decode(b"abzcd~>", None).is_err());
        assert!(Ascii85Filter.decode(b"a~>", None).is_err());
        assert!(Ascii85Filter.decode(b"uuuuu~>", None).is_err());
    }
}
