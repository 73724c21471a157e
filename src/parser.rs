//! PDF object parser.
//!
//! Recursive descent over lexer tokens:
//! 1. read a token;
//! 2. primitives map directly to an [`Object`];
//! 3. arrays and dictionaries recurse, bounded by
//!    [`ParserOptions::max_nesting`];
//! 4. a dictionary followed by `stream` becomes a stream object whose payload is
//!    located by [`locate_stream_payload`].
//!
//! The nom entry point [`parse_object`] parses direct values. Indirect objects
//! (`N G obj ... endobj`) at a known byte offset go through
//! [`parse_indirect_object`], which reports errors with the absolute offset.

use crate::error::{Error, Result};
use crate::lexer::{is_whitespace, token, Token};
use crate::object::{Dictionary, Object, ObjectRef, StreamState};
use crate::parser_config::ParserOptions;
use bytes::Bytes;
use nom::IResult;

/// Decode escape sequences in a literal string (ISO 32000-1, 7.3.4.2).
///
/// Handles `\n \r \t \b \f \( \) \\`, 1-3 digit octal escapes and line
/// continuations. Unknown escapes drop the backslash.
///
/// ```
/// # use pdf_graph::parser::decode_literal_string_escapes;
/// assert_eq!(decode_literal_string_escapes(b"Section \\247 71.01"), b"Section \xa7 71.01");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let c = raw[i];
        if c != b'\\' || i + 1 >= raw.len() {
            if c != b'\\' {
                out.push(c);
            }
            i += 1;
            continue;
        }

        let next = raw[i + 1];
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'(' | b')' | b'\\' => out.push(next),
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut value = u32::from(next - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        },
                        _ => break,
                    }
                }
                out.push((value & 0xFF) as u8);
            },
            other => out.push(other),
        }
    }

    out
}

/// Decode the body of a hex string. Whitespace is ignored and an odd final digit
/// is padded with 0.
///
/// ```
/// # use pdf_graph::parser::decode_hex;
/// assert_eq!(decode_hex(b"48656C6C6F").unwrap(), b"Hello");
/// assert_eq!(decode_hex(b"901FA").unwrap(), vec![0x90, 0x1F, 0xA0]);
/// ```
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(hex_bytes.len() / 2 + 1);
    let mut pending: Option<u8> = None;

    for (pos, &c) in hex_bytes.iter().enumerate() {
        if is_whitespace(c) {
            continue;
        }
        let nibble = (c as char)
            .to_digit(16)
            .ok_or_else(|| Error::parse(pos, format!("invalid hex digit '{}'", c as char)))?
            as u8;
        match pending.take() {
            Some(high) => out.push(high << 4 | nibble),
            None => pending = Some(nibble),
        }
    }
    if let Some(high) = pending {
        out.push(high << 4);
    }

    Ok(out)
}

/// Parse a direct PDF object from input bytes with lenient defaults.
///
/// ```
/// use pdf_graph::parser::parse_object;
///
/// let (_, obj) = parse_object(b"[ 1 2 /Name 4 0 R ]").unwrap();
/// assert_eq!(obj.as_array().unwrap().len(), 4);
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_object_with_options(input, &ParserOptions::default())
}

/// [`parse_object`] with explicit options.
pub fn parse_object_with_options<'a>(
    input: &'a [u8],
    options: &ParserOptions,
) -> IResult<&'a [u8], Object> {
    parse_value(input, 0, options)
}

fn nom_error(input: &[u8], kind: nom::error::ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

fn parse_value<'a>(
    input: &'a [u8],
    depth: usize,
    options: &ParserOptions,
) -> IResult<&'a [u8], Object> {
    if depth > options.max_nesting {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }

    let (rest, tok) = token(input)?;

    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string_escapes(raw)))),
        Token::HexString(raw) => match decode_hex(raw) {
            Ok(decoded) => Ok((rest, Object::String(decoded))),
            Err(_) => Err(nom_error(input, nom::error::ErrorKind::HexDigit)),
        },
        Token::Integer(n) => {
            // "n g R" is a reference; anything else leaves the integer alone
            if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if let (Ok(id), Ok(gen)) = (u32::try_from(n), u16::try_from(gen)) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(id, gen))));
                    }
                }
            }
            Ok((rest, Object::Integer(n)))
        },
        Token::ArrayStart => parse_array(rest, depth + 1, options),
        Token::DictStart => {
            let (after_dict, dict) = parse_dictionary(rest, depth + 1, options)?;
            match token(after_dict) {
                Ok((after_kw, Token::StreamStart)) => {
                    let (after_stream, data) = locate_stream_payload(after_kw, &dict, options)?;
                    Ok((
                        after_stream,
                        Object::Stream {
                            dict,
                            data: Bytes::copy_from_slice(data),
                            state: StreamState::Raw,
                        },
                    ))
                },
                _ => Ok((after_dict, Object::Dictionary(dict))),
            }
        },
        _ => Err(nom_error(input, nom::error::ErrorKind::Tag)),
    }
}

fn parse_array<'a>(
    input: &'a [u8],
    depth: usize,
    options: &ParserOptions,
) -> IResult<&'a [u8], Object> {
    let mut items = Vec::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((rest, Token::ArrayEnd)) => return Ok((rest, Object::Array(items))),
            Ok(_) => {
                let (rest, item) = parse_value(remaining, depth, options)?;
                items.push(item);
                remaining = rest;
            },
            // Unclosed array at end of input: keep what we have
            Err(_) if !options.strict && crate::lexer::skip_whitespace(remaining, 0) == remaining.len() => {
                return Ok((&remaining[remaining.len()..], Object::Array(items)));
            },
            Err(e) => return Err(e),
        }
    }
}

fn parse_dictionary<'a>(
    input: &'a [u8],
    depth: usize,
    options: &ParserOptions,
) -> IResult<&'a [u8], Dictionary> {
    let mut dict = Dictionary::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((rest, Token::DictEnd)) => return Ok((rest, dict)),
            Ok((rest, Token::Name(key))) => {
                // A key followed directly by ">>" has no value; PDF readers treat it as null
                if let Ok((after, Token::DictEnd)) = token(rest) {
                    if !options.strict {
                        return Ok((after, dict));
                    }
                }
                let (rest, value) = parse_value(rest, depth, options)?;
                // Null values are equivalent to an absent key
                if !value.is_null() {
                    dict.insert(key, value);
                }
                remaining = rest;
            },
            Ok(_) => return Err(nom_error(remaining, nom::error::ErrorKind::Tag)),
            Err(_) if !options.strict && crate::lexer::skip_whitespace(remaining, 0) == remaining.len() => {
                return Ok((&remaining[remaining.len()..], dict));
            },
            Err(e) => return Err(e),
        }
    }
}

/// Locate a stream payload. `input` starts right after the `stream` keyword.
///
/// The declared `/Length` wins only when it is a direct integer, the payload fits
/// in the input and `endstream` follows it (after optional whitespace). Otherwise
/// the payload runs up to the next `endstream`, minus the EOL marker before it.
/// Returns the input after `endstream` and the payload slice.
pub fn locate_stream_payload<'a>(
    input: &'a [u8],
    dict: &Dictionary,
    options: &ParserOptions,
) -> IResult<&'a [u8], &'a [u8]> {
    // The keyword is followed by CRLF or LF; a lone CR is tolerated
    let data = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    if let Some(length) = dict.get("Length").and_then(Object::as_integer) {
        if let Ok(length) = usize::try_from(length) {
            if let Some(after) = data.get(length..) {
                let ws = after.iter().take_while(|&&c| is_whitespace(c)).count();
                if after[ws..].starts_with(b"endstream") {
                    return Ok((&after[ws + b"endstream".len()..], &data[..length]));
                }
            }
            if options.strict || !options.allow_malformed_streams {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    data,
                    nom::error::ErrorKind::LengthValue,
                )));
            }
            log::warn!("Stream /Length {} does not end at 'endstream'; scanning for the keyword", length);
        }
    }

    match find_keyword(data, b"endstream") {
        Some(end) => {
            let mut payload_end = end;
            if data[..payload_end].ends_with(b"\r\n") {
                payload_end -= 2;
            } else if data[..payload_end].ends_with(b"\n") || data[..payload_end].ends_with(b"\r") {
                payload_end -= 1;
            }
            Ok((&data[end + b"endstream".len()..], &data[..payload_end]))
        },
        None => Err(nom_error(data, nom::error::ErrorKind::Eof)),
    }
}

/// Find the first occurrence of `keyword` in `haystack`.
pub(crate) fn find_keyword(haystack: &[u8], keyword: &[u8]) -> Option<usize> {
    haystack.windows(keyword.len()).position(|window| window == keyword)
}

/// Parse the indirect object (`N G obj ... endobj`) starting at `offset`.
///
/// Returns the object's identifier, its value and the number of bytes consumed.
pub fn parse_indirect_object(bytes: &[u8], offset: usize) -> Result<(ObjectRef, Object, usize)> {
    parse_indirect_object_with_options(bytes, offset, &ParserOptions::default())
}

/// [`parse_indirect_object`] with explicit options.
pub fn parse_indirect_object_with_options(
    bytes: &[u8],
    offset: usize,
    options: &ParserOptions,
) -> Result<(ObjectRef, Object, usize)> {
    let input = bytes.get(offset..).ok_or(Error::UnexpectedEof)?;
    let position = |rest: &[u8]| bytes.len() - rest.len();

    let (rest, id) = match token(input) {
        Ok((rest, Token::Integer(n))) => match u32::try_from(n) {
            Ok(id) => (rest, id),
            Err(_) => return Err(Error::parse(offset, format!("object number {} out of range", n))),
        },
        _ => return Err(Error::parse(offset, "expected object number")),
    };
    let (rest, gen) = match token(rest) {
        Ok((rest, Token::Integer(n))) => match u16::try_from(n) {
            Ok(gen) => (rest, gen),
            Err(_) => return Err(Error::parse(position(rest), format!("generation {} out of range", n))),
        },
        _ => return Err(Error::parse(position(rest), "expected generation number")),
    };
    let rest = match token(rest) {
        Ok((rest, Token::ObjStart)) => rest,
        _ => return Err(Error::parse(position(rest), "expected 'obj' keyword")),
    };

    let (rest, object) = parse_value(rest, 0, options).map_err(|e| match e {
        nom::Err::Error(inner) | nom::Err::Failure(inner) => Error::parse(
            position(inner.input),
            format!("malformed object {} {} ({:?})", id, gen, inner.code),
        ),
        nom::Err::Incomplete(_) => Error::UnexpectedEof,
    })?;

    let rest = match token(rest) {
        Ok((after, Token::ObjEnd)) => after,
        _ if options.strict => {
            return Err(Error::parse(position(rest), format!("missing 'endobj' for {} {} obj", id, gen)));
        },
        _ => {
            log::debug!("Object {} {} has no 'endobj'", id, gen);
            rest
        },
    };

    Ok((ObjectRef::new(id, gen), object, position(rest) - offset))
}
