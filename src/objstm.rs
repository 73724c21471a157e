//! Object streams (PDF 1.5+).
//!
//! An object stream (`/Type /ObjStm`) packs many non-stream objects into one
//! compressed stream. The decoded data starts with `/N` pairs of integers
//! (object number, offset relative to `/First`), followed by the objects:
//!
//! ```text
//! 10 0 11 15 12 28    % pairs
//! << /Type /Font >>   % object 10 at /First + 0
//! [1 2 3]             % object 11 at /First + 15
//! ...
//! ```

use crate::error::{Error, Result};
use crate::lexer::{next_token, Token};
use crate::object::{Dictionary, Object};
use crate::parser::parse_object;

const MAX_OBJECTS: i64 = 1_000_000;

/// The parsed contents of one object stream.
#[derive(Debug, Clone, Default)]
pub struct ObjectStream {
    /// (object number, parsed object) in index order; `None` where the object
    /// body could not be parsed
    entries: Vec<(u32, Option<Object>)>,
}

impl ObjectStream {
    /// Parse the decoded payload of an object stream.
    ///
    /// # Errors
    ///
    /// Fails when `/N` or `/First` is missing or out of range, or when the pairs
    /// section is malformed. A single unparsable object does not fail the
    /// stream; it is logged and reported missing by [`ObjectStream::get`].
    pub fn parse(dict: &Dictionary, decoded: &[u8]) -> Result<Self> {
        if let Some(kind) = dict.get("Type").and_then(Object::as_name) {
            if kind != "ObjStm" {
                return Err(Error::InvalidPdf(format!("expected /Type /ObjStm, got /Type /{}", kind)));
            }
        }

        let n = dict
            .get("N")
            .and_then(Object::as_integer)
            .ok_or_else(|| Error::InvalidPdf("object stream missing /N entry".to_string()))?;
        let first = dict
            .get("First")
            .and_then(Object::as_integer)
            .ok_or_else(|| Error::InvalidPdf("object stream missing /First entry".to_string()))?;

        if !(0..=MAX_OBJECTS).contains(&n) {
            return Err(Error::InvalidPdf(format!("invalid object stream /N value: {}", n)));
        }
        let first = usize::try_from(first)
            .ok()
            .filter(|&f| f <= decoded.len())
            .ok_or_else(|| {
                Error::InvalidPdf(format!(
                    "object stream /First {} outside decoded data ({} bytes)",
                    first,
                    decoded.len()
                ))
            })?;

        let header = &decoded[..first];
        let body = &decoded[first..];
        let mut entries = Vec::with_capacity(n as usize);
        let mut cursor = 0;

        for i in 0..n {
            let (number, after) = match next_token(header, cursor) {
                Some((Token::Integer(v), after)) if v >= 0 => (v, after),
                _ => return Err(Error::parse(cursor, format!("object stream pair {}: expected object number", i))),
            };
            let (offset, after) = match next_token(header, after) {
                Some((Token::Integer(v), after)) if v >= 0 => (v, after),
                _ => return Err(Error::parse(after, format!("object stream pair {}: expected offset", i))),
            };
            cursor = after;

            let number = u32::try_from(number)
                .map_err(|_| Error::parse(cursor, format!("object number {} out of range", number)))?;
            let object = usize::try_from(offset)
                .ok()
                .and_then(|offset| body.get(offset..))
                .and_then(|input| match parse_object(input) {
                    Ok((_, object)) => Some(object),
                    Err(e) => {
                        log::warn!("Failed to parse object {} in object stream: {:?}", number, e);
                        None
                    },
                });
            if object.is_none() {
                log::warn!("Object {} (offset {}) missing from object stream", number, offset);
            }
            entries.push((number, object));
        }

        Ok(Self { entries })
    }

    /// Number of objects declared by the stream.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the stream declares no objects.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The object at `index`, which must carry `object_number`.
    ///
    /// Falls back to a search by number when the index is stale, which happens
    /// in files rewritten by tools that renumber without updating the xref.
    pub fn get(&self, index: usize, object_number: u32) -> Option<&Object> {
        match self.entries.get(index) {
            Some((number, object)) if *number == object_number => object.as_ref(),
            _ => self
                .entries
                .iter()
                .find(|(number, _)| *number == object_number)
                .and_then(|(_, object)| object.as_ref()),
        }
    }

    /// Every parsed object with its number and index.
    pub fn objects(&self) -> impl Iterator<Item = (usize, u32, &Object)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, (number, object))| object.as_ref().map(|o| (index, *number, o)))
    }
}
