//! Cross-reference table.
//!
//! The xref table maps object numbers to their location: a byte offset for
//! objects stored directly in the body, or a slot inside an object stream for
//! compressed objects (PDF 1.5+).
//!
//! A file may contain several xref sections, one per incremental update, linked
//! through the trailer's `/Prev` entry. Classic tables and cross-reference
//! streams can be mixed across revisions, and hybrid files carry both for the
//! same revision (`/XRefStm`). [`build`] walks the chain from the newest section
//! and merges it into one [`XRefTable`] where newer entries win.

use crate::error::{Error, Result};
use crate::filters::{default_registry, FilterChain};
use crate::lexer::{next_token, skip_whitespace, Token};
use crate::object::{Dictionary, Object};
use crate::parser::{parse_indirect_object_with_options, parse_object};
use crate::parser_config::ParserOptions;
use byteorder::{BigEndian, ByteOrder};
use std::collections::{BTreeMap, HashSet};

/// Upper bound on entries in one classic subsection.
const MAX_SUBSECTION_COUNT: i64 = 10_000_000;

/// Upper bound on the number of sections in a `/Prev` chain.
const MAX_SECTIONS: usize = 1024;

/// Where to find one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Unused slot
    Free {
        /// Next free object number (free-list link)
        next: u32,
        /// Generation to use if the slot is reused
        generation: u16,
    },
    /// Object stored in the body at a byte offset
    InUse {
        /// Byte offset of the `N G obj` header
        offset: usize,
        /// Generation number
        generation: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing `/Type /ObjStm` stream
        stream: u32,
        /// Index of the object within the stream
        index: u32,
    },
}

impl XRefEntry {
    /// Generation number; objects in object streams always have generation 0.
    pub fn generation(&self) -> u16 {
        match self {
            XRefEntry::Free { generation, .. } | XRefEntry::InUse { generation, .. } => *generation,
            XRefEntry::Compressed { .. } => 0,
        }
    }

    /// True for entries that locate a live object.
    pub fn is_in_use(&self) -> bool {
        !matches!(self, XRefEntry::Free { .. })
    }
}

/// How the table was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XRefState {
    /// Nothing parsed yet
    #[default]
    Unbuilt,
    /// Built from the file's xref sections
    BuiltFromXRefSections,
    /// Rebuilt by scanning the body for object headers
    Repaired,
}

/// The merged cross-reference table of a document.
#[derive(Debug, Clone, Default)]
pub struct XRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    state: XRefState,
    startxref: Option<usize>,
    uses_xref_stream: bool,
}

impl XRefTable {
    /// Create an empty, unbuilt table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for an object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Set the entry for an object number, replacing any previous one.
    pub fn insert(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Iterate entries in object-number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, XRefEntry)> + '_ {
        self.entries.iter().map(|(&num, &entry)| (num, entry))
    }

    /// Number of entries (free ones included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest object number with an entry.
    pub fn max_object_number(&self) -> Option<u32> {
        self.entries.keys().next_back().copied()
    }

    /// How the table was obtained.
    pub fn state(&self) -> XRefState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: XRefState) {
        self.state = state;
    }

    /// Offset of the newest xref section, as declared by `startxref`.
    ///
    /// `None` for repaired tables: the declared sections were not usable.
    pub fn startxref(&self) -> Option<usize> {
        self.startxref
    }

    /// True if the newest section is a cross-reference stream.
    pub fn uses_xref_stream(&self) -> bool {
        self.uses_xref_stream
    }

    /// Object numbers whose entries do not match the file body.
    ///
    /// An in-use entry must point at an `N G obj` header with the same number and
    /// generation; a compressed entry must name an in-use object stream.
    pub fn mismatched_entries(&self, bytes: &[u8]) -> Vec<u32> {
        self.iter()
            .filter(|&(num, entry)| match entry {
                XRefEntry::Free { .. } => false,
                XRefEntry::InUse { offset, generation } => {
                    object_header_at(bytes, offset) != Some((num, generation))
                },
                XRefEntry::Compressed { stream, .. } => {
                    !matches!(self.get(stream), Some(XRefEntry::InUse { .. }))
                },
            })
            .map(|(num, _)| num)
            .collect()
    }
}

/// One xref section: a classic table with its trailer, or an xref stream whose
/// dictionary doubles as the trailer.
#[derive(Debug, Clone)]
pub struct XRefSection {
    /// Entries in the order they appear
    pub entries: Vec<(u32, XRefEntry)>,
    /// Trailer dictionary (stream dictionary for xref streams)
    pub trailer: Dictionary,
    /// True for a cross-reference stream
    pub is_stream: bool,
}

/// Read the `N G obj` header at `offset` (leading whitespace allowed).
pub fn object_header_at(bytes: &[u8], offset: usize) -> Option<(u32, u16)> {
    let (Token::Integer(num), cursor) = next_token(bytes, offset)? else {
        return None;
    };
    let (Token::Integer(gen), cursor) = next_token(bytes, cursor)? else {
        return None;
    };
    let (Token::ObjStart, _) = next_token(bytes, cursor)? else {
        return None;
    };
    Some((u32::try_from(num).ok()?, u16::try_from(gen).ok()?))
}

/// Find the offset declared after the last `startxref` keyword.
///
/// The whole buffer is searched from the end, so trailing garbage after
/// `%%EOF` is tolerated.
///
/// # Errors
///
/// [`Error::InvalidXref`] if the keyword is missing or not followed by an offset
/// inside the file.
pub fn find_startxref(bytes: &[u8]) -> Result<usize> {
    let keyword = b"startxref";
    let pos = bytes
        .windows(keyword.len())
        .rposition(|window| window == keyword)
        .ok_or(Error::InvalidXref(bytes.len()))?;

    match next_token(bytes, pos + keyword.len()) {
        Some((Token::Integer(offset), _)) => match usize::try_from(offset) {
            Ok(offset) if offset < bytes.len() => Ok(offset),
            _ => {
                log::warn!("startxref offset {} lies outside the file ({} bytes)", offset, bytes.len());
                Err(Error::InvalidXref(pos))
            },
        },
        _ => Err(Error::InvalidXref(pos)),
    }
}

/// Parse the xref section at `offset`, detecting table or stream form.
pub fn parse_section(bytes: &[u8], offset: usize, options: &ParserOptions) -> Result<XRefSection> {
    if offset >= bytes.len() {
        return Err(Error::InvalidXref(offset));
    }
    let start = skip_whitespace(bytes, offset);

    match next_token(bytes, start) {
        Some((Token::Xref, after)) => {
            log::debug!("Classic xref table at offset {}", offset);
            parse_table(bytes, after, offset)
        },
        Some((Token::Integer(_), _)) => {
            log::debug!("Cross-reference stream at offset {}", offset);
            parse_xref_stream(bytes, start, options)
        },
        _ => Err(Error::InvalidXref(offset)),
    }
}

/// Build the merged table by following `/Prev` from `startxref`.
///
/// Returns the table (state [`XRefState::BuiltFromXRefSections`]) and the
/// merged trailer: the newest trailer, with `/Root`, `/Info`, `/ID` and
/// `/Encrypt` taken from older ones when the newest lacks them.
pub fn build(bytes: &[u8], options: &ParserOptions) -> Result<(XRefTable, Dictionary)> {
    let start = find_startxref(bytes)?;
    let mut table = XRefTable {
        startxref: Some(start),
        ..XRefTable::default()
    };
    let mut trailer: Option<Dictionary> = None;
    let mut visited = HashSet::new();
    let mut next = Some(start);

    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            log::warn!("xref /Prev chain loops back to offset {}; stopping", offset);
            break;
        }
        if visited.len() > MAX_SECTIONS {
            return Err(Error::InvalidPdf(format!("xref /Prev chain longer than {} sections", MAX_SECTIONS)));
        }

        let section = parse_section(bytes, offset, options)?;
        if trailer.is_none() {
            table.uses_xref_stream = section.is_stream;
        }

        let mut revision: BTreeMap<u32, XRefEntry> = section.entries.into_iter().collect();

        // Hybrid file: the hidden stream fills in the table's free or missing slots
        if let Some(stm_offset) = offset_entry(&section.trailer, "XRefStm") {
            match parse_section(bytes, stm_offset, options) {
                Ok(stream) if stream.is_stream => {
                    for (num, entry) in stream.entries {
                        let slot = revision.entry(num).or_insert(entry);
                        if !slot.is_in_use() {
                            *slot = entry;
                        }
                    }
                },
                Ok(_) => log::warn!("/XRefStm {} does not point at an xref stream", stm_offset),
                Err(e) => log::warn!("Ignoring unreadable /XRefStm at {}: {}", stm_offset, e),
            }
        }

        for (num, entry) in revision {
            table.entries.entry(num).or_insert(entry);
        }

        next = offset_entry(&section.trailer, "Prev");
        match trailer.as_mut() {
            None => trailer = Some(section.trailer),
            Some(newest) => {
                for key in ["Root", "Info", "ID", "Encrypt"] {
                    if !newest.contains_key(key) {
                        if let Some(value) = section.trailer.get(key) {
                            newest.insert(key.to_string(), value.clone());
                        }
                    }
                }
            },
        }
    }

    table.state = XRefState::BuiltFromXRefSections;
    log::debug!("Built xref table: {} entries from {} section(s)", table.len(), visited.len());
    let trailer = trailer.ok_or(Error::InvalidXref(start))?;
    Ok((table, trailer))
}

fn offset_entry(dict: &Dictionary, key: &str) -> Option<usize> {
    dict.get(key)
        .and_then(Object::as_integer)
        .and_then(|v| usize::try_from(v).ok())
}

/// Parse a classic table. `cursor` is just past the `xref` keyword.
///
/// ```text
/// xref
/// 0 3
/// 0000000000 65535 f
/// 0000000017 00000 n
/// 0000000081 00000 n
/// trailer
/// << /Size 3 /Root 1 0 R >>
/// ```
fn parse_table(bytes: &[u8], mut cursor: usize, offset: usize) -> Result<XRefSection> {
    let mut entries = Vec::new();

    loop {
        match next_token(bytes, cursor) {
            Some((Token::Trailer, after)) => {
                let (_, obj) =
                    parse_object(&bytes[after..]).map_err(|_| Error::parse(after, "malformed trailer dictionary"))?;
                let trailer = match obj {
                    Object::Dictionary(dict) => dict,
                    other => {
                        return Err(Error::InvalidObjectType {
                            expected: "Dictionary".to_string(),
                            found: other.type_name().to_string(),
                        })
                    },
                };
                return Ok(XRefSection {
                    entries,
                    trailer,
                    is_stream: false,
                });
            },
            Some((Token::Integer(first), after_first)) => {
                let (count, after_count) = match next_token(bytes, after_first) {
                    Some((Token::Integer(count), after)) => (count, after),
                    _ => return Err(Error::parse(after_first, "expected xref subsection count")),
                };
                if first < 0 || !(0..=MAX_SUBSECTION_COUNT).contains(&count) {
                    return Err(Error::parse(cursor, format!("invalid xref subsection header {} {}", first, count)));
                }
                cursor = after_count;
                for i in 0..count {
                    let num = u32::try_from(first + i)
                        .map_err(|_| Error::parse(cursor, "object number out of range in xref table"))?;
                    let (entry, next) = parse_table_entry(bytes, cursor)?;
                    entries.push((num, entry));
                    cursor = next;
                }
            },
            _ => return Err(Error::InvalidXref(offset)),
        }
    }
}

/// Parse `nnnnnnnnnn ggggg n|f`.
fn parse_table_entry(bytes: &[u8], cursor: usize) -> Result<(XRefEntry, usize)> {
    let malformed = || Error::parse(cursor, "malformed xref entry");

    let (field1, cursor) = match next_token(bytes, cursor) {
        Some((Token::Integer(n), next)) if n >= 0 => (n, next),
        _ => return Err(malformed()),
    };
    let (generation, cursor) = match next_token(bytes, cursor) {
        Some((Token::Integer(n), next)) => (u16::try_from(n).map_err(|_| malformed())?, next),
        _ => return Err(malformed()),
    };
    let entry = match next_token(bytes, cursor) {
        Some((Token::Invalid(b'n'), next)) => (
            XRefEntry::InUse {
                offset: usize::try_from(field1).map_err(|_| malformed())?,
                generation,
            },
            next,
        ),
        Some((Token::Invalid(b'f'), next)) => (
            XRefEntry::Free {
                next: u32::try_from(field1).unwrap_or(0),
                generation,
            },
            next,
        ),
        _ => return Err(malformed()),
    };
    Ok(entry)
}

/// Parse a cross-reference stream (`/Type /XRef`) at `offset`.
///
/// - `/W [w1 w2 w3]` gives field widths in bytes; a zero-width type field means type 1
/// - `/Index [first count ...]` lists subsections, default `[0 /Size]`
/// - type 0 = free, 1 = offset + generation, 2 = object stream + index
fn parse_xref_stream(bytes: &[u8], offset: usize, options: &ParserOptions) -> Result<XRefSection> {
    let (id, object, _) = parse_indirect_object_with_options(bytes, offset, options)?;
    let (dict, data) = match object {
        Object::Stream { dict, data, .. } => (dict, data),
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };
    if dict.get("Type").and_then(Object::as_name) != Some("XRef") {
        return Err(Error::InvalidPdf(format!("object {} at byte {} is not an xref stream", id, offset)));
    }

    // Xref streams are never encrypted
    let decoded = default_registry().decode(&data, &FilterChain::from_dict(&dict)?, options)?;

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .map(|w| {
            w.iter()
                .filter_map(Object::as_integer)
                .filter_map(|v| usize::try_from(v).ok())
                .collect()
        })
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(Error::InvalidPdf(format!("xref stream {} has invalid /W {:?}", id, widths)));
    }
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(Error::InvalidPdf(format!("xref stream {} has empty rows", id)));
    }

    let size = dict.get("Size").and_then(Object::as_integer).unwrap_or(0);
    let index: Vec<i64> = match dict.get("Index").and_then(Object::as_array) {
        Some(items) => items.iter().filter_map(Object::as_integer).collect(),
        None => vec![0, size],
    };

    let field = |row: &[u8], k: usize| -> Option<u64> {
        let width = widths[k];
        let start: usize = widths[..k].iter().sum();
        (width > 0).then(|| BigEndian::read_uint(&row[start..start + width], width))
    };

    let mut rows = decoded.chunks_exact(row_len);
    let mut entries = Vec::new();

    'sections: for pair in index.chunks_exact(2) {
        let (first, count) = (pair[0], pair[1]);
        if first < 0 || count < 0 {
            return Err(Error::InvalidPdf(format!("xref stream {} has invalid /Index", id)));
        }
        for i in 0..count {
            let Some(row) = rows.next() else {
                log::warn!("Xref stream {} ends before its /Index is exhausted", id);
                break 'sections;
            };
            let Ok(num) = u32::try_from(first + i) else {
                break 'sections;
            };
            let f2 = field(row, 1).unwrap_or(0);
            let f3 = field(row, 2).unwrap_or(0);
            let entry = match field(row, 0).unwrap_or(1) {
                0 => XRefEntry::Free {
                    next: u32::try_from(f2).unwrap_or(0),
                    generation: u16::try_from(f3).unwrap_or(u16::MAX),
                },
                1 => XRefEntry::InUse {
                    offset: usize::try_from(f2).unwrap_or(usize::MAX),
                    generation: u16::try_from(f3).unwrap_or(0),
                },
                2 => XRefEntry::Compressed {
                    stream: u32::try_from(f2).unwrap_or(0),
                    index: u32::try_from(f3).unwrap_or(0),
                },
                other => {
                    log::debug!("Ignoring xref stream entry of type {} for object {}", other, num);
                    continue;
                },
            };
            entries.push((num, entry));
        }
    }

    Ok(XRefSection {
        entries,
        trailer: dict,
        is_stream: true,
    })
}
