//! Serializing a [`Document`] back to bytes.
//!
//! ## Modes
//!
//! ```text
//! full rewrite           incremental update
//! ------------           ------------------
//! %PDF-M.m               <original bytes, untouched>
//! reachable objects      modified objects
//! xref (all objects)     xref (modified + freed, /Prev -> old xref)
//! trailer                trailer
//! ```
//!
//! Offsets are collected while the body is written; the xref section is
//! always emitted last.
//!
//! Streams holding plaintext ([`StreamState::Decoded`]) are encoded through
//! their `/Filter` chain and then encrypted if the document is. Streams still
//! in file form ([`StreamState::Raw`]) are copied byte for byte.

mod object_serializer;
mod xref_section;

pub use object_serializer::ObjectSerializer;

use crate::crypt::map_strings;
use crate::document::Document;
use crate::error::Result;
use crate::filters::{default_registry, FilterChain};
use crate::object::{Dictionary, Object, ObjectRef, StreamState};
use crate::xref::XRefEntry;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::Write;

/// How a document is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Append an update to the original bytes instead of rewriting the file
    pub incremental: bool,
    /// Write the xref section as a cross-reference stream. Incremental updates
    /// also use one when the previous revision did.
    pub xref_stream: bool,
    /// Flate-compress plaintext streams that declare no filter, and xref streams
    pub compress: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self::full_rewrite()
    }
}

impl SaveOptions {
    /// Create options for full rewrite (default).
    pub fn full_rewrite() -> Self {
        Self {
            incremental: false,
            xref_stream: false,
            compress: true,
        }
    }

    /// Create options for incremental update.
    pub fn incremental() -> Self {
        Self {
            incremental: true,
            xref_stream: false,
            compress: false,
        }
    }

    /// Use a cross-reference stream.
    pub fn with_xref_stream(mut self, xref_stream: bool) -> Self {
        self.xref_stream = xref_stream;
        self
    }

    /// Toggle stream compression.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// Serialize `doc` according to `options`.
pub fn write(doc: &mut Document, options: &SaveOptions) -> Result<Vec<u8>> {
    if options.incremental {
        write_incremental(doc, options)
    } else {
        write_full(doc, options)
    }
}

/// Rewrite the document as a single revision.
///
/// Every object reachable from the trailer is written under its original
/// number; unreachable and freed objects are dropped.
pub fn write_full(doc: &mut Document, options: &SaveOptions) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let (major, minor) = doc.version();
    writeln!(out, "%PDF-{}.{}", major, minor)?;
    // Binary marker line
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let serializer = ObjectSerializer::compact();
    let mut entries = BTreeMap::new();

    let reachable = doc.reachable_objects();
    for id in &reachable {
        let object = doc.get(*id)?;
        let prepared = prepare(doc, *id, object, options)?;
        entries.insert(
            id.id,
            XRefEntry::InUse {
                offset: out.len(),
                generation: id.gen,
            },
        );
        serializer.write_indirect(&mut out, *id, &prepared)?;
    }

    let size = reachable.iter().map(|id| id.id + 1).max().unwrap_or(1);
    link_free_entries(&mut entries, size, doc);

    let mut trailer = doc.trailer().to_dict(size);
    if !trailer.contains_key("ID") {
        let id = file_id(&out);
        trailer.insert(
            "ID".to_string(),
            Object::Array(vec![Object::String(id.clone()), Object::String(id)]),
        );
    }

    log::info!("Full rewrite: {} objects, {} bytes of body", reachable.len(), out.len());
    xref_section::finish(&mut out, entries, trailer, size, options.xref_stream, options.compress)?;
    Ok(out)
}

/// Append the modified and freed objects to the original bytes.
///
/// Falls back to [`write_full`] for documents that were not read from a file.
/// When the cross-reference table had to be repaired there is no usable
/// previous section to chain to, so the appended section lists every live
/// object instead of using `/Prev`.
pub fn write_incremental(doc: &mut Document, options: &SaveOptions) -> Result<Vec<u8>> {
    if doc.original_bytes().is_empty() {
        log::info!("Document has no original bytes; writing a full rewrite instead");
        return write_full(doc, options);
    }

    let mut out = doc.original_bytes().to_vec();
    if !out.ends_with(b"\n") && !out.ends_with(b"\r") {
        out.push(b'\n');
    }

    let serializer = ObjectSerializer::compact();
    let mut entries = BTreeMap::new();

    let modified: Vec<ObjectRef> = doc.modified_objects().collect();
    for id in &modified {
        let object = doc.get(*id)?;
        let prepared = prepare(doc, *id, object, options)?;
        entries.insert(
            id.id,
            XRefEntry::InUse {
                offset: out.len(),
                generation: id.gen,
            },
        );
        serializer.write_indirect(&mut out, *id, &prepared)?;
    }
    for (num, generation) in doc.freed_objects() {
        entries.insert(num, XRefEntry::Free { next: 0, generation });
    }

    let prev = doc.xref().startxref();
    if prev.is_none() {
        for (num, entry) in doc.xref().iter() {
            entries.entry(num).or_insert(entry);
        }
    }

    let size = doc
        .object_count()
        .max(doc.trailer().size)
        .max(entries.keys().next_back().map_or(1, |max| max + 1));
    let mut trailer = doc.trailer().to_dict(size);
    if let Some(prev) = prev {
        trailer.insert("Prev".to_string(), Object::Integer(prev as i64));
    }

    let has_compressed = entries.values().any(|e| matches!(e, XRefEntry::Compressed { .. }));
    let as_stream = options.xref_stream || doc.xref().uses_xref_stream() || has_compressed;

    log::info!(
        "Incremental update: {} modified, {} freed, appended after {} bytes",
        modified.len(),
        doc.freed_objects().count(),
        doc.original_bytes().len()
    );
    xref_section::finish(&mut out, entries, trailer, size, as_stream, options.compress)?;
    Ok(out)
}

/// Turn a cached object into its file form: plaintext streams encoded,
/// strings and new payloads encrypted, indirect `/Length` applied.
fn prepare(doc: &mut Document, id: ObjectRef, mut object: Object, options: &SaveOptions) -> Result<Object> {
    let encrypt = doc.crypt().is_some() && doc.crypt_applies(id, &object);

    if let Object::Stream { dict, data, state } = &mut object {
        match state {
            StreamState::Decoded => {
                if options.compress && !dict.contains_key("Filter") {
                    dict.insert("Filter".to_string(), Object::name("FlateDecode"));
                }
                let chain = FilterChain::from_dict(&resolve_filter_entries(doc, dict)?)?;
                let mut encoded = default_registry().encode(data, &chain)?;
                if encrypt {
                    if let Some(crypt) = doc.crypt() {
                        encoded = crypt.encrypt(id, &encoded)?;
                    }
                }
                *data = Bytes::from(encoded);
                *state = StreamState::Raw;
            },
            StreamState::Raw => {
                if let Some(Object::Reference(length_ref)) = dict.get("Length").cloned() {
                    let length = doc.get(length_ref)?.as_integer().and_then(|n| usize::try_from(n).ok());
                    if let Some(length) = length.filter(|&n| n < data.len()) {
                        *data = data.slice(..length);
                    }
                }
            },
        }
        // Rewritten by the serializer from the payload size
        dict.shift_remove("Length");
    }

    if encrypt {
        if let Some(crypt) = doc.crypt() {
            map_strings(&mut object, &mut |bytes: &[u8]| crypt.encrypt(id, bytes))?;
        }
    }
    Ok(object)
}

fn resolve_filter_entries(doc: &mut Document, dict: &Dictionary) -> Result<Dictionary> {
    let mut resolved = dict.clone();
    for key in ["Filter", "DecodeParms", "DP"] {
        if let Some(value) = dict.get(key) {
            let value = match doc.resolve(value)? {
                Object::Array(items) => Object::Array(items.iter().map(|item| doc.resolve(item)).collect::<Result<_>>()?),
                other => other,
            };
            resolved.insert(key.to_string(), value);
        }
    }
    Ok(resolved)
}

/// Fill gaps below `size` with free entries chained into the free list that
/// starts at object 0.
fn link_free_entries(entries: &mut BTreeMap<u32, XRefEntry>, size: u32, doc: &Document) {
    let freed: BTreeMap<u32, u16> = doc.freed_objects().collect();
    let free: Vec<u32> = (1..size).filter(|num| !entries.contains_key(num)).collect();

    let mut next = 0;
    for &num in free.iter().rev() {
        let generation = freed.get(&num).copied().unwrap_or(0);
        entries.insert(num, XRefEntry::Free { next, generation });
        next = num;
    }
    entries.insert(
        0,
        XRefEntry::Free {
            next,
            generation: 65535,
        },
    );
}

/// File identifier derived from the written body.
fn file_id(body: &[u8]) -> Vec<u8> {
    use md5::{Digest, Md5};

    let mut hasher = Md5::new();
    hasher.update(body);
    hasher.update(chrono::Utc::now().timestamp().to_be_bytes());
    hasher.finalize().to_vec()
}
