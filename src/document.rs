//! The document context.
//!
//! A [`Document`] owns the file bytes, the merged cross-reference table, the
//! trailer and a cache of every object resolved so far. Objects are loaded on
//! first access and never evicted. Mutations (`put`, `update`, `free`) go
//! through the same cache and are recorded so the writer can emit an
//! incremental update containing only what changed.
//!
//! Every operation that may populate the cache takes `&mut self`.

use crate::crypt::{map_strings, CryptTransform};
use crate::error::{Error, Result};
use crate::name_tree::NameTree;
use crate::object::{Dictionary, Object, ObjectRef, StreamState};
use crate::objstm::ObjectStream;
use crate::parser::parse_indirect_object_with_options;
use crate::parser_config::ParserOptions;
use crate::trailer::Trailer;
use crate::writer::{self, SaveOptions};
use crate::xref::{self, XRefEntry, XRefState, XRefTable};
use crate::xref_reconstruction;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

/// The header must start within this many bytes of the file start.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// An open PDF document.
///
/// # Example
///
/// ```no_run
/// use pdf_graph::document::Document;
///
/// let mut doc = Document::open("sample.pdf")?;
/// let catalog = doc.catalog()?;
/// println!("catalog has {} entries", catalog.len());
/// # Ok::<(), pdf_graph::error::Error>(())
/// ```
pub struct Document {
    /// Original file bytes; empty for a document built in memory
    data: Bytes,
    /// PDF version from the header (major, minor)
    version: (u8, u8),
    xref: XRefTable,
    trailer: Trailer,
    /// Resolved objects, never evicted
    cache: HashMap<ObjectRef, Object>,
    /// Parsed object streams keyed by their object number
    object_streams: HashMap<u32, ObjectStream>,
    /// Objects created or replaced since load
    modified: BTreeSet<ObjectRef>,
    /// Freed object numbers with the generation their xref entry will carry
    freed: BTreeMap<u32, u16>,
    /// Next object number handed out by `put`
    next_number: u32,
    crypt: Option<Box<dyn CryptTransform>>,
    options: ParserOptions,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("version", &self.version)
            .field("xref_entries", &self.xref.len())
            .field("xref_state", &self.xref.state())
            .field("cached_objects", &self.cache.len())
            .field("modified", &self.modified.len())
            .field("freed", &self.freed.len())
            .field("has_crypt", &self.crypt.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A new in-memory document with an empty page tree.
    pub fn new() -> Self {
        let mut doc = Self::empty(Bytes::new(), (1, 7), ParserOptions::default(), None);

        let mut pages = Dictionary::new();
        pages.insert("Type".to_string(), Object::name("Pages"));
        pages.insert("Kids".to_string(), Object::Array(Vec::new()));
        pages.insert("Count".to_string(), Object::Integer(0));
        let pages = doc.put(Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.insert("Type".to_string(), Object::name("Catalog"));
        catalog.insert("Pages".to_string(), Object::Reference(pages));
        let root = doc.put(Object::Dictionary(catalog));

        doc.trailer = Trailer::new(root);
        doc
    }

    /// Load a document from memory with lenient options.
    ///
    /// # Errors
    ///
    /// Fails on a missing `%PDF-` header, or when neither the declared
    /// cross-reference data nor a body scan yields a catalog.
    pub fn load(data: impl Into<Bytes>) -> Result<Self> {
        Self::load_with_options(data, ParserOptions::default())
    }

    /// Load a document from memory.
    pub fn load_with_options(data: impl Into<Bytes>, options: ParserOptions) -> Result<Self> {
        Self::load_inner(data.into(), options, None)
    }

    /// Load an encrypted document; `crypt` decrypts strings and stream payloads.
    pub fn load_with_crypt(data: impl Into<Bytes>, crypt: Box<dyn CryptTransform>) -> Result<Self> {
        Self::load_inner(data.into(), ParserOptions::default(), Some(crypt))
    }

    /// Read and load a file.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the file cannot be read, otherwise as [`Document::load`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, ParserOptions::default())
    }

    /// Read and load a file with explicit options.
    pub fn open_with_options(path: impl AsRef<Path>, options: ParserOptions) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Opening {}", path.display());
        let data = std::fs::read(path)?;
        Self::load_with_options(data, options)
    }

    fn empty(data: Bytes, version: (u8, u8), options: ParserOptions, crypt: Option<Box<dyn CryptTransform>>) -> Self {
        Self {
            data,
            version,
            xref: XRefTable::new(),
            trailer: Trailer::new(ObjectRef::new(0, 0)),
            cache: HashMap::new(),
            object_streams: HashMap::new(),
            modified: BTreeSet::new(),
            freed: BTreeMap::new(),
            next_number: 1,
            crypt,
            options,
        }
    }

    fn load_inner(data: Bytes, options: ParserOptions, crypt: Option<Box<dyn CryptTransform>>) -> Result<Self> {
        if options.max_file_size > 0 && data.len() > options.max_file_size {
            return Err(Error::InvalidPdf(format!(
                "file size {} bytes exceeds limit {} bytes",
                data.len(),
                options.max_file_size
            )));
        }

        let version = parse_header(&data, &options)?;
        log::debug!("PDF version {}.{}, {} bytes", version.0, version.1, data.len());

        let built = xref::build(&data, &options)
            .and_then(|(table, dict)| Trailer::from_dict(&dict).map(|trailer| (table, trailer)));

        let mut doc = Self::empty(data, version, options, crypt);
        match built {
            Ok((table, trailer)) => {
                doc.install(table, trailer);
                if let Err(cause) = doc.check_consistency() {
                    doc.repair(cause)?;
                }
            },
            Err(cause) => doc.repair(cause)?,
        }

        if doc.trailer.is_encrypted() && doc.crypt.is_none() {
            log::warn!("Document is encrypted; strings stay encrypted and stream decoding will fail");
        }
        Ok(doc)
    }

    fn install(&mut self, xref: XRefTable, trailer: Trailer) {
        self.next_number = xref
            .max_object_number()
            .map_or(1, |max| max.saturating_add(1))
            .max(trailer.size)
            .max(1);
        self.xref = xref;
        self.trailer = trailer;
        self.cache.clear();
        self.object_streams.clear();
    }

    /// Entries must match the body and the catalog must resolve.
    fn check_consistency(&mut self) -> Result<()> {
        let mismatched = self.xref.mismatched_entries(&self.data);
        if let Some(first) = mismatched.first() {
            return Err(Error::InvalidPdf(format!(
                "{} xref entries do not match the file body (first: object {})",
                mismatched.len(),
                first
            )));
        }
        self.catalog().map(|_| ())
    }

    fn repair(&mut self, cause: Error) -> Result<()> {
        if !self.options.allow_xref_repair {
            return Err(cause);
        }
        log::warn!("Cross-reference data unusable ({}); rebuilding from the file body", cause);

        let (table, dict) = xref_reconstruction::reconstruct(&self.data, &self.options)?;
        let trailer = Trailer::from_dict(&dict)?;
        self.install(table, trailer);
        self.catalog()?;
        Ok(())
    }

    /// PDF version from the header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// The document trailer.
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// The merged cross-reference table.
    pub fn xref(&self) -> &XRefTable {
        &self.xref
    }

    /// True if the cross-reference table was rebuilt from a body scan.
    pub fn was_repaired(&self) -> bool {
        self.xref.state() == XRefState::Repaired
    }

    /// Options the document was loaded with.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// True if any object was created, replaced or freed since load.
    pub fn is_modified(&self) -> bool {
        !self.modified.is_empty() || !self.freed.is_empty()
    }

    /// Load an indirect object.
    ///
    /// # Errors
    ///
    /// [`Error::ObjectNotFound`] if the object is free, freed in this session, or
    /// absent from the table; parse and filter errors if its bytes are damaged.
    pub fn get(&mut self, id: ObjectRef) -> Result<Object> {
        if let Some(object) = self.cache.get(&id) {
            return Ok(object.clone());
        }
        if self.freed.contains_key(&id.id) {
            return Err(Error::ObjectNotFound(id.id, id.gen));
        }

        let object = match self.xref.get(id.id).copied() {
            Some(XRefEntry::InUse { offset, generation }) if generation == id.gen => self.load_direct(id, offset)?,
            Some(XRefEntry::Compressed { stream, index }) if id.gen == 0 => self.load_compressed(id, stream, index)?,
            _ => return Err(Error::ObjectNotFound(id.id, id.gen)),
        };

        self.cache.insert(id, object.clone());
        Ok(object)
    }

    fn load_direct(&mut self, id: ObjectRef, offset: usize) -> Result<Object> {
        log::debug!("Loading object {} at offset {}", id, offset);
        let (found, mut object, _) = parse_indirect_object_with_options(&self.data, offset, &self.options)?;
        if found != id {
            return Err(Error::parse(offset, format!("expected object {}, found {}", id, found)));
        }

        if self.crypt_applies(id, &object) {
            if let Some(crypt) = &self.crypt {
                map_strings(&mut object, &mut |bytes: &[u8]| crypt.decrypt(id, bytes))?;
            }
        }
        Ok(object)
    }

    fn load_compressed(&mut self, id: ObjectRef, stream: u32, index: u32) -> Result<Object> {
        log::debug!("Loading object {} from object stream {} (index {})", id, stream, index);

        if !self.object_streams.contains_key(&stream) {
            if !matches!(self.xref.get(stream), Some(XRefEntry::InUse { .. })) {
                return Err(Error::InvalidPdf(format!(
                    "object stream {} holding object {} is not stored in the file body",
                    stream, id
                )));
            }
            let container = ObjectRef::new(stream, 0);
            let object = self.get(container)?;
            let dict = match &object {
                Object::Stream { dict, .. } => dict.clone(),
                other => {
                    return Err(Error::InvalidObjectType {
                        expected: "Stream".to_string(),
                        found: other.type_name().to_string(),
                    })
                },
            };
            let decoded = self.decode_stream(&object, container)?;
            self.object_streams.insert(stream, ObjectStream::parse(&dict, &decoded)?);
        }

        self.object_streams
            .get(&stream)
            .and_then(|objstm| objstm.get(index as usize, id.id))
            .cloned()
            .ok_or(Error::ObjectNotFound(id.id, id.gen))
    }

    /// True if strings and payloads of object `id` are encrypted in the file.
    ///
    /// The encryption dictionary and cross-reference streams never are.
    pub(crate) fn crypt_applies(&self, id: ObjectRef, object: &Object) -> bool {
        self.trailer.is_encrypted() && self.trailer.encrypt_ref() != Some(id) && !object.has_type("XRef")
    }

    pub(crate) fn crypt(&self) -> Option<&dyn CryptTransform> {
        self.crypt.as_deref()
    }

    /// Follow a chain of references to a concrete value.
    ///
    /// Non-reference values are returned as they are.
    ///
    /// # Errors
    ///
    /// [`Error::CircularReference`] if the chain loops,
    /// [`Error::RecursionLimitExceeded`] if it is longer than
    /// `max_recursion_depth`, or the error of any failed lookup.
    pub fn resolve(&mut self, object: &Object) -> Result<Object> {
        let mut current = object.clone();
        let mut visited = HashSet::new();

        while let Object::Reference(id) = current {
            if !visited.insert(id) {
                log::error!("Reference cycle through object {}", id);
                return Err(Error::CircularReference(id));
            }
            if visited.len() > self.options.max_recursion_depth as usize {
                return Err(Error::RecursionLimitExceeded(self.options.max_recursion_depth));
            }
            current = self.get(id)?;
        }

        Ok(current)
    }

    /// Resolve `dict[key]`.
    ///
    /// # Errors
    ///
    /// [`Error::MissingKey`] if the key is absent; otherwise as [`Document::resolve`].
    pub fn deref_dict(&mut self, dict: &Dictionary, key: &str) -> Result<Object> {
        let value = dict.get(key).ok_or_else(|| Error::MissingKey(key.to_string()))?;
        self.resolve(value)
    }

    /// Resolve `dict[key]`, treating an absent key or a null value as `None`.
    pub fn deref_dict_opt(&mut self, dict: &Dictionary, key: &str) -> Result<Option<Object>> {
        match dict.get(key) {
            None => Ok(None),
            Some(value) => {
                let resolved = self.resolve(value)?;
                Ok((!resolved.is_null()).then_some(resolved))
            },
        }
    }

    /// Add a new indirect object and return its reference.
    ///
    /// Numbers are never reused within a session, so the new object always gets
    /// a fresh number with generation 0.
    pub fn put(&mut self, object: Object) -> ObjectRef {
        let id = ObjectRef::new(self.next_number, 0);
        self.next_number += 1;
        log::debug!("New object {} ({})", id, object.type_name());
        self.cache.insert(id, object);
        self.modified.insert(id);
        id
    }

    /// Replace a live object.
    ///
    /// # Errors
    ///
    /// [`Error::ObjectNotFound`] if `id` is not a live object.
    pub fn update(&mut self, id: ObjectRef, object: Object) -> Result<()> {
        if !self.is_live(id) {
            return Err(Error::ObjectNotFound(id.id, id.gen));
        }
        self.cache.insert(id, object);
        self.modified.insert(id);
        Ok(())
    }

    /// Free an object. Its xref entry becomes free with the generation bumped.
    ///
    /// # Errors
    ///
    /// [`Error::ObjectNotFound`] if `id` is not a live object.
    pub fn free(&mut self, id: ObjectRef) -> Result<()> {
        if !self.is_live(id) {
            return Err(Error::ObjectNotFound(id.id, id.gen));
        }
        log::debug!("Freeing object {}", id);
        self.cache.remove(&id);
        self.modified.remove(&id);
        self.freed.insert(id.id, id.gen.saturating_add(1));
        Ok(())
    }

    /// True if `id` names an object that `get` can return.
    pub fn is_live(&self, id: ObjectRef) -> bool {
        if self.freed.contains_key(&id.id) {
            return false;
        }
        self.cache.contains_key(&id)
            || self
                .xref
                .get(id.id)
                .is_some_and(|entry| entry.is_in_use() && entry.generation() == id.gen)
    }

    /// Reference to the document catalog.
    pub fn catalog_ref(&self) -> ObjectRef {
        self.trailer.root
    }

    /// The document catalog dictionary.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidObjectType`] if `/Root` is not a dictionary.
    pub fn catalog(&mut self) -> Result<Dictionary> {
        match self.get(self.trailer.root)? {
            Object::Dictionary(dict) => {
                if dict.get("Type").and_then(Object::as_name) != Some("Catalog") {
                    log::warn!("Catalog {} lacks /Type /Catalog", self.trailer.root);
                }
                Ok(dict)
            },
            other => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Set the `/Info` reference written to the next trailer.
    pub fn set_info(&mut self, info: Option<ObjectRef>) {
        self.trailer.info = info;
    }

    fn trailer_refs(&self) -> Vec<ObjectRef> {
        let mut refs = vec![self.trailer.root];
        refs.extend(self.trailer.info);
        refs.extend(self.trailer.encrypt_ref());
        refs
    }

    /// Walk the graph from the trailer. Returns the reachable objects and the
    /// references that could not be loaded.
    fn walk(&mut self) -> (BTreeSet<ObjectRef>, Vec<(ObjectRef, Error)>) {
        let mut visited = BTreeSet::new();
        let mut broken = Vec::new();
        let mut stack = self.trailer_refs();

        while let Some(id) = stack.pop() {
            if visited.contains(&id) || broken.iter().any(|(b, _)| *b == id) {
                continue;
            }
            match self.get(id) {
                Ok(object) => {
                    visited.insert(id);
                    stack.extend(object.references().into_iter().filter(|r| !visited.contains(r)));
                },
                Err(e) => {
                    log::warn!("Skipping unresolvable reference {}: {}", id, e);
                    broken.push((id, e));
                },
            }
        }

        (visited, broken)
    }

    /// Every object reachable from the trailer, in object-number order.
    ///
    /// Dangling references are logged and skipped.
    pub fn reachable_objects(&mut self) -> Vec<ObjectRef> {
        self.walk().0.into_iter().collect()
    }

    /// How many times each object is referenced by the trailer and by the
    /// reachable objects.
    pub fn reference_counts(&mut self) -> HashMap<ObjectRef, usize> {
        let mut counts: HashMap<ObjectRef, usize> = HashMap::new();
        for id in self.trailer_refs() {
            *counts.entry(id).or_default() += 1;
        }
        for id in self.reachable_objects() {
            if let Some(object) = self.cache.get(&id) {
                for target in object.references() {
                    *counts.entry(target).or_default() += 1;
                }
            }
        }
        counts
    }

    /// Decode a stream's payload.
    ///
    /// `id` is the stream's own reference, needed for decryption. Indirect
    /// `/Filter`, `/DecodeParms` and `/Length` entries are resolved; an
    /// indirect `/Length` shorter than the payload truncates it.
    ///
    /// # Errors
    ///
    /// [`Error::Encrypted`] when the document is encrypted and no crypt
    /// transform was supplied; filter errors from the chain.
    pub fn decode_stream(&mut self, stream: &Object, id: ObjectRef) -> Result<Vec<u8>> {
        let (dict, data) = match stream {
            Object::Stream {
                data,
                state: StreamState::Decoded,
                ..
            } => return Ok(data.to_vec()),
            Object::Stream { dict, data, .. } => (dict, data),
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "Stream".to_string(),
                    found: other.type_name().to_string(),
                })
            },
        };

        let mut dict = dict.clone();
        for key in ["Filter", "DecodeParms", "DP"] {
            if let Some(value) = dict.get(key).cloned() {
                let resolved = match self.resolve(&value)? {
                    Object::Array(items) => {
                        Object::Array(items.iter().map(|item| self.resolve(item)).collect::<Result<_>>()?)
                    },
                    other => other,
                };
                dict.insert(key.to_string(), resolved);
            }
        }

        let mut payload: &[u8] = data;
        if let Some(Object::Reference(length_ref)) = dict.get("Length") {
            let length_ref = *length_ref;
            let length = self.get(length_ref)?.as_integer().and_then(|n| usize::try_from(n).ok());
            match length {
                Some(length) if length < payload.len() => payload = &payload[..length],
                Some(_) => {},
                None => log::warn!("Stream {} has a non-integer indirect /Length", id),
            }
        }

        let decrypted;
        if self.crypt_applies(id, stream) {
            let crypt = self.crypt.as_ref().ok_or(Error::Encrypted(id))?;
            decrypted = crypt.decrypt(id, payload)?;
            payload = &decrypted;
        }

        let chain = crate::filters::FilterChain::from_dict(&dict)?;
        crate::filters::default_registry().decode(payload, &chain, &self.options)
    }

    /// Structural validation.
    ///
    /// Checks that the catalog is a `/Catalog` dictionary, that every reference
    /// reachable from the trailer resolves, and that every embedded file entry
    /// is a file specification whose `/EF` stream resolves.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPdf`] listing the problems found.
    pub fn validate(&mut self) -> Result<()> {
        let mut problems = Vec::new();

        let catalog = self.catalog()?;
        if catalog.get("Type").and_then(Object::as_name) != Some("Catalog") {
            problems.push(format!("object {} is not a /Catalog", self.trailer.root));
        }

        let (_, broken) = self.walk();
        for (id, e) in broken {
            problems.push(format!("reference {} does not resolve: {}", id, e));
        }

        if let Some(names) = self.deref_dict_opt(&catalog, "Names")? {
            if let Some(tree) = names.as_dict().and_then(|d| d.get("EmbeddedFiles")).cloned() {
                let tree = NameTree::read(self, &tree)?;
                for (name, value) in tree.entries() {
                    if let Err(e) = self.check_file_spec(value) {
                        problems.push(format!("embedded file {:?}: {}", String::from_utf8_lossy(name), e));
                    }
                }
            }
        }

        if problems.is_empty() {
            log::debug!("Validation passed");
            Ok(())
        } else {
            for problem in &problems {
                log::error!("Validation: {}", problem);
            }
            Err(Error::InvalidPdf(format!(
                "{} structural problem(s): {}",
                problems.len(),
                problems.join("; ")
            )))
        }
    }

    fn check_file_spec(&mut self, value: &Object) -> Result<()> {
        let spec = self.resolve(value)?;
        let spec = spec.expect_dict()?;
        if spec.get("Type").and_then(Object::as_name).is_some_and(|t| t != "Filespec") {
            return Err(Error::InvalidPdf("not a /Filespec dictionary".to_string()));
        }
        let ef = self.deref_dict(spec, "EF")?;
        let ef = ef.expect_dict()?;
        let stream = match ef.get("F").or_else(|| ef.get("UF")) {
            Some(entry) => self.resolve(entry)?,
            None => return Err(Error::MissingKey("F".to_string())),
        };
        if !stream.is_stream() {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: stream.type_name().to_string(),
            });
        }
        Ok(())
    }

    /// Write the document to `path`.
    pub fn save(&mut self, path: impl AsRef<Path>, options: &SaveOptions) -> Result<()> {
        let bytes = writer::write(self, options)?;
        std::fs::write(path.as_ref(), bytes)?;
        log::info!("Saved {}", path.as_ref().display());
        Ok(())
    }

    /// Original file bytes.
    pub(crate) fn original_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Objects created or replaced since load.
    pub(crate) fn modified_objects(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.modified.iter().copied()
    }

    /// Freed object numbers with their next generation.
    pub(crate) fn freed_objects(&self) -> impl Iterator<Item = (u32, u16)> + '_ {
        self.freed.iter().map(|(&num, &gen)| (num, gen))
    }

    /// One more than the highest object number in use or handed out.
    pub(crate) fn object_count(&self) -> u32 {
        self.next_number
    }
}

/// Read the `%PDF-M.m` header, which may be preceded by junk.
fn parse_header(data: &[u8], options: &ParserOptions) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let start = crate::parser::find_keyword(window, b"%PDF-").ok_or_else(|| {
        Error::InvalidHeader(String::from_utf8_lossy(&window[..window.len().min(8)]).into_owned())
    })?;
    if start > 0 {
        log::warn!("{} bytes of junk before the PDF header", start);
    }

    match data.get(start + 5..start + 8) {
        Some([major, b'.', minor]) if major.is_ascii_digit() && minor.is_ascii_digit() => {
            Ok((major - b'0', minor - b'0'))
        },
        _ if options.strict => Err(Error::InvalidHeader(
            String::from_utf8_lossy(&data[start..data.len().min(start + 8)]).into_owned(),
        )),
        _ => {
            log::warn!("Unreadable PDF version in header; assuming 1.4");
            Ok((1, 4))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::Rc4Transform;

    /// Build a classic PDF with the given (number, body) objects. Gaps become
    /// free entries.
    fn build_pdf(objects: &[(u32, &str)], trailer_extra: &str) -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = BTreeMap::new();
        for (num, body) in objects {
            offsets.insert(*num, pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", num, body).as_bytes());
        }
        let size = offsets.keys().max().map_or(1, |max| max + 1);
        let xref_offset = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
        for num in 0..size {
            match offsets.get(&num) {
                Some(offset) => pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes()),
                None => pdf.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF\n",
                size, trailer_extra, xref_offset
            )
            .as_bytes(),
        );
        pdf
    }

    fn simple_pdf() -> Vec<u8> {
        build_pdf(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R >>"),
                (2, "<< /Type /Pages /Kids [] /Count 0 >>"),
                (3, "(hello)"),
            ],
            "",
        )
    }

    #[test]
    fn test_load_and_get() {
        let mut doc = Document::load(simple_pdf()).unwrap();
        assert_eq!(doc.version(), (1, 4));
        assert!(!doc.was_repaired());
        assert_eq!(doc.xref().state(), XRefState::BuiltFromXRefSections);
        assert_eq!(doc.get(ObjectRef::new(3, 0)).unwrap(), Object::string("hello"));
        assert!(doc.catalog().unwrap().contains_key("Pages"));
        assert!(matches!(doc.get(ObjectRef::new(9, 0)), Err(Error::ObjectNotFound(9, 0))));
        assert!(matches!(doc.get(ObjectRef::new(3, 1)), Err(Error::ObjectNotFound(3, 1))));
    }

    #[test]
    fn test_invalid_header() {
        assert!(matches!(Document::load(b"GIF89a...".to_vec()), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_junk_before_header() {
        let mut pdf = b"junk\n".to_vec();
        pdf.extend_from_slice(&simple_pdf());
        let mut doc = Document::load(pdf).unwrap();
        // Offsets are shifted by the junk, so the table gets rebuilt
        assert!(doc.was_repaired());
        assert_eq!(doc.get(ObjectRef::new(3, 0)).unwrap(), Object::string("hello"));
    }

    #[test]
    fn test_corrupted_offset_triggers_repair() {
        let pdf = simple_pdf();
        let text = String::from_utf8(pdf).unwrap();
        let good = format!("{:010} 00000 n ", text.find("2 0 obj").unwrap());
        let corrupted = text.replacen(&good, "0000000003 00000 n ", 1);

        let mut doc = Document::load(corrupted.clone().into_bytes()).unwrap();
        assert!(doc.was_repaired());
        assert_eq!(doc.catalog_ref(), ObjectRef::new(1, 0));
        assert!(doc.get(ObjectRef::new(2, 0)).unwrap().has_type("Pages"));
        assert_eq!(doc.reachable_objects(), vec![ObjectRef::new(1, 0), ObjectRef::new(2, 0)]);

        let strict = Document::load_with_options(corrupted.into_bytes(), ParserOptions::strict());
        assert!(strict.is_err());
    }

    #[test]
    fn test_missing_xref_triggers_repair() {
        let pdf = b"%PDF-1.3\n1 0 obj\n<< /Type /Catalog >>\nendobj\n".to_vec();
        let mut doc = Document::load(pdf).unwrap();
        assert!(doc.was_repaired());
        assert!(doc.catalog().unwrap().contains_key("Type"));
    }

    #[test]
    fn test_unrecoverable_document() {
        let pdf = b"%PDF-1.3\n1 0 obj\n<< /Type /Pages >>\nendobj\n".to_vec();
        assert!(matches!(Document::load(pdf), Err(Error::NoCatalog)));
    }

    #[test]
    fn test_resolve_cycle() {
        let pdf = build_pdf(&[(1, "<< /Type /Catalog /A 2 0 R >>"), (2, "3 0 R"), (3, "2 0 R")], "");
        let mut doc = Document::load(pdf).unwrap();
        let err = doc.resolve(&Object::Reference(ObjectRef::new(2, 0))).unwrap_err();
        assert!(matches!(err, Error::CircularReference(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::Reference);
    }

    #[test]
    fn test_reachable_objects_terminates_on_dictionary_cycle() {
        let pdf = build_pdf(
            &[
                (1, "<< /Type /Catalog /Next 2 0 R >>"),
                (2, "<< /Back 1 0 R /Next 3 0 R >>"),
                (3, "<< /Back 2 0 R /Missing 7 0 R >>"),
            ],
            "",
        );
        let mut doc = Document::load(pdf).unwrap();
        assert_eq!(doc.reachable_objects().len(), 3);

        let counts = doc.reference_counts();
        assert_eq!(counts[&ObjectRef::new(1, 0)], 2);
        assert_eq!(counts[&ObjectRef::new(2, 0)], 2);

        // The dangling reference to object 7 fails validation
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_put_update_free() {
        let mut doc = Document::load(simple_pdf()).unwrap();
        let id = doc.put(Object::Integer(7));
        assert_eq!(id, ObjectRef::new(4, 0));
        assert_eq!(doc.get(id).unwrap(), Object::Integer(7));
        assert!(doc.is_modified());

        doc.update(id, Object::Integer(8)).unwrap();
        assert_eq!(doc.get(id).unwrap(), Object::Integer(8));

        doc.free(ObjectRef::new(3, 0)).unwrap();
        assert!(matches!(doc.get(ObjectRef::new(3, 0)), Err(Error::ObjectNotFound(3, 0))));
        assert!(doc.update(ObjectRef::new(3, 0), Object::Null).is_err());
        assert!(doc.free(ObjectRef::new(3, 0)).is_err());
        assert_eq!(doc.freed_objects().collect::<Vec<_>>(), vec![(3, 1)]);

        // Freed numbers are not reused
        assert_eq!(doc.put(Object::Null), ObjectRef::new(5, 0));
    }

    #[test]
    fn test_deref_dict() {
        let pdf = build_pdf(&[(1, "<< /Type /Catalog /Count 2 0 R /Nothing null >>"), (2, "42")], "");
        let mut doc = Document::load(pdf).unwrap();
        let catalog = doc.catalog().unwrap();
        assert_eq!(doc.deref_dict(&catalog, "Count").unwrap(), Object::Integer(42));
        assert!(matches!(doc.deref_dict(&catalog, "Absent"), Err(Error::MissingKey(_))));
        assert_eq!(doc.deref_dict_opt(&catalog, "Absent").unwrap(), None);
        assert_eq!(doc.deref_dict_opt(&catalog, "Nothing").unwrap(), None);
    }

    #[test]
    fn test_decode_stream_with_indirect_length() {
        let pdf = build_pdf(
            &[
                (1, "<< /Type /Catalog >>"),
                (2, "<< /Length 3 0 R /Filter /ASCIIHexDecode >>\nstream\n414243>junk\nendstream"),
                (3, "7"),
            ],
            "",
        );
        let mut doc = Document::load(pdf).unwrap();
        let id = ObjectRef::new(2, 0);
        let stream = doc.get(id).unwrap();
        assert_eq!(doc.decode_stream(&stream, id).unwrap(), b"ABC");
    }

    #[test]
    fn test_new_document() {
        let mut doc = Document::new();
        assert!(doc.catalog().unwrap().contains_key("Pages"));
        assert_eq!(doc.reachable_objects().len(), 2);
        doc.validate().unwrap();
    }

    #[test]
    fn test_encrypted_strings_and_streams() {
        let crypt = Rc4Transform::new(vec![1, 2, 3, 4, 5]);
        let secret = crypt.encrypt(ObjectRef::new(3, 0), b"secret").unwrap();
        let payload = crypt.encrypt(ObjectRef::new(4, 0), b"stream text").unwrap();
        let hex: String = secret.iter().map(|b| format!("{:02X}", b)).collect();

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        let bodies: Vec<Vec<u8>> = vec![
            b"<< /Type /Catalog >>".to_vec(),
            b"<< /Filter /Standard /V 1 /R 2 /O (owner) >>".to_vec(),
            format!("<{}>", hex).into_bytes(),
            [format!("<< /Length {} >>\nstream\n", payload.len()).as_bytes(), &payload[..], &b"\nendstream"[..]].concat(),
        ];
        for (i, body) in bodies.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
            pdf.extend_from_slice(body);
            pdf.extend_from_slice(b"\nendobj\n");
        }
        let xref_offset = pdf.len();
        pdf.extend_from_slice(b"xref\n0 5\n0000000000 65535 f \n");
        for offset in &offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size 5 /Root 1 0 R /Encrypt 2 0 R >>\nstartxref\n{}\n%%EOF\n",
                xref_offset
            )
            .as_bytes(),
        );

        let mut doc = Document::load_with_crypt(pdf.clone(), Box::new(crypt)).unwrap();
        assert_eq!(doc.get(ObjectRef::new(3, 0)).unwrap(), Object::string("secret"));
        // The encryption dictionary is never transformed
        let encrypt = doc.get(ObjectRef::new(2, 0)).unwrap();
        assert_eq!(encrypt.as_dict().unwrap()["O"], Object::string("owner"));
        let stream = doc.get(ObjectRef::new(4, 0)).unwrap();
        assert_eq!(doc.decode_stream(&stream, ObjectRef::new(4, 0)).unwrap(), b"stream text");

        let mut locked = Document::load(pdf).unwrap();
        let stream = locked.get(ObjectRef::new(4, 0)).unwrap();
        assert!(matches!(
            locked.decode_stream(&stream, ObjectRef::new(4, 0)),
            Err(Error::Encrypted(_))
        ));
    }

    #[test]
    fn test_compressed_object_after_repair() {
        let payload = b"5 0 << /Type /Catalog /Pages 6 0 R >>";
        let mut pdf = b"%PDF-1.5\n".to_vec();
        pdf.extend_from_slice(
            format!("3 0 obj\n<< /Type /ObjStm /N 1 /First 4 /Length {} >>\nstream\n", payload.len()).as_bytes(),
        );
        pdf.extend_from_slice(payload);
        pdf.extend_from_slice(b"\nendstream\nendobj\n6 0 obj\n<< /Type /Pages /Count 0 >>\nendobj\n");

        let mut doc = Document::load(pdf).unwrap();
        assert_eq!(doc.catalog_ref(), ObjectRef::new(5, 0));
        let catalog = doc.catalog().unwrap();
        assert!(doc.deref_dict(&catalog, "Pages").unwrap().has_type("Pages"));
    }
}
