//! Embedded files: list, add, extract and remove.
//!
//! Attachments live in the catalog's `/Names /EmbeddedFiles` name tree. Each
//! entry maps the attachment name to a file specification, which points at an
//! embedded file stream holding the payload. Every operation here is a plain
//! graph mutation through [`Document`]; nothing is written until the document
//! is saved.
//!
//! ## Example
//!
//! ```no_run
//! use pdf_graph::attachments::{add_attachments, list_attachments, AttachmentSource};
//! use pdf_graph::document::Document;
//!
//! let mut doc = Document::open("report.pdf")?;
//! add_attachments(&mut doc, vec![AttachmentSource::from_bytes("data.csv", "a,b\n1,2\n")], false)?;
//! for attachment in list_attachments(&mut doc)? {
//!     println!("{}", attachment);
//! }
//! # Ok::<(), pdf_graph::error::Error>(())
//! ```

mod descriptor;
mod filespec;

pub use descriptor::{
    decode_text_string, encode_text_string, format_pdf_date, parse_pdf_date, truncate_to_seconds, Attachment,
};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::filters::{canonical_name, FilterChain};
use crate::name_tree::NameTree;
use crate::object::{Dictionary, Object, ObjectRef};
use chrono::{DateTime, Utc};
use filespec::EmbeddedFile;
use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Filters that can encode arbitrary payloads. Image filters only pass
/// already-encoded data through.
const PAYLOAD_FILTERS: [&str; 5] = ["FlateDecode", "LZWDecode", "ASCIIHexDecode", "ASCII85Decode", "RunLengthDecode"];

/// How the collection view of a portfolio opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionView {
    /// Details list
    #[default]
    Details,
    /// Tiles
    Tile,
    /// Collection hidden; the first document is shown
    Hidden,
}

impl CollectionView {
    /// Get the PDF name for this view.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            CollectionView::Details => "D",
            CollectionView::Tile => "T",
            CollectionView::Hidden => "H",
        }
    }
}

/// Options for new attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentOptions {
    /// Filter declared on new embedded file streams; `None` stores payloads
    /// unfiltered
    pub compression: Option<String>,
    /// View written to `/Collection` when attachments are added with
    /// `use_collection`
    pub collection_view: CollectionView,
}

impl Default for AttachmentOptions {
    fn default() -> Self {
        Self {
            compression: Some("FlateDecode".to_string()),
            collection_view: CollectionView::default(),
        }
    }
}

impl AttachmentOptions {
    /// Set the compression filter.
    pub fn with_compression(mut self, filter: Option<&str>) -> Self {
        self.compression = filter.map(str::to_string);
        self
    }

    /// Set the collection view.
    pub fn with_collection_view(mut self, view: CollectionView) -> Self {
        self.collection_view = view;
        self
    }
}

/// Content for a new attachment.
pub struct AttachmentSource {
    /// Attachment name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Modification time recorded in `/Params /ModDate`
    pub mod_time: Option<DateTime<Utc>>,
    reader: Box<dyn Read>,
}

impl fmt::Debug for AttachmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentSource")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("mod_time", &self.mod_time)
            .finish_non_exhaustive()
    }
}

impl AttachmentSource {
    /// An attachment read from `reader` when it is added.
    pub fn from_reader(name: impl Into<String>, reader: impl Read + 'static) -> Self {
        Self {
            name: name.into(),
            description: None,
            mod_time: None,
            reader: Box::new(reader),
        }
    }

    /// An attachment with in-memory content.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::from_reader(name, std::io::Cursor::new(data.into()))
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the modification time.
    pub fn with_mod_time(mut self, time: DateTime<Utc>) -> Self {
        self.mod_time = Some(time);
        self
    }
}

/// An extracted attachment: its descriptor and the decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAttachment {
    /// Descriptor
    pub attachment: Attachment,
    /// Payload after the stream's filter chain is undone
    pub data: Vec<u8>,
}

/// Where the `/Names` dictionary lives.
enum NamesLocation {
    /// Direct value in the catalog (or absent)
    Catalog,
    /// Separate object
    Indirect(ObjectRef),
}

/// The catalog and its EmbeddedFiles tree, read for editing.
struct EmbeddedFiles {
    catalog: Dictionary,
    names: Dictionary,
    location: NamesLocation,
    tree: NameTree,
}

impl EmbeddedFiles {
    fn read(doc: &mut Document) -> Result<Self> {
        let catalog = doc.catalog()?;
        let (names, location) = match catalog.get("Names") {
            Some(Object::Reference(id)) => {
                let id = *id;
                match doc.get(id)? {
                    Object::Dictionary(dict) => (dict, NamesLocation::Indirect(id)),
                    other => {
                        return Err(Error::InvalidObjectType {
                            expected: "Dictionary".to_string(),
                            found: other.type_name().to_string(),
                        })
                    },
                }
            },
            Some(Object::Dictionary(dict)) => (dict.clone(), NamesLocation::Catalog),
            Some(other) if !other.is_null() => {
                return Err(Error::InvalidObjectType {
                    expected: "Dictionary".to_string(),
                    found: other.type_name().to_string(),
                })
            },
            _ => (Dictionary::new(), NamesLocation::Catalog),
        };

        let tree = match names.get("EmbeddedFiles") {
            Some(root) if !root.is_null() => NameTree::read(doc, root)?,
            _ => NameTree::new(),
        };

        Ok(Self {
            catalog,
            names,
            location,
            tree,
        })
    }

    /// Write the edited tree back and link it into the catalog.
    ///
    /// Old tree nodes are freed, except an indirect root, which is reused so
    /// references to it stay valid. An empty tree drops `/EmbeddedFiles` and
    /// an empty `/Names` dictionary is dropped in turn.
    fn store(mut self, doc: &mut Document) -> Result<()> {
        let old_root = self.names.get("EmbeddedFiles").and_then(Object::as_reference);
        let old_nodes: Vec<ObjectRef> = self.tree.nodes().to_vec();

        if self.tree.is_empty() {
            self.names.shift_remove("EmbeddedFiles");
            for node in old_nodes {
                free_if_live(doc, node)?;
            }
        } else {
            let root = Object::Dictionary(self.tree.write(doc));
            let root = match old_root.filter(|id| doc.is_live(*id)) {
                Some(id) => {
                    doc.update(id, root)?;
                    id
                },
                None => doc.put(root),
            };
            self.names.insert("EmbeddedFiles".to_string(), Object::Reference(root));
            for node in old_nodes.into_iter().filter(|node| *node != root) {
                free_if_live(doc, node)?;
            }
        }

        let catalog_ref = doc.catalog_ref();
        match self.location {
            NamesLocation::Indirect(id) if self.names.is_empty() => {
                self.catalog.shift_remove("Names");
                free_if_live(doc, id)?;
            },
            NamesLocation::Indirect(id) => doc.update(id, Object::Dictionary(self.names))?,
            NamesLocation::Catalog if self.names.is_empty() => {
                self.catalog.shift_remove("Names");
            },
            NamesLocation::Catalog => {
                self.catalog.insert("Names".to_string(), Object::Dictionary(self.names));
            },
        }
        doc.update(catalog_ref, Object::Dictionary(self.catalog))
    }
}

/// The entry whose key decodes to `name`. Keys written by other producers
/// may be UTF-16BE for plain ASCII or PDFDocEncoded, so raw bytes are not
/// compared.
fn find_entry(tree: &NameTree, name: &str) -> Option<(Vec<u8>, Object)> {
    tree.entries()
        .find(|(key, _)| decode_text_string(key) == name)
        .map(|(key, value)| (key.to_vec(), value.clone()))
}

fn free_if_live(doc: &mut Document, id: ObjectRef) -> Result<()> {
    if doc.is_live(id) {
        doc.free(id)?;
    }
    Ok(())
}

/// List every attachment in name tree order.
///
/// # Errors
///
/// Fails if the catalog, the name tree or any file specification is malformed.
pub fn list_attachments(doc: &mut Document) -> Result<Vec<Attachment>> {
    let files = EmbeddedFiles::read(doc)?;
    let mut attachments = Vec::with_capacity(files.tree.len());
    for (key, value) in files.tree.entries() {
        attachments.push(filespec::describe(doc, key, value)?);
    }
    log::debug!("Listed {} attachments", attachments.len());
    Ok(attachments)
}

/// Render a listing as pretty-printed JSON.
pub fn attachments_to_json(attachments: &[Attachment]) -> Result<String> {
    serde_json::to_string_pretty(attachments)
        .map_err(|e| Error::InvalidPdf(format!("JSON serialization failed: {}", e)))
}

/// Add attachments with the default [`AttachmentOptions`].
///
/// See [`add_attachments_with_options`].
pub fn add_attachments(doc: &mut Document, sources: Vec<AttachmentSource>, use_collection: bool) -> Result<()> {
    add_attachments_with_options(doc, sources, use_collection, &AttachmentOptions::default())
}

/// Add attachments.
///
/// Every source is read and every name checked before the document is
/// touched, so a failure leaves the graph unmodified. With `use_collection`
/// the catalog also gets a `/Collection` dictionary, turning the document
/// into a portfolio.
///
/// # Errors
///
/// [`Error::DuplicateAttachment`] if a name already exists or repeats within
/// `sources`, [`Error::UnsupportedFilter`] if the configured compression
/// filter cannot encode, [`Error::Io`] if a source fails while being read.
pub fn add_attachments_with_options(
    doc: &mut Document,
    sources: Vec<AttachmentSource>,
    use_collection: bool,
    options: &AttachmentOptions,
) -> Result<()> {
    if let Some(filter) = &options.compression {
        if !PAYLOAD_FILTERS.contains(&canonical_name(filter)) {
            return Err(Error::UnsupportedFilter(filter.clone()));
        }
    }

    let mut files = EmbeddedFiles::read(doc)?;
    let now = truncate_to_seconds(Utc::now());
    let existing: HashSet<String> = files.tree.entries().map(|(key, _)| decode_text_string(key)).collect();
    let mut seen = HashSet::new();
    let mut pending = Vec::with_capacity(sources.len());

    for mut source in sources {
        if existing.contains(&source.name) || !seen.insert(source.name.clone()) {
            return Err(Error::DuplicateAttachment(source.name));
        }
        let mut data = Vec::new();
        source.reader.read_to_end(&mut data)?;
        pending.push(EmbeddedFile {
            name: source.name,
            data,
            description: source.description,
            mod_time: source.mod_time.map(truncate_to_seconds),
            creation_time: now,
        });
    }

    if pending.is_empty() {
        return Ok(());
    }

    for file in pending {
        let dict = file.build_stream_dict(options.compression.as_deref());
        let size = file.data.len();
        let stream = doc.put(Object::decoded_stream(dict, file.data.clone()));
        let spec = doc.put(Object::Dictionary(file.build_filespec(stream)));
        files.tree.insert(encode_text_string(&file.name), Object::Reference(spec));
        log::info!("Attached {} ({} bytes) as {}", file.name, size, spec);
    }

    if use_collection && !files.catalog.contains_key("Collection") {
        let mut collection = Dictionary::new();
        collection.insert("Type".to_string(), Object::name("Collection"));
        collection.insert("View".to_string(), Object::name(options.collection_view.pdf_name()));
        files.catalog.insert("Collection".to_string(), Object::Dictionary(collection));
    }

    files.store(doc)
}

/// Add files from disk, named by their file name, with the file's
/// modification time.
pub fn add_attachment_files<P: AsRef<Path>>(doc: &mut Document, paths: &[P], use_collection: bool) -> Result<()> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{} has no file name", path.display()))))?;
        let file = std::fs::File::open(path)?;
        let modified = file.metadata()?.modified().ok().map(DateTime::<Utc>::from);

        let mut source = AttachmentSource::from_reader(name, file);
        source.mod_time = modified;
        sources.push(source);
    }
    add_attachments(doc, sources, use_collection)
}

/// Extract attachments.
///
/// `None` or an empty list extracts everything. Each requested name gets its
/// own result; an unknown name yields [`Error::AttachmentNotFound`] without
/// affecting the others. Names match the decoded name tree keys, as listed.
///
/// A payload whose decoded length or MD5 disagrees with `/Params` fails with
/// [`Error::Decode`] instead of returning partially recovered bytes.
pub fn extract_attachments(doc: &mut Document, names: Option<&[&str]>) -> Vec<Result<ExtractedAttachment>> {
    let files = match EmbeddedFiles::read(doc) {
        Ok(files) => files,
        Err(e) => return vec![Err(e)],
    };

    match names {
        Some(names) if !names.is_empty() => names
            .iter()
            .map(|name| match find_entry(&files.tree, name) {
                Some((key, value)) => extract_one(doc, &key, &value),
                None => Err(Error::AttachmentNotFound(name.to_string())),
            })
            .collect(),
        _ => files
            .tree
            .entries()
            .map(|(key, value)| extract_one(doc, key, value))
            .collect(),
    }
}

fn extract_one(doc: &mut Document, key: &[u8], value: &Object) -> Result<ExtractedAttachment> {
    let attachment = filespec::describe(doc, key, value)?;
    let spec = doc.resolve(value)?;
    let (id, stream) = filespec::embedded_stream(doc, spec.expect_dict()?)?;
    let data = doc.decode_stream(&stream, id)?;

    // Lenient decoders may recover a prefix of a damaged payload
    if let Some(size) = attachment.size {
        if size != data.len() as u64 {
            log::error!("{}: /Size says {} bytes, decoded {}", attachment.name, size, data.len());
            return Err(Error::decode(
                &payload_filter(&stream),
                format!("{}: decoded {} bytes, /Params /Size is {}", attachment.name, data.len(), size),
            ));
        }
    }
    if let Some(checksum) = &attachment.checksum {
        let actual = descriptor::hex_lower(&filespec::md5_hash(&data));
        if *checksum != actual {
            log::error!("{}: checksum mismatch", attachment.name);
            return Err(Error::decode(
                &payload_filter(&stream),
                format!("{}: MD5 {} does not match /Params /CheckSum {}", attachment.name, actual, checksum),
            ));
        }
    }

    log::debug!("Extracted {} ({} bytes)", attachment.name, data.len());
    Ok(ExtractedAttachment { attachment, data })
}

/// First filter declared on an embedded file stream.
fn payload_filter(stream: &Object) -> String {
    stream
        .as_dict()
        .and_then(|dict| FilterChain::from_dict(dict).ok())
        .and_then(|chain| chain.stages().first().map(|stage| canonical_name(&stage.name).to_string()))
        .unwrap_or_else(|| "EmbeddedFile".to_string())
}

/// Extract attachments into `dir`, one file per attachment named after it.
///
/// Unknown names are logged and skipped; any other failure stops the
/// extraction. Returns the paths written.
pub fn extract_attachments_to_dir(
    doc: &mut Document,
    names: Option<&[&str]>,
    dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for result in extract_attachments(doc, names) {
        let extracted = match result {
            Ok(extracted) => extracted,
            Err(Error::AttachmentNotFound(name)) => {
                log::warn!("No attachment named {}", name);
                continue;
            },
            Err(e) => return Err(e),
        };
        // Only the final component, so a crafted name cannot escape `dir`
        let file_name = Path::new(&extracted.attachment.name)
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "attachment".into());
        let path = dir.join(file_name);
        std::fs::write(&path, &extracted.data)?;
        log::info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Remove attachments.
///
/// `None` or an empty list removes everything. Unknown names are logged and
/// skipped. Removed file specifications are freed, together with the embedded
/// file streams no other live object still references. Returns whether
/// anything was removed.
pub fn remove_attachments(doc: &mut Document, names: Option<&[&str]>) -> Result<bool> {
    let mut files = EmbeddedFiles::read(doc)?;
    if files.tree.is_empty() {
        log::debug!("No attachments to remove");
        return Ok(false);
    }

    let mut removed = Vec::new();
    match names {
        Some(names) if !names.is_empty() => {
            for name in names {
                let key = find_entry(&files.tree, name).map(|(key, _)| key);
                match key.and_then(|key| files.tree.remove(&key)) {
                    Some(value) => removed.push(value),
                    None => log::warn!("No attachment named {}; skipping", name),
                }
            }
        },
        _ => {
            let keys: Vec<Vec<u8>> = files.tree.entries().map(|(key, _)| key.to_vec()).collect();
            for key in keys {
                removed.extend(files.tree.remove(&key));
            }
        },
    }

    if removed.is_empty() {
        return Ok(false);
    }
    if files.tree.is_empty() {
        files.catalog.shift_remove("Collection");
    }
    files.store(doc)?;

    // Unlinked now; anything still counted is shared with a live object
    let counts = doc.reference_counts();
    let unreferenced = |id: &ObjectRef| counts.get(id).copied().unwrap_or(0) == 0;
    for value in &removed {
        let spec = doc.resolve(value)?;
        let owned = match spec.as_dict() {
            Some(dict) => filespec::owned_objects(doc, dict)?,
            None => Vec::new(),
        };
        if let Some(id) = value.as_reference().filter(|id| unreferenced(id)) {
            free_if_live(doc, id)?;
        }
        for id in owned.into_iter().filter(|id| unreferenced(id)) {
            free_if_live(doc, id)?;
        }
    }

    log::info!("Removed {} attachment(s)", removed.len());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{write_full, SaveOptions};
    use chrono::TimeZone;

    fn names(doc: &mut Document) -> Vec<String> {
        list_attachments(doc).unwrap().into_iter().map(|a| a.name).collect()
    }

    fn reload(doc: &mut Document) -> Document {
        let bytes = write_full(doc, &SaveOptions::default()).unwrap();
        Document::load(bytes).unwrap()
    }

    #[test]
    fn test_empty_document_has_no_attachments() {
        let mut doc = Document::new();
        assert!(list_attachments(&mut doc).unwrap().is_empty());
        assert!(!remove_attachments(&mut doc, None).unwrap());
        assert!(extract_attachments(&mut doc, None).is_empty());
    }

    #[test]
    fn test_add_list_extract() {
        let mut doc = Document::new();
        let when = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 1).unwrap();
        add_attachments(
            &mut doc,
            vec![
                AttachmentSource::from_bytes("b.txt", "bee").with_description("second"),
                AttachmentSource::from_bytes("a.txt", "ay").with_mod_time(when),
            ],
            false,
        )
        .unwrap();

        let mut doc = reload(&mut doc);
        let list = list_attachments(&mut doc).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "a.txt");
        assert_eq!(list[0].mod_time, Some(when));
        assert_eq!(list[0].size, Some(2));
        assert_eq!(list[1].to_string(), "b.txt (second)");

        let extracted = extract_attachments(&mut doc, Some(&["b.txt", "missing.txt"]));
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[0].as_ref().unwrap().data, b"bee");
        assert!(matches!(&extracted[1], Err(Error::AttachmentNotFound(name)) if name == "missing.txt"));

        // Payloads are stored compressed
        let catalog = doc.catalog().unwrap();
        let names = doc.deref_dict(&catalog, "Names").unwrap();
        let tree = NameTree::read(&mut doc, &names.as_dict().unwrap()["EmbeddedFiles"]).unwrap();
        let spec = doc.resolve(tree.get(b"a.txt").unwrap()).unwrap();
        let (_, stream) = filespec::embedded_stream(&mut doc, spec.as_dict().unwrap()).unwrap();
        assert_eq!(stream.as_dict().unwrap()["Filter"], Object::name("FlateDecode"));
    }

    #[test]
    fn test_duplicate_leaves_document_unmodified() {
        let mut doc = Document::new();
        add_attachments(&mut doc, vec![AttachmentSource::from_bytes("x", "1")], false).unwrap();
        let mut doc = reload(&mut doc);

        let err = add_attachments(
            &mut doc,
            vec![AttachmentSource::from_bytes("y", "2"), AttachmentSource::from_bytes("x", "3")],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateAttachment(name) if name == "x"));
        assert!(!doc.is_modified());

        let err = add_attachments(
            &mut doc,
            vec![AttachmentSource::from_bytes("z", "1"), AttachmentSource::from_bytes("z", "2")],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateAttachment(_)));
        assert_eq!(names(&mut doc), vec!["x"]);
    }

    #[test]
    fn test_failing_source_leaves_document_unmodified() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "device gone"))
            }
        }

        let mut doc = reload(&mut Document::new());
        let err = add_attachments(
            &mut doc,
            vec![AttachmentSource::from_bytes("ok", "1"), AttachmentSource::from_reader("bad", Broken)],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!doc.is_modified());
    }

    #[test]
    fn test_unsupported_compression() {
        let mut doc = Document::new();
        let options = AttachmentOptions::default().with_compression(Some("DCTDecode"));
        let result = add_attachments_with_options(
            &mut doc,
            vec![AttachmentSource::from_bytes("a", "1")],
            false,
            &options,
        );
        assert!(matches!(result, Err(Error::UnsupportedFilter(_))));
    }

    #[test]
    fn test_uncompressed_and_collection() {
        let mut doc = Document::new();
        let options = AttachmentOptions::default()
            .with_compression(None)
            .with_collection_view(CollectionView::Tile);
        add_attachments_with_options(&mut doc, vec![AttachmentSource::from_bytes("a", "plain")], true, &options).unwrap();

        let mut doc = reload(&mut doc);
        let catalog = doc.catalog().unwrap();
        let collection = catalog["Collection"].as_dict().unwrap();
        assert_eq!(collection["View"], Object::name("T"));

        let extracted = extract_attachments(&mut doc, None);
        assert_eq!(extracted[0].as_ref().unwrap().data, b"plain");

        remove_attachments(&mut doc, None).unwrap();
        assert!(!doc.catalog().unwrap().contains_key("Collection"));
    }

    #[test]
    fn test_remove_frees_objects() {
        let mut doc = Document::new();
        add_attachments(
            &mut doc,
            vec![AttachmentSource::from_bytes("keep", "k"), AttachmentSource::from_bytes("drop", "d")],
            false,
        )
        .unwrap();
        let mut doc = reload(&mut doc);
        let before = doc.reachable_objects().len();

        assert!(remove_attachments(&mut doc, Some(&["drop", "unknown"])).unwrap());
        assert_eq!(names(&mut doc), vec!["keep"]);
        // Filespec and stream freed
        assert_eq!(doc.freed_objects().count(), 2);
        assert_eq!(doc.reachable_objects().len(), before - 2);

        assert!(!remove_attachments(&mut doc, Some(&["unknown"])).unwrap());
        assert!(remove_attachments(&mut doc, None).unwrap());
        assert!(list_attachments(&mut doc).unwrap().is_empty());
        assert!(!doc.catalog().unwrap().contains_key("Names"));
        doc.validate().unwrap();
    }

    #[test]
    fn test_shared_stream_survives_removal() {
        let mut doc = Document::new();
        add_attachments(&mut doc, vec![AttachmentSource::from_bytes("a", "shared")], false).unwrap();
        let mut doc = reload(&mut doc);

        // A second filespec pointing at the same stream, linked from the catalog
        let catalog = doc.catalog().unwrap();
        let names = doc.deref_dict(&catalog, "Names").unwrap();
        let tree = NameTree::read(&mut doc, &names.as_dict().unwrap()["EmbeddedFiles"]).unwrap();
        let spec_ref = tree.get(b"a").and_then(Object::as_reference).unwrap();
        let spec = doc.get(spec_ref).unwrap();
        let (stream, _) = filespec::embedded_stream(&mut doc, spec.as_dict().unwrap()).unwrap();
        let copy = doc.put(spec.clone());
        let root = doc.catalog_ref();
        let mut catalog = doc.catalog().unwrap();
        catalog.insert("AF".to_string(), Object::Array(vec![Object::Reference(copy)]));
        doc.update(root, Object::Dictionary(catalog)).unwrap();

        assert!(remove_attachments(&mut doc, Some(&["a"])).unwrap());
        assert!(!doc.is_live(spec_ref));
        assert!(doc.is_live(stream));
        doc.validate().unwrap();
    }

    #[test]
    fn test_add_then_remove_restores_names() {
        let mut doc = Document::new();
        add_attachments(&mut doc, vec![AttachmentSource::from_bytes("base", "0")], false).unwrap();
        let mut doc = reload(&mut doc);

        add_attachments(&mut doc, vec![AttachmentSource::from_bytes("x", "1")], false).unwrap();
        assert_eq!(names(&mut doc), vec!["base", "x"]);
        assert!(remove_attachments(&mut doc, Some(&["x"])).unwrap());
        assert_eq!(names(&mut doc), vec!["base"]);
    }

    #[test]
    fn test_many_attachments_build_deep_tree() {
        let mut doc = Document::new();
        let count = crate::name_tree::NAME_TREE_LEAF_SIZE * 2 + 3;
        let sources = (0..count)
            .map(|i| AttachmentSource::from_bytes(format!("file{:03}.txt", i), format!("payload {}", i)))
            .collect();
        add_attachments(&mut doc, sources, false).unwrap();

        let mut doc = reload(&mut doc);
        let list = list_attachments(&mut doc).unwrap();
        assert_eq!(list.len(), count);
        assert_eq!(list[count - 1].name, format!("file{:03}.txt", count - 1));

        assert!(remove_attachments(&mut doc, Some(&["file000.txt"])).unwrap());
        let mut doc = reload(&mut doc);
        assert_eq!(list_attachments(&mut doc).unwrap().len(), count - 1);
        doc.validate().unwrap();
    }

    #[test]
    fn test_unicode_name() {
        let mut doc = Document::new();
        add_attachments(&mut doc, vec![AttachmentSource::from_bytes("\u{fc}bersicht.txt", "u")], false).unwrap();
        let mut doc = reload(&mut doc);
        assert_eq!(names(&mut doc), vec!["\u{fc}bersicht.txt"]);
        let extracted = extract_attachments(&mut doc, Some(&["\u{fc}bersicht.txt"]));
        assert_eq!(extracted[0].as_ref().unwrap().data, b"u");
    }

    #[test]
    fn test_find_entry_matches_decoded_keys() {
        let mut tree = NameTree::new();
        tree.insert(vec![0xFE, 0xFF, 0x00, 0x61], Object::Integer(1));
        tree.insert(b"caf\xe9".to_vec(), Object::Integer(2));
        tree.insert(b"plain".to_vec(), Object::Integer(3));

        assert_eq!(find_entry(&tree, "a"), Some((vec![0xFE, 0xFF, 0x00, 0x61], Object::Integer(1))));
        assert_eq!(find_entry(&tree, "caf\u{e9}").map(|(_, v)| v), Some(Object::Integer(2)));
        assert_eq!(find_entry(&tree, "plain").map(|(_, v)| v), Some(Object::Integer(3)));
        assert_eq!(find_entry(&tree, "missing"), None);
    }

    #[test]
    fn test_json_listing() {
        let mut doc = Document::new();
        add_attachments(&mut doc, vec![AttachmentSource::from_bytes("a.txt", "12345")], false).unwrap();
        let json = attachments_to_json(&list_attachments(&mut doc).unwrap()).unwrap();
        assert!(json.contains("\"name\": \"a.txt\""));
        assert!(json.contains("827ccb0eea8a706c4c34a16891f84e7b"));
    }
}
