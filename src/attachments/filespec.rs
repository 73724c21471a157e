//! File specification dictionaries and embedded file streams.
//!
//! An attachment is stored as two objects:
//!
//! ```text
//! << /Type /Filespec /F (name) /UF (name) /Desc (...) /EF << /F 12 0 R /UF 12 0 R >> >>
//! 12 0 obj << /Type /EmbeddedFile /Filter /FlateDecode
//!             /Params << /Size n /CheckSum <md5> /ModDate (D:...) /CreationDate (D:...) >> >>
//! stream ... endstream
//! ```

use super::descriptor::{decode_text_string, encode_text_string, format_pdf_date, hex_lower, parse_pdf_date, Attachment};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use chrono::{DateTime, Utc};

/// A new embedded file, ready to be turned into objects.
#[derive(Debug, Clone)]
pub(crate) struct EmbeddedFile {
    pub name: String,
    pub data: Vec<u8>,
    pub description: Option<String>,
    pub mod_time: Option<DateTime<Utc>>,
    pub creation_time: DateTime<Utc>,
}

impl EmbeddedFile {
    /// Build the embedded file stream dictionary.
    ///
    /// `filter` is declared on the stream; the payload itself stays plaintext
    /// until the writer encodes it.
    pub fn build_stream_dict(&self, filter: Option<&str>) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::name("EmbeddedFile"));
        if let Some(filter) = filter {
            dict.insert("Filter".to_string(), Object::name(filter));
        }

        let mut params = Dictionary::new();
        params.insert("Size".to_string(), Object::Integer(self.data.len() as i64));
        params.insert("CheckSum".to_string(), Object::String(md5_hash(&self.data)));
        params.insert("CreationDate".to_string(), Object::String(format_pdf_date(&self.creation_time)));
        if let Some(mod_time) = &self.mod_time {
            params.insert("ModDate".to_string(), Object::String(format_pdf_date(mod_time)));
        }
        dict.insert("Params".to_string(), Object::Dictionary(params));

        dict
    }

    /// Build the file specification dictionary pointing at `stream`.
    pub fn build_filespec(&self, stream: ObjectRef) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::name("Filespec"));
        dict.insert("F".to_string(), Object::String(encode_text_string(&self.name)));
        dict.insert("UF".to_string(), Object::String(encode_text_string(&self.name)));
        if let Some(desc) = &self.description {
            dict.insert("Desc".to_string(), Object::String(encode_text_string(desc)));
        }

        let mut ef = Dictionary::new();
        ef.insert("F".to_string(), Object::Reference(stream));
        ef.insert("UF".to_string(), Object::Reference(stream));
        dict.insert("EF".to_string(), Object::Dictionary(ef));

        dict
    }
}

/// MD5 hash function for checksum calculation.
pub(crate) fn md5_hash(data: &[u8]) -> Vec<u8> {
    use md5::{Digest, Md5};

    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// The embedded file stream a file specification points at, with its
/// reference. `/EF /F` is preferred over `/EF /UF`.
pub(crate) fn embedded_stream(doc: &mut Document, filespec: &Dictionary) -> Result<(ObjectRef, Object)> {
    let ef = doc.deref_dict(filespec, "EF")?;
    let ef = ef.expect_dict()?;
    let entry = ef
        .get("F")
        .or_else(|| ef.get("UF"))
        .ok_or_else(|| Error::MissingKey("F".to_string()))?;

    let Some(id) = entry.as_reference() else {
        return Err(Error::InvalidObjectType {
            expected: "Reference".to_string(),
            found: entry.type_name().to_string(),
        });
    };
    let stream = doc.get(id)?;
    if !stream.is_stream() {
        return Err(Error::InvalidObjectType {
            expected: "Stream".to_string(),
            found: stream.type_name().to_string(),
        });
    }
    Ok((id, stream))
}

/// Every object a file specification owns through `/EF`: the `/EF`
/// dictionary itself when indirect, and the streams it names.
pub(crate) fn owned_objects(doc: &mut Document, filespec: &Dictionary) -> Result<Vec<ObjectRef>> {
    let mut owned = Vec::new();
    let Some(ef) = filespec.get("EF") else {
        return Ok(owned);
    };
    if let Some(id) = ef.as_reference() {
        owned.push(id);
    }
    if let Some(ef) = doc.resolve(ef)?.as_dict() {
        for value in ef.values() {
            if let Some(id) = value.as_reference() {
                if !owned.contains(&id) {
                    owned.push(id);
                }
            }
        }
    }
    Ok(owned)
}

/// Build the descriptor for the name tree entry `key -> value`.
pub(crate) fn describe(doc: &mut Document, key: &[u8], value: &Object) -> Result<Attachment> {
    let filespec = doc.resolve(value)?;
    let filespec = filespec.expect_dict()?;

    let description = match doc.deref_dict_opt(filespec, "Desc")? {
        Some(Object::String(desc)) => decode_text_string(&desc),
        _ => String::new(),
    };

    let (_, stream) = embedded_stream(doc, filespec)?;
    let params = match stream.as_dict() {
        Some(dict) => doc.deref_dict_opt(dict, "Params")?,
        None => None,
    };
    let params = params.as_ref().and_then(Object::as_dict);

    let size = params
        .and_then(|p| p.get("Size"))
        .and_then(Object::as_integer)
        .and_then(|n| u64::try_from(n).ok());
    let mod_time = params
        .and_then(|p| p.get("ModDate"))
        .and_then(Object::as_string)
        .and_then(parse_pdf_date);
    let checksum = params
        .and_then(|p| p.get("CheckSum"))
        .and_then(Object::as_string)
        .map(hex_lower);

    Ok(Attachment {
        name: decode_text_string(key),
        description,
        mod_time,
        size,
        checksum,
    })
}
