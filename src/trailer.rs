//! The document trailer.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};

/// Typed view of the trailer entries this crate reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct Trailer {
    /// `/Root`: the document catalog
    pub root: ObjectRef,
    /// `/Info`: the document information dictionary
    pub info: Option<ObjectRef>,
    /// `/Encrypt`: usually a reference, occasionally a direct dictionary
    pub encrypt: Option<Object>,
    /// `/ID`: the two file identifiers
    pub id: Option<[Vec<u8>; 2]>,
    /// `/Prev`: offset of the previous xref section
    pub prev: Option<usize>,
    /// `/XRefStm`: offset of the hidden xref stream in a hybrid file
    pub xref_stm: Option<usize>,
    /// `/Size`: one more than the highest object number
    pub size: u32,
}

impl Trailer {
    /// A trailer for a fresh document with the given catalog.
    pub fn new(root: ObjectRef) -> Self {
        Self {
            root,
            info: None,
            encrypt: None,
            id: None,
            prev: None,
            xref_stm: None,
            size: root.id + 1,
        }
    }

    /// Read a trailer (or xref stream) dictionary.
    ///
    /// # Errors
    ///
    /// [`Error::NoCatalog`] when `/Root` is missing or not a reference.
    pub fn from_dict(dict: &Dictionary) -> Result<Self> {
        let root = dict.get("Root").and_then(Object::as_reference).ok_or(Error::NoCatalog)?;

        let id = dict.get("ID").and_then(Object::as_array).and_then(|ids| match ids.as_slice() {
            [Object::String(first), Object::String(second)] => Some([first.clone(), second.clone()]),
            _ => {
                log::debug!("Ignoring malformed trailer /ID");
                None
            },
        });
        let offset = |key: &str| {
            dict.get(key)
                .and_then(Object::as_integer)
                .and_then(|v| usize::try_from(v).ok())
        };

        Ok(Self {
            root,
            info: dict.get("Info").and_then(Object::as_reference),
            encrypt: dict.get("Encrypt").filter(|o| !o.is_null()).cloned(),
            id,
            prev: offset("Prev"),
            xref_stm: offset("XRefStm"),
            size: dict
                .get("Size")
                .and_then(Object::as_integer)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(root.id + 1),
        })
    }

    /// Reference to the encryption dictionary, when it is indirect.
    pub fn encrypt_ref(&self) -> Option<ObjectRef> {
        self.encrypt.as_ref().and_then(Object::as_reference)
    }

    /// True if the document declares encryption.
    pub fn is_encrypted(&self) -> bool {
        self.encrypt.is_some()
    }

    /// Trailer dictionary for a new xref section.
    ///
    /// `/Prev` and `/XRefStm` are left to the writer, which knows the offsets.
    pub fn to_dict(&self, size: u32) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert("Size".to_string(), Object::Integer(i64::from(size)));
        dict.insert("Root".to_string(), Object::Reference(self.root));
        if let Some(info) = self.info {
            dict.insert("Info".to_string(), Object::Reference(info));
        }
        if let Some(encrypt) = &self.encrypt {
            dict.insert("Encrypt".to_string(), encrypt.clone());
        }
        if let Some([first, second]) = &self.id {
            dict.insert(
                "ID".to_string(),
                Object::Array(vec![Object::String(first.clone()), Object::String(second.clone())]),
            );
        }
        dict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_object;

    fn dict(source: &[u8]) -> Dictionary {
        parse_object(source).unwrap().1.as_dict().unwrap().clone()
    }

    #[test]
    fn test_from_dict() {
        let trailer =
            Trailer::from_dict(&dict(b"<< /Size 12 /Root 1 0 R /Info 7 0 R /ID [<0102> <0304>] /Prev 400 >>")).unwrap();
        assert_eq!(trailer.root, ObjectRef::new(1, 0));
        assert_eq!(trailer.info, Some(ObjectRef::new(7, 0)));
        assert_eq!(trailer.id, Some([vec![1, 2], vec![3, 4]]));
        assert_eq!(trailer.prev, Some(400));
        assert_eq!(trailer.size, 12);
        assert!(!trailer.is_encrypted());
    }

    #[test]
    fn test_missing_root() {
        assert!(matches!(Trailer::from_dict(&dict(b"<< /Size 3 >>")), Err(Error::NoCatalog)));
        assert!(matches!(Trailer::from_dict(&dict(b"<< /Root 5 >>")), Err(Error::NoCatalog)));
    }

    #[test]
    fn test_to_dict_roundtrip() {
        let trailer = Trailer::from_dict(&dict(b"<< /Size 4 /Root 2 0 R /Encrypt 3 0 R /ID [(a) (b)] >>")).unwrap();
        assert_eq!(trailer.encrypt_ref(), Some(ObjectRef::new(3, 0)));

        let written = trailer.to_dict(9);
        assert_eq!(written.get("Size").and_then(Object::as_integer), Some(9));
        let reread = Trailer::from_dict(&written).unwrap();
        assert_eq!(reread.root, trailer.root);
        assert_eq!(reread.id, trailer.id);
        assert_eq!(reread.encrypt, trailer.encrypt);
        assert!(!written.contains_key("Prev"));
    }
}
