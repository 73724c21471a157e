//! Encryption collaborator interface.
//!
//! Key derivation (passwords, security handlers) lives outside this crate. A
//! caller that has the file key hands the document a [`CryptTransform`]; the
//! document then calls it for every string and stream payload, except in the
//! encryption dictionary itself and in cross-reference streams.

use crate::error::Result;
use crate::object::{Object, ObjectRef};

/// Per-object encryption and decryption of string and stream bytes.
pub trait CryptTransform: Send {
    /// Decrypt bytes belonging to object `id`.
    fn decrypt(&self, id: ObjectRef, data: &[u8]) -> Result<Vec<u8>>;

    /// Encrypt bytes belonging to object `id`; the inverse of `decrypt`.
    fn encrypt(&self, id: ObjectRef, data: &[u8]) -> Result<Vec<u8>>;
}

/// The standard security handler's RC4 cipher (revisions 2 and 3) keyed from an
/// already derived file key.
#[derive(Debug, Clone)]
pub struct Rc4Transform {
    file_key: Vec<u8>,
}

impl Rc4Transform {
    /// A transform for the given file encryption key (5 to 16 bytes).
    pub fn new(file_key: impl Into<Vec<u8>>) -> Self {
        Self {
            file_key: file_key.into(),
        }
    }

    /// Object key: MD5 of the file key, the low 3 bytes of the object number
    /// and the low 2 bytes of the generation, truncated to n + 5 bytes.
    fn object_key(&self, id: ObjectRef) -> Vec<u8> {
        use md5::{Digest, Md5};

        let mut hasher = Md5::new();
        hasher.update(&self.file_key);
        hasher.update(&id.id.to_le_bytes()[..3]);
        hasher.update(id.gen.to_le_bytes());
        let hash = hasher.finalize();
        hash[..(self.file_key.len() + 5).min(16)].to_vec()
    }
}

impl CryptTransform for Rc4Transform {
    fn decrypt(&self, id: ObjectRef, data: &[u8]) -> Result<Vec<u8>> {
        Ok(rc4(&self.object_key(id), data))
    }

    fn encrypt(&self, id: ObjectRef, data: &[u8]) -> Result<Vec<u8>> {
        Ok(rc4(&self.object_key(id), data))
    }
}

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }

    let mut s: [u8; 256] = std::array::from_fn(|i| i as u8);
    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
        s.swap(i, usize::from(j));
    }

    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|&byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(s[usize::from(i)]);
            s.swap(usize::from(i), usize::from(j));
            byte ^ s[usize::from(s[usize::from(i)].wrapping_add(s[usize::from(j)]))]
        })
        .collect()
}

/// Apply `f` to every string inside `object` (not to stream payloads).
pub(crate) fn map_strings<F>(object: &mut Object, f: &mut F) -> Result<()>
where
    F: FnMut(&[u8]) -> Result<Vec<u8>>,
{
    match object {
        Object::String(bytes) => *bytes = f(bytes)?,
        Object::Array(items) => {
            for item in items {
                map_strings(item, f)?;
            }
        },
        Object::Dictionary(dict) | Object::Stream { dict, .. } => {
            for value in dict.values_mut() {
                map_strings(value, f)?;
            }
        },
        _ => {},
    }
    Ok(())
}
