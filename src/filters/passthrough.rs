//! Filters whose payloads are kept in encoded form.
//!
//! Image codecs (DCT, JPX, CCITT fax, JBIG2) are recognized so that chains
//! containing them are not rejected, but their bytes are handed through
//! untouched in both directions. The Crypt filter passes through only as the
//! `Identity` crypt filter; a named crypt filter is rejected, since
//! document-level decryption goes through [`crate::crypt::CryptTransform`].

use super::StreamFilter;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};

/// A recognized filter that does not transform data.
pub struct PassthroughFilter {
    name: &'static str,
}

impl PassthroughFilter {
    /// Filter names handled by pass-through.
    pub const NAMES: [&'static str; 5] = ["DCTDecode", "JPXDecode", "CCITTFaxDecode", "JBIG2Decode", "Crypt"];

    /// A pass-through filter registered under `name`.
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// `/Crypt` with a `/Name` other than `Identity` would hand back ciphertext.
    fn check_identity(&self, params: Option<&Dictionary>) -> Result<()> {
        if self.name != "Crypt" {
            return Ok(());
        }
        match params.and_then(|p| p.get("Name")).and_then(Object::as_name) {
            None | Some("Identity") => Ok(()),
            Some(other) => Err(Error::decode(
                "Crypt",
                format!("crypt filter /{} is not supported; only /Identity passes through", other),
            )),
        }
    }
}

impl StreamFilter for PassthroughFilter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn decode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        self.check_identity(params)?;
        Ok(input.to_vec())
    }

    fn encode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        self.check_identity(params)?;
        Ok(input.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crypt_params(name: &str) -> Dictionary {
        let mut params = Dictionary::new();
        params.insert("Name".to_string(), Object::name(name));
        params
    }

    #[test]
    fn test_identity_crypt_passes_through() {
        let filter = PassthroughFilter::new("Crypt");
        assert_eq!(filter.decode(b"plain", None).unwrap(), b"plain");
        assert_eq!(filter.decode(b"plain", Some(&crypt_params("Identity"))).unwrap(), b"plain");
        assert_eq!(filter.encode(b"plain", Some(&crypt_params("Identity"))).unwrap(), b"plain");
    }

    #[test]
    fn test_named_crypt_filter_rejected() {
        let filter = PassthroughFilter::new("Crypt");
        let err = filter.decode(b"\x8a\x11ciphertext", Some(&crypt_params("StdCF"))).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(filter.encode(b"plain", Some(&crypt_params("StdCF"))).is_err());
    }

    #[test]
    fn test_image_codecs_ignore_params() {
        let filter = PassthroughFilter::new("DCTDecode");
        assert_eq!(filter.decode(b"\xFF\xD8", Some(&crypt_params("StdCF"))).unwrap(), b"\xFF\xD8");
    }
}
