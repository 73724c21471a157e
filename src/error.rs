//! Error types for the PDF object-graph engine.
//!
//! Every fallible operation in the crate returns [`Result`]. Variants fall into the
//! broad categories reported by [`Error::kind`], which callers use to decide whether
//! a failure is local to one request (a missing attachment name) or fatal for the
//! whole document (no recoverable catalog, I/O failure).

use crate::object::ObjectRef;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed token or object.
    Parse,
    /// Dangling or cyclic indirect reference.
    Reference,
    /// Unknown filter or corrupt encoded payload.
    Filter,
    /// Unrecoverable document structure.
    Structure,
    /// Requested attachment absent or already present.
    NotFound,
    /// Encrypted content with no transform available.
    Encryption,
    /// Underlying read/write failure.
    Io,
}

/// Errors that can occur while reading, mutating or writing a document.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Unexpected end of input
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// Invalid cross-reference section
    #[error("Invalid cross-reference section at byte {0}")]
    InvalidXref(usize),

    /// Referenced object not present (or free) in the cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Reference chain loops back on itself
    #[error("Circular reference detected: object {0}")]
    CircularReference(ObjectRef),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Stream decoding/encoding failed
    #[error("{filter} failed: {reason}")]
    Decode {
        /// Filter name
        filter: String,
        /// What went wrong
        reason: String,
    },

    /// Invalid PDF structure
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Neither the trailer nor a body scan yields a document catalog
    #[error("No document catalog found; the file cannot be recovered")]
    NoCatalog,

    /// Dictionary lacks a required key
    #[error("Missing dictionary key: /{0}")]
    MissingKey(String),

    /// Requested attachment is not in the EmbeddedFiles name tree
    #[error("Attachment not found: {0}")]
    AttachmentNotFound(String),

    /// An attachment with this name already exists
    #[error("Attachment already exists: {0}")]
    DuplicateAttachment(String),

    /// Encrypted document opened without a crypt transform
    #[error("Document is encrypted and no crypt transform was supplied (object {0})")]
    Encrypted(ObjectRef),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::Decode`] raised by `filter`.
    pub fn decode(filter: &str, reason: impl Into<String>) -> Self {
        Error::Decode {
            filter: filter.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`Error::ParseError`].
    pub fn parse(offset: usize, reason: impl Into<String>) -> Self {
        Error::ParseError {
            offset,
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidHeader(_) | Error::ParseError { .. } | Error::UnexpectedEof => {
                ErrorKind::Parse
            },
            Error::ObjectNotFound(..)
            | Error::CircularReference(_)
            | Error::RecursionLimitExceeded(_) => ErrorKind::Reference,
            Error::UnsupportedFilter(_) | Error::Decode { .. } => ErrorKind::Filter,
            Error::InvalidXref(_)
            | Error::InvalidObjectType { .. }
            | Error::InvalidPdf(_)
            | Error::NoCatalog => ErrorKind::Structure,
            Error::MissingKey(_) | Error::AttachmentNotFound(_) | Error::DuplicateAttachment(_) => {
                ErrorKind::NotFound
            },
            Error::Encrypted(_) => ErrorKind::Encryption,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}
