// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::enum_variant_names)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::new_without_default)]

//! # pdf_graph
//!
//! A tolerant PDF object-graph engine: read a PDF into an indirect-object
//! graph, repair its cross-reference data when it is damaged, mutate the
//! graph, and write it back as a full rewrite or as an incremental update.
//!
//! ## Layers
//!
//! ```text
//! lexer -> parser -> filters -> xref / xref_reconstruction -> document
//!                                                               |
//!                                   attachments, name_tree -----+
//!                                                               |
//!                                                            writer
//! ```
//!
//! - [`lexer`] and [`parser`]: tokens and objects, never panicking on bad input
//! - [`filters`]: the stream filter pipeline (Flate, LZW, ASCIIHex, ASCII85,
//!   RunLength, predictors)
//! - [`xref`]: cross-reference tables and streams, `/Prev` chains, hybrid files
//! - [`xref_reconstruction`]: rebuilding the table by scanning the body
//! - [`document`]: the object cache, mutation and graph queries
//! - [`attachments`]: embedded files in the `/EmbeddedFiles` name tree
//! - [`writer`]: serialization
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_graph::attachments::{add_attachments, list_attachments, AttachmentSource};
//! use pdf_graph::{Document, SaveOptions};
//!
//! # fn main() -> pdf_graph::Result<()> {
//! let mut doc = Document::open("input.pdf")?;
//! if doc.was_repaired() {
//!     println!("cross-reference data was rebuilt");
//! }
//!
//! add_attachments(&mut doc, vec![AttachmentSource::from_bytes("notes.txt", "hello")], false)?;
//! for attachment in list_attachments(&mut doc)? {
//!     println!("{}", attachment);
//! }
//!
//! doc.save("output.pdf", &SaveOptions::incremental())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! A [`Document`] is `Send` but every operation that may load objects takes
//! `&mut self`. Share one across threads behind a `Mutex`.

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod parser_config;
pub mod trailer;
pub mod xref;
pub mod xref_reconstruction;

// Stream filters and encryption hooks
pub mod crypt;
pub mod filters;

// Document features
pub mod attachments;
pub mod name_tree;

// Output
pub mod writer;

// Configuration
pub mod config;

pub use config::Config;
pub use crypt::CryptTransform;
pub use document::Document;
pub use error::{Error, ErrorKind, Result};
pub use object::{Dictionary, Object, ObjectRef, StreamState};
pub use parser_config::ParserOptions;
pub use writer::SaveOptions;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Document>();
    }
}
