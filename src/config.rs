//! Configuration for PDF processing.
//!
//! [`Config`] bundles the options of each stage so callers can carry one value
//! around instead of three.

use crate::attachments::{self, AttachmentOptions, AttachmentSource};
use crate::document::Document;
use crate::error::Result;
use crate::parser_config::ParserOptions;
use crate::writer::{self, SaveOptions};
use std::path::Path;

/// PDF processing configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// How documents are read.
    pub parser: ParserOptions,

    /// How documents are written.
    pub save: SaveOptions,

    /// How new attachments are stored.
    pub attachments: AttachmentOptions,
}

impl Config {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parser options.
    pub fn with_parser(mut self, parser: ParserOptions) -> Self {
        self.parser = parser;
        self
    }

    /// Set the save options.
    pub fn with_save(mut self, save: SaveOptions) -> Self {
        self.save = save;
        self
    }

    /// Set the attachment options.
    pub fn with_attachments(mut self, attachments: AttachmentOptions) -> Self {
        self.attachments = attachments;
        self
    }

    /// Write incremental updates instead of full rewrites.
    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.save.incremental = incremental;
        self
    }

    /// Load a document from memory.
    pub fn load(&self, data: impl Into<bytes::Bytes>) -> Result<Document> {
        Document::load_with_options(data, self.parser)
    }

    /// Read and load a file.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Document> {
        Document::open_with_options(path, self.parser)
    }

    /// Serialize a document.
    pub fn write(&self, doc: &mut Document) -> Result<Vec<u8>> {
        writer::write(doc, &self.save)
    }

    /// Write a document to `path`.
    pub fn save(&self, doc: &mut Document, path: impl AsRef<Path>) -> Result<()> {
        doc.save(path, &self.save)
    }

    /// Add attachments using the configured attachment options.
    pub fn add_attachments(&self, doc: &mut Document, sources: Vec<AttachmentSource>, use_collection: bool) -> Result<()> {
        attachments::add_attachments_with_options(doc, sources, use_collection, &self.attachments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = Config::new()
            .with_parser(ParserOptions::strict())
            .with_save(SaveOptions::full_rewrite().with_xref_stream(true))
            .with_attachments(AttachmentOptions::default().with_compression(None))
            .with_incremental(true);
        assert!(config.parser.strict);
        assert!(config.save.incremental);
        assert!(config.save.xref_stream);
        assert_eq!(config.attachments.compression, None);
    }

    #[test]
    fn test_roundtrip_through_config() {
        let config = Config::new().with_attachments(AttachmentOptions::default().with_compression(None));
        let mut doc = Document::new();
        config
            .add_attachments(&mut doc, vec![AttachmentSource::from_bytes("raw.bin", vec![1, 2, 3])], false)
            .unwrap();

        let bytes = config.write(&mut doc).unwrap();
        let mut doc = config.load(bytes).unwrap();
        let extracted = attachments::extract_attachments(&mut doc, None);
        let extracted = extracted[0].as_ref().unwrap();
        assert_eq!(extracted.data, vec![1, 2, 3]);
        assert_eq!(extracted.attachment.name, "raw.bin");
    }
}
