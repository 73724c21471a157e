//! Parser options controlling how tolerant reading is.
//!
//! These options trade strict PDF compliance for compatibility with the damaged
//! files found in the wild.
//!
//! # Example
//!
//! ```
//! use pdf_graph::parser_config::ParserOptions;
//!
//! // Lenient mode - repair broken xref data, trust scanned stream boundaries (default)
//! let lenient = ParserOptions::lenient();
//!
//! // Strict mode - fail instead of repairing
//! let strict = ParserOptions::strict();
//!
//! // Custom limits
//! let custom = ParserOptions {
//!     max_decompressed_size: 16 * 1024 * 1024,
//!     ..ParserOptions::lenient()
//! };
//! assert!(custom.allow_xref_repair);
//! ```

/// Parser options for controlling error handling and recovery behavior.
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// Fail on spec violations instead of recovering.
    pub strict: bool,

    /// Rebuild the cross-reference table by scanning the body when the declared
    /// sections are missing or inconsistent.
    pub allow_xref_repair: bool,

    /// Accept streams whose `/Length` is missing or wrong by scanning for
    /// `endstream`.
    pub allow_malformed_streams: bool,

    /// Maximum array/dictionary nesting depth.
    ///
    /// PDF Spec: ISO 32000-1:2008, Annex C - Implementation Limits
    pub max_nesting: usize,

    /// Maximum decompression ratio (decompressed:compressed). 0 disables the check.
    pub max_decompression_ratio: u32,

    /// Maximum decompressed stream size in bytes. 0 disables the check.
    pub max_decompressed_size: usize,

    /// Maximum length of a reference chain followed by `resolve`.
    pub max_recursion_depth: u32,

    /// Maximum input size in bytes. 0 disables the check.
    pub max_file_size: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParserOptions {
    /// Strict mode: no repair, declared stream lengths must be right.
    pub fn strict() -> Self {
        Self {
            strict: true,
            allow_xref_repair: false,
            allow_malformed_streams: false,
            ..Self::lenient()
        }
    }

    /// Lenient mode: attempt to recover from damaged files.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            allow_xref_repair: true,
            allow_malformed_streams: true,
            max_nesting: 100,
            max_decompression_ratio: 1000,
            max_decompressed_size: 100 * 1024 * 1024, // 100 MB
            max_recursion_depth: 100,
            max_file_size: 500 * 1024 * 1024, // 500 MB
        }
    }
}
