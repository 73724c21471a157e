//! Stream filter codecs.
//!
//! Every PDF filter is a [`StreamFilter`]: a named pair of pure `decode`/`encode`
//! functions. Filters are looked up by name in a [`FilterRegistry`]; a stream's
//! `/Filter` and `/DecodeParms` entries describe a [`FilterChain`].
//!
//! - FlateDecode (zlib/deflate, with PNG/TIFF predictors)
//! - LZWDecode (with predictors and `/EarlyChange`)
//! - ASCIIHexDecode
//! - ASCII85Decode
//! - RunLengthDecode
//! - DCTDecode, JPXDecode, CCITTFaxDecode, JBIG2Decode, Identity Crypt - recognized,
//!   bytes pass through unchanged
//!
//! Decoding applies the chain in declared order; encoding applies it in reverse,
//! so `decode(encode(x)) == x` for every chain built from these filters.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::parser_config::ParserOptions;
use std::collections::HashMap;

mod ascii85;
mod ascii_hex;
mod flate;
mod lzw;
mod passthrough;
mod predictor;
mod runlength;

pub use ascii85::Ascii85Filter;
pub use ascii_hex::AsciiHexFilter;
pub use flate::FlateFilter;
pub use lzw::LzwFilter;
pub use passthrough::PassthroughFilter;
pub use predictor::PredictorParams;
pub use runlength::RunLengthFilter;

/// Outputs larger than this are also checked against the decompression ratio.
const RATIO_CHECK_FLOOR: usize = 1024 * 1024;

/// A named encode/decode pair.
pub trait StreamFilter: Send + Sync {
    /// Canonical filter name (e.g., "FlateDecode").
    fn name(&self) -> &'static str;

    /// Decode `input` using the stage's `/DecodeParms` dictionary, if any.
    fn decode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>>;

    /// Encode `input`; the inverse of [`StreamFilter::decode`].
    fn encode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>>;
}

/// One stage of a filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStage {
    /// Filter name as written in the file (abbreviations allowed)
    pub name: String,
    /// Matching `/DecodeParms` entry
    pub params: Option<Dictionary>,
}

/// The ordered filters declared by a stream dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    stages: Vec<FilterStage>,
}

impl FilterChain {
    /// A chain with a single parameterless filter.
    pub fn single(name: &str) -> Self {
        Self {
            stages: vec![FilterStage {
                name: name.to_string(),
                params: None,
            }],
        }
    }

    /// Read `/Filter` and `/DecodeParms` from a stream dictionary.
    ///
    /// Both entries must already be direct objects.
    pub fn from_dict(dict: &Dictionary) -> Result<Self> {
        let names: Vec<String> = match dict.get("Filter") {
            None => Vec::new(),
            Some(Object::Name(name)) => vec![name.clone()],
            Some(Object::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_name().map(str::to_string).ok_or_else(|| Error::InvalidObjectType {
                        expected: "Name".to_string(),
                        found: item.type_name().to_string(),
                    })
                })
                .collect::<Result<_>>()?,
            Some(other) => {
                return Err(Error::InvalidObjectType {
                    expected: "Name or Array".to_string(),
                    found: other.type_name().to_string(),
                })
            },
        };

        let params: Vec<Option<Dictionary>> = match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
            Some(Object::Dictionary(d)) => vec![Some(d.clone())],
            Some(Object::Array(items)) => items.iter().map(|item| item.as_dict().cloned()).collect(),
            _ => Vec::new(),
        };

        let stages = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| FilterStage {
                name,
                params: params.get(i).cloned().flatten(),
            })
            .collect();

        Ok(Self { stages })
    }

    /// Append a stage.
    pub fn push(&mut self, name: &str, params: Option<Dictionary>) {
        self.stages.push(FilterStage {
            name: name.to_string(),
            params,
        });
    }

    /// The stages in declared order.
    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    /// True when the stream is unfiltered.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Write this chain back into a stream dictionary as `/Filter` and
    /// `/DecodeParms`, replacing any previous entries.
    pub fn apply_to_dict(&self, dict: &mut Dictionary) {
        dict.shift_remove("Filter");
        dict.shift_remove("DecodeParms");
        dict.shift_remove("DP");
        match self.stages.as_slice() {
            [] => {},
            [stage] => {
                dict.insert("Filter".to_string(), Object::name(stage.name.clone()));
                if let Some(params) = &stage.params {
                    dict.insert("DecodeParms".to_string(), Object::Dictionary(params.clone()));
                }
            },
            stages => {
                dict.insert(
                    "Filter".to_string(),
                    Object::Array(stages.iter().map(|s| Object::name(s.name.clone())).collect()),
                );
                if stages.iter().any(|s| s.params.is_some()) {
                    let params = stages
                        .iter()
                        .map(|s| s.params.clone().map(Object::Dictionary).unwrap_or(Object::Null))
                        .collect();
                    dict.insert("DecodeParms".to_string(), Object::Array(params));
                }
            },
        }
    }
}

/// Map abbreviated filter names (used in inline images, and by some writers in
/// stream dictionaries) to their canonical form.
pub fn canonical_name(name: &str) -> &str {
    match name {
        "Fl" => "FlateDecode",
        "LZW" => "LZWDecode",
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "RL" => "RunLengthDecode",
        "DCT" => "DCTDecode",
        "CCF" => "CCITTFaxDecode",
        other => other,
    }
}

/// Filters available by name.
pub struct FilterRegistry {
    filters: HashMap<&'static str, Box<dyn StreamFilter>>,
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.filters.keys().collect();
        names.sort();
        f.debug_struct("FilterRegistry").field("filters", &names).finish()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl FilterRegistry {
    /// A registry with no filters.
    pub fn empty() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// Every filter this crate implements.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(FlateFilter));
        registry.register(Box::new(LzwFilter));
        registry.register(Box::new(AsciiHexFilter));
        registry.register(Box::new(Ascii85Filter));
        registry.register(Box::new(RunLengthFilter));
        for name in PassthroughFilter::NAMES {
            registry.register(Box::new(PassthroughFilter::new(name)));
        }
        registry
    }

    /// Add or replace a filter.
    pub fn register(&mut self, filter: Box<dyn StreamFilter>) {
        self.filters.insert(filter.name(), filter);
    }

    /// Look up a filter by (possibly abbreviated) name.
    pub fn get(&self, name: &str) -> Option<&dyn StreamFilter> {
        self.filters.get(canonical_name(name)).map(|f| f.as_ref())
    }

    /// True if `name` is known.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn require(&self, name: &str) -> Result<&dyn StreamFilter> {
        self.get(name).ok_or_else(|| Error::UnsupportedFilter(name.to_string()))
    }

    /// Decode `data` through `chain` in declared order.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFilter`] for an unknown stage, [`Error::Decode`] for a
    /// corrupt payload or an output exceeding the decompression limits.
    pub fn decode(&self, data: &[u8], chain: &FilterChain, options: &ParserOptions) -> Result<Vec<u8>> {
        let mut current = data.to_vec();

        for stage in chain.stages() {
            let filter = self.require(&stage.name)?;
            let input_len = current.len();
            current = filter.decode(&current, stage.params.as_ref())?;
            check_limits(filter.name(), input_len, current.len(), options)?;
        }

        Ok(current)
    }

    /// Encode `data` through `chain`, last stage first.
    pub fn encode(&self, data: &[u8], chain: &FilterChain) -> Result<Vec<u8>> {
        let mut current = data.to_vec();

        for stage in chain.stages().iter().rev() {
            let filter = self.require(&stage.name)?;
            current = filter.encode(&current, stage.params.as_ref())?;
        }

        Ok(current)
    }
}

fn check_limits(filter: &str, input_len: usize, output_len: usize, options: &ParserOptions) -> Result<()> {
    if options.max_decompressed_size > 0 && output_len > options.max_decompressed_size {
        return Err(Error::decode(
            filter,
            format!(
                "decompressed size {} bytes exceeds limit {} bytes",
                output_len, options.max_decompressed_size
            ),
        ));
    }

    if options.max_decompression_ratio > 0 && output_len > RATIO_CHECK_FLOOR {
        let ratio = output_len as u64 / input_len.max(1) as u64;
        if ratio > u64::from(options.max_decompression_ratio) {
            return Err(Error::decode(
                filter,
                format!(
                    "decompression ratio {}:1 exceeds limit {}:1",
                    ratio, options.max_decompression_ratio
                ),
            ));
        }
    }

    Ok(())
}

lazy_static::lazy_static! {
    static ref DEFAULT_REGISTRY: FilterRegistry = FilterRegistry::standard();
}

/// The shared registry holding every built-in filter.
pub fn default_registry() -> &'static FilterRegistry {
    &DEFAULT_REGISTRY
}

/// Read an integer entry from a `/DecodeParms` dictionary.
pub(crate) fn param_int(params: Option<&Dictionary>, key: &str, default: i64) -> i64 {
    params
        .and_then(|p| p.get(key))
        .and_then(Object::as_integer)
        .unwrap_or(default)
}
