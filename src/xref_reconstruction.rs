//! Cross-reference table reconstruction for damaged PDFs.
//!
//! When the declared xref sections are missing or disagree with the body, the
//! table is rebuilt from a single linear scan for `N G obj` headers. Later
//! occurrences of an object number win, matching how incremental updates
//! append newer versions. Objects packed in object streams found during the
//! scan are added as compressed entries.
//!
//! The trailer is taken from the last `trailer` dictionary (or xref stream
//! dictionary) whose `/Root` names a catalog found by the scan. If none
//! qualifies, a minimal trailer pointing at the last catalog is synthesized.
//! Reconstruction fails only when no catalog exists at all.

use crate::error::{Error, Result};
use crate::filters::{default_registry, FilterChain};
use crate::lexer::{is_delimiter, is_whitespace};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::ObjectStream;
use crate::parser::{parse_indirect_object_with_options, parse_object};
use crate::parser_config::ParserOptions;
use crate::xref::{XRefEntry, XRefState, XRefTable};
use lazy_static::lazy_static;
use regex::bytes::Regex;
use std::collections::HashSet;

lazy_static! {
    /// "N G obj" object headers
    static ref RE_OBJ_HEADER: Regex =
        Regex::new(r"([0-9]{1,10})[\x00\t\n\x0C\r ]+([0-9]{1,5})[\x00\t\n\x0C\r ]+obj").expect("valid regex");

    /// "trailer <<" markers
    static ref RE_TRAILER: Regex = Regex::new(r"trailer[\x00\t\n\x0C\r ]*<<").expect("valid regex");
}

/// What the body scan found besides object offsets.
#[derive(Debug, Default)]
struct ScanFindings {
    /// Catalogs with the file position where they were seen
    catalogs: Vec<(usize, ObjectRef)>,
    /// Trailer candidates: classic trailers and xref stream dictionaries
    trailers: Vec<(usize, Dictionary)>,
    /// Object streams: (object number, position, stream object)
    object_streams: Vec<(u32, usize, Object)>,
}

/// Rebuild the xref table and trailer by scanning `bytes`.
///
/// # Errors
///
/// [`Error::NoCatalog`] if the body contains no `/Type /Catalog` dictionary.
pub fn reconstruct(bytes: &[u8], options: &ParserOptions) -> Result<(XRefTable, Dictionary)> {
    log::info!("Reconstructing xref table by scanning {} bytes", bytes.len());

    let mut table = XRefTable::new();
    let mut findings = ScanFindings::default();
    let mut covered_until = 0;

    for header in RE_OBJ_HEADER.find_iter(bytes) {
        let start = header.start();

        // Headers inside an already parsed object (stream data, strings) are not real
        if start < covered_until {
            continue;
        }
        if start > 0 && !is_whitespace(bytes[start - 1]) && !is_delimiter(bytes[start - 1]) {
            continue;
        }

        let (id, object, consumed) = match parse_indirect_object_with_options(bytes, start, options) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::debug!("Skipping false object header at offset {}: {}", start, e);
                continue;
            },
        };
        covered_until = start + consumed;

        if let Some(XRefEntry::InUse { offset, .. }) = table.get(id.id) {
            log::debug!("Object {} redefined at {} (previously at {})", id.id, start, offset);
        }
        table.insert(
            id.id,
            XRefEntry::InUse {
                offset: start,
                generation: id.gen,
            },
        );
        classify(&mut findings, id, start, object);
    }

    add_compressed_objects(&mut table, &mut findings, options);

    log::info!(
        "Reconstructed xref with {} objects ({} catalog candidates)",
        table.len(),
        findings.catalogs.len()
    );

    if !matches!(table.get(0), Some(XRefEntry::InUse { .. })) {
        table.insert(
            0,
            XRefEntry::Free {
                next: 0,
                generation: 65535,
            },
        );
    }
    table.set_state(XRefState::Repaired);

    let trailer = find_trailer(bytes, &table, &mut findings)?;
    Ok((table, trailer))
}

fn classify(findings: &mut ScanFindings, id: ObjectRef, position: usize, object: Object) {
    if object.has_type("Catalog") && !object.is_stream() {
        findings.catalogs.push((position, id));
    } else if object.has_type("XRef") {
        if let Some(dict) = object.as_dict() {
            findings.trailers.push((position, dict.clone()));
        }
    } else if object.has_type("ObjStm") && object.is_stream() {
        findings.object_streams.push((id.id, position, object));
    }
}

/// Add compressed entries for objects that only exist inside object streams.
/// Objects stored directly in the body take precedence.
fn add_compressed_objects(table: &mut XRefTable, findings: &mut ScanFindings, options: &ParserOptions) {
    let direct: HashSet<u32> = table.iter().map(|(num, _)| num).collect();

    for (stream_num, position, stream) in std::mem::take(&mut findings.object_streams) {
        let Object::Stream { dict, data, .. } = &stream else {
            continue;
        };
        let decoded = FilterChain::from_dict(dict).and_then(|chain| default_registry().decode(data, &chain, options));
        let parsed = decoded.and_then(|decoded| ObjectStream::parse(dict, &decoded));
        let objstm = match parsed {
            Ok(objstm) => objstm,
            Err(e) => {
                log::warn!("Cannot read object stream {} during repair: {}", stream_num, e);
                continue;
            },
        };

        for (index, number, object) in objstm.objects() {
            if direct.contains(&number) {
                continue;
            }
            table.insert(
                number,
                XRefEntry::Compressed {
                    stream: stream_num,
                    index: index as u32,
                },
            );
            if object.has_type("Catalog") {
                findings.catalogs.push((position, ObjectRef::new(number, 0)));
            }
        }
    }
}

fn find_trailer(bytes: &[u8], table: &XRefTable, findings: &mut ScanFindings) -> Result<Dictionary> {
    for keyword in RE_TRAILER.find_iter(bytes) {
        let dict_start = keyword.end() - 2;
        match parse_object(&bytes[dict_start..]) {
            Ok((_, Object::Dictionary(dict))) => findings.trailers.push((keyword.start(), dict)),
            _ => log::debug!("Unparsable trailer dictionary at offset {}", keyword.start()),
        }
    }
    findings.trailers.sort_by_key(|(position, _)| *position);

    let catalogs: HashSet<ObjectRef> = findings.catalogs.iter().map(|(_, id)| *id).collect();
    let size = table.max_object_number().map_or(1, |max| i64::from(max) + 1);

    let usable = findings.trailers.iter().rev().find(|(_, dict)| {
        dict.get("Root")
            .and_then(Object::as_reference)
            .is_some_and(|root| catalogs.contains(&root))
    });

    if let Some((position, dict)) = usable {
        log::info!("Using trailer dictionary found at offset {}", position);
        let mut trailer = Dictionary::new();
        for key in ["Root", "Info", "ID", "Encrypt"] {
            if let Some(value) = dict.get(key) {
                trailer.insert(key.to_string(), value.clone());
            }
        }
        trailer.insert("Size".to_string(), Object::Integer(size));
        return Ok(trailer);
    }

    let (position, root) = findings
        .catalogs
        .iter()
        .max_by_key(|(position, _)| *position)
        .copied()
        .ok_or(Error::NoCatalog)?;
    log::info!("Synthesizing trailer for catalog {} found at offset {}", root, position);

    let mut trailer = Dictionary::new();
    trailer.insert("Root".to_string(), Object::Reference(root));
    trailer.insert("Size".to_string(), Object::Integer(size));
    Ok(trailer)
}
