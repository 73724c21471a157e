//! Emitting cross-reference sections: classic tables and xref streams.

use crate::error::Result;
use crate::filters::{default_registry, FilterChain};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::xref::XRefEntry;
use byteorder::{BigEndian, ByteOrder};
use std::collections::BTreeMap;
use std::io::Write;

/// Runs of consecutive object numbers: (first, entries).
fn subsections(entries: &BTreeMap<u32, XRefEntry>) -> Vec<(u32, Vec<XRefEntry>)> {
    let mut runs: Vec<(u32, Vec<XRefEntry>)> = Vec::new();
    for (&num, &entry) in entries {
        match runs.last_mut() {
            Some((first, run)) if *first + run.len() as u32 == num => run.push(entry),
            _ => runs.push((num, vec![entry])),
        }
    }
    runs
}

/// Write a classic `xref` table. Compressed entries cannot be expressed in a
/// table; callers switch to an xref stream when they have any.
pub(crate) fn write_table<W: Write>(w: &mut W, entries: &BTreeMap<u32, XRefEntry>) -> std::io::Result<()> {
    writeln!(w, "xref")?;
    for (first, run) in subsections(entries) {
        writeln!(w, "{} {}", first, run.len())?;
        for entry in run {
            match entry {
                XRefEntry::InUse { offset, generation } => write!(w, "{:010} {:05} n\r\n", offset, generation)?,
                XRefEntry::Free { next, generation } => write!(w, "{:010} {:05} f\r\n", next, generation)?,
                XRefEntry::Compressed { stream, index } => {
                    log::error!("Compressed entry ({} #{}) written as free in a classic table", stream, index);
                    write!(w, "{:010} {:05} f\r\n", 0, 0)?
                },
            }
        }
    }
    Ok(())
}

/// Bytes needed to store `value` big-endian.
fn width(value: u64) -> usize {
    (((64 - value.leading_zeros()) as usize + 7) / 8).max(1)
}

/// Build an xref stream object holding `entries`.
///
/// `trailer` supplies the trailer keys (`/Root`, `/Info`, `/ID`, `/Prev`, ...);
/// `/Type`, `/Size`, `/W` and `/Index` are added here.
pub(crate) fn build_stream(
    entries: &BTreeMap<u32, XRefEntry>,
    mut trailer: Dictionary,
    size: u32,
    compress: bool,
) -> Result<Object> {
    let field = |entry: &XRefEntry| -> (u8, u64, u64) {
        match *entry {
            XRefEntry::Free { next, generation } => (0, u64::from(next), u64::from(generation)),
            XRefEntry::InUse { offset, generation } => (1, offset as u64, u64::from(generation)),
            XRefEntry::Compressed { stream, index } => (2, u64::from(stream), u64::from(index)),
        }
    };

    let (w2, w3) = entries.values().map(field).fold((1, 1), |(w2, w3), (_, f2, f3)| {
        (width(f2).max(w2), width(f3).max(w3))
    });

    let runs = subsections(entries);
    let mut data = Vec::with_capacity(entries.len() * (1 + w2 + w3));
    let mut buf = [0u8; 8];
    for (_, run) in &runs {
        for entry in run {
            let (kind, f2, f3) = field(entry);
            data.push(kind);
            BigEndian::write_uint(&mut buf, f2, w2);
            data.extend_from_slice(&buf[..w2]);
            BigEndian::write_uint(&mut buf, f3, w3);
            data.extend_from_slice(&buf[..w3]);
        }
    }

    trailer.insert("Type".to_string(), Object::name("XRef"));
    trailer.insert("Size".to_string(), Object::Integer(i64::from(size)));
    trailer.insert(
        "W".to_string(),
        Object::Array(vec![Object::Integer(1), Object::Integer(w2 as i64), Object::Integer(w3 as i64)]),
    );
    trailer.insert(
        "Index".to_string(),
        Object::Array(
            runs.iter()
                .flat_map(|(first, run)| [Object::Integer(i64::from(*first)), Object::Integer(run.len() as i64)])
                .collect(),
        ),
    );

    if compress {
        trailer.insert("Filter".to_string(), Object::name("FlateDecode"));
        data = default_registry().encode(&data, &FilterChain::single("FlateDecode"))?;
    }
    Ok(Object::raw_stream(trailer, data))
}

/// Write the xref section for `entries` followed by the trailer and `startxref`.
///
/// With `as_stream`, the section becomes a new object numbered `size` and
/// `/Size` grows by one.
pub(crate) fn finish(
    out: &mut Vec<u8>,
    mut entries: BTreeMap<u32, XRefEntry>,
    trailer: Dictionary,
    mut size: u32,
    as_stream: bool,
    compress: bool,
) -> Result<()> {
    let xref_offset = out.len();

    if as_stream {
        let id = ObjectRef::new(size, 0);
        size += 1;
        entries.insert(
            id.id,
            XRefEntry::InUse {
                offset: xref_offset,
                generation: 0,
            },
        );
        let stream = build_stream(&entries, trailer, size, compress)?;
        super::ObjectSerializer::compact().write_indirect(out, id, &stream)?;
    } else {
        let mut trailer = trailer;
        trailer.insert("Size".to_string(), Object::Integer(i64::from(size)));
        write_table(out, &entries)?;
        writeln!(out, "trailer")?;
        super::ObjectSerializer::new().write_object(out, &Object::Dictionary(trailer))?;
        writeln!(out)?;
    }

    write!(out, "startxref\n{}\n%%EOF\n", xref_offset)?;
    log::debug!(
        "Wrote {} with {} entries at offset {}",
        if as_stream { "xref stream" } else { "xref table" },
        entries.len(),
        xref_offset
    );
    Ok(())
}
