//! Attachment scenarios against files on disk and in memory.

mod common;

use chrono::{Duration, Utc};
use common::{init_logging, wav_bytes, PdfBuilder};
use pdf_graph::attachments::{
    add_attachment_files, add_attachments, extract_attachments, extract_attachments_to_dir, list_attachments,
    remove_attachments, truncate_to_seconds, AttachmentSource,
};
use pdf_graph::filters::{default_registry, FilterChain};
use pdf_graph::{Document, Error, ErrorKind, SaveOptions};
use std::path::{Path, PathBuf};

/// A small standalone PDF with `marker` in its body.
fn sub_document(marker: &str) -> Vec<u8> {
    PdfBuilder::minimal()
        .object(3, &format!("({})", marker))
        .build()
}

fn count(path: &Path) -> usize {
    let mut doc = Document::open(path).unwrap();
    list_attachments(&mut doc).unwrap().len()
}

#[test]
fn test_attachment_lifecycle_on_disk() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("go.pdf");
    std::fs::write(&pdf, PdfBuilder::minimal().build()).unwrap();
    assert_eq!(count(&pdf), 0);

    let sources = dir.path().join("sources");
    std::fs::create_dir(&sources).unwrap();
    let payloads = vec![
        ("golang.pdf", sub_document("golang")),
        ("T4.pdf", sub_document("T4")),
        ("go-lecture.pdf", sub_document("lecture")),
        ("test.wav", wav_bytes()),
    ];
    let paths: Vec<PathBuf> = payloads
        .iter()
        .map(|(name, data)| {
            let path = sources.join(name);
            std::fs::write(&path, data).unwrap();
            path
        })
        .collect();

    // Add all four
    let mut doc = Document::open(&pdf).unwrap();
    add_attachment_files(&mut doc, &paths, false).unwrap();
    doc.save(&pdf, &SaveOptions::default()).unwrap();
    assert_eq!(count(&pdf), 4);

    // Extract all, byte for byte
    let out = dir.path().join("out");
    let mut doc = Document::open(&pdf).unwrap();
    let written = extract_attachments_to_dir(&mut doc, None, &out).unwrap();
    assert_eq!(written.len(), 4);
    for (name, data) in &payloads {
        assert_eq!(&std::fs::read(out.join(name)).unwrap(), data);
    }

    // Extract one
    let one = extract_attachments_to_dir(&mut doc, Some(&["golang.pdf"]), dir.path().join("one")).unwrap();
    assert_eq!(one.len(), 1);
    let extracted = std::fs::read(&one[0]).unwrap();
    assert_eq!(extracted, payloads[0].1);
    // The extracted sub-document is itself a loadable PDF
    Document::load(extracted).unwrap().validate().unwrap();

    // Remove one
    assert!(remove_attachments(&mut doc, Some(&["golang.pdf"])).unwrap());
    doc.save(&pdf, &SaveOptions::default()).unwrap();
    assert_eq!(count(&pdf), 3);

    // Remove all
    let mut doc = Document::open(&pdf).unwrap();
    assert!(remove_attachments(&mut doc, None).unwrap());
    doc.save(&pdf, &SaveOptions::default()).unwrap();
    assert_eq!(count(&pdf), 0);

    Document::open(&pdf).unwrap().validate().unwrap();
}

#[test]
fn test_attachment_low_level() {
    init_logging();
    let mut doc = Document::load(PdfBuilder::minimal().build()).unwrap();
    assert!(list_attachments(&mut doc).unwrap().is_empty());

    let mod_time = Utc::now() + Duration::nanoseconds(123_456_789);
    add_attachments(
        &mut doc,
        vec![AttachmentSource::from_bytes("attachment1", "12345")
            .with_description("description")
            .with_mod_time(mod_time)],
        false,
    )
    .unwrap();

    let bytes = pdf_graph::writer::write(&mut doc, &SaveOptions::default()).unwrap();
    let mut doc = Document::load(bytes).unwrap();

    let list = list_attachments(&mut doc).unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].name, "attachment1");
    assert_eq!(list[0].description, "description");
    assert_eq!(list[0].mod_time, Some(truncate_to_seconds(mod_time)));

    let extracted = extract_attachments(&mut doc, Some(&["attachment1"]));
    assert_eq!(extracted.len(), 1);
    let extracted = extracted.into_iter().next().unwrap().unwrap();
    assert_eq!(extracted.attachment, list[0]);
    assert_eq!(extracted.data, b"12345");

    assert!(remove_attachments(&mut doc, Some(&["attachment1"])).unwrap());
    let bytes = pdf_graph::writer::write(&mut doc, &SaveOptions::default()).unwrap();
    let mut doc = Document::load(bytes).unwrap();
    assert!(list_attachments(&mut doc).unwrap().is_empty());
}

#[test]
fn test_incremental_attachment_updates() {
    init_logging();
    let original = PdfBuilder::minimal().build();
    let mut doc = Document::load(original.clone()).unwrap();
    add_attachments(&mut doc, vec![AttachmentSource::from_bytes("a.txt", "first")], false).unwrap();
    let first = pdf_graph::writer::write(&mut doc, &SaveOptions::incremental()).unwrap();
    assert!(first.starts_with(&original));

    let mut doc = Document::load(first.clone()).unwrap();
    assert!(!doc.was_repaired());
    add_attachments(&mut doc, vec![AttachmentSource::from_bytes("b.txt", "second")], false).unwrap();
    assert!(remove_attachments(&mut doc, Some(&["a.txt"])).unwrap());
    let second = pdf_graph::writer::write(&mut doc, &SaveOptions::incremental()).unwrap();
    assert!(second.starts_with(&first));

    let mut doc = Document::load(second).unwrap();
    assert!(!doc.was_repaired());
    let names: Vec<String> = list_attachments(&mut doc).unwrap().into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["b.txt"]);
    let extracted = extract_attachments(&mut doc, None);
    assert_eq!(extracted[0].as_ref().unwrap().data, b"second");
    doc.validate().unwrap();

    // The first revision still reads as it was
    let mut doc = Document::load(first).unwrap();
    let names: Vec<String> = list_attachments(&mut doc).unwrap().into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["a.txt"]);
}

#[test]
fn test_unknown_names_are_local() {
    init_logging();
    let mut doc = Document::new();
    add_attachments(&mut doc, vec![AttachmentSource::from_bytes("present", "x")], false).unwrap();

    let results = extract_attachments(&mut doc, Some(&["absent", "present"]));
    let err = results[0].as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("absent"));
    assert_eq!(results[1].as_ref().unwrap().data, b"x");

    let err = add_attachments(&mut doc, vec![AttachmentSource::from_bytes("present", "y")], false).unwrap_err();
    assert!(matches!(err, Error::DuplicateAttachment(_)));
}

#[test]
fn test_existing_name_tree_with_kids_cycle() {
    init_logging();
    let pdf = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Names << /EmbeddedFiles 3 0 R >> >>")
        .object(3, "<< /Kids [4 0 R 3 0 R] >>")
        .object(4, "<< /Limits [(a) (a)] /Names [(a) 5 0 R] >>")
        .object(5, "<< /Type /Filespec /F (a) /Desc (from another tool) /EF << /F 6 0 R >> >>")
        .stream(6, "/Type /EmbeddedFile", b"12345")
        .build();

    let mut doc = Document::load(pdf).unwrap();
    let list = list_attachments(&mut doc).unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].to_string(), "a (from another tool)");
    assert_eq!(list[0].size, None);

    let extracted = extract_attachments(&mut doc, None);
    assert_eq!(extracted[0].as_ref().unwrap().data, b"12345");

    // Adding rebuilds the tree without the cycle
    add_attachments(&mut doc, vec![AttachmentSource::from_bytes("b", "6789")], false).unwrap();
    let bytes = pdf_graph::writer::write(&mut doc, &SaveOptions::default()).unwrap();
    let mut doc = Document::load(bytes).unwrap();
    assert_eq!(list_attachments(&mut doc).unwrap().len(), 2);
    doc.validate().unwrap();
}

#[test]
fn test_keys_written_by_other_producers() {
    init_logging();
    // "a" as UTF-16BE and "café" in PDFDocEncoding
    let pdf = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Names << /EmbeddedFiles 3 0 R >> >>")
        .object(3, "<< /Names [<FEFF0061> 4 0 R <636166E9> 6 0 R] >>")
        .object(4, "<< /Type /Filespec /F (a) /EF << /F 5 0 R >> >>")
        .stream(5, "/Type /EmbeddedFile /Params << /Size 5 >>", b"first")
        .object(6, "<< /Type /Filespec /F <636166E9> /EF << /F 7 0 R >> >>")
        .stream(7, "/Type /EmbeddedFile /Params << /Size 6 >>", b"second")
        .build();

    let mut doc = Document::load(pdf).unwrap();
    let names: Vec<String> = list_attachments(&mut doc).unwrap().into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["a", "caf\u{e9}"]);

    let extracted = extract_attachments(&mut doc, Some(&["a", "caf\u{e9}"]));
    assert_eq!(extracted[0].as_ref().unwrap().data, b"first");
    assert_eq!(extracted[1].as_ref().unwrap().data, b"second");

    for name in ["a", "caf\u{e9}"] {
        let err = add_attachments(&mut doc, vec![AttachmentSource::from_bytes(name, "again")], false).unwrap_err();
        assert!(matches!(err, Error::DuplicateAttachment(_)));
    }
    assert_eq!(list_attachments(&mut doc).unwrap().len(), 2);

    assert!(remove_attachments(&mut doc, Some(&["caf\u{e9}"])).unwrap());
    let names: Vec<String> = list_attachments(&mut doc).unwrap().into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["a"]);
    assert!(remove_attachments(&mut doc, Some(&["a"])).unwrap());
    assert!(list_attachments(&mut doc).unwrap().is_empty());
    doc.validate().unwrap();
}

/// Incompressible bytes, so a truncated Flate stream loses real content.
fn noise(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x2545_F491;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

#[test]
fn test_truncated_payload_is_a_filter_error() {
    init_logging();
    let payload = noise(5000);
    let encoded = default_registry()
        .encode(&payload, &FilterChain::single("FlateDecode"))
        .unwrap();
    let truncated = &encoded[..encoded.len() / 2];

    let pdf = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Names << /EmbeddedFiles << /Names [(blob.bin) 3 0 R] >> >> >>")
        .object(3, "<< /Type /Filespec /F (blob.bin) /EF << /F 4 0 R >> >>")
        .stream(4, "/Type /EmbeddedFile /Filter /FlateDecode /Params << /Size 5000 >>", truncated)
        .build();

    let mut doc = Document::load(pdf).unwrap();
    assert_eq!(list_attachments(&mut doc).unwrap()[0].size, Some(5000));

    let extracted = extract_attachments(&mut doc, None);
    let err = extracted[0].as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Filter);

    let dir = tempfile::tempdir().unwrap();
    let err = extract_attachments_to_dir(&mut doc, None, dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Filter);
    assert!(!dir.path().join("blob.bin").exists());
}

#[test]
fn test_checksum_mismatch_is_a_filter_error() {
    init_logging();
    let pdf = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Names << /EmbeddedFiles << /Names [(n.txt) 3 0 R (ok.txt) 5 0 R] >> >> >>")
        .object(3, "<< /Type /Filespec /F (n.txt) /EF << /F 4 0 R >> >>")
        .stream(
            4,
            "/Type /EmbeddedFile /Params << /Size 5 /CheckSum <00000000000000000000000000000000> >>",
            b"12345",
        )
        .object(5, "<< /Type /Filespec /F (ok.txt) /EF << /F 6 0 R >> >>")
        .stream(
            6,
            "/Type /EmbeddedFile /Params << /Size 5 /CheckSum <827CCB0EEA8A706C4C34A16891F84E7B> >>",
            b"12345",
        )
        .build();

    let mut doc = Document::load(pdf).unwrap();
    let extracted = extract_attachments(&mut doc, Some(&["n.txt"]));
    let err = extracted[0].as_ref().unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
    assert!(err.to_string().contains("n.txt"));

    let extracted = extract_attachments(&mut doc, Some(&["ok.txt"]));
    assert_eq!(extracted[0].as_ref().unwrap().data, b"12345");
}
