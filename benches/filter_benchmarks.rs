//! Filter pipeline and document round-trip benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pdf_graph::attachments::{add_attachments, AttachmentSource};
use pdf_graph::filters::{default_registry, FilterChain};
use pdf_graph::{Document, ParserOptions, SaveOptions};

/// Mildly compressible data: repeated text with a counter.
fn sample(size: usize) -> Vec<u8> {
    (0..).flat_map(|i: u32| format!("line {} of sample text\n", i).into_bytes()).take(size).collect()
}

fn bench_filters(c: &mut Criterion) {
    let registry = default_registry();
    let options = ParserOptions::default();

    for filter in ["FlateDecode", "LZWDecode", "ASCIIHexDecode", "ASCII85Decode", "RunLengthDecode"] {
        let mut group = c.benchmark_group(format!("filter/{}", filter));
        let chain = FilterChain::single(filter);

        for size in [1024, 10240, 102400] {
            let data = sample(size);
            group.bench_with_input(BenchmarkId::new("encode", size), &data, |b, data| {
                b.iter(|| registry.encode(black_box(data), &chain).ok())
            });

            let encoded = registry.encode(&data, &chain).unwrap();
            group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, encoded| {
                b.iter(|| registry.decode(black_box(encoded), &chain, &options).ok())
            });
        }

        group.finish();
    }
}

fn bench_chain(c: &mut Criterion) {
    let registry = default_registry();
    let options = ParserOptions::default();
    let mut chain = FilterChain::single("ASCII85Decode");
    chain.push("FlateDecode", None);

    let data = sample(102400);
    let encoded = registry.encode(&data, &chain).unwrap();
    c.bench_function("filter/chain/a85+flate/decode", |b| {
        b.iter(|| registry.decode(black_box(&encoded), &chain, &options).ok())
    });
}

fn bench_document_roundtrip(c: &mut Criterion) {
    let mut doc = Document::new();
    let sources = (0..64)
        .map(|i| AttachmentSource::from_bytes(format!("file{:02}.txt", i), sample(4096)))
        .collect();
    add_attachments(&mut doc, sources, false).unwrap();
    let bytes = pdf_graph::writer::write(&mut doc, &SaveOptions::default()).unwrap();

    c.bench_function("document/load+list", |b| {
        b.iter(|| {
            let mut doc = Document::load(black_box(bytes.clone())).unwrap();
            pdf_graph::attachments::list_attachments(&mut doc).unwrap().len()
        })
    });

    c.bench_function("document/full_rewrite", |b| {
        b.iter(|| {
            let mut doc = Document::load(bytes.clone()).unwrap();
            pdf_graph::writer::write(&mut doc, &SaveOptions::default()).unwrap().len()
        })
    });
}

criterion_group!(benches, bench_filters, bench_chain, bench_document_roundtrip);
criterion_main!(benches);
