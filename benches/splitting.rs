use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mailsplit::events::MemorySink;
use mailsplit::export::eml::{rebuild_message, HeaderLayout};
use mailsplit::parser::mime::{parse_message, MAX_DEPTH};

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(path).unwrap()
}

fn bench_parse(c: &mut Criterion) {
    let raw = fixture("nested.eml");

    c.bench_function("parse_nested_eml", |b| {
        b.iter(|| parse_message(&raw, MAX_DEPTH).unwrap().body.parts.len())
    });
}

fn bench_rebuild(c: &mut Criterion) {
    let raw = fixture("multiple.eml");
    let message = parse_message(&raw, MAX_DEPTH).unwrap();

    c.bench_function("rebuild_multiple_eml", |b| {
        b.iter(|| rebuild_message(&message, HeaderLayout::Verbatim, &MemorySink::new()).unwrap())
    });
}

fn bench_split(c: &mut Criterion) {
    let raw = fixture("multiple.eml");
    let dir = tempfile::tempdir().unwrap();

    c.bench_function("split_multiple_eml", |b| {
        b.iter(|| mailsplit::process(&raw, dir.path()).unwrap())
    });
}

criterion_group!(benches, bench_parse, bench_rebuild, bench_split);
criterion_main!(benches);
