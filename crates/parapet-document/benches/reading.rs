//! Document reading and writing benchmarks.
//!
//! Measures parsing plus local reference resolution, and writing back out
//! with and without inlining, for documents with a growing number of channels.
//!
//! Run with: cargo bench -p parapet-document --bench reading

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use parapet_document::{DocumentReader, DocumentWriter, WriterSettings};

/// Generate an AsyncAPI 2.6 document with N channels.
///
/// Each channel publishes a message whose payload points at a shared,
/// self-referencing schema, so cycle handling is part of every write.
fn generate_document(channel_count: usize) -> String {
    let mut yaml = String::from(
        r#"asyncapi: "2.6.0"
info:
  title: Benchmark API
  version: "1.0.0"
channels:
"#,
    );

    for i in 0..channel_count {
        yaml.push_str(&format!(
            r##"  resource{i}/changed:
    publish:
      operationId: publish_resource{i}
      message:
        name: resource{i}Changed
        payload:
          type: object
          properties:
            id:
              type: string
              format: uuid
            node:
              $ref: '#/components/schemas/Node'
            count:
              type: integer
              minimum: 0
              default: 1
"##,
        ));
    }

    yaml.push_str(
        r##"components:
  schemas:
    Node:
      type: object
      properties:
        label:
          type: string
          maxLength: 255
        children:
          type: array
          items:
            $ref: '#/components/schemas/Node'
"##,
    );

    yaml
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    let reader = DocumentReader::default();

    for channel_count in [10, 50, 100] {
        let text = generate_document(channel_count);
        group.bench_with_input(
            BenchmarkId::new("parse_and_resolve", format!("{}_channels", channel_count)),
            &text,
            |b, text| {
                b.iter(|| black_box(reader.read(black_box(text)).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");
    let reader = DocumentReader::default();

    for channel_count in [10, 50, 100] {
        let document = reader
            .read(&generate_document(channel_count))
            .unwrap()
            .document;

        for (name, settings) in [
            ("references", WriterSettings::default()),
            (
                "inlined",
                WriterSettings::default().with_inline_local_references(true),
            ),
        ] {
            let writer = DocumentWriter::new(settings);
            group.bench_with_input(
                BenchmarkId::new(name, format!("{}_channels", channel_count)),
                &document,
                |b, document| {
                    b.iter(|| black_box(writer.write(black_box(document), None).unwrap()));
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_read, bench_write);
criterion_main!(benches);
