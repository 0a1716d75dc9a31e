// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for printer resolution and the raw job lifecycle,
// measured against the in-memory scripted backend.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use rawspool_core::types::{DocumentInfo, PrinterRecord};
use rawspool_print::directory::{PrinterDirectory, Selector};
use rawspool_print::job::RawPrintJob;
use rawspool_print::mock::ScriptedBackend;

/// A ZPL label of roughly `bytes` bytes.
fn zpl_payload(bytes: usize) -> Vec<u8> {
    let field = b"^FO50,50^A0N,30,30^FDPallet 000123 / Dock 4^FS";
    let mut payload = b"^XA".to_vec();
    while payload.len() + field.len() + 3 < bytes {
        payload.extend_from_slice(field);
    }
    payload.extend_from_slice(b"^XZ");
    payload
}

fn bench_resolve(c: &mut Criterion) {
    let mut names: Vec<String> = (0..200).map(|i| format!("Office printer {i}")).collect();
    names.push("ZDesigner GK420t".into());
    let backend = ScriptedBackend::with_printers(names);
    let directory = PrinterDirectory::new(&backend);

    c.bench_function("resolve_last_of_201", |b| {
        let selector = Selector::Contains("ZDesigner".into());
        b.iter(|| directory.resolve(black_box(&selector)).expect("resolve"))
    });

    c.bench_function("resolve_ignore_case", |b| {
        let selector = Selector::ContainsIgnoreCase("zdesigner".into());
        b.iter(|| directory.resolve(black_box(&selector)).expect("resolve"))
    });
}

fn bench_submit(c: &mut Criterion) {
    let target = PrinterRecord::local("ZDesigner GK420t").descriptor();
    let mut group = c.benchmark_group("submit");

    for size in [512usize, 8 * 1024, 256 * 1024] {
        let payload = zpl_payload(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            // Fresh backend per batch so recorded output does not accumulate.
            b.iter_batched(
                || ScriptedBackend::with_printers(["ZDesigner GK420t"]),
                |backend| {
                    RawPrintJob::new(&backend, target.clone(), DocumentInfo::default())
                        .submit(black_box(payload))
                        .expect("submit")
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();

    c.bench_function("submit_short_writes_64k", |b| {
        let payload = zpl_payload(64 * 1024);
        b.iter_batched(
            || ScriptedBackend::with_printers(["ZDesigner GK420t"]).max_write(1000),
            |backend| {
                RawPrintJob::new(&backend, target.clone(), DocumentInfo::default())
                    .submit(black_box(&payload))
                    .expect("submit")
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_resolve, bench_submit);
criterion_main!(benches);
