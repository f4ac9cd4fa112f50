use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

fn nested_script() -> String {
    let mut src = String::new();
    src.push_str("$total := 0\n");
    for i in 0..50 {
        src.push_str(&format!("$i{i} := 0\n"));
        src.push_str(&format!("WHILE $i{i} < 10\n"));
        src.push_str(&format!("  IF $i{i} = 5\n"));
        src.push_str("    $total += 2\n");
        src.push_str("  ELSE\n");
        src.push_str("    $total += 1\n");
        src.push_str("  END\n");
        src.push_str(&format!("  $i{i}++\n"));
        src.push_str("END\n");
    }
    src.push_str("echo $total\n");
    src
}

fn bench_compile(c: &mut Criterion) {
    let src = nested_script();
    c.bench_function("preprocess_nested_blocks", |b| {
        b.iter(|| black_box(core_lang::preprocess(black_box(&src), "bench.ts").unwrap()))
    });
    c.bench_function("compile_full_pipeline", |b| {
        b.iter(|| black_box(core_lang::compile_source(black_box(&src), "bench.ts").unwrap()))
    });
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
