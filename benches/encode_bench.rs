//! Benchmarks for instruction encoding, module emission, and linking.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use fasterbasic::encoder::*;
use fasterbasic::linker::{link, LinkRegion, STUB_SIZE};
use fasterbasic::module::JitModule;
use fasterbasic::parser::parse_source;

/// Benchmark raw word encoding
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    group.bench_function("add_register", |b| {
        b.iter(|| {
            black_box(emit_add_register_64(
                black_box(Reg::X0),
                black_box(Reg::X1),
                reg_only(black_box(Reg::X2)),
            ))
        })
    });

    group.bench_function("logical_immediate", |b| {
        b.iter(|| black_box(encode_logical_immediate_64(black_box(0xFF00FF00FF00FF00))))
    });

    group.bench_function("load_immediate_worst_case", |b| {
        b.iter(|| black_box(emit_load_immediate_64(Reg::X0, black_box(0x1234_5678_9ABC_DEF0))))
    });

    group.finish();
}

/// Benchmark module emission for varying instruction counts
fn bench_module_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("module_emit");

    for &size in &[16, 128, 1024] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("{}_words", size), |b| {
            b.iter(|| {
                let mut module = JitModule::new();
                for i in 0..size {
                    module.emit(emit_movz_64(Reg::X0, i as u16, 0)).unwrap();
                }
                black_box(module)
            })
        });
    }

    group.finish();
}

/// Benchmark linking with a spread of extern call sites
fn bench_link(c: &mut Criterion) {
    let mut module = JitModule::new();
    for i in 0..256 {
        module.emit_ext_call(&format!("rt_fn_{}", i % 8)).unwrap();
    }
    module.emit(emit_ret()).unwrap();
    module.seal();

    let code_len = module.code().len();
    c.bench_function("link_256_calls_8_externs", |b| {
        let mut code = vec![0u8; code_len];
        let mut tramps = vec![0u8; 8 * STUB_SIZE];
        b.iter(|| {
            let mut region = LinkRegion {
                code: &mut code,
                trampolines: &mut tramps,
                code_base_addr: 0x10000,
                trampoline_base_addr: 0x20000,
            };
            black_box(link(&module, |_| Some(0x7000_0000), &mut region).unwrap())
        })
    });
}

/// Benchmark parsing a small program
fn bench_parse(c: &mut Criterion) {
    let source = "\
FOR i = 1 TO 100
  IF i MOD 3 = 0 THEN
    total = total + i * 2 ^ 2
  ELSE
    total = total - 1
  ENDIF
NEXT i
PRINT total
";
    c.bench_function("parse_loop_program", |b| {
        b.iter(|| black_box(parse_source(black_box(source)).unwrap()))
    });
}

criterion_group!(benches, bench_encode, bench_module_emit, bench_link, bench_parse);
criterion_main!(benches);
