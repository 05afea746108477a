//! Benchmarks for the matrix kernels and the factorization paths

use std::cell::RefCell;
use std::hint::black_box;
use std::rc::Rc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use sparsolve::handler::DeviceConfig;
use sparsolve::matrix::convert_csr_to_csc;
use sparsolve::solver::SharedCsr;
use sparsolve::{
    Csc, Csr, DirectSolver, HostLu, MatrixHandler, MemorySpace, SparseMatrix, Vector,
};

/// Banded diagonally dominant matrix with `band` off-diagonals per side
fn banded(n: usize, band: usize) -> Csr {
    let mut row_ptr = vec![0];
    let mut col_idx = Vec::new();
    let mut values = Vec::new();
    for i in 0..n {
        let lo = i.saturating_sub(band);
        let hi = (i + band + 1).min(n);
        for j in lo..hi {
            col_idx.push(j);
            values.push(if j == i { 4.0 * band as f64 } else { -1.0 });
        }
        row_ptr.push(col_idx.len());
    }
    Csr::from_host(n, n, row_ptr, col_idx, values).unwrap()
}

fn bench_matvec(c: &mut Criterion) {
    let mut group = c.benchmark_group("matvec");
    for n in [1_000, 10_000, 100_000] {
        let mut m = banded(n, 2);
        m.sync(MemorySpace::Device).unwrap();
        let a = SparseMatrix::from(m);
        let mut x = Vector::new(n);
        x.set_const(1.0, MemorySpace::Host).unwrap();
        x.sync(MemorySpace::Device).unwrap();
        let mut result = Vector::new(n);

        let mut host = MatrixHandler::new();
        group.bench_with_input(BenchmarkId::new("host", n), &n, |b, _| {
            b.iter(|| {
                result.set_const(0.0, MemorySpace::Host).unwrap();
                host.matvec(&a, &x, &mut result, 1.0, 0.0, MemorySpace::Host)
                    .unwrap();
                black_box(&result);
            })
        });

        let mut device = MatrixHandler::with_device(DeviceConfig::default());
        group.bench_with_input(BenchmarkId::new("device", n), &n, |b, _| {
            b.iter(|| {
                result.set_const(0.0, MemorySpace::Device).unwrap();
                device
                    .matvec(&a, &x, &mut result, 1.0, 0.0, MemorySpace::Device)
                    .unwrap();
                black_box(&result);
            })
        });
    }
    group.finish();
}

fn bench_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("csr_to_csc");
    for n in [1_000, 10_000, 100_000] {
        let m = banded(n, 2);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut csc = Csc::new(n, n, m.nnz());
                convert_csr_to_csc(&m, &mut csc, MemorySpace::Host).unwrap();
                black_box(&csc);
            })
        });
    }
    group.finish();
}

fn bench_factorization(c: &mut Criterion) {
    let mut group = c.benchmark_group("host_lu");
    group.sample_size(20);
    for n in [100, 1_000] {
        let a: SharedCsr = Rc::new(RefCell::new(banded(n, 2)));

        group.bench_with_input(BenchmarkId::new("factorize", n), &n, |b, _| {
            let mut solver = HostLu::new();
            solver.setup(a.clone(), None).unwrap();
            solver.analyze().unwrap();
            b.iter(|| solver.factorize().unwrap())
        });

        group.bench_with_input(BenchmarkId::new("refactorize", n), &n, |b, _| {
            let mut solver = HostLu::new();
            solver.setup(a.clone(), None).unwrap();
            solver.analyze().unwrap();
            solver.factorize().unwrap();
            b.iter(|| solver.refactorize().unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_matvec, bench_conversion, bench_factorization);
criterion_main!(benches);
