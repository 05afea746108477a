//! Property-based tests for the format conversion kernels

use proptest::prelude::*;

use sparsolve::matrix::{convert_csc_to_csr, convert_csr_to_csc};
use sparsolve::{Csc, Csr, MemorySpace};

/// Random CSC matrix: dimensions up to 12 x 12, density up to full
fn arb_csc() -> impl Strategy<Value = Csc> {
    (1usize..12, 1usize..12)
        .prop_flat_map(|(n_rows, n_cols)| {
            let cell = proptest::option::weighted(0.4, -100.0..100.0f64);
            (
                Just(n_rows),
                Just(n_cols),
                proptest::collection::vec(cell, n_rows * n_cols),
            )
        })
        .prop_map(|(n_rows, n_cols, cells)| {
            let mut col_ptr = vec![0];
            let mut row_idx = Vec::new();
            let mut values = Vec::new();
            for j in 0..n_cols {
                for i in 0..n_rows {
                    if let Some(v) = cells[j * n_rows + i] {
                        row_idx.push(i);
                        values.push(v);
                    }
                }
                col_ptr.push(row_idx.len());
            }
            Csc::from_host(n_rows, n_cols, col_ptr, row_idx, values).unwrap()
        })
}

/// Dense image of a CSC matrix, for order-independent comparison
fn dense_of_csc(m: &Csc) -> Vec<f64> {
    let mut dense = vec![0.0; m.n_rows * m.n_cols];
    for j in 0..m.n_cols {
        for (i, v) in m.col_iter(j).unwrap() {
            dense[i * m.n_cols + j] += v;
        }
    }
    dense
}

fn dense_of_csr(m: &Csr) -> Vec<f64> {
    let mut dense = vec![0.0; m.n_rows * m.n_cols];
    for i in 0..m.n_rows {
        for (j, v) in m.row_iter(i).unwrap() {
            dense[i * m.n_cols + j] += v;
        }
    }
    dense
}

proptest! {
    #[test]
    fn csc_to_csr_preserves_every_entry(csc in arb_csc()) {
        let mut csr = Csr::new(csc.n_rows, csc.n_cols, csc.nnz());
        convert_csc_to_csr(&csc, &mut csr, MemorySpace::Host).unwrap();

        prop_assert_eq!(csr.nnz(), csc.nnz());
        prop_assert_eq!(dense_of_csr(&csr), dense_of_csc(&csc));
    }

    #[test]
    fn csr_rows_come_out_column_sorted(csc in arb_csc()) {
        let mut csr = Csr::new(csc.n_rows, csc.n_cols, csc.nnz());
        convert_csc_to_csr(&csc, &mut csr, MemorySpace::Host).unwrap();

        let row_ptr = csr.row_ptr(MemorySpace::Host).unwrap();
        let col_idx = csr.col_idx(MemorySpace::Host).unwrap();
        for i in 0..csr.n_rows {
            let row = &col_idx[row_ptr[i]..row_ptr[i + 1]];
            prop_assert!(row.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn round_trip_restores_the_source_arrays(csc in arb_csc()) {
        let mut csr = Csr::new(csc.n_rows, csc.n_cols, csc.nnz());
        convert_csc_to_csr(&csc, &mut csr, MemorySpace::Host).unwrap();
        let mut back = Csc::new(csc.n_rows, csc.n_cols, csc.nnz());
        convert_csr_to_csc(&csr, &mut back, MemorySpace::Host).unwrap();

        // the source has sorted rows within each column, so the round trip
        // is exact on the raw arrays, not just on the entry set
        prop_assert_eq!(
            back.col_ptr(MemorySpace::Host).unwrap(),
            csc.col_ptr(MemorySpace::Host).unwrap()
        );
        prop_assert_eq!(
            back.row_idx(MemorySpace::Host).unwrap(),
            csc.row_idx(MemorySpace::Host).unwrap()
        );
        prop_assert_eq!(
            back.values(MemorySpace::Host).unwrap(),
            csc.values(MemorySpace::Host).unwrap()
        );
    }
}
