//! Integration tests for the matrix handler on both memory spaces

use sparsolve::handler::DeviceConfig;
use sparsolve::{Csc, Csr, MatrixHandler, MemorySpace, SparseMatrix, Vector};

/// n x n matrix whose rows each sum to 30
///
/// Row 0 holds 30 on the diagonal; row i > 0 holds i in column 0 and
/// 30 - i on the diagonal.
fn row_sum_30(n: usize) -> SparseMatrix {
    let mut row_ptr = vec![0];
    let mut col_idx = Vec::new();
    let mut values = Vec::new();
    for i in 0..n {
        if i == 0 {
            col_idx.push(0);
            values.push(30.0);
        } else {
            col_idx.push(0);
            values.push(i as f64);
            col_idx.push(i);
            values.push(30.0 - i as f64);
        }
        row_ptr.push(col_idx.len());
    }
    Csr::from_host(n, n, row_ptr, col_idx, values)
        .unwrap()
        .into()
}

fn device_handler() -> MatrixHandler {
    MatrixHandler::with_device(DeviceConfig::default())
}

#[test]
fn matvec_combines_alpha_and_beta() {
    let a = row_sum_30(12);
    let mut x = Vector::new(12);
    x.set_const(1.0, MemorySpace::Host).unwrap();
    let mut result = Vector::new(12);
    result.set_const(1.0, MemorySpace::Host).unwrap();

    let mut handler = MatrixHandler::new();
    // result = (2/30) * A * 1 + 2 * 1; every row sums to 30
    handler
        .matvec(&a, &x, &mut result, 2.0 / 30.0, 2.0, MemorySpace::Host)
        .unwrap();
    for &v in result.data(MemorySpace::Host).unwrap() {
        assert!((v - 4.0).abs() < 1e-14, "got {v}");
    }
}

#[test]
fn matvec_on_device_matches_host() {
    let mut a = row_sum_30(50);
    let mut x = Vector::new(50);
    x.set_const(1.0, MemorySpace::Host).unwrap();
    let mut host_result = Vector::new(50);
    host_result.set_const(1.0, MemorySpace::Host).unwrap();
    let mut dev_result = Vector::new(50);
    dev_result.set_const(1.0, MemorySpace::Host).unwrap();

    let mut handler = device_handler();
    handler
        .matvec(&a, &x, &mut host_result, 2.0 / 30.0, 2.0, MemorySpace::Host)
        .unwrap();

    if let SparseMatrix::Csr(m) = &mut a {
        m.sync(MemorySpace::Device).unwrap();
    }
    x.sync(MemorySpace::Device).unwrap();
    dev_result.sync(MemorySpace::Device).unwrap();
    handler
        .matvec(&a, &x, &mut dev_result, 2.0 / 30.0, 2.0, MemorySpace::Device)
        .unwrap();

    dev_result.sync(MemorySpace::Host).unwrap();
    let host = host_result.data(MemorySpace::Host).unwrap();
    let dev = dev_result.data(MemorySpace::Host).unwrap();
    for (h, d) in host.iter().zip(dev) {
        assert!((h - d).abs() < 1e-12);
    }
}

#[test]
fn inf_norm_is_max_row_sum() {
    let a = row_sum_30(8);
    let handler = MatrixHandler::new();
    let norm = handler.matrix_inf_norm(&a, MemorySpace::Host).unwrap();
    assert_eq!(norm, 30.0);
}

#[test]
fn inf_norm_on_device() {
    let mut a = row_sum_30(8);
    if let SparseMatrix::Csr(m) = &mut a {
        m.sync(MemorySpace::Device).unwrap();
    }
    let handler = device_handler();
    let norm = handler.matrix_inf_norm(&a, MemorySpace::Device).unwrap();
    assert_eq!(norm, 30.0);
}

#[test]
fn csc_to_csr_rectangular() {
    // 3 x 4:
    // [ 1 . 4 . ]
    // [ . 3 5 . ]
    // [ 2 . . 6 ]
    let csc = Csc::from_host(
        3,
        4,
        vec![0, 2, 3, 5, 6],
        vec![0, 2, 1, 0, 1, 2],
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
    )
    .unwrap();
    let mut csr = Csr::new(3, 4, 6);

    let handler = MatrixHandler::new();
    handler.csc2csr(&csc, &mut csr, MemorySpace::Host).unwrap();

    assert_eq!(csr.row_ptr(MemorySpace::Host).unwrap(), &[0, 2, 4, 6]);
    assert_eq!(csr.col_idx(MemorySpace::Host).unwrap(), &[0, 2, 1, 2, 0, 3]);
    assert_eq!(
        csr.values(MemorySpace::Host).unwrap(),
        &[1.0, 4.0, 3.0, 5.0, 2.0, 6.0]
    );
}

#[test]
fn transpose_rectangular() {
    // 2 x 3:
    // [ 1 . 2 ]
    // [ . 3 . ]
    let a: SparseMatrix = Csr::from_host(
        2,
        3,
        vec![0, 2, 3],
        vec![0, 2, 1],
        vec![1.0, 2.0, 3.0],
    )
    .unwrap()
    .into();
    let mut at = Csr::new(3, 2, 3);

    let handler = MatrixHandler::new();
    handler.transpose(&a, &mut at, MemorySpace::Host).unwrap();

    assert_eq!(at.n_rows, 3);
    assert_eq!(at.n_cols, 2);
    assert_eq!(at.row_ptr(MemorySpace::Host).unwrap(), &[0, 1, 2, 3]);
    assert_eq!(at.col_idx(MemorySpace::Host).unwrap(), &[0, 1, 0]);
    assert_eq!(at.values(MemorySpace::Host).unwrap(), &[1.0, 3.0, 2.0]);
}

#[test]
fn add_const_shifts_stored_values_only() {
    let mut a: SparseMatrix = Csr::from_host(
        2,
        2,
        vec![0, 1, 2],
        vec![0, 1],
        vec![1.0, 2.0],
    )
    .unwrap()
    .into();

    let handler = MatrixHandler::new();
    handler.add_const(&mut a, 10.0, MemorySpace::Host).unwrap();

    let m = a.as_csr().unwrap();
    assert_eq!(m.values(MemorySpace::Host).unwrap(), &[11.0, 12.0]);
    assert_eq!(m.nnz(), 2, "pattern must not grow");
}

#[test]
fn device_calls_fail_without_device_backend() {
    let a = row_sum_30(4);
    let handler = MatrixHandler::new();
    assert!(!handler.is_device_enabled());
    assert!(handler.matrix_inf_norm(&a, MemorySpace::Device).is_err());
}

#[test]
fn failed_device_add_const_keeps_host_copy_fresh() {
    // host-resident matrix, never synced to the device
    let mut a: SparseMatrix = Csr::from_host(
        2,
        2,
        vec![0, 1, 2],
        vec![0, 1],
        vec![1.0, 2.0],
    )
    .unwrap()
    .into();

    let handler = device_handler();
    assert!(handler
        .add_const(&mut a, 10.0, MemorySpace::Device)
        .is_err());

    // the failed device call must not have invalidated the host values
    let m = a.as_csr().unwrap();
    assert_eq!(m.values(MemorySpace::Host).unwrap(), &[1.0, 2.0]);
}

#[test]
fn matvec_requires_csr_input() {
    let csc = Csc::from_host(2, 2, vec![0, 1, 2], vec![0, 1], vec![1.0, 2.0]).unwrap();
    let a = SparseMatrix::from(csc);
    let x = Vector::new(2);
    let mut result = Vector::new(2);
    let mut handler = MatrixHandler::new();
    assert!(handler
        .matvec(&a, &x, &mut result, 1.0, 0.0, MemorySpace::Host)
        .is_err());
}
