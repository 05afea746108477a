//! Conversions between our matrix formats and the sprs library
//!
//! The sprs side only sees host data: conversions out of our formats
//! require a fresh host copy, and conversions in produce host-resident
//! matrices that can be synced to the device afterwards.

use sprs::CsMat;

use crate::error::Result;
use crate::matrix::{Csc, Csr};
use crate::memory::MemorySpace;
use crate::Real;

/// Converts our CSR matrix format to sprs CsMat format
pub fn to_sprs_csr(matrix: &Csr) -> Result<CsMat<Real>> {
    Ok(CsMat::new(
        (matrix.n_rows, matrix.n_cols),
        matrix.row_ptr(MemorySpace::Host)?.to_vec(),
        matrix.col_idx(MemorySpace::Host)?.to_vec(),
        matrix.values(MemorySpace::Host)?.to_vec(),
    ))
}

/// Converts our CSC matrix format to sprs CsMat format (as CSC)
pub fn to_sprs_csc(matrix: &Csc) -> Result<CsMat<Real>> {
    Ok(CsMat::new_csc(
        (matrix.n_rows, matrix.n_cols),
        matrix.col_ptr(MemorySpace::Host)?.to_vec(),
        matrix.row_idx(MemorySpace::Host)?.to_vec(),
        matrix.values(MemorySpace::Host)?.to_vec(),
    ))
}

/// Converts sprs CsMat to our host-resident CSR format
pub fn from_sprs_csr(matrix: CsMat<Real>) -> Result<Csr> {
    // Ensure matrix is in CSR format
    let matrix = if matrix.is_csr() {
        matrix
    } else {
        matrix.to_csr()
    };

    let shape = matrix.shape();
    let (indptr, indices, data) = matrix.into_raw_storage();

    Csr::from_host(shape.0, shape.1, indptr, indices, data)
}

/// Converts sprs CsMat to our host-resident CSC format
pub fn from_sprs_csc(matrix: CsMat<Real>) -> Result<Csc> {
    // Ensure matrix is in CSC format
    let matrix = if matrix.is_csc() {
        matrix
    } else {
        matrix.to_csc()
    };

    let shape = matrix.shape();
    let (indptr, indices, data) = matrix.into_raw_storage();

    Csc::from_host(shape.0, shape.1, indptr, indices, data)
}
