//! Conversion between compressed sparse formats
//!
//! One shared counting-sort conversion used by every consumer: the matrix
//! handler's `csc2csr` and `transpose` paths and the solver backends that
//! bridge seed factors between formats. CSR→CSC is the same algorithm with
//! the roles of rows and columns swapped.
//!
//! Within each destination row the column order follows the source column
//! order; entries are not sorted by column index.

use num_traits::Num;

use crate::error::{Result, SolverError};
use crate::matrix::{Csc, Csr};
use crate::memory::MemorySpace;

/// Convert CSC index/value arrays into pre-allocated CSR arrays
///
/// Counting sort over the destination row index, O(n_rows + nnz):
/// histogram of nonzeros per row in `row_ptr`, prefix sum into start
/// offsets, scatter pass that advances each row's cursor, then a final
/// right-shift restoring row-pointer semantics.
///
/// All output slices must be sized by the caller: `row_ptr` of
/// `n_rows + 1`, `col_idx` and `values` of `nnz`.
#[allow(clippy::too_many_arguments)]
pub fn csc_to_csr<T: Copy + Num>(
    n_rows: usize,
    n_cols: usize,
    src_col_ptr: &[usize],
    src_row_idx: &[usize],
    src_values: &[T],
    row_ptr: &mut [usize],
    col_idx: &mut [usize],
    values: &mut [T],
) {
    let nnz = src_row_idx.len();
    debug_assert_eq!(src_col_ptr.len(), n_cols + 1);
    debug_assert_eq!(row_ptr.len(), n_rows + 1);
    debug_assert_eq!(col_idx.len(), nnz);
    debug_assert_eq!(values.len(), nnz);

    for p in row_ptr.iter_mut() {
        *p = 0;
    }
    for i in 0..nnz {
        col_idx[i] = 0;
        values[i] = T::zero();
    }

    // Histogram of nonzeros per destination row
    for &row in src_row_idx {
        row_ptr[row] += 1;
    }

    // Prefix sum turns per-row counts into row start offsets
    let mut running = 0;
    for row in 0..n_rows {
        let count = row_ptr[row];
        row_ptr[row] = running;
        running += count;
    }
    row_ptr[n_rows] = nnz;

    // Scatter, walking source columns in increasing order. Each row-pointer
    // slot serves as that row's next-free-slot cursor and ends up advanced
    // past the row's start.
    for col in 0..n_cols {
        for jj in src_col_ptr[col]..src_col_ptr[col + 1] {
            let row = src_row_idx[jj];
            let dest = row_ptr[row];
            col_idx[dest] = col;
            values[dest] = src_values[jj];
            row_ptr[row] += 1;
        }
    }

    // Shift right by one slot to restore row-pointer semantics
    let mut last = 0;
    for p in row_ptr.iter_mut() {
        let temp = *p;
        *p = last;
        last = temp;
    }
}

/// Convert CSR index/value arrays into pre-allocated CSC arrays
///
/// The same counting sort with rows and columns exchanged.
#[allow(clippy::too_many_arguments)]
pub fn csr_to_csc<T: Copy + Num>(
    n_rows: usize,
    n_cols: usize,
    src_row_ptr: &[usize],
    src_col_idx: &[usize],
    src_values: &[T],
    col_ptr: &mut [usize],
    row_idx: &mut [usize],
    values: &mut [T],
) {
    csc_to_csr(
        n_cols,
        n_rows,
        src_row_ptr,
        src_col_idx,
        src_values,
        col_ptr,
        row_idx,
        values,
    );
}

fn check_shapes(
    src_rows: usize,
    src_cols: usize,
    src_nnz: usize,
    dst_rows: usize,
    dst_cols: usize,
    dst_nnz: usize,
) -> Result<()> {
    if src_rows != dst_rows {
        return Err(SolverError::DimensionMismatch {
            expected: src_rows,
            actual: dst_rows,
        });
    }
    if src_cols != dst_cols {
        return Err(SolverError::DimensionMismatch {
            expected: src_cols,
            actual: dst_cols,
        });
    }
    if src_nnz != dst_nnz {
        return Err(SolverError::NnzMismatch {
            expected: src_nnz,
            actual: dst_nnz,
        });
    }
    Ok(())
}

/// Fill a pre-allocated CSR matrix from a CSC matrix in the given space
///
/// Preconditions: `src` is populated and fresh in `space`; `dst` was created
/// with the same dimensions and nnz. `dst` is marked updated in `space`.
pub fn convert_csc_to_csr(src: &Csc, dst: &mut Csr, space: MemorySpace) -> Result<()> {
    check_shapes(
        src.n_rows,
        src.n_cols,
        src.nnz(),
        dst.n_rows,
        dst.n_cols,
        dst.nnz(),
    )?;
    dst.allocate(space);

    let col_ptr = src.col_ptr(space)?;
    let row_idx = src.row_idx(space)?;
    let values = src.values(space)?;
    {
        let (dst_row_ptr, dst_col_idx, dst_values) = dst.arrays_mut(space)?;
        csc_to_csr(
            src.n_rows, src.n_cols, col_ptr, row_idx, values, dst_row_ptr, dst_col_idx,
            dst_values,
        );
    }
    dst.set_updated(space);
    Ok(())
}

/// Fill a pre-allocated CSC matrix from a CSR matrix in the given space
pub fn convert_csr_to_csc(src: &Csr, dst: &mut Csc, space: MemorySpace) -> Result<()> {
    check_shapes(
        src.n_rows,
        src.n_cols,
        src.nnz(),
        dst.n_rows,
        dst.n_cols,
        dst.nnz(),
    )?;
    dst.allocate(space);

    let row_ptr = src.row_ptr(space)?;
    let col_idx = src.col_idx(space)?;
    let values = src.values(space)?;
    {
        let (dst_col_ptr, dst_row_idx, dst_values) = dst.arrays_mut(space)?;
        csr_to_csc(
            src.n_rows, src.n_cols, row_ptr, col_idx, values, dst_col_ptr, dst_row_idx,
            dst_values,
        );
    }
    dst.set_updated(space);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csc_to_csr_slices() {
        // Create a CSC matrix
        //    [1 2 0]
        //    [0 3 0]
        //    [4 0 5]
        let col_ptr = vec![0, 2, 4, 5];
        let row_idx = vec![0, 2, 0, 1, 2];
        let vals = vec![1.0, 4.0, 2.0, 3.0, 5.0];

        let mut row_ptr = vec![0usize; 4];
        let mut col_idx = vec![0usize; 5];
        let mut out_vals = vec![0.0f64; 5];

        csc_to_csr(
            3,
            3,
            &col_ptr,
            &row_idx,
            &vals,
            &mut row_ptr,
            &mut col_idx,
            &mut out_vals,
        );

        assert_eq!(row_ptr, vec![0, 2, 3, 5]);
        assert_eq!(col_idx, vec![0, 1, 1, 0, 2]);
        assert_eq!(out_vals, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_convert_matrix_wrapper() {
        let csc = Csc::from_host(
            3,
            3,
            vec![0, 2, 4, 5],
            vec![0, 2, 0, 1, 2],
            vec![1.0, 4.0, 2.0, 3.0, 5.0],
        )
        .unwrap();

        let mut csr = Csr::new(3, 3, 5);
        convert_csc_to_csr(&csc, &mut csr, MemorySpace::Host).unwrap();

        assert_eq!(csr.row_ptr(MemorySpace::Host).unwrap(), &[0, 2, 3, 5]);
        let row1: Vec<_> = csr.row_iter(1).unwrap().collect();
        assert_eq!(row1, vec![(1, 3.0)]);
    }

    #[test]
    fn test_roundtrip_triples() {
        let csc = Csc::from_host(
            4,
            3,
            vec![0, 2, 3, 5],
            vec![0, 3, 1, 0, 2],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap();

        let mut csr = Csr::new(4, 3, 5);
        convert_csc_to_csr(&csc, &mut csr, MemorySpace::Host).unwrap();
        let mut back = Csc::new(4, 3, 5);
        convert_csr_to_csc(&csr, &mut back, MemorySpace::Host).unwrap();

        for j in 0..3 {
            let mut orig: Vec<_> = csc.col_iter(j).unwrap().collect();
            let mut round: Vec<_> = back.col_iter(j).unwrap().collect();
            orig.sort_by_key(|&(r, _)| r);
            round.sort_by_key(|&(r, _)| r);
            assert_eq!(orig, round);
        }
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let csc = Csc::from_host(2, 2, vec![0, 1, 2], vec![0, 1], vec![1.0, 2.0]).unwrap();
        let mut wrong_nnz = Csr::new(2, 2, 3);
        assert!(convert_csc_to_csr(&csc, &mut wrong_nnz, MemorySpace::Host).is_err());

        let mut wrong_rows = Csr::new(3, 2, 2);
        assert!(convert_csc_to_csr(&csc, &mut wrong_rows, MemorySpace::Host).is_err());
    }
}
