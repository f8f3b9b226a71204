use std::collections::BTreeMap;

use nalgebra::DMatrix;

use crate::error::{EigsysError, Result};

/// Compressed-row matrix as supplied by a caller
///
/// Row `r` holds the entries `values[row_ptr[r]..row_ptr[r + 1]]` in columns
/// `col_idx[row_ptr[r]..row_ptr[r + 1]]`. Columns within a row need not be sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    pub(crate) shape: [usize; 2],
    pub(crate) row_ptr: Vec<usize>,
    pub(crate) col_idx: Vec<usize>,
    pub(crate) values: Vec<f64>,
}

impl CsrMatrix {
    /// Build a matrix from raw compressed-row arrays, checking that they are consistent
    pub fn new(
        shape: [usize; 2],
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        let [rows, cols] = shape;

        if row_ptr.len() != rows + 1 {
            return Err(EigsysError::MalformedMatrix(format!(
                "expected {} row pointers for {} rows, found {}",
                rows + 1,
                rows,
                row_ptr.len()
            )));
        }
        if row_ptr[0] != 0 {
            return Err(EigsysError::MalformedMatrix(
                "first row pointer must be zero".to_string(),
            ));
        }
        if let Some(r) = row_ptr.windows(2).position(|w| w[0] > w[1]) {
            return Err(EigsysError::MalformedMatrix(format!(
                "row pointers decrease at row {}",
                r
            )));
        }
        if col_idx.len() != values.len() || row_ptr[rows] != values.len() {
            return Err(EigsysError::MalformedMatrix(format!(
                "row pointers describe {} entries but {} column indices and {} values were given",
                row_ptr[rows],
                col_idx.len(),
                values.len()
            )));
        }
        if let Some(&c) = col_idx.iter().find(|&&c| c >= cols) {
            return Err(EigsysError::MalformedMatrix(format!(
                "column index {} exceeds the number of columns ({})",
                c, cols
            )));
        }

        Ok(Self {
            shape,
            row_ptr,
            col_idx,
            values,
        })
    }

    /// Square matrix with `diagonal` on its main diagonal
    pub fn from_diagonal(diagonal: &[f64]) -> Self {
        let n = diagonal.len();
        Self {
            shape: [n, n],
            row_ptr: (0..=n).collect(),
            col_idx: (0..n).collect(),
            values: diagonal.to_vec(),
        }
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn is_square(&self) -> bool {
        self.shape[0] == self.shape[1]
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of stored entries (explicit zeros included)
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Iterate over the stored entries of row `r` as `(column, value)`
    pub fn row(&self, r: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_ptr[r]..self.row_ptr[r + 1];
        self.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }
}

impl From<&CsrMatrix> for DMatrix<f64> {
    fn from(csr: &CsrMatrix) -> Self {
        let [rows, cols] = csr.shape;
        let mut dense = DMatrix::zeros(rows, cols);
        for r in 0..rows {
            for (c, v) in csr.row(r) {
                dense[(r, c)] += v;
            }
        }
        dense
    }
}

/// Wrapper around a BTreeMap to assemble matrices entry by entry
#[derive(Clone)]
pub struct SparseMatrix {
    /// Number of rows and columns
    pub shape: [usize; 2],
    /// Matrix Entries
    entries: BTreeMap<[u32; 2], f64>,
}

impl SparseMatrix {
    pub fn new(shape: [usize; 2]) -> Self {
        assert!(
            shape[0] <= (std::u32::MAX as usize) && shape[1] <= (std::u32::MAX as usize),
            "Matrix Dimensions cannot exceed the size of a u32!"
        );

        Self {
            shape,
            entries: BTreeMap::new(),
        }
    }

    pub fn square(dimension: usize) -> Self {
        Self::new([dimension, dimension])
    }

    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Add a value into the matrix. Values inserted at the same location are summed.
    pub fn insert(&mut self, [row_idx, col_idx]: [usize; 2], value: f64) {
        assert!(
            row_idx < self.shape[0],
            "row_idx exceeded matrix dimension; cannot insert value!"
        );
        assert!(
            col_idx < self.shape[1],
            "col_idx exceeded matrix dimension; cannot insert value!"
        );

        self.entries
            .entry([row_idx as u32, col_idx as u32])
            .and_modify(|current_value| *current_value += value)
            .or_insert(value);
    }

    /// Insert a value and its transpose counterpart (only once on the diagonal)
    pub fn insert_symmetric(&mut self, [row_idx, col_idx]: [usize; 2], value: f64) {
        self.insert([row_idx, col_idx], value);
        if row_idx != col_idx {
            self.insert([col_idx, row_idx], value);
        }
    }

    /// Insert a group of entries
    pub fn insert_group(&mut self, entry_group: impl IntoIterator<Item = ([usize; 2], f64)>) {
        for (rc, value) in entry_group {
            self.insert(rc, value);
        }
    }

    // Remove the entries from the matrix, replacing them with an empty BTreeMap.
    fn take_entries(&mut self) -> BTreeMap<[u32; 2], f64> {
        std::mem::take(&mut self.entries)
    }

    /// Consume the entries from another sparse matrix leaving it empty.
    pub fn consume_matrix(&mut self, other: &mut Self) {
        assert!(
            self.shape == other.shape,
            "Sparse Matrices have different dimensions; cannot consume matrix!"
        );

        for (coordinates, value) in other.take_entries() {
            self.entries
                .entry(coordinates)
                .and_modify(|current_value| *current_value += value)
                .or_insert(value);
        }
    }

    /// Iterate over the entries of the matrix sorted by row then column
    pub fn iter(&self) -> impl Iterator<Item = ([usize; 2], f64)> + '_ {
        self.entries
            .iter()
            .map(|(coords, value)| ([coords[0] as usize, coords[1] as usize], *value))
    }
}

impl From<SparseMatrix> for CsrMatrix {
    fn from(sm: SparseMatrix) -> Self {
        let [rows, _] = sm.shape;

        // number of entries in each row (indices offset by 1)
        let mut row_ptr = vec![0; rows + 1];
        for [r, _] in sm.entries.keys() {
            row_ptr[*r as usize + 1] += 1;
        }

        // prefix sum on row counts
        for r in 1..=rows {
            row_ptr[r] += row_ptr[r - 1];
        }

        // BTreeMap keys are already sorted by row then column
        let (col_idx, values) = sm
            .entries
            .iter()
            .map(|([_, c], v)| (*c as usize, *v))
            .unzip();

        CsrMatrix {
            shape: sm.shape,
            row_ptr,
            col_idx,
            values,
        }
    }
}

impl From<SparseMatrix> for DMatrix<f64> {
    fn from(sm: SparseMatrix) -> Self {
        let mut dense = DMatrix::zeros(sm.shape[0], sm.shape[1]);

        for ([r, c], v) in sm.iter() {
            dense[(r, c)] = v;
        }

        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_insertion() {
        let mut sm = SparseMatrix::square(10);

        sm.insert([0, 0], 1.0);
        sm.insert([0, 0], 1.0);
        sm.insert([9, 9], 10.0);
        sm.insert([4, 3], 0.25);
        sm.insert_symmetric([0, 8], 0.125);

        let raw_entries = sm.take_entries();

        assert!((raw_entries.get(&[0, 0]).unwrap() - 2.0).abs() < 1e-15);
        assert!((raw_entries.get(&[9, 9]).unwrap() - 10.0).abs() < 1e-15);
        assert!((raw_entries.get(&[4, 3]).unwrap() - 0.25).abs() < 1e-15);
        assert!((raw_entries.get(&[0, 8]).unwrap() - 0.125).abs() < 1e-15);
        assert!((raw_entries.get(&[8, 0]).unwrap() - 0.125).abs() < 1e-15);

        assert!(raw_entries.get(&[3, 4]).is_none());
    }

    #[test]
    fn consume_another_matrix() {
        let mut sm_a = SparseMatrix::square(5);
        let mut sm_b = SparseMatrix::square(5);

        sm_a.insert_group((0..5).map(|i| ([i, i], (i + 1) as f64)));
        sm_a.insert([0, 4], 0.5);
        sm_a.insert([3, 1], 0.5);

        sm_b.insert_group((0..5).map(|i| ([i, i], (5 - i) as f64)));
        sm_b.insert([0, 4], -0.5);
        sm_b.insert([2, 3], -0.5);

        sm_a.consume_matrix(&mut sm_b);

        assert_eq!(sm_b.num_entries(), 0);

        let sm_a_entries = sm_a.take_entries();

        for i in 0..5 {
            assert!((sm_a_entries.get(&[i, i]).unwrap() - 6.0).abs() < 1e-15);
        }

        assert!((sm_a_entries.get(&[0, 4]).unwrap()).abs() < 1e-15);
        assert!((sm_a_entries.get(&[3, 1]).unwrap() - 0.5).abs() < 1e-15);
        assert!((sm_a_entries.get(&[2, 3]).unwrap() + 0.5).abs() < 1e-15);
    }

    #[test]
    fn assembled_matrix_to_csr() {
        let mut sm = SparseMatrix::new([3, 4]);
        sm.insert([2, 3], 7.0);
        sm.insert([0, 1], 1.0);
        sm.insert([0, 0], 2.0);
        sm.insert([2, 0], -1.0);

        let csr: CsrMatrix = sm.into();

        assert_eq!(csr.shape(), [3, 4]);
        assert_eq!(csr.row_ptr(), &[0, 2, 2, 4]);
        assert_eq!(csr.col_idx(), &[0, 1, 0, 3]);
        assert_eq!(csr.values(), &[2.0, 1.0, -1.0, 7.0]);
    }

    #[test]
    fn csr_validation() {
        assert!(CsrMatrix::new([2, 2], vec![0, 1], vec![0], vec![1.0]).is_err());
        assert!(CsrMatrix::new([2, 2], vec![0, 2, 1], vec![0, 1], vec![1.0, 1.0]).is_err());
        assert!(CsrMatrix::new([2, 2], vec![0, 1, 2], vec![0, 2], vec![1.0, 1.0]).is_err());
        assert!(CsrMatrix::new([2, 2], vec![0, 1, 2], vec![0, 1], vec![1.0]).is_err());
        assert!(CsrMatrix::new([2, 2], vec![1, 1, 2], vec![0], vec![1.0]).is_err());

        let csr = CsrMatrix::new([2, 3], vec![0, 1, 3], vec![2, 0, 1], vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(csr.nnz(), 3);
        assert!(!csr.is_square());
        assert_eq!(csr.row(1).collect::<Vec<_>>(), vec![(0, 2.0), (1, 3.0)]);
    }

    #[test]
    fn csr_to_dense() {
        let mut sm = SparseMatrix::square(3);
        sm.insert_symmetric([0, 2], 4.0);
        sm.insert([1, 1], -2.0);

        let expected: DMatrix<f64> = sm.clone().into();
        let csr: CsrMatrix = sm.into();
        let dense = DMatrix::from(&csr);

        assert_eq!(dense, expected);
        assert!((dense[(2, 0)] - 4.0).abs() < 1e-15);
    }

    #[test]
    #[should_panic]
    fn consume_matrix_of_different_dim() {
        let mut sm_a = SparseMatrix::square(5);
        let mut sm_b = SparseMatrix::square(6);

        sm_a.consume_matrix(&mut sm_b);
    }

    #[test]
    #[should_panic]
    fn oversize_matrix_construction() {
        let _ = SparseMatrix::square((std::u32::MAX as usize) + 1);
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_insertion() {
        let mut sm = SparseMatrix::square(10);
        sm.insert([10, 2], 1.0);
    }
}
