use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Div, Mul, Sub};

use super::AIJMatrix;
use crate::error::{EigsysError, Result};

/// Sparse LU factorization with partial (row) pivoting: PA = LU
///
/// Rows are held in BTreeMaps while eliminating so fill-in can be inserted cheaply.
/// A column -> rows index keeps pivot searches restricted to rows with a nonzero in
/// the active column.
#[derive(Debug, Clone)]
pub struct SparseLu {
    dim: usize,
    /// original row that became the pivot at each step
    row_order: Vec<usize>,
    /// strictly lower entries of L by step, (column, multiplier)
    lower: Vec<Vec<(usize, f64)>>,
    /// strictly upper entries of U by step, (column, value)
    upper: Vec<Vec<(usize, f64)>>,
    /// diagonal of U
    pivots: Vec<f64>,
}

impl SparseLu {
    /// Factorize a square matrix. A column with no nonzero pivot candidate is reported as singular.
    pub fn factorize(matrix: &AIJMatrix) -> Result<Self> {
        if !matrix.is_square() {
            return Err(EigsysError::InvalidArgument(format!(
                "cannot LU factorize a {}x{} matrix",
                matrix.rows(),
                matrix.cols()
            )));
        }
        let dim = matrix.rows();

        let mut rows: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); dim];
        let mut col_rows: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); dim];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, v) in matrix.row(r) {
                *row.entry(c).or_insert(0.0) += v;
                col_rows[c].insert(r);
            }
        }

        let mut row_order = Vec::with_capacity(dim);
        let mut multipliers: Vec<Vec<(usize, f64)>> = vec![Vec::new(); dim];
        let mut upper = Vec::with_capacity(dim);
        let mut pivots = Vec::with_capacity(dim);

        for k in 0..dim {
            // largest magnitude candidate; ties go to the lowest row id
            let mut pivot_row = None;
            let mut pivot_mag = 0.0;
            for &r in col_rows[k].iter() {
                let mag = rows[r].get(&k).map_or(0.0, |v| v.abs());
                if mag > pivot_mag {
                    pivot_mag = mag;
                    pivot_row = Some(r);
                }
            }
            let p = pivot_row.ok_or(EigsysError::SingularFactor { column: k })?;

            let pivot_entries = std::mem::take(&mut rows[p]);
            for c in pivot_entries.keys() {
                col_rows[*c].remove(&p);
            }
            let pivot = pivot_entries[&k];
            let pivot_upper: Vec<(usize, f64)> = pivot_entries
                .range(k + 1..)
                .map(|(c, v)| (*c, *v))
                .collect();

            let eliminate: Vec<usize> = col_rows[k].iter().copied().collect();
            for r in eliminate {
                let l = match rows[r].remove(&k) {
                    Some(v) => v / pivot,
                    None => continue,
                };
                multipliers[r].push((k, l));

                for &(c, u) in pivot_upper.iter() {
                    match rows[r].entry(c) {
                        Entry::Occupied(mut e) => *e.get_mut() -= l * u,
                        Entry::Vacant(e) => {
                            e.insert(-l * u);
                            col_rows[c].insert(r);
                        }
                    }
                }
            }
            col_rows[k].clear();

            row_order.push(p);
            upper.push(pivot_upper);
            pivots.push(pivot);
        }

        let lower = row_order
            .iter()
            .map(|&r| std::mem::take(&mut multipliers[r]))
            .collect();

        Ok(Self {
            dim,
            row_order,
            lower,
            upper,
            pivots,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored entries in L and U (diagonal of U included)
    pub fn fill(&self) -> usize {
        self.lower.iter().map(|l| l.len()).sum::<usize>()
            + self.upper.iter().map(|u| u.len()).sum::<usize>()
            + self.dim
    }

    /// Overwrite `b` with the solution of `A x = b`
    pub fn solve_in_place<T>(&self, b: &mut [T])
    where
        T: Copy + Sub<Output = T> + Mul<f64, Output = T> + Div<f64, Output = T>,
    {
        assert_eq!(b.len(), self.dim, "solve: right hand side has the wrong length!");

        // forward substitution with the row permutation applied
        let mut y: Vec<T> = self.row_order.iter().map(|&r| b[r]).collect();
        for k in 0..self.dim {
            for &(j, l) in self.lower[k].iter() {
                y[k] = y[k] - y[j] * l;
            }
        }

        // backward substitution; no column permutation so y becomes x in place
        for k in (0..self.dim).rev() {
            for &(c, u) in self.upper[k].iter() {
                y[k] = y[k] - y[c] * u;
            }
            y[k] = y[k] / self.pivots[k];
        }

        b.copy_from_slice(&y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{CsrMatrix, SparseMatrix};
    use nalgebra::DVector;
    use num_complex::Complex64;
    use std::convert::TryFrom;

    fn aij(sm: SparseMatrix) -> AIJMatrix {
        AIJMatrix::try_from(&CsrMatrix::from(sm)).unwrap()
    }

    #[test]
    fn solve_requires_pivoting() {
        // zero on the leading diagonal forces a row swap
        let mut sm = SparseMatrix::square(3);
        sm.insert([0, 1], 2.0);
        sm.insert([0, 2], 1.0);
        sm.insert([1, 0], 1.0);
        sm.insert([1, 2], -1.0);
        sm.insert([2, 0], 3.0);
        sm.insert([2, 1], 1.0);
        sm.insert([2, 2], 4.0);
        let a = aij(sm);

        let lu = SparseLu::factorize(&a).unwrap();
        let x_expected = [1.0, -2.0, 0.5];
        let mut b = [0.0; 3];
        a.mult(&x_expected, &mut b);

        lu.solve_in_place(&mut b);
        for (x, e) in b.iter().zip(x_expected.iter()) {
            assert!((x - e).abs() < 1e-13);
        }
    }

    #[test]
    fn solve_tridiagonal_with_fill() {
        let n = 50;
        let mut sm = SparseMatrix::square(n);
        for i in 0..n {
            sm.insert([i, i], 2.0 + (i as f64) * 0.01);
            if i + 1 < n {
                sm.insert([i, i + 1], -1.0);
                sm.insert([i + 1, i], -0.5);
            }
        }
        // corner entries produce fill in the last row and column
        sm.insert([0, n - 1], 0.3);
        sm.insert([n - 1, 0], 0.7);
        let a = aij(sm);
        let dense = a.to_dense();

        let lu = SparseLu::factorize(&a).unwrap();
        assert!(lu.fill() >= a.nnz());

        let rhs = DVector::from_fn(n, |i, _| (i as f64).sin());
        let mut x = rhs.clone();
        lu.solve_in_place(x.as_mut_slice());

        let residual = &dense * &x - &rhs;
        assert!(residual.norm() < 1e-12);
    }

    #[test]
    fn solve_complex_right_hand_side() {
        let mut sm = SparseMatrix::square(2);
        sm.insert([0, 0], 4.0);
        sm.insert([0, 1], 1.0);
        sm.insert([1, 0], 2.0);
        sm.insert([1, 1], 3.0);
        let lu = SparseLu::factorize(&aij(sm)).unwrap();

        // x = [1 + i, -i]
        let mut b = [Complex64::new(4.0, 3.0), Complex64::new(2.0, -1.0)];
        lu.solve_in_place(&mut b);

        assert!((b[0] - Complex64::new(1.0, 1.0)).norm() < 1e-14);
        assert!((b[1] - Complex64::new(0.0, -1.0)).norm() < 1e-14);
    }

    #[test]
    fn singular_matrix() {
        let mut sm = SparseMatrix::square(3);
        sm.insert([0, 0], 1.0);
        sm.insert([0, 1], 2.0);
        sm.insert([1, 0], 2.0);
        sm.insert([1, 1], 4.0);
        sm.insert([2, 2], 1.0);

        let result = SparseLu::factorize(&aij(sm));
        assert!(matches!(result, Err(EigsysError::SingularFactor { column: 1 })));
    }

    #[test]
    fn empty_column_is_singular() {
        let a = AIJMatrix::try_from(&CsrMatrix::from_diagonal(&[1.0, 0.0, 2.0])).unwrap();
        assert!(matches!(
            SparseLu::factorize(&a),
            Err(EigsysError::SingularFactor { column: 1 })
        ));
    }
}
