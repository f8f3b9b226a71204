use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::iter::Sum;
use std::ops::Mul;
use std::path::Path;

use bytes::{Buf, BufMut, BytesMut};
use nalgebra::DMatrix;
use rayon::prelude::*;

use super::CsrMatrix;
use crate::error::{EigsysError, Result};

/// Class id found at the head of a PETSc binary Mat file
pub const PETSC_MAT_CLASS_ID: i32 = 1211216;
/// Class id found at the head of a PETSc binary Vec file
pub const PETSC_VEC_CLASS_ID: i32 = 1211214;

/// AIJ Sparse Matrix Format native to [PETSC](https://petsc.org/main/docs/manualpages/Mat/MatCreateSeqAIJWithArrays.html#MatCreateSeqAIJWithArrays)
#[derive(Debug, Clone, PartialEq)]
pub struct AIJMatrix {
    /// i[row_idx + 1] = i[row_idx] + number of entries on row_idx
    pub(crate) i: Vec<i32>,
    /// columns of elements in 'a'
    pub(crate) j: Vec<i32>,
    /// matrix entries sorted by row
    pub(crate) a: Vec<f64>,
    /// number of rows and columns
    pub(crate) shape: [usize; 2],
}

impl AIJMatrix {
    /// Build a matrix from raw AIJ arrays, checking that they are consistent
    pub fn new(shape: [usize; 2], i: Vec<i32>, j: Vec<i32>, a: Vec<f64>) -> Result<Self> {
        let [rows, cols] = shape;
        to_index(rows)?;
        to_index(cols)?;

        if i.len() != rows + 1 || i[0] != 0 {
            return Err(EigsysError::MalformedMatrix(format!(
                "expected {} row offsets starting at zero for {} rows",
                rows + 1,
                rows
            )));
        }
        if let Some(r) = i.windows(2).position(|w| w[0] > w[1]) {
            return Err(EigsysError::MalformedMatrix(format!(
                "row offsets decrease at row {}",
                r
            )));
        }
        if j.len() != a.len() || i[rows] as usize != a.len() {
            return Err(EigsysError::MalformedMatrix(format!(
                "row offsets describe {} entries but {} column indices and {} values were given",
                i[rows],
                j.len(),
                a.len()
            )));
        }
        if let Some(c) = j.iter().find(|&&c| c < 0 || c as usize >= cols) {
            return Err(EigsysError::MalformedMatrix(format!(
                "column index {} is outside of the matrix",
                c
            )));
        }

        Ok(Self { i, j, a, shape })
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn row_offsets(&self) -> &[i32] {
        &self.i
    }

    pub fn col_indices(&self) -> &[i32] {
        &self.j
    }

    pub fn values(&self) -> &[f64] {
        &self.a
    }

    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    pub fn cols(&self) -> usize {
        self.shape[1]
    }

    pub fn is_square(&self) -> bool {
        self.shape[0] == self.shape[1]
    }

    pub fn nnz(&self) -> usize {
        self.a.len()
    }

    /// Iterate over the entries of row `r` as `(column, value)`
    pub fn row(&self, r: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.i[r] as usize..self.i[r + 1] as usize;
        self.j[range.clone()]
            .iter()
            .map(|c| *c as usize)
            .zip(self.a[range].iter().copied())
    }

    /// Compute `y = A x`, distributing rows over the rayon thread pool
    pub fn mult<T>(&self, x: &[T], y: &mut [T])
    where
        T: Copy + Send + Sync + Sum<T> + Mul<f64, Output = T>,
    {
        assert_eq!(x.len(), self.cols(), "mult: input length does not match columns!");
        assert_eq!(y.len(), self.rows(), "mult: output length does not match rows!");

        y.par_iter_mut().enumerate().for_each(|(r, y_r)| {
            *y_r = self.row(r).map(|(c, v)| x[c] * v).sum();
        });
    }

    /// Maximum absolute row sum
    pub fn norm_inf(&self) -> f64 {
        (0..self.rows())
            .map(|r| self.row(r).map(|(_, v)| v.abs()).sum::<f64>())
            .fold(0.0, f64::max)
    }

    /// Copy of this matrix with `shift` subtracted from the diagonal (A - σI)
    ///
    /// Diagonal entries that are not stored are inserted.
    pub fn shifted(&self, shift: f64) -> Self {
        if shift == 0.0 {
            return self.clone();
        }

        let mut i = Vec::with_capacity(self.i.len());
        let mut j = Vec::with_capacity(self.j.len() + self.rows());
        let mut a = Vec::with_capacity(self.a.len() + self.rows());
        i.push(0);

        for r in 0..self.rows() {
            let mut diagonal_seen = r >= self.cols();
            for (c, v) in self.row(r) {
                if !diagonal_seen && c > r {
                    j.push(r as i32);
                    a.push(-shift);
                    diagonal_seen = true;
                }
                if c == r && !diagonal_seen {
                    j.push(c as i32);
                    a.push(v - shift);
                    diagonal_seen = true;
                } else {
                    j.push(c as i32);
                    a.push(v);
                }
            }
            if !diagonal_seen {
                j.push(r as i32);
                a.push(-shift);
            }
            i.push(j.len() as i32);
        }

        Self {
            i,
            j,
            a,
            shape: self.shape,
        }
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.rows(), self.cols());
        for r in 0..self.rows() {
            for (c, v) in self.row(r) {
                dense[(r, c)] += v;
            }
        }
        dense
    }

    /// Write the matrix in PETSc's binary Mat format (big-endian)
    pub fn write_petsc_binary(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);

        // header
        let mut header_buf = BytesMut::with_capacity(16);
        header_buf.put_i32(PETSC_MAT_CLASS_ID);
        header_buf.put_i32(self.rows() as i32);
        header_buf.put_i32(self.cols() as i32);
        header_buf.put_i32(self.nnz() as i32);
        writer.write_all(header_buf.as_ref())?;

        // num-non-zero entries on each row
        let mut rnnz_buf = BytesMut::with_capacity(self.rows() * 4);
        for w in self.i.windows(2) {
            rnnz_buf.put_i32(w[1] - w[0]);
        }
        writer.write_all(rnnz_buf.as_ref())?;

        // column indices of non-zero entries
        let mut j_buf = BytesMut::with_capacity(self.j.len() * 4);
        for &j in self.j.iter() {
            j_buf.put_i32(j);
        }
        writer.write_all(j_buf.as_ref())?;

        // non-zero entries
        let mut a_buf = BytesMut::with_capacity(self.a.len() * 8);
        for &a in self.a.iter() {
            a_buf.put_f64(a);
        }
        writer.write_all(a_buf.as_ref())?;

        writer.flush()?;
        Ok(())
    }

    /// Read a matrix written in PETSc's binary Mat format
    pub fn read_petsc_binary(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path.as_ref())?);

        let mut header_bytes = read_bytes(&mut reader, 16)?;
        if header_bytes.get_i32() != PETSC_MAT_CLASS_ID {
            return Err(EigsysError::MalformedMatrix(
                "file is not a PETSc binary matrix".to_string(),
            ));
        }
        let rows = non_negative(header_bytes.get_i32(), "row count")?;
        let cols = non_negative(header_bytes.get_i32(), "column count")?;
        let nnz = non_negative(header_bytes.get_i32(), "entry count")?;

        let mut rnnz_bytes = read_bytes(&mut reader, rows * 4)?;
        let mut i = Vec::with_capacity(rows + 1);
        i.push(0);
        for r in 0..rows {
            let row_count = non_negative(rnnz_bytes.get_i32(), "row length")?;
            let offset = i[r] as usize + row_count;
            i.push(to_index(offset)?);
        }
        if i[rows] as usize != nnz {
            return Err(EigsysError::MalformedMatrix(format!(
                "row lengths sum to {} but the header declares {} entries",
                i[rows], nnz
            )));
        }

        let mut j_bytes = read_bytes(&mut reader, nnz * 4)?;
        let j = (0..nnz).map(|_| j_bytes.get_i32()).collect();

        let mut a_bytes = read_bytes(&mut reader, nnz * 8)?;
        let a = (0..nnz).map(|_| a_bytes.get_f64()).collect();

        Self::new([rows, cols], i, j, a)
    }
}

/// Write a dense vector in PETSc's binary Vec format (big-endian)
pub fn write_petsc_binary_vector(values: &[f64], path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    let mut buf = BytesMut::with_capacity(8 + values.len() * 8);
    buf.put_i32(PETSC_VEC_CLASS_ID);
    buf.put_i32(values.len() as i32);
    for &v in values {
        buf.put_f64(v);
    }
    writer.write_all(buf.as_ref())?;
    writer.flush()?;

    Ok(())
}

/// Read a dense vector written in PETSc's binary Vec format
pub fn read_petsc_binary_vector(path: impl AsRef<Path>) -> Result<Vec<f64>> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);

    let mut header_bytes = read_bytes(&mut reader, 8)?;
    if header_bytes.get_i32() != PETSC_VEC_CLASS_ID {
        return Err(EigsysError::MalformedMatrix(
            "file is not a PETSc binary vector".to_string(),
        ));
    }
    let m = non_negative(header_bytes.get_i32(), "vector length")?;

    let mut value_bytes = read_bytes(&mut reader, m * 8)?;
    Ok((0..m).map(|_| value_bytes.get_f64()).collect())
}

fn read_bytes(reader: &mut impl Read, len: usize) -> Result<BytesMut> {
    let mut buf = BytesMut::new();
    buf.resize(len, 0);
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn non_negative(value: i32, what: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| EigsysError::MalformedMatrix(format!("negative {} ({})", what, value)))
}

fn to_index(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| {
        EigsysError::MalformedMatrix(format!("index {} does not fit in an AIJ index", value))
    })
}

impl TryFrom<&CsrMatrix> for AIJMatrix {
    type Error = EigsysError;

    fn try_from(csr: &CsrMatrix) -> Result<Self> {
        let [rows, cols] = csr.shape();
        to_index(rows)?;
        to_index(cols)?;

        let i = csr
            .row_ptr()
            .iter()
            .map(|&p| to_index(p))
            .collect::<Result<Vec<i32>>>()?;

        let mut j = Vec::with_capacity(csr.nnz());
        let mut a = Vec::with_capacity(csr.nnz());
        let mut row_entries: Vec<(usize, f64)> = Vec::new();

        for r in 0..rows {
            row_entries.clear();
            row_entries.extend(csr.row(r));
            // stable: duplicate columns keep their relative order
            row_entries.sort_by_key(|(c, _)| *c);

            for &(c, v) in row_entries.iter() {
                j.push(c as i32);
                a.push(v);
            }
        }

        Ok(Self {
            i,
            j,
            a,
            shape: [rows, cols],
        })
    }
}

impl From<&AIJMatrix> for CsrMatrix {
    fn from(aij: &AIJMatrix) -> Self {
        CsrMatrix {
            shape: aij.shape,
            row_ptr: aij.i.iter().map(|&p| p as usize).collect(),
            col_idx: aij.j.iter().map(|&c| c as usize).collect(),
            values: aij.a.clone(),
        }
    }
}
