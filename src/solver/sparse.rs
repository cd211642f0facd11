use kryst::matrix::sparse::CsrMatrix;
use nalgebra::DVector;

/// Square finite-difference operator in compressed sparse row form. Kept in
/// plain arrays so the Newton step can shift the diagonal and the row-scaled
/// copy handed to the Krylov solver can be rebuilt cheaply.
#[derive(Clone, Debug)]
pub struct SparseMatrix {
    n: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
    diag_pos: Vec<Option<usize>>,
}

impl SparseMatrix {
    /// Assembles an `n x n` matrix from `(row, col, value)` triplets,
    /// summing duplicates.
    pub fn from_triplets(n: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for &(r, c, v) in triplets {
            assert!(r < n && c < n, "triplet ({r}, {c}) outside {n}x{n} matrix");
            rows[r].push((c, v));
        }

        let mut indptr = Vec::with_capacity(n + 1);
        let mut indices = Vec::with_capacity(triplets.len());
        let mut data = Vec::with_capacity(triplets.len());
        let mut diag_pos = vec![None; n];
        indptr.push(0);

        for (r, row) in rows.iter_mut().enumerate() {
            row.sort_by_key(|&(c, _)| c);
            for &(c, v) in row.iter() {
                if indices.len() > indptr[r] && indices.last() == Some(&c) {
                    if let Some(last) = data.last_mut() {
                        *last += v;
                    }
                    continue;
                }
                if c == r {
                    diag_pos[r] = Some(indices.len());
                }
                indices.push(c);
                data.push(v);
            }
            indptr.push(indices.len());
        }

        Self { n, indptr, indices, data, diag_pos }
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.n,
            (0..self.n).map(|r| {
                (self.indptr[r]..self.indptr[r + 1])
                    .map(|idx| self.data[idx] * x[self.indices[idx]])
                    .sum::<f64>()
            }),
        )
    }

    pub fn diagonal(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.n,
            self.diag_pos.iter().map(|pos| pos.map_or(0.0, |idx| self.data[idx])),
        )
    }

    /// Returns a copy with `shift[i]` added to each diagonal entry. Rows must
    /// already store a diagonal entry where the shift is non-zero.
    pub fn with_diagonal_shift(&self, shift: &DVector<f64>) -> Self {
        let mut out = self.clone();
        for (r, pos) in self.diag_pos.iter().enumerate() {
            match pos {
                Some(idx) => out.data[*idx] += shift[r],
                None => assert!(shift[r] == 0.0, "row {r} has no diagonal entry to shift"),
            }
        }
        out
    }

    /// Copy for the Krylov solver with row `r` multiplied by `scale[r]`.
    pub fn to_scaled_csr(&self, scale: &DVector<f64>) -> CsrMatrix<f64> {
        let data: Vec<f64> = (0..self.n)
            .flat_map(|r| (self.indptr[r]..self.indptr[r + 1]).map(move |idx| (r, idx)))
            .map(|(r, idx)| self.data[idx] * scale[r])
            .collect();
        CsrMatrix::from_csr(self.n, self.n, self.indptr.clone(), self.indices.clone(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_summed() {
        let m = SparseMatrix::from_triplets(2, &[(0, 0, 1.0), (0, 1, 2.0), (0, 0, 3.0), (1, 1, -1.0)]);
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.diagonal(), DVector::from_vec(vec![4.0, -1.0]));
        let y = m.mul_vec(&DVector::from_vec(vec![1.0, 1.0]));
        assert_eq!(y, DVector::from_vec(vec![6.0, -1.0]));
    }

    #[test]
    fn diagonal_shift_leaves_original_untouched() {
        let m = SparseMatrix::from_triplets(2, &[(0, 0, 2.0), (1, 0, 1.0), (1, 1, 2.0)]);
        let s = m.with_diagonal_shift(&DVector::from_vec(vec![1.0, -2.0]));
        assert_eq!(s.diagonal(), DVector::from_vec(vec![3.0, 0.0]));
        assert_eq!(m.diagonal(), DVector::from_vec(vec![2.0, 2.0]));
    }
}
