use crate::{
  error::{EMeshError, EMeshResult},
  sparse::SparseMatrix,
};

use faer::solvers::SpSolver;

type SparseMatrixFaer = faer::sparse::SparseColMat<usize, f64>;

pub fn nalgebra2faer(m: nas::CscMatrix<f64>) -> SparseMatrixFaer {
  let nrows = m.nrows();
  let ncols = m.ncols();
  let (col_ptrs, row_indices, values) = m.disassemble();

  let symbolic =
    faer::sparse::SymbolicSparseColMat::new_checked(nrows, ncols, col_ptrs, None, row_indices);
  faer::sparse::SparseColMat::new(symbolic, values)
}

/// Sparse Cholesky factorization of a symmetric positive definite matrix.
///
/// Factor once, solve for as many right-hand sides as needed.
pub struct FaerCholesky {
  raw: faer::sparse::linalg::solvers::Cholesky<usize, f64>,
}
impl FaerCholesky {
  pub fn new(a: &SparseMatrix) -> EMeshResult<Self> {
    if a.nrows() != a.ncols() {
      return Err(EMeshError::Solver(format!(
        "cannot factor non-square {}x{} matrix",
        a.nrows(),
        a.ncols()
      )));
    }
    let raw = nalgebra2faer(a.to_nalgebra_csc())
      .sp_cholesky(faer::Side::Upper)
      .map_err(|e| EMeshError::Solver(format!("cholesky factorization failed: {e:?}")))?;
    Ok(Self { raw })
  }

  pub fn solve(&self, b: &na::DVector<f64>) -> na::DVector<f64> {
    let b = faer::col::from_slice(b.as_slice());
    na::DVector::from_vec(self.raw.solve(b).as_slice().to_vec())
  }
}
