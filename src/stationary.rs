//! Closed form of the energy minimizer.
//!
//! Setting the derivative of the energy with respect to $delta_p$ to zero gives
//! $2/M s_k^m delta_p_k^m = 2/M s_k^m delta_g_k^m$ with
//! $s_k^m = sum_(m') (L_k^(m' m))^2$.
//!
//! There are no terms coupling different blendshapes or different axes, so the
//! $3 K M$ unknowns split into three independent systems of size $K M$, one per
//! axis. All three share the diagonal coefficient matrix $A = 2/M diag(s)$,
//! which depends only on the Laplace operators and not on the targets.

use crate::{
  energy::EMesh,
  error::{EMeshError, EMeshResult},
  field::{Axis, DisplacementField, NCOMPONENTS},
  linalg::FaerCholesky,
  sparse::SparseMatrix,
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// The per-axis systems $A x_a = b_a$ for $a in {x, y, z}$.
#[derive(Debug, Clone)]
pub struct StationarySystem {
  /// $(K, M)$ array, row $k$ holding $s_k$. Unscaled.
  coefficients: na::DMatrix<f64>,
  /// $2/M$
  scale: f64,
  /// Right-hand sides, each of length $K M$ in blendshape-major order.
  rhs: [na::DVector<f64>; NCOMPONENTS],
}

impl StationarySystem {
  pub fn new(emesh: &EMesh) -> Self {
    let shape = emesh.shape();
    let target = emesh.target();
    let laplacians = emesh.cache().laplacians();

    #[cfg(feature = "parallel")]
    let sums: Vec<_> = laplacians
      .par_iter()
      .map(|l| l.column_sum_of_squares())
      .collect();
    #[cfg(not(feature = "parallel"))]
    let sums: Vec<_> = laplacians
      .iter()
      .map(|l| l.column_sum_of_squares())
      .collect();

    let coefficients =
      na::DMatrix::from_fn(shape.nblendshapes, shape.nmarkers, |k, m| sums[k][m]);
    let scale = 2.0 / shape.nmarkers as f64;

    let rhs = Axis::ALL.map(|axis| {
      let b = coefficients.component_mul(&target.axis(axis));
      flatten_rows(&b) * scale
    });

    Self {
      coefficients,
      scale,
      rhs,
    }
  }

  /// The `(K, M)` array of column sums of squares, unscaled.
  pub fn coefficients(&self) -> &na::DMatrix<f64> {
    &self.coefficients
  }

  /// Diagonal of $A$, length $K M$.
  pub fn diagonal(&self) -> na::DVector<f64> {
    flatten_rows(&self.coefficients) * self.scale
  }

  /// The $K M times K M$ coefficient matrix, identical for every axis.
  pub fn matrix(&self, _axis: Axis) -> SparseMatrix {
    SparseMatrix::from_diagonal(&self.diagonal())
  }

  pub fn rhs(&self, axis: Axis) -> &na::DVector<f64> {
    &self.rhs[axis.index()]
  }

  /// `(A_x, A_y, A_z, b_x, b_y, b_z)`.
  #[allow(clippy::type_complexity)]
  pub fn into_parts(
    self,
  ) -> (
    nas::CsrMatrix<f64>,
    nas::CsrMatrix<f64>,
    nas::CsrMatrix<f64>,
    na::DVector<f64>,
    na::DVector<f64>,
    na::DVector<f64>,
  ) {
    let [ax, ay, az] = Axis::ALL.map(|axis| self.matrix(axis).to_nalgebra_csr());
    let [bx, by, bz] = self.rhs;
    (ax, ay, az, bx, by, bz)
  }

  /// Solves the three axis systems and interleaves them into `(K, M, 3)`.
  ///
  /// Fails if a marker's Laplacian column is entirely zero, which leaves $A$
  /// singular.
  pub fn solve(&self) -> EMeshResult<DisplacementField> {
    let (nblendshapes, nmarkers) = self.coefficients.shape();
    if let Some(i) = self.coefficients.iter().position(|&s| s <= 0.0) {
      // Column-major storage of the (K, M) array.
      let (k, m) = (i % nblendshapes, i / nblendshapes);
      return Err(EMeshError::Solver(format!(
        "singular system: marker {m} of blendshape {k} has an all-zero laplacian column"
      )));
    }

    let cholesky = FaerCholesky::new(&self.matrix(Axis::X))?;
    let solutions = Axis::ALL.map(|axis| {
      let x = cholesky.solve(self.rhs(axis));
      na::DMatrix::from_row_slice(nblendshapes, nmarkers, x.as_slice())
    });
    DisplacementField::from_axes([&solutions[0], &solutions[1], &solutions[2]])
  }
}

/// Row-major flattening of a `(K, M)` array into a vector of length $K M$.
fn flatten_rows(m: &na::DMatrix<f64>) -> na::DVector<f64> {
  na::DVector::from_iterator(m.len(), m.transpose().iter().copied())
}
