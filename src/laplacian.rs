//! Discrete Laplace operators over triangle meshes.
//!
//! All builders here produce a row-normalized operator
//! $(L u)_i = u_i - sum_j w_(i j) u_j$ with $sum_j w_(i j) = 1$,
//! so a marker that is not referenced by any face keeps an identity row.

use crate::{
  error::{EMeshError, EMeshResult},
  mesh::MarkerMesh,
  sparse::SparseMatrix,
};

/// Weights below this are treated as a vertex without neighbours.
const WEIGHT_EPS: f64 = 1e-12;

/// Sparse `N x N` Laplace operator.
#[derive(Debug, Clone)]
pub struct LaplacianOperator {
  matrix: nas::CsrMatrix<f64>,
}

impl LaplacianOperator {
  pub fn new(matrix: nas::CsrMatrix<f64>) -> EMeshResult<Self> {
    if matrix.nrows() != matrix.ncols() {
      return Err(EMeshError::configuration(format!(
        "laplacian must be square, got {}x{}",
        matrix.nrows(),
        matrix.ncols()
      )));
    }
    Ok(Self { matrix })
  }

  pub fn nvertices(&self) -> usize {
    self.matrix.nrows()
  }
  pub fn nnz(&self) -> usize {
    self.matrix.nnz()
  }

  /// `L * field` for an `N x c` dense field.
  pub fn apply(&self, field: &na::DMatrix<f64>) -> na::DMatrix<f64> {
    &self.matrix * field
  }

  /// `L^T * field` for an `N x c` dense field.
  pub fn apply_transpose(&self, field: &na::DMatrix<f64>) -> na::DMatrix<f64> {
    &self.matrix.transpose() * field
  }

  pub fn to_dense(&self) -> na::DMatrix<f64> {
    na::DMatrix::from(&self.matrix)
  }

  /// $s_j = sum_i L_(i j)^2$, read off the stored entries.
  pub fn column_sum_of_squares(&self) -> na::DVector<f64> {
    let mut sums = na::DVector::zeros(self.matrix.ncols());
    for (_, c, &v) in self.matrix.triplet_iter() {
      sums[c] += v * v;
    }
    sums
  }
}

pub trait LaplacianBuilder {
  /// Builds the operator of `mesh` sized for `nvertices` vertices.
  ///
  /// `nvertices` may exceed the vertex count of the mesh; the extra vertices
  /// are isolated.
  fn build(&self, mesh: &MarkerMesh, nvertices: usize) -> EMeshResult<LaplacianOperator>;
}

/// Which [`LaplacianBuilder`] to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LaplacianKind {
  /// Umbrella operator, every neighbour weighted equally.
  #[default]
  Uniform,
  /// Cotangent weights.
  Cotangent,
}
impl LaplacianBuilder for LaplacianKind {
  fn build(&self, mesh: &MarkerMesh, nvertices: usize) -> EMeshResult<LaplacianOperator> {
    match self {
      Self::Uniform => UniformLaplacian.build(mesh, nvertices),
      Self::Cotangent => CotanLaplacian.build(mesh, nvertices),
    }
  }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UniformLaplacian;
impl LaplacianBuilder for UniformLaplacian {
  fn build(&self, mesh: &MarkerMesh, nvertices: usize) -> EMeshResult<LaplacianOperator> {
    check_vertex_count(mesh, nvertices)?;
    let mut weights = SparseMatrix::zeros(nvertices, nvertices);
    for (a, b) in mesh.edges() {
      weights.push(a, b, 1.0);
      weights.push(b, a, 1.0);
    }
    normalized_laplacian(weights)
  }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CotanLaplacian;
impl LaplacianBuilder for CotanLaplacian {
  fn build(&self, mesh: &MarkerMesh, nvertices: usize) -> EMeshResult<LaplacianOperator> {
    check_vertex_count(mesh, nvertices)?;
    let mut weights = SparseMatrix::zeros(nvertices, nvertices);
    for &face in mesh.faces() {
      for corner in 0..3 {
        let i = face[corner];
        let j = face[(corner + 1) % 3];
        let opposite = face[(corner + 2) % 3];
        if i == j {
          continue;
        }
        let w = 0.5 * cotangent(mesh.vertex(opposite), mesh.vertex(i), mesh.vertex(j));
        weights.push(i, j, w);
        weights.push(j, i, w);
      }
    }
    normalized_laplacian(weights)
  }
}

fn check_vertex_count(mesh: &MarkerMesh, nvertices: usize) -> EMeshResult<()> {
  if nvertices < mesh.nvertices() {
    return Err(EMeshError::configuration(format!(
      "laplacian sized for {nvertices} vertices, but mesh has {}",
      mesh.nvertices()
    )));
  }
  Ok(())
}

/// Cotangent of the angle at `apex` in the triangle `(apex, a, b)`.
fn cotangent(apex: &na::Point3<f64>, a: &na::Point3<f64>, b: &na::Point3<f64>) -> f64 {
  let u = a - apex;
  let v = b - apex;
  let sin = u.cross(&v).norm();
  if sin < WEIGHT_EPS {
    0.0
  } else {
    u.dot(&v) / sin
  }
}

/// Turns symmetric neighbour weights `W` into `I - D^(-1) W`.
fn normalized_laplacian(weights: SparseMatrix) -> EMeshResult<LaplacianOperator> {
  let n = weights.nrows();
  let weights = weights.to_nalgebra_csr();

  let mut laplacian = SparseMatrix::zeros(n, n);
  for (i, row) in weights.row_iter().enumerate() {
    laplacian.push(i, i, 1.0);
    let total: f64 = row.values().iter().sum();
    if total.abs() < WEIGHT_EPS {
      continue;
    }
    for (&j, &w) in row.col_indices().iter().zip(row.values()) {
      laplacian.push(i, j, -w / total);
    }
  }
  LaplacianOperator::new(laplacian.to_nalgebra_csr())
}

#[cfg(test)]
mod test {
  use super::*;

  use approx::assert_relative_eq;

  fn square() -> MarkerMesh {
    let vertices = vec![
      na::Point3::new(0.0, 0.0, 0.0),
      na::Point3::new(1.0, 0.0, 0.0),
      na::Point3::new(1.0, 1.0, 0.0),
      na::Point3::new(0.0, 1.0, 0.0),
    ];
    MarkerMesh::new(vertices, vec![[0, 1, 2], [0, 2, 3]]).unwrap()
  }

  #[test]
  fn uniform_square() {
    let l = UniformLaplacian.build(&square(), 4).unwrap().to_dense();
    let third = 1.0 / 3.0;
    #[rustfmt::skip]
    let expected = na::DMatrix::from_row_slice(4, 4, &[
       1.0,   -third, -third, -third,
      -0.5,    1.0,   -0.5,    0.0,
      -third, -third,  1.0,   -third,
      -0.5,    0.0,   -0.5,    1.0,
    ]);
    assert_relative_eq!(l, expected, epsilon = 1e-14);
  }

  #[test]
  fn rows_annihilate_constants() {
    for kind in [LaplacianKind::Uniform, LaplacianKind::Cotangent] {
      let l = kind.build(&square(), 4).unwrap();
      let ones = na::DMatrix::from_element(4, 3, 1.0);
      assert_relative_eq!(l.apply(&ones), na::DMatrix::zeros(4, 3), epsilon = 1e-14);
    }
  }

  #[test]
  fn cotangent_square() {
    // Right angles at the corners give zero weight to the diagonal 0-2.
    let l = CotanLaplacian.build(&square(), 4).unwrap().to_dense();
    assert_relative_eq!(l[(0, 2)], 0.0, epsilon = 1e-14);
    assert_relative_eq!(l[(0, 1)], -0.5, epsilon = 1e-14);
    assert_relative_eq!(l[(1, 0)], -0.5, epsilon = 1e-14);
  }

  #[test]
  fn isolated_vertices_keep_identity() {
    let l = UniformLaplacian.build(&square(), 6).unwrap();
    assert_eq!(l.nvertices(), 6);
    let dense = l.to_dense();
    assert_eq!(dense.row(4).iter().copied().collect::<Vec<_>>(), vec![0., 0., 0., 0., 1., 0.]);
    assert_eq!(dense.row(5).sum(), 1.0);
  }

  #[test]
  fn too_few_vertices() {
    let err = UniformLaplacian.build(&square(), 3).unwrap_err();
    assert!(matches!(err, EMeshError::Configuration { .. }));
  }

  #[test]
  fn column_sums_match_dense() {
    let l = UniformLaplacian.build(&square(), 5).unwrap();
    let dense = l.to_dense();
    let expected = na::DVector::from_fn(5, |j, _| dense.column(j).norm_squared());
    assert_relative_eq!(l.column_sum_of_squares(), expected, epsilon = 1e-14);
  }
}
