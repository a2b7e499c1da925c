//! Triangle meshes over marker (or dense scan) vertices.
//!
//! Only positions and connectivity are stored. No normals, no texture data.

use crate::error::{EMeshError, EMeshResult};

use itertools::Itertools as _;

pub type VertexIdx = usize;
pub type Triangle = [VertexIdx; 3];

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerMesh {
  vertices: Vec<na::Point3<f64>>,
  faces: Vec<Triangle>,
}

impl MarkerMesh {
  /// Fails if any face references a vertex outside of `vertices`.
  pub fn new(vertices: Vec<na::Point3<f64>>, faces: Vec<Triangle>) -> EMeshResult<Self> {
    let nvertices = vertices.len();
    if let Some(face) = faces.iter().find(|f| f.iter().any(|&v| v >= nvertices)) {
      return Err(EMeshError::configuration(format!(
        "face {face:?} references a vertex outside of [0, {nvertices})"
      )));
    }
    Ok(Self { vertices, faces })
  }

  /// Rows of `positions` are the vertex coordinates.
  pub fn from_rows(positions: &na::DMatrix<f64>, faces: Vec<Triangle>) -> EMeshResult<Self> {
    if positions.ncols() != 3 {
      return Err(EMeshError::shape(format!(
        "vertex positions must have 3 columns, got {}",
        positions.ncols()
      )));
    }
    let vertices = positions
      .row_iter()
      .map(|r| na::Point3::new(r[0], r[1], r[2]))
      .collect();
    Self::new(vertices, faces)
  }

  pub fn nvertices(&self) -> usize {
    self.vertices.len()
  }
  pub fn nfaces(&self) -> usize {
    self.faces.len()
  }
  pub fn vertices(&self) -> &[na::Point3<f64>] {
    &self.vertices
  }
  pub fn vertex(&self, i: VertexIdx) -> &na::Point3<f64> {
    &self.vertices[i]
  }
  pub fn faces(&self) -> &[Triangle] {
    &self.faces
  }

  /// Vertex positions as an `N x 3` matrix.
  pub fn position_rows(&self) -> na::DMatrix<f64> {
    na::DMatrix::from_fn(self.nvertices(), 3, |i, a| self.vertices[i][a])
  }

  /// Unique undirected edges, each as `(min, max)`, sorted.
  pub fn edges(&self) -> Vec<(VertexIdx, VertexIdx)> {
    self
      .faces
      .iter()
      .flat_map(|&[a, b, c]| [(a, b), (b, c), (c, a)])
      .filter(|(a, b)| a != b)
      .map(|(a, b)| (a.min(b), a.max(b)))
      .sorted_unstable()
      .dedup()
      .collect()
  }
}
