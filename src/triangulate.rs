//! Connecting a set of marker points into a triangle mesh.

use crate::{
  error::{EMeshError, EMeshResult},
  mesh::{MarkerMesh, Triangle},
};

use spade::{DelaunayTriangulation, Point2, Triangulation as _};
use std::collections::HashMap;

pub trait Triangulator {
  /// Triangulates the rows of `points` (`M x 3`).
  ///
  /// The returned mesh has exactly `M` vertices, in input order.
  fn triangulate(&self, points: &na::DMatrix<f64>) -> EMeshResult<MarkerMesh>;
}

impl<F> Triangulator for F
where
  F: Fn(&na::DMatrix<f64>) -> EMeshResult<MarkerMesh>,
{
  fn triangulate(&self, points: &na::DMatrix<f64>) -> EMeshResult<MarkerMesh> {
    self(points)
  }
}

/// Delaunay triangulation of the points projected onto their best-fit plane.
///
/// Coincident points are merged into the lowest marker index; the others stay
/// unreferenced. Degenerate (collinear) inputs yield no faces.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanarDelaunay;

impl Triangulator for PlanarDelaunay {
  fn triangulate(&self, points: &na::DMatrix<f64>) -> EMeshResult<MarkerMesh> {
    if points.ncols() != 3 {
      return Err(EMeshError::shape(format!(
        "expected M x 3 marker positions, got {:?}",
        points.shape()
      )));
    }
    let faces = if points.nrows() < 3 {
      Vec::new()
    } else {
      delaunay_faces(&plane_coordinates(points))?
    };
    MarkerMesh::from_rows(points, faces)
  }
}

/// Coordinates of each point along the two principal directions.
fn plane_coordinates(points: &na::DMatrix<f64>) -> Vec<[f64; 2]> {
  let centroid = points.row_mean();
  let mut centered = points.clone();
  for mut row in centered.row_iter_mut() {
    row -= &centroid;
  }

  // Singular values come out sorted, so the first two rows of `v_t` span the
  // plane of largest spread.
  let basis = centered
    .clone()
    .svd(false, true)
    .v_t
    .map(|v_t| v_t.rows(0, 2).transpose())
    .unwrap_or_else(|| na::DMatrix::identity(3, 2));

  let projected = centered * basis;
  projected.row_iter().map(|r| [r[0], r[1]]).collect()
}

fn delaunay_faces(coords: &[[f64; 2]]) -> EMeshResult<Vec<Triangle>> {
  let mut triangulation: DelaunayTriangulation<Point2<f64>> = DelaunayTriangulation::new();
  let mut markers = HashMap::new();
  for (imarker, &[x, y]) in coords.iter().enumerate() {
    let handle = triangulation
      .insert(Point2::new(x, y))
      .map_err(|e| EMeshError::Triangulation(format!("marker {imarker}: {e:?}")))?;
    markers.entry(handle).or_insert(imarker);
  }

  let faces = triangulation
    .inner_faces()
    .map(|face| face.vertices().map(|v| markers[&v.fix()]))
    .collect();
  Ok(faces)
}
