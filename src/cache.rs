use crate::{
  error::{EMeshError, EMeshResult},
  field::{BlendshapeIdx, DisplacementField, FieldShape},
  laplacian::{LaplacianBuilder, LaplacianOperator},
  triangulate::Triangulator,
};

/// One Laplace operator per blendshape, built from the triangulation of that
/// blendshape's target displacements.
///
/// This is the only place where triangulation happens. Candidate fields are
/// always measured against these operators.
#[derive(Debug, Clone)]
pub struct BlendshapeLaplacianCache {
  shape: FieldShape,
  laplacians: Vec<LaplacianOperator>,
}

impl BlendshapeLaplacianCache {
  pub fn new(
    target: &DisplacementField,
    triangulator: &impl Triangulator,
    builder: &impl LaplacianBuilder,
  ) -> EMeshResult<Self> {
    let shape = target.shape();
    if shape.nblendshapes == 0 || shape.nmarkers == 0 {
      return Err(EMeshError::configuration(format!(
        "need at least one blendshape and one marker, got {shape}"
      )));
    }

    let laplacians = target
      .blendshapes()
      .iter()
      .enumerate()
      .map(|(k, points)| {
        let mesh = triangulator.triangulate(points)?;
        if mesh.nvertices() != shape.nmarkers {
          return Err(EMeshError::configuration(format!(
            "triangulation of blendshape {k} has {} vertices, expected {}",
            mesh.nvertices(),
            shape.nmarkers
          )));
        }
        let laplacian = builder.build(&mesh, shape.nmarkers)?;
        if laplacian.nvertices() != shape.nmarkers {
          return Err(EMeshError::configuration(format!(
            "laplacian of blendshape {k} is {n}x{n}, expected {m}x{m}",
            n = laplacian.nvertices(),
            m = shape.nmarkers
          )));
        }
        tracing::debug!(
          "blendshape {k}: {} faces, laplacian nnz={}",
          mesh.nfaces(),
          laplacian.nnz()
        );
        Ok(laplacian)
      })
      .collect::<EMeshResult<Vec<_>>>()?;

    Ok(Self { shape, laplacians })
  }

  pub fn shape(&self) -> FieldShape {
    self.shape
  }
  pub fn nblendshapes(&self) -> usize {
    self.shape.nblendshapes
  }
  pub fn nmarkers(&self) -> usize {
    self.shape.nmarkers
  }
  pub fn laplacian(&self, k: BlendshapeIdx) -> &LaplacianOperator {
    &self.laplacians[k]
  }
  pub fn laplacians(&self) -> &[LaplacianOperator] {
    &self.laplacians
  }
}
