//! The mesh fidelity energy
//! $E(delta_p) = 1/M sum_k sum_m norm((L_k (delta_p_k - delta_g_k))_m)^2$.

use crate::{
  cache::BlendshapeLaplacianCache,
  error::EMeshResult,
  field::{DisplacementField, FieldShape, RawField},
  laplacian::{LaplacianBuilder, LaplacianKind},
  stationary::StationarySystem,
  triangulate::{PlanarDelaunay, Triangulator},
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Target displacements together with their cached Laplace operators.
///
/// Immutable after construction: evaluation and the stationary system only
/// read from it, so shared references can be used from several threads.
#[derive(Debug, Clone)]
pub struct EMesh {
  target: DisplacementField,
  cache: BlendshapeLaplacianCache,
}

impl EMesh {
  /// Uses [`PlanarDelaunay`] and the default [`LaplacianKind`].
  pub fn new(target: impl Into<RawField>) -> EMeshResult<Self> {
    Self::with_collaborators(target, &PlanarDelaunay, &LaplacianKind::default())
  }

  pub fn with_collaborators(
    target: impl Into<RawField>,
    triangulator: &impl Triangulator,
    builder: &impl LaplacianBuilder,
  ) -> EMeshResult<Self> {
    let target = DisplacementField::from_raw(target)?;
    let cache = BlendshapeLaplacianCache::new(&target, triangulator, builder)?;
    Ok(Self { target, cache })
  }

  pub fn shape(&self) -> FieldShape {
    self.cache.shape()
  }
  pub fn target(&self) -> &DisplacementField {
    &self.target
  }
  pub fn cache(&self) -> &BlendshapeLaplacianCache {
    &self.cache
  }

  /// Evaluates the energy at `dp`, given in any layout of shape `(K, M, 3)`.
  pub fn evaluate(&self, dp: impl Into<RawField>) -> EMeshResult<f64> {
    let dp = DisplacementField::conform(dp, self.shape())?;
    self.evaluate_field(&dp)
  }

  /// Evaluates the energy at a row-major `(K, M, 3)` parameter vector.
  pub fn evaluate_vector(&self, dp: &[f64]) -> EMeshResult<f64> {
    self.evaluate(dp)
  }

  pub fn evaluate_field(&self, dp: &DisplacementField) -> EMeshResult<f64> {
    let diff = dp.difference(&self.target)?;
    let terms = self.per_blendshape(|k| {
      self
        .cache
        .laplacian(k)
        .apply(diff.blendshape(k))
        .row_iter()
        .map(|r| r.norm_squared())
        .sum::<f64>()
    });
    Ok(terms.into_iter().sum::<f64>() / self.shape().nmarkers as f64)
  }

  /// $nabla E = 2/M L_k^T L_k (delta_p_k - delta_g_k)$ in the shape of `dp`.
  pub fn gradient(&self, dp: impl Into<RawField>) -> EMeshResult<DisplacementField> {
    let dp = DisplacementField::conform(dp, self.shape())?;
    let diff = dp.difference(&self.target)?;
    let scale = 2.0 / self.shape().nmarkers as f64;
    let blendshapes = self.per_blendshape(|k| {
      let laplacian = self.cache.laplacian(k);
      laplacian.apply_transpose(&laplacian.apply(diff.blendshape(k))) * scale
    });
    DisplacementField::conform(blendshapes, self.shape())
  }

  /// The separable linear system whose solution minimizes the energy.
  pub fn stationary_system(&self) -> StationarySystem {
    StationarySystem::new(self)
  }

  /// Applies `f` to every blendshape index, results in index order.
  fn per_blendshape<T, F>(&self, f: F) -> Vec<T>
  where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
  {
    let nblendshapes = self.shape().nblendshapes;
    #[cfg(feature = "parallel")]
    {
      (0..nblendshapes).into_par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
      (0..nblendshapes).map(f).collect()
    }
  }
}
