//! Displacement fields over the markers of a set of blendshapes.
//!
//! At the boundary a field may arrive in one of several layouts ([`RawField`]).
//! Internally there is exactly one canonical layout ([`DisplacementField`]):
//! one `M x 3` matrix per blendshape, a row per marker.

use crate::error::{EMeshError, EMeshResult};

use std::fmt;

pub type BlendshapeIdx = usize;
pub type MarkerIdx = usize;

/// Number of spatial components of a displacement.
pub const NCOMPONENTS: usize = 3;

/// Spatial axis of a displacement component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
  X = 0,
  Y = 1,
  Z = 2,
}
impl Axis {
  pub const ALL: [Axis; NCOMPONENTS] = [Axis::X, Axis::Y, Axis::Z];

  pub fn index(self) -> usize {
    self as usize
  }
}

/// Sizes `(K, M)` of a displacement field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldShape {
  pub nblendshapes: usize,
  pub nmarkers: usize,
}
impl FieldShape {
  pub fn new(nblendshapes: usize, nmarkers: usize) -> Self {
    Self {
      nblendshapes,
      nmarkers,
    }
  }
  /// Number of scalar features per blendshape, `3M`.
  pub fn nfeatures(&self) -> usize {
    NCOMPONENTS * self.nmarkers
  }
  /// Total number of scalars, `3KM`.
  pub fn len(&self) -> usize {
    self.nblendshapes * self.nfeatures()
  }
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
impl fmt::Display for FieldShape {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({}, {}, {NCOMPONENTS})", self.nblendshapes, self.nmarkers)
  }
}

/// A displacement field in any of the layouts accepted at the API boundary.
#[derive(Debug, Clone)]
pub enum RawField {
  /// `K` matrices of shape `M x 3`.
  Structured(Vec<na::DMatrix<f64>>),
  /// A `K x 3M` matrix, each row laid out as `[x0, y0, z0, x1, y1, z1, ...]`.
  Flat(na::DMatrix<f64>),
  /// All `3KM` scalars in row-major `(K, M, 3)` order.
  Vector(na::DVector<f64>),
}
impl From<Vec<na::DMatrix<f64>>> for RawField {
  fn from(value: Vec<na::DMatrix<f64>>) -> Self {
    Self::Structured(value)
  }
}
impl From<na::DMatrix<f64>> for RawField {
  fn from(value: na::DMatrix<f64>) -> Self {
    Self::Flat(value)
  }
}
impl From<na::DVector<f64>> for RawField {
  fn from(value: na::DVector<f64>) -> Self {
    Self::Vector(value)
  }
}
impl From<&[f64]> for RawField {
  fn from(value: &[f64]) -> Self {
    Self::Vector(na::DVector::from_column_slice(value))
  }
}
impl From<DisplacementField> for RawField {
  fn from(value: DisplacementField) -> Self {
    Self::Structured(value.blendshapes)
  }
}
impl From<&DisplacementField> for RawField {
  fn from(value: &DisplacementField) -> Self {
    Self::Structured(value.blendshapes.clone())
  }
}

/// Canonical `(K, M, 3)` displacement field.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementField {
  blendshapes: Vec<na::DMatrix<f64>>,
  nmarkers: usize,
}

// constructors
impl DisplacementField {
  pub fn zeros(shape: FieldShape) -> Self {
    let blendshapes = (0..shape.nblendshapes)
      .map(|_| na::DMatrix::zeros(shape.nmarkers, NCOMPONENTS))
      .collect();
    Self {
      blendshapes,
      nmarkers: shape.nmarkers,
    }
  }

  pub fn from_fn<F>(shape: FieldShape, mut f: F) -> Self
  where
    F: FnMut(BlendshapeIdx, MarkerIdx, Axis) -> f64,
  {
    let blendshapes = (0..shape.nblendshapes)
      .map(|k| na::DMatrix::from_fn(shape.nmarkers, NCOMPONENTS, |m, a| f(k, m, Axis::ALL[a])))
      .collect();
    Self {
      blendshapes,
      nmarkers: shape.nmarkers,
    }
  }

  /// Normalizes a field whose shape is not yet known.
  ///
  /// `K` and `M` are inferred from the layout. A [`RawField::Vector`] carries
  /// no blendshape count and is rejected.
  pub fn from_raw(raw: impl Into<RawField>) -> EMeshResult<Self> {
    match raw.into() {
      RawField::Structured(blendshapes) => {
        let nmarkers = blendshapes.first().map(|b| b.nrows()).unwrap_or(0);
        let shape = FieldShape::new(blendshapes.len(), nmarkers);
        Self::from_structured(blendshapes, shape)
      }
      RawField::Flat(flat) => {
        let nmarkers = nmarkers_of_features(flat.ncols(), flat.shape())?;
        let shape = FieldShape::new(flat.nrows(), nmarkers);
        tracing::warn!("flat displacement field {:?} reshaped to {shape}", flat.shape());
        Self::from_flat(&flat, shape)
      }
      RawField::Vector(v) => Err(EMeshError::shape(format!(
        "cannot infer (K, M, 3) from a vector of length {}",
        v.len()
      ))),
    }
  }

  /// Normalizes a field that must conform to `shape`.
  pub fn conform(raw: impl Into<RawField>, shape: FieldShape) -> EMeshResult<Self> {
    match raw.into() {
      RawField::Structured(blendshapes) => Self::from_structured(blendshapes, shape),
      RawField::Flat(flat) => {
        nmarkers_of_features(flat.ncols(), flat.shape())?;
        Self::from_flat(&flat, shape)
      }
      RawField::Vector(v) => {
        if v.len() != shape.len() {
          return Err(EMeshError::shape(format!(
            "cannot reshape vector of length {} into ({}, {})",
            v.len(),
            shape.nblendshapes,
            shape.nfeatures()
          )));
        }
        let nfeatures = shape.nfeatures();
        Ok(Self::from_fn(shape, |k, m, a| {
          v[k * nfeatures + NCOMPONENTS * m + a.index()]
        }))
      }
    }
  }

  fn from_structured(blendshapes: Vec<na::DMatrix<f64>>, shape: FieldShape) -> EMeshResult<Self> {
    if blendshapes.len() != shape.nblendshapes {
      return Err(EMeshError::shape(format!(
        "expected {} blendshapes, got {}",
        shape.nblendshapes,
        blendshapes.len()
      )));
    }
    if let Some((k, b)) = blendshapes
      .iter()
      .enumerate()
      .find(|(_, b)| b.shape() != (shape.nmarkers, NCOMPONENTS))
    {
      return Err(EMeshError::shape(format!(
        "blendshape {k} has shape {:?}, expected ({}, {NCOMPONENTS})",
        b.shape(),
        shape.nmarkers
      )));
    }
    Ok(Self {
      blendshapes,
      nmarkers: shape.nmarkers,
    })
  }

  fn from_flat(flat: &na::DMatrix<f64>, shape: FieldShape) -> EMeshResult<Self> {
    if flat.shape() != (shape.nblendshapes, shape.nfeatures()) {
      return Err(EMeshError::shape(format!(
        "cannot reshape {:?} into {shape}",
        flat.shape()
      )));
    }
    Ok(Self::from_fn(shape, |k, m, a| {
      flat[(k, NCOMPONENTS * m + a.index())]
    }))
  }

  /// Interleaves three per-axis `(K, M)` arrays into a single field.
  pub fn from_axes(axes: [&na::DMatrix<f64>; NCOMPONENTS]) -> EMeshResult<Self> {
    let (nblendshapes, nmarkers) = axes[0].shape();
    if axes.iter().any(|a| a.shape() != (nblendshapes, nmarkers)) {
      return Err(EMeshError::shape("per-axis arrays differ in shape"));
    }
    let shape = FieldShape::new(nblendshapes, nmarkers);
    Ok(Self::from_fn(shape, |k, m, a| axes[a.index()][(k, m)]))
  }
}

// getters
impl DisplacementField {
  pub fn shape(&self) -> FieldShape {
    FieldShape::new(self.blendshapes.len(), self.nmarkers)
  }
  pub fn nblendshapes(&self) -> usize {
    self.blendshapes.len()
  }
  pub fn nmarkers(&self) -> usize {
    self.nmarkers
  }
  /// The `M x 3` displacements of blendshape `k`.
  pub fn blendshape(&self, k: BlendshapeIdx) -> &na::DMatrix<f64> {
    &self.blendshapes[k]
  }
  pub fn blendshapes(&self) -> &[na::DMatrix<f64>] {
    &self.blendshapes
  }
  pub fn get(&self, k: BlendshapeIdx, m: MarkerIdx, axis: Axis) -> f64 {
    self.blendshapes[k][(m, axis.index())]
  }
}

// conversions
impl DisplacementField {
  /// The `(K, M)` array of a single displacement component.
  pub fn axis(&self, axis: Axis) -> na::DMatrix<f64> {
    na::DMatrix::from_fn(self.nblendshapes(), self.nmarkers, |k, m| {
      self.get(k, m, axis)
    })
  }

  /// The `K x 3M` layout.
  pub fn to_flat(&self) -> na::DMatrix<f64> {
    na::DMatrix::from_fn(
      self.nblendshapes(),
      self.shape().nfeatures(),
      |k, f| self.blendshapes[k][(f / NCOMPONENTS, f % NCOMPONENTS)],
    )
  }

  /// All scalars in row-major `(K, M, 3)` order.
  pub fn to_vector(&self) -> na::DVector<f64> {
    let nfeatures = self.shape().nfeatures();
    na::DVector::from_fn(self.shape().len(), |i, _| {
      let (k, f) = (i / nfeatures, i % nfeatures);
      self.blendshapes[k][(f / NCOMPONENTS, f % NCOMPONENTS)]
    })
  }

  /// `self - other`, both of the same shape.
  pub fn difference(&self, other: &Self) -> EMeshResult<Self> {
    self.zip_with(other, |a, b| a - b)
  }

  pub fn zip_with<F>(&self, other: &Self, f: F) -> EMeshResult<Self>
  where
    F: Fn(f64, f64) -> f64,
  {
    if self.shape() != other.shape() {
      return Err(EMeshError::shape(format!(
        "field shapes differ: {} vs {}",
        self.shape(),
        other.shape()
      )));
    }
    let blendshapes = self
      .blendshapes
      .iter()
      .zip(&other.blendshapes)
      .map(|(a, b)| a.zip_map(b, &f))
      .collect();
    Ok(Self {
      blendshapes,
      nmarkers: self.nmarkers,
    })
  }

  /// Largest absolute componentwise difference.
  pub fn max_abs_diff(&self, other: &Self) -> EMeshResult<f64> {
    let diff = self.difference(other)?;
    Ok(
      diff
        .blendshapes
        .iter()
        .flat_map(|b| b.iter())
        .fold(0.0, |acc: f64, v| acc.max(v.abs())),
    )
  }
}

fn nmarkers_of_features(nfeatures: usize, shape: (usize, usize)) -> EMeshResult<usize> {
  if nfeatures % NCOMPONENTS != 0 {
    return Err(EMeshError::shape(format!(
      "number of features of {shape:?} ({nfeatures}) is not a multiple of {NCOMPONENTS} (xyz)"
    )));
  }
  Ok(nfeatures / NCOMPONENTS)
}
