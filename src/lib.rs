//! Mesh fidelity energy for solving personalized blendshapes from sparse
//! marker data, and the closed-form linear system minimizing it.

extern crate nalgebra as na;
extern crate nalgebra_sparse as nas;

pub mod cache;
pub mod energy;
pub mod error;
pub mod field;
pub mod format;
pub mod laplacian;
pub mod linalg;
pub mod mesh;
pub mod precompute;
pub mod sparse;
pub mod stationary;
pub mod triangulate;

pub use energy::EMesh;
pub use error::{EMeshError, EMeshResult};
pub use field::{Axis, DisplacementField, FieldShape, RawField};
pub use stationary::StationarySystem;
