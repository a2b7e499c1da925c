//! The closed-form stationary point against a general-purpose minimizer.

use emesh::{
  laplacian::LaplacianKind, triangulate::PlanarDelaunay, Axis, DisplacementField, EMesh,
  FieldShape,
};

use approx::assert_relative_eq;
use argmin::{
  core::{CostFunction, Executor, Gradient, State},
  solver::{linesearch::MoreThuenteLineSearch, quasinewton::LBFGS},
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Exposes the energy to argmin over row-major `(K, M, 3)` parameter vectors.
struct EnergyProblem<'a> {
  emesh: &'a EMesh,
}

impl CostFunction for EnergyProblem<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, param: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    self
      .emesh
      .evaluate_vector(param)
      .map_err(|e| argmin::core::Error::msg(e.to_string()))
  }
}

impl Gradient for EnergyProblem<'_> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, param: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
    let grad = self
      .emesh
      .gradient(param.as_slice())
      .map_err(|e| argmin::core::Error::msg(e.to_string()))?;
    Ok(grad.to_vector().as_slice().to_vec())
  }
}

fn minimize(emesh: &EMesh, init: Vec<f64>) -> Vec<f64> {
  let linesearch = MoreThuenteLineSearch::new();
  let solver = LBFGS::new(linesearch, 10);
  let result = Executor::new(EnergyProblem { emesh }, solver)
    .configure(|config| config.param(init).max_iters(200))
    .run()
    .unwrap();
  let state = result.state();
  state
    .get_best_param()
    .or_else(|| state.get_param())
    .cloned()
    .unwrap()
}

fn random_target(seed: u64, shape: FieldShape) -> DisplacementField {
  let mut rng = ChaCha8Rng::seed_from_u64(seed);
  DisplacementField::from_fn(shape, |_, _, _| rng.gen::<f64>())
}

#[test]
fn closed_form_matches_iterative_minimizer() {
  tracing_subscriber::fmt().with_test_writer().try_init().ok();

  for seed in 1..=5 {
    let target = random_target(seed, FieldShape::new(1, 5));
    let emesh = EMesh::new(target.clone()).unwrap();

    let optimized = minimize(&emesh, target.to_vector().as_slice().to_vec());
    let solved = emesh.stationary_system().solve().unwrap().to_vector();

    assert_eq!(optimized.len(), solved.len());
    for (o, s) in optimized.iter().zip(solved.iter()) {
      assert!((o - s).abs() < 1e-5, "seed {seed}: {o} vs {s}");
    }
  }
}

#[test]
fn closed_form_is_a_stationary_point() {
  for kind in [LaplacianKind::Uniform, LaplacianKind::Cotangent] {
    let target = random_target(7, FieldShape::new(3, 9));
    let emesh = EMesh::with_collaborators(target, &PlanarDelaunay, &kind).unwrap();
    let solution = emesh.stationary_system().solve().unwrap();

    assert!(solution.max_abs_diff(emesh.target()).unwrap() < 1e-10);
    assert_relative_eq!(emesh.evaluate(&solution).unwrap(), 0.0, epsilon = 1e-20);
    let grad = emesh.gradient(&solution).unwrap();
    assert!(grad.to_vector().amax() < 1e-10);
  }
}

#[test]
fn per_axis_systems_share_their_matrix() {
  let target = random_target(3, FieldShape::new(2, 6));
  let emesh = EMesh::new(target.to_flat()).unwrap();
  let system = emesh.stationary_system();

  let diagonal = system.diagonal();
  for axis in Axis::ALL {
    let b = system.rhs(axis);
    assert_eq!(b.len(), 12);
    for k in 0..2 {
      for m in 0..6 {
        let i = 6 * k + m;
        assert_relative_eq!(b[i], diagonal[i] * target.get(k, m, axis), max_relative = 1e-12);
      }
    }
  }

  let (ax, ay, az, bx, by, bz) = system.into_parts();
  assert_eq!(ax, ay);
  assert_eq!(ax, az);
  assert_eq!(ax.nrows(), 12);
  assert_eq!(ax.nnz(), 12);
  assert_eq!([bx.len(), by.len(), bz.len()], [12; 3]);
}
