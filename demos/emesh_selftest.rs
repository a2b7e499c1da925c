//! Evaluates the mesh fidelity energy on a random instance and checks that
//! iterative minimization lands on the closed-form stationary point.

extern crate nalgebra as na;

use emesh::{format::PrintOptions, DisplacementField, EMesh, FieldShape};

use argmin::{
  core::{CostFunction, Executor, Gradient, State},
  solver::{linesearch::MoreThuenteLineSearch, quasinewton::LBFGS},
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

struct EnergyProblem<'a>(&'a EMesh);

impl CostFunction for EnergyProblem<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, param: &Self::Param) -> Result<f64, argmin::core::Error> {
    Ok(self.0.evaluate_vector(param)?)
  }
}
impl Gradient for EnergyProblem<'_> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, param: &Self::Param) -> Result<Vec<f64>, argmin::core::Error> {
    let grad = self.0.gradient(param.as_slice())?;
    Ok(grad.to_vector().as_slice().to_vec())
  }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt::init();

  let print = PrintOptions::default();
  let shape = FieldShape::new(1, 5);
  let mut rng = ChaCha8Rng::seed_from_u64(0);
  let dgk = DisplacementField::from_fn(shape, |_, _, _| rng.gen::<f64>());
  let dp = DisplacementField::from_fn(shape, |_, _, _| rng.gen::<f64>());
  println!("dgk:\n{}", print.field(&dgk));
  println!("dp:\n{}", print.field(&dp));

  let emesh = EMesh::new(dgk.clone())?;
  for (k, laplacian) in emesh.cache().laplacians().iter().enumerate() {
    println!("L{k}:\n{}", print.matrix(&laplacian.to_dense()));
  }

  let mut control = 0.0;
  for k in 0..shape.nblendshapes {
    let laplacian = emesh.cache().laplacian(k).to_dense();
    let residual = laplacian * (dp.blendshape(k) - dgk.blendshape(k));
    control += residual.norm_squared();
  }
  control /= shape.nmarkers as f64;
  let energy = emesh.evaluate(&dp)?;
  println!("e_mesh = {energy:.6}, dense control = {control:.6}");
  assert!((energy - control).abs() <= 1e-12 * control.max(1.0));

  let init = dgk.to_vector().as_slice().to_vec();
  let solver = LBFGS::new(MoreThuenteLineSearch::new(), 10);
  let result = Executor::new(EnergyProblem(&emesh), solver)
    .configure(|config| config.param(init).max_iters(200))
    .run()?;
  let state = result.state();
  let optimized = state
    .get_best_param()
    .or_else(|| state.get_param())
    .cloned()
    .ok_or("minimizer returned no parameters")?;

  let system = emesh.stationary_system();
  let diagonal = system.diagonal();
  let diagonal = na::DMatrix::from_row_slice(1, diagonal.len(), diagonal.as_slice());
  println!("A diagonal:\n{}", print.matrix(&diagonal));
  let solved = system.solve()?;
  let optimized = DisplacementField::conform(optimized.as_slice(), shape)?;
  println!("optimized:\n{}", print.field(&optimized));
  println!("solved:\n{}", print.field(&solved));

  let diff = optimized.max_abs_diff(&solved)?;
  println!("max |optimized - solved| = {diff:e}");
  assert!(diff < 1e-5, "closed form and minimizer disagree");
  Ok(())
}
