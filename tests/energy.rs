//! Properties of the mesh fidelity energy on small random instances.

extern crate nalgebra as na;

use emesh::{
  laplacian::{LaplacianBuilder, LaplacianKind},
  triangulate::{PlanarDelaunay, Triangulator},
  Axis, DisplacementField, EMesh, EMeshError, FieldShape,
};

use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_field(rng: &mut impl Rng, shape: FieldShape) -> DisplacementField {
  DisplacementField::from_fn(shape, |_, _, _| rng.gen::<f64>())
}

fn instances(kind: LaplacianKind) -> Vec<(EMesh, DisplacementField)> {
  let mut rng = ChaCha8Rng::seed_from_u64(1);
  [(1, 5), (2, 7), (3, 12)]
    .into_iter()
    .map(|(k, m)| {
      let shape = FieldShape::new(k, m);
      let target = random_field(&mut rng, shape);
      let dp = random_field(&mut rng, shape);
      let emesh = EMesh::with_collaborators(target, &PlanarDelaunay, &kind).unwrap();
      (emesh, dp)
    })
    .collect()
}

fn all_instances() -> Vec<(EMesh, DisplacementField)> {
  let mut all = instances(LaplacianKind::Uniform);
  all.extend(instances(LaplacianKind::Cotangent));
  all
}

#[test]
fn energy_is_positive_away_from_target() {
  for (emesh, dp) in all_instances() {
    let e = emesh.evaluate(&dp).unwrap();
    assert!(e > 0.0, "energy {e} of a random candidate");
  }
}

#[test]
fn energy_vanishes_at_target() {
  for (emesh, _) in all_instances() {
    assert_eq!(emesh.evaluate(emesh.target()).unwrap(), 0.0);
  }
}

#[test]
fn energy_matches_dense_computation() {
  for (emesh, dp) in all_instances() {
    let shape = emesh.shape();
    let mut expected = 0.0;
    for k in 0..shape.nblendshapes {
      let l = emesh.cache().laplacian(k).to_dense();
      let dv = dp.blendshape(k) - emesh.target().blendshape(k);
      let lop = l * dv;
      expected += lop.row_iter().map(|r| r.norm_squared()).sum::<f64>();
    }
    expected /= shape.nmarkers as f64;
    assert_relative_eq!(emesh.evaluate(&dp).unwrap(), expected, max_relative = 1e-12);
  }
}

#[test]
fn flat_and_structured_inputs_agree() {
  for (emesh, dp) in all_instances() {
    let structured = emesh.evaluate(&dp).unwrap();
    let flat = emesh.evaluate(dp.to_flat()).unwrap();
    let vector = emesh.evaluate_vector(dp.to_vector().as_slice()).unwrap();
    assert_eq!(structured, flat);
    assert_eq!(structured, vector);
  }
}

#[test]
fn evaluation_is_deterministic() {
  for (emesh, dp) in all_instances() {
    let first = emesh.evaluate(&dp).unwrap();
    for _ in 0..5 {
      assert_eq!(emesh.evaluate(&dp).unwrap().to_bits(), first.to_bits());
    }
  }
}

#[test]
fn doubling_the_residual_quadruples_the_energy() {
  for (emesh, dp) in all_instances() {
    let target = emesh.target();
    let diff = dp.difference(target).unwrap();
    let doubled = target.zip_with(&diff, |g, d| g + 2.0 * d).unwrap();
    let e = emesh.evaluate(&dp).unwrap();
    let e2 = emesh.evaluate(&doubled).unwrap();
    assert_relative_eq!(e2, 4.0 * e, max_relative = 1e-12);
  }
}

#[test]
fn gradient_matches_finite_differences() {
  let h = 1e-6;
  for (emesh, dp) in all_instances() {
    let grad = emesh.gradient(&dp).unwrap();
    let shape = emesh.shape();
    for k in 0..shape.nblendshapes {
      for m in 0..shape.nmarkers {
        for axis in Axis::ALL {
          let bump = |delta: f64| {
            DisplacementField::from_fn(shape, |kk, mm, aa| {
              let v = dp.get(kk, mm, aa);
              if (kk, mm, aa) == (k, m, axis) {
                v + delta
              } else {
                v
              }
            })
          };
          let forward = emesh.evaluate(bump(h)).unwrap();
          let backward = emesh.evaluate(bump(-h)).unwrap();
          let fd = (forward - backward) / (2.0 * h);
          assert_relative_eq!(grad.get(k, m, axis), fd, epsilon = 1e-6);
        }
      }
    }
  }
}

#[test]
fn evaluation_leaves_cache_untouched() {
  for (emesh, dp) in all_instances() {
    let target = emesh.target().clone();
    let laplacians: Vec<_> = emesh.cache().laplacians().iter().map(|l| l.to_dense()).collect();
    emesh.evaluate(&dp).unwrap();
    emesh.gradient(&dp).unwrap();
    emesh.stationary_system();
    assert_eq!(emesh.target(), &target);
    for (l, dense) in emesh.cache().laplacians().iter().zip(laplacians) {
      assert_eq!(l.to_dense(), dense);
    }
  }
}

#[test]
fn features_not_divisible_by_three() {
  let flat = na::DMatrix::<f64>::zeros(1, 7);
  let err = EMesh::new(flat).unwrap_err();
  assert!(matches!(err, EMeshError::Shape { .. }), "{err}");
}

#[test]
fn candidate_of_wrong_size() {
  let (emesh, _) = instances(LaplacianKind::Uniform).remove(0);
  let err = emesh.evaluate(na::DMatrix::<f64>::zeros(1, 18)).unwrap_err();
  assert!(matches!(err, EMeshError::Shape { .. }));
  let err = emesh.evaluate(na::DMatrix::<f64>::zeros(1, 16)).unwrap_err();
  assert!(matches!(err, EMeshError::Shape { .. }));
}

#[test]
fn empty_target_is_a_configuration_error() {
  let err = EMesh::new(na::DMatrix::<f64>::zeros(0, 15)).unwrap_err();
  assert!(matches!(err, EMeshError::Configuration { .. }));
}

#[test]
fn cache_is_built_from_target_triangulation() {
  let (emesh, _) = instances(LaplacianKind::Cotangent).remove(1);
  for k in 0..emesh.shape().nblendshapes {
    let mesh = PlanarDelaunay.triangulate(emesh.target().blendshape(k)).unwrap();
    let l = LaplacianKind::Cotangent.build(&mesh, emesh.shape().nmarkers).unwrap();
    assert_eq!(l.to_dense(), emesh.cache().laplacian(k).to_dense());
  }
}
