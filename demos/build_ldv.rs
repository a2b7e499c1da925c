//! Precomputes `L dV` for every blendshape listed in `data/mesh_name_list.txt`
//! and stores the stacked rows as `data/LdV_louise.npy`.

use emesh::{
  laplacian::LaplacianKind,
  precompute::{self, PrecomputeConfig},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt::init();

  let config = PrecomputeConfig::default();
  let ldv = precompute::run(&config, &LaplacianKind::Cotangent)?;
  tracing::info!(
    "wrote {} rows for {} listed meshes to {}",
    ldv.rows.nrows(),
    ldv.nlisted,
    config.output.display()
  );
  Ok(())
}
