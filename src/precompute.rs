//! Batch precomputation of Laplacian-transformed vertex displacements
//! $L (V_k - V_"ref")$ for a set of dense blendshape meshes.

use crate::{
  error::{EMeshError, EMeshResult},
  laplacian::LaplacianBuilder,
  mesh::{MarkerMesh, Triangle},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{
  fs::File,
  io::{BufRead, BufReader, BufWriter, Read, Write},
  path::{Path, PathBuf},
};

#[derive(Debug, Clone)]
pub struct PrecomputeConfig {
  /// Directory holding `<name>.obj` for every blendshape and the reference.
  pub mesh_dir: PathBuf,
  /// Name of the neutral pose, skipped when it appears in the list.
  pub reference_name: String,
  /// Text file, one blendshape name per line.
  pub mesh_list: PathBuf,
  /// Destination `.npy` file.
  pub output: PathBuf,
}
impl Default for PrecomputeConfig {
  fn default() -> Self {
    Self {
      mesh_dir: PathBuf::from("data/blendshapes_obj"),
      reference_name: String::from("Louise_Neutral"),
      mesh_list: PathBuf::from("data/mesh_name_list.txt"),
      output: PathBuf::from("data/LdV_louise.npy"),
    }
  }
}
impl PrecomputeConfig {
  pub fn mesh_path(&self, name: &str) -> PathBuf {
    self.mesh_dir.join(format!("{name}.obj"))
  }
}

/// The stacked `L dV` rows, one per non-reference blendshape.
#[derive(Debug, Clone)]
pub struct LdeltaV {
  /// `K' x 3N`, each row laid out as `[x0, y0, z0, x1, ...]`.
  pub rows: na::DMatrix<f64>,
  /// Names in row order.
  pub names: Vec<String>,
  /// Length of the input list.
  pub nlisted: usize,
}
impl LdeltaV {
  /// `false` exactly when no listed name was skipped as the reference.
  pub fn neutral_found(&self) -> bool {
    self.rows.nrows() != self.nlisted
  }
}

pub fn read_mesh_list(path: impl AsRef<Path>) -> EMeshResult<Vec<String>> {
  let reader = BufReader::new(File::open(path)?);
  let mut names = Vec::new();
  for line in reader.lines() {
    let line = line?;
    let name = line.trim();
    if !name.is_empty() {
      names.push(name.to_owned());
    }
  }
  Ok(names)
}

/// Computes `L_k (V_k - V_ref)` for every listed mesh except the reference.
///
/// `L_k` is built over the blendshape mesh itself.
pub fn build_ldelta_v(
  names: &[String],
  config: &PrecomputeConfig,
  builder: &impl LaplacianBuilder,
) -> EMeshResult<LdeltaV> {
  let reference = load_obj(config.mesh_path(&config.reference_name))?;
  let nvertices = reference.nvertices();
  tracing::info!("num blendshapes: {}, num vertices: {nvertices}", names.len());

  let reference_rows = reference.position_rows();
  let mut rows = Vec::new();
  let mut kept = Vec::new();
  for name in names {
    if *name == config.reference_name {
      continue;
    }
    let mesh = load_obj(config.mesh_path(name))?;
    if mesh.nvertices() != nvertices {
      return Err(EMeshError::configuration(format!(
        "mesh {name} has {} vertices, reference has {nvertices}",
        mesh.nvertices()
      )));
    }
    let delta_v = mesh.position_rows() - &reference_rows;
    let laplacian = builder.build(&mesh, nvertices)?;
    let ldv = laplacian.apply(&delta_v);
    rows.push(ldv.transpose().iter().copied().collect::<Vec<_>>());
    kept.push(name.clone());
  }

  let ldv = LdeltaV {
    rows: na::DMatrix::from_fn(rows.len(), 3 * nvertices, |k, f| rows[k][f]),
    names: kept,
    nlisted: names.len(),
  };
  if !ldv.neutral_found() {
    tracing::warn!("No neutral pose found!");
  }
  tracing::info!("shape LdV: {:?}", ldv.rows.shape());
  Ok(ldv)
}

/// Runs the whole batch: read the list, compute, persist.
pub fn run(config: &PrecomputeConfig, builder: &impl LaplacianBuilder) -> EMeshResult<LdeltaV> {
  let names = read_mesh_list(&config.mesh_list)?;
  let ldv = build_ldelta_v(&names, config, builder)?;
  write_npy(&config.output, &ldv.rows)?;
  Ok(ldv)
}

/// Reads `v` and `f` records of a Wavefront OBJ file. Polygons are fanned
/// into triangles; everything else is ignored.
pub fn load_obj(path: impl AsRef<Path>) -> EMeshResult<MarkerMesh> {
  let path = path.as_ref();
  let reader = BufReader::new(File::open(path)?);
  let parse_err = |line: usize, message: String| EMeshError::Parse {
    path: path.to_path_buf(),
    line,
    message,
  };

  let mut vertices = Vec::new();
  let mut faces: Vec<Triangle> = Vec::new();
  for (iline, line) in reader.lines().enumerate() {
    let line = line?;
    let lineno = iline + 1;
    let mut tokens = line.split_whitespace();
    match tokens.next() {
      Some("v") => {
        let coords = tokens
          .take(3)
          .map(|t| t.parse::<f64>())
          .collect::<Result<Vec<_>, _>>()
          .map_err(|e| parse_err(lineno, e.to_string()))?;
        let &[x, y, z] = coords.as_slice() else {
          return Err(parse_err(lineno, "vertex needs 3 coordinates".into()));
        };
        vertices.push(na::Point3::new(x, y, z));
      }
      Some("f") => {
        let corners = tokens
          .map(|t| obj_index(t, vertices.len()))
          .collect::<Option<Vec<_>>>()
          .ok_or_else(|| parse_err(lineno, format!("invalid face `{line}`")))?;
        if corners.len() < 3 {
          return Err(parse_err(lineno, "face needs at least 3 corners".into()));
        }
        for i in 1..corners.len() - 1 {
          faces.push([corners[0], corners[i], corners[i + 1]]);
        }
      }
      _ => {}
    }
  }
  MarkerMesh::new(vertices, faces)
}

/// 1-based (or negative, relative) OBJ index of `v/vt/vn` into 0-based.
fn obj_index(token: &str, nvertices: usize) -> Option<usize> {
  let index: i64 = token.split('/').next()?.parse().ok()?;
  match index {
    i if i > 0 => Some(i as usize - 1),
    i if i < 0 => nvertices.checked_sub(i.unsigned_abs() as usize),
    _ => None,
  }
}

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const NPY_ALIGN: usize = 64;

/// Writes a NumPy `.npy` (version 1.0, `<f8`, C order) file.
pub fn write_npy(path: impl AsRef<Path>, array: &na::DMatrix<f64>) -> EMeshResult<()> {
  let mut header = format!(
    "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}), }}",
    array.nrows(),
    array.ncols()
  );
  let unpadded = NPY_MAGIC.len() + 2 + 2 + header.len() + 1;
  let padding = (NPY_ALIGN - unpadded % NPY_ALIGN) % NPY_ALIGN;
  header.extend(std::iter::repeat(' ').take(padding));
  header.push('\n');

  let mut writer = BufWriter::new(File::create(path)?);
  writer.write_all(NPY_MAGIC)?;
  writer.write_all(&[1, 0])?;
  writer.write_u16::<LittleEndian>(header.len() as u16)?;
  writer.write_all(header.as_bytes())?;
  for row in array.row_iter() {
    for &v in row.iter() {
      writer.write_f64::<LittleEndian>(v)?;
    }
  }
  writer.flush()?;
  Ok(())
}

/// Reads a 2D `.npy` file as written by [`write_npy`].
pub fn read_npy(path: impl AsRef<Path>) -> EMeshResult<na::DMatrix<f64>> {
  let path = path.as_ref();
  let invalid = |message: &str| EMeshError::Parse {
    path: path.to_path_buf(),
    line: 1,
    message: message.to_owned(),
  };
  let file = File::open(path)?;
  let file_len = file.metadata()?.len();
  let mut reader = BufReader::new(file);

  let mut magic = [0u8; 8];
  reader.read_exact(&mut magic)?;
  if &magic[..6] != NPY_MAGIC || magic[6] != 1 {
    return Err(invalid("not a version 1 npy file"));
  }
  let header_len = reader.read_u16::<LittleEndian>()? as usize;
  let mut header = vec![0u8; header_len];
  reader.read_exact(&mut header)?;
  let header = String::from_utf8_lossy(&header);
  if !header.contains("'<f8'") || !header.contains("'fortran_order': False") {
    return Err(invalid("only C-ordered <f8 arrays are supported"));
  }

  let shape = header
    .split("'shape': (")
    .nth(1)
    .and_then(|rest| rest.split(')').next())
    .ok_or_else(|| invalid("missing shape"))?;
  let dims = shape
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::parse::<usize>)
    .collect::<Result<Vec<_>, _>>()
    .map_err(|_| invalid("malformed shape"))?;
  let &[nrows, ncols] = dims.as_slice() else {
    return Err(invalid("expected a 2D array"));
  };

  let nbytes = nrows
    .checked_mul(ncols)
    .and_then(|n| n.checked_mul(std::mem::size_of::<f64>()))
    .ok_or_else(|| invalid("shape too large"))?;
  let data_offset = (NPY_MAGIC.len() + 2 + 2 + header_len) as u64;
  if file_len.checked_sub(data_offset) != Some(nbytes as u64) {
    return Err(invalid("shape does not match data length"));
  }
  let mut data = vec![0.0; nrows * ncols];
  reader.read_f64_into::<LittleEndian>(&mut data)?;
  Ok(na::DMatrix::from_row_slice(nrows, ncols, &data))
}
