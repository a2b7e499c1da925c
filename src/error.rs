use std::path::PathBuf;

use thiserror::Error;

pub type EMeshResult<T> = Result<T, EMeshError>;

#[derive(Debug, Error)]
pub enum EMeshError {
  /// A displacement field that cannot be brought into `(K, M, 3)` form.
  #[error("shape error: {message}")]
  Shape { message: String },

  /// Inconsistent sizes handed to the cache or one of its collaborators.
  #[error("configuration error: {message}")]
  Configuration { message: String },

  #[error("triangulation failed: {0}")]
  Triangulation(String),

  #[error("solver error: {0}")]
  Solver(String),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("{}:{line}: {message}", path.display())]
  Parse {
    path: PathBuf,
    line: usize,
    message: String,
  },
}

impl EMeshError {
  pub fn shape(message: impl Into<String>) -> Self {
    Self::Shape {
      message: message.into(),
    }
  }

  pub fn configuration(message: impl Into<String>) -> Self {
    Self::Configuration {
      message: message.into(),
    }
  }
}
