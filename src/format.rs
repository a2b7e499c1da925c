//! Printing of fields and arrays for diagnostics.

use crate::field::DisplacementField;

use std::fmt;

/// Options for [`FormatMatrix`], passed explicitly instead of held globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintOptions {
  /// Digits after the decimal point.
  pub precision: usize,
  /// Maximal characters per line before a row is wrapped.
  pub linewidth: usize,
  /// Print in fixed notation, with values too small for `precision` shown as zero.
  pub suppress: bool,
}
impl Default for PrintOptions {
  fn default() -> Self {
    Self {
      precision: 4,
      linewidth: 250,
      suppress: true,
    }
  }
}

impl PrintOptions {
  pub fn matrix<'a>(&self, matrix: &'a na::DMatrix<f64>) -> FormatMatrix<'a> {
    FormatMatrix {
      matrix,
      options: *self,
    }
  }

  pub fn field<'a>(&self, field: &'a DisplacementField) -> FormatField<'a> {
    FormatField {
      field,
      options: *self,
    }
  }

  fn entry(&self, v: f64) -> String {
    let precision = self.precision;
    if self.suppress {
      let threshold = 0.5 * 10f64.powi(-(precision as i32));
      let v = if v.abs() < threshold { 0.0 } else { v };
      format!("{v:.precision$}")
    } else {
      format!("{v:.precision$e}")
    }
  }
}

/// Rows of a matrix in brackets, entries right-aligned to a common width.
pub struct FormatMatrix<'a> {
  matrix: &'a na::DMatrix<f64>,
  options: PrintOptions,
}

impl fmt::Display for FormatMatrix<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let entries: Vec<Vec<String>> = self
      .matrix
      .row_iter()
      .map(|r| r.iter().map(|&v| self.options.entry(v)).collect())
      .collect();
    let width = entries.iter().flatten().map(String::len).max().unwrap_or(0);

    let nrows = entries.len();
    for (irow, row) in entries.iter().enumerate() {
      let open = if irow == 0 { "[[" } else { " [" };
      let mut line = String::from(open);
      for (icol, entry) in row.iter().enumerate() {
        let cell = format!("{entry:>width$}");
        if icol > 0 {
          if line.len() + 1 + cell.len() > self.options.linewidth {
            writeln!(f, "{line}")?;
            line = String::from("  ");
          } else {
            line.push(' ');
          }
        }
        line.push_str(&cell);
      }
      let close = if irow + 1 == nrows { "]]" } else { "]" };
      line.push_str(close);
      if irow + 1 == nrows {
        write!(f, "{line}")?;
      } else {
        writeln!(f, "{line}")?;
      }
    }
    if nrows == 0 {
      write!(f, "[]")?;
    }
    Ok(())
  }
}

/// A field in its flat `K x 3M` layout.
pub struct FormatField<'a> {
  field: &'a DisplacementField,
  options: PrintOptions,
}

impl fmt::Display for FormatField<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let flat = self.field.to_flat();
    write!(f, "{}", self.options.matrix(&flat))
  }
}

#[cfg(test)]
mod test {
  use super::PrintOptions;

  #[test]
  fn fixed_precision_and_suppression() {
    let m = na::DMatrix::from_row_slice(2, 2, &[1.0, -0.5, 1e-9, 12.25]);
    let s = PrintOptions::default().matrix(&m).to_string();
    assert_eq!(s, "[[ 1.0000 -0.5000]\n [ 0.0000 12.2500]]");
  }

  #[test]
  fn rows_wrap_at_linewidth() {
    let m = na::DMatrix::from_row_slice(1, 4, &[1.0, 2.0, 3.0, 4.0]);
    let options = PrintOptions {
      precision: 1,
      linewidth: 10,
      suppress: true,
    };
    let s = options.matrix(&m).to_string();
    assert_eq!(s, "[[1.0 2.0\n  3.0 4.0]]");
  }
}
