//! Elementwise transform vocabulary.

use serde::{Deserialize, Serialize};

use scella_core::RealizedMatrix;

/// One recorded elementwise transform.
///
/// Transforms act on *stored* nonzeros only; zeros stay implicit. This
/// matches how the preprocessing steps they stand in for are applied to
/// sparse expression data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransformOp {
    /// Multiply every stored value by a scalar.
    Scale(f64),
    /// Add a scalar to every stored value.
    Shift(f64),
    /// `ln(1 + v)` on every stored value.
    Log1p,
    /// Scale each row so its stored values sum to `target_sum`. Rows
    /// whose sum is zero are left untouched. Factors are computed from
    /// the realized window, so the result depends on the columns in
    /// scope at realization time.
    NormalizeTotal {
        /// Desired per-row total after scaling.
        target_sum: f64,
    },
}

impl TransformOp {
    /// Apply this transform to a realized matrix in place.
    pub fn apply(&self, matrix: &mut RealizedMatrix) {
        match self {
            Self::Scale(factor) => {
                let factor = *factor;
                matrix.map_values(|v| v * factor);
            }
            Self::Shift(offset) => {
                let offset = *offset;
                matrix.map_values(|v| v + offset);
            }
            Self::Log1p => matrix.map_values(f64::ln_1p),
            Self::NormalizeTotal { target_sum } => {
                let factors: Vec<f64> = matrix
                    .row_sums()
                    .iter()
                    .map(|&sum| if sum == 0.0 { 1.0 } else { target_sum / sum })
                    .collect();
                matrix.scale_rows(&factors);
            }
        }
    }

    /// Whether this transform is an affine map `v -> a*v + b` on stored
    /// values, making it fusible with adjacent affine transforms.
    pub fn as_affine(&self) -> Option<(f64, f64)> {
        match self {
            Self::Scale(factor) => Some((*factor, 0.0)),
            Self::Shift(offset) => Some((1.0, *offset)),
            Self::Log1p | Self::NormalizeTotal { .. } => None,
        }
    }
}

impl std::fmt::Display for TransformOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scale(factor) => write!(f, "Scale({factor})"),
            Self::Shift(offset) => write!(f, "Shift({offset})"),
            Self::Log1p => write!(f, "Log1p"),
            Self::NormalizeTotal { target_sum } => write!(f, "NormalizeTotal({target_sum})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scella_core::MatrixEntry;

    fn matrix() -> RealizedMatrix {
        RealizedMatrix::new(
            vec![0, 1],
            vec![0, 1],
            vec![
                MatrixEntry {
                    row: 0,
                    col: 0,
                    value: 2.0,
                },
                MatrixEntry {
                    row: 0,
                    col: 1,
                    value: 6.0,
                },
                MatrixEntry {
                    row: 1,
                    col: 1,
                    value: 4.0,
                },
            ],
        )
    }

    #[test]
    fn test_scale_and_shift() {
        let mut m = matrix();
        TransformOp::Scale(2.0).apply(&mut m);
        TransformOp::Shift(1.0).apply(&mut m);
        let values: Vec<f64> = m.entries().iter().map(|e| e.value).collect();
        assert_eq!(values, vec![5.0, 13.0, 9.0]);
    }

    #[test]
    fn test_normalize_total() {
        let mut m = matrix();
        TransformOp::NormalizeTotal { target_sum: 10.0 }.apply(&mut m);
        assert_eq!(m.row_sums(), vec![10.0, 10.0]);
    }

    #[test]
    fn test_normalize_total_leaves_zero_rows() {
        let mut m = RealizedMatrix::new(
            vec![0, 1],
            vec![0],
            vec![MatrixEntry {
                row: 0,
                col: 0,
                value: 5.0,
            }],
        );
        TransformOp::NormalizeTotal { target_sum: 1.0 }.apply(&mut m);
        assert_eq!(m.row_sums(), vec![1.0, 0.0]);
    }
}
