//! Transform fusion.
//!
//! Consecutive affine transforms (scale, shift) compose into a single
//! `v -> a*v + b` pass. Fusion is an optimization only: applying the
//! fused passes must produce the same values as applying the recorded
//! transforms one by one.

use log::debug;

use scella_core::RealizedMatrix;

use crate::transform::TransformOp;

/// One pass over the stored values after fusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusedPass {
    /// `v -> scale * v + shift`, the composition of one or more affine
    /// transforms.
    Affine {
        /// Multiplicative component.
        scale: f64,
        /// Additive component.
        shift: f64,
    },
    /// A transform that does not fuse.
    Op(TransformOp),
}

impl FusedPass {
    /// Apply this pass to a realized matrix in place.
    pub fn apply(&self, matrix: &mut RealizedMatrix) {
        match self {
            Self::Affine { scale, shift } => {
                let (a, b) = (*scale, *shift);
                matrix.map_values(|v| a * v + b);
            }
            Self::Op(op) => op.apply(matrix),
        }
    }
}

/// Fuse a transform sequence into the minimal pass list.
///
/// Runs of adjacent affine transforms collapse into one `Affine` pass;
/// identity compositions vanish entirely. Non-affine transforms break a
/// run and pass through unchanged, keeping declaration order.
pub fn fuse(ops: &[TransformOp]) -> Vec<FusedPass> {
    let mut passes = Vec::new();
    let mut pending: Option<(f64, f64)> = None;

    for op in ops {
        match op.as_affine() {
            Some((a, b)) => {
                // (v -> p*v + q) then (v -> a*v + b) is v -> a*p*v + a*q + b.
                pending = Some(match pending {
                    Some((p, q)) => (a * p, a * q + b),
                    None => (a, b),
                });
            }
            None => {
                flush_affine(&mut passes, pending.take());
                passes.push(FusedPass::Op(*op));
            }
        }
    }
    flush_affine(&mut passes, pending);

    if passes.len() < ops.len() {
        debug!("fused {} transforms into {} passes", ops.len(), passes.len());
    }
    passes
}

fn flush_affine(passes: &mut Vec<FusedPass>, pending: Option<(f64, f64)>) {
    if let Some((scale, shift)) = pending {
        if scale != 1.0 || shift != 0.0 {
            passes.push(FusedPass::Affine { scale, shift });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_affine_fuse() {
        let passes = fuse(&[TransformOp::Scale(2.0), TransformOp::Shift(3.0)]);
        assert_eq!(
            passes,
            vec![FusedPass::Affine {
                scale: 2.0,
                shift: 3.0
            }]
        );

        // Shift then scale: the scale multiplies the earlier shift.
        let passes = fuse(&[TransformOp::Shift(3.0), TransformOp::Scale(2.0)]);
        assert_eq!(
            passes,
            vec![FusedPass::Affine {
                scale: 2.0,
                shift: 6.0
            }]
        );
    }

    #[test]
    fn test_non_affine_breaks_the_run() {
        let passes = fuse(&[
            TransformOp::Scale(2.0),
            TransformOp::Log1p,
            TransformOp::Shift(1.0),
        ]);
        assert_eq!(
            passes,
            vec![
                FusedPass::Affine {
                    scale: 2.0,
                    shift: 0.0
                },
                FusedPass::Op(TransformOp::Log1p),
                FusedPass::Affine {
                    scale: 1.0,
                    shift: 1.0
                },
            ]
        );
    }

    #[test]
    fn test_identity_composition_vanishes() {
        let passes = fuse(&[TransformOp::Scale(2.0), TransformOp::Scale(0.5)]);
        assert!(passes.is_empty());
    }

    #[test]
    fn test_empty() {
        assert!(fuse(&[]).is_empty());
    }
}
