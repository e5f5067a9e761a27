//! Observation Cache (component C).
//!
//! Eagerly materialises a [`crate::algebra::MessageExpr`] into an
//! [`Observation`] at insertion time, the same "evaluate once, store the
//! result, never touch the generator again" discipline as the original
//! implementation's `_cacher` wrapper. The Search Engine (`search.rs`)
//! traverses an observation's candidates once per `(init, poly, dir)`
//! combination; re-running `expand()` for every pass would be prohibitive.

#![forbid(unsafe_code)]

use crate::algebra::{Candidate, MessageExpr};
use crate::error::SolverError;

/// One materialised `(candidates, target, width)` observation, immutable
/// for its whole lifetime.
#[derive(Clone, Debug)]
pub struct Observation {
    /// Every candidate byte sequence the source expression expands to.
    pub candidates: Vec<Candidate>,
    /// The declared CRC this observation's real message is known to
    /// produce.
    pub target: u64,
    /// The word width shared by every leaf in the source expression.
    pub w: u32,
}

impl Observation {
    /// Validate and materialise `expr` against a solver configured for
    /// `order`-bit CRCs.
    ///
    /// Fails with [`SolverError::MissingTarget`] if `expr` has no `Target`
    /// node, [`SolverError::MisplacedTarget`] if a `Target` appears inside a
    /// `Repeat`/`Permute`/`Combine` subtree, [`SolverError::WidthConflict`]
    /// if leaves disagree on word width, or [`SolverError::OutOfRange`] if
    /// the declared target does not fit in `order` bits.
    pub fn from_expr(expr: &MessageExpr, order: u32) -> Result<Self, SolverError> {
        check_target_placement(expr, false)?;
        let w = check_width(expr)?;
        let target = expr.target_crc().ok_or(SolverError::MissingTarget)?;

        let mask = if order >= 64 { u64::MAX } else { (1u64 << order) - 1 };
        if target > mask {
            return Err(SolverError::OutOfRange("target", format!("{target:#x} exceeds {order}-bit range")));
        }

        Ok(Observation { candidates: expr.expand(), target, w })
    }
}

/// Reject `Target` nodes inside a `Repeat`/`Permute`/`Combine` subtree.
/// `restricted` is `true` once such a subtree has been entered; it never
/// relaxes back to `false` on the way down.
fn check_target_placement(expr: &MessageExpr, restricted: bool) -> Result<(), SolverError> {
    match expr {
        MessageExpr::Literal { .. } => Ok(()),
        MessageExpr::Target { .. } => {
            if restricted {
                Err(SolverError::MisplacedTarget)
            } else {
                Ok(())
            }
        }
        MessageExpr::Concat { a, b } => {
            check_target_placement(a, restricted)?;
            check_target_placement(b, restricted)
        }
        MessageExpr::Optional { a } => check_target_placement(a, restricted),
        MessageExpr::Repeat { a, .. } => check_target_placement(a, true),
        MessageExpr::Permute { values, .. } | MessageExpr::Combine { values, .. } => {
            values.iter().try_for_each(|v| check_target_placement(v, true))
        }
    }
}

/// Collect every leaf word width under `expr` and confirm they agree,
/// returning the shared width (`0` if the expression carries no `Literal`
/// leaf at all, e.g. a bare `Target`).
fn check_width(expr: &MessageExpr) -> Result<u32, SolverError> {
    let mut widths = Vec::new();
    collect_widths(expr, &mut widths);
    let Some(&first) = widths.first() else { return Ok(0) };
    for &w in &widths {
        if w != first {
            return Err(SolverError::WidthConflict { first, other: w });
        }
    }
    Ok(first)
}

fn collect_widths(expr: &MessageExpr, out: &mut Vec<u32>) {
    match expr {
        MessageExpr::Literal { w, .. } => out.push(*w),
        MessageExpr::Target { .. } => {}
        MessageExpr::Concat { a, b } => {
            collect_widths(a, out);
            collect_widths(b, out);
        }
        MessageExpr::Optional { a } | MessageExpr::Repeat { a, .. } => collect_widths(a, out),
        MessageExpr::Permute { values, .. } | MessageExpr::Combine { values, .. } => {
            for v in values {
                collect_widths(v, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{combine, concat, data, optional, permute, repeat, target};

    #[test]
    fn missing_target_is_rejected() {
        let expr = data(&[1, 2], 8);
        assert!(matches!(Observation::from_expr(&expr, 8), Err(SolverError::MissingTarget)));
    }

    #[test]
    fn width_conflict_is_rejected() {
        let expr = concat(data(&[1], 8), concat(data(&[2], 16), target(0)));
        assert!(matches!(Observation::from_expr(&expr, 16), Err(SolverError::WidthConflict { .. })));
    }

    #[test]
    fn target_out_of_range_is_rejected() {
        let expr = concat(data(&[1], 8), target(0x1ff));
        assert!(matches!(Observation::from_expr(&expr, 8), Err(SolverError::OutOfRange(..))));
    }

    #[test]
    fn misplaced_target_inside_repeat_is_rejected() {
        let expr = repeat(target(0xaa), 1, 1);
        assert!(matches!(check_target_placement(&expr, false), Err(SolverError::MisplacedTarget)));
    }

    #[test]
    fn misplaced_target_inside_permute_is_rejected() {
        let expr = permute(vec![data(&[1], 8), target(0xaa)], 1, 2);
        assert!(matches!(check_target_placement(&expr, false), Err(SolverError::MisplacedTarget)));
    }

    #[test]
    fn misplaced_target_inside_combine_is_rejected() {
        let expr = combine(vec![data(&[1], 8), target(0xaa)], 1, 2);
        assert!(matches!(check_target_placement(&expr, false), Err(SolverError::MisplacedTarget)));
    }

    #[test]
    fn target_on_spine_through_optional_is_accepted() {
        let expr = concat(data(&[1], 8), optional(target(0xaa)));
        assert!(check_target_placement(&expr, false).is_ok());
    }

    #[test]
    fn valid_observation_materialises_candidates() {
        let expr = concat(data(&[0x41], 8), target(0x5e));
        let obs = Observation::from_expr(&expr, 8).unwrap();
        assert_eq!(obs.target, 0x5e);
        assert_eq!(obs.w, 8);
        assert_eq!(obs.candidates, vec![vec![0x41]]);
    }
}
