//! Unified error taxonomy for the solver.
//!
//! Construction and configuration errors are surfaced eagerly, as a single
//! `thiserror`-derived enum, the same way the teacher's streaming module
//! reports `StreamError`: one `#[error("...")]` variant per failure mode,
//! struct-style variants where more than one field is needed.

#![forbid(unsafe_code)]

/// Errors surfaced by the solver's construction, configuration, and search
/// entry points. Search itself never fails: an empty result set is a valid
/// outcome, not an error.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// An observation was built from an expression with no `Target` node.
    #[error("observation has no Target node declaring the expected CRC")]
    MissingTarget,

    /// Two leaves under one observation disagree on their word width.
    #[error("word width conflict: expression mixes width {first} with width {other}")]
    WidthConflict {
        /// The width of the first leaf encountered.
        first: u32,
        /// The width of a later leaf that disagreed.
        other: u32,
    },

    /// A `Target` node appeared somewhere other than directly on the
    /// top-level `Concat` spine (e.g. inside a `Permute`/`Combine`/`Repeat`
    /// subtree).
    #[error("Target node must appear only on the top-level Concat spine")]
    MisplacedTarget,

    /// A declared `target`, `poly`, `init`, `post`, or `order` fell outside
    /// its valid range, or a search-configuration set was left at the
    /// infeasible full-enumeration default for `order > 16`.
    #[error("{0} is out of range: {1}")]
    OutOfRange(&'static str, String),

    /// A worker thread hit an internal invariant violation (a bug, not a
    /// search miss). Aborts the whole `solve()` call.
    #[error("worker fault in (poly={poly:#x}, dir={dir:?}): {message}")]
    WorkerFault {
        /// The polynomial the failing worker was searching.
        poly: u64,
        /// The direction the failing worker was searching.
        dir: crate::crc::Direction,
        /// A description of the invariant that was violated.
        message: String,
    },
}
