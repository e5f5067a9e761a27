//! Symbolic message algebra (component B).
//!
//! A [`MessageExpr`] is a tagged sum type — one variant per constructor, not
//! an open class hierarchy behind dynamic dispatch — whose `expand()` yields
//! the finite set of candidate byte sequences it stands for. Exact
//! enumeration semantics (order, cardinality, how `Optional`/`Repeat`/
//! `Permute`/`Combine` unroll) are transcribed from the original
//! implementation's `datatypes.py`; see the doc comment on each variant.
//!
//! `expand()` always returns a materialised `Vec<Candidate>` rather than a
//! lazy iterator: the rest of the crate only ever needs the materialised
//! form (the [`crate::cache::Observation`] this feeds is itself eager), so
//! an iterator-based `expand` would add indirection without buying anything.

#![forbid(unsafe_code)]

use std::ops::{Add, Mul, Not};

/// One candidate byte sequence enumerated from a [`MessageExpr`].
pub type Candidate = Vec<u64>;

/// A symbolic message expression.
///
/// Construct these with the free functions below ([`data`], [`target`],
/// [`concat`], [`optional`], [`repeat`], [`permute`], [`combine`]) rather
/// than the variants directly — the constructors normalise `lo > hi` the way
/// the spec requires.
#[derive(Clone, Debug)]
pub enum MessageExpr {
    /// A fixed sequence of byte words of a given bit width.
    ///
    /// `source` records which textual format (if any) produced this literal
    /// — purely a diagnostics aid surfaced in error messages; it plays no
    /// part in `expand`/`data_width`/`target_crc`.
    Literal { value: Candidate, w: u32, source: Option<Format> },
    /// A marker declaring the expected CRC for the enclosing expression.
    /// Contributes no payload bytes.
    Target { value: u64 },
    /// Cartesian-product concatenation of two sub-expressions.
    Concat { a: Box<MessageExpr>, b: Box<MessageExpr> },
    /// The empty candidate, then every candidate of the inner expression.
    Optional { a: Box<MessageExpr> },
    /// `k` independently drawn candidates concatenated, for `k` in `lo..=hi`
    /// ascending.
    Repeat { a: Box<MessageExpr>, lo: usize, hi: usize },
    /// Every ordered `r`-permutation of the children, for `r` in `lo..=hi`.
    Permute { values: Vec<MessageExpr>, lo: usize, hi: usize },
    /// Every order-preserving `r`-subset of the children, for `r` in
    /// `lo..=hi`.
    Combine { values: Vec<MessageExpr>, lo: usize, hi: usize },
}

impl MessageExpr {
    /// Enumerate every candidate this expression stands for.
    pub fn expand(&self) -> Vec<Candidate> {
        match self {
            MessageExpr::Literal { value, .. } => vec![value.clone()],
            MessageExpr::Target { .. } => vec![Vec::new()],
            MessageExpr::Concat { a, b } => {
                let bx = b.expand();
                let mut out = Vec::with_capacity(a_len_hint(&a.expand(), &bx));
                for ax in a.expand() {
                    for bv in &bx {
                        let mut c = ax.clone();
                        c.extend_from_slice(bv);
                        out.push(c);
                    }
                }
                out
            }
            MessageExpr::Optional { a } => {
                let mut out = vec![Vec::new()];
                out.extend(a.expand());
                out
            }
            MessageExpr::Repeat { a, lo, hi } => {
                let children = a.expand();
                let mut out = Vec::new();
                for k in *lo..=*hi {
                    if k == 0 {
                        out.push(Vec::new());
                        continue;
                    }
                    repeat_unroll(&children, k, &mut Vec::new(), &mut out);
                }
                out
            }
            MessageExpr::Permute { values, lo, hi } => {
                let expanded: Vec<Vec<Candidate>> = values.iter().map(|v| v.expand()).collect();
                let mut out = Vec::new();
                let idx: Vec<usize> = (0..values.len()).collect();
                for r in *lo..=*hi {
                    for perm in permutations(&idx, r) {
                        unroll_order(&expanded, &perm, &mut Vec::new(), &mut out);
                    }
                }
                out
            }
            MessageExpr::Combine { values, lo, hi } => {
                let expanded: Vec<Vec<Candidate>> = values.iter().map(|v| v.expand()).collect();
                let mut out = Vec::new();
                let idx: Vec<usize> = (0..values.len()).collect();
                for r in *lo..=*hi {
                    for combo in combinations(&idx, r) {
                        unroll_order(&expanded, &combo, &mut Vec::new(), &mut out);
                    }
                }
                out
            }
        }
    }

    /// The bit width shared by every leaf under this expression.
    ///
    /// Per spec, mixed widths are unsupported; callers that need to detect a
    /// conflict should use [`crate::cache::Observation::from_expr`], which
    /// walks the whole tree. This method alone just reports the width of the
    /// leftmost leaf, matching the original's (admittedly incomplete)
    /// `get_data_width`.
    pub fn data_width(&self) -> u32 {
        match self {
            MessageExpr::Literal { w, .. } => *w,
            MessageExpr::Target { .. } => 0,
            MessageExpr::Concat { a, b } => {
                let aw = a.data_width();
                if matches!(a.as_ref(), MessageExpr::Target { .. }) {
                    b.data_width()
                } else {
                    aw
                }
            }
            MessageExpr::Optional { a } | MessageExpr::Repeat { a, .. } => a.data_width(),
            MessageExpr::Permute { values, .. } | MessageExpr::Combine { values, .. } => {
                values.iter().map(|v| v.data_width()).find(|w| *w != 0).unwrap_or(0)
            }
        }
    }

    /// The declared target CRC, if any, under the left-to-right traversal
    /// `Concat(a, b) -> a then b`. The first `Target` found wins.
    pub fn target_crc(&self) -> Option<u64> {
        match self {
            MessageExpr::Literal { .. } => None,
            MessageExpr::Target { value } => Some(*value),
            MessageExpr::Concat { a, b } => a.target_crc().or_else(|| b.target_crc()),
            MessageExpr::Optional { a } | MessageExpr::Repeat { a, .. } => a.target_crc(),
            MessageExpr::Permute { values, .. } | MessageExpr::Combine { values, .. } => {
                values.iter().find_map(|v| v.target_crc())
            }
        }
    }
}

fn a_len_hint(ax: &[Candidate], bx: &[Candidate]) -> usize {
    ax.len().saturating_mul(bx.len())
}

fn repeat_unroll(children: &[Candidate], remaining: usize, acc: &mut Candidate, out: &mut Vec<Candidate>) {
    if remaining == 0 {
        out.push(acc.clone());
        return;
    }
    for c in children {
        let before = acc.len();
        acc.extend_from_slice(c);
        repeat_unroll(children, remaining - 1, acc, out);
        acc.truncate(before);
    }
}

fn unroll_order(expanded: &[Vec<Candidate>], order: &[usize], acc: &mut Candidate, out: &mut Vec<Candidate>) {
    match order.split_first() {
        None => out.push(acc.clone()),
        Some((&head, tail)) => {
            for c in &expanded[head] {
                let before = acc.len();
                acc.extend_from_slice(c);
                unroll_order(expanded, tail, acc, out);
                acc.truncate(before);
            }
        }
    }
}

/// Every ordered `r`-permutation of `items`, in lexicographic order of
/// (chosen index, remaining indices) — matches `itertools.permutations`.
fn permutations(items: &[usize], r: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if r == 0 {
        out.push(Vec::new());
        return out;
    }
    for (i, &it) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(i);
        for mut tail in permutations(&rest, r - 1) {
            tail.insert(0, it);
            out.push(tail);
        }
    }
    out
}

/// Every order-preserving `r`-subset of `items` — matches
/// `itertools.combinations`.
fn combinations(items: &[usize], r: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if r == 0 {
        out.push(Vec::new());
        return out;
    }
    if items.is_empty() || r > items.len() {
        return out;
    }
    let (&first, rest) = items.split_first().unwrap();
    for mut with_first in combinations(rest, r - 1) {
        with_first.insert(0, first);
        out.push(with_first);
    }
    out.extend(combinations(rest, r));
    out
}

fn normalise(lo: usize, hi: usize) -> (usize, usize) {
    if hi < lo {
        (lo, lo)
    } else {
        (lo, hi)
    }
}

// ============================================================================
// Constructors
// ============================================================================

/// A fixed sequence of byte words, already parsed to integers.
pub fn data(words: &[u64], w: u32) -> MessageExpr {
    MessageExpr::Literal { value: words.to_vec(), w, source: None }
}

/// Parse a textual literal per [`Format`] and build a [`data`] node.
pub fn data_from_text(text: &str, format: Format, w: u32) -> Result<MessageExpr, crate::error::SolverError> {
    let value = match format {
        Format::HexSpace => {
            let mut words = Vec::new();
            for group in text.split_whitespace() {
                let bytes = hex::decode(pad_even(group)).map_err(|e| {
                    crate::error::SolverError::OutOfRange("hex-space literal", format!("{group:?}: {e}"))
                })?;
                let mut v: u64 = 0;
                for b in bytes {
                    v = (v << 8) | b as u64;
                }
                words.push(v);
            }
            words
        }
        Format::IntegerList => {
            let mut words = Vec::new();
            for tok in text.split_whitespace() {
                let v = tok
                    .parse::<u64>()
                    .map_err(|e| crate::error::SolverError::OutOfRange("integer-list literal", format!("{tok:?}: {e}")))?;
                words.push(v);
            }
            words
        }
        Format::RawBytes => text.chars().map(|c| c as u64).collect(),
    };
    Ok(MessageExpr::Literal { value, w, source: Some(format) })
}

fn pad_even(s: &str) -> String {
    if s.len() % 2 == 0 {
        s.to_string()
    } else {
        format!("0{s}")
    }
}

/// A pre-parsed sequence of integers (the "integer-list" textual format is
/// just this with no parsing step).
pub fn data_from_ints(words: &[u64], w: u32) -> MessageExpr {
    MessageExpr::Literal { value: words.to_vec(), w, source: Some(Format::IntegerList) }
}

/// Which textual format produced a [`MessageExpr::Literal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// `"3 14 0A"` -> `(3, 20, 10)`: whitespace-separated hex groups.
    HexSpace,
    /// A pre-parsed sequence of integers; no parsing step.
    IntegerList,
    /// Each `char` taken as a word verbatim.
    RawBytes,
}

/// Declare the expected CRC for the enclosing expression.
pub fn target(value: u64) -> MessageExpr {
    MessageExpr::Target { value }
}

/// Concatenate two expressions (Cartesian product of their candidates, `a`
/// outer).
pub fn concat(a: MessageExpr, b: MessageExpr) -> MessageExpr {
    MessageExpr::Concat { a: Box::new(a), b: Box::new(b) }
}

/// Make an expression optional: yields the empty candidate first, then
/// every candidate of `a`.
pub fn optional(a: MessageExpr) -> MessageExpr {
    MessageExpr::Optional { a: Box::new(a) }
}

/// Repeat `a` between `lo` and `hi` times (inclusive); `hi < lo` is
/// normalised to `hi = lo`.
pub fn repeat(a: MessageExpr, lo: usize, hi: usize) -> MessageExpr {
    let (lo, hi) = normalise(lo, hi);
    MessageExpr::Repeat { a: Box::new(a), lo, hi }
}

/// Every ordered `r`-permutation of `values`, for `r` in `lo..=hi`.
pub fn permute(values: Vec<MessageExpr>, lo: usize, hi: usize) -> MessageExpr {
    let (lo, hi) = normalise(lo, hi);
    MessageExpr::Permute { values, lo, hi }
}

/// Every order-preserving `r`-subset of `values`, for `r` in `lo..=hi`.
pub fn combine(values: Vec<MessageExpr>, lo: usize, hi: usize) -> MessageExpr {
    let (lo, hi) = normalise(lo, hi);
    MessageExpr::Combine { values, lo, hi }
}

// ============================================================================
// Peripheral operator sugar (see SPEC_FULL.md §4.B) — thin convenience over
// the named constructors above; the solver and tests never rely on this.
// ============================================================================

impl Add for MessageExpr {
    type Output = MessageExpr;
    fn add(self, rhs: MessageExpr) -> MessageExpr {
        concat(self, rhs)
    }
}

impl Not for MessageExpr {
    type Output = MessageExpr;
    fn not(self) -> MessageExpr {
        optional(self)
    }
}

/// `a * n` is sugar for `repeat(a, n, n)`.
impl Mul<usize> for MessageExpr {
    type Output = MessageExpr;
    fn mul(self, n: usize) -> MessageExpr {
        repeat(self, n, n)
    }
}

/// `a * (lo, hi)` is sugar for `repeat(a, lo, hi)`.
impl Mul<(usize, usize)> for MessageExpr {
    type Output = MessageExpr;
    fn mul(self, (lo, hi): (usize, usize)) -> MessageExpr {
        repeat(self, lo, hi)
    }
}
