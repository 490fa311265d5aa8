//! Total ordering for table cells.
//!
//! Each column holds a single declared type, so comparisons only need to be
//! meaningful within a type:
//!
//! - numbers ascending (`f64::total_cmp`, so NaN cannot break the order)
//! - strings lexicographically by byte
//! - dates chronologically
//! - booleans `false` before `true`
//!
//! Absent cells sort after every present value.

use std::cmp::Ordering;

use crate::table::{Cell, Scalar};

/// Compare two cells, placing absent values last.
pub fn compare_cells(a: &Cell, b: &Cell) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare_scalars(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_scalars(a: &Scalar, b: &Scalar) -> Ordering {
    match (a, b) {
        (Scalar::Number(x), Scalar::Number(y)) => x.total_cmp(y),
        (Scalar::String(x), Scalar::String(y)) => x.cmp(y),
        (Scalar::Date(x), Scalar::Date(y)) => x.cmp(y),
        (Scalar::Boolean(x), Scalar::Boolean(y)) => x.cmp(y),
        // Mixed types never share a column; fall back to a fixed type rank.
        _ => rank(a).cmp(&rank(b)),
    }
}

fn rank(s: &Scalar) -> u8 {
    match s {
        Scalar::Boolean(_) => 0,
        Scalar::Number(_) => 1,
        Scalar::Date(_) => 2,
        Scalar::String(_) => 3,
    }
}
