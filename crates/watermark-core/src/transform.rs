//! Transform classification
//!
//! Watermarks are usually stamped diagonally across the page. Body text
//! and images are placed with axis-aligned matrices (`b` and `c` near zero),
//! so a rotated or skewed `cm`/`Tm` is the main geometric signal.

use crate::lexer::{Operation, TokenKind};

/// Default limit for `|b|` and `|c|` before a matrix counts as rotated
pub const DEFAULT_ROTATION_TOLERANCE: f64 = 0.05;

/// Affine transform `[a b c d e f]` as written by `cm` and `Tm`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// Read the six numeric operands of a `cm` or `Tm` operation.
    ///
    /// Returns `None` unless there are exactly six well-formed numbers.
    pub fn from_operation(src: &[u8], op: &Operation) -> Option<Self> {
        if op.operands.len() != 6 {
            return None;
        }
        let mut values = [0.0f64; 6];
        for (slot, token) in values.iter_mut().zip(&op.operands) {
            if token.kind != TokenKind::Number {
                return None;
            }
            *slot = parse_number(token.bytes(src))?;
        }
        let [a, b, c, d, e, f] = values;
        Some(Self { a, b, c, d, e, f })
    }

    /// True when the off-diagonal terms exceed `tolerance`
    pub fn is_skewed(&self, tolerance: f64) -> bool {
        self.b.abs() > tolerance || self.c.abs() > tolerance
    }
}

/// Parse a PDF number: optional sign, digits, optional point with digits on
/// either side (`.5`, `5.`, `-3.25`). No exponents.
pub fn parse_number(bytes: &[u8]) -> Option<f64> {
    let (negative, body) = match bytes.first()? {
        b'-' => (true, &bytes[1..]),
        b'+' => (false, &bytes[1..]),
        _ => (false, bytes),
    };

    let (int_part, frac_part) = match body.iter().position(|&b| b == b'.') {
        Some(p) => (&body[..p], &body[p + 1..]),
        None => (body, &[][..]),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.iter().chain(frac_part).all(u8::is_ascii_digit) {
        return None;
    }

    let int_str = std::str::from_utf8(int_part).ok()?;
    let frac_str = std::str::from_utf8(frac_part).ok()?;
    let normalized = format!(
        "{}.{}",
        if int_str.is_empty() { "0" } else { int_str },
        if frac_str.is_empty() { "0" } else { frac_str }
    );
    let value: f64 = normalized.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// True if any `cm` or `Tm` among `ops` carries a skewed matrix.
///
/// Operations whose operands do not form a valid matrix are ignored.
pub fn has_skewed_transform(src: &[u8], ops: &[Operation], tolerance: f64) -> bool {
    ops.iter()
        .filter(|op| op.is("cm") || op.is("Tm"))
        .filter_map(|op| Matrix::from_operation(src, op))
        .any(|m| m.is_skewed(tolerance))
}
