//! Points on a short Weierstrass curve `y^2 = x^3 + a*x + b`.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, Zero};

use crate::error::{Error, Result};
use crate::field::{Field, FieldElement};

/// A point on the curve: either the group identity or an affine pair.
///
/// The identity is a dedicated variant rather than a magic coordinate pair,
/// since `(0, 0)` is a legitimate affine point on some curves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Point {
    Infinity,
    Affine { x: FieldElement, y: FieldElement },
}

impl Point {
    pub fn is_infinity(&self) -> bool {
        matches!(self, Point::Infinity)
    }

    pub fn x(&self) -> Option<&FieldElement> {
        match self {
            Point::Infinity => None,
            Point::Affine { x, .. } => Some(x),
        }
    }

    pub fn y(&self) -> Option<&FieldElement> {
        match self {
            Point::Infinity => None,
            Point::Affine { y, .. } => Some(y),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Curve {
    field: Field,
    a: FieldElement,
    b: FieldElement,
}

impl Curve {
    pub fn new(field: Field, a: impl Into<BigInt>, b: impl Into<BigInt>) -> Curve {
        let a = field.elem(a);
        let b = field.elem(b);

        Curve { field, a, b }
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn point(&self, x: impl Into<BigInt>, y: impl Into<BigInt>) -> Point {
        Point::Affine {
            x: self.field.elem(x),
            y: self.field.elem(y),
        }
    }

    pub fn contains(&self, point: &Point) -> bool {
        match point {
            Point::Infinity => true,
            Point::Affine { x, y } => y * y == self.equation_rhs(x),
        }
    }

    fn equation_rhs(&self, x: &FieldElement) -> FieldElement {
        &(&(&(x * x) * x) + &(&self.a * x)) + &self.b
    }

    pub fn neg(&self, point: &Point) -> Point {
        match point {
            Point::Infinity => Point::Infinity,
            Point::Affine { x, y } => Point::Affine {
                x: x.clone(),
                y: -y,
            },
        }
    }

    pub fn add(&self, p: &Point, q: &Point) -> Point {
        let (px, py) = match p {
            Point::Infinity => return q.clone(),
            Point::Affine { x, y } => (x, y),
        };
        let (qx, qy) = match q {
            Point::Infinity => return p.clone(),
            Point::Affine { x, y } => (x, y),
        };

        // The slope of the line through both points; for a doubling, the
        // tangent. A vertical line means the sum is the identity.
        let l = if px == qx {
            if py == qy && !py.is_zero() {
                let three = self.field.elem(3);
                let numerator = &(&three * &(px * px)) + &self.a;
                numerator
                    .div(&(py + py))
                    .expect("doubling denominator is nonzero")
            } else {
                return Point::Infinity;
            }
        } else {
            (py - qy)
                .div(&(px - qx))
                .expect("chord denominator is nonzero")
        };

        let x = &(&l * &l) - &(px + qx);
        let y = &(&l * &(px - &x)) - py;
        Point::Affine { x, y }
    }

    pub fn sub(&self, p: &Point, q: &Point) -> Point {
        self.add(p, &self.neg(q))
    }

    /// Double-and-add over the binary expansion of `|scalar|`; a negative
    /// scalar multiplies by the absolute value and negates the result.
    pub fn mul(&self, point: &Point, scalar: &BigInt) -> Point {
        let negate = scalar.is_negative();
        let mut remaining = scalar.abs();
        let mut accumulator = Point::Infinity;
        let mut shifter = point.clone();

        while !remaining.is_zero() {
            if remaining.is_odd() {
                accumulator = self.add(&accumulator, &shifter);
            }
            shifter = self.add(&shifter, &shifter);
            remaining >>= 1;
        }

        if negate {
            self.neg(&accumulator)
        } else {
            accumulator
        }
    }

    /// Recover the point with the given x coordinate whose y has parity
    /// `parity`; fails when `x^3 + a*x + b` has no square root.
    pub fn decompress(&self, x: &BigInt, parity: u8) -> Result<Point> {
        let x = self.field.elem(x.clone());
        let y = self
            .equation_rhs(&x)
            .sqrt(parity)?
            .ok_or(Error::NotOnCurve)?;

        Ok(Point::Affine { x, y })
    }

    /// Decode a SEC1 public key: 33 compressed bytes (`02|03 || x`) or 65
    /// uncompressed bytes (`04 || x || y`).
    pub fn decode_point(&self, bytes: &[u8]) -> Result<Point> {
        if bytes.len() == 33 && (bytes[0] == 2 || bytes[0] == 3) {
            let x = BigInt::from_bytes_be(num_bigint::Sign::Plus, &bytes[1..]);
            self.decompress(&x, bytes[0] - 2)
        } else if bytes.len() == 65 && bytes[0] == 4 {
            let point = Point::Affine {
                x: self.field.from_bytes_be(&bytes[1..33]),
                y: self.field.from_bytes_be(&bytes[33..]),
            };
            if !self.contains(&point) {
                return Err(Error::NotOnCurve);
            }
            Ok(point)
        } else {
            Err(Error::NotOnCurve)
        }
    }

    /// Encode a point in SEC1 form; the identity has no encoding.
    pub fn encode_point(&self, point: &Point, compressed: bool) -> Option<Vec<u8>> {
        let (x, y) = match point {
            Point::Infinity => return None,
            Point::Affine { x, y } => (x, y),
        };

        let len = self.field.byte_len();
        let mut out = Vec::with_capacity(1 + 2 * len);
        if compressed {
            out.push(2 + y.parity());
            out.extend_from_slice(&x.to_bytes_be(len));
        } else {
            out.push(4);
            out.extend_from_slice(&x.to_bytes_be(len));
            out.extend_from_slice(&y.to_bytes_be(len));
        }

        Some(out)
    }
}
