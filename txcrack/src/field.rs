//! Arithmetic modulo a prime number.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};

use crate::error::{Error, Result};

/// A prime field `F_p`.
///
/// The field hands out [`FieldElement`]s; all arithmetic on them reduces into
/// the canonical range `[0, p)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    p: BigInt,
}

impl Field {
    pub fn new(p: impl Into<BigInt>) -> Field {
        let p = p.into();
        assert!(p > BigInt::one(), "modulus must be at least 2");

        Field { p }
    }

    pub fn prime(&self) -> &BigInt {
        &self.p
    }

    /// The number of bytes needed to hold a canonical element.
    pub fn byte_len(&self) -> usize {
        ((self.p.bits() + 7) / 8) as usize
    }

    pub fn elem(&self, value: impl Into<BigInt>) -> FieldElement {
        FieldElement {
            value: value.into().mod_floor(&self.p),
            p: self.p.clone(),
        }
    }

    /// Interpret big-endian bytes as an integer and reduce it into the field.
    pub fn from_bytes_be(&self, bytes: &[u8]) -> FieldElement {
        self.elem(BigInt::from_bytes_be(num_bigint::Sign::Plus, bytes))
    }

    /// The additive identity.
    pub fn zero(&self) -> FieldElement {
        self.elem(0)
    }

    /// The multiplicative identity.
    pub fn one(&self) -> FieldElement {
        self.elem(1)
    }
}

/// A canonical value in `[0, p)` for some prime `p`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldElement {
    value: BigInt,
    p: BigInt,
}

impl FieldElement {
    pub fn num(&self) -> &BigInt {
        &self.value
    }

    pub fn into_bigint(self) -> BigInt {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// The parity of the canonical representative, used to select between the
    /// two square roots of a value.
    pub fn parity(&self) -> u8 {
        if self.value.is_odd() {
            1
        } else {
            0
        }
    }

    /// Big-endian bytes, left-padded to `len`.
    pub fn to_bytes_be(&self, len: usize) -> Vec<u8> {
        let (_, bytes) = self.value.to_bytes_be();
        assert!(bytes.len() <= len, "value does not fit in {} bytes", len);

        let mut out = vec![0u8; len - bytes.len()];
        out.extend_from_slice(&bytes);
        out
    }

    fn scaled(&self, k: u32) -> FieldElement {
        FieldElement {
            value: (&self.value * k).mod_floor(&self.p),
            p: self.p.clone(),
        }
    }

    /// The multiplicative inverse, by the extended Euclidean algorithm.
    pub fn inv(&self) -> Result<FieldElement> {
        if self.value.is_zero() {
            return Err(Error::DivisionByZero);
        }

        let (mut a, mut b) = (self.value.clone(), self.p.clone());
        let (mut prevx, mut x) = (BigInt::one(), BigInt::zero());
        while !b.is_zero() {
            let q = &a / &b;
            let next_x = &prevx - &q * &x;
            prevx = std::mem::replace(&mut x, next_x);
            let next_b = &a % &b;
            a = std::mem::replace(&mut b, next_b);
        }

        Ok(FieldElement {
            value: prevx.mod_floor(&self.p),
            p: self.p.clone(),
        })
    }

    pub fn div(&self, rhs: &FieldElement) -> Result<FieldElement> {
        Ok(self * &rhs.inv()?)
    }

    /// Square-and-multiply exponentiation; `exponent` must be non-negative.
    pub fn pow(&self, exponent: &BigInt) -> FieldElement {
        FieldElement {
            value: self.value.modpow(exponent, &self.p),
            p: self.p.clone(),
        }
    }

    /// Whether the value is a quadratic residue (Legendre symbol is one).
    pub fn is_square(&self) -> bool {
        let e = (&self.p - BigInt::one()) / BigInt::from(2);
        self.pow(&e).value.is_one()
    }

    /// The square root whose parity equals `parity`, or `None` when the value
    /// is not a quadratic residue.
    ///
    /// Only the `p % 8` cases 3, 5 and 7 are handled; the remaining case
    /// would need Tonelli-Shanks and is reported as unimplemented.
    pub fn sqrt(&self, parity: u8) -> Result<Option<FieldElement>> {
        if self.value.is_zero() {
            return Ok(Some(self.clone()));
        }

        let one = BigInt::one();
        let root = match (&self.p % BigInt::from(8)).to_u8().unwrap_or(0) {
            3 | 7 => self.pow(&((&self.p + &one) / 4)),
            5 => {
                let x = self.pow(&((&self.p + &one) / 4));
                if x.value.is_one() {
                    self.pow(&((&self.p + BigInt::from(3)) / 8))
                } else {
                    let four_a = self.scaled(4);
                    let two_a = self.scaled(2);
                    &four_a.pow(&((&self.p - BigInt::from(5)) / 8)) * &two_a
                }
            }
            _ => return Err(Error::SqrtUnimplemented),
        };

        if &root * &root != *self {
            return Ok(None);
        }

        if root.parity() == parity & 1 {
            Ok(Some(root))
        } else {
            Ok(Some(-&root))
        }
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.value)
    }
}

impl Add<&FieldElement> for &FieldElement {
    type Output = FieldElement;

    fn add(self, rhs: &FieldElement) -> FieldElement {
        debug_assert_eq!(self.p, rhs.p, "field mismatch");

        FieldElement {
            value: (&self.value + &rhs.value).mod_floor(&self.p),
            p: self.p.clone(),
        }
    }
}

impl Sub<&FieldElement> for &FieldElement {
    type Output = FieldElement;

    fn sub(self, rhs: &FieldElement) -> FieldElement {
        debug_assert_eq!(self.p, rhs.p, "field mismatch");

        FieldElement {
            value: (&self.value - &rhs.value).mod_floor(&self.p),
            p: self.p.clone(),
        }
    }
}

impl Mul<&FieldElement> for &FieldElement {
    type Output = FieldElement;

    fn mul(self, rhs: &FieldElement) -> FieldElement {
        debug_assert_eq!(self.p, rhs.p, "field mismatch");

        FieldElement {
            value: (&self.value * &rhs.value).mod_floor(&self.p),
            p: self.p.clone(),
        }
    }
}

impl Neg for &FieldElement {
    type Output = FieldElement;

    fn neg(self) -> FieldElement {
        FieldElement {
            value: (-&self.value).mod_floor(&self.p),
            p: self.p.clone(),
        }
    }
}
