//! Signing, verification and the recovery tricks that make nonce reuse fatal.

use num_bigint::{BigInt, Sign};
use num_integer::Integer;

use crate::curve::{Curve, Point};
use crate::error::{Error, Result};
use crate::field::{Field, FieldElement};

/// ECDSA over a curve with generator `G` of order `n`.
///
/// Scalars live in the field `F_n`, which is distinct from the coordinate
/// field of the curve; every scalar argument is reduced modulo `n` before
/// use.
#[derive(Clone, Debug)]
pub struct Ecdsa {
    curve: Curve,
    g: Point,
    scalar_field: Field,
}

/// The secp256k1 instance: `y^2 = x^3 + 7` over
/// `p = 2^256 - 2^32 - 977`, with the standard generator of order
/// `n = 2^256 - 432420386565659656852420866394968145599`.
pub fn secp256k1() -> Ecdsa {
    let one = BigInt::from(1);
    let p = (&one << 256) - (&one << 32) - 977;
    let n = (&one << 256)
        - "432420386565659656852420866394968145599"
            .parse::<BigInt>()
            .expect("order offset is a valid decimal literal");

    let curve = Curve::new(Field::new(p), 0, 7);
    let g = curve.point(
        BigInt::parse_bytes(
            b"79BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798",
            16,
        )
        .expect("generator x is valid hex"),
        BigInt::parse_bytes(
            b"483ADA7726A3C4655DA4FBFC0E1108A8FD17B448A68554199C47D08FFB10D4B8",
            16,
        )
        .expect("generator y is valid hex"),
    );

    Ecdsa::new(curve, g, n)
}

impl Ecdsa {
    pub fn new(curve: Curve, g: Point, n: BigInt) -> Ecdsa {
        debug_assert!(curve.contains(&g));

        Ecdsa {
            curve,
            g,
            scalar_field: Field::new(n),
        }
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    pub fn generator(&self) -> &Point {
        &self.g
    }

    /// The group order `n`.
    pub fn order(&self) -> &BigInt {
        self.scalar_field.prime()
    }

    fn scalar(&self, value: &BigInt) -> FieldElement {
        self.scalar_field.elem(value.clone())
    }

    /// The public key `G·x` for a private key `x`.
    pub fn public_key(&self, x: &BigInt) -> Point {
        self.curve.mul(&self.g, self.scalar(x).num())
    }

    /// Sign message digest `m` with private key `x` and nonce `k`:
    /// `r = (G·k).x mod n`, `s = (m + x·r) / k mod n`.
    ///
    /// The nonce is supplied by the caller; this engine never generates one.
    pub fn sign(&self, m: &BigInt, x: &BigInt, k: &BigInt) -> Result<(BigInt, BigInt)> {
        let k = self.scalar(k);
        let big_r = self.curve.mul(&self.g, k.num());
        let r = match big_r.x() {
            Some(x) => self.scalar(x.num()),
            None => return Err(Error::DivisionByZero),
        };

        let s = (&self.scalar(m) + &(&self.scalar(x) * &r)).div(&k)?;

        Ok((r.into_bigint(), s.into_bigint()))
    }

    /// Check that `(G·(m/s) + Y·(r/s)).x mod n == r`.
    pub fn verify(&self, m: &BigInt, pubkey: &Point, r: &BigInt, s: &BigInt) -> Result<bool> {
        let m = self.scalar(m);
        let r = self.scalar(r);
        let s = self.scalar(s);

        let u1 = m.div(&s)?;
        let u2 = r.div(&s)?;
        let big_r = self.curve.add(
            &self.curve.mul(&self.g, u1.num()),
            &self.curve.mul(pubkey, u2.num()),
        );

        Ok(match big_r.x() {
            Some(x) => self.scalar(x.num()) == r,
            None => false,
        })
    }

    /// Recover a candidate public key from a single signature:
    /// `Y = R·(s/r) - G·(m/r)` where `R` is `r` decompressed on the curve.
    ///
    /// `r` is interpreted as an x coordinate in the *coordinate* field, and
    /// two candidates exist per signature; `parity` selects one.
    pub fn findpk(&self, m: &BigInt, r: &BigInt, s: &BigInt, parity: u8) -> Result<Point> {
        let big_r = self.curve.decompress(r, parity)?;

        let m = self.scalar(m);
        let r = self.scalar(r);
        let s = self.scalar(s);

        let u1 = s.div(&r)?;
        let u2 = m.div(&r)?;
        Ok(self.curve.sub(
            &self.curve.mul(&big_r, u1.num()),
            &self.curve.mul(&self.g, u2.num()),
        ))
    }

    /// Recover the public key from two signatures over the *same* message:
    /// `Y = (R1·s1 - R2·s2) / (r1 - r2)`.
    pub fn findpk2(
        &self,
        r1: &BigInt,
        s1: &BigInt,
        r2: &BigInt,
        s2: &BigInt,
        parity1: u8,
        parity2: u8,
    ) -> Result<Point> {
        let big_r1 = self.curve.decompress(r1, parity1)?;
        let big_r2 = self.curve.decompress(r2, parity2)?;

        let rdiff_inv = (&self.scalar(r1) - &self.scalar(r2)).inv()?;
        let diff = self.curve.sub(
            &self.curve.mul(&big_r1, self.scalar(s1).num()),
            &self.curve.mul(&big_r2, self.scalar(s2).num()),
        );

        Ok(self.curve.mul(&diff, rdiff_inv.num()))
    }

    /// Recover the nonce used for a known private key: `k = (m + x·r) / s`.
    pub fn find_k(&self, m: &BigInt, x: &BigInt, r: &BigInt, s: &BigInt) -> Result<BigInt> {
        let numerator = &self.scalar(m) + &(&self.scalar(x) * &self.scalar(r));

        Ok(numerator.div(&self.scalar(s))?.into_bigint())
    }

    /// Recover the private key from a signature with known nonce:
    /// `x = (s·k - m) / r`.
    pub fn crack1(&self, r: &BigInt, s: &BigInt, m: &BigInt, k: &BigInt) -> Result<BigInt> {
        let numerator = &(&self.scalar(s) * &self.scalar(k)) - &self.scalar(m);

        Ok(numerator.div(&self.scalar(r))?.into_bigint())
    }

    /// Recover nonce and private key from two signatures sharing `r`:
    /// `k = (m1 - m2) / (s1 - s2)`, then `x` by [`Ecdsa::crack1`].
    ///
    /// Both signatures are back-substituted; a disagreement means the pair
    /// does not actually share a nonce.
    pub fn crack2(
        &self,
        r: &BigInt,
        s1: &BigInt,
        s2: &BigInt,
        m1: &BigInt,
        m2: &BigInt,
    ) -> Result<(BigInt, BigInt)> {
        let sdelta = &self.scalar(s1) - &self.scalar(s2);
        let mdelta = &self.scalar(m1) - &self.scalar(m2);

        let k = mdelta.div(&sdelta)?.into_bigint();
        let x1 = self.crack1(r, s1, m1, &k)?;
        let x2 = self.crack1(r, s2, m2, &k)?;

        if x1 != x2 {
            return Err(Error::CrackMismatch);
        }

        Ok((k, x1))
    }
}

/// A 256-bit scalar from big-endian bytes, without reduction.
pub fn scalar_from_bytes(bytes: &[u8]) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, bytes)
}

/// Big-endian bytes of `value mod n`, left-padded to 32 bytes.
pub fn scalar_to_bytes(value: &BigInt, n: &BigInt) -> [u8; 32] {
    let (_, bytes) = value.mod_floor(n).to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}
