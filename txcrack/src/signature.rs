//! Decoding of the signature encodings found in scripts and witnesses.

use crate::encode::Reader;
use crate::error::{Error, Result};

pub const SIGHASH_ALL: u8 = 0x01;
pub const SIGHASH_NONE: u8 = 0x02;
pub const SIGHASH_SINGLE: u8 = 0x03;
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// What the low five bits of a hashtype select.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SighashMode {
    All,
    None,
    Single,
}

/// Split a hashtype byte into its mode and the `ANYONECANPAY` flag, rejecting
/// modes outside `ALL`/`NONE`/`SINGLE`.
pub fn sighash_mode(hashtype: u8) -> Result<(SighashMode, bool)> {
    let anyone_can_pay = hashtype & SIGHASH_ANYONECANPAY != 0;
    let mode = match hashtype & 0x1f {
        0x01 => SighashMode::All,
        0x02 => SighashMode::None,
        0x03 => SighashMode::Single,
        _ => return Err(Error::UnsupportedHashType(hashtype)),
    };

    Ok((mode, anyone_can_pay))
}

/// A signature reduced to the parts the cracker needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub hashtype: u8,
}

/// Extract `r`, `s` and the hashtype from signature bytes.
///
/// A payload of exactly 65 bytes is taken as the compact form
/// `r[32] || s[32] || hashtype`; anything else must be DER with a trailing
/// hashtype byte. A missing or zero hashtype becomes `SIGHASH_ALL`.
pub fn decode_signature(data: &[u8]) -> Result<DecodedSignature> {
    if data.len() == 0x41 {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&data[0..32]);
        s.copy_from_slice(&data[32..64]);
        return Ok(DecodedSignature {
            r,
            s,
            hashtype: data[64],
        });
    }

    let mut reader = Reader::new(data);
    if reader.read_u8()? != 0x30 {
        return Err(Error::BadSignature("missing sequence tag"));
    }
    let _total_len = reader.read_u8()?;

    if reader.read_u8()? != 0x02 {
        return Err(Error::BadSignature("missing r integer tag"));
    }
    let r_len = reader.read_u8()? as usize;
    let r_bytes = reader.read_bytes(r_len)?;

    if reader.read_u8()? != 0x02 {
        return Err(Error::BadSignature("missing s integer tag"));
    }
    let s_len = reader.read_u8()? as usize;
    let s_bytes = reader.read_bytes(s_len)?;

    let hashtype = match reader.read_u8() {
        Ok(0) | Err(_) => SIGHASH_ALL,
        Ok(hashtype) => hashtype,
    };

    Ok(DecodedSignature {
        r: left_pad_32(r_bytes),
        s: left_pad_32(s_bytes),
        hashtype,
    })
}

/// Normalize a DER integer to exactly 32 bytes: shorter values are
/// left-padded with zeros, longer ones (a leading sign byte) keep their last
/// 32 bytes.
fn left_pad_32(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    if bytes.len() >= 32 {
        out.copy_from_slice(&bytes[bytes.len() - 32..]);
    } else {
        out[32 - bytes.len()..].copy_from_slice(bytes);
    }
    out
}
