//! Address rendering for reports: base58check and bech32.

use crate::error::{Error, Result};
use crate::hashing::{hash160, sha256d};

const BASE58_ALPHABET: &[u8; 58] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const BECH32_ALPHABET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const BECH32_GENERATOR: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];
const BECH32_CONST: u32 = 1;

/// The version bytes and human readable part of one network; defaults to
/// Bitcoin mainnet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkParams {
    pub address_version: u8,
    pub wallet_version: u8,
    pub hrp: String,
}

impl Default for NetworkParams {
    fn default() -> Self {
        NetworkParams {
            address_version: 0,
            wallet_version: 128,
            hrp: "bc".to_string(),
        }
    }
}

/// Plain base58; leading zero bytes become leading `1`s.
pub fn base58_encode(data: &[u8]) -> String {
    let zeros = data.iter().take_while(|&&b| b == 0).count();

    let mut digits: Vec<u8> = Vec::new();
    for &byte in &data[zeros..] {
        let mut carry = byte as u32;
        for digit in &mut digits {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let mut out = String::with_capacity(zeros + digits.len());
    for _ in 0..zeros {
        out.push('1');
    }
    for &digit in digits.iter().rev() {
        out.push(BASE58_ALPHABET[digit as usize] as char);
    }
    out
}

pub fn base58_decode(encoded: &str) -> Result<Vec<u8>> {
    let zeros = encoded.chars().take_while(|&c| c == '1').count();

    let mut bytes: Vec<u8> = Vec::new();
    for c in encoded.chars() {
        let mut carry = BASE58_ALPHABET
            .iter()
            .position(|&a| a as char == c)
            .ok_or(Error::BadAddress("invalid base58 character"))?
            as u32;
        for byte in &mut bytes {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let significant = bytes.iter().rev().skip_while(|&&b| b == 0).count();
    let mut out = vec![0u8; zeros];
    out.extend(bytes[..significant].iter().rev());
    Ok(out)
}

/// Base58 over `version || payload || sha256d-checksum[4]`.
pub fn base58check_encode(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + 5);
    data.push(version);
    data.extend_from_slice(payload);
    let checksum = sha256d(&data);
    data.extend_from_slice(&checksum[..4]);
    base58_encode(&data)
}

pub fn base58check_decode(encoded: &str) -> Result<(u8, Vec<u8>)> {
    let data = base58_decode(encoded)?;
    if data.len() < 5 {
        return Err(Error::BadAddress("base58check payload too short"));
    }

    let (body, checksum) = data.split_at(data.len() - 4);
    if sha256d(body)[..4] != *checksum {
        return Err(Error::BadAddress("base58check checksum mismatch"));
    }

    Ok((body[0], body[1..].to_vec()))
}

/// The legacy pay-to-pubkey-hash address of a public key.
pub fn p2pkh_address(pubkey: &[u8], params: &NetworkParams) -> String {
    base58check_encode(params.address_version, &hash160(pubkey))
}

/// A private key in wallet import format (uncompressed flavour).
pub fn wif_encode(privkey: &[u8; 32], params: &NetworkParams) -> String {
    base58check_encode(params.wallet_version, privkey)
}

fn bech32_polymod(values: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for &value in values {
        let top = chk >> 25;
        chk = (chk & 0x1ff_ffff) << 5 ^ u32::from(value);
        for (i, generator) in BECH32_GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= generator;
            }
        }
    }
    chk
}

fn bech32_hrp_expand(hrp: &str) -> Vec<u8> {
    let mut out: Vec<u8> = hrp.bytes().map(|b| b >> 5).collect();
    out.push(0);
    out.extend(hrp.bytes().map(|b| b & 31));
    out
}

pub fn bech32_verify_checksum(hrp: &str, data: &[u8]) -> bool {
    let mut values = bech32_hrp_expand(hrp);
    values.extend_from_slice(data);
    bech32_polymod(&values) == BECH32_CONST
}

fn bech32_create_checksum(hrp: &str, data: &[u8]) -> [u8; 6] {
    let mut values = bech32_hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0; 6]);
    let polymod = bech32_polymod(&values) ^ BECH32_CONST;

    let mut checksum = [0u8; 6];
    for (i, slot) in checksum.iter_mut().enumerate() {
        *slot = ((polymod >> (5 * (5 - i))) & 31) as u8;
    }
    checksum
}

/// Regroup bytes into 5-bit digits, zero-padding the tail.
fn bytes_to_quints(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity((data.len() * 8 + 4) / 5);
    let mut acc: u32 = 0;
    let mut bits = 0;
    for &byte in data {
        acc = acc << 8 | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(((acc >> bits) & 31) as u8);
        }
    }
    if bits > 0 {
        out.push(((acc << (5 - bits)) & 31) as u8);
    }
    out
}

/// The inverse of [`bytes_to_quints`]; trailing padding bits are dropped.
fn quints_to_bytes(quints: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(quints.len() * 5 / 8);
    let mut acc: u32 = 0;
    let mut bits = 0;
    for &quint in quints {
        acc = acc << 5 | u32::from(quint);
        bits += 5;
        while bits >= 8 {
            bits -= 8;
            out.push(((acc >> bits) & 0xff) as u8);
        }
    }
    out
}

/// Encode `hrp || 1 || tag || data || checksum` per BIP173.
pub fn bech32_encode(hrp: &str, tag: u8, data: &[u8]) -> String {
    let mut quints = vec![tag % 32];
    quints.extend(bytes_to_quints(data));
    let checksum = bech32_create_checksum(hrp, &quints);
    quints.extend_from_slice(&checksum);

    let mut out = String::new();
    if !hrp.is_empty() {
        out.push_str(hrp);
        out.push('1');
    }
    for &quint in &quints {
        out.push(BECH32_ALPHABET[quint as usize] as char);
    }
    out
}

pub fn bech32_decode(encoded: &str) -> Result<(String, u8, Vec<u8>)> {
    let (hrp, data_part) = match encoded.rfind('1') {
        Some(position) => (&encoded[..position], &encoded[position + 1..]),
        None => ("", encoded),
    };

    let quints = data_part
        .bytes()
        .map(|b| {
            BECH32_ALPHABET
                .iter()
                .position(|&a| a == b.to_ascii_lowercase())
                .map(|q| q as u8)
                .ok_or(Error::BadAddress("invalid bech32 character"))
        })
        .collect::<Result<Vec<u8>>>()?;

    if quints.len() < 7 {
        return Err(Error::BadAddress("bech32 data too short"));
    }
    if !bech32_verify_checksum(hrp, &quints) {
        return Err(Error::BadAddress("bech32 checksum mismatch"));
    }

    let body = &quints[..quints.len() - 6];
    Ok((hrp.to_string(), body[0], quints_to_bytes(&body[1..])))
}

/// The native segwit pay-to-witness-pubkey-hash address of a public key.
pub fn p2wpkh_address(pubkey: &[u8], params: &NetworkParams) -> String {
    bech32_encode(&params.hrp, 0, &hash160(pubkey))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // The compressed public key of private key 1.
    const PUBKEY_ONE: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    #[test]
    fn base58_known_values() {
        assert_eq!(base58_encode(&[]), "");
        assert_eq!(base58_encode(&[0, 0, 1]), "112");
        assert_eq!(base58_decode("112").unwrap(), vec![0, 0, 1]);
    }

    #[test]
    fn base58_rejects_invalid_characters() {
        assert!(matches!(base58_decode("0Ol"), Err(Error::BadAddress(_))));
    }

    #[test]
    fn p2pkh_of_generator_key() {
        let pubkey = hex::decode(PUBKEY_ONE).unwrap();
        assert_eq!(
            p2pkh_address(&pubkey, &NetworkParams::default()),
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"
        );
    }

    #[test]
    fn genesis_address() {
        let hash = hex::decode("62e907b15cbf27d5425399ebf6f0fb50ebb88f18").unwrap();
        assert_eq!(
            base58check_encode(0, &hash),
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"
        );
    }

    #[test]
    fn wif_of_private_key_one() {
        let mut key = [0u8; 32];
        key[31] = 1;
        assert_eq!(
            wif_encode(&key, &NetworkParams::default()),
            "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf"
        );
    }

    #[test]
    fn base58check_round_trip_and_checksum() {
        let payload = hex::decode("62e907b15cbf27d5425399ebf6f0fb50ebb88f18").unwrap();
        let encoded = base58check_encode(0, &payload);
        assert_eq!(base58check_decode(&encoded).unwrap(), (0, payload));

        // A flipped payload bit must fail the checksum.
        let mut raw = base58_decode(&encoded).unwrap();
        raw[1] ^= 0x01;
        assert!(matches!(
            base58check_decode(&base58_encode(&raw)),
            Err(Error::BadAddress("base58check checksum mismatch"))
        ));
    }

    #[test]
    fn p2wpkh_of_generator_key() {
        let pubkey = hex::decode(PUBKEY_ONE).unwrap();
        assert_eq!(
            p2wpkh_address(&pubkey, &NetworkParams::default()),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
    }

    #[test]
    fn bech32_round_trip() {
        let (hrp, tag, data) =
            bech32_decode("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4").unwrap();
        assert_eq!(hrp, "bc");
        assert_eq!(tag, 0);
        assert_eq!(
            hex::encode(&data),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
        assert_eq!(bech32_encode(&hrp, tag, &data), "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
    }

    #[test]
    fn bech32_rejects_an_edited_character() {
        let address = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
        let edited = address.replace("w508", "w509");
        assert!(matches!(
            bech32_decode(&edited),
            Err(Error::BadAddress("bech32 checksum mismatch"))
        ));
    }

    #[test]
    fn quint_regrouping_round_trips() {
        let data = b"regroup me";
        assert_eq!(quints_to_bytes(&bytes_to_quints(data)), data);
    }

    proptest! {
        #[test]
        fn base58check_round_trips(version: u8, payload in proptest::collection::vec(any::<u8>(), 0..40)) {
            let encoded = base58check_encode(version, &payload);
            let (decoded_version, decoded_payload) = base58check_decode(&encoded).unwrap();
            prop_assert_eq!(decoded_version, version);
            prop_assert_eq!(decoded_payload, payload);
        }
    }
}
