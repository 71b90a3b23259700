//! Reconstruction of the digests that transaction signatures actually cover.

use crate::encode::{Encodable, Writer};
use crate::error::{Error, Result};
use crate::hashing::{hash160, sha256d};
use crate::script::Script;
use crate::signature::{sighash_mode, SighashMode, SIGHASH_ALL};
use crate::transaction::Transaction;

/// The digest produced for `SIGHASH_SINGLE` with no matching output. Old
/// signers signed this constant without noticing; verifiers must reproduce
/// it.
pub const SIGHASH_SINGLE_BUG_DIGEST: [u8; 32] = {
    let mut digest = [0u8; 32];
    digest[0] = 1;
    digest
};

/// The original (pre-segwit) signature digest.
///
/// A copy of the transaction is rewritten according to the hashtype: the
/// signed input gets `script_code` as its script, the others are emptied,
/// outputs are dropped or blanked for `NONE`/`SINGLE`, and the result is
/// serialized without witness data, with the hashtype appended as a 32-bit
/// little-endian integer, then double SHA-256 hashed.
pub fn legacy_sighash(
    tx: &Transaction,
    hashtype: u8,
    input_index: usize,
    script_code: &Script,
) -> Result<[u8; 32]> {
    let (mode, anyone_can_pay) = sighash_mode(hashtype)?;
    if input_index >= tx.inputs.len() {
        return Err(Error::InputIndexOutOfRange(input_index));
    }

    if mode == SighashMode::Single && input_index >= tx.outputs.len() {
        return Ok(SIGHASH_SINGLE_BUG_DIGEST);
    }

    let mut copy = tx.clone();
    copy.witness = None;

    if anyone_can_pay {
        copy.inputs = vec![copy.inputs[input_index].clone()];
    }
    for (i, input) in copy.inputs.iter_mut().enumerate() {
        if anyone_can_pay || i == input_index {
            input.script_sig = script_code.clone();
        } else {
            input.script_sig = Script::new();
            if mode != SighashMode::All {
                input.sequence = 0;
            }
        }
    }

    match mode {
        SighashMode::All => {}
        SighashMode::None => copy.outputs.clear(),
        SighashMode::Single => {
            copy.outputs.truncate(input_index + 1);
            for output in &mut copy.outputs[..input_index] {
                output.script_pubkey = Script::new();
                output.value = u64::MAX;
            }
        }
    }

    let mut writer = Writer::new();
    copy.encode_into(&mut writer, true);
    writer.write_u32(u32::from(hashtype));

    Ok(sha256d(&writer.into_bytes()))
}

/// The BIP143 witness signature digest.
///
/// The script code is derived from the input's witness stack: a two-element
/// stack is a p2wpkh spend (the code is the canonical p2pkh script over the
/// pushed key's HASH160), any other non-empty stack is p2wsh (the code is
/// the trailing witness script). An input without witness data falls back to
/// the legacy digest over `script_code` with `SIGHASH_ALL`.
///
/// `value` is the amount of the spent output in satoshi.
pub fn witness_sighash(
    tx: &Transaction,
    hashtype: u8,
    input_index: usize,
    value: u64,
    script_code: &Script,
) -> Result<[u8; 32]> {
    if input_index >= tx.inputs.len() {
        return Err(Error::InputIndexOutOfRange(input_index));
    }

    // Unlike the legacy path, unusual low bits are hashed as ALL rather
    // than rejected.
    let anyone_can_pay = hashtype & 0x80 != 0;
    let single = hashtype & 0x1f == 0x03;
    let none = hashtype & 0x1f == 0x02;

    let stack = tx
        .witness
        .as_ref()
        .map(|witness| witness[input_index].stack.as_slice());
    if matches!(stack, Some([])) {
        return legacy_sighash(tx, SIGHASH_ALL, input_index, script_code);
    }

    let input = &tx.inputs[input_index];
    let mut writer = Writer::new();
    writer.write_u32(tx.version);

    if anyone_can_pay {
        writer.write_bytes(&[0u8; 32]);
    } else {
        writer.write_bytes(&hash_prevouts(tx));
    }

    if anyone_can_pay || single || none {
        writer.write_bytes(&[0u8; 32]);
    } else {
        writer.write_bytes(&hash_sequence(tx));
    }

    writer.write_bytes(&input.prev_txid);
    writer.write_u32(input.prev_index);

    match stack {
        Some([_sig, pubkey]) => {
            // p2wpkh: 0x19 || DUP HASH160 <hash160(pubkey)> EQUALVERIFY CHECKSIG
            writer.write_u8(0x19);
            writer.write_bytes(Script::p2pkh(&hash160(pubkey)).as_bytes());
        }
        Some(stack) => {
            let witness_script = stack.last().expect("stack is non-empty");
            writer.write_varint(witness_script.len() as u64);
            writer.write_bytes(witness_script);
        }
        None => writer.write(script_code),
    }

    writer.write_u64(value);
    writer.write_u32(input.sequence);

    if single {
        if input_index < tx.outputs.len() {
            let mut w = Writer::new();
            tx.outputs[input_index].encode(&mut w);
            writer.write_bytes(&sha256d(&w.into_bytes()));
        } else {
            writer.write_bytes(&[0u8; 32]);
        }
    } else if none {
        writer.write_bytes(&[0u8; 32]);
    } else {
        writer.write_bytes(&hash_outputs(tx));
    }

    writer.write_u32(tx.locktime);
    writer.write_u32(u32::from(hashtype));

    Ok(sha256d(&writer.into_bytes()))
}

fn hash_prevouts(tx: &Transaction) -> [u8; 32] {
    let mut w = Writer::new();
    for input in &tx.inputs {
        w.write_bytes(&input.prev_txid);
        w.write_u32(input.prev_index);
    }
    sha256d(&w.into_bytes())
}

fn hash_sequence(tx: &Transaction) -> [u8; 32] {
    let mut w = Writer::new();
    for input in &tx.inputs {
        w.write_u32(input.sequence);
    }
    sha256d(&w.into_bytes())
}

fn hash_outputs(tx: &Transaction) -> [u8; 32] {
    let mut w = Writer::new();
    for output in &tx.outputs {
        output.encode(&mut w);
    }
    sha256d(&w.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{SIGHASH_NONE, SIGHASH_SINGLE};

    const NONCE_TX: &str = "01000000023c99cb033a0f5897d0587c0172a5456f036496fe585f01d9fb6009154e26627e000000008b483045022100cabc3692f1f7ba75a8572dc5d270b35bcc00650534f6e5ecd6338e55355454d502200437b68b1ea23546f6f712fd6a7e5370cfc2e658a8f0245628afd8b6999d9da60141044a87eb1c5255b7d224e15b046f88fd322af1168954f0cba020a4358641d008c13228b85e0a1fd313e032326aff1b27240ece99c90dc58b19bab804c705fcd2ecffffffff3c99cb033a0f5897d0587c0172a5456f036496fe585f01d9fb6009154e26627e010000008c493046022100cabc3692f1f7ba75a8572dc5d270b35bcc00650534f6e5ecd6338e55355454d5022100b584c5e2f26eaac9510307f466d13f8d4e8f57b1323cc4151ff6ffeb6747ca9b014104bb6c1de01f36618ae05f7c183c22dfa8797e779f39537752c27e2dc045b0e6942f8af53270bf045f2258834b6dad7481ad6fca009d80f5b54697b08d104fc7b3ffffffff0180969800000000001976a914aed8036193b2e7ebdd7596fb658894548c6eb5bf88ac00000000";

    const SEGWIT_TX: &str = "02000000000101000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f0100000000feffffff01c09ee605000000001976a9146dabc2a500bf128556fc379d9a265e3c6af2e01788ac0248304502207e0994bdf3c23a5e7e77d6e96f8570a0c06b34eec1eca25214d6d0d9753a415f022100ef4c81dae3d1983baa4f4e1aa77d47408f7864e9bf6b58d3fc3f82ed451f4b0d012103dffb68a9330fa567e82988b664984d5a08a32487c5279a253bdda28a1d69aedf00000000";

    fn nonce_tx() -> Transaction {
        Transaction::from_bytes(&hex::decode(NONCE_TX).unwrap()).unwrap()
    }

    fn pubkey(tx: &Transaction, input: usize) -> Vec<u8> {
        use crate::script::ScriptItem;

        for item in tx.inputs[input].script_sig.iter() {
            if let Ok(ScriptItem::Data(data)) = item {
                if data.len() == 65 && data[0] == 4 {
                    return data.to_vec();
                }
            }
        }
        panic!("input carries no uncompressed pubkey");
    }

    #[test]
    fn legacy_all_digests() {
        let tx = nonce_tx();

        // Each input is signed over the p2pkh script of its own pubkey.
        let m0 = legacy_sighash(
            &tx,
            SIGHASH_ALL,
            0,
            &Script::p2pkh(&hash160(&pubkey(&tx, 0))),
        )
        .unwrap();
        assert_eq!(
            hex::encode(m0),
            "109a80161c75f67ff6b98166b061e82e4b739ee8cac2820f173ab8b1f9991242"
        );

        let m1 = legacy_sighash(
            &tx,
            SIGHASH_ALL,
            1,
            &Script::p2pkh(&hash160(&pubkey(&tx, 1))),
        )
        .unwrap();
        assert_eq!(
            hex::encode(m1),
            "5e628c458502ca2111587a510d2ba0cedb9d593f8748c11b5b8512d2c6c947d1"
        );
    }

    #[test]
    fn single_bug_digest() {
        // Two inputs, one output: SINGLE on input 1 hits the bug.
        let tx = nonce_tx();
        let m = legacy_sighash(&tx, SIGHASH_SINGLE, 1, &Script::new()).unwrap();
        assert_eq!(m, SIGHASH_SINGLE_BUG_DIGEST);
        assert_eq!(
            hex::encode(m),
            "0100000000000000000000000000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn unsupported_hashtype_is_rejected() {
        let tx = nonce_tx();
        assert_eq!(
            legacy_sighash(&tx, 0x04, 0, &Script::new()),
            Err(Error::UnsupportedHashType(0x04))
        );
    }

    #[test]
    fn out_of_range_input_is_rejected() {
        let tx = nonce_tx();
        assert_eq!(
            legacy_sighash(&tx, SIGHASH_ALL, 5, &Script::new()),
            Err(Error::InputIndexOutOfRange(5))
        );
        assert_eq!(
            witness_sighash(&tx, SIGHASH_ALL, 5, 0, &Script::new()),
            Err(Error::InputIndexOutOfRange(5))
        );
    }

    #[test]
    fn none_blanks_outputs_and_other_sequences() {
        let tx = nonce_tx();
        let all = legacy_sighash(&tx, SIGHASH_ALL, 0, &Script::new()).unwrap();
        let none = legacy_sighash(&tx, SIGHASH_NONE, 0, &Script::new()).unwrap();
        assert_ne!(all, none);
    }

    #[test]
    fn anyonecanpay_keeps_only_the_signed_input() {
        let tx = nonce_tx();
        let script = Script::p2pkh(&hash160(&pubkey(&tx, 0)));

        let digest = legacy_sighash(&tx, SIGHASH_ALL | 0x80, 0, &script).unwrap();

        // The same digest must come out of a transaction that never had the
        // other input in the first place.
        let mut solo = tx.clone();
        solo.inputs = vec![tx.inputs[0].clone()];
        let expected = legacy_sighash(&solo, SIGHASH_ALL | 0x80, 0, &script).unwrap();
        assert_eq!(digest, expected);
    }

    #[test]
    fn p2wpkh_digest() {
        let tx = Transaction::from_bytes(&hex::decode(SEGWIT_TX).unwrap()).unwrap();
        let m = witness_sighash(&tx, SIGHASH_ALL, 0, 100_000_000, &Script::new()).unwrap();
        assert_eq!(
            hex::encode(m),
            "43785d1357faae82a76f12da52caeaca6d0870e35cd0afc9b47fecda184cf4be"
        );
    }

    #[test]
    fn p2wpkh_digest_verifies_against_the_witness_signature() {
        use crate::ecdsa::{scalar_from_bytes, secp256k1};
        use crate::signature::decode_signature;

        let tx = Transaction::from_bytes(&hex::decode(SEGWIT_TX).unwrap()).unwrap();
        let stack = &tx.witness.as_ref().unwrap()[0].stack;
        let sig = decode_signature(&stack[0]).unwrap();

        let m = witness_sighash(&tx, sig.hashtype, 0, 100_000_000, &Script::new()).unwrap();

        let e = secp256k1();
        let pubkey = e.curve().decode_point(&stack[1]).unwrap();
        assert!(e
            .verify(
                &scalar_from_bytes(&m),
                &pubkey,
                &scalar_from_bytes(&sig.r),
                &scalar_from_bytes(&sig.s),
            )
            .unwrap());
    }

    #[test]
    fn witness_value_changes_the_digest() {
        let tx = Transaction::from_bytes(&hex::decode(SEGWIT_TX).unwrap()).unwrap();
        let m1 = witness_sighash(&tx, SIGHASH_ALL, 0, 100_000_000, &Script::new()).unwrap();
        let m2 = witness_sighash(&tx, SIGHASH_ALL, 0, 100_000_001, &Script::new()).unwrap();
        assert_ne!(m1, m2);
    }

    #[test]
    fn p2wsh_uses_the_trailing_witness_script() {
        let mut tx = Transaction::from_bytes(&hex::decode(SEGWIT_TX).unwrap()).unwrap();
        let witness_script = vec![0x51, 0xac];
        tx.witness.as_mut().unwrap()[0].stack =
            vec![vec![], vec![0x01], witness_script.clone()];

        let digest = witness_sighash(&tx, SIGHASH_ALL, 0, 1000, &Script::new()).unwrap();

        // A three-element stack takes the p2wsh interpretation: the script
        // code is the trailing witness script with its length prefix.
        let mut w = Writer::new();
        w.write_u32(tx.version);
        w.write_bytes(&hash_prevouts(&tx));
        w.write_bytes(&hash_sequence(&tx));
        w.write_bytes(&tx.inputs[0].prev_txid);
        w.write_u32(tx.inputs[0].prev_index);
        w.write_varint(witness_script.len() as u64);
        w.write_bytes(&witness_script);
        w.write_u64(1000);
        w.write_u32(tx.inputs[0].sequence);
        w.write_bytes(&hash_outputs(&tx));
        w.write_u32(tx.locktime);
        w.write_u32(u32::from(SIGHASH_ALL));
        assert_eq!(digest, sha256d(&w.into_bytes()));
    }

    #[test]
    fn empty_witness_stack_falls_back_to_legacy() {
        let mut tx = Transaction::from_bytes(&hex::decode(SEGWIT_TX).unwrap()).unwrap();
        tx.witness.as_mut().unwrap()[0].stack.clear();

        let script = Script::p2pkh(&[0x22; 20]);
        let fallback = witness_sighash(&tx, SIGHASH_ALL, 0, 1000, &script).unwrap();
        let legacy = legacy_sighash(&tx, SIGHASH_ALL, 0, &script).unwrap();
        assert_eq!(fallback, legacy);
    }
}
