//! Consensus (de)serialization of transactions, including segwit form.

use std::fmt;

use crate::encode::{Decodable, Encodable, Reader, Writer};
use crate::error::{Error, Result};
use crate::hashing::sha256d;
use crate::script::Script;

/// A transaction input: the outpoint it spends, its unlocking script and its
/// sequence number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    pub prev_txid: [u8; 32],
    pub prev_index: u32,
    pub script_sig: Script,
    pub sequence: u32,
}

/// A transaction output: an amount in satoshi and its locking script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    pub value: u64,
    pub script_pubkey: Script,
}

/// The witness stack of one input: a sequence of byte strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Witness {
    pub stack: Vec<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    /// Present iff the encoding carried the segwit marker; aligned 1:1 with
    /// `inputs`.
    pub witness: Option<Vec<Witness>>,
    pub locktime: u32,
}

impl Transaction {
    pub fn from_bytes(bytes: &[u8]) -> Result<Transaction> {
        Transaction::decode(&mut Reader::new(bytes))
    }

    /// Consensus encoding. With `exclude_witness` the marker, flag and
    /// witness sections are suppressed, which is the form that is hashed
    /// for the txid and for the legacy sighash.
    pub fn serialize(&self, exclude_witness: bool) -> Vec<u8> {
        let mut writer = Writer::new();
        self.encode_into(&mut writer, exclude_witness);
        writer.into_bytes()
    }

    pub fn encode_into(&self, writer: &mut Writer, exclude_witness: bool) {
        let witness = if exclude_witness {
            None
        } else {
            self.witness.as_ref()
        };

        writer.write_u32(self.version);
        if witness.is_some() {
            writer.write_u8(0);
            writer.write_u8(1);
        }
        writer.write_varint(self.inputs.len() as u64);
        for input in &self.inputs {
            writer.write(input);
        }
        writer.write_varint(self.outputs.len() as u64);
        for output in &self.outputs {
            writer.write(output);
        }
        if let Some(witness) = witness {
            for item in witness {
                writer.write(item);
            }
        }
        writer.write_u32(self.locktime);
    }

    /// The id of a transaction is invariant under its witness data.
    pub fn txid(&self) -> Txid {
        Txid(sha256d(&self.serialize(true)))
    }
}

impl Decodable for Transaction {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let version = reader.read_u32()?;

        let mut nr_inputs = reader.read_varint()?;
        let mut has_witness = false;
        if nr_inputs == 0 {
            // Segwit marker: a zero input count followed by a non-zero flag,
            // then the real input count.
            let flag = reader.read_u8()?;
            if flag == 0 {
                return Err(Error::BadTransaction("zero witness flag"));
            }
            has_witness = true;
            nr_inputs = reader.read_varint()?;
        }

        let mut inputs = Vec::new();
        for _ in 0..nr_inputs {
            inputs.push(reader.read::<Input>()?);
        }

        let nr_outputs = reader.read_varint()?;
        let mut outputs = Vec::new();
        for _ in 0..nr_outputs {
            outputs.push(reader.read::<Output>()?);
        }

        let witness = if has_witness {
            let mut stacks = Vec::new();
            for _ in 0..nr_inputs {
                stacks.push(reader.read::<Witness>()?);
            }
            Some(stacks)
        } else {
            None
        };

        let locktime = reader.read_u32()?;

        Ok(Transaction {
            version,
            inputs,
            outputs,
            witness,
            locktime,
        })
    }
}

impl Encodable for Transaction {
    fn encode(&self, writer: &mut Writer) {
        self.encode_into(writer, false);
    }
}

impl Decodable for Input {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let mut prev_txid = [0u8; 32];
        prev_txid.copy_from_slice(reader.read_bytes(32)?);

        Ok(Input {
            prev_txid,
            prev_index: reader.read_u32()?,
            script_sig: reader.read()?,
            sequence: reader.read_u32()?,
        })
    }
}

impl Encodable for Input {
    fn encode(&self, writer: &mut Writer) {
        writer.write_bytes(&self.prev_txid);
        writer.write_u32(self.prev_index);
        writer.write(&self.script_sig);
        writer.write_u32(self.sequence);
    }
}

impl Decodable for Output {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Output {
            value: reader.read_u64()?,
            script_pubkey: reader.read()?,
        })
    }
}

impl Encodable for Output {
    fn encode(&self, writer: &mut Writer) {
        writer.write_u64(self.value);
        writer.write(&self.script_pubkey);
    }
}

impl Decodable for Witness {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_varint()?;
        let mut stack = Vec::new();
        for _ in 0..count {
            let len = reader.read_varint()?;
            stack.push(reader.read_bytes(len as usize)?.to_vec());
        }

        Ok(Witness { stack })
    }
}

impl Encodable for Witness {
    fn encode(&self, writer: &mut Writer) {
        writer.write_varint(self.stack.len() as u64);
        for item in &self.stack {
            writer.write_varint(item.len() as u64);
            writer.write_bytes(item);
        }
    }
}

/// A transaction id: the double SHA-256 of the witness-stripped encoding.
///
/// Displayed in the conventional reversed-hex form.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Txid([u8; 32]);

impl Txid {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Txid {
    fn from(bytes: [u8; 32]) -> Self {
        Txid(bytes)
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        write!(f, "{}", hex::encode(reversed))
    }
}

impl fmt::Debug for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txid({})", self)
    }
}
