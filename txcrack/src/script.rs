//! Script bytecode walking: enough to enumerate pushed data, not to execute.

use std::fmt;

use crate::encode::{Decodable, Encodable, Reader, Writer};
use crate::error::Result;

/// A flat script byte sequence, serialized with a varint length prefix.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new() -> Script {
        Script::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Script {
        Script(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The pay-to-pubkey-hash locking script:
    /// `DUP HASH160 <hash> EQUALVERIFY CHECKSIG`.
    pub fn p2pkh(pubkey_hash: &[u8; 20]) -> Script {
        let mut bytecode = Vec::with_capacity(25);
        bytecode.extend_from_slice(&[0x76, 0xa9, 0x14]);
        bytecode.extend_from_slice(pubkey_hash);
        bytecode.extend_from_slice(&[0x88, 0xac]);
        Script(bytecode)
    }

    pub fn iter(&self) -> ScriptIter<'_> {
        ScriptIter {
            reader: Reader::new(&self.0),
            failed: false,
        }
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.0))
    }
}

impl Decodable for Script {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let size = reader.read_varint()?;
        Ok(Script(reader.read_bytes(size as usize)?.to_vec()))
    }
}

impl Encodable for Script {
    fn encode(&self, writer: &mut Writer) {
        writer.write_varint(self.0.len() as u64);
        writer.write_bytes(&self.0);
    }
}

/// One logical script element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptItem<'a> {
    /// Bytes pushed onto the stack.
    Data(&'a [u8]),
    /// One of the small constants `OP_1` through `OP_16`.
    Constant(u8),
    /// Any other opcode.
    Opcode(u8),
}

/// Walks a script one element at a time.
///
/// A push whose declared length exceeds the remaining bytes yields an error
/// and ends the iteration.
#[derive(Clone, Copy, Debug)]
pub struct ScriptIter<'a> {
    reader: Reader<'a>,
    failed: bool,
}

impl<'a> Iterator for ScriptIter<'a> {
    type Item = Result<ScriptItem<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }

        let mut step = || -> Result<ScriptItem<'a>> {
            let opcode = self.reader.read_u8()?;
            Ok(match opcode {
                0..=78 => {
                    let size = match opcode {
                        76 => self.reader.read_u8()? as usize,
                        77 => self.reader.read_u16()? as usize,
                        78 => self.reader.read_u32()? as usize,
                        direct => direct as usize,
                    };
                    ScriptItem::Data(self.reader.read_bytes(size)?)
                }
                81..=96 => ScriptItem::Constant(opcode - 80),
                other => ScriptItem::Opcode(other),
            })
        };

        let item = step();
        self.failed = item.is_err();
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn direct_pushes_constants_and_opcodes() {
        let script = Script::from_bytes(vec![0x02, 0xab, 0xcd, 0x51, 0x60, 0x76, 0x00]);
        let collected: Vec<_> = script.iter().collect();
        assert_eq!(
            collected,
            vec![
                Ok(ScriptItem::Data(&[0xab, 0xcd])),
                Ok(ScriptItem::Constant(1)),
                Ok(ScriptItem::Constant(16)),
                Ok(ScriptItem::Opcode(0x76)),
                Ok(ScriptItem::Data(&[])),
            ]
        );
    }

    #[test]
    fn length_prefixed_pushes() {
        let script = Script::from_bytes(vec![0x4c, 0x01, 0xff]);
        let collected: Vec<_> = script.iter().collect();
        assert_eq!(collected, vec![Ok(ScriptItem::Data(&[0xff]))]);

        let script = Script::from_bytes(vec![0x4d, 0x02, 0x00, 0xaa, 0xbb]);
        let collected: Vec<_> = script.iter().collect();
        assert_eq!(collected, vec![Ok(ScriptItem::Data(&[0xaa, 0xbb]))]);

        let script = Script::from_bytes(vec![0x4e, 0x01, 0x00, 0x00, 0x00, 0xcc]);
        let collected: Vec<_> = script.iter().collect();
        assert_eq!(collected, vec![Ok(ScriptItem::Data(&[0xcc]))]);
    }

    #[test]
    fn overlong_push_ends_iteration_with_an_error() {
        let script = Script::from_bytes(vec![0x51, 0x05, 0x01, 0x02]);
        let collected: Vec<_> = script.iter().collect();
        assert_eq!(
            collected,
            vec![Ok(ScriptItem::Constant(1)), Err(Error::Truncated)]
        );
    }

    #[test]
    fn p2pkh_template() {
        let script = Script::p2pkh(&[0x11; 20]);
        assert_eq!(script.as_bytes().len(), 25);
        assert_eq!(script.as_bytes()[..3], [0x76, 0xa9, 0x14]);
        assert_eq!(script.as_bytes()[23..], [0x88, 0xac]);

        let collected: Vec<_> = script.iter().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(collected[2], ScriptItem::Data(&[0x11; 20]));
    }

    #[test]
    fn codec_round_trip() {
        let script = Script::from_bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        let mut w = Writer::new();
        script.encode(&mut w);
        let bytes = w.into_bytes();
        assert_eq!(bytes, [0x04, 0xde, 0xad, 0xbe, 0xef]);

        let mut r = Reader::new(&bytes);
        assert_eq!(r.read::<Script>().unwrap(), script);
    }
}
