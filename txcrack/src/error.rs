pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("not enough data")]
    Truncated,
    #[error("not a signature: {0}")]
    BadSignature(&'static str),
    #[error("malformed transaction: {0}")]
    BadTransaction(&'static str),
    #[error("malformed address: {0}")]
    BadAddress(&'static str),
    #[error("point is not on the curve")]
    NotOnCurve,
    #[error("division by zero in the field")]
    DivisionByZero,
    #[error("square roots for p % 8 == 1 are not implemented")]
    SqrtUnimplemented,
    #[error("unsupported hashtype {0:#04x}")]
    UnsupportedHashType(u8),
    #[error("spent output value is required for the witness sighash")]
    MissingValue,
    #[error("input index {0} is out of range")]
    InputIndexOutOfRange(usize),
    #[error("candidate private keys disagree; not a nonce-reuse pair")]
    CrackMismatch,
}
