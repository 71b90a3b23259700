#![warn(
    unused_extern_crates,
    missing_debug_implementations,
    missing_copy_implementations,
    rust_2018_idioms,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::fallible_impl_from,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap,
    clippy::dbg_macro
)]
#![cfg_attr(not(test), warn(clippy::unwrap_used))]
#![forbid(unsafe_code)]
#![allow(non_snake_case)]

//! Forensic recovery of ECDSA private keys from signatures that reused a
//! nonce.
//!
//! Feed raw transactions to a [`Cracker`]; it reconstructs the digest every
//! input signature covers, groups signatures by `(pubkey, r)` and solves for
//! the nonce and private key wherever two signatures collide. The arithmetic
//! ([`field`], [`curve`], [`ecdsa`]) and the transaction plumbing
//! ([`transaction`], [`script`], [`sighash`]) are usable on their own.
//!
//! The library does no I/O and generates no randomness: all bytes come from
//! the caller and all results are returned as values.

pub mod address;
pub mod cracker;
pub mod curve;
pub mod ecdsa;
pub mod encode;
mod error;
pub mod field;
pub mod hashing;
pub mod script;
pub mod sighash;
pub mod signature;
pub mod transaction;

pub use cracker::{CrackArtifact, Cracker, NoPrevOuts, PrevOuts, RecoveredKey};
pub use ecdsa::{secp256k1, Ecdsa};
pub use error::{Error, Result};
pub use transaction::{Transaction, Txid};
